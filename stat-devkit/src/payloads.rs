/*!
Payloads de télémétrie au format publié par l'embarqué STAT

Chaque builder produit l'objet JSON d'un publish (`device`, `type`, mesures).
`Scenario` fait varier ces mesures dans le temps pour le simulateur.
*/

use serde_json::{json, Value};

pub struct TelemetryBuilder;

impl TelemetryBuilder {
    pub fn cpu(usage: f64) -> Value {
        json!({"device": "CPU", "usage": usage})
    }

    pub fn memory(usage: f64) -> Value {
        json!({"device": "Memory", "usage": usage})
    }

    pub fn fan(rpm: i64, load: i64) -> Value {
        json!({"device": "Fan", "rpm": rpm, "load": load})
    }

    /// Un canal par (label, tension, courant), shunt 0.1 ohm
    pub fn system_power(channels: &[(&str, f64, f64)]) -> Value {
        let channels: Vec<Value> = channels
            .iter()
            .enumerate()
            .map(|(i, (label, voltage, current))| {
                json!({
                    "channel": i,
                    "label": label,
                    "voltage": voltage,
                    "current": current,
                    "power": voltage * current,
                    "shunt_resistor": 0.1,
                })
            })
            .collect();
        json!({
            "device": "SystemPower",
            "chip": "INA3221",
            "num_channels": channels.len(),
            "channels": channels,
        })
    }

    pub fn ina238(voltage: f64, current: f64, level: f64) -> Value {
        json!({
            "device": "Battery",
            "type": "INA238",
            "voltage": voltage,
            "current": current,
            "power": voltage * current,
            "temperature": 31.5,
            "battery_level": level,
            "battery_status": battery_status(level),
            "time_remaining_fmt": "4:12",
            "battery_chemistry": "LiFePO4",
        })
    }

    /// Cellules en millivolts, comme les registres du BMS
    pub fn daly_bms(voltage: f64, current: f64, level: f64, cells_mv: &[u32]) -> Value {
        let cells: Vec<Value> = cells_mv
            .iter()
            .enumerate()
            .map(|(i, mv)| json!({"index": i + 1, "voltage": f64::from(*mv) / 1000.0, "balance": false}))
            .collect();
        let vmax = cells_mv.iter().copied().max().unwrap_or(0);
        let vmin = cells_mv.iter().copied().min().unwrap_or(0);

        json!({
            "device": "Battery",
            "type": "DalyBMS",
            "voltage": voltage,
            "current": current,
            "power": voltage * current,
            "battery_level": level,
            "charge_fet": true,
            "discharge_fet": true,
            "cycles": 42,
            "remaining_capacity_mah": 64000,
            "battery_cells": cells_mv.len(),
            "vmax": f64::from(vmax) / 1000.0,
            "vmin": f64::from(vmin) / 1000.0,
            "vdelta": f64::from(vmax - vmin) / 1000.0,
            "tmax": 27.0,
            "tmin": 24.0,
            "charging_state": charging_state(current),
            "charger_present": current > 0.5,
            "load_present": current < -0.5,
            "cells": cells,
            "temperatures": [
                {"index": 1, "temperature": 24.0},
                {"index": 2, "temperature": 27.0},
            ],
            "faults": [],
        })
    }

    pub fn battery_status(sources: &[&str], level: f64) -> Value {
        json!({
            "device": "BatteryStatus",
            "sources": sources,
            "sources_str": sources.join(", "),
            "battery_level": level,
            "battery_status": battery_status(level),
            "status_reason": "",
            "critical_fault_count": 0,
            "warning_fault_count": 0,
        })
    }
}

fn battery_status(level: f64) -> &'static str {
    if level <= 10.0 {
        "CRITICAL"
    } else if level <= 20.0 {
        "WARNING"
    } else {
        "NORMAL"
    }
}

fn charging_state(current: f64) -> &'static str {
    if current > 0.5 {
        "charging"
    } else if current < -0.5 {
        "discharging"
    } else {
        "idle"
    }
}

/// Cycle de décharge lente : un appel à `frames` par seconde simulée.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub cells: usize,
    pub start_level: f64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self { cells: 16, start_level: 85.0 }
    }
}

impl Scenario {
    pub fn frames(&self, step: u64) -> Vec<Value> {
        let t = step as f64;
        // perd 1% toutes les 30 s, remonte à 100% une fois vide
        let level = (self.start_level - t / 30.0).rem_euclid(100.0);
        let current = -4.0 - 2.0 * (t / 10.0).sin();
        let cell_mv = 3150 + (level * 2.0) as u32;
        let cells: Vec<u32> = (0..self.cells)
            .map(|i| cell_mv + ((i as u64 * 7 + step) % 12) as u32)
            .collect();
        let pack_voltage = cells.iter().map(|mv| f64::from(*mv)).sum::<f64>() / 1000.0;

        vec![
            TelemetryBuilder::cpu(20.0 + 15.0 * (t / 7.0).sin().abs()),
            TelemetryBuilder::memory(41.0 + (t / 60.0).sin()),
            TelemetryBuilder::fan(1100 + (step % 200) as i64, 35 + (step % 20) as i64),
            TelemetryBuilder::system_power(&[("5V rail", 5.02, 1.2), ("12V rail", 12.1, 0.8)]),
            TelemetryBuilder::ina238(pack_voltage, current, level),
            TelemetryBuilder::daly_bms(pack_voltage, current, level, &cells),
            TelemetryBuilder::battery_status(&["INA238", "DalyBMS"], level),
        ]
    }
}
