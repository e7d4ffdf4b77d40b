/**
 * MODÈLES - Types de données de la télémétrie STAT
 *
 * RÔLE : Décrit ce qui circule entre le décodeur, le classifieur et le store :
 * enregistrement décodé, identifiant de source, état fusionné par source.
 *
 * PRINCIPE : schema-last. Les champs restent un `serde_json::Map` libre ;
 * seuls `device` et `type` sont extraits pour le routage.
 */

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use time::OffsetDateTime;

pub type Fields = Map<String, Value>;

/// Message décodé, produit une fois par publish MQTT puis consommé aussitôt.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryRecord {
    pub device: String,
    /// Champ `type` du payload (vide si absent)
    pub kind: String,
    pub fields: Fields,
}

/// Source logique de télémétrie, dérivée de façon déterministe de (device, type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SourceId {
    #[serde(rename = "INA238 Power Monitor")]
    Ina238,
    #[serde(rename = "Daly BMS")]
    DalyBms,
    #[serde(rename = "Battery Monitor")]
    BatteryMonitor,
    #[serde(rename = "Unified Battery")]
    UnifiedBattery,
    #[serde(rename = "System")]
    System,
}

impl SourceId {
    pub const ALL: [SourceId; 5] = [
        SourceId::Ina238,
        SourceId::DalyBms,
        SourceId::BatteryMonitor,
        SourceId::UnifiedBattery,
        SourceId::System,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            SourceId::Ina238 => "INA238 Power Monitor",
            SourceId::DalyBms => "Daly BMS",
            SourceId::BatteryMonitor => "Battery Monitor",
            SourceId::UnifiedBattery => "Unified Battery",
            SourceId::System => "System",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == name)
    }

    /// Seules les sources batterie ouvrent une section dynamique.
    pub const fn is_battery(self) -> bool {
        !matches!(self, SourceId::System)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sections optionnelles : une fois vues, elles restent (monotone, jamais remis à false).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StickySections {
    pub cells: bool,
    pub temperatures: bool,
    pub faults: bool,
}

impl StickySections {
    pub fn observe(&mut self, fields: &Fields) {
        self.cells |= non_empty_list(fields, "cells");
        self.temperatures |= non_empty_list(fields, "temperatures");
        self.faults |= ["critical_faults", "warning_faults", "faults"]
            .iter()
            .any(|key| non_empty_list(fields, key));
    }
}

fn non_empty_list(fields: &Fields, key: &str) -> bool {
    fields
        .get(key)
        .and_then(Value::as_array)
        .is_some_and(|list| !list.is_empty())
}

/// État fusionné d'une source. Possédé par le `SourceStore`, copié pour le dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceState {
    pub id: SourceId,
    pub fields: Fields,
    pub sticky: StickySections,
    pub first_seen: OffsetDateTime,
    pub last_updated: OffsetDateTime,
}

impl SourceState {
    pub fn new(id: SourceId, now: OffsetDateTime) -> Self {
        Self {
            id,
            fields: Map::new(),
            sticky: StickySections::default(),
            first_seen: now,
            last_updated: now,
        }
    }

    /// Union superficielle : les nouvelles valeurs écrasent, les clés absentes sont conservées.
    pub fn apply(&mut self, fields: &Fields, now: OffsetDateTime) {
        for (key, value) in fields {
            self.fields.insert(key.clone(), value.clone());
        }
        self.sticky.observe(&self.fields);
        self.last_updated = now;
    }
}

// Sous-enregistrements du payload, lus avec des valeurs par défaut permissives

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CellReading {
    pub index: i64,
    pub voltage: f64,
    pub balance: Option<bool>,
    /// Variante publiée par le message BatteryHealth
    pub balancing: Option<bool>,
    pub cell_status: Option<String>,
}

impl CellReading {
    pub fn is_balancing(&self) -> bool {
        self.balance.or(self.balancing).unwrap_or(false)
    }

    pub fn status(&self) -> &str {
        self.cell_status.as_deref().unwrap_or("NORMAL")
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TemperatureReading {
    pub index: i64,
    pub temperature: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PowerChannel {
    pub channel: i64,
    pub label: Option<String>,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub shunt_resistor: f64,
}
