/**
 * FORMATAGE - Valeurs brutes => texte + classe de couleur
 *
 * RÔLE : Applique les règles de `schema::FormatRule` et produit les lignes
 * des tables (cellules, capteurs, canaux), le bloc texte des défauts et les
 * textes du panneau système.
 *
 * Valeur manquante ou "vide" => placeholder "--".
 */

use crate::models::{CellReading, Fields, PowerChannel, TemperatureReading};
use crate::schema::{FieldDescriptor, FormatRule};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

pub const PLACEHOLDER: &str = "--";
pub const NO_FAULTS: &str = "No active faults";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorClass {
    #[default]
    Default,
    /// vert
    Normal,
    /// ambre
    Warning,
    /// rouge
    Critical,
    /// gris
    Idle,
}

impl ColorClass {
    pub fn for_level(level: f64) -> Self {
        if level <= 20.0 {
            ColorClass::Critical
        } else if level <= 40.0 {
            ColorClass::Warning
        } else {
            ColorClass::Normal
        }
    }

    pub fn for_charging_state(state: &str) -> Self {
        match state.to_lowercase().as_str() {
            "charging" => ColorClass::Normal,
            "discharging" => ColorClass::Warning,
            "idle" => ColorClass::Idle,
            _ => ColorClass::Default,
        }
    }

    pub fn for_cell_status(status: &str) -> Self {
        match status {
            "CRITICAL" => ColorClass::Critical,
            "WARNING" => ColorClass::Warning,
            _ => ColorClass::Default,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatted {
    pub text: String,
    pub color: ColorClass,
}

impl Formatted {
    fn plain(text: String) -> Self {
        Self { text, color: ColorClass::Default }
    }
}

pub fn fixed(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}")
}

/// Formate un champ décrit par le schéma à partir de l'état fusionné.
pub fn format_field(desc: &FieldDescriptor, fields: &Fields) -> Formatted {
    let value = fields.get(desc.key);
    match desc.rule {
        FormatRule::SourceList => Formatted::plain(source_list(fields)),
        FormatRule::Fixed(decimals) => match value {
            Some(Value::Number(n)) => Formatted::plain(fixed(n.as_f64().unwrap_or_default(), decimals)),
            other => Formatted::plain(generic_text(other)),
        },
        FormatRule::Level => match value {
            Some(Value::Number(n)) => {
                let level = n.as_f64().unwrap_or_default();
                Formatted { text: fixed(level, 1), color: ColorClass::for_level(level) }
            }
            other => Formatted::plain(generic_text(other)),
        },
        FormatRule::ChargingState => {
            let text = generic_text(value);
            let color = ColorClass::for_charging_state(&text);
            Formatted { text, color }
        }
        FormatRule::Plain => Formatted::plain(generic_text(value)),
    }
}

/// `sources` joint par ", " si présent, sinon `sources_str`, sinon placeholder.
pub fn source_list(fields: &Fields) -> String {
    match fields.get("sources") {
        Some(Value::Array(items)) => items.iter().map(item_text).collect::<Vec<_>>().join(", "),
        _ => generic_text(fields.get("sources_str")),
    }
}

fn generic_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => PLACEHOLDER.to_string(),
        Some(Value::Bool(on)) => (if *on { "On" } else { "Off" }).to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) if s.is_empty() => PLACEHOLDER.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) if items.is_empty() => PLACEHOLDER.to_string(),
        Some(Value::Object(map)) if map.is_empty() => PLACEHOLDER.to_string(),
        Some(other) => other.to_string(),
    }
}

fn item_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn list_of(fields: &Fields, key: &str) -> Vec<String> {
    fields
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.iter().map(item_text).collect())
        .unwrap_or_default()
}

/// Entrées d'une liste de sous-enregistrements ; les entrées illisibles sont sautées.
fn readings<T: DeserializeOwned>(list: Option<&Value>, what: &str) -> Vec<T> {
    let Some(items) = list.and_then(Value::as_array) else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match serde_json::from_value(item.clone()) {
            Ok(reading) => Some(reading),
            Err(e) => {
                debug!("skipping malformed {what} entry {item}: {e}");
                None
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellRow {
    pub label: String,
    pub voltage: String,
    pub balancing: &'static str,
    pub status: String,
    pub color: ColorClass,
}

pub fn format_cells(fields: &Fields) -> Vec<CellRow> {
    readings::<CellReading>(fields.get("cells"), "cell")
        .into_iter()
        .map(|cell| CellRow {
            label: format!("Cell {:2}", cell.index),
            voltage: fixed(cell.voltage, 3),
            balancing: if cell.is_balancing() { "Yes" } else { "No" },
            status: cell.status().to_string(),
            color: ColorClass::for_cell_status(cell.status()),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemperatureRow {
    pub label: String,
    pub temperature: String,
}

pub fn format_temperatures(fields: &Fields) -> Vec<TemperatureRow> {
    readings::<TemperatureReading>(fields.get("temperatures"), "temperature")
        .into_iter()
        .map(|sensor| TemperatureRow {
            label: format!("Sensor {}", sensor.index),
            temperature: fixed(sensor.temperature, 1),
        })
        .collect()
}

/// Bloc CRITICAL puis WARNING ; la liste générique `faults` n'est utilisée
/// que si aucune des deux n'a d'entrée.
pub fn format_faults(fields: &Fields) -> String {
    let critical = list_of(fields, "critical_faults");
    let warning = list_of(fields, "warning_faults");

    let mut out = String::new();
    push_fault_block(&mut out, "CRITICAL FAULTS", &critical);
    push_fault_block(&mut out, "WARNING FAULTS", &warning);
    if critical.is_empty() && warning.is_empty() {
        push_fault_block(&mut out, "ACTIVE FAULTS", &list_of(fields, "faults"));
    }

    if out.is_empty() {
        out.push_str(NO_FAULTS);
    }
    out
}

fn push_fault_block(out: &mut String, title: &str, faults: &[String]) {
    if faults.is_empty() {
        return;
    }
    out.push_str(title);
    out.push_str(":\n");
    for fault in faults {
        out.push_str("  • ");
        out.push_str(fault);
        out.push('\n');
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PowerChannelRow {
    pub label: String,
    pub voltage: String,
    pub current: String,
    pub power: String,
    pub shunt: String,
}

pub fn format_power_channels(channels: Option<&Value>) -> Vec<PowerChannelRow> {
    readings::<PowerChannel>(channels, "power channel")
        .into_iter()
        .map(|ch| PowerChannelRow {
            label: ch.label.clone().unwrap_or_else(|| format!("Channel {}", ch.channel)),
            voltage: fixed(ch.voltage, 3),
            current: fixed(ch.current, 3),
            power: fixed(ch.power, 3),
            shunt: fixed(ch.shunt_resistor, 6),
        })
        .collect()
}

pub fn percent_text(value: f64) -> String {
    format!("{}%", fixed(value, 1))
}

/// RPM affiché seulement pour un entier strictement positif.
pub fn fan_rpm_text(rpm: Option<i64>) -> String {
    match rpm {
        Some(rpm) if rpm > 0 => format!("{rpm} RPM"),
        _ => format!("{PLACEHOLDER} RPM"),
    }
}

pub fn fan_load_text(load: Option<i64>) -> String {
    match load {
        Some(load) if load >= 0 => format!("({load}%)"),
        _ => format!("({PLACEHOLDER}%)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    fn desc(key: &'static str) -> FieldDescriptor {
        FieldDescriptor { label: "", key, unit: "", rule: FormatRule::for_key(key) }
    }

    fn text(key: &'static str, data: Value) -> String {
        format_field(&desc(key), &fields(data)).text
    }

    #[test]
    fn numeric_precision_by_key() {
        let data = json!({
            "voltage": 52.4567, "temperature": 24.26, "vdelta": 0.0127,
            "remaining_capacity_mah": 41999.6, "battery_nominal_voltage": 51.2, "cycles": 42
        });
        assert_eq!(text("voltage", data.clone()), "52.46");
        assert_eq!(text("temperature", data.clone()), "24.3");
        assert_eq!(text("vdelta", data.clone()), "0.013");
        assert_eq!(text("remaining_capacity_mah", data.clone()), "42000");
        assert_eq!(text("battery_nominal_voltage", data.clone()), "51.200");
        assert_eq!(text("cycles", data), "42");
    }

    #[test]
    fn booleans_render_on_off() {
        let data = json!({"charge_fet": true, "discharge_fet": false});
        assert_eq!(text("charge_fet", data.clone()), "On");
        assert_eq!(text("discharge_fet", data), "Off");
    }

    #[test]
    fn missing_or_empty_is_placeholder() {
        let data = json!({"battery_status": "", "time_remaining_fmt": null});
        assert_eq!(text("voltage", data.clone()), PLACEHOLDER);
        assert_eq!(text("battery_status", data.clone()), PLACEHOLDER);
        assert_eq!(text("time_remaining_fmt", data), PLACEHOLDER);
    }

    #[test]
    fn sources_prefer_list_over_string() {
        let data = json!({"sources": ["INA238", "DalyBMS"], "sources_str": "stale"});
        assert_eq!(text("sources_str", data), "INA238, DalyBMS");
        assert_eq!(text("sources_str", json!({"sources_str": "INA238"})), "INA238");
        assert_eq!(text("sources_str", json!({})), PLACEHOLDER);
    }

    #[test]
    fn charging_state_colors() {
        let color = |state: &str| format_field(&desc("charging_state"), &fields(json!({"charging_state": state}))).color;
        assert_eq!(color("Charging"), ColorClass::Normal);
        assert_eq!(color("discharging"), ColorClass::Warning);
        assert_eq!(color("idle"), ColorClass::Idle);
        assert_eq!(color("balancing"), ColorClass::Default);
    }

    #[test]
    fn level_tiers() {
        assert_eq!(ColorClass::for_level(20.0), ColorClass::Critical);
        assert_eq!(ColorClass::for_level(20.1), ColorClass::Warning);
        assert_eq!(ColorClass::for_level(40.0), ColorClass::Warning);
        assert_eq!(ColorClass::for_level(40.5), ColorClass::Normal);
        let level = format_field(&desc("battery_level"), &fields(json!({"battery_level": 37.4})));
        assert_eq!(level, Formatted { text: "37.4".into(), color: ColorClass::Warning });
    }

    #[test]
    fn cell_rows() {
        let data = fields(json!({"cells": [
            {"index": 1, "voltage": 3.3114, "balance": true, "cell_status": "NORMAL"},
            {"index": 12, "voltage": 2.9, "cell_status": "CRITICAL"},
            {"index": 3, "voltage": "bad"}
        ]}));
        let rows = format_cells(&data);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].label, "Cell  1");
        assert_eq!(rows[0].voltage, "3.311");
        assert_eq!(rows[0].balancing, "Yes");
        assert_eq!(rows[1].label, "Cell 12");
        assert_eq!(rows[1].balancing, "No");
        assert_eq!(rows[1].color, ColorClass::Critical);
    }

    #[test]
    fn temperature_rows() {
        let rows = format_temperatures(&fields(json!({"temperatures": [{"index": 1, "temperature": 23.44}]})));
        assert_eq!(rows, vec![TemperatureRow { label: "Sensor 1".into(), temperature: "23.4".into() }]);
    }

    #[test]
    fn generic_faults_only_as_fallback() {
        let data = fields(json!({"critical_faults": [], "warning_faults": [], "faults": ["F1"]}));
        assert_eq!(format_faults(&data), "ACTIVE FAULTS:\n  • F1\n");

        let data = fields(json!({"critical_faults": ["C1"], "faults": ["F1"]}));
        assert_eq!(format_faults(&data), "CRITICAL FAULTS:\n  • C1\n");
    }

    #[test]
    fn fault_blocks_keep_order() {
        let data = fields(json!({"warning_faults": ["W1", "W2"], "critical_faults": ["C1"]}));
        assert_eq!(format_faults(&data), "CRITICAL FAULTS:\n  • C1\nWARNING FAULTS:\n  • W1\n  • W2\n");
        assert_eq!(format_faults(&Fields::new()), NO_FAULTS);
    }

    #[test]
    fn power_channel_rows() {
        let rows = format_power_channels(Some(&json!([
            {"channel": 1, "label": "5V Rail", "voltage": 5.0123, "current": 1.2, "power": 6.01, "shunt_resistor": 0.1},
            {"channel": 2, "voltage": 12.0}
        ])));
        assert_eq!(rows[0].label, "5V Rail");
        assert_eq!(rows[0].voltage, "5.012");
        assert_eq!(rows[0].shunt, "0.100000");
        assert_eq!(rows[1].label, "Channel 2");
    }

    #[test]
    fn system_texts() {
        assert_eq!(percent_text(55.0), "55.0%");
        assert_eq!(fan_rpm_text(Some(1200)), "1200 RPM");
        assert_eq!(fan_rpm_text(Some(0)), "-- RPM");
        assert_eq!(fan_load_text(Some(0)), "(0%)");
        assert_eq!(fan_load_text(None), "(--%)");
    }
}
