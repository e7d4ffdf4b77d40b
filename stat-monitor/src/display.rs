use crate::format::{
    self, fan_load_text, fan_rpm_text, format_field, percent_text, CellRow, ColorClass,
    PowerChannelRow, TemperatureRow,
};
use crate::models::{Fields, SourceId, SourceState};
use crate::schema::{infer_schema, SectionFlags};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayRow {
    pub label: &'static str,
    pub text: String,
    pub unit: &'static str,
    pub color: ColorClass,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Progress {
    pub percent: f64,
    pub text: String,
    pub color: ColorClass,
}

/// Modèle prêt à rendre pour une source batterie.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayModel {
    pub source_id: SourceId,
    /// Légende "Data Source" de la section
    pub caption: &'static str,
    pub rows: Vec<DisplayRow>,
    pub sections: SectionFlags,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell_rows: Option<Vec<CellRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temp_rows: Option<Vec<TemperatureRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fault_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<Progress>,
}

#[cfg(test)]
impl DisplayModel {
    pub fn row(&self, label: &str) -> Option<&DisplayRow> {
        self.rows.iter().find(|r| r.label == label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemDisplayModel {
    pub cpu_percent: f64,
    pub cpu_text: String,
    pub memory_percent: f64,
    pub memory_text: String,
    pub fan_rpm: Option<i64>,
    pub fan_rpm_text: String,
    pub fan_load_percent: Option<i64>,
    pub fan_load_text: String,
    pub power_channel_rows: Vec<PowerChannelRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionDisplay {
    pub text: String,
    pub color: ColorClass,
}

pub fn source_model(state: &SourceState) -> DisplayModel {
    let schema = infer_schema(state.id, &state.fields, state.sticky);
    let fields = &state.fields;

    let rows = schema
        .fields
        .iter()
        .map(|desc| {
            let value = format_field(desc, fields);
            DisplayRow { label: desc.label, text: value.text, unit: desc.unit, color: value.color }
        })
        .collect();

    let sections = schema.sections;
    DisplayModel {
        source_id: state.id,
        caption: state.id.as_str(),
        rows,
        sections,
        cell_rows: sections.has_cells.then(|| format::format_cells(fields)),
        temp_rows: sections.has_temperatures.then(|| format::format_temperatures(fields)),
        fault_text: sections.has_faults.then(|| format::format_faults(fields)),
        progress: if sections.has_progress_bar { progress(fields) } else { None },
    }
}

/// Niveau absent => 0 (critique) ; niveau non numérique => pas de mise à jour.
fn progress(fields: &Fields) -> Option<Progress> {
    let percent = match fields.get("battery_level") {
        None => 0.0,
        Some(Value::Number(n)) => n.as_f64()?,
        Some(_) => return None,
    };
    Some(Progress { percent, text: percent_text(percent), color: ColorClass::for_level(percent) })
}

pub fn system_model(fields: &Fields) -> SystemDisplayModel {
    let cpu_percent = number_or_zero(fields, "cpu_usage");
    let memory_percent = number_or_zero(fields, "memory_usage");
    let fan_rpm = fields.get("fan_rpm").and_then(Value::as_i64);
    let fan_load_percent = fields.get("fan_load").and_then(Value::as_i64);

    SystemDisplayModel {
        cpu_percent,
        cpu_text: percent_text(cpu_percent),
        memory_percent,
        memory_text: percent_text(memory_percent),
        fan_rpm,
        fan_rpm_text: fan_rpm_text(fan_rpm),
        fan_load_percent,
        fan_load_text: fan_load_text(fan_load_percent),
        power_channel_rows: format::format_power_channels(fields.get("power_channels")),
    }
}

fn number_or_zero(fields: &Fields, key: &str) -> f64 {
    fields.get(key).and_then(Value::as_f64).unwrap_or_default()
}
