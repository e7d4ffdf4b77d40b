/**
 * SCHÉMA D'AFFICHAGE - Quelles lignes montrer pour une source
 *
 * RÔLE : Dérive, à chaque tick, la liste ordonnée des lignes (label, clé, unité,
 * règle de format) à partir des seules clés présentes dans l'état de la source.
 *
 * FONCTIONNEMENT :
 * - 4 lignes de base toujours présentes (tension, courant, puissance, niveau)
 * - lignes conditionnelles dans un ordre fixe, chacune déclenchée par une clé
 * - blocs spécifiques Daly BMS / Unified Battery choisis par l'identifiant
 * - sections optionnelles (cellules, températures, défauts) via les flags sticky
 *
 * Aucun état caché : même (source, clés, flags) => même schéma.
 */

use crate::models::{Fields, SourceId, StickySections};
use serde::Serialize;

/// Règle de formatage, dérivée de la clé du champ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FormatRule {
    /// Nombre à n décimales
    Fixed(usize),
    /// Niveau batterie : 1 décimale + couleur à trois paliers
    Level,
    /// Texte coloré selon l'état de charge
    ChargingState,
    /// Liste `sources` jointe par ", ", repli sur `sources_str`
    SourceList,
    Plain,
}

impl FormatRule {
    pub fn for_key(key: &str) -> Self {
        match key {
            "voltage" | "current" | "power" => FormatRule::Fixed(2),
            "temperature" => FormatRule::Fixed(1),
            "battery_level" => FormatRule::Level,
            "vmax" | "vmin" | "vdelta" | "battery_nominal_voltage" => FormatRule::Fixed(3),
            "remaining_capacity_mah" => FormatRule::Fixed(0),
            "charging_state" => FormatRule::ChargingState,
            "sources_str" | "sources" => FormatRule::SourceList,
            _ => FormatRule::Plain,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub label: &'static str,
    pub key: &'static str,
    pub unit: &'static str,
    pub rule: FormatRule,
}

impl FieldDescriptor {
    fn new(&(label, key, unit): &Row) -> Self {
        Self { label, key, unit, rule: FormatRule::for_key(key) }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SectionFlags {
    pub has_cells: bool,
    pub has_temperatures: bool,
    pub has_faults: bool,
    pub has_progress_bar: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplaySchema {
    pub fields: Vec<FieldDescriptor>,
    pub sections: SectionFlags,
}

impl DisplaySchema {
    #[cfg(test)]
    pub fn contains(&self, key: &str) -> bool {
        self.fields.iter().any(|f| f.key == key)
    }
}

type Row = (&'static str, &'static str, &'static str);

/// Groupe de lignes ajouté si `trigger` est présent (toujours si `None`).
struct Gate {
    trigger: Option<&'static str>,
    rows: &'static [Row],
}

const fn gate(trigger: &'static str, rows: &'static [Row]) -> Gate {
    Gate { trigger: Some(trigger), rows }
}

const BASE_ROWS: &[Row] = &[
    ("Voltage", "voltage", "V"),
    ("Current", "current", "A"),
    ("Power", "power", "W"),
    ("Battery Level", "battery_level", "%"),
];

const COMMON_GATES: &[Gate] = &[
    gate("battery_status", &[("Status", "battery_status", "")]),
    gate("time_remaining_fmt", &[("Time Remaining", "time_remaining_fmt", "")]),
    gate("temperature", &[("Temperature", "temperature", "°C")]),
    gate("battery_chemistry", &[("Chemistry", "battery_chemistry", "")]),
];

const DALY_GATES: &[Gate] = &[
    gate("charge_fet", &[("Charge FET", "charge_fet", ""), ("Discharge FET", "discharge_fet", "")]),
    gate("charging_state", &[("State", "charging_state", "")]),
    gate("cycles", &[("Cycles", "cycles", "")]),
    gate("remaining_capacity_mah", &[("Remaining", "remaining_capacity_mah", "mAh")]),
    gate("vmax", &[("Cell Vmax", "vmax", "V"), ("Cell Vmin", "vmin", "V")]),
    gate("vdelta", &[("Voltage Delta", "vdelta", "V")]),
    gate("tmax", &[("Temp Max", "tmax", "°C"), ("Temp Min", "tmin", "°C")]),
    gate("charger_present", &[("Charger Present", "charger_present", ""), ("Load Present", "load_present", "")]),
];

const UNIFIED_GATES: &[Gate] = &[
    Gate { trigger: None, rows: &[("Data Sources", "sources_str", "")] },
    gate("status_reason", &[("Status Reason", "status_reason", "")]),
    gate("critical_fault_count", &[
        ("Critical Faults", "critical_fault_count", ""),
        ("Warning Faults", "warning_fault_count", ""),
    ]),
    gate("battery_cells_series", &[
        ("Cells (Series)", "battery_cells_series", ""),
        ("Cells (Parallel)", "battery_cells_parallel", ""),
    ]),
    gate("battery_nominal_voltage", &[("Nominal Voltage", "battery_nominal_voltage", "V")]),
    gate("charging_state", &[("State", "charging_state", "")]),
];

fn source_gates(id: SourceId) -> &'static [Gate] {
    match id {
        SourceId::DalyBms => DALY_GATES,
        SourceId::UnifiedBattery => UNIFIED_GATES,
        _ => &[],
    }
}

pub fn infer_schema(id: SourceId, fields: &Fields, sticky: StickySections) -> DisplaySchema {
    let gated = COMMON_GATES
        .iter()
        .chain(source_gates(id))
        .filter(|g| g.trigger.map_or(true, |key| fields.contains_key(key)))
        .flat_map(|g| g.rows.iter());

    let fields: Vec<FieldDescriptor> = BASE_ROWS.iter().chain(gated).map(FieldDescriptor::new).collect();
    let has_progress_bar = fields.iter().any(|f| f.key == "battery_level");

    DisplaySchema {
        fields,
        sections: SectionFlags {
            has_cells: sticky.cells,
            has_temperatures: sticky.temperatures,
            has_faults: sticky.faults,
            has_progress_bar,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn keys(schema: &DisplaySchema) -> Vec<&'static str> {
        schema.fields.iter().map(|f| f.key).collect()
    }

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn base_rows_always_present() {
        let schema = infer_schema(SourceId::Ina238, &Fields::new(), StickySections::default());
        assert_eq!(keys(&schema), ["voltage", "current", "power", "battery_level"]);
        assert!(schema.sections.has_progress_bar);
        assert!(!schema.sections.has_cells);
    }

    #[test]
    fn common_rows_follow_fixed_order() {
        let data = fields(json!({"battery_chemistry": "LiFePO4", "temperature": 24.0, "battery_status": "Discharging"}));
        let schema = infer_schema(SourceId::Ina238, &data, StickySections::default());
        assert_eq!(&keys(&schema)[4..], ["battery_status", "temperature", "battery_chemistry"]);
    }

    #[test]
    fn daly_rows_are_gated_in_pairs() {
        let data = fields(json!({"charge_fet": true, "vmax": 3.35, "cycles": 12, "tmax": 30}));
        let schema = infer_schema(SourceId::DalyBms, &data, StickySections::default());
        assert_eq!(
            &keys(&schema)[4..],
            ["charge_fet", "discharge_fet", "cycles", "vmax", "vmin", "tmax", "tmin"]
        );
    }

    #[test]
    fn bms_rows_only_for_daly() {
        let data = fields(json!({"charge_fet": true, "cycles": 12}));
        let schema = infer_schema(SourceId::BatteryMonitor, &data, StickySections::default());
        assert!(!schema.contains("charge_fet"));
        assert!(!schema.contains("sources_str"));
    }

    #[test]
    fn unified_always_shows_sources() {
        let schema = infer_schema(SourceId::UnifiedBattery, &Fields::new(), StickySections::default());
        assert_eq!(&keys(&schema)[4..], ["sources_str"]);

        let data = fields(json!({"critical_fault_count": 0, "charging_state": "idle", "battery_nominal_voltage": 51.2}));
        let schema = infer_schema(SourceId::UnifiedBattery, &data, StickySections::default());
        assert_eq!(
            &keys(&schema)[4..],
            ["sources_str", "critical_fault_count", "warning_fault_count", "battery_nominal_voltage", "charging_state"]
        );
    }

    #[test]
    fn sections_mirror_sticky_flags() {
        let sticky = StickySections { cells: true, temperatures: false, faults: true };
        let schema = infer_schema(SourceId::DalyBms, &Fields::new(), sticky);
        assert!(schema.sections.has_cells);
        assert!(!schema.sections.has_temperatures);
        assert!(schema.sections.has_faults);
    }

    #[test]
    fn rules_by_key() {
        assert_eq!(FormatRule::for_key("power"), FormatRule::Fixed(2));
        assert_eq!(FormatRule::for_key("vdelta"), FormatRule::Fixed(3));
        assert_eq!(FormatRule::for_key("remaining_capacity_mah"), FormatRule::Fixed(0));
        assert_eq!(FormatRule::for_key("cycles"), FormatRule::Plain);
    }
}
