use crate::models::{Fields, SourceId, TelemetryRecord};
use serde_json::{json, Value};

/// Destination d'un message après classification.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Source batterie : le record entier est fusionné dans cette source.
    Source(SourceId),
    /// Métriques système : seuls les champs dérivés vont dans la source `System`.
    System(Fields),
    /// Combinaison device/type inconnue, aucune mutation.
    Ignored,
}

/// Fonction pure, ne peut pas échouer.
pub fn classify(record: &TelemetryRecord) -> Route {
    match record.device.as_str() {
        "Battery" => Route::Source(match record.kind.as_str() {
            "INA238" => SourceId::Ina238,
            "DalyBMS" => SourceId::DalyBms,
            _ => SourceId::BatteryMonitor,
        }),
        "BatteryStatus" => Route::Source(SourceId::UnifiedBattery),
        "CPU" => system(&[("cpu_usage", field_or(record, "usage", json!(0)))]),
        "Memory" => system(&[("memory_usage", field_or(record, "usage", json!(0)))]),
        "Fan" => system(&[
            ("fan_rpm", field_or(record, "rpm", json!(0))),
            ("fan_load", field_or(record, "load", json!(0))),
        ]),
        "SystemPower" => system(&[("power_channels", field_or(record, "channels", json!([])))]),
        _ => Route::Ignored,
    }
}

fn field_or(record: &TelemetryRecord, key: &str, default: Value) -> Value {
    record.fields.get(key).cloned().unwrap_or(default)
}

fn system(pairs: &[(&str, Value)]) -> Route {
    Route::System(
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;

    fn route(payload: &str) -> Route {
        classify(&decode(payload.as_bytes()).unwrap())
    }

    #[test]
    fn battery_subtypes() {
        assert_eq!(route(r#"{"device":"Battery","type":"INA238"}"#), Route::Source(SourceId::Ina238));
        assert_eq!(route(r#"{"device":"Battery","type":"DalyBMS"}"#), Route::Source(SourceId::DalyBms));
        assert_eq!(route(r#"{"device":"Battery","type":"INA219"}"#), Route::Source(SourceId::BatteryMonitor));
        assert_eq!(route(r#"{"device":"Battery"}"#), Route::Source(SourceId::BatteryMonitor));
        assert_eq!(route(r#"{"device":"BatteryStatus","type":"x"}"#), Route::Source(SourceId::UnifiedBattery));
    }

    #[test]
    fn daly_ignores_field_content() {
        for extra in [r#""cells":[]"#, r#""voltage":"n/a""#, r#""device_name":"Battery""#, r#""type2":"INA238""#] {
            let payload = format!(r#"{{"device":"Battery","type":"DalyBMS",{extra}}}"#);
            assert_eq!(route(&payload), Route::Source(SourceId::DalyBms));
        }
    }

    #[test]
    fn system_metrics_are_projected() {
        let Route::System(fields) = route(r#"{"device":"Fan","rpm":1200,"load":40}"#) else {
            panic!("fan should route to system");
        };
        assert_eq!(fields["fan_rpm"], json!(1200));
        assert_eq!(fields["fan_load"], json!(40));
        assert!(!fields.contains_key("device"));

        let Route::System(fields) = route(r#"{"device":"SystemPower","chip":"INA3221"}"#) else {
            panic!("power should route to system");
        };
        assert_eq!(fields["power_channels"], json!([]));
    }

    #[test]
    fn unknown_devices_are_ignored() {
        assert_eq!(route(r#"{"device":"BatteryHealth"}"#), Route::Ignored);
        assert_eq!(route(r#"{"usage":10}"#), Route::Ignored);
    }
}
