use crate::models::TelemetryRecord;
use serde_json::Value;

/// Payload rejeté : le message est abandonné, jamais propagé à la boucle d'ingestion.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("invalid JSON: {0}")]
    Syntax(#[from] serde_json::Error),
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

pub fn decode(payload: &[u8]) -> Result<TelemetryRecord, DecodeError> {
    let text = std::str::from_utf8(payload)?;
    match serde_json::from_str::<Value>(text)? {
        Value::Object(fields) => {
            let device = string_field(&fields, "device");
            let kind = string_field(&fields, "type");
            Ok(TelemetryRecord { device, kind, fields })
        }
        other => Err(DecodeError::NotAnObject(json_kind(&other))),
    }
}

fn string_field(fields: &serde_json::Map<String, Value>, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_routing_fields() {
        let rec = decode(br#"{"device":"Battery","type":"DalyBMS","voltage":53.2}"#).unwrap();
        assert_eq!(rec.device, "Battery");
        assert_eq!(rec.kind, "DalyBMS");
        assert_eq!(rec.fields["voltage"], serde_json::json!(53.2));
    }

    #[test]
    fn missing_type_is_empty() {
        let rec = decode(br#"{"device":"CPU","usage":12}"#).unwrap();
        assert_eq!(rec.kind, "");
    }

    #[test]
    fn rejects_malformed_payloads() {
        assert!(matches!(decode(b"{\"device\":"), Err(DecodeError::Syntax(_))));
        assert!(matches!(decode(&[0xff, 0xfe]), Err(DecodeError::Utf8(_))));
        assert!(matches!(decode(b"[1,2]"), Err(DecodeError::NotAnObject("array"))));
    }
}
