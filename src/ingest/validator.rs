//! Turns a raw sensor message into a measurement triple or a rejection.
//!
//! Expected payload (JSON object, extra keys ignored):
//!
//! ```json
//! { "suhu": 27.4, "humidity": 61.0, "lux": 412 }
//! ```
//!
//! | Key        | Measurement  |
//! |------------|--------------|
//! | `suhu`     | temperature  |
//! | `humidity` | humidity     |
//! | `lux`      | illuminance  |
//!
//! Values may be JSON numbers, numeric strings or booleans (`true` → 1.0).
//! No plausibility range is enforced.

use serde_json::{Map, Value};

pub const TEMPERATURE_KEY: &str = "suhu";
pub const HUMIDITY_KEY: &str = "humidity";
pub const ILLUMINANCE_KEY: &str = "lux";

const REQUIRED_KEYS: [&str; 3] = [TEMPERATURE_KEY, HUMIDITY_KEY, ILLUMINANCE_KEY];

/// The three coerced values of an accepted payload. The subscriber attaches
/// the acceptance timestamp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub temperature: f64,
    pub humidity: f64,
    pub illuminance: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RejectReason {
    #[error("payload is not a JSON object: {0}")]
    MalformedPayload(String),
    #[error("payload is missing required keys: {}", .missing.join(", "))]
    IncompleteReading { missing: Vec<&'static str> },
    #[error("value of {field:?} is not a number: {value}")]
    InvalidMeasurement { field: &'static str, value: String },
}

/// Decodes and validates one message body.
pub fn validate(payload: &[u8]) -> Result<Measurement, RejectReason> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| RejectReason::MalformedPayload(e.to_string()))?;

    let fields = match value {
        Value::Object(fields) => fields,
        other => {
            return Err(RejectReason::MalformedPayload(format!(
                "expected an object, got {}",
                kind_of(&other)
            )))
        }
    };

    // Presence first, so a payload missing a key is always reported as
    // incomplete even if another key holds garbage.
    let missing: Vec<&'static str> = REQUIRED_KEYS
        .into_iter()
        .filter(|key| !fields.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(RejectReason::IncompleteReading { missing });
    }

    Ok(Measurement {
        temperature: coerce(&fields, TEMPERATURE_KEY)?,
        humidity: coerce(&fields, HUMIDITY_KEY)?,
        illuminance: coerce(&fields, ILLUMINANCE_KEY)?,
    })
}

fn coerce(fields: &Map<String, Value>, field: &'static str) -> Result<f64, RejectReason> {
    let value = &fields[field];
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    };

    match number {
        Some(n) if n.is_finite() => Ok(n),
        _ => Err(RejectReason::InvalidMeasurement {
            field,
            value: value.to_string(),
        }),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_numeric_payload() {
        let m = validate(br#"{"suhu": 27.4, "humidity": 61, "lux": 412.75}"#).unwrap();
        assert_eq!(
            m,
            Measurement {
                temperature: 27.4,
                humidity: 61.0,
                illuminance: 412.75,
            }
        );
    }

    #[test]
    fn ignores_extra_keys() {
        let m = validate(br#"{"suhu": 1, "humidity": 2, "lux": 3, "device": "esp32"}"#).unwrap();
        assert_eq!(m.illuminance, 3.0);
    }

    #[test]
    fn coerces_numeric_strings_and_booleans() {
        let m = validate(br#"{"suhu": " 26.5 ", "humidity": "-3", "lux": true}"#).unwrap();
        assert_eq!(m.temperature, 26.5);
        assert_eq!(m.humidity, -3.0);
        assert_eq!(m.illuminance, 1.0);
    }

    #[test]
    fn invalid_json_is_malformed() {
        let err = validate(b"suhu=27").unwrap_err();
        assert!(matches!(err, RejectReason::MalformedPayload(_)));
    }

    #[test]
    fn non_utf8_is_malformed() {
        let err = validate(&[0xff, 0xfe, 0x00]).unwrap_err();
        assert!(matches!(err, RejectReason::MalformedPayload(_)));
    }

    #[test]
    fn non_object_is_malformed() {
        let err = validate(b"[27.4, 61, 412]").unwrap_err();
        assert_eq!(
            err,
            RejectReason::MalformedPayload("expected an object, got an array".into())
        );
    }

    #[test]
    fn missing_key_is_incomplete() {
        let err = validate(br#"{"suhu": 27.4, "humidity": 61}"#).unwrap_err();
        assert_eq!(err, RejectReason::IncompleteReading { missing: vec!["lux"] });
    }

    #[test]
    fn incomplete_reports_every_missing_key() {
        let err = validate(br#"{"temperature": 27.4}"#).unwrap_err();
        assert_eq!(
            err,
            RejectReason::IncompleteReading {
                missing: vec!["suhu", "humidity", "lux"],
            }
        );
        assert_eq!(
            err.to_string(),
            "payload is missing required keys: suhu, humidity, lux"
        );
    }

    #[test]
    fn presence_checked_before_type() {
        let err = validate(br#"{"suhu": "hot", "humidity": 61}"#).unwrap_err();
        assert!(matches!(err, RejectReason::IncompleteReading { .. }));
    }

    #[test]
    fn null_value_is_invalid_measurement() {
        let err = validate(br#"{"suhu": 27.4, "humidity": null, "lux": 5}"#).unwrap_err();
        assert_eq!(
            err,
            RejectReason::InvalidMeasurement {
                field: "humidity",
                value: "null".into(),
            }
        );
    }

    #[test]
    fn non_numeric_string_is_invalid_measurement() {
        let err = validate(br#"{"suhu": "hot", "humidity": 61, "lux": 5}"#).unwrap_err();
        assert!(matches!(
            err,
            RejectReason::InvalidMeasurement { field: "suhu", .. }
        ));
    }

    #[test]
    fn non_finite_string_is_invalid_measurement() {
        let err = validate(br#"{"suhu": 20, "humidity": 61, "lux": "NaN"}"#).unwrap_err();
        assert!(matches!(
            err,
            RejectReason::InvalidMeasurement { field: "lux", .. }
        ));
        let err = validate(br#"{"suhu": "inf", "humidity": 61, "lux": 1}"#).unwrap_err();
        assert!(matches!(
            err,
            RejectReason::InvalidMeasurement { field: "suhu", .. }
        ));
    }
}
