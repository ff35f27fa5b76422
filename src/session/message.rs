//! # Joystick Message Module
//!
//! Decodes inbound WebSocket text into an [`AxisSample`].
//!
//! ## Format
//!
//! ```json
//! {"x": 0.25, "y": -0.8}
//! ```
//!
//! - Missing or `null` axes read as `0.0`.
//! - Numeric strings such as `"0.5"` are accepted.
//! - Anything else (non-JSON, arrays, booleans, non-finite values) rejects
//!   the whole message.

use serde_json::{Map, Value};

use crate::error::{JoydriveError, Result};
use crate::motor::mixer::AxisSample;

/// Parses one joystick message.
///
/// # Examples
///
/// ```
/// use joydrive::session::message::parse_sample;
///
/// let sample = parse_sample(r#"{"x": 0.5}"#)?;
/// assert_eq!(sample.x, 0.5);
/// assert_eq!(sample.y, 0.0);
/// # Ok::<(), joydrive::error::JoydriveError>(())
/// ```
pub fn parse_sample(text: &str) -> Result<AxisSample> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| JoydriveError::Message(e.to_string()))?;

    let fields = value
        .as_object()
        .ok_or_else(|| JoydriveError::Message("expected a JSON object".to_string()))?;

    Ok(AxisSample::new(axis(fields, "x")?, axis(fields, "y")?))
}

fn axis(fields: &Map<String, Value>, key: &str) -> Result<f64> {
    let value = match fields.get(key) {
        None | Some(Value::Null) => return Ok(0.0),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    value
        .filter(|v| v.is_finite())
        .ok_or_else(|| JoydriveError::Message(format!("field '{}' is not a finite number", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_axes() {
        let sample = parse_sample(r#"{"x": 0.25, "y": -0.75}"#).unwrap();
        assert_eq!(sample, AxisSample::new(0.25, -0.75));
    }

    #[test]
    fn test_parse_integers() {
        let sample = parse_sample(r#"{"x": 1, "y": -1}"#).unwrap();
        assert_eq!(sample, AxisSample::new(1.0, -1.0));
    }

    #[test]
    fn test_missing_fields_default_to_zero() {
        assert_eq!(parse_sample("{}").unwrap(), AxisSample::default());
        assert_eq!(parse_sample(r#"{"y": 0.4}"#).unwrap(), AxisSample::new(0.0, 0.4));
    }

    #[test]
    fn test_null_fields_default_to_zero() {
        let sample = parse_sample(r#"{"x": null, "y": 0.1}"#).unwrap();
        assert_eq!(sample, AxisSample::new(0.0, 0.1));
    }

    #[test]
    fn test_numeric_strings_accepted() {
        let sample = parse_sample(r#"{"x": "0.5", "y": " -1 "}"#).unwrap();
        assert_eq!(sample, AxisSample::new(0.5, -1.0));
    }

    #[test]
    fn test_extra_fields_ignored() {
        let sample = parse_sample(r#"{"x": 0.1, "y": 0.2, "button": true}"#).unwrap();
        assert_eq!(sample, AxisSample::new(0.1, 0.2));
    }

    #[test]
    fn test_out_of_range_values_pass_through() {
        let sample = parse_sample(r#"{"x": 3.5, "y": -7}"#).unwrap();
        assert_eq!(sample, AxisSample::new(3.5, -7.0));
    }

    #[test]
    fn test_not_json_rejected() {
        assert!(matches!(parse_sample("hello"), Err(JoydriveError::Message(_))));
        assert!(matches!(parse_sample(""), Err(JoydriveError::Message(_))));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(parse_sample("[0.1, 0.2]").is_err());
        assert!(parse_sample("0.5").is_err());
        assert!(parse_sample("null").is_err());
    }

    #[test]
    fn test_non_numeric_field_rejected() {
        let err = parse_sample(r#"{"x": "left", "y": 0}"#).unwrap_err();
        assert!(err.to_string().contains("'x'"));

        assert!(parse_sample(r#"{"x": 0, "y": true}"#).is_err());
        assert!(parse_sample(r#"{"x": [1], "y": 0}"#).is_err());
        assert!(parse_sample(r#"{"x": {"v": 1}}"#).is_err());
    }

    #[test]
    fn test_non_finite_string_rejected() {
        assert!(parse_sample(r#"{"x": "NaN"}"#).is_err());
        assert!(parse_sample(r#"{"y": "inf"}"#).is_err());
    }
}
