// Lenient decoding of form values.
//
// Parameters arrive the way a web form would submit them: numbers may be JSON
// numbers or strings with thousands separators ("250,000"), blank strings mean
// "not provided", and checkboxes may be booleans or "on"/"yes"/"true" strings.
// These helpers plug into serde via `deserialize_with`.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use shared::utils::parse_loose_number;

fn number_from_value<E: serde::de::Error>(value: Value) -> Result<Option<f64>, E> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64().filter(|v| v.is_finite())),
        Value::String(s) => {
            if s.trim().is_empty() {
                return Ok(None);
            }
            // A non-numeric string is kept as NaN so validation can name the field.
            Ok(Some(parse_loose_number(&s).unwrap_or(f64::NAN)))
        }
        other => Err(E::custom(format!("expected a number, found {}", other))),
    }
}

/// `Option<f64>` field: number, loose numeric string, blank or null.
pub fn optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?.unwrap_or(Value::Null);
    number_from_value(value)
}

/// `Option<bool>` field: bool, checkbox-style string, blank or null.
pub fn optional_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?.unwrap_or(Value::Null);
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b)),
        Value::Number(n) => Ok(Some(n.as_f64().map(|v| v != 0.0).unwrap_or(false))),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" => Ok(None),
            "true" | "on" | "yes" | "1" | "checked" => Ok(Some(true)),
            "false" | "off" | "no" | "0" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!("expected a yes/no value, found '{}'", other))),
        },
        other => Err(serde::de::Error::custom(format!("expected a yes/no value, found {}", other))),
    }
}

/// `Option<String>` field: trimmed, blank collapses to `None`. Numbers are accepted as text.
pub fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?.unwrap_or(Value::Null);
    match value {
        Value::Null => Ok(None),
        Value::String(s) => {
            let trimmed = s.trim();
            Ok(if trimmed.is_empty() { None } else { Some(trimmed.to_string()) })
        }
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(serde::de::Error::custom(format!("expected text, found {}", other))),
    }
}

/// List field given either as a JSON array or as one comma-separated string.
/// Blank entries are dropped.
pub fn text_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?.unwrap_or(Value::Null);
    let items: Vec<String> = match value {
        Value::Null => Vec::new(),
        Value::String(s) => s.split(',').map(|p| p.trim().to_string()).collect(),
        Value::Array(values) => values
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
        other => return Err(serde::de::Error::custom(format!("expected a list, found {}", other))),
    };
    Ok(items.into_iter().filter(|s| !s.is_empty()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "optional_number")]
        amount: Option<f64>,
        #[serde(default, deserialize_with = "optional_flag")]
        compare: Option<bool>,
        #[serde(default, deserialize_with = "optional_text")]
        name: Option<String>,
        #[serde(default, deserialize_with = "text_list")]
        holidays: Vec<String>,
    }

    fn parse(json: &str) -> Sample {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_numbers_accept_loose_strings() {
        assert_eq!(parse(r#"{"amount": "250,000"}"#).amount, Some(250000.0));
        assert_eq!(parse(r#"{"amount": 12.5}"#).amount, Some(12.5));
        assert_eq!(parse(r#"{"amount": "  "}"#).amount, None);
        assert_eq!(parse(r#"{"amount": null}"#).amount, None);
        assert_eq!(parse(r#"{}"#).amount, None);
        assert!(parse(r#"{"amount": "twelve"}"#).amount.unwrap().is_nan());
    }

    #[test]
    fn test_flags_and_text() {
        let s = parse(r#"{"compare": "on", "name": "  Visa  "}"#);
        assert_eq!(s.compare, Some(true));
        assert_eq!(s.name.as_deref(), Some("Visa"));
        assert_eq!(parse(r#"{"compare": false, "name": ""}"#).compare, Some(false));
        assert_eq!(parse(r#"{"name": ""}"#).name, None);
        assert!(serde_json::from_str::<Sample>(r#"{"compare": "maybe"}"#).is_err());
    }

    #[test]
    fn test_text_list_forms() {
        assert_eq!(
            parse(r#"{"holidays": "2025-12-25, 2026-01-01,,"}"#).holidays,
            vec!["2025-12-25", "2026-01-01"]
        );
        assert_eq!(parse(r#"{"holidays": ["2025-12-25", " "]}"#).holidays, vec!["2025-12-25"]);
        assert!(parse(r#"{}"#).holidays.is_empty());
    }
}
