//! Lenient field decoders for hand-entered survey data.
//!
//! Historical records were written by several form versions, so the same
//! field may hold a string, a number or something unexpected. These
//! decoders never fail: a value of the wrong shape reads as absent.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::raw::Coordinate;

/// Decodes a text field. Numbers and booleans are rendered as text;
/// objects, arrays and `null` read as `None`.
///
/// # Errors
///
/// Only fails if the underlying deserializer cannot produce a JSON value.
pub fn text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    })
}

/// Decodes a coordinate field. `null` reads as absent; any other
/// non-numeric, non-string value is kept as [`Coordinate::Invalid`] so
/// that it still takes precedence over the `coordinates` string.
///
/// # Errors
///
/// Only fails if the underlying deserializer cannot produce a JSON value.
pub fn coordinate<'de, D>(deserializer: D) -> Result<Option<Coordinate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::Number(n) => Some(n.as_f64().map_or(Coordinate::Invalid, Coordinate::Number)),
        Value::String(s) => Some(Coordinate::Text(s)),
        Value::Bool(_) | Value::Array(_) | Value::Object(_) => Some(Coordinate::Invalid),
    })
}

/// Decodes a boolean flag. Only JSON booleans count.
///
/// # Errors
///
/// Only fails if the underlying deserializer cannot produce a JSON value.
pub fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value.as_bool())
}

/// Returns the first candidate that is present and not blank. Strings of
/// only whitespace count as blank, like `""`.
#[must_use]
pub fn first_non_empty<'a, I>(candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = Option<&'a String>>,
{
    candidates
        .into_iter()
        .flatten()
        .map(String::as_str)
        .find(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Fixture {
        #[serde(default, deserialize_with = "text")]
        label: Option<String>,
        #[serde(default, deserialize_with = "coordinate")]
        lat: Option<Coordinate>,
        #[serde(default, deserialize_with = "flag")]
        synced: Option<bool>,
    }

    fn decode(value: serde_json::Value) -> Fixture {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn text_accepts_scalars() {
        assert_eq!(decode(serde_json::json!({"label": "A"})).label.as_deref(), Some("A"));
        assert_eq!(decode(serde_json::json!({"label": 12})).label.as_deref(), Some("12"));
        assert_eq!(decode(serde_json::json!({"label": true})).label.as_deref(), Some("true"));
        assert!(decode(serde_json::json!({"label": {"x": 1}})).label.is_none());
        assert!(decode(serde_json::json!({})).label.is_none());
    }

    #[test]
    fn coordinate_keeps_shape() {
        assert_eq!(
            decode(serde_json::json!({"lat": -6.2})).lat,
            Some(Coordinate::Number(-6.2))
        );
        assert_eq!(
            decode(serde_json::json!({"lat": "-6.2"})).lat,
            Some(Coordinate::Text("-6.2".to_string()))
        );
        assert_eq!(
            decode(serde_json::json!({"lat": [1, 2]})).lat,
            Some(Coordinate::Invalid)
        );
        assert!(decode(serde_json::json!({"lat": null})).lat.is_none());
    }

    #[test]
    fn flag_requires_boolean() {
        assert_eq!(decode(serde_json::json!({"synced": true})).synced, Some(true));
        assert!(decode(serde_json::json!({"synced": "true"})).synced.is_none());
    }

    #[test]
    fn first_non_empty_skips_blank() {
        let empty = String::new();
        let blank = "  ".to_string();
        let value = "Plot A".to_string();
        assert_eq!(
            first_non_empty([None, Some(&empty), Some(&blank), Some(&value)]),
            Some("Plot A")
        );
        assert_eq!(first_non_empty([None, Some(&blank)]), None);
    }
}
