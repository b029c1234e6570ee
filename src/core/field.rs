//! Field value types and schema coercion

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// A polymorphic field value that can hold different types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    DateTime(DateTime<Utc>),
    String(String),
}

impl FieldValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Render the value as text, used for LIKE matching and string filters
    pub fn to_text(&self) -> String {
        match self {
            FieldValue::Null => String::new(),
            FieldValue::Boolean(b) => if *b { "1" } else { "0" }.to_string(),
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::DateTime(dt) => format_datetime(dt),
            FieldValue::String(s) => s.clone(),
        }
    }

    /// Compare two values of compatible kinds
    ///
    /// Numbers compare numerically across integer/float, everything else
    /// falls back to a textual comparison. Null sorts first.
    pub fn compare(&self, other: &FieldValue) -> Ordering {
        match (self, other) {
            (FieldValue::Null, FieldValue::Null) => Ordering::Equal,
            (FieldValue::Null, _) => Ordering::Less,
            (_, FieldValue::Null) => Ordering::Greater,
            (FieldValue::Integer(a), FieldValue::Integer(b)) => a.cmp(b),
            (FieldValue::DateTime(a), FieldValue::DateTime(b)) => a.cmp(b),
            (FieldValue::Boolean(a), FieldValue::Boolean(b)) => a.cmp(b),
            (a, b) => match (a.as_f64(), b.as_f64()) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => a.to_text().cmp(&b.to_text()),
            },
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// Datetimes are rendered the way the CRM database stores them
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Declared type of a module field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Integer,
    Float,
    Boolean,
    DateTime,
}

impl FieldType {
    /// Convert an incoming JSON value into a typed field value
    ///
    /// Strings are accepted for every type and parsed, since form-style
    /// clients send everything as text. `null` is always accepted.
    pub fn coerce(&self, field: &str, value: &Value) -> Result<FieldValue, String> {
        if value.is_null() {
            return Ok(FieldValue::Null);
        }

        match self {
            FieldType::String => match value {
                Value::String(s) => Ok(FieldValue::String(s.clone())),
                Value::Number(n) => Ok(FieldValue::String(n.to_string())),
                Value::Bool(b) => Ok(FieldValue::String(b.to_string())),
                _ => Err(format!("expected a string for '{}'", field)),
            },
            FieldType::Integer => match value {
                Value::Number(n) => n
                    .as_i64()
                    .map(FieldValue::Integer)
                    .ok_or_else(|| format!("expected an integer for '{}'", field)),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(FieldValue::Integer)
                    .map_err(|_| format!("expected an integer for '{}'", field)),
                _ => Err(format!("expected an integer for '{}'", field)),
            },
            FieldType::Float => match value {
                Value::Number(n) => n
                    .as_f64()
                    .map(FieldValue::Float)
                    .ok_or_else(|| format!("expected a number for '{}'", field)),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(FieldValue::Float)
                    .map_err(|_| format!("expected a number for '{}'", field)),
                _ => Err(format!("expected a number for '{}'", field)),
            },
            FieldType::Boolean => match value {
                Value::Bool(b) => Ok(FieldValue::Boolean(*b)),
                Value::Number(n) => Ok(FieldValue::Boolean(n.as_i64() != Some(0))),
                Value::String(s) => match s.trim() {
                    "1" | "true" | "on" | "yes" => Ok(FieldValue::Boolean(true)),
                    "0" | "false" | "off" | "no" | "" => Ok(FieldValue::Boolean(false)),
                    _ => Err(format!("expected a boolean for '{}'", field)),
                },
                _ => Err(format!("expected a boolean for '{}'", field)),
            },
            FieldType::DateTime => match value {
                Value::String(s) => parse_datetime(s.trim())
                    .map(FieldValue::DateTime)
                    .ok_or_else(|| format!("expected a datetime for '{}'", field)),
                _ => Err(format!("expected a datetime for '{}'", field)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_value_null() {
        let value = FieldValue::String("test".to_string());
        assert!(!value.is_null());
        assert!(FieldValue::Null.is_null());
    }

    #[test]
    fn test_coerce_string() {
        assert_eq!(
            FieldType::String.coerce("name", &json!("Acme")).unwrap(),
            FieldValue::String("Acme".into())
        );
        assert_eq!(
            FieldType::String.coerce("name", &json!(12)).unwrap(),
            FieldValue::String("12".into())
        );
        assert!(FieldType::String.coerce("name", &json!([1])).is_err());
    }

    #[test]
    fn test_coerce_integer_from_text() {
        assert_eq!(
            FieldType::Integer.coerce("employees", &json!("250")).unwrap(),
            FieldValue::Integer(250)
        );
        assert!(FieldType::Integer.coerce("employees", &json!("many")).is_err());
        assert!(FieldType::Integer.coerce("employees", &json!(1.5)).is_err());
    }

    #[test]
    fn test_coerce_boolean() {
        assert_eq!(
            FieldType::Boolean.coerce("do_not_call", &json!("1")).unwrap(),
            FieldValue::Boolean(true)
        );
        assert_eq!(
            FieldType::Boolean.coerce("do_not_call", &json!(0)).unwrap(),
            FieldValue::Boolean(false)
        );
        assert!(FieldType::Boolean.coerce("do_not_call", &json!("maybe")).is_err());
    }

    #[test]
    fn test_coerce_datetime_formats() {
        let a = FieldType::DateTime
            .coerce("date_entered", &json!("2024-03-01 10:00:00"))
            .unwrap();
        let b = FieldType::DateTime
            .coerce("date_entered", &json!("2024-03-01T10:00:00Z"))
            .unwrap();
        assert_eq!(a, b);
        assert!(FieldType::DateTime.coerce("date_entered", &json!("yesterday")).is_err());
    }

    #[test]
    fn test_null_accepted_for_every_type() {
        for ty in [
            FieldType::String,
            FieldType::Integer,
            FieldType::Float,
            FieldType::Boolean,
            FieldType::DateTime,
        ] {
            assert_eq!(ty.coerce("x", &Value::Null).unwrap(), FieldValue::Null);
        }
    }

    #[test]
    fn test_compare_mixed_numbers() {
        assert_eq!(
            FieldValue::Integer(2).compare(&FieldValue::Float(2.5)),
            Ordering::Less
        );
        assert_eq!(
            FieldValue::Null.compare(&FieldValue::String("a".into())),
            Ordering::Less
        );
    }

    #[test]
    fn test_datetime_serializes_untagged() {
        let dt = parse_datetime("2024-03-01 10:00:00").unwrap();
        let json = serde_json::to_value(FieldValue::DateTime(dt)).unwrap();
        assert!(json.as_str().unwrap().starts_with("2024-03-01T10:00:00"));
    }
}
