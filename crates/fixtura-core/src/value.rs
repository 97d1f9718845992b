use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::ColumnType;

/// Column name to value mapping for one row.
pub type Row = BTreeMap<String, Value>;

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A single column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Binary(Vec<u8>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, whitespace-only text and empty binary count as blank.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(value) => value.trim().is_empty(),
            Value::Binary(value) => value.is_empty(),
            _ => false,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Canonical comparison key. Numerically equal ints and floats share a key.
    pub fn key(&self) -> String {
        match self {
            Value::Null => "<null>".to_string(),
            Value::Bool(value) => value.to_string(),
            Value::Int(value) => value.to_string(),
            Value::Float(value) => {
                if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                    (*value as i64).to_string()
                } else {
                    value.to_string()
                }
            }
            Value::Text(value) => value.clone(),
            Value::Date(value) => value.format(DATE_FORMAT).to_string(),
            Value::DateTime(value) => value.format(DATETIME_FORMAT).to_string(),
            Value::Binary(value) => value.iter().map(|byte| format!("{byte:02x}")).collect(),
        }
    }

    /// Loose equality used by matching predicates and validation checks.
    pub fn same_as(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,
            _ => self.key() == other.key(),
        }
    }

    /// Compare against a JSON literal taken from a registry or config document.
    pub fn matches_json(&self, json: &serde_json::Value) -> bool {
        match Value::from_json(json) {
            Some(other) => self.same_as(&other),
            None => false,
        }
    }

    /// Convert a JSON scalar. Arrays and objects have no scalar form.
    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        match json {
            serde_json::Value::Null => Some(Value::Null),
            serde_json::Value::Bool(value) => Some(Value::Bool(*value)),
            serde_json::Value::Number(number) => number
                .as_i64()
                .map(Value::Int)
                .or_else(|| number.as_f64().map(Value::Float)),
            serde_json::Value::String(value) => Some(Value::Text(value.clone())),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(value) => serde_json::Value::Bool(*value),
            Value::Int(value) => serde_json::Value::from(*value),
            Value::Float(value) => serde_json::Number::from_f64(*value)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(value) => serde_json::Value::String(value.clone()),
            Value::Date(_) | Value::DateTime(_) => serde_json::Value::String(self.key()),
            Value::Binary(value) => serde_json::Value::from(value.clone()),
        }
    }

    /// Convert the value into the representation used by `column_type`.
    pub fn coerce(self, field: &str, column_type: ColumnType) -> Result<Value> {
        let invalid = |value: &Value| Error::InvalidValue {
            field: field.to_string(),
            column_type: column_type.to_string(),
            value: value.to_string(),
        };

        let coerced = match (column_type, self) {
            (_, Value::Null) => Value::Null,
            (ColumnType::String | ColumnType::Text, Value::Binary(bytes)) => {
                return Err(invalid(&Value::Binary(bytes)));
            }
            (ColumnType::String | ColumnType::Text, Value::Text(value)) => Value::Text(value),
            (ColumnType::String | ColumnType::Text, other) => Value::Text(other.to_string()),
            (ColumnType::Integer, Value::Int(value)) => Value::Int(value),
            (ColumnType::Integer, Value::Float(value)) if value.fract() == 0.0 => {
                Value::Int(value as i64)
            }
            (ColumnType::Integer, Value::Text(value)) => match value.trim().parse::<i64>() {
                Ok(parsed) => Value::Int(parsed),
                Err(_) => return Err(invalid(&Value::Text(value))),
            },
            (ColumnType::Float, Value::Float(value)) => Value::Float(value),
            (ColumnType::Float, Value::Int(value)) => Value::Float(value as f64),
            (ColumnType::Float, Value::Text(value)) => match value.trim().parse::<f64>() {
                Ok(parsed) => Value::Float(parsed),
                Err(_) => return Err(invalid(&Value::Text(value))),
            },
            (ColumnType::Boolean, Value::Bool(value)) => Value::Bool(value),
            (ColumnType::Boolean, Value::Int(value)) if value == 0 || value == 1 => {
                Value::Bool(value == 1)
            }
            (ColumnType::Boolean, Value::Text(value)) => match value.trim() {
                "true" | "t" | "1" => Value::Bool(true),
                "false" | "f" | "0" => Value::Bool(false),
                _ => return Err(invalid(&Value::Text(value))),
            },
            (ColumnType::Date, Value::Date(value)) => Value::Date(value),
            (ColumnType::Date, Value::DateTime(value)) => Value::Date(value.date()),
            (ColumnType::Date, Value::Text(value)) => {
                match NaiveDate::parse_from_str(value.trim(), DATE_FORMAT) {
                    Ok(parsed) => Value::Date(parsed),
                    Err(_) => return Err(invalid(&Value::Text(value))),
                }
            }
            (ColumnType::Datetime, Value::DateTime(value)) => Value::DateTime(value),
            (ColumnType::Datetime, Value::Date(value)) => {
                Value::DateTime(NaiveDateTime::new(value, NaiveTime::MIN))
            }
            (ColumnType::Datetime, Value::Text(value)) => match parse_datetime(value.trim()) {
                Some(parsed) => Value::DateTime(parsed),
                None => return Err(invalid(&Value::Text(value))),
            },
            (ColumnType::Binary, Value::Binary(value)) => Value::Binary(value),
            (ColumnType::Binary, Value::Text(value)) => Value::Binary(value.into_bytes()),
            (_, other) => return Err(invalid(&other)),
        };

        Ok(coerced)
    }
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .ok()
                .map(|date| NaiveDateTime::new(date, NaiveTime::MIN))
        })
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("nil"),
            Value::Float(value) => write!(f, "{value}"),
            other => f.write_str(&other.key()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Value::Date(value)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(value: NaiveDateTime) -> Self {
        Value::DateTime(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerces_text_into_dates() {
        let value = Value::from("2024-03-01")
            .coerce("aired_on", ColumnType::Date)
            .expect("coerce date");
        assert_eq!(
            value,
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
    }

    #[test]
    fn rejects_text_that_is_not_an_integer() {
        let result = Value::from("twelve").coerce("episodes", ColumnType::Integer);
        assert!(matches!(result, Err(Error::InvalidValue { .. })));
    }

    #[test]
    fn ints_and_whole_floats_compare_equal() {
        assert!(Value::Int(3).same_as(&Value::Float(3.0)));
        assert!(!Value::Int(3).same_as(&Value::Float(3.5)));
        assert!(!Value::Null.same_as(&Value::from("")));
    }

    #[test]
    fn blank_covers_whitespace_text() {
        assert!(Value::from("  ").is_blank());
        assert!(Value::Null.is_blank());
        assert!(!Value::Int(0).is_blank());
    }

    #[test]
    fn matches_json_literals() {
        assert!(Value::from("paid").matches_json(&serde_json::json!("paid")));
        assert!(Value::Int(2).matches_json(&serde_json::json!(2)));
        assert!(!Value::Int(2).matches_json(&serde_json::json!([2])));
    }
}
