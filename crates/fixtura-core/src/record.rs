use serde::Serialize;

use crate::value::{Row, Value};

/// A persisted row of a model, identified by its integer primary key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub model: String,
    pub id: i64,
    /// All column values, primary key included.
    pub attributes: Row,
}

impl Record {
    pub fn new(model: impl Into<String>, id: i64, attributes: Row) -> Self {
        Self {
            model: model.into(),
            id,
            attributes,
        }
    }

    pub fn get(&self, column: &str) -> &Value {
        self.attributes.get(column).unwrap_or(&Value::Null)
    }

    /// Same model and primary key, regardless of loaded attribute values.
    pub fn is_same(&self, other: &Record) -> bool {
        self.model == other.model && self.id == other.id
    }

    pub fn id_value(&self) -> Value {
        Value::Int(self.id)
    }
}
