use std::fmt;

use fixtura_core::{Record, Row, Value};
use serde::Serialize;
use thiserror::Error;

use crate::query::Predicate;

/// A single rule violation reported by persistence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub field: String,
    pub rule: String,
    pub message: String,
    pub value: Value,
}

impl Violation {
    pub fn new(
        field: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
        value: Value,
    ) -> Self {
        Self {
            field: field.into(),
            rule: rule.into(),
            message: message.into(),
            value,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (got {})", self.field, self.message, self.value)
    }
}

/// Errors raised by a persistence backend.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("{model} rejected: {} violation(s)", .violations.len())]
    Validation {
        model: String,
        violations: Vec<Violation>,
    },
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("{model} #{id} not found")]
    NotFound { model: String, id: i64 },
    #[error("{0}")]
    Backend(String),
}

/// Storage collaborator driven by the sampler.
///
/// Reads never mutate. Writes enforce the model's validation rules and
/// report violations through [`PersistenceError::Validation`].
pub trait Persistence {
    fn count(&self, model: &str, predicate: &Predicate) -> Result<usize, PersistenceError>;

    fn find_first(
        &self,
        model: &str,
        predicate: &Predicate,
    ) -> Result<Option<Record>, PersistenceError>;

    fn reload(&self, model: &str, id: i64) -> Result<Option<Record>, PersistenceError>;

    fn insert(&mut self, model: &str, attributes: &Row) -> Result<Record, PersistenceError>;

    fn update(&mut self, record: &Record, attributes: &Row) -> Result<Record, PersistenceError>;

    fn delete(&mut self, model: &str, id: i64) -> Result<bool, PersistenceError>;

    fn exists(&self, model: &str, predicate: &Predicate) -> Result<bool, PersistenceError> {
        Ok(self.find_first(model, predicate)?.is_some())
    }
}
