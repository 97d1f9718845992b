use fixtura_config::ConfigError;
use thiserror::Error;

use crate::persistence::{PersistenceError, Violation};

/// Errors emitted by the sampling engine.
#[derive(Debug, Error)]
pub enum SampleError {
    /// Persistence rejected a draft or backfilled row.
    #[error("validation failed for {model}: {}", describe(.violations))]
    ValidationFailure {
        model: String,
        violations: Vec<Violation>,
    },
    /// A positional record matches more than one association.
    #[error("{target} matches several associations on {model}: {}", .candidates.join(", "))]
    AmbiguousAssociationTarget {
        model: String,
        target: String,
        candidates: Vec<String>,
    },
    /// No value policy exists for the column type.
    #[error("no value policy for {model}.{field} ({column_type})")]
    UnresolvableFieldPolicy {
        model: String,
        field: String,
        column_type: String,
    },
    /// A validation is keyed to a field the model does not declare.
    #[error("cannot attach validation to {model}.{field}: no such column or association")]
    MissingValidationInterceptionPoint { model: String, field: String },
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("unknown field {model}.{field}")]
    UnknownField { model: String, field: String },
    #[error("unknown preset '{preset}' for {model}")]
    UnknownPreset { model: String, preset: String },
    #[error("invalid attribute {model}.{field}: {message}")]
    InvalidAttribute {
        model: String,
        field: String,
        message: String,
    },
    #[error("no target model available for polymorphic {model}.{association}")]
    NoPolymorphicTarget { model: String, association: String },
    /// Uniqueness retries hit the configured bound.
    #[error("no unique value for {model}.{field} after {attempts} attempts")]
    UniquenessExhausted {
        model: String,
        field: String,
        attempts: u64,
    },
    #[error("{model} #{id} not found")]
    RecordNotFound { model: String, id: i64 },
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("before_save hook failed for {model}: {message}")]
    Hook { model: String, message: String },
    #[error("logging setup failed: {0}")]
    Logging(String),
    #[error(transparent)]
    Core(fixtura_core::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

fn describe(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<fixtura_core::Error> for SampleError {
    fn from(err: fixtura_core::Error) -> Self {
        match err {
            fixtura_core::Error::MissingInterceptionPoint { model, field, .. } => {
                SampleError::MissingValidationInterceptionPoint { model, field }
            }
            fixtura_core::Error::UnknownModel(model) => SampleError::UnknownModel(model),
            other => SampleError::Core(other),
        }
    }
}

impl From<PersistenceError> for SampleError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Validation { model, violations } => {
                SampleError::ValidationFailure { model, violations }
            }
            PersistenceError::UnknownModel(model) => SampleError::UnknownModel(model),
            PersistenceError::NotFound { model, id } => SampleError::RecordNotFound { model, id },
            PersistenceError::Backend(message) => SampleError::Persistence(message),
        }
    }
}
