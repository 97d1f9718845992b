use thiserror::Error;

/// Core error type shared across Fixtura crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The registry violates internal invariants.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A model name is not present in the registry.
    #[error("unknown model: {0}")]
    UnknownModel(String),
    /// A validation rule is keyed by a field the model does not have.
    #[error("no column or association '{field}' on '{model}' to attach a {rule} validation")]
    MissingInterceptionPoint {
        model: String,
        field: String,
        rule: String,
    },
    /// A value cannot be represented as the column type.
    #[error("cannot convert {value} to {column_type} for '{field}'")]
    InvalidValue {
        field: String,
        column_type: String,
        value: String,
    },
    /// A requested feature is not yet supported.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Convenience alias for results returned by Fixtura crates.
pub type Result<T> = std::result::Result<T, Error>;
