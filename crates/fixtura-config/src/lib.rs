//! Per-model sampling configuration: contracts, loading and validation.

pub mod errors;
pub mod load;
pub mod model;
pub mod schema;
pub mod validate;

pub use errors::{ConfigError, IssueSeverity, Result, ValidationIssue, ValidationReport};
pub use load::{ConfigFormat, load_config, parse_config_document};
pub use model::{CONFIG_VERSION, ModelConfig, SamplerConfig, SamplerOptions};
pub use schema::{config_json_schema, config_json_schema_value};
pub use validate::{
    ValidatedConfig, validate_config, validate_config_against_registry, validate_config_json,
};
