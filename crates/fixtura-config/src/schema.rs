use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::errors::Result;
use crate::model::SamplerConfig;

/// Emit the JSON Schema for configuration documents.
pub fn config_json_schema() -> RootSchema {
    schema_for!(SamplerConfig)
}

/// The configuration JSON Schema as a JSON value, ready for compilation.
pub fn config_json_schema_value() -> Result<serde_json::Value> {
    Ok(serde_json::to_value(config_json_schema())?)
}
