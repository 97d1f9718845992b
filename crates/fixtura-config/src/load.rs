use std::fs;
use std::path::Path;

use fixtura_core::ModelRegistry;
use serde_json::Value;

use crate::errors::{ConfigError, Result};
use crate::schema::config_json_schema_value;
use crate::validate::{ValidatedConfig, validate_config};

/// Supported configuration document encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(ConfigFormat::Json),
            Some("toml") => Ok(ConfigFormat::Toml),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_string(),
            )),
        }
    }
}

/// Parse a configuration document into its JSON form.
pub fn parse_config_document(contents: &str, format: ConfigFormat) -> Result<Value> {
    let json: Value = match format {
        ConfigFormat::Json => serde_json::from_str(contents)?,
        ConfigFormat::Toml => toml::from_str(contents)?,
    };
    Ok(json)
}

/// Load and validate a configuration file against a registry.
pub fn load_config(path: &Path, registry: &ModelRegistry) -> Result<ValidatedConfig> {
    let format = ConfigFormat::from_path(path)?;
    let contents = fs::read_to_string(path)?;
    let json = parse_config_document(&contents, format)?;
    let schema = config_json_schema_value()?;
    validate_config(&json, &schema, registry).map_err(ConfigError::Invalid)
}
