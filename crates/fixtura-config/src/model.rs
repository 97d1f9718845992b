use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Current contract version for configuration documents.
pub const CONFIG_VERSION: &str = "0.1";

/// Root configuration document (`fixtura.toml` / `fixtura.json`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SamplerConfig {
    /// Contract version of this document.
    pub config_version: String,
    #[serde(default)]
    pub options: SamplerOptions,
    #[serde(default)]
    pub models: Vec<ModelConfig>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            config_version: CONFIG_VERSION.to_string(),
            options: SamplerOptions::default(),
            models: Vec::new(),
        }
    }
}

impl SamplerConfig {
    pub fn model(&self, name: &str) -> Option<&ModelConfig> {
        self.models.iter().find(|model| model.model == name)
    }
}

/// Knobs for value generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SamplerOptions {
    /// Upper bound on uniqueness retries per value; `None` retries forever.
    #[serde(default = "default_max_unique_attempts")]
    pub max_unique_attempts: Option<u64>,
    /// Anchor for generated dates and datetimes (`YYYY-MM-DDTHH:MM:SS`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(with = "Option<String>")]
    pub base_time: Option<NaiveDateTime>,
    #[serde(default = "default_email_domain")]
    pub email_domain: String,
    #[serde(default = "default_email_local")]
    pub email_local: String,
}

fn default_max_unique_attempts() -> Option<u64> {
    Some(10_000)
}

fn default_email_domain() -> String {
    "example.com".to_string()
}

fn default_email_local() -> String {
    "john.doe".to_string()
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            max_unique_attempts: default_max_unique_attempts(),
            base_time: None,
            email_domain: default_email_domain(),
            email_local: default_email_local(),
        }
    }
}

/// Registered customizations for one model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelConfig {
    /// Registered model name.
    pub model: String,
    /// Static defaults keyed by column or association. An object under a
    /// belongs-to association name holds attributes for sampling the target.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub defaults: BTreeMap<String, serde_json::Value>,
    /// Belongs-to associations resolved during the first pass.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub force_on_create: Vec<String>,
    /// Columns sampled as unique even without a uniqueness validation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub force_unique: Vec<String>,
    /// Target model per polymorphic association.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub polymorphic_defaults: BTreeMap<String, String>,
    /// Named attribute sets selectable per request.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub presets: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}
