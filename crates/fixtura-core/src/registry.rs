use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::REGISTRY_VERSION;
use crate::constraints::Validation;
use crate::error::{Error, Result};
use crate::schema::{Association, Column, ModelMetadata};

/// Explicit set of model descriptors, built once and passed to every sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelRegistry {
    /// Contract version for serialized registries.
    pub registry_version: String,
    pub models: Vec<ModelMetadata>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            registry_version: REGISTRY_VERSION.to_string(),
            models: Vec::new(),
        }
    }

    /// Add a model, replacing any previous descriptor with the same name.
    pub fn register(&mut self, mut model: ModelMetadata) -> &mut Self {
        model.normalize();
        self.models.retain(|existing| existing.name != model.name);
        self.models.push(model);
        self
    }

    pub fn with_model(mut self, model: ModelMetadata) -> Self {
        self.register(model);
        self
    }

    pub fn model(&self, name: &str) -> Option<&ModelMetadata> {
        self.models.iter().find(|model| model.name == name)
    }

    pub fn require(&self, name: &str) -> Result<&ModelMetadata> {
        self.model(name)
            .ok_or_else(|| Error::UnknownModel(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.model(name).is_some()
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(|model| model.name.as_str())
    }

    /// Fill conventional key names on every association.
    pub fn normalize(&mut self) {
        for model in &mut self.models {
            model.normalize();
        }
    }

    /// Parse a registry snapshot and normalize it.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut registry: ModelRegistry = serde_json::from_str(json)
            .map_err(|err| Error::InvalidSchema(format!("registry json: {err}")))?;
        registry.normalize();
        Ok(registry)
    }
}

/// Queryable schema and validation metadata.
pub trait MetadataSource {
    fn columns(&self, model: &str) -> Result<&[Column]>;
    fn associations(&self, model: &str) -> Result<&[Association]>;
    fn validations_for(&self, model: &str, field: &str) -> Result<&[Validation]>;
}

impl MetadataSource for ModelRegistry {
    fn columns(&self, model: &str) -> Result<&[Column]> {
        Ok(self.require(model)?.columns.as_slice())
    }

    fn associations(&self, model: &str) -> Result<&[Association]> {
        Ok(self.require(model)?.associations.as_slice())
    }

    fn validations_for(&self, model: &str, field: &str) -> Result<&[Validation]> {
        Ok(self.require(model)?.validations_for(field))
    }
}
