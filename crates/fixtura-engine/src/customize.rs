use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use fixtura_config::SamplerConfig;
use fixtura_core::{Row, Value};

use crate::errors::SampleError;
use crate::persistence::Persistence;
use crate::request::{AttrValue, Attributes, NormalizedAttributes};

/// Row about to be written, as seen by a before-save hook.
#[derive(Debug, Clone, PartialEq)]
pub struct Draft {
    pub model: String,
    pub attributes: Row,
}

impl Draft {
    pub fn get(&self, column: &str) -> &Value {
        self.attributes.get(column).unwrap_or(&Value::Null)
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(column.into(), value.into());
    }
}

/// Hook run before each save of a sampled record. Receives the draft, the
/// caller's normalized attributes and read/write access to persistence.
pub type BeforeSave = Arc<
    dyn Fn(&mut Draft, &NormalizedAttributes, &mut dyn Persistence) -> Result<(), SampleError>
        + Send
        + Sync,
>;

/// A configured default, fixed or computed on each use.
#[derive(Clone)]
pub enum DefaultValue {
    Static(AttrValue),
    Lazy(Arc<dyn Fn() -> AttrValue + Send + Sync>),
}

impl DefaultValue {
    pub fn evaluate(&self) -> AttrValue {
        match self {
            DefaultValue::Static(value) => value.clone(),
            DefaultValue::Lazy(produce) => produce(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(value) => f.debug_tuple("Static").field(value).finish(),
            DefaultValue::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// Registered customizations for one model.
#[derive(Clone, Default)]
pub struct ModelCustomization {
    pub defaults: BTreeMap<String, DefaultValue>,
    pub force_on_create: Vec<String>,
    pub force_unique: Vec<String>,
    pub polymorphic_defaults: BTreeMap<String, String>,
    pub presets: BTreeMap<String, Attributes>,
    pub before_save: Option<BeforeSave>,
}

impl ModelCustomization {
    pub fn default_value(
        &mut self,
        field: impl Into<String>,
        value: impl Into<AttrValue>,
    ) -> &mut Self {
        self.defaults
            .insert(field.into(), DefaultValue::Static(value.into()));
        self
    }

    pub fn lazy_default<F>(&mut self, field: impl Into<String>, produce: F) -> &mut Self
    where
        F: Fn() -> AttrValue + Send + Sync + 'static,
    {
        self.defaults
            .insert(field.into(), DefaultValue::Lazy(Arc::new(produce)));
        self
    }

    pub fn force_on_create(&mut self, association: impl Into<String>) -> &mut Self {
        self.force_on_create.push(association.into());
        self
    }

    pub fn force_unique(&mut self, column: impl Into<String>) -> &mut Self {
        self.force_unique.push(column.into());
        self
    }

    pub fn polymorphic_default(
        &mut self,
        association: impl Into<String>,
        model: impl Into<String>,
    ) -> &mut Self {
        self.polymorphic_defaults
            .insert(association.into(), model.into());
        self
    }

    pub fn preset(&mut self, name: impl Into<String>, attributes: Attributes) -> &mut Self {
        self.presets.insert(name.into(), attributes);
        self
    }

    pub fn before_save<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut Draft, &NormalizedAttributes, &mut dyn Persistence) -> Result<(), SampleError>
            + Send
            + Sync
            + 'static,
    {
        self.before_save = Some(Arc::new(hook));
        self
    }

    pub fn is_forced_unique(&self, column: &str) -> bool {
        self.force_unique.iter().any(|forced| forced == column)
    }
}

impl fmt::Debug for ModelCustomization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCustomization")
            .field("defaults", &self.defaults)
            .field("force_on_create", &self.force_on_create)
            .field("force_unique", &self.force_unique)
            .field("polymorphic_defaults", &self.polymorphic_defaults)
            .field("presets", &self.presets.keys().collect::<Vec<_>>())
            .field("before_save", &self.before_save.is_some())
            .finish()
    }
}

/// Customizations for every model, keyed by model name.
#[derive(Debug, Clone, Default)]
pub struct Customizations {
    models: BTreeMap<String, ModelCustomization>,
}

impl Customizations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, model: &str) -> Option<&ModelCustomization> {
        self.models.get(model)
    }

    pub fn model_mut(&mut self, model: &str) -> &mut ModelCustomization {
        self.models.entry(model.to_string()).or_default()
    }

    /// Build customizations from a configuration document.
    pub fn from_config(config: &SamplerConfig) -> Result<Self, SampleError> {
        let mut customizations = Self::new();

        for model_config in &config.models {
            let model = model_config.model.as_str();
            let customization = customizations.model_mut(model);

            for (field, json) in &model_config.defaults {
                let value = convert(model, field, json)?;
                customization.default_value(field.clone(), value);
            }
            for (name, attributes) in &model_config.presets {
                let mut preset = Attributes::new();
                for (field, json) in attributes {
                    preset.insert(field.clone(), convert(model, field, json)?);
                }
                customization.preset(name.clone(), preset);
            }
            customization
                .force_on_create
                .extend(model_config.force_on_create.iter().cloned());
            customization
                .force_unique
                .extend(model_config.force_unique.iter().cloned());
            customization
                .polymorphic_defaults
                .extend(model_config.polymorphic_defaults.clone());
        }

        Ok(customizations)
    }
}

fn convert(model: &str, field: &str, json: &serde_json::Value) -> Result<AttrValue, SampleError> {
    AttrValue::from_json(json).ok_or_else(|| SampleError::InvalidAttribute {
        model: model.to_string(),
        field: field.to_string(),
        message: format!("unsupported literal {json}"),
    })
}
