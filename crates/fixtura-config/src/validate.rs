use std::collections::BTreeSet;

use fixtura_core::{AssociationKind, ModelMetadata, ModelRegistry};
use jsonschema::JSONSchema;
use serde_json::Value;

use crate::errors::{ConfigError, ValidationIssue, ValidationReport};
use crate::model::{CONFIG_VERSION, ModelConfig, SamplerConfig};

/// Validated configuration with accumulated warnings.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub config: SamplerConfig,
    pub warnings: Vec<ValidationIssue>,
}

/// Validate a configuration JSON document against the configuration JSON Schema.
pub fn validate_config_json(
    config_json: &Value,
    config_schema: &Value,
) -> Result<ValidationReport, ConfigError> {
    let compiled =
        JSONSchema::compile(config_schema).map_err(|err| ConfigError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();

    if let Err(errors) = compiled.validate(config_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push(ValidationIssue::error(
                "schema_violation",
                path,
                error.to_string(),
                None,
            ));
        }
    }

    Ok(report)
}

/// Validate a parsed configuration against a model registry.
pub fn validate_config_against_registry(
    config: &SamplerConfig,
    registry: &ModelRegistry,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    if config.config_version != CONFIG_VERSION {
        report.push(ValidationIssue::warning(
            "config_version_mismatch",
            "/config_version",
            format!(
                "config_version '{}' differs from supported '{}'",
                config.config_version, CONFIG_VERSION
            ),
            None,
        ));
    }

    if config.options.email_domain.trim().is_empty() {
        report.push(ValidationIssue::error(
            "email_domain_empty",
            "/options/email_domain",
            "email_domain must not be empty",
            None,
        ));
    }

    if config.options.max_unique_attempts == Some(0) {
        report.push(ValidationIssue::error(
            "max_unique_attempts_zero",
            "/options/max_unique_attempts",
            "max_unique_attempts must be greater than zero",
            Some("omit the option or set it to a positive integer".to_string()),
        ));
    }

    let mut seen = BTreeSet::new();
    for (idx, model_config) in config.models.iter().enumerate() {
        let base_path = format!("/models/{idx}");
        if !seen.insert(model_config.model.as_str()) {
            report.push(ValidationIssue::error(
                "duplicate_model",
                base_path.clone(),
                format!("model '{}' is configured more than once", model_config.model),
                Some("merge duplicate entries into one".to_string()),
            ));
        }

        let Some(model) = registry.model(&model_config.model) else {
            report.push(ValidationIssue::error(
                "unknown_model",
                format!("{base_path}/model"),
                format!("model '{}' is not registered", model_config.model),
                None,
            ));
            continue;
        };

        validate_defaults(model_config, model, &base_path, &mut report);
        validate_force_on_create(model_config, model, &base_path, &mut report);
        validate_force_unique(model_config, model, &base_path, &mut report);
        validate_polymorphic_defaults(model_config, model, registry, &base_path, &mut report);
        validate_presets(model_config, model, &base_path, &mut report);
    }

    report
}

/// Validate the configuration end-to-end, returning structured issues on failure.
pub fn validate_config(
    config_json: &Value,
    config_schema: &Value,
    registry: &ModelRegistry,
) -> Result<ValidatedConfig, ValidationReport> {
    let structural = match validate_config_json(config_json, config_schema) {
        Ok(report) => report,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push(ValidationIssue::error(
                "schema_validation_error",
                "/",
                err.to_string(),
                None,
            ));
            return Err(report);
        }
    };

    if !structural.is_ok() {
        return Err(structural);
    }

    let config: SamplerConfig = match serde_json::from_value(config_json.clone()) {
        Ok(config) => config,
        Err(err) => {
            let mut report = ValidationReport::default();
            report.push(ValidationIssue::error(
                "invalid_config_json",
                "/",
                err.to_string(),
                None,
            ));
            return Err(report);
        }
    };

    let registry_report = validate_config_against_registry(&config, registry);
    if !registry_report.is_ok() {
        return Err(registry_report);
    }

    Ok(ValidatedConfig {
        config,
        warnings: registry_report.warnings,
    })
}

fn is_field(model: &ModelMetadata, field: &str) -> bool {
    model.column(field).is_some() || model.association(field).is_some()
}

fn validate_defaults(
    config: &ModelConfig,
    model: &ModelMetadata,
    base_path: &str,
    report: &mut ValidationReport,
) {
    for (field, value) in &config.defaults {
        let path = format!("{base_path}/defaults/{field}");
        if !is_field(model, field) {
            report.push(ValidationIssue::error(
                "unknown_field",
                path,
                format!("'{}' has no column or association '{}'", model.name, field),
                None,
            ));
            continue;
        }

        if model.is_auto_managed(field) {
            report.push(ValidationIssue::warning(
                "auto_managed_default",
                path.clone(),
                format!("'{}.{}' is managed by persistence", model.name, field),
                Some("remove the default; it is overwritten on save".to_string()),
            ));
        }

        if let Some(association) = model.association(field) {
            let valid = match association.kind {
                AssociationKind::BelongsTo => value.is_object() || value.is_null(),
                AssociationKind::HasMany | AssociationKind::HasManyThrough => value
                    .as_array()
                    .is_some_and(|items| items.iter().all(Value::is_object)),
            };
            if !valid {
                report.push(ValidationIssue::error(
                    "invalid_association_default",
                    path,
                    format!(
                        "default for association '{}.{}' must be attributes of the target",
                        model.name, field
                    ),
                    Some("use an object for belongs_to, an array of objects for has_many".to_string()),
                ));
            }
        }
    }
}

fn validate_force_on_create(
    config: &ModelConfig,
    model: &ModelMetadata,
    base_path: &str,
    report: &mut ValidationReport,
) {
    for (idx, name) in config.force_on_create.iter().enumerate() {
        let path = format!("{base_path}/force_on_create/{idx}");
        match model.association(name) {
            Some(association) if association.is_belongs_to() && !association.polymorphic => {}
            Some(_) => report.push(ValidationIssue::error(
                "force_on_create_not_belongs_to",
                path,
                format!(
                    "'{}.{}' is not a non-polymorphic belongs_to association",
                    model.name, name
                ),
                None,
            )),
            None => report.push(ValidationIssue::error(
                "unknown_association",
                path,
                format!("'{}' has no association '{}'", model.name, name),
                None,
            )),
        }
    }
}

fn validate_force_unique(
    config: &ModelConfig,
    model: &ModelMetadata,
    base_path: &str,
    report: &mut ValidationReport,
) {
    for (idx, column) in config.force_unique.iter().enumerate() {
        let path = format!("{base_path}/force_unique/{idx}");
        if model.column(column).is_none() {
            report.push(ValidationIssue::error(
                "unknown_column",
                path,
                format!("'{}' has no column '{}'", model.name, column),
                None,
            ));
        } else if model.uniqueness_rule(column).is_some() {
            report.push(ValidationIssue::warning(
                "redundant_force_unique",
                path,
                format!("'{}.{}' already validates uniqueness", model.name, column),
                None,
            ));
        }
    }
}

fn validate_polymorphic_defaults(
    config: &ModelConfig,
    model: &ModelMetadata,
    registry: &ModelRegistry,
    base_path: &str,
    report: &mut ValidationReport,
) {
    for (name, target) in &config.polymorphic_defaults {
        let path = format!("{base_path}/polymorphic_defaults/{name}");
        match model.association(name) {
            Some(association) if association.polymorphic => {
                if !registry.contains(target) {
                    report.push(ValidationIssue::error(
                        "unknown_polymorphic_target",
                        path,
                        format!("polymorphic target '{target}' is not registered"),
                        None,
                    ));
                } else if !association.polymorphic_targets.is_empty()
                    && !association.polymorphic_targets.contains(target)
                {
                    report.push(ValidationIssue::warning(
                        "undeclared_polymorphic_target",
                        path,
                        format!(
                            "'{}' is not among the declared targets of '{}.{}'",
                            target, model.name, name
                        ),
                        None,
                    ));
                }
            }
            Some(_) => report.push(ValidationIssue::error(
                "not_polymorphic",
                path,
                format!("'{}.{}' is not polymorphic", model.name, name),
                None,
            )),
            None => report.push(ValidationIssue::error(
                "unknown_association",
                path,
                format!("'{}' has no association '{}'", model.name, name),
                None,
            )),
        }
    }
}

fn validate_presets(
    config: &ModelConfig,
    model: &ModelMetadata,
    base_path: &str,
    report: &mut ValidationReport,
) {
    for (preset, attributes) in &config.presets {
        for field in attributes.keys() {
            if !is_field(model, field) {
                report.push(ValidationIssue::error(
                    "unknown_preset_field",
                    format!("{base_path}/presets/{preset}/{field}"),
                    format!(
                        "preset '{}' sets unknown field '{}' on '{}'",
                        preset, field, model.name
                    ),
                    None,
                ));
            }
        }
    }
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixtura_core::{Association, ColumnType, Validation};

    fn registry() -> ModelRegistry {
        ModelRegistry::new()
            .with_model(ModelMetadata::new("Network").with_column("name", ColumnType::String))
            .with_model(
                ModelMetadata::new("Show")
                    .with_column("name", ColumnType::String)
                    .with_association(Association::belongs_to("network", "Network"))
                    .with_validation("name", Validation::uniqueness()),
            )
            .with_model(
                ModelMetadata::new("Bookmark")
                    .with_association(Association::polymorphic("bookmarkable", ["Show"])),
            )
    }

    #[test]
    fn reports_duplicate_and_unknown_models() {
        let config = SamplerConfig {
            models: vec![
                ModelConfig {
                    model: "Show".to_string(),
                    ..ModelConfig::default()
                },
                ModelConfig {
                    model: "Show".to_string(),
                    ..ModelConfig::default()
                },
                ModelConfig {
                    model: "Movie".to_string(),
                    ..ModelConfig::default()
                },
            ],
            ..SamplerConfig::default()
        };
        let report = validate_config_against_registry(&config, &registry());
        assert_eq!(report.codes(), vec!["duplicate_model", "unknown_model"]);
    }

    #[test]
    fn flags_association_misuse() {
        let mut show = ModelConfig {
            model: "Show".to_string(),
            force_on_create: vec!["name".to_string()],
            force_unique: vec!["name".to_string()],
            ..ModelConfig::default()
        };
        show.polymorphic_defaults
            .insert("network".to_string(), "Network".to_string());
        let mut bookmark = ModelConfig {
            model: "Bookmark".to_string(),
            ..ModelConfig::default()
        };
        bookmark
            .polymorphic_defaults
            .insert("bookmarkable".to_string(), "Network".to_string());

        let config = SamplerConfig {
            models: vec![show, bookmark],
            ..SamplerConfig::default()
        };
        let report = validate_config_against_registry(&config, &registry());
        assert_eq!(
            report.codes(),
            vec![
                "unknown_association",
                "not_polymorphic",
                "redundant_force_unique",
                "undeclared_polymorphic_target",
            ]
        );
    }

    #[test]
    fn belongs_to_default_must_be_attributes() {
        let mut show = ModelConfig {
            model: "Show".to_string(),
            ..ModelConfig::default()
        };
        show.defaults
            .insert("network".to_string(), serde_json::json!("HBO"));
        show.defaults
            .insert("id".to_string(), serde_json::json!(7));
        let config = SamplerConfig {
            models: vec![show],
            ..SamplerConfig::default()
        };
        let report = validate_config_against_registry(&config, &registry());
        assert_eq!(
            report.codes(),
            vec!["invalid_association_default", "auto_managed_default"]
        );
    }
}
