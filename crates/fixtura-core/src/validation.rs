use std::collections::BTreeSet;

use crate::constraints::ValidationRule;
use crate::error::{Error, Result};
use crate::registry::ModelRegistry;
use crate::schema::AssociationKind;

/// Validate internal consistency of a model registry.
///
/// This checks:
/// - duplicate models/columns/associations
/// - primary key and foreign key columns exist
/// - association targets and join models are registered
/// - every validation is keyed by a column or association
/// - uniqueness scope fields exist
pub fn validate_registry(registry: &ModelRegistry) -> Result<()> {
    let mut names = BTreeSet::new();
    for model in &registry.models {
        if !names.insert(model.name.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "duplicate model name: {}",
                model.name
            )));
        }
    }

    for model in &registry.models {
        let mut columns = BTreeSet::new();
        for column in &model.columns {
            if !columns.insert(column.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate column name: {}.{}",
                    model.name, column.name
                )));
            }
        }

        if !columns.contains(model.primary_key.as_str()) {
            return Err(Error::InvalidSchema(format!(
                "primary key column not found: {}.{}",
                model.name, model.primary_key
            )));
        }

        let mut associations = BTreeSet::new();
        for association in &model.associations {
            if !associations.insert(association.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate association name: {}.{}",
                    model.name, association.name
                )));
            }

            if let Some(target) = &association.target
                && !names.contains(target.as_str())
            {
                return Err(Error::InvalidSchema(format!(
                    "association target not registered: {}.{} -> {}",
                    model.name, association.name, target
                )));
            }

            match association.kind {
                AssociationKind::BelongsTo => {
                    let foreign_key = association.foreign_key().ok_or_else(|| {
                        Error::InvalidSchema(format!(
                            "belongs_to without foreign key: {}.{}",
                            model.name, association.name
                        ))
                    })?;
                    if !columns.contains(foreign_key) {
                        return Err(Error::InvalidSchema(format!(
                            "foreign key column not found: {}.{}",
                            model.name, foreign_key
                        )));
                    }
                    if association.polymorphic {
                        let type_column =
                            association.foreign_type.as_deref().unwrap_or_default();
                        if !columns.contains(type_column) {
                            return Err(Error::InvalidSchema(format!(
                                "polymorphic type column not found: {}.{}",
                                model.name, type_column
                            )));
                        }
                        for candidate in &association.polymorphic_targets {
                            if !names.contains(candidate.as_str()) {
                                return Err(Error::InvalidSchema(format!(
                                    "polymorphic target not registered: {}.{} -> {}",
                                    model.name, association.name, candidate
                                )));
                            }
                        }
                    } else if association.target.is_none() {
                        return Err(Error::InvalidSchema(format!(
                            "belongs_to without target: {}.{}",
                            model.name, association.name
                        )));
                    }
                }
                AssociationKind::HasMany => {
                    let target = association.target.as_deref().unwrap_or_default();
                    let foreign_key = association.foreign_key().unwrap_or_default();
                    let has_key = registry
                        .model(target)
                        .is_some_and(|target| target.column(foreign_key).is_some());
                    if !has_key {
                        return Err(Error::InvalidSchema(format!(
                            "has_many foreign key not found: {}.{}",
                            target, foreign_key
                        )));
                    }
                }
                AssociationKind::HasManyThrough => {
                    let through = association.through.as_deref().unwrap_or_default();
                    let join = registry.model(through).ok_or_else(|| {
                        Error::InvalidSchema(format!(
                            "through model not registered: {}.{} -> {}",
                            model.name, association.name, through
                        ))
                    })?;
                    for key in [association.foreign_key(), association.source_key.as_deref()] {
                        let key = key.unwrap_or_default();
                        if join.column(key).is_none() {
                            return Err(Error::InvalidSchema(format!(
                                "through key column not found: {}.{}",
                                join.name, key
                            )));
                        }
                    }
                }
            }
        }

        for (field, validations) in &model.validations {
            let known =
                columns.contains(field.as_str()) || associations.contains(field.as_str());
            for validation in validations {
                if !known {
                    return Err(Error::MissingInterceptionPoint {
                        model: model.name.clone(),
                        field: field.clone(),
                        rule: validation.rule.name().to_string(),
                    });
                }
                if let ValidationRule::Uniqueness { scope } = &validation.rule {
                    for scoped in scope {
                        if !columns.contains(scoped.as_str()) {
                            return Err(Error::InvalidSchema(format!(
                                "uniqueness scope column not found: {}.{}",
                                model.name, scoped
                            )));
                        }
                    }
                }
                if let Some(condition) = &validation.condition
                    && !columns.contains(condition.field())
                {
                    return Err(Error::InvalidSchema(format!(
                        "condition column not found: {}.{}",
                        model.name,
                        condition.field()
                    )));
                }
            }
        }
    }

    Ok(())
}
