use std::collections::{BTreeMap, BTreeSet};

use fixtura_core::{Association, ModelMetadata, Record, Row, ValidationRule, Value};
use tracing::debug;

use crate::errors::SampleError;
use crate::persistence::Persistence;
use crate::request::{FieldValue, NormalizedAttributes};
use crate::sampler::Sampler;
use crate::sequence::{Phase, ReferenceSource};

/// Attribute set for one creation request.
///
/// `required`, `suggested` and `proxied` never share a field: proxied
/// associations keep their key columns out of both rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedAttributes {
    /// Values the row needs to pass validation.
    pub required: Row,
    /// Defaults without a rule behind them.
    pub suggested: Row,
    /// Conditionally required associations left for after the first save.
    pub proxied: BTreeSet<String>,
    pub to_many: BTreeMap<String, Vec<Record>>,
    /// Columns set by the caller.
    pub specified: BTreeSet<String>,
    /// Columns set by configured defaults or force-on-create.
    pub configured: BTreeSet<String>,
}

impl ResolvedAttributes {
    /// Suggested values overlaid by required ones.
    pub fn draft(&self) -> Row {
        let mut row = self.suggested.clone();
        row.extend(self.required.clone());
        row
    }

    pub fn covers(&self, column: &str) -> bool {
        self.required.contains_key(column) || self.suggested.contains_key(column)
    }

    /// Covered through its name, its key column or the proxied set.
    pub fn covers_association(&self, association: &Association) -> bool {
        self.proxied.contains(&association.name)
            || self.to_many.contains_key(&association.name)
            || association
                .foreign_key()
                .is_some_and(|foreign_key| self.covers(foreign_key))
    }

    fn put(&mut self, column: &str, value: Value, required: bool) {
        if required {
            self.suggested.remove(column);
            self.required.insert(column.to_string(), value);
        } else {
            self.required.remove(column);
            self.suggested.insert(column.to_string(), value);
        }
    }

    fn put_reference(&mut self, association: &Association, record: Option<&Record>) {
        if let Some(foreign_key) = association.foreign_key() {
            let id = record.map(Record::id_value).unwrap_or(Value::Null);
            self.put(foreign_key, id, true);
        }
        if let Some(type_column) = &association.foreign_type {
            let model = record
                .map(|record| Value::Text(record.model.clone()))
                .unwrap_or(Value::Null);
            self.put(type_column, model, true);
        }
    }

    fn key_columns(association: &Association) -> impl Iterator<Item = &str> {
        association
            .foreign_key()
            .into_iter()
            .chain(association.foreign_type.as_deref())
    }
}

impl<P: Persistence> Sampler<P> {
    /// Merge caller attributes, configured defaults and inferred values.
    /// Earlier sources win; later ones only fill gaps.
    pub(crate) fn resolve(
        &mut self,
        meta: &ModelMetadata,
        attributes: &NormalizedAttributes,
    ) -> Result<ResolvedAttributes, SampleError> {
        let mut resolved = ResolvedAttributes::default();
        self.apply_custom(meta, attributes, &mut resolved)?;
        self.apply_configured(meta, &mut resolved)?;
        self.apply_inferred(meta, &mut resolved)?;

        debug!(
            model = %meta.name,
            required = resolved.required.len(),
            suggested = resolved.suggested.len(),
            proxied = ?resolved.proxied,
            "attributes resolved"
        );
        Ok(resolved)
    }

    fn apply_custom(
        &mut self,
        meta: &ModelMetadata,
        attributes: &NormalizedAttributes,
        resolved: &mut ResolvedAttributes,
    ) -> Result<(), SampleError> {
        for (field, value) in attributes {
            match value {
                FieldValue::Scalar(value) => {
                    resolved.put(field, value.clone(), true);
                    resolved.specified.insert(field.clone());
                }
                FieldValue::BelongsTo(record) => {
                    let association = meta.association(field).ok_or_else(|| {
                        SampleError::UnknownField {
                            model: meta.name.clone(),
                            field: field.clone(),
                        }
                    })?;
                    resolved.put_reference(association, record.as_ref());
                    resolved.specified.extend(
                        ResolvedAttributes::key_columns(association).map(ToString::to_string),
                    );
                }
                FieldValue::HasMany(records) => {
                    resolved.to_many.insert(field.clone(), records.clone());
                }
            }
        }
        Ok(())
    }

    fn apply_configured(
        &mut self,
        meta: &ModelMetadata,
        resolved: &mut ResolvedAttributes,
    ) -> Result<(), SampleError> {
        let Some(customization) = self.customizations.get(&meta.name).cloned() else {
            return Ok(());
        };

        for (field, default) in &customization.defaults {
            let covered = match meta.association(field) {
                Some(association) => resolved.covers_association(association),
                None => resolved.covers(field),
            };
            if covered {
                continue;
            }

            match self.normalize_field(meta, field, default.evaluate())? {
                FieldValue::Scalar(value) => {
                    let required = !meta.column_validations(field).is_empty()
                        || customization.is_forced_unique(field);
                    resolved.put(field, value, required);
                    resolved.configured.insert(field.clone());
                }
                FieldValue::BelongsTo(record) => {
                    if let Some(association) = meta.association(field) {
                        resolved.put_reference(association, record.as_ref());
                        resolved.configured.extend(
                            ResolvedAttributes::key_columns(association).map(ToString::to_string),
                        );
                    }
                }
                FieldValue::HasMany(records) => {
                    resolved.to_many.insert(field.clone(), records);
                }
            }
        }

        for name in &customization.force_on_create {
            let association = meta.association(name).ok_or_else(|| SampleError::UnknownField {
                model: meta.name.clone(),
                field: name.clone(),
            })?;
            if resolved.covers_association(association) {
                continue;
            }
            let target = match &association.target {
                Some(target) => target.clone(),
                None => self.polymorphic_target(meta, association)?,
            };
            let record = self.reference(&target)?;
            resolved.put_reference(association, record.as_ref());
            resolved
                .configured
                .extend(ResolvedAttributes::key_columns(association).map(ToString::to_string));
        }

        Ok(())
    }

    fn apply_inferred(
        &mut self,
        meta: &ModelMetadata,
        resolved: &mut ResolvedAttributes,
    ) -> Result<(), SampleError> {
        for column in resolution_order(meta) {
            if meta.is_auto_managed(column) || resolved.covers(column) {
                continue;
            }

            let Some(association) = meta.association_for_column(column) else {
                let row = resolved.draft();
                let value = self.next_value(meta, column, Phase::First, &row)?;
                let required = !meta.column_validations(column).is_empty()
                    || self
                        .customizations
                        .get(&meta.name)
                        .is_some_and(|customization| customization.is_forced_unique(column));
                resolved.put(column, value, required);
                continue;
            };

            if resolved.covers_association(association) {
                continue;
            }
            // Keys without a presence rule wait for the backfill pass.
            let Some(presence) = meta.presence_rule(association) else {
                continue;
            };
            let row = resolved.draft();
            if presence.is_conditional() && !presence.applies_to(&row) {
                resolved.proxied.insert(association.name.clone());
                continue;
            }

            if association.polymorphic {
                let target = self.polymorphic_target(meta, association)?;
                let record = self.reference(&target)?;
                resolved.put_reference(association, record.as_ref());
            } else if let Some(foreign_key) = association.foreign_key() {
                let value = self.next_value(meta, foreign_key, Phase::First, &row)?;
                resolved.put(foreign_key, value, true);
            }
        }
        Ok(())
    }
}

/// Columns in declaration order, with columns that other rules read
/// (uniqueness scopes and condition fields) moved to the front.
fn resolution_order(meta: &ModelMetadata) -> Vec<&str> {
    let mut referenced = BTreeSet::new();
    for validation in meta.validations.values().flatten() {
        if let ValidationRule::Uniqueness { scope } = &validation.rule {
            referenced.extend(scope.iter().map(String::as_str));
        }
        if let Some(condition) = &validation.condition {
            referenced.insert(condition.field());
        }
    }

    let (mut first, rest): (Vec<&str>, Vec<&str>) = meta
        .columns
        .iter()
        .map(|column| column.name.as_str())
        .partition(|name| referenced.contains(name));
    first.extend(rest);
    first
}
