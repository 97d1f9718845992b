//! Two-pass creation: insert with deferrable associations unset, then backfill.

use std::collections::BTreeSet;

use fixtura_core::{AssociationKind, ModelMetadata, Record, Row, Value};
use tracing::{debug, info};

use crate::customize::{BeforeSave, Draft};
use crate::errors::SampleError;
use crate::persistence::Persistence;
use crate::request::{NormalizedAttributes, SampleRequest};
use crate::resolver::ResolvedAttributes;
use crate::sampler::Sampler;
use crate::sequence::{Phase, ReferenceSource};

impl<P: Persistence> Sampler<P> {
    /// Resolve, insert and backfill one record of `meta`.
    pub(crate) fn create_record(
        &mut self,
        meta: &ModelMetadata,
        attributes: &NormalizedAttributes,
    ) -> Result<Record, SampleError> {
        self.in_flight.push(meta.name.clone());
        let result = self.run_pipeline(meta, attributes);
        self.in_flight.pop();
        result
    }

    fn run_pipeline(
        &mut self,
        meta: &ModelMetadata,
        attributes: &NormalizedAttributes,
    ) -> Result<Record, SampleError> {
        let resolved = self.resolve(meta, attributes)?;
        let hook = self
            .customizations
            .get(&meta.name)
            .and_then(|customization| customization.before_save.clone());
        let mut pending = resolved.proxied.clone();

        let row = self.draft_row(meta, &resolved)?;
        let mut draft = Draft {
            model: meta.name.clone(),
            attributes: row,
        };
        if let Some(hook) = &hook {
            hook(&mut draft, attributes, &mut self.store)?;
        }
        self.resolve_proxied(meta, &mut draft.attributes, &mut pending)?;

        let mut record = self.store.insert(&meta.name, &draft.attributes)?;
        info!(model = %meta.name, id = record.id, "record created");
        self.report.record_created(&meta.name);

        self.attach_to_many(meta, &record, &resolved)?;

        let mut row = record.attributes.clone();
        let mut changes = self.backfill(meta, &resolved, &pending, &mut row)?;
        changes.extend(self.resolve_proxied(meta, &mut row, &mut pending)?);
        if changes.is_empty() {
            return Ok(record);
        }

        if let Some(hook) = &hook {
            changes.extend(run_hook(hook, meta, &mut row, attributes, &mut self.store)?);
        }
        record = self.store.update(&record, &changes)?;
        info!(
            model = %meta.name,
            id = record.id,
            columns = ?changes.keys().collect::<Vec<_>>(),
            "associations backfilled"
        );
        self.report.record_backfilled(&meta.name);

        let mut row = record.attributes.clone();
        let late = self.resolve_proxied(meta, &mut row, &mut pending)?;
        if !late.is_empty() {
            record = self.store.update(&record, &late)?;
            debug!(
                model = %meta.name,
                id = record.id,
                "proxied associations resolved after backfill"
            );
        }
        Ok(record)
    }

    /// Resolved values plus first-pass values for every column still missing.
    fn draft_row(
        &mut self,
        meta: &ModelMetadata,
        resolved: &ResolvedAttributes,
    ) -> Result<Row, SampleError> {
        let mut row = resolved.draft();
        for column in &meta.columns {
            if meta.is_auto_managed(&column.name) || row.contains_key(&column.name) {
                continue;
            }
            let value = match meta.association_for_column(&column.name) {
                Some(association)
                    if association.polymorphic || resolved.proxied.contains(&association.name) =>
                {
                    Value::Null
                }
                _ => self.next_value(meta, &column.name, Phase::First, &row)?,
            };
            row.insert(column.name.clone(), value);
        }
        Ok(row)
    }

    /// Resolve pending proxied associations whose presence rule now fires on `row`.
    fn resolve_proxied(
        &mut self,
        meta: &ModelMetadata,
        row: &mut Row,
        pending: &mut BTreeSet<String>,
    ) -> Result<Row, SampleError> {
        let mut changes = Row::new();
        let names: Vec<String> = pending.iter().cloned().collect();

        for name in names {
            let Some(association) = meta.association(&name) else {
                pending.remove(&name);
                continue;
            };
            let Some(foreign_key) = association.foreign_key() else {
                pending.remove(&name);
                continue;
            };
            if !row.get(foreign_key).is_none_or(Value::is_null) {
                pending.remove(&name);
                continue;
            }
            let fires = match meta.presence_rule(association) {
                Some(rule) => rule.applies_to(row),
                None => false,
            };
            if !fires {
                continue;
            }

            if association.polymorphic {
                let target = self.polymorphic_target(meta, association)?;
                if let Some(record) = self.reference(&target)? {
                    changes.insert(foreign_key.to_string(), record.id_value());
                    if let Some(type_column) = &association.foreign_type {
                        changes.insert(type_column.clone(), Value::Text(record.model));
                    }
                }
            } else {
                let value = self.next_value(meta, foreign_key, Phase::First, row)?;
                changes.insert(foreign_key.to_string(), value);
            }
            debug!(model = %meta.name, association = %name, "proxied association resolved");
            pending.remove(&name);
        }

        row.extend(changes.clone());
        Ok(changes)
    }

    /// Point to-many overrides at the new record.
    fn attach_to_many(
        &mut self,
        meta: &ModelMetadata,
        record: &Record,
        resolved: &ResolvedAttributes,
    ) -> Result<(), SampleError> {
        for (name, targets) in &resolved.to_many {
            let Some(association) = meta.association(name) else {
                continue;
            };
            let Some(foreign_key) = association.foreign_key() else {
                continue;
            };

            match (&association.kind, &association.through, &association.source_key) {
                (AssociationKind::HasManyThrough, Some(through), Some(source_key)) => {
                    for target in targets {
                        let request = SampleRequest::new()
                            .set(foreign_key, record.id_value())
                            .set(source_key.clone(), target.id_value());
                        self.create_sample(through, request)?;
                    }
                }
                (AssociationKind::HasMany, _, _) => {
                    for target in targets {
                        let mut link = Row::new();
                        link.insert(foreign_key.to_string(), record.id_value());
                        self.store.update(target, &link)?;
                    }
                }
                _ => continue,
            }
            debug!(
                model = %meta.name,
                id = record.id,
                association = %name,
                count = targets.len(),
                "to-many association attached"
            );
        }
        Ok(())
    }

    /// Second-pass values for belongs-to keys left unset by the first insert.
    ///
    /// Keys set by the caller or by configuration are never touched, and
    /// proxied associations are handled separately.
    fn backfill(
        &mut self,
        meta: &ModelMetadata,
        resolved: &ResolvedAttributes,
        pending: &BTreeSet<String>,
        row: &mut Row,
    ) -> Result<Row, SampleError> {
        let mut changes = Row::new();

        for association in meta.belongs_to() {
            let Some(foreign_key) = association.foreign_key() else {
                continue;
            };
            if !row.get(foreign_key).is_none_or(Value::is_null)
                || resolved.specified.contains(foreign_key)
                || resolved.configured.contains(foreign_key)
                || pending.contains(&association.name)
                || resolved.proxied.contains(&association.name)
            {
                continue;
            }

            if association.polymorphic {
                let target = self.polymorphic_target(meta, association)?;
                let Some(record) = self.reference(&target)? else {
                    continue;
                };
                changes.insert(foreign_key.to_string(), record.id_value());
                if let Some(type_column) = &association.foreign_type {
                    changes.insert(type_column.clone(), Value::Text(record.model));
                }
            } else {
                let value = self.next_value(meta, foreign_key, Phase::Second, row)?;
                if value.is_null() {
                    continue;
                }
                changes.insert(foreign_key.to_string(), value);
            }
        }

        row.extend(changes.clone());
        Ok(changes)
    }
}

/// Run `hook` over `row` and return the columns it changed.
fn run_hook(
    hook: &BeforeSave,
    meta: &ModelMetadata,
    row: &mut Row,
    attributes: &NormalizedAttributes,
    store: &mut dyn Persistence,
) -> Result<Row, SampleError> {
    let mut draft = Draft {
        model: meta.name.clone(),
        attributes: row.clone(),
    };
    hook(&mut draft, attributes, store)?;

    let changed: Row = draft
        .attributes
        .iter()
        .filter(|(column, value)| row.get(*column) != Some(*value))
        .map(|(column, value)| (column.clone(), value.clone()))
        .collect();
    *row = draft.attributes;
    Ok(changed)
}
