//! Matching predicates for find-or-create.

use std::collections::BTreeSet;

use fixtura_core::{Association, AssociationKind, ModelMetadata, ModelRegistry, Record, Value};

use crate::errors::SampleError;
use crate::query::Predicate;
use crate::request::{FieldValue, NormalizedAttributes};

/// Conjunctive predicate matching rows that satisfy `attributes` exactly.
///
/// To-many attributes match the listed set exactly: every listed record is
/// associated and no other record is.
pub fn match_predicate(
    registry: &ModelRegistry,
    meta: &ModelMetadata,
    attributes: &NormalizedAttributes,
) -> Result<Predicate, SampleError> {
    let mut predicates = Vec::new();

    for (field, value) in attributes {
        match value {
            FieldValue::Scalar(value) => {
                predicates.push(Predicate::eq(field.clone(), value.clone()));
            }
            FieldValue::BelongsTo(record) => {
                let association = association(meta, field)?;
                predicates.extend(belongs_to_predicates(meta, association, record.as_ref())?);
            }
            FieldValue::HasMany(records) => {
                let association = association(meta, field)?;
                predicates.extend(has_many_predicates(registry, meta, association, records)?);
            }
        }
    }

    Ok(Predicate::all(predicates))
}

fn association<'a>(meta: &'a ModelMetadata, field: &str) -> Result<&'a Association, SampleError> {
    meta.association(field)
        .ok_or_else(|| SampleError::UnknownField {
            model: meta.name.clone(),
            field: field.to_string(),
        })
}

fn belongs_to_predicates(
    meta: &ModelMetadata,
    association: &Association,
    record: Option<&Record>,
) -> Result<Vec<Predicate>, SampleError> {
    let foreign_key = association
        .foreign_key()
        .ok_or_else(|| missing_key(meta, association))?;

    let mut predicates = vec![Predicate::eq(
        foreign_key,
        record.map(Record::id_value).unwrap_or(Value::Null),
    )];
    if let Some(type_column) = &association.foreign_type {
        let model = record
            .map(|record| Value::Text(record.model.clone()))
            .unwrap_or(Value::Null);
        predicates.push(Predicate::eq(type_column.clone(), model));
    }
    Ok(predicates)
}

fn has_many_predicates(
    registry: &ModelRegistry,
    meta: &ModelMetadata,
    association: &Association,
    records: &[Record],
) -> Result<Vec<Predicate>, SampleError> {
    let foreign_key = association
        .foreign_key()
        .ok_or_else(|| missing_key(meta, association))?;

    // (rows pointing at the owner through `foreign_key`, column holding the listed ids)
    let (joined, matched_column) = match association.kind {
        AssociationKind::HasManyThrough => {
            let through = association
                .through
                .clone()
                .ok_or_else(|| missing_key(meta, association))?;
            let source_key = association
                .source_key
                .clone()
                .ok_or_else(|| missing_key(meta, association))?;
            (through, source_key)
        }
        AssociationKind::HasMany | AssociationKind::BelongsTo => {
            let target = association
                .target
                .clone()
                .ok_or_else(|| missing_key(meta, association))?;
            let primary_key = registry.require(&target)?.primary_key.clone();
            (target, primary_key)
        }
    };

    let ids: BTreeSet<i64> = records.iter().map(|record| record.id).collect();
    if ids.is_empty() {
        return Ok(vec![Predicate::related(
            joined,
            foreign_key,
            Predicate::any(),
            0,
        )]);
    }

    let values: Vec<Value> = ids.iter().copied().map(Value::Int).collect();
    Ok(vec![
        Predicate::related(
            joined.clone(),
            foreign_key,
            Predicate::In {
                column: matched_column.clone(),
                values: values.clone(),
            },
            ids.len(),
        ),
        Predicate::related(
            joined,
            foreign_key,
            Predicate::NotIn {
                column: matched_column,
                values,
            },
            0,
        ),
    ])
}

fn missing_key(meta: &ModelMetadata, association: &Association) -> SampleError {
    SampleError::InvalidAttribute {
        model: meta.name.clone(),
        field: association.name.clone(),
        message: "association is missing its key columns".to_string(),
    }
}
