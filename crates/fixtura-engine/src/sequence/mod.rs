//! Per-column value sequences.
//!
//! A sequence is chosen once per model column and phase from the column's
//! association and validation rules, then kept by the sampler so its counter
//! keeps advancing across calls.

pub mod reference;
pub mod values;

use chrono::NaiveDateTime;
use fixtura_config::SamplerOptions;
use fixtura_core::{
    Association, Column, ModelMetadata, Record, Row, Validation, ValidationRule, Value,
};
use tracing::debug;

use crate::errors::SampleError;
use crate::query::Predicate;
use crate::unique::UniqueSequence;

use self::reference::{Reference, RequiredReference};
use self::values::{
    EmailSequence, GenericSequence, InclusionSequence, LengthSequence, NilSequence,
};

/// Creation pass a value is produced for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Draft values written by the first insert.
    First,
    /// Backfill values written after the first insert.
    Second,
}

/// Access to persisted and sampled records while producing values.
pub trait ReferenceSource {
    fn record_exists(&self, record: &Record) -> Result<bool, SampleError>;

    /// An existing record of `model`, sampling one when none matches.
    /// `None` when `model` is mid-creation and nothing is persisted yet.
    /// A presence-validated self-reference then reaches the store as null and
    /// surfaces as a presence `ValidationFailure` rather than recursing.
    fn reference(&mut self, model: &str) -> Result<Option<Record>, SampleError>;

    /// A newly created record of `model`, or `None` when `model` is mid-creation.
    fn fresh_reference(&mut self, model: &str) -> Result<Option<Record>, SampleError>;

    fn is_taken(&self, model: &str, predicate: &Predicate) -> Result<bool, SampleError>;

    fn record_retry(&mut self, model: &str, field: &str);
}

/// Inputs available to a sequence for one value.
pub struct SequenceContext<'a> {
    pub source: &'a mut dyn ReferenceSource,
    /// Row resolved so far for the record being built.
    pub row: &'a Row,
    /// Uniqueness retries already spent on the current value.
    pub attempt: u64,
}

/// Stateful producer of successive candidate values for one column.
pub trait Sequence {
    fn policy(&self) -> &'static str;

    fn next(&mut self, ctx: &mut SequenceContext<'_>) -> Result<Value, SampleError>;
}

/// Build the sequence for `column` of `meta`.
///
/// Policy, first match wins: deferred or required association keys, email
/// format, inclusion, length, then a generic value for the column type.
/// Uniqueness rules and forced-unique columns wrap the result.
pub fn build_sequence(
    meta: &ModelMetadata,
    column: &str,
    phase: Phase,
    options: &SamplerOptions,
    base_time: NaiveDateTime,
    force_unique: bool,
) -> Result<Box<dyn Sequence>, SampleError> {
    let column_meta = meta.column(column).ok_or_else(|| SampleError::UnknownField {
        model: meta.name.clone(),
        field: column.to_string(),
    })?;

    let (sequence, deferred) = match meta.association_for_column(column) {
        Some(association) => association_sequence(meta, association, phase),
        None => {
            let validations = meta.column_validations(column);
            (
                value_sequence(meta, column_meta, &validations, options, base_time)?,
                false,
            )
        }
    };

    debug!(
        model = %meta.name,
        column = %column,
        phase = ?phase,
        policy = sequence.policy(),
        "sequence selected"
    );

    if deferred {
        return Ok(sequence);
    }

    let sequence: Box<dyn Sequence> = match meta.uniqueness_rule(column) {
        Some(validation) => Box::new(UniqueSequence::new(
            &meta.name,
            column,
            sequence,
            Some(validation.clone()),
            options.max_unique_attempts,
        )),
        None if force_unique => Box::new(UniqueSequence::new(
            &meta.name,
            column,
            sequence,
            None,
            options.max_unique_attempts,
        )),
        None => sequence,
    };
    Ok(sequence)
}

/// Sequence for a belongs-to key column, and whether it defers the value.
fn association_sequence(
    meta: &ModelMetadata,
    association: &Association,
    phase: Phase,
) -> (Box<dyn Sequence>, bool) {
    let target = match (&association.target, association.polymorphic) {
        (Some(target), false) => target.clone(),
        _ => return (Box::new(NilSequence), true),
    };

    match (meta.presence_rule(association), phase) {
        (Some(_), _) => (Box::new(RequiredReference::new(target)), false),
        (None, Phase::First) => (Box::new(NilSequence), true),
        (None, Phase::Second) if target == meta.name => (Box::new(NilSequence), true),
        (None, Phase::Second) => (Box::new(Reference::new(target)), false),
    }
}

fn value_sequence(
    meta: &ModelMetadata,
    column: &Column,
    validations: &[&Validation],
    options: &SamplerOptions,
    base_time: NaiveDateTime,
) -> Result<Box<dyn Sequence>, SampleError> {
    let mut email = false;
    let mut inclusion = None;
    let mut length = None;

    for validation in validations {
        match &validation.rule {
            ValidationRule::EmailFormat => email = true,
            ValidationRule::Inclusion { within } => {
                inclusion.get_or_insert(within);
            }
            ValidationRule::Length { .. } => {
                length = length.or(validation.length_bounds());
            }
            ValidationRule::Presence | ValidationRule::Uniqueness { .. } => {}
        }
    }

    let unresolvable = || SampleError::UnresolvableFieldPolicy {
        model: meta.name.clone(),
        field: column.name.clone(),
        column_type: column.column_type.to_string(),
    };

    if email {
        return Ok(Box::new(EmailSequence::new(
            &options.email_local,
            &options.email_domain,
        )));
    }
    if let Some(within) = inclusion {
        let first = within
            .first()
            .and_then(Value::from_json)
            .ok_or_else(unresolvable)?;
        return Ok(Box::new(InclusionSequence::new(first)));
    }
    if let Some((minimum, _)) = length {
        return Ok(Box::new(LengthSequence::new(minimum)));
    }

    GenericSequence::new(&column.name, column.column_type, base_time)
        .map(|sequence| Box::new(sequence) as Box<dyn Sequence>)
        .ok_or_else(unresolvable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixtura_core::{ColumnType, ModelRegistry};

    struct NoReferences;

    impl ReferenceSource for NoReferences {
        fn record_exists(&self, _record: &Record) -> Result<bool, SampleError> {
            Ok(false)
        }

        fn reference(&mut self, _model: &str) -> Result<Option<Record>, SampleError> {
            Ok(None)
        }

        fn fresh_reference(&mut self, _model: &str) -> Result<Option<Record>, SampleError> {
            Ok(None)
        }

        fn is_taken(&self, _model: &str, _predicate: &Predicate) -> Result<bool, SampleError> {
            Ok(false)
        }

        fn record_retry(&mut self, _model: &str, _field: &str) {}
    }

    fn show() -> ModelMetadata {
        let registry = ModelRegistry::new()
            .with_model(ModelMetadata::new("Network"))
            .with_model(
                ModelMetadata::new("Show")
                    .with_column("name", ColumnType::String)
                    .with_column("contact", ColumnType::String)
                    .with_column("status", ColumnType::String)
                    .with_column("code", ColumnType::String)
                    .with_column("poster", ColumnType::Binary)
                    .with_association(Association::belongs_to("network", "Network"))
                    .with_association(Association::belongs_to("merged_into", "Show"))
                    .with_association(Association::belongs_to("studio", "Network"))
                    .with_validation("network", Validation::presence())
                    .with_validation("contact", Validation::email_format())
                    .with_validation(
                        "status",
                        Validation::inclusion(vec![
                            serde_json::json!("airing"),
                            serde_json::json!("ended"),
                        ]),
                    )
                    .with_validation("code", Validation::length(Some(2), Some(4))),
            );
        registry.model("Show").cloned().expect("show model")
    }

    fn policy(column: &str, phase: Phase) -> &'static str {
        build_sequence(
            &show(),
            column,
            phase,
            &SamplerOptions::default(),
            NaiveDateTime::default(),
            false,
        )
        .expect("sequence")
        .policy()
    }

    #[test]
    fn selects_policy_by_rule_and_phase() {
        assert_eq!(policy("studio_id", Phase::First), "nil");
        assert_eq!(policy("studio_id", Phase::Second), "reference");
        assert_eq!(policy("merged_into_id", Phase::Second), "nil");
        assert_eq!(policy("network_id", Phase::First), "required_reference");
        assert_eq!(policy("contact", Phase::First), "email");
        assert_eq!(policy("status", Phase::First), "inclusion");
        assert_eq!(policy("code", Phase::First), "length");
        assert_eq!(policy("name", Phase::First), "generic");
    }

    #[test]
    fn binary_columns_have_no_policy() {
        let err = build_sequence(
            &show(),
            "poster",
            Phase::First,
            &SamplerOptions::default(),
            NaiveDateTime::default(),
            false,
        )
        .err()
        .expect("binary column");
        assert!(matches!(
            err,
            SampleError::UnresolvableFieldPolicy { ref field, .. } if field == "poster"
        ));
    }

    #[test]
    fn forced_unique_wraps_sequence() {
        let mut sequence = build_sequence(
            &show(),
            "status",
            Phase::First,
            &SamplerOptions::default(),
            NaiveDateTime::default(),
            true,
        )
        .expect("sequence");
        assert_eq!(sequence.policy(), "unique");

        let row = Row::new();
        let mut source = NoReferences;
        let mut ctx = SequenceContext {
            source: &mut source,
            row: &row,
            attempt: 0,
        };
        assert_eq!(sequence.next(&mut ctx).expect("value"), Value::from("airing"));
    }
}
