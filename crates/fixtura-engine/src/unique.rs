use fixtura_core::{Validation, ValidationRule, Value};
use tracing::debug;

use crate::errors::SampleError;
use crate::query::Predicate;
use crate::sequence::{Sequence, SequenceContext};

/// Skips candidates already persisted for the column, within its scope.
pub struct UniqueSequence {
    model: String,
    column: String,
    inner: Box<dyn Sequence>,
    scope: Vec<String>,
    validation: Option<Validation>,
    max_attempts: Option<u64>,
}

impl UniqueSequence {
    /// `validation` is `None` for forced-unique columns.
    pub fn new(
        model: &str,
        column: &str,
        inner: Box<dyn Sequence>,
        validation: Option<Validation>,
        max_attempts: Option<u64>,
    ) -> Self {
        let scope = match validation.as_ref().map(|validation| &validation.rule) {
            Some(ValidationRule::Uniqueness { scope }) => scope.clone(),
            _ => Vec::new(),
        };
        Self {
            model: model.to_string(),
            column: column.to_string(),
            inner,
            scope,
            validation,
            max_attempts,
        }
    }

    /// Null never collides, matching how stores compare nulls.
    fn exempt(&self, ctx: &SequenceContext<'_>, candidate: &Value) -> bool {
        candidate.is_null()
            || self.validation.as_ref().is_some_and(|validation| {
                !validation.applies_to(ctx.row) || validation.skips(candidate)
            })
    }

    fn predicate(&self, ctx: &SequenceContext<'_>, candidate: &Value) -> Predicate {
        let mut predicates = vec![Predicate::eq(self.column.clone(), candidate.clone())];
        for scoped in &self.scope {
            let value = ctx.row.get(scoped).cloned().unwrap_or(Value::Null);
            predicates.push(Predicate::eq(scoped.clone(), value));
        }
        Predicate::all(predicates)
    }
}

impl Sequence for UniqueSequence {
    fn policy(&self) -> &'static str {
        "unique"
    }

    fn next(&mut self, ctx: &mut SequenceContext<'_>) -> Result<Value, SampleError> {
        let mut attempts = 0_u64;
        loop {
            ctx.attempt = attempts;
            let candidate = self.inner.next(ctx)?;
            if self.exempt(ctx, &candidate) {
                return Ok(candidate);
            }

            let predicate = self.predicate(ctx, &candidate);
            if !ctx.source.is_taken(&self.model, &predicate)? {
                ctx.attempt = 0;
                return Ok(candidate);
            }

            attempts += 1;
            ctx.source.record_retry(&self.model, &self.column);
            debug!(
                model = %self.model,
                column = %self.column,
                value = %candidate,
                attempts,
                "unique candidate taken"
            );

            if self.max_attempts.is_some_and(|max| attempts >= max) {
                return Err(SampleError::UniquenessExhausted {
                    model: self.model.clone(),
                    field: self.column.clone(),
                    attempts,
                });
            }
        }
    }
}
