use fixtura_core::{Record, Value};

use super::{Sequence, SequenceContext};
use crate::errors::SampleError;

/// Ids of a required association target.
///
/// Reuses the last produced record while it still exists. A retry under a
/// uniqueness rule, or a deleted target, samples a new one.
pub struct RequiredReference {
    target: String,
    last: Option<Record>,
}

impl RequiredReference {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            last: None,
        }
    }
}

impl Sequence for RequiredReference {
    fn policy(&self) -> &'static str {
        "required_reference"
    }

    fn next(&mut self, ctx: &mut SequenceContext<'_>) -> Result<Value, SampleError> {
        let record = match self.last.take() {
            Some(last) if ctx.attempt == 0 && ctx.source.record_exists(&last)? => Some(last),
            Some(_) => ctx.source.fresh_reference(&self.target)?,
            None if ctx.attempt > 0 => ctx.source.fresh_reference(&self.target)?,
            None => ctx.source.reference(&self.target)?,
        };

        let value = record
            .as_ref()
            .map(Record::id_value)
            .unwrap_or(Value::Null);
        self.last = record;
        Ok(value)
    }
}

/// Ids of an existing or newly sampled target, for the backfill pass.
pub struct Reference {
    target: String,
}

impl Reference {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl Sequence for Reference {
    fn policy(&self) -> &'static str {
        "reference"
    }

    fn next(&mut self, ctx: &mut SequenceContext<'_>) -> Result<Value, SampleError> {
        Ok(ctx
            .source
            .reference(&self.target)?
            .map(|record| record.id_value())
            .unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Predicate;
    use crate::sequence::ReferenceSource;
    use fixtura_core::Row;

    #[derive(Default)]
    struct Targets {
        next_id: i64,
        deleted: Vec<i64>,
        created: usize,
    }

    impl Targets {
        fn create(&mut self, model: &str) -> Option<Record> {
            self.next_id += 1;
            self.created += 1;
            Some(Record::new(model, self.next_id, Row::new()))
        }
    }

    impl ReferenceSource for Targets {
        fn record_exists(&self, record: &Record) -> Result<bool, SampleError> {
            Ok(!self.deleted.contains(&record.id))
        }

        fn reference(&mut self, model: &str) -> Result<Option<Record>, SampleError> {
            Ok(self.create(model))
        }

        fn fresh_reference(&mut self, model: &str) -> Result<Option<Record>, SampleError> {
            Ok(self.create(model))
        }

        fn is_taken(&self, _model: &str, _predicate: &Predicate) -> Result<bool, SampleError> {
            Ok(false)
        }

        fn record_retry(&mut self, _model: &str, _field: &str) {}
    }

    #[test]
    fn required_reference_reuses_until_deleted() {
        let row = Row::new();
        let mut targets = Targets::default();
        let mut sequence = RequiredReference::new("Network");

        let first = {
            let mut ctx = SequenceContext {
                source: &mut targets,
                row: &row,
                attempt: 0,
            };
            let first = sequence.next(&mut ctx).expect("first");
            assert_eq!(sequence.next(&mut ctx).expect("reuse"), first);
            first
        };
        assert_eq!(first, Value::Int(1));
        assert_eq!(targets.created, 1);

        targets.deleted.push(1);
        let mut ctx = SequenceContext {
            source: &mut targets,
            row: &row,
            attempt: 0,
        };
        assert_eq!(sequence.next(&mut ctx).expect("resample"), Value::Int(2));
    }

    #[test]
    fn retries_sample_a_new_target() {
        let row = Row::new();
        let mut targets = Targets::default();
        let mut sequence = RequiredReference::new("Network");
        let mut ctx = SequenceContext {
            source: &mut targets,
            row: &row,
            attempt: 0,
        };
        assert_eq!(sequence.next(&mut ctx).expect("first"), Value::Int(1));
        ctx.attempt = 1;
        assert_eq!(sequence.next(&mut ctx).expect("retry"), Value::Int(2));
    }
}
