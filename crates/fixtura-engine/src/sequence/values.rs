use chrono::{Duration, NaiveDateTime};
use fixtura_core::{ColumnType, Value};

use super::{Sequence, SequenceContext};
use crate::errors::SampleError;

/// Always null; the value is decided by a later pass.
pub struct NilSequence;

impl Sequence for NilSequence {
    fn policy(&self) -> &'static str {
        "nil"
    }

    fn next(&mut self, _ctx: &mut SequenceContext<'_>) -> Result<Value, SampleError> {
        Ok(Value::Null)
    }
}

/// `<local>.<n>@<domain>` with a strictly increasing `n`.
pub struct EmailSequence {
    local: String,
    domain: String,
    counter: u64,
}

impl EmailSequence {
    pub fn new(local: &str, domain: &str) -> Self {
        Self {
            local: local.to_string(),
            domain: domain.to_string(),
            counter: 0,
        }
    }
}

impl Sequence for EmailSequence {
    fn policy(&self) -> &'static str {
        "email"
    }

    fn next(&mut self, _ctx: &mut SequenceContext<'_>) -> Result<Value, SampleError> {
        let value = format!("{}.{}@{}", self.local, self.counter, self.domain);
        self.counter += 1;
        Ok(Value::Text(value))
    }
}

/// The first allowed value, every time.
pub struct InclusionSequence {
    value: Value,
}

impl InclusionSequence {
    pub fn new(value: Value) -> Self {
        Self { value }
    }
}

impl Sequence for InclusionSequence {
    fn policy(&self) -> &'static str {
        "inclusion"
    }

    fn next(&mut self, _ctx: &mut SequenceContext<'_>) -> Result<Value, SampleError> {
        Ok(self.value.clone())
    }
}

/// Shortest valid lowercase string, then its successors: `a`, `b`, ... `z`, `aa`.
pub struct LengthSequence {
    current: Option<String>,
    minimum: usize,
}

impl LengthSequence {
    pub fn new(minimum: usize) -> Self {
        Self {
            current: None,
            minimum: minimum.max(1),
        }
    }
}

impl Sequence for LengthSequence {
    fn policy(&self) -> &'static str {
        "length"
    }

    fn next(&mut self, _ctx: &mut SequenceContext<'_>) -> Result<Value, SampleError> {
        let next = match self.current.take() {
            None => "a".repeat(self.minimum),
            Some(previous) => successor(&previous),
        };
        self.current = Some(next.clone());
        Ok(Value::Text(next))
    }
}

/// Lexicographic successor over `a..=z`, growing on overflow.
fn successor(value: &str) -> String {
    let mut chars: Vec<char> = value.chars().collect();
    for idx in (0..chars.len()).rev() {
        if chars[idx] == 'z' {
            chars[idx] = 'a';
        } else {
            chars[idx] = char::from(chars[idx] as u8 + 1);
            return chars.into_iter().collect();
        }
    }
    chars.insert(0, 'a');
    chars.into_iter().collect()
}

/// Counter-based value shaped by the column type.
pub struct GenericSequence {
    field: String,
    column_type: ColumnType,
    base_time: NaiveDateTime,
    counter: i64,
}

impl GenericSequence {
    /// `None` for column types without a generic policy.
    pub fn new(field: &str, column_type: ColumnType, base_time: NaiveDateTime) -> Option<Self> {
        match column_type {
            ColumnType::Binary => None,
            ColumnType::String
            | ColumnType::Text
            | ColumnType::Integer
            | ColumnType::Float
            | ColumnType::Boolean
            | ColumnType::Date
            | ColumnType::Datetime => Some(Self {
                field: field.to_string(),
                column_type,
                base_time,
                counter: 0,
            }),
        }
    }
}

impl Sequence for GenericSequence {
    fn policy(&self) -> &'static str {
        "generic"
    }

    fn next(&mut self, _ctx: &mut SequenceContext<'_>) -> Result<Value, SampleError> {
        let counter = self.counter;
        self.counter += 1;
        let value = match self.column_type {
            ColumnType::String | ColumnType::Text => {
                Value::Text(format!("{} {}", self.field, counter))
            }
            ColumnType::Integer => Value::Int(counter),
            ColumnType::Float => Value::Float(counter as f64),
            ColumnType::Boolean => Value::Bool(counter % 2 == 1),
            ColumnType::Datetime => Value::DateTime(self.base_time - Duration::minutes(counter)),
            ColumnType::Date => Value::Date(self.base_time.date() - Duration::days(counter)),
            ColumnType::Binary => Value::Null,
        };
        Ok(value)
    }
}
