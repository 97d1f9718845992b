use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use fixtura_core::{Record, Value};

/// Caller-supplied attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Value(Value),
    Record(Record),
    Records(Vec<Record>),
    /// Attributes for sampling the associated record.
    Sample(Box<SampleRequest>),
    /// Attributes for sampling each record of a to-many association.
    Samples(Vec<SampleRequest>),
}

/// Requested attributes keyed by column or association name.
pub type Attributes = BTreeMap<String, AttrValue>;

impl AttrValue {
    /// Convert a configuration literal. Objects become nested samples and
    /// arrays of objects become to-many samples; other arrays have no form.
    pub fn from_json(json: &serde_json::Value) -> Option<AttrValue> {
        match json {
            serde_json::Value::Object(map) => {
                let mut request = SampleRequest::new();
                for (field, value) in map {
                    request
                        .attributes
                        .insert(field.clone(), AttrValue::from_json(value)?);
                }
                Some(AttrValue::Sample(Box::new(request)))
            }
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| match AttrValue::from_json(item)? {
                    AttrValue::Sample(request) => Some(*request),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()
                .map(AttrValue::Samples),
            scalar => Value::from_json(scalar).map(AttrValue::Value),
        }
    }
}

impl From<Value> for AttrValue {
    fn from(value: Value) -> Self {
        AttrValue::Value(value)
    }
}

impl From<Record> for AttrValue {
    fn from(record: Record) -> Self {
        AttrValue::Record(record)
    }
}

impl From<Vec<Record>> for AttrValue {
    fn from(records: Vec<Record>) -> Self {
        AttrValue::Records(records)
    }
}

impl From<SampleRequest> for AttrValue {
    fn from(request: SampleRequest) -> Self {
        AttrValue::Sample(Box::new(request))
    }
}

impl From<Vec<SampleRequest>> for AttrValue {
    fn from(requests: Vec<SampleRequest>) -> Self {
        AttrValue::Samples(requests)
    }
}

macro_rules! scalar_attr {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for AttrValue {
                fn from(value: $ty) -> Self {
                    AttrValue::Value(Value::from(value))
                }
            }
        )*
    };
}

scalar_attr!(&str, String, i64, i32, f64, bool, NaiveDate, NaiveDateTime);

/// One `sample` / `create_sample` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleRequest {
    /// Concrete model for a nested polymorphic sample.
    pub model: Option<String>,
    pub preset: Option<String>,
    pub attributes: Attributes,
    /// Bare records assigned to the association matching their model.
    pub records: Vec<Record>,
    pub force_create: bool,
}

impl SampleRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// A nested request naming its model.
    pub fn of(model: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            ..Self::default()
        }
    }

    pub fn preset(mut self, name: impl Into<String>) -> Self {
        self.preset = Some(name.into());
        self
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(field.into(), value.into());
        self
    }

    pub fn with_record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    pub fn force_create(mut self) -> Self {
        self.force_create = true;
        self
    }
}

/// A requested value after nested samples are materialized.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Value),
    BelongsTo(Option<Record>),
    HasMany(Vec<Record>),
}

/// Normalized request keyed by column or association name.
pub type NormalizedAttributes = BTreeMap<String, FieldValue>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_objects_become_nested_samples() {
        let value = AttrValue::from_json(&serde_json::json!({ "name": "HBO" })).expect("object");
        let AttrValue::Sample(request) = value else {
            panic!("expected nested sample");
        };
        assert_eq!(
            request.attributes.get("name"),
            Some(&AttrValue::Value(Value::from("HBO")))
        );
    }

    #[test]
    fn json_arrays_need_objects() {
        assert!(matches!(
            AttrValue::from_json(&serde_json::json!([{ "name": "drama" }])),
            Some(AttrValue::Samples(samples)) if samples.len() == 1
        ));
        assert!(AttrValue::from_json(&serde_json::json!([1, 2])).is_none());
    }
}
