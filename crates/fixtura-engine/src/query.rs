use fixtura_core::Value;

/// Storage-agnostic matching predicate evaluated by a persistence backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Conjunction; an empty list matches every row.
    All(Vec<Predicate>),
    Eq { column: String, value: Value },
    IsNull { column: String },
    In { column: String, values: Vec<Value> },
    /// Non-null values outside the list.
    NotIn { column: String, values: Vec<Value> },
    /// Exactly `count` rows of `model` point at the candidate through
    /// `owner_column` and satisfy `filter`.
    Related {
        model: String,
        owner_column: String,
        filter: Box<Predicate>,
        count: usize,
    },
}

impl Predicate {
    pub fn any() -> Self {
        Predicate::All(Vec::new())
    }

    pub fn all(predicates: Vec<Predicate>) -> Self {
        Predicate::All(predicates)
    }

    /// Equality; a null value becomes an `IsNull` test.
    pub fn eq(column: impl Into<String>, value: Value) -> Self {
        let column = column.into();
        if value.is_null() {
            Predicate::IsNull { column }
        } else {
            Predicate::Eq { column, value }
        }
    }

    pub fn related(
        model: impl Into<String>,
        owner_column: impl Into<String>,
        filter: Predicate,
        count: usize,
    ) -> Self {
        Predicate::Related {
            model: model.into(),
            owner_column: owner_column.into(),
            filter: Box::new(filter),
            count,
        }
    }
}
