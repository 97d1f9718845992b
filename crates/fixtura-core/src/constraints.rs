use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::value::{Row, Value};

/// Validation rule kinds understood by the sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationRule {
    Presence,
    Uniqueness {
        /// Fields whose values partition the uniqueness check.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        scope: Vec<String>,
    },
    Inclusion {
        /// Allowed values, as JSON literals.
        #[serde(rename = "in")]
        within: Vec<serde_json::Value>,
    },
    Length {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        minimum: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        maximum: Option<usize>,
        /// Inclusive `[min, max]` range; tighter than `minimum`/`maximum` when both are set.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        within: Option<(usize, usize)>,
    },
    EmailFormat,
}

impl ValidationRule {
    pub fn name(&self) -> &'static str {
        match self {
            ValidationRule::Presence => "presence",
            ValidationRule::Uniqueness { .. } => "uniqueness",
            ValidationRule::Inclusion { .. } => "inclusion",
            ValidationRule::Length { .. } => "length",
            ValidationRule::EmailFormat => "email_format",
        }
    }
}

/// One validation attached to a column or association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Validation {
    #[serde(flatten)]
    pub rule: ValidationRule,
    #[serde(default)]
    pub allow_nil: bool,
    #[serde(default)]
    pub allow_blank: bool,
    /// The rule only fires when the condition holds for the row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl Validation {
    pub fn new(rule: ValidationRule) -> Self {
        Self {
            rule,
            allow_nil: false,
            allow_blank: false,
            condition: None,
        }
    }

    pub fn presence() -> Self {
        Self::new(ValidationRule::Presence)
    }

    pub fn uniqueness() -> Self {
        Self::new(ValidationRule::Uniqueness { scope: Vec::new() })
    }

    pub fn scoped_uniqueness<I, S>(scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ValidationRule::Uniqueness {
            scope: scope.into_iter().map(Into::into).collect(),
        })
    }

    pub fn inclusion(within: Vec<serde_json::Value>) -> Self {
        Self::new(ValidationRule::Inclusion { within })
    }

    pub fn length(minimum: Option<usize>, maximum: Option<usize>) -> Self {
        Self::new(ValidationRule::Length {
            minimum,
            maximum,
            within: None,
        })
    }

    pub fn email_format() -> Self {
        Self::new(ValidationRule::EmailFormat)
    }

    pub fn allow_nil(mut self) -> Self {
        self.allow_nil = true;
        self
    }

    pub fn allow_blank(mut self) -> Self {
        self.allow_blank = true;
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }

    /// Whether the rule fires for `row`. Unconditional rules always fire.
    pub fn applies_to(&self, row: &Row) -> bool {
        self.condition
            .as_ref()
            .map(|condition| condition.evaluate(row))
            .unwrap_or(true)
    }

    /// Whether `value` is exempt through `allow_nil` / `allow_blank`.
    pub fn skips(&self, value: &Value) -> bool {
        (self.allow_nil && value.is_null()) || (self.allow_blank && value.is_blank())
    }

    /// Effective `(min, max)` character bounds of a length rule.
    pub fn length_bounds(&self) -> Option<(usize, Option<usize>)> {
        let ValidationRule::Length {
            minimum,
            maximum,
            within,
        } = &self.rule
        else {
            return None;
        };
        let mut min = minimum.unwrap_or(0);
        let mut max = *maximum;
        if let Some((low, high)) = within {
            min = min.max(*low);
            max = Some(max.map(|value| value.min(*high)).unwrap_or(*high));
        }
        Some((min, max))
    }
}

/// Data predicate guarding a conditional validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum Condition {
    FieldPresent { field: String },
    FieldBlank { field: String },
    FieldEquals { field: String, value: serde_json::Value },
}

impl Condition {
    pub fn field(&self) -> &str {
        match self {
            Condition::FieldPresent { field }
            | Condition::FieldBlank { field }
            | Condition::FieldEquals { field, .. } => field,
        }
    }

    pub fn evaluate(&self, row: &Row) -> bool {
        let value = row.get(self.field()).unwrap_or(&Value::Null);
        match self {
            Condition::FieldPresent { .. } => !value.is_blank(),
            Condition::FieldBlank { .. } => value.is_blank(),
            Condition::FieldEquals { value: expected, .. } => value.matches_json(expected),
        }
    }
}
