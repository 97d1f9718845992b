use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::constraints::{Validation, ValidationRule};
use crate::types::ColumnType;

/// Timestamp columns maintained by the persistence layer.
pub const AUTO_TIMESTAMPS: &[&str] = &["created_at", "updated_at"];

/// Column metadata for a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Kind of association between two models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AssociationKind {
    BelongsTo,
    HasMany,
    HasManyThrough,
}

/// Statically declared association descriptor.
///
/// - `belongs_to`: `foreign_key` is a column on the owning model.
/// - `has_many`: `foreign_key` is the column on `target` pointing back at the owner.
/// - `has_many_through`: `foreign_key` and `source_key` are columns on the
///   `through` join model pointing at the owner and the target respectively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Association {
    pub name: String,
    pub kind: AssociationKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<String>,
    /// Concrete target model; absent for polymorphic belongs-to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub polymorphic: bool,
    /// Column recording the target model of a polymorphic belongs-to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_type: Option<String>,
    /// Candidate target models for a polymorphic belongs-to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub polymorphic_targets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub through: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_key: Option<String>,
}

impl Association {
    pub fn belongs_to(name: impl Into<String>, target: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            foreign_key: Some(format!("{name}_id")),
            name,
            kind: AssociationKind::BelongsTo,
            target: Some(target.into()),
            polymorphic: false,
            foreign_type: None,
            polymorphic_targets: Vec::new(),
            through: None,
            source_key: None,
        }
    }

    pub fn polymorphic<I, S>(name: impl Into<String>, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        Self {
            foreign_key: Some(format!("{name}_id")),
            foreign_type: Some(format!("{name}_type")),
            name,
            kind: AssociationKind::BelongsTo,
            target: None,
            polymorphic: true,
            polymorphic_targets: candidates.into_iter().map(Into::into).collect(),
            through: None,
            source_key: None,
        }
    }

    pub fn has_many(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: AssociationKind::HasMany,
            foreign_key: Some(foreign_key.into()),
            target: Some(target.into()),
            polymorphic: false,
            foreign_type: None,
            polymorphic_targets: Vec::new(),
            through: None,
            source_key: None,
        }
    }

    pub fn has_many_through(
        name: impl Into<String>,
        target: impl Into<String>,
        through: impl Into<String>,
        foreign_key: impl Into<String>,
        source_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: AssociationKind::HasManyThrough,
            foreign_key: Some(foreign_key.into()),
            target: Some(target.into()),
            polymorphic: false,
            foreign_type: None,
            polymorphic_targets: Vec::new(),
            through: Some(through.into()),
            source_key: Some(source_key.into()),
        }
    }

    pub fn is_belongs_to(&self) -> bool {
        self.kind == AssociationKind::BelongsTo
    }

    pub fn is_to_many(&self) -> bool {
        matches!(
            self.kind,
            AssociationKind::HasMany | AssociationKind::HasManyThrough
        )
    }

    pub fn foreign_key(&self) -> Option<&str> {
        self.foreign_key.as_deref()
    }

    /// Fill the conventional column names left implicit in a declaration.
    pub fn normalize(&mut self) {
        if self.kind == AssociationKind::BelongsTo {
            if self.foreign_key.is_none() {
                self.foreign_key = Some(format!("{}_id", self.name));
            }
            if self.polymorphic && self.foreign_type.is_none() {
                self.foreign_type = Some(format!("{}_type", self.name));
            }
        }
    }
}

/// Read-only view of one model's columns, associations and validations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelMetadata {
    pub name: String,
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub associations: Vec<Association>,
    /// Validations keyed by column or association name.
    #[serde(default)]
    pub validations: BTreeMap<String, Vec<Validation>>,
}

fn default_primary_key() -> String {
    "id".to_string()
}

impl ModelMetadata {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: default_primary_key(),
            columns: vec![Column::new("id", ColumnType::Integer)],
            associations: Vec::new(),
            validations: BTreeMap::new(),
        }
    }

    pub fn with_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.push(Column::new(name, column_type));
        self
    }

    pub fn with_timestamps(self) -> Self {
        self.with_column("created_at", ColumnType::Datetime)
            .with_column("updated_at", ColumnType::Datetime)
    }

    /// Adds the association together with the columns it owns.
    pub fn with_association(mut self, mut association: Association) -> Self {
        association.normalize();
        if association.is_belongs_to() {
            if let Some(foreign_key) = association.foreign_key.clone()
                && self.column(&foreign_key).is_none()
            {
                self.columns
                    .push(Column::new(foreign_key, ColumnType::Integer));
            }
            if let Some(foreign_type) = association.foreign_type.clone()
                && self.column(&foreign_type).is_none()
            {
                self.columns
                    .push(Column::new(foreign_type, ColumnType::String));
            }
        }
        self.associations.push(association);
        self
    }

    pub fn with_validation(mut self, field: impl Into<String>, validation: Validation) -> Self {
        self.validations
            .entry(field.into())
            .or_default()
            .push(validation);
        self
    }

    pub fn normalize(&mut self) {
        for association in &mut self.associations {
            association.normalize();
        }
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn association(&self, name: &str) -> Option<&Association> {
        self.associations
            .iter()
            .find(|association| association.name == name)
    }

    pub fn belongs_to(&self) -> impl Iterator<Item = &Association> {
        self.associations
            .iter()
            .filter(|association| association.is_belongs_to())
    }

    /// The belongs-to association owning `column` as its key or type column.
    pub fn association_for_column(&self, column: &str) -> Option<&Association> {
        self.belongs_to().find(|association| {
            association.foreign_key() == Some(column)
                || association.foreign_type.as_deref() == Some(column)
        })
    }

    /// The belongs-to association whose foreign key is `column`.
    pub fn association_for_foreign_key(&self, column: &str) -> Option<&Association> {
        self.belongs_to()
            .find(|association| association.foreign_key() == Some(column))
    }

    /// Primary key and persistence-managed timestamps.
    pub fn is_auto_managed(&self, column: &str) -> bool {
        column == self.primary_key || AUTO_TIMESTAMPS.contains(&column)
    }

    pub fn validations_for(&self, field: &str) -> &[Validation] {
        self.validations
            .get(field)
            .map(|validations| validations.as_slice())
            .unwrap_or(&[])
    }

    /// Validations on a column plus those declared on its owning association.
    pub fn column_validations(&self, column: &str) -> Vec<&Validation> {
        let mut validations: Vec<&Validation> = self.validations_for(column).iter().collect();
        if let Some(association) = self.association_for_foreign_key(column) {
            validations.extend(self.validations_for(&association.name));
        }
        validations
    }

    /// Presence rule on a belongs-to association, keyed by name or foreign key.
    pub fn presence_rule(&self, association: &Association) -> Option<&Validation> {
        let by_name = self.validations_for(&association.name).iter();
        let by_key = association
            .foreign_key()
            .map(|column| self.validations_for(column))
            .unwrap_or(&[])
            .iter();
        by_name
            .chain(by_key)
            .find(|validation| matches!(validation.rule, ValidationRule::Presence))
    }

    /// Uniqueness rule on a column or its owning association.
    pub fn uniqueness_rule(&self, column: &str) -> Option<&Validation> {
        self.column_validations(column)
            .into_iter()
            .find(|validation| matches!(validation.rule, ValidationRule::Uniqueness { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn belongs_to_adds_key_columns() {
        let model = ModelMetadata::new("Bookmark")
            .with_association(Association::polymorphic("bookmarkable", ["Show"]));
        assert!(model.column("bookmarkable_id").is_some());
        assert_eq!(
            model.column("bookmarkable_type").map(|column| column.column_type),
            Some(ColumnType::String)
        );
        assert_eq!(
            model
                .association_for_column("bookmarkable_type")
                .map(|association| association.name.as_str()),
            Some("bookmarkable")
        );
    }

    #[test]
    fn presence_found_by_association_or_key() {
        let model = ModelMetadata::new("Show")
            .with_association(Association::belongs_to("network", "Network"))
            .with_validation("network_id", Validation::presence());
        let network = model.association("network").expect("association");
        assert!(model.presence_rule(network).is_some());
        assert_eq!(model.column_validations("network_id").len(), 1);
    }

    #[test]
    fn auto_managed_columns() {
        let model = ModelMetadata::new("Show").with_timestamps();
        assert!(model.is_auto_managed("id"));
        assert!(model.is_auto_managed("updated_at"));
        assert!(!model.is_auto_managed("name"));
    }
}
