use std::collections::BTreeMap;
use std::sync::OnceLock;

use chrono::Utc;
use fixtura_core::{
    AUTO_TIMESTAMPS, Association, ModelMetadata, ModelRegistry, Record, Row, Validation,
    ValidationRule, Value,
};
use regex::Regex;

use crate::persistence::{Persistence, PersistenceError, Violation};
use crate::query::Predicate;

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

fn email_pattern() -> Option<&'static Regex> {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(EMAIL_PATTERN).ok()).as_ref()
}

#[derive(Debug, Clone, Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, Row>,
}

/// Reference persistence backend holding rows in memory.
///
/// Enforces every validation rule of the registry on insert and update, the
/// way a database-backed model layer would, and evaluates matching
/// predicates including correlated association counts. Null values never
/// collide under uniqueness rules.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    registry: ModelRegistry,
    tables: BTreeMap<String, Table>,
}

impl InMemoryStore {
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry,
            tables: BTreeMap::new(),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// All rows of `model` in primary key order.
    pub fn records(&self, model: &str) -> Vec<Record> {
        self.tables
            .get(model)
            .map(|table| {
                table
                    .rows
                    .iter()
                    .map(|(id, row)| Record::new(model, *id, row.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self, model: &str) -> usize {
        self.tables
            .get(model)
            .map(|table| table.rows.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, model: &str) -> bool {
        self.len(model) == 0
    }

    fn meta(&self, model: &str) -> Result<&ModelMetadata, PersistenceError> {
        self.registry
            .model(model)
            .ok_or_else(|| PersistenceError::UnknownModel(model.to_string()))
    }

    fn rows<'a>(&'a self, model: &str) -> impl Iterator<Item = (i64, &'a Row)> + 'a {
        self.tables
            .get(model)
            .into_iter()
            .flat_map(|table| table.rows.iter().map(|(id, row)| (*id, row)))
    }

    /// Apply `attributes` onto `row`, coercing to column types.
    fn assign(
        meta: &ModelMetadata,
        row: &mut Row,
        attributes: &Row,
        violations: &mut Vec<Violation>,
    ) -> Result<(), PersistenceError> {
        for (name, value) in attributes {
            if meta.is_auto_managed(name) {
                continue;
            }
            let column = meta.column(name).ok_or_else(|| {
                PersistenceError::Backend(format!("unknown column {}.{}", meta.name, name))
            })?;
            match value.clone().coerce(name, column.column_type) {
                Ok(coerced) => {
                    row.insert(name.clone(), coerced);
                }
                Err(err) => violations.push(Violation::new(
                    name.clone(),
                    "type",
                    err.to_string(),
                    value.clone(),
                )),
            }
        }
        Ok(())
    }

    fn check(&self, meta: &ModelMetadata, row: &Row, id: i64) -> Vec<Violation> {
        let mut violations = Vec::new();

        for (field, validations) in &meta.validations {
            let (column, association) = if meta.column(field).is_some() {
                (field.as_str(), meta.association_for_foreign_key(field))
            } else {
                match meta.association(field) {
                    Some(association) if association.is_belongs_to() => {
                        match association.foreign_key() {
                            Some(foreign_key) => (foreign_key, Some(association)),
                            None => continue,
                        }
                    }
                    _ => continue,
                }
            };
            let value = row.get(column).unwrap_or(&Value::Null);

            for validation in validations {
                if !validation.applies_to(row) || validation.skips(value) {
                    continue;
                }
                if let Some(message) =
                    self.violation(meta, row, id, column, value, association, validation)
                {
                    violations.push(Violation::new(
                        field.clone(),
                        validation.rule.name(),
                        message,
                        value.clone(),
                    ));
                }
            }
        }

        violations
    }

    #[allow(clippy::too_many_arguments)]
    fn violation(
        &self,
        meta: &ModelMetadata,
        row: &Row,
        id: i64,
        column: &str,
        value: &Value,
        association: Option<&Association>,
        validation: &Validation,
    ) -> Option<String> {
        match &validation.rule {
            ValidationRule::Presence => {
                if value.is_blank() {
                    Some("can't be blank".to_string())
                } else if association.is_some_and(|association| {
                    !self.target_exists(association, row, value)
                }) {
                    Some("must exist".to_string())
                } else {
                    None
                }
            }
            ValidationRule::Uniqueness { scope } => {
                if value.is_null() {
                    return None;
                }
                let taken = self.rows(&meta.name).any(|(other_id, other)| {
                    other_id != id
                        && other.get(column).is_some_and(|other| other.same_as(value))
                        && scope.iter().all(|scoped| {
                            let mine = row.get(scoped).unwrap_or(&Value::Null);
                            let theirs = other.get(scoped).unwrap_or(&Value::Null);
                            mine.same_as(theirs)
                        })
                });
                taken.then(|| "has already been taken".to_string())
            }
            ValidationRule::Inclusion { within } => {
                let included = within.iter().any(|allowed| value.matches_json(allowed));
                (!included).then(|| "is not included in the list".to_string())
            }
            ValidationRule::Length { .. } => {
                let (min, max) = validation.length_bounds()?;
                let length = text_length(value);
                match max {
                    _ if length < min => {
                        Some(format!("is too short (minimum is {min} characters)"))
                    }
                    Some(max) if length > max => {
                        Some(format!("is too long (maximum is {max} characters)"))
                    }
                    _ => None,
                }
            }
            ValidationRule::EmailFormat => {
                let valid = match (value.as_str(), email_pattern()) {
                    (Some(text), Some(pattern)) => pattern.is_match(text),
                    _ => false,
                };
                (!valid).then(|| "is not a valid email".to_string())
            }
        }
    }

    fn target_exists(&self, association: &Association, row: &Row, value: &Value) -> bool {
        let Some(id) = value.as_i64() else {
            return false;
        };
        let target = match (&association.target, &association.foreign_type) {
            (Some(target), _) => target.as_str(),
            (None, Some(type_column)) => match row.get(type_column).and_then(Value::as_str) {
                Some(target) => target,
                None => return false,
            },
            (None, None) => return false,
        };
        self.tables
            .get(target)
            .is_some_and(|table| table.rows.contains_key(&id))
    }

    fn matches(&self, meta: &ModelMetadata, row: &Row, predicate: &Predicate) -> bool {
        match predicate {
            Predicate::All(predicates) => predicates
                .iter()
                .all(|predicate| self.matches(meta, row, predicate)),
            Predicate::Eq { column, value } => {
                row.get(column).is_some_and(|current| current.same_as(value))
            }
            Predicate::IsNull { column } => row.get(column).is_none_or(Value::is_null),
            Predicate::In { column, values } => row
                .get(column)
                .is_some_and(|current| values.iter().any(|value| current.same_as(value))),
            Predicate::NotIn { column, values } => row.get(column).is_some_and(|current| {
                !current.is_null() && !values.iter().any(|value| current.same_as(value))
            }),
            Predicate::Related {
                model,
                owner_column,
                filter,
                count,
            } => {
                let Some(related) = self.registry.model(model) else {
                    return false;
                };
                let owner = row.get(&meta.primary_key).unwrap_or(&Value::Null);
                let matched = self
                    .rows(model)
                    .filter(|(_, other)| {
                        other
                            .get(owner_column)
                            .is_some_and(|value| value.same_as(owner))
                            && self.matches(related, other, filter)
                    })
                    .count();
                matched == *count
            }
        }
    }
}

fn text_length(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::Text(text) => text.chars().count(),
        Value::Binary(bytes) => bytes.len(),
        other => other.to_string().chars().count(),
    }
}

impl Persistence for InMemoryStore {
    fn count(&self, model: &str, predicate: &Predicate) -> Result<usize, PersistenceError> {
        let meta = self.meta(model)?;
        Ok(self
            .rows(model)
            .filter(|(_, row)| self.matches(meta, row, predicate))
            .count())
    }

    fn find_first(
        &self,
        model: &str,
        predicate: &Predicate,
    ) -> Result<Option<Record>, PersistenceError> {
        let meta = self.meta(model)?;
        Ok(self
            .rows(model)
            .find(|(_, row)| self.matches(meta, row, predicate))
            .map(|(id, row)| Record::new(model, id, row.clone())))
    }

    fn reload(&self, model: &str, id: i64) -> Result<Option<Record>, PersistenceError> {
        self.meta(model)?;
        Ok(self
            .tables
            .get(model)
            .and_then(|table| table.rows.get(&id))
            .map(|row| Record::new(model, id, row.clone())))
    }

    fn insert(&mut self, model: &str, attributes: &Row) -> Result<Record, PersistenceError> {
        let meta = self.meta(model)?;
        let mut row: Row = meta
            .columns
            .iter()
            .map(|column| (column.name.clone(), Value::Null))
            .collect();
        let mut violations = Vec::new();
        Self::assign(meta, &mut row, attributes, &mut violations)?;

        let now = Utc::now().naive_utc();
        for column in AUTO_TIMESTAMPS {
            if meta.column(column).is_some() {
                row.insert(column.to_string(), Value::DateTime(now));
            }
        }

        let id = self.tables.get(model).map(|table| table.last_id).unwrap_or(0) + 1;
        row.insert(meta.primary_key.clone(), Value::Int(id));

        violations.extend(self.check(meta, &row, id));
        if !violations.is_empty() {
            return Err(PersistenceError::Validation {
                model: model.to_string(),
                violations,
            });
        }

        let table = self.tables.entry(model.to_string()).or_default();
        table.last_id = id;
        table.rows.insert(id, row.clone());
        Ok(Record::new(model, id, row))
    }

    fn update(&mut self, record: &Record, attributes: &Row) -> Result<Record, PersistenceError> {
        let meta = self.meta(&record.model)?;
        let mut row = self
            .tables
            .get(&record.model)
            .and_then(|table| table.rows.get(&record.id))
            .cloned()
            .ok_or_else(|| PersistenceError::NotFound {
                model: record.model.clone(),
                id: record.id,
            })?;
        let mut violations = Vec::new();
        Self::assign(meta, &mut row, attributes, &mut violations)?;

        if meta.column("updated_at").is_some() {
            row.insert(
                "updated_at".to_string(),
                Value::DateTime(Utc::now().naive_utc()),
            );
        }

        violations.extend(self.check(meta, &row, record.id));
        if !violations.is_empty() {
            return Err(PersistenceError::Validation {
                model: record.model.clone(),
                violations,
            });
        }

        let table = self.tables.entry(record.model.clone()).or_default();
        table.rows.insert(record.id, row.clone());
        Ok(Record::new(record.model.clone(), record.id, row))
    }

    fn delete(&mut self, model: &str, id: i64) -> Result<bool, PersistenceError> {
        self.meta(model)?;
        Ok(self
            .tables
            .get_mut(model)
            .is_some_and(|table| table.rows.remove(&id).is_some()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fixtura_core::{Association, ColumnType, Condition};

    fn registry() -> ModelRegistry {
        ModelRegistry::new()
            .with_model(
                ModelMetadata::new("Network")
                    .with_column("name", ColumnType::String)
                    .with_validation("name", Validation::presence())
                    .with_validation("name", Validation::uniqueness()),
            )
            .with_model(
                ModelMetadata::new("Show")
                    .with_column("name", ColumnType::String)
                    .with_column("status", ColumnType::String)
                    .with_timestamps()
                    .with_association(Association::belongs_to("network", "Network"))
                    .with_validation("network", Validation::presence())
                    .with_validation("name", Validation::scoped_uniqueness(["network_id"]))
                    .with_validation(
                        "status",
                        Validation::inclusion(vec![
                            serde_json::json!("airing"),
                            serde_json::json!("ended"),
                        ])
                        .allow_nil(),
                    ),
            )
    }

    fn row(values: &[(&str, Value)]) -> Row {
        values
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn insert_assigns_ids_and_timestamps() {
        let mut store = InMemoryStore::new(registry());
        let network = store
            .insert("Network", &row(&[("name", Value::from("HBO"))]))
            .expect("insert network");
        let show = store
            .insert(
                "Show",
                &row(&[
                    ("name", Value::from("Lost")),
                    ("network_id", Value::Int(network.id)),
                ]),
            )
            .expect("insert show");
        assert_eq!(show.id, 1);
        assert!(matches!(show.get("created_at"), Value::DateTime(_)));
        assert_eq!(show.get("status"), &Value::Null);
    }

    #[test]
    fn rejects_missing_association_target() {
        let mut store = InMemoryStore::new(registry());
        let err = store
            .insert(
                "Show",
                &row(&[("name", Value::from("Lost")), ("network_id", Value::Int(9))]),
            )
            .expect_err("dangling network");
        match err {
            PersistenceError::Validation { violations, .. } => {
                assert_eq!(violations[0].field, "network");
                assert_eq!(violations[0].message, "must exist");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn scoped_uniqueness_only_collides_within_scope() {
        let mut store = InMemoryStore::new(registry());
        let hbo = store
            .insert("Network", &row(&[("name", Value::from("HBO"))]))
            .expect("hbo");
        let abc = store
            .insert("Network", &row(&[("name", Value::from("ABC"))]))
            .expect("abc");
        let show = |network: &Record| {
            row(&[
                ("name", Value::from("Pilot")),
                ("network_id", Value::Int(network.id)),
            ])
        };
        store.insert("Show", &show(&hbo)).expect("first");
        store.insert("Show", &show(&abc)).expect("other scope");
        assert!(store.insert("Show", &show(&hbo)).is_err());
    }

    #[test]
    fn related_counts_are_correlated_to_the_owner() {
        let mut store = InMemoryStore::new(registry());
        let hbo = store
            .insert("Network", &row(&[("name", Value::from("HBO"))]))
            .expect("hbo");
        store
            .insert("Network", &row(&[("name", Value::from("ABC"))]))
            .expect("abc");
        store
            .insert(
                "Show",
                &row(&[
                    ("name", Value::from("Lost")),
                    ("network_id", Value::Int(hbo.id)),
                ]),
            )
            .expect("show");

        let with_one_show = Predicate::related("Show", "network_id", Predicate::any(), 1);
        let found = store
            .find_first("Network", &with_one_show)
            .expect("query")
            .expect("hbo matches");
        assert!(found.is_same(&hbo));
        let without_shows = Predicate::related("Show", "network_id", Predicate::any(), 0);
        assert_eq!(store.count("Network", &without_shows).expect("count"), 1);
    }

    #[test]
    fn conditional_rules_follow_the_row() {
        let registry = ModelRegistry::new().with_model(
            ModelMetadata::new("Subscription")
                .with_column("plan", ColumnType::String)
                .with_column("card", ColumnType::String)
                .with_validation(
                    "card",
                    Validation::presence().when(Condition::FieldEquals {
                        field: "plan".to_string(),
                        value: serde_json::json!("paid"),
                    }),
                ),
        );
        let mut store = InMemoryStore::new(registry);
        store
            .insert("Subscription", &row(&[("plan", Value::from("free"))]))
            .expect("free plan needs no card");
        assert!(
            store
                .insert("Subscription", &row(&[("plan", Value::from("paid"))]))
                .is_err()
        );
    }

    #[test]
    fn delete_then_reload_misses() {
        let mut store = InMemoryStore::new(registry());
        let network = store
            .insert("Network", &row(&[("name", Value::from("HBO"))]))
            .expect("insert");
        assert!(store.delete("Network", network.id).expect("delete"));
        assert!(store.reload("Network", network.id).expect("reload").is_none());
        assert!(!store.delete("Network", network.id).expect("second delete"));
    }
}
