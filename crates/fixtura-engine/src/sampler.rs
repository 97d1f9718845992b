use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDateTime, Utc};
use fixtura_config::{
    ConfigError, SamplerConfig, SamplerOptions, validate_config_against_registry,
};
use fixtura_core::{
    Association, ModelMetadata, ModelRegistry, Record, Row, Value, build_association_graph_report,
    validate_registry,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::customize::{Customizations, ModelCustomization};
use crate::errors::SampleError;
use crate::finder::match_predicate;
use crate::model::SampleReport;
use crate::persistence::Persistence;
use crate::query::Predicate;
use crate::request::{AttrValue, Attributes, FieldValue, NormalizedAttributes, SampleRequest};
use crate::sequence::{Phase, ReferenceSource, Sequence, SequenceContext, build_sequence};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SequenceKey {
    model: String,
    column: String,
    phase: Phase,
    unique: bool,
}

/// Find-or-create sampler over a model registry and a persistence backend.
///
/// Sequences live as long as the sampler, so counters keep advancing across
/// calls. Not meant to be shared between threads.
pub struct Sampler<P: Persistence> {
    pub(crate) registry: Arc<ModelRegistry>,
    pub(crate) customizations: Customizations,
    pub(crate) options: SamplerOptions,
    pub(crate) base_time: NaiveDateTime,
    pub(crate) store: P,
    sequences: HashMap<SequenceKey, Box<dyn Sequence>>,
    /// Models with a creation pipeline currently running, innermost last.
    pub(crate) in_flight: Vec<String>,
    pub(crate) report: SampleReport,
}

impl<P: Persistence> Sampler<P> {
    /// Build a sampler, rejecting inconsistent registries before any sampling.
    pub fn new(registry: ModelRegistry, store: P) -> Result<Self, SampleError> {
        validate_registry(&registry)?;

        let graph = build_association_graph_report(&registry);
        match &graph.cycle {
            Some(cycle) => warn!(
                cycle = ?cycle,
                "association cycle; edges without presence rules are backfilled after insert"
            ),
            None => debug!(
                models = graph.summary.nodes,
                edges = graph.summary.edges,
                order = ?graph.topo_order,
                "association graph is acyclic"
            ),
        }
        if !graph.self_references.is_empty() {
            debug!(models = ?graph.self_references, "self-referencing models");
        }

        let options = SamplerOptions::default();
        let base_time = resolve_base_time(&options);
        Ok(Self {
            registry: Arc::new(registry),
            customizations: Customizations::new(),
            options,
            base_time,
            store,
            sequences: HashMap::new(),
            in_flight: Vec::new(),
            report: SampleReport::new(Uuid::new_v4().to_string()),
        })
    }

    /// Build a sampler from a configuration document checked against `registry`.
    pub fn from_config(
        registry: ModelRegistry,
        store: P,
        config: &SamplerConfig,
    ) -> Result<Self, SampleError> {
        let report = validate_config_against_registry(config, &registry);
        for issue in &report.warnings {
            warn!(code = %issue.code, path = %issue.path, "{}", issue.message);
        }
        if !report.is_ok() {
            return Err(ConfigError::Invalid(report).into());
        }

        let customizations = Customizations::from_config(config)?;
        Ok(Self::new(registry, store)?
            .with_options(config.options.clone())
            .with_customizations(customizations))
    }

    pub fn with_options(mut self, options: SamplerOptions) -> Self {
        self.base_time = resolve_base_time(&options);
        self.options = options;
        self.sequences.clear();
        self
    }

    pub fn with_customizations(mut self, customizations: Customizations) -> Self {
        self.customizations = customizations;
        self.sequences.clear();
        self
    }

    /// Register customizations for `model` in place.
    pub fn customize(&mut self, model: &str) -> &mut ModelCustomization {
        self.sequences.retain(|key, _| key.model != model);
        self.customizations.model_mut(model)
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut P {
        &mut self.store
    }

    pub fn into_store(self) -> P {
        self.store
    }

    pub fn report(&self) -> &SampleReport {
        &self.report
    }

    /// Return a persisted record matching `request`, creating one when none does.
    pub fn sample(&mut self, model: &str, request: SampleRequest) -> Result<Record, SampleError> {
        if request.force_create {
            return self.create_sample(model, request);
        }

        let registry = Arc::clone(&self.registry);
        let meta = registry.require(model)?;
        let attributes = self.normalize(meta, &request)?;
        let predicate = match_predicate(&registry, meta, &attributes)?;

        match self.store.find_first(model, &predicate)? {
            Some(found) => {
                info!(model = %model, id = found.id, "matching record found");
                self.report.record_found(model);
                self.repair(meta, found, &attributes)
            }
            None => self.create_record(meta, &attributes),
        }
    }

    /// Always create a new record, even when a matching one exists.
    pub fn create_sample(
        &mut self,
        model: &str,
        request: SampleRequest,
    ) -> Result<Record, SampleError> {
        let registry = Arc::clone(&self.registry);
        let meta = registry.require(model)?;
        let attributes = self.normalize(meta, &request)?;
        self.create_record(meta, &attributes)
    }

    /// First persisted record matching `request`, without creating or repairing.
    ///
    /// Nested association samples in `request` are still materialized.
    pub fn find(
        &mut self,
        model: &str,
        request: SampleRequest,
    ) -> Result<Option<Record>, SampleError> {
        let registry = Arc::clone(&self.registry);
        let meta = registry.require(model)?;
        let attributes = self.normalize(meta, &request)?;
        let predicate = match_predicate(&registry, meta, &attributes)?;
        Ok(self.store.find_first(model, &predicate)?)
    }

    /// Attach belongs-to targets missing from a found record.
    fn repair(
        &mut self,
        meta: &ModelMetadata,
        record: Record,
        attributes: &NormalizedAttributes,
    ) -> Result<Record, SampleError> {
        self.in_flight.push(meta.name.clone());
        let result = self.repair_associations(meta, &record, attributes);
        self.in_flight.pop();

        let changes = result?;
        if changes.is_empty() {
            return Ok(record);
        }
        let repaired = self.store.update(&record, &changes)?;
        info!(
            model = %meta.name,
            id = repaired.id,
            columns = ?changes.keys().collect::<Vec<_>>(),
            "record repaired"
        );
        self.report.record_repaired(&meta.name);
        Ok(repaired)
    }

    fn repair_associations(
        &mut self,
        meta: &ModelMetadata,
        record: &Record,
        attributes: &NormalizedAttributes,
    ) -> Result<Row, SampleError> {
        let mut changes = Row::new();

        for association in meta.belongs_to() {
            let Some(foreign_key) = association.foreign_key() else {
                continue;
            };
            let current = record.get(foreign_key);

            let target = if current.is_null() {
                let required = meta
                    .presence_rule(association)
                    .is_some_and(|rule| rule.applies_to(&record.attributes));
                let specified = attributes.contains_key(&association.name)
                    || attributes.contains_key(foreign_key);
                if !required || specified {
                    continue;
                }
                self.target_model(meta, association, record)?
            } else {
                let target = self.target_model(meta, association, record)?;
                let Some(id) = current.as_i64() else {
                    continue;
                };
                if self.store.reload(&target, id)?.is_some() {
                    continue;
                }
                target
            };

            if let Some(attached) = self.reference(&target)? {
                changes.insert(foreign_key.to_string(), attached.id_value());
                if let Some(type_column) = &association.foreign_type {
                    changes.insert(type_column.clone(), Value::Text(attached.model.clone()));
                }
            }
        }

        Ok(changes)
    }

    /// Target model of a belongs-to on an existing record.
    fn target_model(
        &self,
        meta: &ModelMetadata,
        association: &Association,
        record: &Record,
    ) -> Result<String, SampleError> {
        let recorded = association
            .foreign_type
            .as_deref()
            .and_then(|column| record.get(column).as_str());
        match (&association.target, recorded) {
            (Some(target), _) => Ok(target.clone()),
            (None, Some(recorded)) => Ok(recorded.to_string()),
            (None, None) => self.polymorphic_target(meta, association),
        }
    }

    /// Concrete model for a polymorphic belongs-to: the configured default,
    /// then the declared candidates, then any other registered model.
    pub(crate) fn polymorphic_target(
        &self,
        meta: &ModelMetadata,
        association: &Association,
    ) -> Result<String, SampleError> {
        let configured = self
            .customizations
            .get(&meta.name)
            .and_then(|customization| customization.polymorphic_defaults.get(&association.name));
        if let Some(model) = configured {
            return Ok(model.clone());
        }
        if let Some(model) = association.polymorphic_targets.first() {
            return Ok(model.clone());
        }
        self.registry
            .model_names()
            .find(|name| *name != meta.name)
            .map(ToString::to_string)
            .ok_or_else(|| SampleError::NoPolymorphicTarget {
                model: meta.name.clone(),
                association: association.name.clone(),
            })
    }

    /// Merge preset and explicit attributes, then materialize nested samples.
    pub(crate) fn normalize(
        &mut self,
        meta: &ModelMetadata,
        request: &SampleRequest,
    ) -> Result<NormalizedAttributes, SampleError> {
        let mut attributes = Attributes::new();
        if let Some(preset) = &request.preset {
            let values = self
                .customizations
                .get(&meta.name)
                .and_then(|customization| customization.presets.get(preset))
                .ok_or_else(|| SampleError::UnknownPreset {
                    model: meta.name.clone(),
                    preset: preset.clone(),
                })?;
            attributes.extend(values.clone());
        }
        attributes.extend(request.attributes.clone());

        for record in &request.records {
            assign_positional(meta, &mut attributes, record)?;
        }

        let mut normalized = NormalizedAttributes::new();
        for (field, value) in attributes {
            let value = self.normalize_field(meta, &field, value)?;
            normalized.insert(field, value);
        }
        Ok(normalized)
    }

    pub(crate) fn normalize_field(
        &mut self,
        meta: &ModelMetadata,
        field: &str,
        value: AttrValue,
    ) -> Result<FieldValue, SampleError> {
        let invalid = |message: &str| SampleError::InvalidAttribute {
            model: meta.name.clone(),
            field: field.to_string(),
            message: message.to_string(),
        };

        if let Some(association) = meta.association(field) {
            return if association.is_belongs_to() {
                let record = self.belongs_to_value(meta, association, value)?;
                Ok(FieldValue::BelongsTo(record))
            } else {
                let records = self.to_many_value(meta, association, value)?;
                Ok(FieldValue::HasMany(records))
            };
        }

        let column = meta.column(field).ok_or_else(|| SampleError::UnknownField {
            model: meta.name.clone(),
            field: field.to_string(),
        })?;
        match value {
            AttrValue::Value(value) => value
                .coerce(field, column.column_type)
                .map(FieldValue::Scalar)
                .map_err(|err| invalid(&err.to_string())),
            _ => Err(invalid("expected a scalar value")),
        }
    }

    fn belongs_to_value(
        &mut self,
        meta: &ModelMetadata,
        association: &Association,
        value: AttrValue,
    ) -> Result<Option<Record>, SampleError> {
        let invalid = |message: String| SampleError::InvalidAttribute {
            model: meta.name.clone(),
            field: association.name.clone(),
            message,
        };

        match value {
            AttrValue::Value(Value::Null) => Ok(None),
            AttrValue::Value(Value::Int(id)) => {
                let target = association.target.as_deref().ok_or_else(|| {
                    invalid("a polymorphic association needs a record, not an id".to_string())
                })?;
                self.store
                    .reload(target, id)?
                    .map(Some)
                    .ok_or_else(|| SampleError::RecordNotFound {
                        model: target.to_string(),
                        id,
                    })
            }
            AttrValue::Value(other) => Err(invalid(format!("expected a record id, got {other}"))),
            AttrValue::Record(record) => {
                if accepts(association, &record.model) {
                    Ok(Some(record))
                } else {
                    Err(invalid(format!("cannot hold a {} record", record.model)))
                }
            }
            AttrValue::Sample(request) => {
                let target = match (&request.model, &association.target) {
                    (Some(model), _) => model.clone(),
                    (None, Some(target)) => target.clone(),
                    (None, None) => self.polymorphic_target(meta, association)?,
                };
                Ok(Some(self.sample(&target, *request)?))
            }
            AttrValue::Records(_) | AttrValue::Samples(_) => {
                Err(invalid("expected a single record".to_string()))
            }
        }
    }

    fn to_many_value(
        &mut self,
        meta: &ModelMetadata,
        association: &Association,
        value: AttrValue,
    ) -> Result<Vec<Record>, SampleError> {
        let target = association.target.clone().unwrap_or_default();
        let mut records = match value {
            AttrValue::Records(records) => records,
            AttrValue::Record(record) => vec![record],
            AttrValue::Samples(requests) => requests
                .into_iter()
                .map(|request| self.sample(&target, request))
                .collect::<Result<Vec<_>, _>>()?,
            AttrValue::Sample(request) => vec![self.sample(&target, *request)?],
            AttrValue::Value(_) => {
                return Err(SampleError::InvalidAttribute {
                    model: meta.name.clone(),
                    field: association.name.clone(),
                    message: "expected records or nested samples".to_string(),
                });
            }
        };
        // The same record listed twice is one member of the set.
        let mut seen = HashSet::new();
        records.retain(|record| seen.insert((record.model.clone(), record.id)));
        Ok(records)
    }

    /// Next value of the cached sequence for `column`.
    pub(crate) fn next_value(
        &mut self,
        meta: &ModelMetadata,
        column: &str,
        phase: Phase,
        row: &Row,
    ) -> Result<Value, SampleError> {
        let unique = self
            .customizations
            .get(&meta.name)
            .is_some_and(|customization| customization.is_forced_unique(column));
        let key = SequenceKey {
            model: meta.name.clone(),
            column: column.to_string(),
            phase,
            unique,
        };

        let mut sequence = match self.sequences.remove(&key) {
            Some(sequence) => sequence,
            None => build_sequence(meta, column, phase, &self.options, self.base_time, unique)?,
        };
        let value = {
            let mut ctx = SequenceContext {
                source: self,
                row,
                attempt: 0,
            };
            sequence.next(&mut ctx)
        };
        self.sequences.insert(key, sequence);
        value
    }

    fn is_in_flight(&self, model: &str) -> bool {
        self.in_flight.iter().any(|name| name == model)
    }
}

impl<P: Persistence> ReferenceSource for Sampler<P> {
    fn record_exists(&self, record: &Record) -> Result<bool, SampleError> {
        Ok(self.store.reload(&record.model, record.id)?.is_some())
    }

    fn reference(&mut self, model: &str) -> Result<Option<Record>, SampleError> {
        if self.is_in_flight(model) {
            return Ok(self.store.find_first(model, &Predicate::any())?);
        }
        self.sample(model, SampleRequest::new()).map(Some)
    }

    fn fresh_reference(&mut self, model: &str) -> Result<Option<Record>, SampleError> {
        if self.is_in_flight(model) {
            return Ok(None);
        }
        self.create_sample(model, SampleRequest::new()).map(Some)
    }

    fn is_taken(&self, model: &str, predicate: &Predicate) -> Result<bool, SampleError> {
        Ok(self.store.exists(model, predicate)?)
    }

    fn record_retry(&mut self, _model: &str, _field: &str) {
        self.report.record_retry();
    }
}

fn resolve_base_time(options: &SamplerOptions) -> NaiveDateTime {
    options
        .base_time
        .unwrap_or_else(|| Utc::now().naive_utc())
}

/// Whether a belongs-to or to-many association can hold a `model` record.
fn accepts(association: &Association, model: &str) -> bool {
    if association.polymorphic {
        association
            .polymorphic_targets
            .iter()
            .any(|target| target == model)
    } else {
        association.target.as_deref() == Some(model)
    }
}

fn assign_positional(
    meta: &ModelMetadata,
    attributes: &mut Attributes,
    record: &Record,
) -> Result<(), SampleError> {
    let candidates: Vec<&Association> = meta
        .associations
        .iter()
        .filter(|association| accepts(association, &record.model))
        .collect();

    let association = match candidates.as_slice() {
        [] => {
            return Err(SampleError::UnknownField {
                model: meta.name.clone(),
                field: record.model.clone(),
            });
        }
        [association] => *association,
        _ => {
            return Err(SampleError::AmbiguousAssociationTarget {
                model: meta.name.clone(),
                target: record.model.clone(),
                candidates: candidates
                    .iter()
                    .map(|association| association.name.clone())
                    .collect(),
            });
        }
    };

    if association.is_to_many() {
        match attributes.get_mut(&association.name) {
            Some(AttrValue::Records(records)) => records.push(record.clone()),
            _ => {
                attributes.insert(
                    association.name.clone(),
                    AttrValue::Records(vec![record.clone()]),
                );
            }
        }
    } else {
        attributes.insert(association.name.clone(), AttrValue::Record(record.clone()));
    }
    Ok(())
}
