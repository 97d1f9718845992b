use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-model counters for a sampling session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelReport {
    pub created: u64,
    pub found: u64,
    pub repaired: u64,
    pub backfilled: u64,
}

/// Report for a sampling session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleReport {
    pub session_id: String,
    pub models: BTreeMap<String, ModelReport>,
    pub uniqueness_retries: u64,
}

impl SampleReport {
    pub fn new(session_id: String) -> Self {
        Self {
            session_id,
            models: BTreeMap::new(),
            uniqueness_retries: 0,
        }
    }

    pub fn model(&self, model: &str) -> ModelReport {
        self.models.get(model).cloned().unwrap_or_default()
    }

    fn entry(&mut self, model: &str) -> &mut ModelReport {
        self.models.entry(model.to_string()).or_default()
    }

    pub fn record_created(&mut self, model: &str) {
        self.entry(model).created += 1;
    }

    pub fn record_found(&mut self, model: &str) {
        self.entry(model).found += 1;
    }

    pub fn record_repaired(&mut self, model: &str) {
        self.entry(model).repaired += 1;
    }

    pub fn record_backfilled(&mut self, model: &str) {
        self.entry(model).backfilled += 1;
    }

    pub fn record_retry(&mut self) {
        self.uniqueness_retries += 1;
    }
}
