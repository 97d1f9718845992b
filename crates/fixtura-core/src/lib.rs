//! Core contracts and helpers for Fixtura.
//!
//! This crate defines the model metadata types (columns, associations,
//! validation rules), the explicit model registry, and the value/record
//! types shared by the configuration layer and the sampling engine.

pub mod constraints;
pub mod error;
pub mod graph;
pub mod record;
pub mod registry;
pub mod schema;
pub mod types;
pub mod validation;
pub mod value;

pub use constraints::{Condition, Validation, ValidationRule};
pub use error::{Error, Result};
pub use graph::{
    AssociationGraphReport, AssociationGraphSummary, build_association_graph_report,
};
pub use record::Record;
pub use registry::{MetadataSource, ModelRegistry};
pub use schema::{AUTO_TIMESTAMPS, Association, AssociationKind, Column, ModelMetadata};
pub use types::ColumnType;
pub use validation::validate_registry;
pub use value::{Row, Value};

/// Current contract version for serialized model registries.
pub const REGISTRY_VERSION: &str = "0.1";
