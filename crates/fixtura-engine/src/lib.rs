//! Find-or-create sampling of persisted records under validation rules.
//!
//! The [`Sampler`] resolves every column of a requested model from explicit
//! attributes, configured defaults and validation-driven sequences, creates
//! records in two passes so that association cycles terminate, and reuses
//! existing rows whenever they match a request exactly.

pub mod customize;
pub mod errors;
pub mod finder;
pub mod logging;
pub mod memory;
pub mod model;
pub mod persistence;
pub mod query;
pub mod request;
pub mod sequence;

mod pipeline;
mod resolver;
mod sampler;
mod unique;

pub use customize::{BeforeSave, Customizations, DefaultValue, Draft, ModelCustomization};
pub use errors::SampleError;
pub use fixtura_config::SamplerOptions;
pub use memory::InMemoryStore;
pub use model::{ModelReport, SampleReport};
pub use persistence::{Persistence, PersistenceError, Violation};
pub use query::Predicate;
pub use request::{AttrValue, Attributes, FieldValue, NormalizedAttributes, SampleRequest};
pub use resolver::ResolvedAttributes;
pub use sampler::Sampler;
pub use sequence::Phase;
