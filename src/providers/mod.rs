//! Sourcing provider module
//!
//! Defines the adapter/executor/normalizer traits and a registry of all
//! configured providers.

mod loader;
mod registry;
mod traits;

// Provider implementations
pub mod catalog;
pub mod marketplace;
pub mod mock;
pub mod websearch;

pub use loader::build_registry;
pub use registry::{ProviderEntry, ProviderRegistry};
pub use traits::*;
