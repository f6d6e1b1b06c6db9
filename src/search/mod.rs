//! Search orchestration module
//!
//! Coordinates one search run end to end: provider fan-out under
//! deadlines, scoring and aggregation, and the service facade that ties
//! in intent extraction and persistence.

mod aggregator;
mod executor;
mod scorer;
mod service;

pub use aggregator::{aggregate, AggregatedResults};
pub use executor::{build_queries, ProviderRun, SearchExecutor};
pub use scorer::score_result;
pub use service::{SearchRequest, SearchResponse, SearchService};
