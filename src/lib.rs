//! Sourcing-RS: a multi-provider procurement search aggregator.
//!
//! Given a buyer's free-form need, the pipeline extracts a structured
//! [`SearchIntent`], fans out to every configured external provider
//! concurrently, normalizes the wildly different response shapes into one
//! canonical schema, scores and ranks the combined set, and upserts the
//! results as durable [`store::Bid`] records keyed by canonical URL.

pub mod cache;
pub mod config;
pub mod error;
pub mod intent;
pub mod network;
pub mod providers;
pub mod results;
pub mod search;
pub mod store;

pub use config::Settings;
pub use error::SourcingError;
pub use intent::SearchIntent;
pub use results::{NormalizedResult, ProviderStatus, ScoredResult};
pub use search::{SearchRequest, SearchResponse, SearchService};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default per-provider fetch timeout in seconds
pub const DEFAULT_PROVIDER_TIMEOUT: f64 = 7.0;

/// Default overall search deadline in seconds
pub const DEFAULT_OVERALL_DEADLINE: f64 = 11.0;

/// Below this extraction confidence the caller should ask a clarifying
/// question before committing to a full multi-provider search.
pub const CLARIFY_CONFIDENCE_THRESHOLD: f64 = 0.6;
