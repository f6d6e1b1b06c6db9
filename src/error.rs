//! Error taxonomy for the sourcing pipeline.
//!
//! Per-provider failures never surface here: they are isolated into each
//! provider's `ProviderExecutionResult` so a single outage cannot abort a
//! search. An empty aggregate is likewise an explicit outcome on
//! `SearchResponse`, not an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourcingError {
    /// No extraction input was available: no raw-text override and no
    /// previously stored intent for the request.
    #[error("no extraction input for request {0}")]
    NoExtractionInput(String),

    /// Settings were structurally invalid.
    #[error("invalid settings: {0}")]
    Config(String),

    /// Store access failed outside the retryable upsert path.
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Upsert contention persisted past the retry budget.
    #[error("persistence conflict on {request_id}/{provider}/{canonical_url}")]
    PersistenceConflict {
        request_id: String,
        provider: String,
        canonical_url: String,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
