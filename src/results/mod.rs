//! Canonical result types and normalization helpers

pub mod currency;
pub mod types;
pub mod url;

pub use types::{
    bounded_raw_data, NormalizedResult, PriceRange, ProviderExecutionResult, ProviderStatus,
    ProviderStatusSnapshot, RawProviderResult, ScoredResult, MAX_RAW_DATA_BYTES,
};
pub use url::{canonicalize_url, merchant_domain};
