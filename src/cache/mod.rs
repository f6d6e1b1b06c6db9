//! Caching module for raw provider responses
//!
//! Keyed by the full provider query (id, text, params) so a repeated search
//! within the TTL skips the provider round trip entirely.

use crate::results::RawProviderResult;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Cache of raw provider results per query
pub struct ProviderCache {
    cache: Cache<String, Arc<Vec<RawProviderResult>>>,
}

impl ProviderCache {
    /// Create a new provider cache with specified TTL
    pub fn new(ttl_seconds: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(ttl_seconds))
            .max_capacity(max_capacity)
            .build();

        Self { cache }
    }

    pub async fn get(&self, key: &str) -> Option<Arc<Vec<RawProviderResult>>> {
        self.cache.get(key).await
    }

    pub async fn set(&self, key: String, value: Vec<RawProviderResult>) {
        self.cache.insert(key, Arc::new(value)).await;
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
    }

    pub fn size(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for ProviderCache {
    fn default() -> Self {
        Self::new(300, 1_000)
    }
}
