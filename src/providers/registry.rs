//! Provider registry keyed by provider id

use super::traits::{Executor, Normalizer, QueryAdapter};
use std::collections::HashMap;
use std::sync::Arc;

/// The three pieces that make up one registered provider
#[derive(Clone)]
pub struct ProviderEntry {
    pub adapter: Arc<dyn QueryAdapter>,
    pub executor: Arc<dyn Executor>,
    pub normalizer: Arc<dyn Normalizer>,
}

/// Registry of all configured providers
pub struct ProviderRegistry {
    providers: HashMap<String, ProviderEntry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    pub fn register(
        &mut self,
        adapter: Arc<dyn QueryAdapter>,
        executor: Arc<dyn Executor>,
        normalizer: Arc<dyn Normalizer>,
    ) {
        let id = adapter.provider_id().to_string();
        debug_assert_eq!(id, executor.provider_id());
        debug_assert_eq!(id, normalizer.provider_id());
        self.providers.insert(
            id,
            ProviderEntry {
                adapter,
                executor,
                normalizer,
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<&ProviderEntry> {
        self.providers.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.providers.contains_key(id)
    }

    /// All registered provider ids, sorted for stable iteration
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.providers.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    /// Resolve a requested subset to registered entries, in request order.
    /// Unknown ids are silently dropped; `None` selects every provider.
    pub fn select(&self, requested: Option<&[String]>) -> Vec<(String, ProviderEntry)> {
        match requested {
            Some(ids) => ids
                .iter()
                .filter_map(|id| self.providers.get(id).map(|e| (id.clone(), e.clone())))
                .collect(),
            None => {
                let mut all: Vec<(String, ProviderEntry)> = self
                    .providers
                    .iter()
                    .map(|(id, e)| (id.clone(), e.clone()))
                    .collect();
                all.sort_by(|a, b| a.0.cmp(&b.0));
                all
            }
        }
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::mock::{MockAdapter, MockExecutor, MockNormalizer};

    #[test]
    fn test_register_and_select() {
        let mut registry = ProviderRegistry::new();
        registry.register(
            Arc::new(MockAdapter),
            Arc::new(MockExecutor),
            Arc::new(MockNormalizer),
        );

        assert!(registry.contains("mock"));
        assert_eq!(registry.ids(), vec!["mock"]);

        let selected = registry.select(Some(&["mock".to_string(), "nope".to_string()]));
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].0, "mock");

        let all = registry.select(None);
        assert_eq!(all.len(), 1);
    }
}
