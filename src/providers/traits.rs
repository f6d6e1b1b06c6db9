//! Provider traits and query types
//!
//! Each provider contributes three pieces: a query adapter that turns a
//! search intent into provider-shaped parameters, an executor that performs
//! the fetch, and a normalizer that maps one raw payload item into the
//! common result shape.

use crate::intent::{taxonomy, FeatureValue, SearchIntent};
use crate::network::HttpClient;
use crate::results::{NormalizedResult, RawProviderResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// A provider-ready query: the text to search for plus any provider-native
/// parameters (filters, locale, paging).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderQuery {
    pub provider_id: String,
    pub query_string: String,
    pub params: BTreeMap<String, serde_json::Value>,
}

impl ProviderQuery {
    pub fn new(provider_id: impl Into<String>, query_string: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            query_string: query_string.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Stable cache key covering the query text and every parameter
    pub fn cache_key(&self) -> String {
        let params = serde_json::to_string(&self.params).unwrap_or_default();
        format!("{}|{}|{}", self.provider_id, self.query_string, params)
    }
}

/// Builds a provider-shaped query from a structured intent
pub trait QueryAdapter: Send + Sync {
    fn provider_id(&self) -> &str;

    fn build_query(&self, intent: &SearchIntent) -> ProviderQuery;

    /// Whether the provider applies price bounds server-side. Results from
    /// such providers are exempt from the aggregator's post-filter.
    fn supports_native_price_filter(&self) -> bool {
        false
    }
}

/// Performs the actual fetch for one provider
#[async_trait]
pub trait Executor: Send + Sync {
    fn provider_id(&self) -> &str;

    async fn fetch(
        &self,
        client: &HttpClient,
        query: &ProviderQuery,
    ) -> anyhow::Result<Vec<RawProviderResult>>;
}

/// Maps one raw payload item into the common result shape
pub trait Normalizer: Send + Sync {
    fn provider_id(&self) -> &str;

    fn normalize(&self, raw: &RawProviderResult) -> anyhow::Result<NormalizedResult>;
}

/// Normalize a batch, skipping items the normalizer rejects. One malformed
/// payload never discards the rest of a provider's results.
pub fn normalize_batch(
    normalizer: &dyn Normalizer,
    raws: &[RawProviderResult],
) -> Vec<NormalizedResult> {
    let mut normalized = Vec::with_capacity(raws.len());
    for raw in raws {
        match normalizer.normalize(raw) {
            Ok(result) => normalized.push(result),
            Err(e) => {
                warn!(
                    provider = normalizer.provider_id(),
                    "skipping unnormalizable result: {e}"
                );
            }
        }
    }
    normalized
}

/// Ordered, casefold-deduplicated query terms drawn from an intent:
/// brand, model, product name, category label, keywords, feature values.
pub fn build_query_terms(intent: &SearchIntent) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    let mut seen: Vec<String> = Vec::new();

    let mut push = |term: &str, terms: &mut Vec<String>, seen: &mut Vec<String>| {
        let trimmed = term.trim();
        if trimmed.is_empty() {
            return;
        }
        let folded = trimmed.to_lowercase();
        if seen.iter().any(|s| *s == folded) {
            return;
        }
        seen.push(folded);
        terms.push(trimmed.to_string());
    };

    if let Some(ref brand) = intent.brand {
        push(brand, &mut terms, &mut seen);
    }
    if let Some(ref model) = intent.model {
        push(model, &mut terms, &mut seen);
    }
    if let Some(ref name) = intent.product_name {
        push(name, &mut terms, &mut seen);
    } else if intent.product_category != "unknown" {
        push(
            &taxonomy::resolve_category_label(&intent.product_category),
            &mut terms,
            &mut seen,
        );
    }
    for keyword in &intent.keywords {
        push(keyword, &mut terms, &mut seen);
    }
    for value in intent.features.values() {
        match value {
            FeatureValue::One(v) => push(v, &mut terms, &mut seen),
            FeatureValue::Many(vs) => {
                for v in vs {
                    push(v, &mut terms, &mut seen);
                }
            }
        }
    }

    terms
}

/// The default query text: all terms joined with spaces
pub fn build_query_string(intent: &SearchIntent) -> String {
    build_query_terms(intent).join(" ")
}
