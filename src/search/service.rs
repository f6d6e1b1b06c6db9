//! End-to-end search orchestration: intent, queries, execution,
//! normalization, aggregation, persistence.

use super::aggregator::{aggregate, AggregatedResults};
use super::executor::{build_queries, ProviderRun, SearchExecutor};
use crate::cache::ProviderCache;
use crate::config::{ScoringWeights, Settings};
use crate::error::SourcingError;
use crate::intent::{
    extract_search_intent, ExtractionContext, IntentExtractor, SearchIntent,
    INTENT_SCHEMA_VERSION,
};
use crate::network::HttpClient;
use crate::providers::ProviderRegistry;
use crate::results::{PriceRange, ProviderStatus, ProviderStatusSnapshot, ScoredResult};
use crate::store::{Bid, Store};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// One search invocation against a request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// The owning request id bids attach to
    pub request_id: String,
    /// Fresh buyer text; when present it wins over any stored intent
    pub raw_text: Option<String>,
    /// Restrict to these provider ids; `None` means all registered
    pub providers: Option<Vec<String>>,
}

impl SearchRequest {
    pub fn new(request_id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            raw_text: Some(raw_text.into()),
            providers: None,
        }
    }
}

/// The full outcome of one search run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub run_id: String,
    pub results: Vec<ScoredResult>,
    pub provider_statuses: Vec<ProviderStatusSnapshot>,
    pub price_range: Option<PriceRange>,
    pub providers_succeeded: usize,
    pub providers_failed: usize,
    /// Human advisory when the run deserves a caveat
    pub advisory: Option<String>,
    /// An empty ranked set is a valid outcome, flagged rather than errored
    pub is_empty: bool,
    pub intent: SearchIntent,
}

/// Orchestrates the whole pipeline for a search request
pub struct SearchService {
    registry: Arc<ProviderRegistry>,
    executor: SearchExecutor,
    store: Store,
    extractor: Option<IntentExtractor>,
    weights: ScoringWeights,
}

impl SearchService {
    pub fn new(
        settings: &Settings,
        registry: Arc<ProviderRegistry>,
        store: Store,
    ) -> Result<Self, SourcingError> {
        let client = HttpClient::with_settings(&settings.outgoing)
            .map_err(|e| SourcingError::Config(e.to_string()))?;
        let cache = Arc::new(ProviderCache::new(
            settings.search.cache_ttl_secs,
            settings.search.cache_capacity,
        ));
        let executor = SearchExecutor::new(
            client,
            cache,
            Duration::from_secs_f64(settings.search.provider_timeout_secs),
            Duration::from_secs_f64(settings.search.overall_deadline_secs),
        );
        Ok(Self {
            registry,
            executor,
            store,
            extractor: IntentExtractor::from_settings(&settings.intent),
            weights: settings.search.scoring,
        })
    }

    /// Run one search: extract or load the intent, fan out to providers,
    /// rank, persist, and report per-provider status.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, SourcingError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let intent = self.resolve_intent(request).await?;

        info!(
            run_id = %run_id,
            request_id = %request.request_id,
            category = %intent.product_category,
            confidence = intent.confidence,
            "starting search run"
        );

        let queries = build_queries(&self.registry, &intent, request.providers.as_deref());
        let audit: Vec<_> = queries.iter().map(|(_, q)| q.clone()).collect();
        self.store
            .save_query_audit(&request.request_id, &audit)
            .await?;

        let runs = self.executor.execute(queries).await;
        let aggregated = self.normalize_and_rank(&runs, &intent);

        let normalized_at = chrono::Utc::now();
        for scored in &aggregated.ranked {
            let bid = Bid::from_result(
                &request.request_id,
                &scored.result,
                INTENT_SCHEMA_VERSION,
                normalized_at,
            )?;
            self.store.upsert_bid(&bid).await?;
        }

        let mut provider_statuses: Vec<ProviderStatusSnapshot> =
            runs.iter().map(|run| run.execution.snapshot()).collect();
        provider_statuses.sort_by(|a, b| a.provider_id.cmp(&b.provider_id));

        let providers_succeeded = provider_statuses.iter().filter(|s| s.status.is_ok()).count();
        let providers_failed = provider_statuses.len() - providers_succeeded;
        let is_empty = aggregated.ranked.is_empty();
        let advisory = build_advisory(&intent, &provider_statuses, is_empty);

        info!(
            run_id = %run_id,
            results = aggregated.ranked.len(),
            providers_succeeded,
            providers_failed,
            "search run finished"
        );

        Ok(SearchResponse {
            run_id,
            results: aggregated.ranked,
            provider_statuses,
            price_range: aggregated.price_range,
            providers_succeeded,
            providers_failed,
            advisory,
            is_empty,
            intent,
        })
    }

    /// Fresh text wins over a stored intent; with neither, the request
    /// cannot be searched.
    async fn resolve_intent(&self, request: &SearchRequest) -> Result<SearchIntent, SourcingError> {
        if let Some(text) = request.raw_text.as_deref().filter(|t| !t.trim().is_empty()) {
            let ctx = ExtractionContext::from_text(text);
            let intent = extract_search_intent(self.extractor.as_ref(), &ctx).await;
            self.store.save_intent(&request.request_id, &intent).await?;
            return Ok(intent);
        }
        match self.store.load_intent(&request.request_id).await? {
            Some(intent) => Ok(intent),
            None => Err(SourcingError::NoExtractionInput(request.request_id.clone())),
        }
    }

    fn normalize_and_rank(&self, runs: &[ProviderRun], intent: &SearchIntent) -> AggregatedResults {
        let mut provider_results = Vec::with_capacity(runs.len());
        for run in runs {
            if !run.execution.status.is_ok() {
                continue;
            }
            let Some(entry) = self.registry.get(&run.provider_id) else {
                warn!(provider = %run.provider_id, "results from unregistered provider dropped");
                continue;
            };
            let normalized =
                crate::providers::normalize_batch(entry.normalizer.as_ref(), &run.execution.results);
            provider_results.push((run.provider_id.clone(), run.native_price_filter, normalized));
        }
        aggregate(provider_results, intent, &self.weights)
    }
}

fn build_advisory(
    intent: &SearchIntent,
    statuses: &[ProviderStatusSnapshot],
    is_empty: bool,
) -> Option<String> {
    if is_empty && !statuses.is_empty() {
        let exhausted = statuses
            .iter()
            .filter(|s| s.status == ProviderStatus::Exhausted)
            .count();
        let rate_limited = statuses
            .iter()
            .filter(|s| s.status == ProviderStatus::RateLimited)
            .count();
        let all_failed = statuses.iter().all(|s| !s.status.is_ok());

        if exhausted == statuses.len() {
            return Some(
                "Search providers have exhausted their quota. Please try again later or contact support."
                    .to_string(),
            );
        }
        if rate_limited > 0 {
            return Some(
                "Search is temporarily rate-limited. Please wait a moment and try again."
                    .to_string(),
            );
        }
        if all_failed {
            return Some("Unable to search at this time. Please try again later.".to_string());
        }
    }

    if !intent.has_price_bounds() || intent.needs_clarification() {
        return Some(
            "Results may be broad. Adding a budget or more detail will narrow them down."
                .to_string(),
        );
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MockSettings, ProvidersSettings};
    use crate::providers::mock::{MockAdapter, MockExecutor, MockNormalizer};
    use crate::providers::{
        build_registry, Executor, Normalizer, ProviderQuery, QueryAdapter,
    };
    use crate::results::{NormalizedResult, ProviderStatus, RawProviderResult};
    use async_trait::async_trait;

    async fn service() -> SearchService {
        let settings = Settings::default();
        let registry = Arc::new(build_registry(&ProvidersSettings {
            mock: MockSettings {
                enabled: Some(true),
            },
            ..Default::default()
        }));
        let store = Store::open_in_memory().await.unwrap();
        SearchService::new(&settings, registry, store).unwrap()
    }

    async fn service_with(registry: ProviderRegistry) -> SearchService {
        let settings = Settings::default();
        let store = Store::open_in_memory().await.unwrap();
        SearchService::new(&settings, Arc::new(registry), store).unwrap()
    }

    struct OutageAdapter;

    impl QueryAdapter for OutageAdapter {
        fn provider_id(&self) -> &str {
            "outage"
        }

        fn build_query(&self, intent: &SearchIntent) -> ProviderQuery {
            ProviderQuery::new("outage", intent.product_name.clone().unwrap_or_default())
        }
    }

    struct OutageExecutor;

    #[async_trait]
    impl Executor for OutageExecutor {
        fn provider_id(&self) -> &str {
            "outage"
        }

        async fn fetch(
            &self,
            _client: &HttpClient,
            _query: &ProviderQuery,
        ) -> anyhow::Result<Vec<RawProviderResult>> {
            anyhow::bail!("outage request failed with status 500")
        }
    }

    struct OutageNormalizer;

    impl Normalizer for OutageNormalizer {
        fn provider_id(&self) -> &str {
            "outage"
        }

        fn normalize(&self, _raw: &RawProviderResult) -> anyhow::Result<NormalizedResult> {
            anyhow::bail!("nothing to normalize from a failed provider")
        }
    }

    #[tokio::test]
    async fn test_search_persists_bids() {
        let service = service().await;
        let request = SearchRequest::new("req-1", "acme road bike under $500");
        let response = service.search(&request).await.unwrap();

        assert!(!response.is_empty);
        assert!(!response.results.is_empty());
        assert_eq!(response.providers_succeeded, 1);
        assert_eq!(response.providers_failed, 0);

        let bids = service.store.bids_for_request("req-1").await.unwrap();
        assert_eq!(bids.len(), response.results.len());
        assert!(bids.iter().all(|b| b.search_intent_version == INTENT_SCHEMA_VERSION));
    }

    #[tokio::test]
    async fn test_search_records_audit_and_intent() {
        let service = service().await;
        let request = SearchRequest::new("req-1", "running shoes under $200");
        service.search(&request).await.unwrap();

        let intent = service.store.load_intent("req-1").await.unwrap().unwrap();
        assert_eq!(intent.max_price, Some(200.0));

        let audit = service.store.load_query_audit("req-1").await.unwrap().unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].provider_id, "mock");
    }

    #[tokio::test]
    async fn test_stored_intent_reused_without_text() {
        let service = service().await;
        service
            .search(&SearchRequest::new("req-1", "office chair under $250"))
            .await
            .unwrap();

        let rerun = SearchRequest {
            request_id: "req-1".to_string(),
            raw_text: None,
            providers: None,
        };
        let response = service.search(&rerun).await.unwrap();
        assert_eq!(response.intent.max_price, Some(250.0));
    }

    #[tokio::test]
    async fn test_no_input_and_no_stored_intent_errors() {
        let service = service().await;
        let request = SearchRequest {
            request_id: "req-unknown".to_string(),
            raw_text: None,
            providers: None,
        };
        let err = service.search(&request).await.unwrap_err();
        assert!(matches!(err, SourcingError::NoExtractionInput(_)));
    }

    #[tokio::test]
    async fn test_unknown_provider_selection_yields_empty_signal() {
        let service = service().await;
        let request = SearchRequest {
            request_id: "req-1".to_string(),
            raw_text: Some("road bike".to_string()),
            providers: Some(vec!["nonexistent".to_string()]),
        };
        let response = service.search(&request).await.unwrap();
        assert!(response.is_empty);
        assert!(response.provider_statuses.is_empty());
    }

    #[tokio::test]
    async fn test_failing_provider_does_not_sink_the_run() {
        let mut registry = ProviderRegistry::new();
        registry.register(
            Arc::new(MockAdapter),
            Arc::new(MockExecutor),
            Arc::new(MockNormalizer),
        );
        registry.register(
            Arc::new(OutageAdapter),
            Arc::new(OutageExecutor),
            Arc::new(OutageNormalizer),
        );
        let service = service_with(registry).await;

        let request = SearchRequest::new("req-1", "acme road bike under $500");
        let response = service.search(&request).await.unwrap();

        assert!(!response.is_empty);
        assert_eq!(response.providers_succeeded, 1);
        assert_eq!(response.providers_failed, 1);
        assert!(response.results.iter().all(|s| s.result.source == "mock"));

        let outage = response
            .provider_statuses
            .iter()
            .find(|s| s.provider_id == "outage")
            .unwrap();
        assert_eq!(outage.status, ProviderStatus::Error);
        assert_eq!(outage.result_count, 0);
        assert!(outage.message.is_some());

        let bids = service.store.bids_for_request("req-1").await.unwrap();
        assert_eq!(bids.len(), response.results.len());
        assert!(bids.iter().all(|b| b.source == "mock"));
    }

    #[tokio::test]
    async fn test_every_provider_failing_reports_outage_advisory() {
        let mut registry = ProviderRegistry::new();
        registry.register(
            Arc::new(OutageAdapter),
            Arc::new(OutageExecutor),
            Arc::new(OutageNormalizer),
        );
        let service = service_with(registry).await;

        let request = SearchRequest::new("req-1", "acme road bike under $500");
        let response = service.search(&request).await.unwrap();

        assert!(response.is_empty);
        assert_eq!(response.providers_succeeded, 0);
        assert_eq!(response.providers_failed, 1);
        assert!(response.provider_statuses.iter().all(|s| !s.status.is_ok()));
        assert_eq!(
            response.advisory.as_deref(),
            Some("Unable to search at this time. Please try again later.")
        );
        assert!(service.store.bids_for_request("req-1").await.unwrap().is_empty());
    }

    #[test]
    fn test_advisory_all_exhausted() {
        let statuses = vec![ProviderStatusSnapshot {
            provider_id: "catalog".to_string(),
            status: ProviderStatus::Exhausted,
            result_count: 0,
            latency_ms: 10,
            message: Some("API quota exhausted".to_string()),
        }];
        let intent = SearchIntent {
            max_price: Some(100.0),
            confidence: 0.9,
            ..Default::default()
        };
        let advisory = build_advisory(&intent, &statuses, true).unwrap();
        assert!(advisory.contains("exhausted their quota"));
    }

    #[test]
    fn test_advisory_broad_without_budget() {
        let intent = SearchIntent {
            confidence: 0.9,
            ..Default::default()
        };
        let advisory = build_advisory(&intent, &[], false).unwrap();
        assert!(advisory.contains("Adding a budget"));

        let bounded = SearchIntent {
            max_price: Some(100.0),
            confidence: 0.9,
            ..Default::default()
        };
        assert!(build_advisory(&bounded, &[], false).is_none());
    }

    #[test]
    fn test_advisory_low_confidence_asks_for_detail() {
        let intent = SearchIntent {
            min_price: Some(10.0),
            max_price: Some(100.0),
            confidence: 0.2,
            ..Default::default()
        };
        assert!(build_advisory(&intent, &[], false).is_some());
    }
}
