//! Concurrent provider execution with per-provider timeouts and an overall
//! wall-clock deadline.
//!
//! Every selected provider runs as its own task. A provider that fails,
//! times out, or returns nothing never sinks the run; its outcome is
//! recorded in the per-provider status instead.

use crate::cache::ProviderCache;
use crate::network::HttpClient;
use crate::providers::{ProviderEntry, ProviderQuery, ProviderRegistry};
use crate::results::{ProviderExecutionResult, ProviderStatus};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const MAX_ERROR_MESSAGE_LEN: usize = 100;

static SECRET_PARAMS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(api_key|apikey|key|access_token|client_secret)=[^&\s]+").unwrap()
});

/// One provider's contribution to a search run
#[derive(Debug, Clone)]
pub struct ProviderRun {
    pub provider_id: String,
    pub query: ProviderQuery,
    pub native_price_filter: bool,
    pub execution: ProviderExecutionResult,
}

/// Runs built provider queries concurrently and collects per-provider
/// outcomes.
pub struct SearchExecutor {
    client: HttpClient,
    cache: Arc<ProviderCache>,
    provider_timeout: Duration,
    overall_deadline: Duration,
}

impl SearchExecutor {
    pub fn new(
        client: HttpClient,
        cache: Arc<ProviderCache>,
        provider_timeout: Duration,
        overall_deadline: Duration,
    ) -> Self {
        Self {
            client,
            cache,
            provider_timeout,
            overall_deadline,
        }
    }

    /// Execute the given queries against their providers. Returns one
    /// `ProviderRun` per input query, in no particular order.
    pub async fn execute(
        &self,
        queries: Vec<(ProviderEntry, ProviderQuery)>,
    ) -> Vec<ProviderRun> {
        let mut pending: HashMap<String, (ProviderQuery, bool)> = HashMap::new();
        let mut tasks: JoinSet<ProviderRun> = JoinSet::new();
        let deadline = tokio::time::Instant::now() + self.overall_deadline;

        info!(
            providers = queries.len(),
            deadline_secs = self.overall_deadline.as_secs_f64(),
            "executing search across providers"
        );

        for (entry, query) in queries {
            let provider_id = query.provider_id.clone();
            let native = entry.adapter.supports_native_price_filter();
            pending.insert(provider_id.clone(), (query.clone(), native));

            let client = self.client.clone();
            let cache = Arc::clone(&self.cache);
            let provider_timeout = self.provider_timeout;
            let executor = Arc::clone(&entry.executor);
            tasks.spawn(async move {
                let start = Instant::now();
                let cache_key = query.cache_key();

                if let Some(cached) = cache.get(&cache_key).await {
                    debug!(provider = %provider_id, "provider cache hit");
                    let execution = ProviderExecutionResult::ok(
                        provider_id.clone(),
                        cached.as_ref().clone(),
                        start.elapsed().as_millis() as u64,
                    );
                    return ProviderRun {
                        provider_id,
                        query,
                        native_price_filter: native,
                        execution,
                    };
                }

                let outcome = timeout(provider_timeout, executor.fetch(&client, &query)).await;
                let latency_ms = start.elapsed().as_millis() as u64;

                let execution = match outcome {
                    Ok(Ok(results)) => {
                        debug!(
                            provider = %provider_id,
                            count = results.len(),
                            latency_ms,
                            "provider returned"
                        );
                        cache.set(cache_key, results.clone()).await;
                        ProviderExecutionResult::ok(provider_id.clone(), results, latency_ms)
                    }
                    Ok(Err(e)) => {
                        let (status, message) = classify_failure(&e.to_string());
                        warn!(provider = %provider_id, %status, "provider failed: {message}");
                        ProviderExecutionResult::failed(
                            provider_id.clone(),
                            status,
                            message,
                            latency_ms,
                        )
                    }
                    Err(_) => {
                        warn!(provider = %provider_id, "provider timed out");
                        ProviderExecutionResult::failed(
                            provider_id.clone(),
                            ProviderStatus::Timeout,
                            format!(
                                "Timed out after {:.1}s",
                                provider_timeout.as_secs_f64()
                            ),
                            latency_ms,
                        )
                    }
                };

                ProviderRun {
                    provider_id,
                    query,
                    native_price_filter: native,
                    execution,
                }
            });
        }

        let mut runs: Vec<ProviderRun> = Vec::with_capacity(pending.len());
        loop {
            tokio::select! {
                joined = tasks.join_next() => {
                    match joined {
                        Some(Ok(run)) => {
                            pending.remove(&run.provider_id);
                            runs.push(run);
                        }
                        Some(Err(e)) => {
                            // A panicked task loses its provider id; the
                            // remaining entries are reported at deadline.
                            warn!("provider task failed to join: {e}");
                        }
                        None => break,
                    }
                }
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(
                        unfinished = pending.len(),
                        "overall deadline reached, aborting remaining providers"
                    );
                    tasks.abort_all();
                    break;
                }
            }
        }

        let deadline_ms = self.overall_deadline.as_millis() as u64;
        for (provider_id, (query, native)) in pending {
            runs.push(ProviderRun {
                provider_id: provider_id.clone(),
                query,
                native_price_filter: native,
                execution: ProviderExecutionResult::failed(
                    provider_id,
                    ProviderStatus::Timeout,
                    "Overall search deadline exceeded",
                    deadline_ms,
                ),
            });
        }

        runs
    }
}

/// Build per-provider queries for a selection of registered providers
pub fn build_queries(
    registry: &ProviderRegistry,
    intent: &crate::intent::SearchIntent,
    requested: Option<&[String]>,
) -> Vec<(ProviderEntry, ProviderQuery)> {
    registry
        .select(requested)
        .into_iter()
        .map(|(_, entry)| {
            let query = entry.adapter.build_query(intent);
            (entry, query)
        })
        .collect()
}

/// Map a provider error message onto a status, scrubbing credentials and
/// truncating. Quota (402) and rate-limit (429) failures get their own
/// statuses so callers can word advisories precisely.
fn classify_failure(message: &str) -> (ProviderStatus, String) {
    if message.contains("402") || message.contains("Payment Required") {
        return (ProviderStatus::Exhausted, "API quota exhausted".to_string());
    }
    if message.contains("429") || message.contains("Too Many Requests") {
        return (ProviderStatus::RateLimited, "Rate limit exceeded".to_string());
    }

    let scrubbed = SECRET_PARAMS.replace_all(message, "$1=***").into_owned();
    let truncated = match scrubbed.char_indices().nth(MAX_ERROR_MESSAGE_LEN) {
        Some((idx, _)) => format!("{}...", &scrubbed[..idx]),
        None => scrubbed,
    };
    (ProviderStatus::Error, truncated)
}
