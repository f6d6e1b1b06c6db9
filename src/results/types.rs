//! Result type definitions for the sourcing pipeline

use serde::{Deserialize, Serialize};

/// Upper bound on the serialized size of a retained provider payload.
/// `raw_data` exists strictly for debugging and provenance, never scoring.
pub const MAX_RAW_DATA_BYTES: usize = 4096;

/// Per-provider outcome of one search invocation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Ok,
    Error,
    Timeout,
    RateLimited,
    Exhausted,
}

impl ProviderStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ProviderStatus::Ok)
    }
}

impl std::fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Error => write!(f, "error"),
            Self::Timeout => write!(f, "timeout"),
            Self::RateLimited => write!(f, "rate_limited"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Opaque provider payload for exactly one result item, discarded after
/// normalization except for the size-bounded copy kept on `NormalizedResult`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawProviderResult {
    pub provider_id: String,
    pub payload: serde_json::Value,
}

impl RawProviderResult {
    pub fn new(provider_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            provider_id: provider_id.into(),
            payload,
        }
    }
}

/// A provider result converted into the canonical schema.
///
/// `price` is `None`, never `0.0`, when unknown: absence of a price must
/// never be conflated with free.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedResult {
    pub title: String,
    pub url: String,
    pub canonical_url: String,
    /// Provider id this result came from
    pub source: String,
    pub price: Option<f64>,
    pub currency: String,
    /// Price as reported by the provider, before USD conversion
    pub price_original: Option<f64>,
    pub currency_original: Option<String>,
    pub merchant_name: Option<String>,
    pub merchant_domain: String,
    pub image_url: Option<String>,
    pub rating: Option<f64>,
    pub reviews_count: Option<u32>,
    pub shipping_info: Option<String>,
    /// Size-bounded debug snapshot of the provider payload
    pub raw_data: serde_json::Value,
}

/// A normalized result with its scoring breakdown, all components in [0, 1]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredResult {
    #[serde(flatten)]
    pub result: NormalizedResult,
    pub relevance_score: f64,
    pub price_score: f64,
    pub quality_score: f64,
    pub combined_score: f64,
}

/// Outcome of one provider's fetch within one search invocation
#[derive(Debug, Clone)]
pub struct ProviderExecutionResult {
    pub provider_id: String,
    pub status: ProviderStatus,
    pub results: Vec<RawProviderResult>,
    pub error_message: Option<String>,
    pub latency_ms: u64,
}

impl ProviderExecutionResult {
    pub fn ok(provider_id: impl Into<String>, results: Vec<RawProviderResult>, latency_ms: u64) -> Self {
        Self {
            provider_id: provider_id.into(),
            status: ProviderStatus::Ok,
            results,
            error_message: None,
            latency_ms,
        }
    }

    pub fn failed(
        provider_id: impl Into<String>,
        status: ProviderStatus,
        message: impl Into<String>,
        latency_ms: u64,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            status,
            results: Vec::new(),
            error_message: Some(message.into()),
            latency_ms,
        }
    }

    pub fn snapshot(&self) -> ProviderStatusSnapshot {
        ProviderStatusSnapshot {
            provider_id: self.provider_id.clone(),
            status: self.status,
            result_count: self.results.len(),
            latency_ms: self.latency_ms,
            message: self.error_message.clone(),
        }
    }
}

/// Serializable per-provider summary returned to callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderStatusSnapshot {
    pub provider_id: String,
    pub status: ProviderStatus,
    pub result_count: usize,
    pub latency_ms: u64,
    pub message: Option<String>,
}

/// Aggregate min/max of known prices in a ranked set
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

/// Bound a provider payload to [`MAX_RAW_DATA_BYTES`] of serialized JSON.
/// Oversized payloads are replaced with a truncation marker holding a
/// preview, so the debug trail never balloons a `Bid` row.
pub fn bounded_raw_data(payload: &serde_json::Value) -> serde_json::Value {
    let serialized = payload.to_string();
    if serialized.len() <= MAX_RAW_DATA_BYTES {
        return payload.clone();
    }
    let preview: String = serialized.chars().take(MAX_RAW_DATA_BYTES / 4).collect();
    serde_json::json!({
        "truncated": true,
        "original_bytes": serialized.len(),
        "preview": preview,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_price_serializes_as_null() {
        let result = NormalizedResult {
            title: "Widget".to_string(),
            url: "https://example.com/widget".to_string(),
            canonical_url: "https://example.com/widget".to_string(),
            source: "catalog".to_string(),
            price: None,
            currency: "USD".to_string(),
            price_original: None,
            currency_original: None,
            merchant_name: Some("Example".to_string()),
            merchant_domain: "example.com".to_string(),
            image_url: None,
            rating: None,
            reviews_count: None,
            shipping_info: None,
            raw_data: serde_json::Value::Null,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert!(json["price"].is_null());
        assert_ne!(json["price"], serde_json::json!(0.0));
    }

    #[test]
    fn test_bounded_raw_data_passthrough() {
        let small = serde_json::json!({"title": "ok"});
        assert_eq!(bounded_raw_data(&small), small);
    }

    #[test]
    fn test_bounded_raw_data_truncates() {
        let big = serde_json::json!({"blob": "x".repeat(MAX_RAW_DATA_BYTES * 2)});
        let bounded = bounded_raw_data(&big);
        assert_eq!(bounded["truncated"], serde_json::json!(true));
        assert!(bounded.to_string().len() < MAX_RAW_DATA_BYTES);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ProviderStatus::RateLimited.to_string(), "rate_limited");
        assert!(ProviderStatus::Ok.is_ok());
        assert!(!ProviderStatus::Timeout.is_ok());
    }
}
