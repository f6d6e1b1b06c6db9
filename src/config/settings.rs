//! Settings structures for the sourcing pipeline configuration

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::{DEFAULT_OVERALL_DEADLINE, DEFAULT_PROVIDER_TIMEOUT};

/// Main settings structure matching settings.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub search: SearchSettings,
    pub outgoing: OutgoingSettings,
    pub intent: IntentSettings,
    pub providers: ProvidersSettings,
    pub store: StoreSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            general: GeneralSettings::default(),
            search: SearchSettings::default(),
            outgoing: OutgoingSettings::default(),
            intent: IntentSettings::default(),
            providers: ProvidersSettings::default(),
            store: StoreSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_yaml::from_str(&content)?;
        Ok(settings)
    }

    /// Merge with environment variables (SOURCING_* prefix)
    pub fn merge_env(&mut self) {
        if let Ok(val) = std::env::var("SOURCING_DEBUG") {
            self.general.debug = val.parse().unwrap_or(false);
        }
        if let Ok(val) = std::env::var("SOURCING_STORE_PATH") {
            self.store.path = val;
        }
        if let Ok(val) = std::env::var("SOURCING_PROVIDER_TIMEOUT") {
            if let Ok(secs) = val.parse() {
                self.search.provider_timeout_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("SOURCING_OVERALL_DEADLINE") {
            if let Ok(secs) = val.parse() {
                self.search.overall_deadline_secs = secs;
            }
        }
        if let Ok(val) = std::env::var("SOURCING_INTENT_API_KEY") {
            self.intent.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("SOURCING_CATALOG_API_KEY") {
            self.providers
                .catalog
                .get_or_insert_with(CatalogSettings::default)
                .api_key = val;
        }
        if let Ok(val) = std::env::var("SOURCING_WEBSEARCH_API_KEY") {
            self.providers
                .websearch
                .get_or_insert_with(WebSearchSettings::default)
                .api_key = val;
        }
        if let Ok(val) = std::env::var("SOURCING_WEBSEARCH_CX") {
            self.providers
                .websearch
                .get_or_insert_with(WebSearchSettings::default)
                .engine_id = val;
        }
        if let Ok(val) = std::env::var("SOURCING_MARKETPLACE_CLIENT_ID") {
            self.providers
                .marketplace
                .get_or_insert_with(MarketplaceSettings::default)
                .client_id = val;
        }
        if let Ok(val) = std::env::var("SOURCING_MARKETPLACE_CLIENT_SECRET") {
            self.providers
                .marketplace
                .get_or_insert_with(MarketplaceSettings::default)
                .client_secret = val;
        }
    }
}

/// General settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Enable debug mode
    pub debug: bool,
    /// Instance name used in log output
    pub instance_name: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            debug: false,
            instance_name: "sourcing".to_string(),
        }
    }
}

/// Search orchestration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Per-provider fetch timeout in seconds
    pub provider_timeout_secs: f64,
    /// Wall-clock deadline for a whole search run in seconds
    pub overall_deadline_secs: f64,
    /// TTL for cached raw provider responses in seconds
    pub cache_ttl_secs: u64,
    /// Maximum cached provider responses
    pub cache_capacity: u64,
    /// Result scoring weights
    pub scoring: ScoringWeights,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT,
            overall_deadline_secs: DEFAULT_OVERALL_DEADLINE,
            cache_ttl_secs: 300,
            cache_capacity: 1_000,
            scoring: ScoringWeights::default(),
        }
    }
}

/// Weights for combining per-result component scores. They are normalized
/// before use, so any positive values work.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub relevance: f64,
    pub price: f64,
    pub quality: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            relevance: 0.4,
            price: 0.3,
            quality: 0.3,
        }
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Default request timeout in seconds
    pub request_timeout: f64,
    /// User agent suffix appended to the rotating agent string
    pub useragent_suffix: Option<String>,
    /// Pool max size
    pub pool_maxsize: usize,
    /// Verify SSL certificates
    pub verify_ssl: bool,
    /// Extra headers to send
    pub extra_headers: HashMap<String, String>,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 10.0,
            useragent_suffix: None,
            pool_maxsize: 20,
            verify_ssl: true,
            extra_headers: HashMap::new(),
        }
    }
}

/// Intent extraction model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntentSettings {
    /// API key; absent means heuristic-only extraction
    pub api_key: Option<String>,
    /// Model generation endpoint
    pub endpoint: String,
    /// Request timeout in seconds
    pub timeout_secs: f64,
}

impl Default for IntentSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint:
                "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
                    .to_string(),
            timeout_secs: 8.0,
        }
    }
}

/// Per-provider configuration. A provider absent here never registers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersSettings {
    pub catalog: Option<CatalogSettings>,
    pub websearch: Option<WebSearchSettings>,
    pub marketplace: Option<MarketplaceSettings>,
    pub mock: MockSettings,
}

/// Shopping catalog API (SerpApi-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub api_key: String,
    pub endpoint: String,
    /// Two-letter country code
    pub country: String,
    /// Interface language
    pub language: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: "https://serpapi.com/search".to_string(),
            country: "us".to_string(),
            language: "en".to_string(),
        }
    }
}

/// Programmable web search API (Google CSE-style)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchSettings {
    pub api_key: String,
    /// Search engine id (cx)
    pub engine_id: String,
    pub endpoint: String,
}

impl Default for WebSearchSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            engine_id: String::new(),
            endpoint: "https://www.googleapis.com/customsearch/v1".to_string(),
        }
    }
}

/// Marketplace browse API (eBay-style, OAuth2 client credentials)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketplaceSettings {
    pub client_id: String,
    pub client_secret: String,
    pub endpoint: String,
    pub token_endpoint: String,
    pub marketplace_id: String,
}

impl Default for MarketplaceSettings {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            endpoint: "https://api.ebay.com/buy/browse/v1/item_summary/search".to_string(),
            token_endpoint: "https://api.ebay.com/identity/v1/oauth2/token".to_string(),
            marketplace_id: "EBAY_US".to_string(),
        }
    }
}

/// Deterministic mock provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MockSettings {
    /// `true` forces registration, `false` forbids it, absent means
    /// auto: register only when no real provider is configured.
    pub enabled: Option<bool>,
}

/// Bid persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// SQLite database path; `:memory:` for an in-memory store
    pub path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: "sourcing.db".to_string(),
        }
    }
}
