//! Shopping catalog provider (SerpApi-style Google Shopping API)

use super::traits::{build_query_string, Executor, Normalizer, ProviderQuery, QueryAdapter};
use crate::config::CatalogSettings;
use crate::intent::SearchIntent;
use crate::network::{HttpClient, ProviderRequest};
use crate::results::{
    bounded_raw_data, canonicalize_url, merchant_domain, NormalizedResult, RawProviderResult,
};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

pub const PROVIDER_ID: &str = "catalog";

pub struct CatalogAdapter {
    country: String,
    language: String,
}

impl CatalogAdapter {
    pub fn new(settings: &CatalogSettings) -> Self {
        Self {
            country: settings.country.clone(),
            language: settings.language.clone(),
        }
    }
}

impl QueryAdapter for CatalogAdapter {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn build_query(&self, intent: &SearchIntent) -> ProviderQuery {
        let mut query = ProviderQuery::new(PROVIDER_ID, build_query_string(intent))
            .param("engine", "google_shopping")
            .param("gl", self.country.as_str())
            .param("hl", self.language.as_str());

        // Google Shopping price filter, bounds in cents
        if intent.has_price_bounds() {
            let mut tbs = vec!["mr:1".to_string(), "price:1".to_string()];
            if let Some(min) = intent.min_price {
                tbs.push(format!("ppr_min:{}", (min * 100.0) as i64));
            }
            if let Some(max) = intent.max_price {
                tbs.push(format!("ppr_max:{}", (max * 100.0) as i64));
            }
            query = query.param("tbs", tbs.join(","));
        }

        query
    }

    fn supports_native_price_filter(&self) -> bool {
        true
    }
}

pub struct CatalogExecutor {
    endpoint: String,
    api_key: String,
}

impl CatalogExecutor {
    pub fn new(settings: &CatalogSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
        }
    }
}

#[async_trait]
impl Executor for CatalogExecutor {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    async fn fetch(
        &self,
        client: &HttpClient,
        query: &ProviderQuery,
    ) -> Result<Vec<RawProviderResult>> {
        let mut request = ProviderRequest::get(&self.endpoint)
            .param("q", query.query_string.as_str())
            .param("api_key", self.api_key.as_str());
        for (key, value) in &query.params {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            request = request.param(key, value);
        }

        let response = client.execute(request).await?;
        if response.is_quota_exhausted() {
            bail!("catalog quota exhausted: 402 Payment Required");
        }
        if response.is_rate_limited() {
            bail!("catalog throttled: 429 Too Many Requests");
        }
        if !response.is_success() {
            bail!("catalog request failed with status {}", response.status);
        }

        let data: serde_json::Value = response.json()?;
        let items = data
            .get("shopping_results")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(items
            .into_iter()
            .map(|item| RawProviderResult::new(PROVIDER_ID, item))
            .collect())
    }
}

pub struct CatalogNormalizer;

impl Normalizer for CatalogNormalizer {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn normalize(&self, raw: &RawProviderResult) -> Result<NormalizedResult> {
        let item = &raw.payload;
        let title = item
            .get("title")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("catalog item missing title"))?;

        let url = ["product_link", "offers_link", "link"]
            .iter()
            .find_map(|key| item.get(*key).and_then(|v| v.as_str()))
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow!("catalog item missing url"))?;

        let price = item.get("price").and_then(parse_price_value);
        let merchant_name = item
            .get("seller")
            .or_else(|| item.get("source"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let canonical = canonicalize_url(url);
        let domain = merchant_domain(&canonical);

        Ok(NormalizedResult {
            title: title.to_string(),
            url: url.to_string(),
            canonical_url: canonical,
            source: PROVIDER_ID.to_string(),
            price,
            currency: "USD".to_string(),
            price_original: price,
            currency_original: price.map(|_| "USD".to_string()),
            merchant_name,
            merchant_domain: domain,
            image_url: item
                .get("thumbnail")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            rating: item.get("rating").and_then(|v| v.as_f64()),
            reviews_count: item
                .get("reviews")
                .and_then(|v| v.as_u64())
                .map(|n| n as u32),
            shipping_info: item
                .get("delivery")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            raw_data: bounded_raw_data(item),
        })
    }
}

static PRICE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d[\d,]*\.?\d*)").unwrap());

/// Parse a catalog price field that may be a number or a display string
/// like "$1,299.99". Zero and unparseable values mean price-unknown.
fn parse_price_value(value: &serde_json::Value) -> Option<f64> {
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => PRICE_DIGITS
            .captures(s)
            .and_then(|cap| cap[1].replace(',', "").parse().ok()),
        _ => None,
    };
    parsed.filter(|p| *p > 0.0)
}
