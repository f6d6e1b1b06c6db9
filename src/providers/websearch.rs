//! Programmable web search provider (Google CSE-style)
//!
//! A breadth fallback: general web hits for the query with commerce terms
//! appended. The API returns no structured offer data, so every result
//! carries an unknown price.

use super::traits::{build_query_string, Executor, Normalizer, ProviderQuery, QueryAdapter};
use crate::config::WebSearchSettings;
use crate::intent::SearchIntent;
use crate::network::{HttpClient, ProviderRequest};
use crate::results::{
    bounded_raw_data, canonicalize_url, merchant_domain, NormalizedResult, RawProviderResult,
};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

pub const PROVIDER_ID: &str = "websearch";

pub struct WebSearchAdapter;

impl QueryAdapter for WebSearchAdapter {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn build_query(&self, intent: &SearchIntent) -> ProviderQuery {
        let mut text = build_query_string(intent);
        text.push_str(" buy price");
        // Price bounds only steer ranking here; they are not a server filter
        match (intent.min_price, intent.max_price) {
            (Some(min), Some(max)) => {
                text.push_str(&format!(" ${}-${}", min as i64, max as i64));
            }
            (Some(min), None) => text.push_str(&format!(" over ${}", min as i64)),
            (None, Some(max)) => text.push_str(&format!(" under ${}", max as i64)),
            (None, None) => {}
        }

        ProviderQuery::new(PROVIDER_ID, text).param("num", 10)
    }
}

pub struct WebSearchExecutor {
    endpoint: String,
    api_key: String,
    engine_id: String,
}

impl WebSearchExecutor {
    pub fn new(settings: &WebSearchSettings) -> Self {
        Self {
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
            engine_id: settings.engine_id.clone(),
        }
    }
}

#[async_trait]
impl Executor for WebSearchExecutor {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    async fn fetch(
        &self,
        client: &HttpClient,
        query: &ProviderQuery,
    ) -> Result<Vec<RawProviderResult>> {
        let num = query
            .params
            .get("num")
            .and_then(|v| v.as_u64())
            .unwrap_or(10);
        let request = ProviderRequest::get(&self.endpoint)
            .param("key", self.api_key.as_str())
            .param("cx", self.engine_id.as_str())
            .param("q", query.query_string.as_str())
            .param("num", num.to_string());

        let response = client.execute(request).await?;
        if response.is_quota_exhausted() {
            bail!("websearch quota exhausted: 402 Payment Required");
        }
        if response.is_rate_limited() {
            bail!("websearch throttled: 429 Too Many Requests");
        }
        if !response.is_success() {
            bail!("websearch request failed with status {}", response.status);
        }

        let data: serde_json::Value = response.json()?;
        let items = data
            .get("items")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(items
            .into_iter()
            .map(|item| RawProviderResult::new(PROVIDER_ID, item))
            .collect())
    }
}

pub struct WebSearchNormalizer;

impl Normalizer for WebSearchNormalizer {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn normalize(&self, raw: &RawProviderResult) -> Result<NormalizedResult> {
        let item = &raw.payload;
        let title = item
            .get("title")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("websearch item missing title"))?;
        let url = item
            .get("link")
            .and_then(|v| v.as_str())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow!("websearch item missing link"))?;

        let pagemap = item.get("pagemap");
        let image_url = pagemap
            .and_then(|p| p.get("cse_image"))
            .and_then(|v| v.get(0))
            .and_then(|v| v.get("src"))
            .or_else(|| {
                pagemap
                    .and_then(|p| p.get("cse_thumbnail"))
                    .and_then(|v| v.get(0))
                    .and_then(|v| v.get("src"))
            })
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let canonical = canonicalize_url(url);
        let domain = merchant_domain(&canonical);

        Ok(NormalizedResult {
            title: title.to_string(),
            url: url.to_string(),
            canonical_url: canonical,
            source: PROVIDER_ID.to_string(),
            price: None,
            currency: "USD".to_string(),
            price_original: None,
            currency_original: None,
            merchant_name: (!domain.is_empty()).then(|| domain.clone()),
            merchant_domain: domain,
            image_url,
            rating: None,
            reviews_count: None,
            shipping_info: None,
            raw_data: bounded_raw_data(item),
        })
    }
}
