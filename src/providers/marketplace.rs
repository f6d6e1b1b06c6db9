//! Marketplace provider (eBay Browse API style, OAuth2 client credentials)

use super::traits::{build_query_terms, Executor, Normalizer, ProviderQuery, QueryAdapter};
use crate::config::MarketplaceSettings;
use crate::intent::{Condition, SearchIntent};
use crate::network::{HttpClient, ProviderRequest};
use crate::results::{bounded_raw_data, currency, NormalizedResult, RawProviderResult};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use base64::Engine as _;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

pub const PROVIDER_ID: &str = "marketplace";

/// Slack subtracted from token expiry so a token is never used at the edge
const TOKEN_EXPIRY_SLACK: Duration = Duration::from_secs(60);

pub struct MarketplaceAdapter;

impl QueryAdapter for MarketplaceAdapter {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn build_query(&self, intent: &SearchIntent) -> ProviderQuery {
        let mut text = build_query_terms(intent).join(" ");
        for excluded in &intent.exclude_keywords {
            text.push_str(" -");
            text.push_str(excluded);
        }

        let mut filters: Vec<String> = Vec::new();
        if intent.has_price_bounds() {
            let min = intent.min_price.map(|p| format!("{p:.2}")).unwrap_or_default();
            let max = intent.max_price.map(|p| format!("{p:.2}")).unwrap_or_default();
            filters.push(format!("price:[{min}..{max}]"));
            filters.push("priceCurrency:USD".to_string());
        }
        match intent.condition {
            Some(Condition::New) => filters.push("conditions:{NEW}".to_string()),
            Some(Condition::Used) => filters.push("conditions:{USED}".to_string()),
            Some(Condition::Refurbished) => {
                filters.push("conditions:{CERTIFIED_REFURBISHED}".to_string())
            }
            Some(Condition::Any) | None => {}
        }

        let mut query = ProviderQuery::new(PROVIDER_ID, text).param("limit", 20);
        if !filters.is_empty() {
            query = query.param("filter", filters.join(","));
        }
        query
    }

    fn supports_native_price_filter(&self) -> bool {
        true
    }
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

pub struct MarketplaceExecutor {
    settings: MarketplaceSettings,
    token: Mutex<Option<CachedToken>>,
}

impl MarketplaceExecutor {
    pub fn new(settings: &MarketplaceSettings) -> Self {
        Self {
            settings: settings.clone(),
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self, client: &HttpClient) -> Result<String> {
        let mut guard = self.token.lock().await;
        if let Some(cached) = guard.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }

        let basic = base64::engine::general_purpose::STANDARD.encode(format!(
            "{}:{}",
            self.settings.client_id, self.settings.client_secret
        ));
        let form = HashMap::from([
            ("grant_type".to_string(), "client_credentials".to_string()),
            (
                "scope".to_string(),
                "https://api.ebay.com/oauth/api_scope".to_string(),
            ),
        ]);
        let request = ProviderRequest::post(&self.settings.token_endpoint)
            .header("Authorization", format!("Basic {basic}"))
            .form(form);

        let response = client.execute(request).await?;
        if !response.is_success() {
            bail!(
                "marketplace token request failed with status {}",
                response.status
            );
        }
        let payload: serde_json::Value = response.json()?;
        let token = payload
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("marketplace token response missing access_token"))?
            .to_string();
        let expires_in = payload
            .get("expires_in")
            .and_then(|v| v.as_f64())
            .unwrap_or(7200.0);

        debug!(expires_in, "refreshed marketplace access token");
        let expires_at = Instant::now() + Duration::from_secs_f64(expires_in) - TOKEN_EXPIRY_SLACK;
        *guard = Some(CachedToken {
            token: token.clone(),
            expires_at,
        });
        Ok(token)
    }
}

#[async_trait]
impl Executor for MarketplaceExecutor {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    async fn fetch(
        &self,
        client: &HttpClient,
        query: &ProviderQuery,
    ) -> Result<Vec<RawProviderResult>> {
        let token = self.access_token(client).await?;

        let mut request = ProviderRequest::get(&self.settings.endpoint)
            .header("Authorization", format!("Bearer {token}"))
            .header("X-EBAY-C-MARKETPLACE-ID", self.settings.marketplace_id.clone())
            .param("q", query.query_string.as_str());
        for (key, value) in &query.params {
            let value = match value {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            request = request.param(key, value);
        }

        let response = client.execute(request).await?;
        if response.is_quota_exhausted() {
            bail!("marketplace quota exhausted: 402 Payment Required");
        }
        if response.is_rate_limited() {
            bail!("marketplace throttled: 429 Too Many Requests");
        }
        if !response.is_success() {
            bail!(
                "marketplace request failed with status {}",
                response.status
            );
        }

        let data: serde_json::Value = response.json()?;
        let items = data
            .get("itemSummaries")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();

        Ok(items
            .into_iter()
            .map(|item| RawProviderResult::new(PROVIDER_ID, item))
            .collect())
    }
}

pub struct MarketplaceNormalizer;

impl Normalizer for MarketplaceNormalizer {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn normalize(&self, raw: &RawProviderResult) -> Result<NormalizedResult> {
        let item = &raw.payload;
        let title = item
            .get("title")
            .and_then(|v| v.as_str())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| anyhow!("marketplace item missing title"))?;

        let price_obj = item.get("price");
        let native_price = price_obj
            .and_then(|p| p.get("value"))
            .and_then(parse_numeric)
            .filter(|p| *p > 0.0);
        let native_currency = price_obj
            .and_then(|p| p.get("currency"))
            .and_then(|v| v.as_str())
            .unwrap_or("USD")
            .to_string();
        let price = native_price.and_then(|p| currency::to_usd(p, &native_currency));

        let url = item
            .get("itemWebUrl")
            .or_else(|| item.get("itemHref"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let item_id = item.get("itemId").and_then(|v| v.as_str()).unwrap_or("");
        let canonical = if item_id.is_empty() {
            crate::results::canonicalize_url(&url)
        } else {
            crate::results::canonicalize_url(&format!("https://www.ebay.com/itm/{}", item_id))
        };
        if url.is_empty() && item_id.is_empty() {
            bail!("marketplace item has neither url nor item id");
        }

        let merchant_name = item
            .get("seller")
            .and_then(|s| s.get("username"))
            .and_then(|v| v.as_str())
            .unwrap_or("eBay")
            .to_string();

        let shipping_info = shipping_summary(item, &native_currency);

        Ok(NormalizedResult {
            title: title.to_string(),
            url: if url.is_empty() { canonical.clone() } else { url },
            canonical_url: canonical,
            source: PROVIDER_ID.to_string(),
            price,
            currency: "USD".to_string(),
            price_original: native_price,
            currency_original: native_price.map(|_| native_currency.clone()),
            merchant_name: Some(merchant_name),
            merchant_domain: "ebay.com".to_string(),
            image_url: item
                .get("image")
                .and_then(|i| i.get("imageUrl"))
                .and_then(|v| v.as_str())
                .map(str::to_string),
            rating: None,
            reviews_count: None,
            shipping_info,
            raw_data: bounded_raw_data(item),
        })
    }
}

fn parse_numeric(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn shipping_summary(item: &serde_json::Value, default_currency: &str) -> Option<String> {
    let first = item
        .get("shippingOptions")
        .and_then(|v| v.as_array())
        .and_then(|opts| opts.first())?;

    let cost_type = first
        .get("shippingCostType")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let cost = first.get("shippingCost");
    let cost_value = cost.and_then(|c| c.get("value")).and_then(parse_numeric);

    if cost_type.eq_ignore_ascii_case("free") || cost_value == Some(0.0) {
        return Some("Free shipping".to_string());
    }
    let value = cost_value?;
    let cur = cost
        .and_then(|c| c.get("currency"))
        .and_then(|v| v.as_str())
        .unwrap_or(default_currency);
    Some(format!("Shipping {cur} {value:.2}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_filters_and_exclusions() {
        let intent = SearchIntent {
            product_name: Some("road bike".to_string()),
            min_price: Some(500.0),
            max_price: Some(1500.0),
            condition: Some(Condition::New),
            exclude_keywords: vec!["frame only".to_string(), "kids".to_string()],
            ..Default::default()
        }
        .normalized();
        let query = MarketplaceAdapter.build_query(&intent);
        assert!(query.query_string.contains("-frame only"));
        assert!(query.query_string.contains("-kids"));
        let filter = query.params.get("filter").and_then(|v| v.as_str()).unwrap();
        assert!(filter.contains("price:[500.00..1500.00]"));
        assert!(filter.contains("conditions:{NEW}"));
    }

    #[test]
    fn test_normalize_converts_currency() {
        let raw = RawProviderResult::new(
            PROVIDER_ID,
            serde_json::json!({
                "itemId": "v1|123456|0",
                "title": "Acme Road Bike 56cm",
                "itemWebUrl": "https://www.ebay.com/itm/123456?hash=abc",
                "price": {"value": "100.00", "currency": "EUR"},
                "seller": {"username": "bikeshop"},
                "shippingOptions": [{"shippingCostType": "FREE"}]
            }),
        );
        let result = MarketplaceNormalizer.normalize(&raw).unwrap();
        assert_eq!(result.price, Some(108.0));
        assert_eq!(result.currency, "USD");
        assert_eq!(result.price_original, Some(100.0));
        assert_eq!(result.currency_original.as_deref(), Some("EUR"));
        assert_eq!(result.canonical_url, "https://ebay.com/itm/v1|123456|0");
        assert_eq!(result.shipping_info.as_deref(), Some("Free shipping"));
        assert_eq!(result.merchant_domain, "ebay.com");
    }

    #[test]
    fn test_canonical_url_is_stable_under_recanonicalization() {
        let raw = RawProviderResult::new(
            PROVIDER_ID,
            serde_json::json!({
                "itemId": "v1|123456|0",
                "title": "Acme Road Bike 56cm",
                "itemWebUrl": "https://www.ebay.com/itm/123456?hash=abc",
                "price": {"value": 900, "currency": "USD"}
            }),
        );
        let result = MarketplaceNormalizer.normalize(&raw).unwrap();
        // Re-running the rule on its own output must be a no-op, otherwise
        // the same listing can land in two bid rows across refreshes.
        assert_eq!(
            crate::results::canonicalize_url(&result.canonical_url),
            result.canonical_url
        );
        assert!(!result.canonical_url.contains("www."));
    }

    #[test]
    fn test_normalize_paid_shipping() {
        let raw = RawProviderResult::new(
            PROVIDER_ID,
            serde_json::json!({
                "itemId": "v1|9|0",
                "title": "Bike",
                "price": {"value": 50, "currency": "USD"},
                "shippingOptions": [{"shippingCost": {"value": "12.50", "currency": "USD"}}]
            }),
        );
        let result = MarketplaceNormalizer.normalize(&raw).unwrap();
        assert_eq!(result.shipping_info.as_deref(), Some("Shipping USD 12.50"));
    }

    #[test]
    fn test_normalize_zero_price_unknown() {
        let raw = RawProviderResult::new(
            PROVIDER_ID,
            serde_json::json!({
                "itemId": "v1|7|0",
                "title": "Auction Item",
                "price": {"value": "0", "currency": "USD"}
            }),
        );
        let result = MarketplaceNormalizer.normalize(&raw).unwrap();
        assert_eq!(result.price, None);
        assert_eq!(result.currency_original, None);
    }
}
