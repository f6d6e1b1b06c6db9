//! Deterministic mock provider for development and tests
//!
//! Seeded from an md5 of the query text, so the same query always yields
//! the same catalog of fake listings.

use super::traits::{build_query_string, Executor, Normalizer, ProviderQuery, QueryAdapter};
use crate::intent::SearchIntent;
use crate::network::HttpClient;
use crate::results::{
    bounded_raw_data, canonicalize_url, merchant_domain, NormalizedResult, RawProviderResult,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

pub const PROVIDER_ID: &str = "mock";

const MERCHANTS: &[&str] = &[
    "Amazon", "Walmart", "Target", "eBay", "Best Buy", "Costco", "Kohl's", "Macy's",
];

pub struct MockAdapter;

impl QueryAdapter for MockAdapter {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn build_query(&self, intent: &SearchIntent) -> ProviderQuery {
        ProviderQuery::new(PROVIDER_ID, build_query_string(intent))
    }
}

pub struct MockExecutor;

fn query_seed(query: &str) -> u64 {
    let digest = md5::compute(query.as_bytes());
    u64::from(u32::from_be_bytes([
        digest[0], digest[1], digest[2], digest[3],
    ]))
}

#[async_trait]
impl Executor for MockExecutor {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    async fn fetch(
        &self,
        _client: &HttpClient,
        query: &ProviderQuery,
    ) -> Result<Vec<RawProviderResult>> {
        let seed = query_seed(&query.query_string);
        let mut rng = StdRng::seed_from_u64(seed);

        let count = rng.gen_range(8..=15);
        let mut items = Vec::with_capacity(count);
        for i in 0..count {
            let price: f64 = rng.gen_range(15.0..150.0);
            let edition = if i % 3 == 0 { "Premium" } else { "Standard" };
            let style = char::from(b'A' + (i as u8 % 26));
            let merchant = *MERCHANTS.choose(&mut rng).unwrap_or(&"Amazon");
            let id = seed + i as u64;
            items.push(RawProviderResult::new(
                PROVIDER_ID,
                serde_json::json!({
                    "title": format!("{} - Style {} {} Edition", query.query_string, style, edition),
                    "price": (price * 100.0).round() / 100.0,
                    "currency": "USD",
                    "merchant": merchant,
                    "url": format!("https://example.com/product/{id}"),
                    "image_url": format!("https://picsum.photos/seed/{id}/300/300"),
                    "rating": (rng.gen_range(3.5..5.0_f64) * 10.0).round() / 10.0,
                    "reviews_count": rng.gen_range(10..5000),
                    "shipping_info": if rng.gen_bool(0.7) { "Free shipping" } else { "Ships in 2-3 days" },
                }),
            ));
        }
        Ok(items)
    }
}

pub struct MockNormalizer;

impl Normalizer for MockNormalizer {
    fn provider_id(&self) -> &str {
        PROVIDER_ID
    }

    fn normalize(&self, raw: &RawProviderResult) -> Result<NormalizedResult> {
        let item = &raw.payload;
        let title = item
            .get("title")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("mock item missing title"))?;
        let url = item
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow!("mock item missing url"))?;

        let price = item.get("price").and_then(|v| v.as_f64());
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
            merchant_name: item
                .get("merchant")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            merchant_domain: domain,
            image_url: item
                .get("image_url")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            rating: item.get("rating").and_then(|v| v.as_f64()),
            reviews_count: item
                .get("reviews_count")
                .and_then(|v| v.as_u64())
                .map(|n| n as u32),
            shipping_info: item
                .get("shipping_info")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            raw_data: bounded_raw_data(item),
        })
    }
}
