//! Bid rows and their upsert semantics
//!
//! The upsert conflicts on (request_id, source, canonical_url). A re-run of
//! the same search refreshes price and payload fields in place and never
//! touches `is_selected`: the buyer's choice survives refreshes.

use super::Store;
use crate::error::SourcingError;
use crate::results::NormalizedResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

const UPSERT_ATTEMPTS: u32 = 3;

/// A persisted sourcing result attached to a request
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bid {
    pub id: String,
    pub request_id: String,
    pub title: String,
    pub url: String,
    pub canonical_url: String,
    pub source: String,
    pub price: Option<f64>,
    pub currency: String,
    pub price_original: Option<f64>,
    pub currency_original: Option<String>,
    pub merchant_name: Option<String>,
    pub merchant_domain: String,
    pub image_url: Option<String>,
    pub rating: Option<f64>,
    pub reviews_count: Option<u32>,
    pub shipping_info: Option<String>,
    pub is_selected: bool,
    /// The bounded raw provider payload, serialized
    pub source_payload: String,
    pub search_intent_version: String,
    pub normalized_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bid {
    /// Build a fresh bid row from a normalized result
    pub fn from_result(
        request_id: &str,
        result: &NormalizedResult,
        intent_version: &str,
        normalized_at: DateTime<Utc>,
    ) -> Result<Self, SourcingError> {
        let now = Utc::now();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            request_id: request_id.to_string(),
            title: result.title.clone(),
            url: result.url.clone(),
            canonical_url: result.canonical_url.clone(),
            source: result.source.clone(),
            price: result.price,
            currency: result.currency.clone(),
            price_original: result.price_original,
            currency_original: result.currency_original.clone(),
            merchant_name: result.merchant_name.clone(),
            merchant_domain: result.merchant_domain.clone(),
            image_url: result.image_url.clone(),
            rating: result.rating,
            reviews_count: result.reviews_count,
            shipping_info: result.shipping_info.clone(),
            is_selected: false,
            source_payload: serde_json::to_string(&result.raw_data)?,
            search_intent_version: intent_version.to_string(),
            normalized_at,
            created_at: now,
            updated_at: now,
        })
    }
}

impl Store {
    /// Insert or refresh one bid. Conflict target (request_id, source,
    /// canonical_url); the update list deliberately excludes `is_selected`,
    /// `id`, and `created_at`.
    pub async fn upsert_bid(&self, bid: &Bid) -> Result<(), SourcingError> {
        let mut last_err: Option<sqlx::Error> = None;
        for attempt in 0..UPSERT_ATTEMPTS {
            match self.try_upsert_bid(bid).await {
                Ok(()) => return Ok(()),
                Err(e) if is_busy(&e) && attempt + 1 < UPSERT_ATTEMPTS => {
                    warn!(attempt, "bid upsert hit a busy database, retrying");
                    tokio::time::sleep(Duration::from_millis(50 * (attempt as u64 + 1))).await;
                    last_err = Some(e);
                }
                Err(e) if is_busy(&e) => {
                    return Err(SourcingError::PersistenceConflict {
                        request_id: bid.request_id.clone(),
                        provider: bid.source.clone(),
                        canonical_url: bid.canonical_url.clone(),
                    });
                }
                Err(e) => return Err(SourcingError::Store(e)),
            }
        }
        // Unreachable with attempts > 0; keep the compiler satisfied
        Err(last_err
            .map(SourcingError::Store)
            .unwrap_or(SourcingError::PersistenceConflict {
                request_id: bid.request_id.clone(),
                provider: bid.source.clone(),
                canonical_url: bid.canonical_url.clone(),
            }))
    }

    async fn try_upsert_bid(&self, bid: &Bid) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO bids (
                id, request_id, title, url, canonical_url, source,
                price, currency, price_original, currency_original,
                merchant_name, merchant_domain, image_url, rating,
                reviews_count, shipping_info, is_selected, source_payload,
                search_intent_version, normalized_at, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(request_id, source, canonical_url) DO UPDATE SET
                title = excluded.title,
                url = excluded.url,
                price = excluded.price,
                currency = excluded.currency,
                price_original = excluded.price_original,
                currency_original = excluded.currency_original,
                merchant_name = excluded.merchant_name,
                merchant_domain = excluded.merchant_domain,
                image_url = excluded.image_url,
                rating = excluded.rating,
                reviews_count = excluded.reviews_count,
                shipping_info = excluded.shipping_info,
                source_payload = excluded.source_payload,
                search_intent_version = excluded.search_intent_version,
                normalized_at = excluded.normalized_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&bid.id)
        .bind(&bid.request_id)
        .bind(&bid.title)
        .bind(&bid.url)
        .bind(&bid.canonical_url)
        .bind(&bid.source)
        .bind(bid.price)
        .bind(&bid.currency)
        .bind(bid.price_original)
        .bind(&bid.currency_original)
        .bind(&bid.merchant_name)
        .bind(&bid.merchant_domain)
        .bind(&bid.image_url)
        .bind(bid.rating)
        .bind(bid.reviews_count)
        .bind(&bid.shipping_info)
        .bind(bid.is_selected)
        .bind(&bid.source_payload)
        .bind(&bid.search_intent_version)
        .bind(bid.normalized_at)
        .bind(bid.created_at)
        .bind(bid.updated_at)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// All bids for a request, best price first with NULLs last
    pub async fn bids_for_request(&self, request_id: &str) -> Result<Vec<Bid>, SourcingError> {
        let bids = sqlx::query_as::<_, Bid>(
            r#"
            SELECT * FROM bids
            WHERE request_id = ?
            ORDER BY price IS NULL, price ASC, created_at ASC
            "#,
        )
        .bind(request_id)
        .fetch_all(self.pool())
        .await?;
        Ok(bids)
    }

    /// Mark or unmark a bid as the buyer's selection
    pub async fn set_selected(&self, bid_id: &str, selected: bool) -> Result<(), SourcingError> {
        sqlx::query("UPDATE bids SET is_selected = ?, updated_at = ? WHERE id = ?")
            .bind(selected)
            .bind(Utc::now())
            .bind(bid_id)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

fn is_busy(error: &sqlx::Error) -> bool {
    let text = error.to_string().to_lowercase();
    text.contains("database is locked") || text.contains("busy")
}
