//! SQLite-backed persistence for bids, intents, and query audits

mod bids;

pub use bids::Bid;

use crate::error::SourcingError;
use crate::intent::SearchIntent;
use crate::providers::ProviderQuery;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (creating if missing) the database at `path` and run migrations
    pub async fn open(path: &str) -> Result<Self, SourcingError> {
        if path == ":memory:" {
            return Self::open_in_memory().await;
        }
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{path}"))
            .map_err(SourcingError::Store)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// In-memory store, used by tests and the `:memory:` path setting
    pub async fn open_in_memory() -> Result<Self, SourcingError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(SourcingError::Store)?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn migrate(&self) -> Result<(), SourcingError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bids (
                id TEXT PRIMARY KEY,
                request_id TEXT NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                canonical_url TEXT NOT NULL,
                source TEXT NOT NULL,
                price REAL,
                currency TEXT NOT NULL,
                price_original REAL,
                currency_original TEXT,
                merchant_name TEXT,
                merchant_domain TEXT NOT NULL,
                image_url TEXT,
                rating REAL,
                reviews_count INTEGER,
                shipping_info TEXT,
                is_selected INTEGER NOT NULL DEFAULT 0,
                source_payload TEXT NOT NULL,
                search_intent_version TEXT NOT NULL,
                normalized_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(request_id, source, canonical_url)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS search_intents (
                request_id TEXT PRIMARY KEY,
                intent_json TEXT NOT NULL,
                extracted_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS query_audits (
                request_id TEXT PRIMARY KEY,
                queries_json TEXT NOT NULL,
                recorded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Persist the extracted intent for a request, replacing any prior one
    pub async fn save_intent(
        &self,
        request_id: &str,
        intent: &SearchIntent,
    ) -> Result<(), SourcingError> {
        let json = serde_json::to_string(intent)?;
        sqlx::query(
            r#"
            INSERT INTO search_intents (request_id, intent_json, extracted_at)
            VALUES (?, ?, ?)
            ON CONFLICT(request_id) DO UPDATE SET
                intent_json = excluded.intent_json,
                extracted_at = excluded.extracted_at
            "#,
        )
        .bind(request_id)
        .bind(json)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load_intent(
        &self,
        request_id: &str,
    ) -> Result<Option<SearchIntent>, SourcingError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT intent_json FROM search_intents WHERE request_id = ?")
                .bind(request_id)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some((json,)) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Record the exact per-provider queries sent for a request
    pub async fn save_query_audit(
        &self,
        request_id: &str,
        queries: &[ProviderQuery],
    ) -> Result<(), SourcingError> {
        let json = serde_json::to_string(queries)?;
        sqlx::query(
            r#"
            INSERT INTO query_audits (request_id, queries_json, recorded_at)
            VALUES (?, ?, ?)
            ON CONFLICT(request_id) DO UPDATE SET
                queries_json = excluded.queries_json,
                recorded_at = excluded.recorded_at
            "#,
        )
        .bind(request_id)
        .bind(json)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn load_query_audit(
        &self,
        request_id: &str,
    ) -> Result<Option<Vec<ProviderQuery>>, SourcingError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT queries_json FROM query_audits WHERE request_id = ?")
                .bind(request_id)
                .fetch_optional(&self.pool)
                .await?;
        match row {
            Some((json,)) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
