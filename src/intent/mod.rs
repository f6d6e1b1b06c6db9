//! Search intent extraction.
//!
//! The primary path asks a language model to fill a fixed JSON contract;
//! the fallback is a deterministic heuristic parser. The pipeline never
//! stalls on the model being down: extraction always yields an intent.

pub mod heuristic;
pub mod llm;
pub mod taxonomy;

pub use llm::IntentExtractor;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

use crate::CLARIFY_CONFIDENCE_THRESHOLD;

/// Current version of the intent schema, stamped onto persisted `Bid` rows.
pub const INTENT_SCHEMA_VERSION: &str = "v2";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PriceFlexibility {
    Strict,
    Flexible,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    New,
    Used,
    Refurbished,
    Any,
}

/// A feature constraint value: a single token or a list of alternatives
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FeatureValue {
    One(String),
    Many(Vec<String>),
}

/// Structured representation of a buyer's need, immutable once produced.
/// One per search invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchIntent {
    pub product_category: String,
    pub taxonomy_version: Option<String>,
    pub category_path: Vec<String>,
    pub product_name: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub price_flexibility: Option<PriceFlexibility>,
    pub condition: Option<Condition>,
    pub features: BTreeMap<String, FeatureValue>,
    pub keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub confidence: f64,
    pub raw_input: String,
}

impl Default for SearchIntent {
    fn default() -> Self {
        Self {
            product_category: "unknown".to_string(),
            taxonomy_version: Some(taxonomy::DEFAULT_TAXONOMY_VERSION.to_string()),
            category_path: Vec::new(),
            product_name: None,
            brand: None,
            model: None,
            min_price: None,
            max_price: None,
            price_flexibility: None,
            condition: None,
            features: BTreeMap::new(),
            keywords: Vec::new(),
            exclude_keywords: Vec::new(),
            confidence: 0.0,
            raw_input: String::new(),
        }
    }
}

impl SearchIntent {
    /// Enforce field invariants after extraction from either path:
    /// casefold-deduplicated sorted keywords, non-inverted price bounds,
    /// clamped confidence, non-empty category.
    pub fn normalized(mut self) -> Self {
        self.keywords = dedupe_sorted(&self.keywords);
        self.exclude_keywords = dedupe_sorted(&self.exclude_keywords);

        if let (Some(min), Some(max)) = (self.min_price, self.max_price) {
            if min > max {
                self.min_price = Some(max);
                self.max_price = Some(min);
            }
        }

        self.confidence = self.confidence.clamp(0.0, 1.0);

        if self.product_category.trim().is_empty() {
            self.product_category = "unknown".to_string();
        } else {
            self.product_category = taxonomy::normalize_category(&self.product_category);
            if self.product_category.is_empty() {
                self.product_category = "unknown".to_string();
            }
        }
        if self.taxonomy_version.is_none() {
            self.taxonomy_version = Some(taxonomy::DEFAULT_TAXONOMY_VERSION.to_string());
        }
        if self.category_path.is_empty() && self.product_category != "unknown" {
            self.category_path = taxonomy::resolve_category_path(&self.product_category);
        }

        self
    }

    pub fn has_price_bounds(&self) -> bool {
        self.min_price.is_some() || self.max_price.is_some()
    }

    /// Whether the caller should ask one clarifying question before running
    /// a full multi-provider search.
    pub fn needs_clarification(&self) -> bool {
        self.confidence < CLARIFY_CONFIDENCE_THRESHOLD
    }
}

fn dedupe_sorted(values: &[String]) -> Vec<String> {
    let mut seen: BTreeMap<String, String> = BTreeMap::new();
    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            continue;
        }
        seen.entry(trimmed.to_lowercase())
            .or_insert_with(|| trimmed.to_string());
    }
    seen.into_values().collect()
}

/// Everything the extractor may draw on: the buyer's latest text plus any
/// prior context the owning request has accumulated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionContext {
    /// The buyer's free-form request text
    pub display_query: String,
    /// Title of the owning request row, if any
    pub row_title: Option<String>,
    /// Title of the surrounding project, if any
    pub project_title: Option<String>,
    /// Structured answers the buyer already gave (e.g. min_price, brand)
    pub prior_answers: BTreeMap<String, serde_json::Value>,
    /// Hard constraints attached to the owning request
    pub constraints: BTreeMap<String, serde_json::Value>,
}

impl ExtractionContext {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            display_query: text.into(),
            ..Default::default()
        }
    }

    /// The text the extractors parse: the query, falling back to the row title.
    pub fn extraction_text(&self) -> &str {
        if !self.display_query.trim().is_empty() {
            &self.display_query
        } else {
            self.row_title.as_deref().unwrap_or("")
        }
    }
}

/// Extract a structured intent, preferring the language-model path and
/// degrading to the heuristic parser on any failure. Never fails.
pub async fn extract_search_intent(
    extractor: Option<&IntentExtractor>,
    ctx: &ExtractionContext,
) -> SearchIntent {
    if let Some(extractor) = extractor {
        match extractor.extract(ctx).await {
            Ok(intent) => return intent,
            Err(e) => {
                warn!("intent extraction via model failed, using heuristic: {e}");
            }
        }
    }
    heuristic::build_heuristic_intent(ctx)
}
