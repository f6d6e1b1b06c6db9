//! Deterministic heuristic intent parser.
//!
//! The fallback path when the model is unconfigured or errors. Confidence is
//! deliberately low so callers know this came from regexes, not understanding.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use super::taxonomy;
use super::{ExtractionContext, FeatureValue, PriceFlexibility, SearchIntent};

const HEURISTIC_CONFIDENCE: f64 = 0.2;

static PRICE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$?\s*(\d+(?:\.\d+)?)").unwrap());
static RANGE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(to|-)\b").unwrap());
static LOWER_BOUND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\bover\b|\babove\b|\bmore\b|\bminimum\b|\bat\s*least\b)").unwrap());
static DOLLAR_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\s*(\d+(?:\.\d+)?)").unwrap());
static BOUND_WORDS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(over|under|below|above|more|less|at\s+least|at\s+most|to)\b").unwrap()
});
static DASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-–—]").unwrap());
static TOKEN_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

/// Parse price bounds out of free text.
///
/// Returns `(min, max, remaining_text)` where the remaining text has the
/// price language stripped so it can serve as the product description.
/// "under $X" yields a max, "over $X" a min, "$X to $Y" both, and a bare
/// number is treated as a budget ceiling.
///
/// Dollar-marked amounts win over bare numbers, so "2 bikes under $500"
/// reads the 500 as the price and leaves the 2 as a quantity.
pub fn parse_price_constraint(text: &str) -> (Option<f64>, Option<f64>, String) {
    let raw = text.trim();
    let dollar_nums: Vec<f64> = DOLLAR_AMOUNT
        .captures_iter(raw)
        .filter_map(|cap| cap[1].parse().ok())
        .collect();
    let nums: Vec<f64> = if dollar_nums.is_empty() {
        PRICE_NUMBER
            .captures_iter(raw)
            .filter_map(|cap| cap[1].parse().ok())
            .collect()
    } else {
        dollar_nums
    };

    let lower = raw.to_lowercase();
    let mut min_price = None;
    let mut max_price = None;

    if nums.len() >= 2 && RANGE_MARKER.is_match(&lower) {
        min_price = Some(nums[0].min(nums[1]));
        max_price = Some(nums[0].max(nums[1]));
    } else if let Some(&n) = nums.first() {
        if LOWER_BOUND.is_match(raw) {
            min_price = Some(n);
        } else {
            // "under $X" and a bare number both read as a ceiling
            max_price = Some(n);
        }
    }

    let mut remaining = DOLLAR_AMOUNT.replace_all(raw, "").into_owned();
    remaining = BOUND_WORDS.replace_all(&remaining, "").into_owned();
    remaining = DASHES.replace_all(&remaining, " ").into_owned();
    let remaining = remaining.split_whitespace().collect::<Vec<_>>().join(" ");

    (min_price, max_price, remaining)
}

/// Tokenize text into lowercase keywords, dropping single characters
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut keywords: Vec<String> = TOKEN_SPLIT
        .split(&lowered)
        .filter(|token| token.len() > 1)
        .map(str::to_string)
        .collect();
    keywords.sort();
    keywords.dedup();
    keywords
}

fn feature_value(value: &serde_json::Value) -> FeatureValue {
    match value {
        serde_json::Value::Array(items) => FeatureValue::Many(
            items
                .iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
        ),
        serde_json::Value::String(s) => FeatureValue::One(s.clone()),
        other => FeatureValue::One(other.to_string()),
    }
}

fn numeric(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn string(value: &serde_json::Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

/// Build a search intent from regex rules alone, no model involved.
///
/// Prior structured answers and request constraints take precedence
/// over bounds parsed out of the free text.
pub fn build_heuristic_intent(ctx: &ExtractionContext) -> SearchIntent {
    let raw_input = ctx.extraction_text().to_string();
    let (text_min, text_max, remaining) = parse_price_constraint(&raw_input);

    let min_price = numeric_answer(ctx, "min_price").or(text_min);
    let max_price = numeric_answer(ctx, "max_price").or(text_max);

    let cleaned = if remaining.is_empty() {
        raw_input.clone()
    } else {
        remaining
    };
    let product_name = if cleaned.is_empty() {
        ctx.row_title.clone().unwrap_or_else(|| raw_input.clone())
    } else {
        cleaned
    };
    let product_category = taxonomy::normalize_category(&product_name);
    let keywords = extract_keywords(&product_name);

    let mut features: BTreeMap<String, FeatureValue> = BTreeMap::new();
    for (key, value) in ctx.constraints.iter().chain(ctx.prior_answers.iter()) {
        if key == "min_price" || key == "max_price" || key == "brand" || key == "model" {
            continue;
        }
        features
            .entry(key.clone())
            .or_insert_with(|| feature_value(value));
    }

    let brand = ctx
        .constraints
        .get("brand")
        .or_else(|| ctx.prior_answers.get("brand"))
        .and_then(string);
    let model = ctx
        .constraints
        .get("model")
        .or_else(|| ctx.prior_answers.get("model"))
        .and_then(string);

    SearchIntent {
        product_category: if product_category.is_empty() {
            "unknown".to_string()
        } else {
            product_category
        },
        product_name: (!product_name.is_empty()).then_some(product_name),
        brand,
        model,
        min_price,
        max_price,
        price_flexibility: (min_price.is_some() || max_price.is_some())
            .then_some(PriceFlexibility::Strict),
        features,
        keywords,
        confidence: HEURISTIC_CONFIDENCE,
        raw_input,
        ..Default::default()
    }
    .normalized()
}

fn numeric_answer(ctx: &ExtractionContext, key: &str) -> Option<f64> {
    ctx.prior_answers
        .get(key)
        .and_then(numeric)
        .or_else(|| ctx.constraints.get(key).and_then(numeric))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_price() {
        let (min, max, rest) = parse_price_constraint("road bike under $5000");
        assert_eq!(min, None);
        assert_eq!(max, Some(5000.0));
        assert_eq!(rest, "road bike");
    }

    #[test]
    fn test_price_range() {
        let (min, max, _) = parse_price_constraint("laptop $800 to $1200");
        assert_eq!(min, Some(800.0));
        assert_eq!(max, Some(1200.0));
    }

    #[test]
    fn test_over_price() {
        let (min, max, _) = parse_price_constraint("espresso machine over $300");
        assert_eq!(min, Some(300.0));
        assert_eq!(max, None);
    }

    #[test]
    fn test_bare_number_is_ceiling() {
        let (min, max, _) = parse_price_constraint("office chair $250");
        assert_eq!(min, None);
        assert_eq!(max, Some(250.0));
    }

    #[test]
    fn test_quantity_does_not_shadow_dollar_amount() {
        let (min, max, rest) = parse_price_constraint("2 bikes under $500");
        assert_eq!(min, None);
        assert_eq!(max, Some(500.0));
        assert_eq!(rest, "2 bikes");
    }

    #[test]
    fn test_quantity_with_dollar_range() {
        let (min, max, _) = parse_price_constraint("3 chairs $100 to $200");
        assert_eq!(min, Some(100.0));
        assert_eq!(max, Some(200.0));
    }

    #[test]
    fn test_no_price() {
        let (min, max, rest) = parse_price_constraint("blue running shoes");
        assert_eq!(min, None);
        assert_eq!(max, None);
        assert_eq!(rest, "blue running shoes");
    }

    #[test]
    fn test_extract_keywords() {
        let kw = extract_keywords("Acme ROAD bike, road-ready!");
        assert_eq!(kw, vec!["acme", "bike", "ready", "road"]);
    }

    #[test]
    fn test_heuristic_intent_basic() {
        let ctx = ExtractionContext::from_text("Acme road bike under $5000");
        let intent = build_heuristic_intent(&ctx);
        assert_eq!(intent.max_price, Some(5000.0));
        assert_eq!(intent.product_category, "acme_road_bike");
        assert!(intent.keywords.contains(&"road".to_string()));
        assert_eq!(intent.price_flexibility, Some(PriceFlexibility::Strict));
        assert_eq!(intent.confidence, HEURISTIC_CONFIDENCE);
    }

    #[test]
    fn test_prior_answers_override_text() {
        let mut ctx = ExtractionContext::from_text("road bike under $5000");
        ctx.prior_answers.insert(
            "max_price".to_string(),
            serde_json::json!(3000),
        );
        ctx.prior_answers
            .insert("brand".to_string(), serde_json::json!("Acme"));
        let intent = build_heuristic_intent(&ctx);
        assert_eq!(intent.max_price, Some(3000.0));
        assert_eq!(intent.brand.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_constraints_become_features() {
        let mut ctx = ExtractionContext::from_text("road bike");
        ctx.constraints
            .insert("frame".to_string(), serde_json::json!("carbon"));
        ctx.constraints.insert(
            "color".to_string(),
            serde_json::json!(["red", "black"]),
        );
        let intent = build_heuristic_intent(&ctx);
        assert_eq!(
            intent.features.get("frame"),
            Some(&FeatureValue::One("carbon".to_string()))
        );
        assert_eq!(
            intent.features.get("color"),
            Some(&FeatureValue::Many(vec![
                "red".to_string(),
                "black".to_string()
            ]))
        );
    }

    #[test]
    fn test_row_title_fallback() {
        let ctx = ExtractionContext {
            display_query: String::new(),
            row_title: Some("standing desk".to_string()),
            ..Default::default()
        };
        let intent = build_heuristic_intent(&ctx);
        assert_eq!(intent.product_category, "standing_desk");
    }
}
