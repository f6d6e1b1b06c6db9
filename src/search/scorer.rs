//! Result scoring
//!
//! Each normalized result is scored on three dimensions: relevance to the
//! intent, fit of the price within the requested budget, and listing
//! quality. The combined score is a weighted sum with configurable weights.

use crate::config::ScoringWeights;
use crate::intent::SearchIntent;
use crate::results::{NormalizedResult, ScoredResult};

/// Score one result against the intent
pub fn score_result(
    result: NormalizedResult,
    intent: &SearchIntent,
    weights: &ScoringWeights,
) -> ScoredResult {
    let relevance = relevance_score(&result, intent);
    let price = price_score(&result, intent.min_price, intent.max_price);
    let quality = quality_score(&result);

    let total = weights.relevance + weights.price + weights.quality;
    let combined = if total > 0.0 {
        (relevance * weights.relevance + price * weights.price + quality * weights.quality) / total
    } else {
        0.0
    };

    ScoredResult {
        result,
        relevance_score: round4(relevance),
        price_score: round4(price),
        quality_score: round4(quality),
        combined_score: round4(combined),
    }
}

/// How well the price fits the requested budget.
///
/// Unknown prices score neutral rather than sinking to the bottom; a
/// quote-only listing can still be the right answer.
fn price_score(result: &NormalizedResult, min_price: Option<f64>, max_price: Option<f64>) -> f64 {
    let price = match result.price {
        Some(p) if p > 0.0 => p,
        _ => return 0.5,
    };

    match (min_price, max_price) {
        (None, None) => 0.5,
        (Some(min), Some(max)) => {
            let mid = (min + max) / 2.0;
            let span = max - min;
            if span <= 0.0 {
                return if (price - mid).abs() < 1.0 { 1.0 } else { 0.2 };
            }
            // Distance from the midpoint as a fraction of the half-span
            let distance = (price - mid).abs() / (span / 2.0);
            if distance <= 1.0 {
                1.0 - distance * 0.3
            } else {
                (0.7 - (distance - 1.0) * 0.5).max(0.0)
            }
        }
        (None, Some(max)) => {
            if price <= max {
                // 0.8-1.0 inside the budget, cheaper is better
                0.8 + 0.2 * (1.0 - price / max)
            } else {
                (0.5 - (price - max) / max).max(0.0)
            }
        }
        (Some(min), None) => {
            if price >= min {
                0.8
            } else {
                (0.5 - (min - price) / min).max(0.0)
            }
        }
    }
}

/// Keyword, brand, name, and category match quality against the listing text
fn relevance_score(result: &NormalizedResult, intent: &SearchIntent) -> f64 {
    let mut score = 0.0;
    let title = result.title.to_lowercase();
    let merchant = result
        .merchant_name
        .as_deref()
        .unwrap_or("")
        .to_lowercase();
    let description = result
        .raw_data
        .get("snippet")
        .or_else(|| result.raw_data.get("description"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_lowercase();
    let searchable = format!("{title} {merchant} {description}");

    if let Some(ref brand) = intent.brand {
        let brand = brand.to_lowercase();
        if title.contains(&brand) {
            score += 0.25;
        } else if searchable.contains(&brand) {
            score += 0.15;
        } else if brand.split_whitespace().any(|w| searchable.contains(w)) {
            score += 0.08;
        }
    }

    if !intent.keywords.is_empty() {
        let count = intent.keywords.len() as f64;
        let title_matched = intent
            .keywords
            .iter()
            .filter(|kw| title.contains(&kw.to_lowercase()))
            .count() as f64;
        let full_matched = intent
            .keywords
            .iter()
            .filter(|kw| searchable.contains(&kw.to_lowercase()))
            .count() as f64;
        let title_ratio = title_matched / count;
        let full_ratio = full_matched / count;
        score += title_ratio * 0.35 + (full_ratio - title_ratio) * 0.10;
    }

    if let Some(ref name) = intent.product_name {
        let lowered = name.to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().filter(|w| w.len() > 2).collect();
        if !words.is_empty() {
            let matched = words.iter().filter(|w| title.contains(*w)).count() as f64;
            score += (matched / words.len() as f64) * 0.15;
        }
    }

    if intent.product_category != "unknown" {
        let cat = intent.product_category.replace('_', " ").to_lowercase();
        let words: Vec<&str> = cat.split_whitespace().collect();
        if !words.is_empty() {
            let matched = words.iter().filter(|w| searchable.contains(*w)).count() as f64;
            score += (matched / words.len() as f64) * 0.10;
        }
    }

    score += 0.05;
    score.min(1.0)
}

/// Listing quality from rating, review volume, image, and shipping signals
fn quality_score(result: &NormalizedResult) -> f64 {
    let mut score = 0.3;

    if let Some(rating) = result.rating.filter(|r| *r > 0.0) {
        score += (rating / 5.0) * 0.35;
    }
    if let Some(reviews) = result.reviews_count.filter(|r| *r > 0) {
        // Log scale, saturating near a thousand reviews
        let signal = ((reviews as f64 + 1.0).log10() / 3.0).min(1.0);
        score += signal * 0.2;
    }
    if result.image_url.is_some() {
        score += 0.05;
    }
    if result.shipping_info.is_some() {
        score += 0.1;
    }

    score.min(1.0)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(price: Option<f64>) -> NormalizedResult {
        NormalizedResult {
            title: "Acme Road Bike Carbon".to_string(),
            url: "https://shop.example.com/bike".to_string(),
            canonical_url: "https://shop.example.com/bike".to_string(),
            source: "catalog".to_string(),
            price,
            currency: "USD".to_string(),
            price_original: price,
            currency_original: price.map(|_| "USD".to_string()),
            merchant_name: Some("Example Shop".to_string()),
            merchant_domain: "shop.example.com".to_string(),
            image_url: Some("https://img.example.com/b.jpg".to_string()),
            rating: Some(4.5),
            reviews_count: Some(200),
            shipping_info: Some("Free shipping".to_string()),
            raw_data: serde_json::json!({}),
        }
    }

    fn intent() -> SearchIntent {
        SearchIntent {
            product_category: "road_bike".to_string(),
            product_name: Some("road bike".to_string()),
            brand: Some("Acme".to_string()),
            keywords: vec!["bike".to_string(), "carbon".to_string(), "road".to_string()],
            min_price: Some(500.0),
            max_price: Some(1500.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_unknown_price_neutral() {
        let r = result(None);
        assert_eq!(price_score(&r, Some(500.0), Some(1500.0)), 0.5);
        assert_eq!(price_score(&r, None, None), 0.5);
    }

    #[test]
    fn test_price_centered_beats_edges() {
        let mid = price_score(&result(Some(1000.0)), Some(500.0), Some(1500.0));
        let edge = price_score(&result(Some(1450.0)), Some(500.0), Some(1500.0));
        let outside = price_score(&result(Some(2500.0)), Some(500.0), Some(1500.0));
        assert!(mid > edge);
        assert!(edge > outside);
        assert_eq!(mid, 1.0);
    }

    #[test]
    fn test_max_only_cheaper_is_better() {
        let cheap = price_score(&result(Some(200.0)), None, Some(1000.0));
        let near = price_score(&result(Some(950.0)), None, Some(1000.0));
        assert!(cheap > near);
        assert!(near >= 0.8);
    }

    #[test]
    fn test_relevance_prefers_matching_title() {
        let matching = relevance_score(&result(Some(900.0)), &intent());
        let mut unrelated = result(Some(900.0));
        unrelated.title = "Garden hose 50ft".to_string();
        let worse = relevance_score(&unrelated, &intent());
        assert!(matching > worse);
        assert!(matching > 0.7);
    }

    #[test]
    fn test_quality_rewards_signals() {
        let full = quality_score(&result(Some(900.0)));
        let mut bare = result(Some(900.0));
        bare.rating = None;
        bare.reviews_count = None;
        bare.image_url = None;
        bare.shipping_info = None;
        assert!(full > quality_score(&bare));
        assert_eq!(quality_score(&bare), 0.3);
    }

    #[test]
    fn test_combined_uses_weights() {
        let weights = ScoringWeights::default();
        let scored = score_result(result(Some(1000.0)), &intent(), &weights);
        let expected = (scored.relevance_score * 0.4
            + scored.price_score * 0.3
            + scored.quality_score * 0.3)
            / 1.0;
        assert!((scored.combined_score - round4(expected)).abs() < 1e-6);
    }

    #[test]
    fn test_weights_normalized() {
        let doubled = ScoringWeights {
            relevance: 0.8,
            price: 0.6,
            quality: 0.6,
        };
        let a = score_result(result(Some(1000.0)), &intent(), &ScoringWeights::default());
        let b = score_result(result(Some(1000.0)), &intent(), &doubled);
        assert_eq!(a.combined_score, b.combined_score);
    }
}
