//! Result aggregation: dedup, budget post-filter, scoring, ranking

use super::scorer::score_result;
use crate::config::ScoringWeights;
use crate::intent::SearchIntent;
use crate::results::{NormalizedResult, PriceRange, ScoredResult};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// The merged, ranked output of one search run
#[derive(Debug, Clone, Default)]
pub struct AggregatedResults {
    /// Results sorted by descending combined score
    pub ranked: Vec<ScoredResult>,
    /// Min/max of the known prices in the ranked set
    pub price_range: Option<PriceRange>,
    /// Surviving result count per provider
    pub provider_counts: BTreeMap<String, usize>,
}

/// Merge per-provider normalized results into one ranked list.
///
/// Providers that filtered prices server-side are trusted; the rest get a
/// local budget post-filter. A result with an unknown price always
/// survives the filter: "no price" is not "out of budget".
pub fn aggregate(
    provider_results: Vec<(String, bool, Vec<NormalizedResult>)>,
    intent: &SearchIntent,
    weights: &ScoringWeights,
) -> AggregatedResults {
    let mut merged: Vec<NormalizedResult> = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for (provider_id, native_filter, results) in provider_results {
        let mut kept = 0usize;
        let mut dropped = 0usize;
        for result in results {
            if !native_filter && price_out_of_bounds(&result, intent) {
                dropped += 1;
                continue;
            }
            let key = (result.source.clone(), result.canonical_url.clone());
            if !seen.insert(key) {
                continue;
            }
            kept += 1;
            merged.push(result);
        }
        debug!(provider = %provider_id, kept, dropped, "aggregated provider results");
    }

    let mut ranked: Vec<ScoredResult> = merged
        .into_iter()
        .map(|result| score_result(result, intent, weights))
        .collect();
    // Stable sort keeps provider order for exact ties
    ranked.sort_by(|a, b| {
        b.combined_score
            .partial_cmp(&a.combined_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let price_range = compute_price_range(&ranked);
    let mut provider_counts: BTreeMap<String, usize> = BTreeMap::new();
    for scored in &ranked {
        *provider_counts
            .entry(scored.result.source.clone())
            .or_default() += 1;
    }

    AggregatedResults {
        ranked,
        price_range,
        provider_counts,
    }
}

fn price_out_of_bounds(result: &NormalizedResult, intent: &SearchIntent) -> bool {
    let price = match result.price {
        Some(p) => p,
        None => return false,
    };
    if let Some(min) = intent.min_price {
        if price < min {
            return true;
        }
    }
    if let Some(max) = intent.max_price {
        if price > max {
            return true;
        }
    }
    false
}

fn compute_price_range(ranked: &[ScoredResult]) -> Option<PriceRange> {
    let mut known = ranked.iter().filter_map(|s| s.result.price);
    let first = known.next()?;
    let (min, max) = known.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
    Some(PriceRange { min, max })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringWeights;

    fn result(source: &str, url: &str, price: Option<f64>) -> NormalizedResult {
        NormalizedResult {
            title: "Acme Road Bike".to_string(),
            url: url.to_string(),
            canonical_url: url.to_string(),
            source: source.to_string(),
            price,
            currency: "USD".to_string(),
            price_original: price,
            currency_original: price.map(|_| "USD".to_string()),
            merchant_name: Some("Shop".to_string()),
            merchant_domain: "shop.example.com".to_string(),
            image_url: None,
            rating: None,
            reviews_count: None,
            shipping_info: None,
            raw_data: serde_json::json!({}),
        }
    }

    fn intent() -> SearchIntent {
        SearchIntent {
            product_name: Some("road bike".to_string()),
            keywords: vec!["bike".to_string(), "road".to_string()],
            min_price: Some(500.0),
            max_price: Some(1500.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_post_filter_only_for_non_native_providers() {
        let out = aggregate(
            vec![
                (
                    "catalog".to_string(),
                    true,
                    vec![result("catalog", "https://a.example.com/1", Some(2000.0))],
                ),
                (
                    "websearch".to_string(),
                    false,
                    vec![result("websearch", "https://b.example.com/1", Some(2000.0))],
                ),
            ],
            &intent(),
            &ScoringWeights::default(),
        );
        // Native provider's out-of-range result trusted, non-native dropped
        assert_eq!(out.ranked.len(), 1);
        assert_eq!(out.ranked[0].result.source, "catalog");
    }

    #[test]
    fn test_unknown_price_survives_filter() {
        let out = aggregate(
            vec![(
                "websearch".to_string(),
                false,
                vec![result("websearch", "https://b.example.com/1", None)],
            )],
            &intent(),
            &ScoringWeights::default(),
        );
        assert_eq!(out.ranked.len(), 1);
        assert_eq!(out.price_range, None);
    }

    #[test]
    fn test_dedup_within_provider_keeps_cross_provider() {
        let out = aggregate(
            vec![
                (
                    "catalog".to_string(),
                    true,
                    vec![
                        result("catalog", "https://shop.example.com/bike", Some(900.0)),
                        result("catalog", "https://shop.example.com/bike", Some(900.0)),
                    ],
                ),
                (
                    "marketplace".to_string(),
                    true,
                    vec![result(
                        "marketplace",
                        "https://shop.example.com/bike",
                        Some(950.0),
                    )],
                ),
            ],
            &intent(),
            &ScoringWeights::default(),
        );
        // Same canonical url deduped within a provider, kept across providers
        assert_eq!(out.ranked.len(), 2);
        assert_eq!(out.provider_counts.get("catalog"), Some(&1));
        assert_eq!(out.provider_counts.get("marketplace"), Some(&1));
    }

    #[test]
    fn test_ranked_descending_and_price_range() {
        let out = aggregate(
            vec![(
                "catalog".to_string(),
                true,
                vec![
                    result("catalog", "https://a.example.com/1", Some(1000.0)),
                    result("catalog", "https://a.example.com/2", Some(1480.0)),
                    result("catalog", "https://a.example.com/3", Some(700.0)),
                ],
            )],
            &intent(),
            &ScoringWeights::default(),
        );
        let scores: Vec<f64> = out.ranked.iter().map(|s| s.combined_score).collect();
        let mut sorted = scores.clone();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert_eq!(scores, sorted);
        assert_eq!(
            out.price_range,
            Some(PriceRange {
                min: 700.0,
                max: 1480.0
            })
        );
    }

    #[test]
    fn test_mixed_providers_budget_scenario() {
        let intent = SearchIntent {
            product_category: "road_bike".to_string(),
            brand: Some("Acme".to_string()),
            max_price: Some(5000.0),
            keywords: vec!["Acme".to_string(), "road".to_string(), "bike".to_string()],
            ..Default::default()
        }
        .normalized();

        let native: Vec<NormalizedResult> = [1200.0, 3400.0, 4900.0]
            .iter()
            .enumerate()
            .map(|(i, p)| result("catalog", &format!("https://a.example.com/{i}"), Some(*p)))
            .collect();
        let unfiltered: Vec<NormalizedResult> = [900.0, 2500.0, 4800.0, 6200.0, 7000.0]
            .iter()
            .enumerate()
            .map(|(i, p)| result("websearch", &format!("https://b.example.com/{i}"), Some(*p)))
            .collect();

        let out = aggregate(
            vec![
                ("catalog".to_string(), true, native),
                ("websearch".to_string(), false, unfiltered),
            ],
            &intent,
            &ScoringWeights::default(),
        );

        // The two over-budget unfiltered items are dropped, the rest ranked
        assert_eq!(out.ranked.len(), 6);
        assert!(out
            .ranked
            .iter()
            .all(|s| s.result.price.map(|p| p <= 5000.0).unwrap_or(true)));
        for pair in out.ranked.windows(2) {
            assert!(pair[0].combined_score >= pair[1].combined_score);
        }
        assert_eq!(out.provider_counts.get("catalog"), Some(&3));
        assert_eq!(out.provider_counts.get("websearch"), Some(&3));
    }

    #[test]
    fn test_empty_input_is_empty_signal() {
        let out = aggregate(Vec::new(), &intent(), &ScoringWeights::default());
        assert!(out.ranked.is_empty());
        assert_eq!(out.price_range, None);
        assert!(out.provider_counts.is_empty());
    }
}
