//! Category taxonomy helpers

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

pub const DEFAULT_TAXONOMY_VERSION: &str = "shopping_v1";

static NON_ALNUM: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9]+").unwrap());

static CATEGORY_LABELS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("running_shoes", "running shoes"),
        ("road_bike", "road bike"),
        ("laptop", "laptop"),
        ("headphones", "headphones"),
        ("office_chair", "office chair"),
    ])
});

static CATEGORY_PATHS: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    HashMap::from([
        ("running_shoes", &["shoes", "running shoes"] as &[_]),
        ("road_bike", &["sporting goods", "cycling", "road bike"] as &[_]),
        ("laptop", &["electronics", "computers", "laptop"] as &[_]),
        ("headphones", &["electronics", "audio", "headphones"] as &[_]),
        ("office_chair", &["furniture", "office", "chair"] as &[_]),
    ])
});

/// Slugify a free-text category into `snake_case` ASCII
pub fn normalize_category(category: &str) -> String {
    let lowered = category.trim().to_lowercase();
    NON_ALNUM
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// Human-readable label for a category slug
pub fn resolve_category_label(category: &str) -> String {
    let normalized = normalize_category(category);
    CATEGORY_LABELS
        .get(normalized.as_str())
        .map(|label| label.to_string())
        .unwrap_or_else(|| normalized.replace('_', " "))
}

/// Hierarchical path for a category slug, falling back to the label's words
pub fn resolve_category_path(category: &str) -> Vec<String> {
    let normalized = normalize_category(category);
    if let Some(path) = CATEGORY_PATHS.get(normalized.as_str()) {
        return path.iter().map(|segment| segment.to_string()).collect();
    }
    resolve_category_label(&normalized)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
