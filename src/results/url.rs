//! Canonical URL computation.
//!
//! The canonical form is the stable identity key for `Bid` upserts, so the
//! same rule must be applied everywhere a canonical URL is produced:
//! force https, lowercase the host, strip a leading `www.`, drop tracking
//! query parameters, deduplicate and sort the rest, trim the trailing slash,
//! and drop the fragment. The function is idempotent.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

/// Exact query keys that are tracking noise, never product identity
const TRACKING_KEYS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "gclid",
    "fbclid",
    "msclkid",
    "yclid",
    "mc_eid",
    "mc_cid",
    "igshid",
    "spm",
    "ref",
    "affid",
    "affidname",
];

/// Key prefixes that mark a tracking parameter
const TRACKING_PREFIXES: &[&str] = &["utm", "ga_", "icid", "mkt_"];

static MULTI_SLASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"/{2,}").unwrap());

fn is_tracking_param(key: &str) -> bool {
    let lower = key.to_lowercase();
    TRACKING_KEYS.contains(&lower.as_str())
        || TRACKING_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Coerce provider link shapes (protocol-relative, bare host, site-relative)
/// into something parseable as an absolute URL.
fn ensure_absolute(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let lower = trimmed.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return trimmed.to_string();
    }
    if trimmed.starts_with("//") {
        return format!("https:{trimmed}");
    }
    if trimmed.starts_with("www.") {
        return format!("https://{trimmed}");
    }
    // Site-relative links come from web-search payloads scraped off a
    // search results page.
    if trimmed.starts_with('/') {
        return format!("https://www.google.com{trimmed}");
    }
    if !trimmed.contains("://") {
        return format!("https://{trimmed}");
    }
    trimmed.to_string()
}

/// Compute the canonical form of a result URL.
///
/// Returns an empty string for empty input and the trimmed input unchanged
/// when it cannot be parsed at all.
pub fn canonicalize_url(raw: &str) -> String {
    let absolute = ensure_absolute(raw);
    if absolute.is_empty() {
        return String::new();
    }

    let parsed = match Url::parse(&absolute) {
        Ok(u) => u,
        Err(_) => return absolute,
    };

    let mut host = match parsed.host_str() {
        Some(h) => h.to_lowercase(),
        None => return absolute,
    };
    if let Some(stripped) = host.strip_prefix("www.") {
        host = stripped.to_string();
    }
    if let Some(port) = parsed.port() {
        if port != 443 && port != 80 {
            host = format!("{host}:{port}");
        }
    }

    let mut path = MULTI_SLASH.replace_all(parsed.path(), "/").to_string();
    if path != "/" {
        path = path.trim_end_matches('/').to_string();
        if path.is_empty() {
            path = "/".to_string();
        }
    }

    let mut pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, v)| !k.is_empty() && !v.is_empty() && !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut seen: HashSet<(String, String)> = HashSet::new();
    pairs.retain(|(k, v)| seen.insert((k.to_lowercase(), v.clone())));
    pairs.sort_by(|a, b| a.0.to_lowercase().cmp(&b.0.to_lowercase()));

    let query = if pairs.is_empty() {
        String::new()
    } else {
        let encoded: Vec<String> = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        format!("?{}", encoded.join("&"))
    };

    let path_part = if path == "/" && query.is_empty() {
        String::new()
    } else {
        path
    };

    format!("https://{host}{path_part}{query}")
}

/// Extract the merchant domain from a result URL, without a `www.` prefix.
pub fn merchant_domain(url: &str) -> String {
    let absolute = ensure_absolute(url);
    match Url::parse(&absolute) {
        Ok(parsed) => parsed
            .host_str()
            .map(|h| h.to_lowercase().trim_start_matches("www.").to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        Err(_) => "unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonicalize_strips_tracking_and_www() {
        let url = "HTTP://WWW.Example.com/Product/?utm_source=x&utm_campaign=y&gclid=z&color=red";
        assert_eq!(
            canonicalize_url(url),
            "https://example.com/Product?color=red"
        );
    }

    #[test]
    fn test_canonicalize_idempotent() {
        let inputs = [
            "https://www.example.com/a/b/?utm_medium=email&id=2&id=2",
            "//cdn.shop.io//items///42?ref=abc",
            "www.store.com/x?b=2&a=1#frag",
            "store.com:8443/y",
        ];
        for input in inputs {
            let once = canonicalize_url(input);
            let twice = canonicalize_url(&once);
            assert_eq!(once, twice, "not idempotent for {input}");
        }
    }

    #[test]
    fn test_canonicalize_trailing_slash_and_fragment() {
        assert_eq!(
            canonicalize_url("https://shop.io/items/42/#reviews"),
            "https://shop.io/items/42"
        );
    }

    #[test]
    fn test_canonicalize_sorts_and_dedupes_query() {
        assert_eq!(
            canonicalize_url("https://shop.io/p?z=1&a=2&Z=1"),
            "https://shop.io/p?a=2&z=1"
        );
    }

    #[test]
    fn test_canonicalize_drops_default_port() {
        assert_eq!(canonicalize_url("https://shop.io:443/p"), "https://shop.io/p");
        assert_eq!(canonicalize_url("http://shop.io:80/p"), "https://shop.io/p");
        assert_eq!(
            canonicalize_url("https://shop.io:8443/p"),
            "https://shop.io:8443/p"
        );
    }

    #[test]
    fn test_canonicalize_empty() {
        assert_eq!(canonicalize_url(""), "");
        assert_eq!(canonicalize_url("   "), "");
    }

    #[test]
    fn test_bare_host_collapses_to_origin() {
        assert_eq!(canonicalize_url("https://www.example.com/"), "https://example.com");
    }

    #[test]
    fn test_merchant_domain() {
        assert_eq!(merchant_domain("https://www.BestBuy.com/site/x"), "bestbuy.com");
        assert_eq!(merchant_domain(""), "unknown");
    }
}
