//! Currency normalization using static FX reference rates.
//!
//! Real-time rates are a non-goal; the static table exists so that a EUR
//! marketplace listing and a USD catalog listing rank on comparable prices.
//! The pre-conversion price and currency are always retained on the
//! normalized result.

/// USD-conversion multipliers per ISO currency code
const RATES: &[(&str, f64)] = &[
    ("USD", 1.0),
    ("EUR", 1.08),
    ("GBP", 1.27),
    ("CAD", 0.74),
    ("AUD", 0.66),
    ("JPY", 0.0067),
    ("CNY", 0.14),
    ("INR", 0.012),
    ("MXN", 0.058),
];

/// Validate and uppercase an ISO currency code. Unknown codes return `None`.
pub fn normalize_currency_code(code: &str) -> Option<&'static str> {
    let trimmed = code.trim().to_uppercase();
    if trimmed.len() != 3 {
        return None;
    }
    RATES
        .iter()
        .find(|(known, _)| *known == trimmed)
        .map(|(known, _)| *known)
}

fn rate_for(code: &str) -> Option<f64> {
    RATES
        .iter()
        .find(|(known, _)| *known == code)
        .map(|(_, rate)| *rate)
}

/// Convert an amount into USD, rounding to cents.
///
/// Unrecognized source codes are treated as already-USD, matching providers
/// that omit or garble the currency field.
pub fn to_usd(amount: f64, from_currency: &str) -> Option<f64> {
    let src = normalize_currency_code(from_currency).unwrap_or("USD");
    if src == "USD" {
        return Some(round_cents(amount));
    }
    let rate = rate_for(src)?;
    Some(round_cents(amount * rate))
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}
