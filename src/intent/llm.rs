//! Language-model intent extraction with a fixed JSON contract.
//!
//! The model is asked for JSON only; the response text is scanned for the
//! first object literal and deserialized straight into `SearchIntent`.
//! Any failure here is recoverable: the caller falls back to the heuristic
//! parser and the search proceeds.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{ExtractionContext, SearchIntent};
use crate::config::IntentSettings;

/// Client for the intent-extraction model endpoint
pub struct IntentExtractor {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: String,
}

impl IntentExtractor {
    /// Build an extractor from settings; `None` when no API key is configured,
    /// which routes every extraction through the heuristic path.
    pub fn from_settings(settings: &IntentSettings) -> Option<Self> {
        let api_key = settings.api_key.clone()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(settings.timeout_secs))
            .build()
            .ok()?;
        Some(Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key,
            timeout: Duration::from_secs_f64(settings.timeout_secs),
        })
    }

    #[cfg(test)]
    pub fn for_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: "test-key".to_string(),
            timeout: Duration::from_secs(5),
        }
    }

    /// Run one extraction against the model.
    pub async fn extract(&self, ctx: &ExtractionContext) -> Result<SearchIntent> {
        let prompt = build_prompt(ctx);
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .context("intent model request failed")?
            .error_for_status()
            .context("intent model returned an error status")?;

        let payload: GenerateResponse = response
            .json()
            .await
            .context("intent model response was not valid JSON")?;

        let text = payload
            .candidates
            .first()
            .and_then(|c| c.content.parts.first())
            .map(|p| p.text.as_str())
            .ok_or_else(|| anyhow!("intent model response had no candidates"))?;

        let json = extract_json_object(text)
            .ok_or_else(|| anyhow!("intent model response contained no JSON object"))?;

        let mut intent: SearchIntent =
            serde_json::from_str(json).context("intent JSON did not match the contract")?;
        if intent.raw_input.is_empty() {
            intent.raw_input = ctx.extraction_text().to_string();
        }
        debug!(
            category = %intent.product_category,
            confidence = intent.confidence,
            "extracted intent via model"
        );
        Ok(intent.normalized())
    }
}

/// The fixed extraction contract. Prices are numbers only; "under $X" maps
/// to max_price, "$X-Y" to both bounds, vague budget talk to flexible.
fn build_prompt(ctx: &ExtractionContext) -> String {
    format!(
        r#"You are extracting a structured SearchIntent JSON for a procurement search.

Output JSON ONLY. No extra text.

Inputs:
- display_query: {display_query}
- row_title: {row_title}
- project_title: {project_title}
- prior_answers: {prior_answers}
- constraints: {constraints}

Schema:
{{
  "product_category": "string (concise slug, e.g. 'running_shoes')",
  "taxonomy_version": "string|null",
  "category_path": ["array", "of", "strings"],
  "product_name": "string|null",
  "brand": "string|null",
  "model": "string|null",
  "min_price": "number|null",
  "max_price": "number|null",
  "price_flexibility": "'strict'|'flexible'|null",
  "condition": "'new'|'used'|'refurbished'|'any'|null",
  "features": {{"key": "value pairs"}},
  "keywords": ["short", "lowercase", "tokens"],
  "exclude_keywords": [],
  "confidence": 0.0,
  "raw_input": "string"
}}

Rules:
- product_category is required and must be a concise slug.
- min_price/max_price are numbers, never strings. "under $X" means max_price=X.
  "$X-Y" or "$X to $Y" means both bounds. Vague budget language ("around",
  "roughly") means price_flexibility="flexible".
- features holds non-price constraints.
- keywords are short lowercase tokens.
- confidence is 0-1 and reflects extraction certainty.
"#,
        display_query = serde_json::json!(ctx.display_query),
        row_title = serde_json::json!(ctx.row_title.as_deref().unwrap_or("")),
        project_title = serde_json::json!(ctx.project_title.as_deref().unwrap_or("")),
        prior_answers = serde_json::json!(ctx.prior_answers),
        constraints = serde_json::json!(ctx.constraints),
    )
}

/// Find the first balanced JSON object in model output, tolerating prose or
/// markdown fences around it.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_extract_json_object() {
        assert_eq!(
            extract_json_object("here you go: {\"a\": {\"b\": 1}} thanks"),
            Some("{\"a\": {\"b\": 1}}")
        );
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(
            extract_json_object("{\"s\": \"braces } in {strings\"}"),
            Some("{\"s\": \"braces } in {strings\"}")
        );
    }

    #[tokio::test]
    async fn test_extract_parses_model_output() {
        let server = MockServer::start().await;
        let intent_json = serde_json::json!({
            "product_category": "road_bike",
            "brand": "Acme",
            "max_price": 5000,
            "keywords": ["acme", "road", "bike"],
            "confidence": 0.9,
            "raw_input": "Acme road bike under $5000"
        });
        let body = serde_json::json!({
            "candidates": [{
                "content": { "parts": [{ "text": format!("```json\n{intent_json}\n```") }] }
            }]
        });
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let extractor = IntentExtractor::for_endpoint(server.uri());
        let ctx = ExtractionContext::from_text("Acme road bike under $5000");
        let intent = extractor.extract(&ctx).await.unwrap();

        assert_eq!(intent.product_category, "road_bike");
        assert_eq!(intent.brand.as_deref(), Some("Acme"));
        assert_eq!(intent.max_price, Some(5000.0));
        assert!(!intent.needs_clarification());
    }

    #[tokio::test]
    async fn test_extract_fails_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let extractor = IntentExtractor::for_endpoint(server.uri());
        let ctx = ExtractionContext::from_text("anything");
        assert!(extractor.extract(&ctx).await.is_err());
    }
}
