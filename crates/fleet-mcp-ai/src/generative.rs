//! Remote generative-text implementation of [`LanguageModel`].
//!
//! The vendor request/response schema is private to this module; nothing
//! else in the workspace sees it. Vendor failures are mapped into the
//! shared error taxonomy so callers can route to the fallback model.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use fleet_mcp_core::error::{FleetError, FleetResult};

use crate::model::LanguageModel;
use crate::selector::{select_tier, ModelTier};

/// Fixed generation settings sent with every request.
const TEMPERATURE: f64 = 0.7;
const TOP_P: f64 = 0.8;
const TOP_K: u32 = 10;
const MAX_OUTPUT_TOKENS: u32 = 2048;

/// Endpoint label used in rate-limited failures.
const GENERATIVE_ENDPOINT: &str = "generative-api";

/// Configuration of the remote endpoint.
#[derive(Debug, Clone)]
pub struct GenerativeModelConfig {
    pub base_url: String,
    pub api_key: String,
    /// Default model name
    pub model: String,
    /// Small model for fast-response requests; falls back to `model`
    pub fast_model: Option<String>,
    /// Large model for long or analytical prompts; falls back to `model`
    pub reasoning_model: Option<String>,
    pub timeout: Duration,
}

impl GenerativeModelConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            fast_model: None,
            reasoning_model: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Remote generative model.
pub struct GenerativeModel {
    client: reqwest::Client,
    config: GenerativeModelConfig,
}

impl GenerativeModel {
    pub fn new(config: GenerativeModelConfig) -> FleetResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FleetError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn model_for(&self, tier: ModelTier) -> &str {
        match tier {
            ModelTier::Fast => self.config.fast_model.as_deref(),
            ModelTier::Reasoning => self.config.reasoning_model.as_deref(),
            ModelTier::Default => None,
        }
        .unwrap_or(&self.config.model)
    }

    /// Complete with an explicitly chosen tier.
    pub async fn complete_with_tier(&self, prompt: &str, tier: ModelTier) -> FleetResult<String> {
        let model = self.model_for(tier);
        let url = format!("{}/models/{}:generateContent", self.config.base_url, model);
        debug!(model, chars = prompt.len(), "generative completion");

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                top_p: TOP_P,
                top_k: TOP_K,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| FleetError::Network(format!("generative API unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(%status, "generative API error");
            return Err(match status {
                StatusCode::UNAUTHORIZED => FleetError::Auth("generative API key rejected".into()),
                StatusCode::FORBIDDEN => FleetError::Forbidden("generative API access denied".into()),
                StatusCode::TOO_MANY_REQUESTS => {
                    FleetError::RateLimited(GENERATIVE_ENDPOINT.to_string())
                }
                StatusCode::BAD_REQUEST => {
                    FleetError::InvalidRequest(format!("generative API rejected request: {detail}"))
                }
                _ => FleetError::Internal(format!("generative API status {status}: {detail}")),
            });
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| FleetError::Parse(format!("invalid generative API response: {e}")))?;
        extract_text(body)
    }
}

#[async_trait]
impl LanguageModel for GenerativeModel {
    async fn complete(&self, prompt: &str) -> FleetResult<String> {
        self.complete_with_tier(prompt, select_tier(prompt, false))
            .await
    }

    fn name(&self) -> &str {
        "generative"
    }
}

fn extract_text(response: GenerateContentResponse) -> FleetResult<String> {
    if let Some(feedback) = &response.prompt_feedback {
        if let Some(reason) = &feedback.block_reason {
            return Err(FleetError::ContentPolicy(format!(
                "prompt blocked: {reason}"
            )));
        }
    }

    let candidate = response
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| FleetError::Internal("generative API returned no candidates".into()))?;

    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(FleetError::ContentPolicy(
            "completion blocked by safety filter".into(),
        ));
    }

    candidate
        .content
        .and_then(|content| content.parts.into_iter().next())
        .map(|part| part.text)
        .ok_or_else(|| FleetError::Internal("generative API returned an empty candidate".into()))
}

// --- vendor wire schema, never exposed ---

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "topP")]
    top_p: f64,
    #[serde(rename = "topK")]
    top_k: u32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_candidate_text() {
        let response: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "candidates": [
                {"content": {"parts": [{"text": "server list"}]}, "finishReason": "STOP"}
            ]
        }))
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "server list");
    }

    #[test]
    fn safety_block_maps_to_content_policy() {
        let blocked: GenerateContentResponse = serde_json::from_value(serde_json::json!({
            "promptFeedback": {"blockReason": "SAFETY"}
        }))
        .unwrap();
        assert!(matches!(
            extract_text(blocked),
            Err(FleetError::ContentPolicy(_))
        ));

        let candidate_blocked: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({
                "candidates": [{"finishReason": "SAFETY"}]
            }))
            .unwrap();
        assert!(matches!(
            extract_text(candidate_blocked),
            Err(FleetError::ContentPolicy(_))
        ));
    }

    #[test]
    fn empty_response_is_internal() {
        let empty: GenerateContentResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(matches!(extract_text(empty), Err(FleetError::Internal(_))));
    }

    #[test]
    fn tier_falls_back_to_default_model() {
        let model = GenerativeModel::new(GenerativeModelConfig::new(
            "https://llm.internal/v1",
            "key",
            "text-large-002",
        ))
        .unwrap();
        assert_eq!(model.model_for(ModelTier::Fast), "text-large-002");
        assert_eq!(model.model_for(ModelTier::Reasoning), "text-large-002");
    }
}
