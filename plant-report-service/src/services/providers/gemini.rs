//! Gemini REST client for multimodal `generateContent` calls.

use super::{Generation, InlineImage, ProviderError, StopReason, TextProvider, TokenUsage};
use crate::services::data_uri::encode_base64;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Header carrying the API key, which keeps it out of logged URLs.
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Finish reasons Gemini uses when it withheld the answer.
const FILTERED_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Secret<String>,
    pub model: String,
    pub api_base_url: String,
    pub timeout: Duration,
}

pub struct GeminiTextProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiTextProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProviderError::NotConfigured(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn base_url(&self) -> &str {
        self.config.api_base_url.trim_end_matches('/')
    }

    /// `{base}/models/{model}:{method}`
    fn model_url(&self, method: &str) -> String {
        format!("{}/models/{}:{}", self.base_url(), self.config.model, method)
    }

    fn build_request(prompt: &str, images: &[InlineImage]) -> GenerateContentRequest {
        let text = Part::Text {
            text: prompt.to_string(),
        };
        let inline = images.iter().map(|image| Part::InlineData {
            inline_data: Blob {
                mime_type: image.mime_type.clone(),
                data: encode_base64(&image.data),
            },
        });

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: std::iter::once(text).chain(inline).collect(),
            }],
        }
    }
}

#[async_trait]
impl TextProvider for GeminiTextProvider {
    async fn generate(
        &self,
        prompt: &str,
        images: &[InlineImage],
    ) -> Result<Generation, ProviderError> {
        tracing::debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            image_count = images.len(),
            image_bytes = images.iter().map(|i| i.data.len()).sum::<usize>(),
            "Calling generateContent"
        );

        let response = self
            .client
            .post(self.model_url("generateContent"))
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .json(&Self::build_request(prompt, images))
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::ApiError(format!(
                "generateContent returned {}: {}",
                status, body
            )));
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| ProviderError::ApiError(format!("Unreadable response body: {}", e)))?
            .into_generation()
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        if self.config.api_key.expose_secret().is_empty() {
            return Err(ProviderError::NotConfigured(
                "Gemini API key not configured".to_string(),
            ));
        }

        // Listing models needs a valid key but no quota
        let response = self
            .client
            .get(format!("{}/models", self.base_url()))
            .header(API_KEY_HEADER, self.config.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            status => Err(ProviderError::ApiError(format!(
                "Listing models returned {}",
                status
            ))),
        }
    }
}

// Wire types. Only the fields this service reads or writes are modelled.

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: Blob,
    },
    /// Function calls, thoughts and anything else.
    Other(serde_json::Value),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: UsageMetadata,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    fn into_generation(self) -> Result<Generation, ProviderError> {
        if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
            tracing::warn!(block_reason = %reason, "Prompt blocked by model");
            return Err(ProviderError::ContentFiltered);
        }

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or(ProviderError::EmptyResponse)?;

        let stop_reason = match candidate.finish_reason.as_deref() {
            Some(reason) if FILTERED_FINISH_REASONS.contains(&reason) => {
                return Err(ProviderError::ContentFiltered);
            }
            Some("MAX_TOKENS") => StopReason::MaxTokens,
            _ => StopReason::Finished,
        };

        // Long answers may be split over several text parts
        let text: String = candidate
            .content
            .into_iter()
            .flat_map(|content| content.parts)
            .filter_map(|part| match part {
                Part::Text { text } => Some(text),
                _ => None,
            })
            .collect();

        if text.is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(Generation {
            text,
            usage: TokenUsage {
                input: self.usage_metadata.prompt_token_count,
                output: self.usage_metadata.candidates_token_count,
            },
            stop_reason,
        })
    }
}
