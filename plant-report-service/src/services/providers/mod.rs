//! Model providers.
//!
//! Handlers only see [`TextProvider`]; Gemini is the one implementation and
//! tests point it at a mock server.

pub mod gemini;

pub use gemini::{GeminiConfig, GeminiTextProvider};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Content filtered")]
    ContentFiltered,

    #[error("Empty response from model")]
    EmptyResponse,

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Token accounting reported by the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input: u64,
    pub output: u64,
}

/// Why the model stopped producing text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Finished,
    /// Output limit hit; the text is truncated but still usable.
    MaxTokens,
}

/// A completed generation.
#[derive(Debug)]
pub struct Generation {
    pub text: String,
    pub usage: TokenUsage,
    pub stop_reason: StopReason,
}

/// An image attached to the prompt.
#[derive(Debug, Clone)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Send `prompt` with `images` as a single user turn.
    async fn generate(
        &self,
        prompt: &str,
        images: &[InlineImage],
    ) -> Result<Generation, ProviderError>;

    /// Cheap call proving the provider is reachable with our credentials.
    async fn health_check(&self) -> Result<(), ProviderError>;
}
