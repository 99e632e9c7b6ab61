// src/provider/mod.rs — Model provider layer
//
// The core never talks HTTP to a model directly. Everything goes through
// `ModelProvider`, so tests can swap in an in-process provider.

pub mod openai;
pub mod retry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::infra::errors::ProbeError;

/// Core trait that all model providers implement.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProbeError>;

    /// One vector per input text, in input order.
    async fn embed(&self, texts: &[&str], model: &str) -> Result<Vec<Vec<f32>>, ProbeError>;
}

/// One completion request. Every call the crate makes is a single user
/// message, so the request carries the prompt text directly.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl ChatRequest {
    pub fn single(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Apply the `[provider]` sampling settings; unset values stay with the
    /// provider's defaults.
    pub fn with_sampling(mut self, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Send `prompt` as a single user message and return the reply text.
pub async fn complete(
    provider: &dyn ModelProvider,
    model: &str,
    prompt: &str,
) -> Result<String, ProbeError> {
    send(provider, ChatRequest::single(model, prompt)).await
}

/// Send a prepared request and return the reply text.
pub async fn send(provider: &dyn ModelProvider, request: ChatRequest) -> Result<String, ProbeError> {
    let model = request.model.clone();
    let response = provider.chat(request).await?;
    tracing::debug!(
        provider = provider.id(),
        model = %model,
        tokens = response.usage.total(),
        "Completion received"
    );
    Ok(response.content)
}
