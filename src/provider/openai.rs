// src/provider/openai.rs — OpenAI Chat + Embeddings API provider

use async_trait::async_trait;
use serde::Deserialize;

use super::{ChatRequest, ChatResponse, ModelProvider, TokenUsage};
use crate::infra::config::DEFAULT_OPENAI_BASE_URL;
use crate::infra::errors::ProbeError;

/// Used when a 429 carries no usable Retry-After header.
const DEFAULT_RATE_LIMIT_DELAY_MS: u64 = 5_000;

pub struct OpenAIProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

impl OpenAIProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, DEFAULT_OPENAI_BASE_URL.into())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ProbeError> {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| ProbeError::Provider {
                provider: "openai".into(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(|secs| secs * 1_000)
                .unwrap_or(DEFAULT_RATE_LIMIT_DELAY_MS);
            return Err(ProbeError::RateLimited {
                provider: "openai".into(),
                retry_after_ms,
            });
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ProbeError::Provider {
                provider: "openai".into(),
                message: format!("HTTP {}: {}", status, error_body),
                retriable: status.is_server_error(),
            });
        }

        Ok(response)
    }

    fn chat_body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": [{ "role": "user", "content": request.prompt }],
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        body
    }
}

#[derive(Deserialize)]
struct CompletionBody {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct EmbeddingBody {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

fn parse_error(what: &str, e: impl std::fmt::Display) -> ProbeError {
    ProbeError::Provider {
        provider: "openai".into(),
        message: format!("Failed to parse {what} response: {e}"),
        retriable: false,
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    fn id(&self) -> &str {
        "openai"
    }

    fn name(&self) -> &str {
        "OpenAI"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProbeError> {
        let body = self.chat_body(&request);
        let resp: CompletionBody = self
            .post("chat/completions", &body)
            .await?
            .json()
            .await
            .map_err(|e| parse_error("chat", e))?;

        let content = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| parse_error("chat", "no choices in completion"))?;

        let usage = resp
            .usage
            .map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        Ok(ChatResponse { content, usage })
    }

    async fn embed(&self, texts: &[&str], model: &str) -> Result<Vec<Vec<f32>>, ProbeError> {
        let body = serde_json::json!({
            "model": model,
            "input": texts,
        });

        let mut resp: EmbeddingBody = self
            .post("embeddings", &body)
            .await?
            .json()
            .await
            .map_err(|e| parse_error("embedding", e))?;

        if resp.data.len() != texts.len() {
            return Err(parse_error(
                "embedding",
                format!("expected {} vectors, got {}", texts.len(), resp.data.len()),
            ));
        }
        resp.data.sort_by_key(|d| d.index);
        Ok(resp.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chat_parses_content_and_usage() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer sk-test")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"choices":[{"message":{"role":"assistant","content":"Bonjour"}}],
                    "usage":{"prompt_tokens":7,"completion_tokens":2}}"#,
            )
            .create_async()
            .await;

        let provider = OpenAIProvider::with_base_url("sk-test".into(), server.url());
        let resp = provider
            .chat(ChatRequest::single("gpt-3.5-turbo", "hello"))
            .await
            .unwrap();
        assert_eq!(resp.content, "Bonjour");
        assert_eq!(resp.usage.total(), 9);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_chat_sends_prompt_and_sampling() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "m",
                "messages": [{ "role": "user", "content": "hello" }],
                "temperature": 0.5,
                "max_tokens": 32,
            })))
            .with_status(200)
            .with_body(r#"{"choices":[{"message":{"content":"hi"}}]}"#)
            .create_async()
            .await;

        let provider = OpenAIProvider::with_base_url("k".into(), server.url());
        let request = ChatRequest::single("m", "hello").with_sampling(Some(0.5), Some(32));
        assert_eq!(provider.chat(request).await.unwrap().content, "hi");
        mock.assert_async().await;
    }

    #[test]
    fn test_chat_without_sampling_omits_fields() {
        let provider = OpenAIProvider::with_base_url("k".into(), "http://unused".into());
        let body = provider.chat_body(&ChatRequest::single("m", "x"));
        assert!(body.get("temperature").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[tokio::test]
    async fn test_chat_maps_429_to_rate_limited() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_header("retry-after", "2")
            .create_async()
            .await;

        let provider = OpenAIProvider::with_base_url("k".into(), server.url());
        let err = provider
            .chat(ChatRequest::single("m", "x"))
            .await
            .unwrap_err();
        match err {
            ProbeError::RateLimited { retry_after_ms, .. } => assert_eq!(retry_after_ms, 2_000),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_chat_server_error_is_retriable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let provider = OpenAIProvider::with_base_url("k".into(), server.url());
        let err = provider
            .chat(ChatRequest::single("m", "x"))
            .await
            .unwrap_err();
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn test_chat_client_error_not_retriable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body("bad key")
            .create_async()
            .await;

        let provider = OpenAIProvider::with_base_url("k".into(), server.url());
        let err = provider
            .chat(ChatRequest::single("m", "x"))
            .await
            .unwrap_err();
        assert!(!err.is_retriable());
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_embed_orders_by_index() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_body(
                r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#,
            )
            .create_async()
            .await;

        let provider = OpenAIProvider::with_base_url("k".into(), server.url());
        let vectors = provider
            .embed(&["a", "b"], "text-embedding-ada-002")
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_embed_count_mismatch() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/embeddings")
            .with_status(200)
            .with_body(r#"{"data":[{"index":0,"embedding":[1.0]}]}"#)
            .create_async()
            .await;

        let provider = OpenAIProvider::with_base_url("k".into(), server.url());
        assert!(provider.embed(&["a", "b"], "m").await.is_err());
    }
}
