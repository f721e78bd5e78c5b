//! Ollama LLM provider implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RecollectError, Result};
use crate::llm::retry::{with_retry_when, RetryConfig};
use crate::llm::{LLMConfig, LLMProvider, ModelInfo};

/// Ollama LLM provider (local, free, runs on your machine).
pub struct OllamaProvider {
    client: reqwest::Client,
    model: String,
    base_url: String,
    retry: RetryConfig,
}

impl OllamaProvider {
    /// Create a new Ollama provider.
    ///
    /// # Arguments
    ///
    /// * `model` - Model name (e.g., "qwen3:14b")
    /// * `base_url` - Base URL for Ollama API (defaults to "http://localhost:11434")
    pub fn new(model: impl Into<String>, base_url: Option<impl Into<String>>) -> Self {
        Self {
            client: reqwest::Client::new(),
            model: model.into(),
            base_url: base_url
                .map(|u| u.into())
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            retry: RetryConfig::default(),
        }
    }

    /// Create from environment variables.
    ///
    /// Reads `OLLAMA_MODEL` (defaults to "qwen3:14b", overridden by `model`)
    /// and `OLLAMA_BASE_URL` (defaults to "http://localhost:11434").
    pub fn from_env(model: Option<impl Into<String>>) -> Self {
        let model = model
            .map(|m| m.into())
            .or_else(|| std::env::var("OLLAMA_MODEL").ok())
            .unwrap_or_else(|| "qwen3:14b".to_string());

        let base_url = std::env::var("OLLAMA_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:11434".to_string());

        Self::new(model, Some(base_url))
    }

    /// Replace the retry policy for transient HTTP failures.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Get the model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send_once(&self, request: &OllamaRequest) -> std::result::Result<String, OllamaCallError> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| OllamaCallError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(OllamaCallError::Status(status.as_u16(), text));
        }

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| OllamaCallError::Decode(e.to_string()))?;

        let mut content = body.response.trim().to_string();
        if content.is_empty() {
            if let Some(thinking) = body.thinking {
                content = thinking.trim().to_string();
            }
        }

        Ok(content)
    }
}

#[derive(Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    thinking: Option<String>,
}

#[derive(Debug)]
enum OllamaCallError {
    Transport(String),
    Status(u16, String),
    Decode(String),
}

impl std::fmt::Display for OllamaCallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(
                f,
                "Failed to send request to Ollama: {}. Make sure Ollama is running.",
                e
            ),
            Self::Status(status, text) => write!(f, "Ollama API error ({}): {}", status, text),
            Self::Decode(e) => write!(f, "Failed to parse Ollama response: {}", e),
        }
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn generate(&self, prompt: &str, config: &LLMConfig) -> Result<String> {
        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            system: config.system_prompt.clone(),
            stream: false,
            options: OllamaOptions {
                temperature: config.temperature,
                num_predict: config.max_tokens,
            },
        };

        let retry = &self.retry;
        with_retry_when(
            retry,
            || self.send_once(&request),
            |err| match err {
                OllamaCallError::Transport(_) => true,
                OllamaCallError::Status(status, _) => retry.is_retryable_status(*status),
                OllamaCallError::Decode(_) => false,
            },
        )
        .await
        .map_err(|e| RecollectError::Generation(e.to_string()))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "ollama".to_string(),
            model_name: self.model.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_provider_creation() {
        let provider = OllamaProvider::new("qwen3:14b", None::<String>);
        assert_eq!(provider.model(), "qwen3:14b");
        assert_eq!(provider.base_url, "http://localhost:11434");
    }

    #[test]
    fn test_explicit_model_wins_over_env() {
        let provider = OllamaProvider::from_env(Some("llama3.2"));
        assert_eq!(provider.model(), "llama3.2");
    }

    #[test]
    fn test_request_serialization() {
        let request = OllamaRequest {
            model: "m".to_string(),
            prompt: "p".to_string(),
            system: None,
            stream: false,
            options: OllamaOptions {
                temperature: 0.3,
                num_predict: 100,
            },
        };

        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
        assert_eq!(json["options"]["num_predict"], 100);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_generation_error() {
        let provider = OllamaProvider::new("m", Some("http://127.0.0.1:9"))
            .with_retry(RetryConfig::no_retry());

        let result = provider.generate("hello", &LLMConfig::default()).await;
        assert!(matches!(result, Err(RecollectError::Generation(_))));
    }
}
