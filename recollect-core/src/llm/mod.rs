use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RecollectError, Result};

/// Configuration for a single generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMConfig {
    /// Temperature for generation (0.0-2.0, default: 0.7)
    pub temperature: f32,

    /// Maximum tokens to generate (default: 500)
    pub max_tokens: usize,

    /// System prompt for context
    pub system_prompt: Option<String>,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 500,
            system_prompt: None,
        }
    }
}

impl LLMConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, tokens: usize) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Trait for text generation backends.
///
/// The consolidation engine uses this for MERGE_CONTENT and CREATE_SUMMARY
/// only. Retries, if any, are the implementor's business; the engine applies
/// its own timeout around every call.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate text for `prompt`.
    async fn generate(&self, prompt: &str, config: &LLMConfig) -> Result<String>;

    /// Get model information
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "unknown".to_string(),
            model_name: "unknown".to_string(),
        }
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub provider: String,
    pub model_name: String,
}

/// Provider used when no LLM is configured (always errors).
///
/// With this provider MERGE_CONTENT falls back to KEEP_NEWEST and
/// CREATE_SUMMARY reports a failed result.
pub struct StubLLMProvider;

#[async_trait]
impl LLMProvider for StubLLMProvider {
    async fn generate(&self, _prompt: &str, _config: &LLMConfig) -> Result<String> {
        Err(RecollectError::Generation(
            "LLM provider not configured. Implement the LLMProvider trait for your LLM".to_string(),
        ))
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "stub".to_string(),
            model_name: "none".to_string(),
        }
    }
}

pub mod factory;
pub mod providers;
pub mod retry;

pub use factory::LLMProviderFactory;
pub use retry::{with_retry_when, RetryConfig};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_config() {
        let config = LLMConfig::new()
            .with_temperature(0.3)
            .with_max_tokens(1000)
            .with_system_prompt("You merge notes");

        assert_eq!(config.temperature, 0.3);
        assert_eq!(config.max_tokens, 1000);
        assert!(config.system_prompt.is_some());
    }

    #[test]
    fn test_temperature_clamping() {
        let config = LLMConfig::new().with_temperature(5.0);
        assert_eq!(config.temperature, 2.0);

        let config = LLMConfig::new().with_temperature(-1.0);
        assert_eq!(config.temperature, 0.0);
    }

    #[tokio::test]
    async fn test_stub_provider() {
        let provider = StubLLMProvider;
        let result = provider.generate("test", &LLMConfig::default()).await;
        assert!(matches!(result, Err(RecollectError::Generation(_))));
        assert_eq!(provider.model_info().provider, "stub");
    }
}
