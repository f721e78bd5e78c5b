//! Factory for creating LLM providers from configuration

use crate::config::{LLMBackend, LLMProviderConfig};
use crate::error::Result;
use crate::llm::{LLMProvider, StubLLMProvider};
use std::sync::Arc;

#[cfg(feature = "llm-ollama")]
use crate::llm::providers::ollama::OllamaProvider;

/// Factory for creating LLM providers
pub struct LLMProviderFactory;

impl LLMProviderFactory {
    /// Create an LLM provider from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is not compiled in.
    pub fn create(config: &LLMProviderConfig) -> Result<Arc<dyn LLMProvider>> {
        match config.provider {
            #[cfg(feature = "llm-ollama")]
            LLMBackend::Ollama => {
                let model = if !config.model.is_empty() {
                    Some(config.model.clone())
                } else {
                    None
                };

                let provider = if let Some(url) = config.base_url.clone() {
                    OllamaProvider::new(
                        model.unwrap_or_else(|| "qwen3:14b".to_string()),
                        Some(url),
                    )
                } else {
                    OllamaProvider::from_env(model)
                };

                Ok(Arc::new(provider))
            }

            #[cfg(not(feature = "llm-ollama"))]
            LLMBackend::Ollama => Err(crate::error::RecollectError::Configuration(
                "Ollama provider requires 'llm-ollama' feature".to_string(),
            )),

            LLMBackend::Stub => Ok(Arc::new(StubLLMProvider)),
        }
    }

    /// Create from an optional config, using the stub provider when absent
    pub fn from_config(config: Option<&LLMProviderConfig>) -> Result<Arc<dyn LLMProvider>> {
        match config {
            Some(cfg) => Self::create(cfg),
            None => Ok(Arc::new(StubLLMProvider)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_yields_stub() {
        let provider = LLMProviderFactory::from_config(None).unwrap();
        assert_eq!(provider.model_info().provider, "stub");
    }

    #[cfg(feature = "llm-ollama")]
    #[test]
    fn test_ollama_from_config() {
        let config = LLMProviderConfig {
            provider: LLMBackend::Ollama,
            model: "llama3.2".to_string(),
            base_url: Some("http://127.0.0.1:11434".to_string()),
        };

        let provider = LLMProviderFactory::create(&config).unwrap();
        let info = provider.model_info();
        assert_eq!(info.provider, "ollama");
        assert_eq!(info.model_name, "llama3.2");
    }
}
