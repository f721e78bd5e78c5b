//! Configuration types for Recollect

use serde::{Deserialize, Serialize};

use crate::consolidation::ConsolidationConfig;
use crate::error::{RecollectError, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RecollectConfig {
    /// Consolidation engine configuration
    #[serde(default)]
    pub consolidation: ConsolidationConfig,

    /// LLM provider configuration (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm: Option<LLMProviderConfig>,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMProviderConfig {
    /// Provider type
    pub provider: LLMBackend,

    /// Model name (empty means the provider's default)
    #[serde(default)]
    pub model: String,

    /// Base URL (for custom endpoints)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// LLM provider type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMBackend {
    Ollama,
    /// No generation; merges fall back to KEEP_NEWEST
    Stub,
}

impl RecollectConfig {
    /// Load configuration from file and environment variables.
    ///
    /// Loads in this order:
    /// 1. Default configuration
    /// 2. `recollect.toml` in the working directory
    /// 3. The file named by `RECOLLECT_CONFIG_PATH`, if set
    /// 4. `RECOLLECT_` environment variables (`__` separates nesting levels,
    ///    e.g. `RECOLLECT_CONSOLIDATION__DRY_RUN=true`)
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration source is invalid.
    pub fn load() -> Result<Self> {
        use figment::{
            Figment,
            providers::{Env, Format, Serialized, Toml},
        };

        let mut figment = Figment::from(Serialized::defaults(RecollectConfig::default()))
            .merge(Toml::file("recollect.toml"));

        if let Ok(path) = std::env::var("RECOLLECT_CONFIG_PATH") {
            figment = figment.merge(Toml::file(path));
        }

        let config: RecollectConfig = figment
            .merge(Env::prefixed("RECOLLECT_").ignore(&["config_path"]).split("__"))
            .extract()
            .map_err(|e| RecollectError::Configuration(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        use figment::{
            Figment,
            providers::{Format, Serialized, Toml},
        };

        let config: RecollectConfig = Figment::from(Serialized::defaults(RecollectConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| {
                RecollectError::Configuration(format!("Failed to load configuration file: {}", e))
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the consolidation section is invalid.
    pub fn validate(&self) -> Result<()> {
        self.consolidation.validate()
    }
}
