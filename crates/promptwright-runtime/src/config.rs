//! Runtime configuration.
//!
//! Loaded from YAML. Durations are written as humantime strings
//! (`500ms`, `2m`, `1h 30m`).
//!
//! ```yaml
//! default_provider: anthropic
//! fallback_order: [anthropic, openai]
//! retry:
//!   max_retries: 3
//!   base_delay: 500ms
//! providers:
//!   - id: anthropic
//!     type: anthropic
//!   - id: openai
//!     type: openai
//!     config:
//!       base_url: https://api.openai.com/v1
//! enhancement:
//!   max_iterations: 5
//!   session_timeout: 2m
//! cache:
//!   enabled: true
//!   ttl: 1h
//! ```

use std::path::Path;

use promptwright_core::{ModelDescriptor, RegistryError};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::cache::CacheConfig;
use crate::enhancement::LoopConfig;
use crate::resilience::RetryPolicy;

/// Errors from loading or applying configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Unknown provider type: '{provider_type}'. Available: {available:?}")]
    UnknownProviderType {
        provider_type: String,
        available: Vec<String>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// One configured provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Identifier used by model descriptors and `fallback_order`
    pub id: String,

    /// Adapter factory type name; defaults to `id`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub provider_type: Option<String>,

    /// Adapter-specific settings
    #[serde(default)]
    pub config: JsonValue,
}

impl ProviderConfig {
    pub fn provider_type(&self) -> &str {
        self.provider_type.as_deref().unwrap_or(&self.id)
    }
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Provider used for explicit model ids missing from the registry
    pub default_provider: String,

    #[serde(default)]
    pub fallback_order: Vec<String>,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    /// Descriptors registered on top of the built-in catalog
    #[serde(default)]
    pub models: Vec<ModelDescriptor>,

    /// Start from the built-in model catalog
    #[serde(default = "default_true")]
    pub builtin_models: bool,

    #[serde(default)]
    pub enhancement: LoopConfig,

    #[serde(default)]
    pub cache: CacheConfig,
}

fn default_true() -> bool {
    true
}

impl RuntimeConfig {
    /// Parse and validate YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn provider(&self, id: &str) -> Option<&ProviderConfig> {
        self.providers.iter().find(|p| p.id == id)
    }

    /// Check cross-field consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_retries must be at least 1".to_string(),
            ));
        }

        for (index, provider) in self.providers.iter().enumerate() {
            if provider.id.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "providers[{index}] has an empty id"
                )));
            }
            if self.providers[..index].iter().any(|p| p.id == provider.id) {
                return Err(ConfigError::Invalid(format!(
                    "provider '{}' is configured more than once",
                    provider.id
                )));
            }
        }

        if self.provider(&self.default_provider).is_none() {
            return Err(ConfigError::Invalid(format!(
                "default_provider '{}' is not a configured provider",
                self.default_provider
            )));
        }

        if let Some(unknown) = self
            .fallback_order
            .iter()
            .find(|id| self.provider(id).is_none())
        {
            return Err(ConfigError::Invalid(format!(
                "fallback_order entry '{unknown}' is not a configured provider"
            )));
        }

        self.enhancement.validate()
    }
}

/// Serde adapter for `Duration` as a humantime string.
pub(crate) mod duration_str {
    use std::time::Duration;

    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(D::Error::custom)
    }
}

/// Serde adapter for `Option<Duration>` as an optional humantime string.
pub(crate) mod option_duration_str {
    use std::time::Duration;

    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => {
                serializer.serialize_str(&humantime::format_duration(*duration).to_string())
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => humantime::parse_duration(&raw)
                .map(Some)
                .map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}
