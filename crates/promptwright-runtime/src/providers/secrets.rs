//! Credential handling for provider adapters.
//!
//! API keys are wrapped in [`ApiCredential`] as soon as they are read, so
//! they never show up in `Debug`/`Display` output or log lines, and are
//! zeroed on drop by `secrecy`.
//!
//! ## Usage
//!
//! ```ignore
//! // Load from config with env fallback
//! let cred = ApiCredential::from_config_or_env(&config, "api_key", "ANTHROPIC_API_KEY", "Anthropic API key")?;
//!
//! // Use in HTTP header (explicit exposure)
//! request.header("x-api-key", cred.expose());
//! ```

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;

use crate::config::ConfigError;

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from the provider's JSON/YAML config
    Config,
    /// Loaded from an environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
///
/// `Debug` and `Display` print `[REDACTED]`; the value is only reachable
/// through [`expose`](Self::expose).
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    /// Wrap a raw value.
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load credential from an environment variable.
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ConfigError> {
        match std::env::var(env_var) {
            Ok(value) if !value.trim().is_empty() => {
                Ok(Self::new(value, CredentialSource::Environment, name))
            }
            _ => Err(ConfigError::MissingCredential(format!(
                "{name} not set: configure '{env_var}' environment variable"
            ))),
        }
    }

    /// Load credential from JSON config, falling back to an environment
    /// variable.
    ///
    /// 1. `config[config_key]` if it is a non-empty string
    /// 2. otherwise `env_var`
    /// 3. otherwise [`ConfigError::MissingCredential`]
    pub fn from_config_or_env(
        config: &JsonValue,
        config_key: &str,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = config[config_key].as_str().filter(|v| !v.trim().is_empty()) {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }

        Self::from_env(env_var, name).map_err(|_| {
            ConfigError::MissingCredential(format!(
                "{name} required: set '{config_key}' in config or {env_var} environment variable"
            ))
        })
    }

    /// Check if a credential is available without loading it.
    pub fn is_available(config: &JsonValue, config_key: &str, env_var: &str) -> bool {
        config[config_key]
            .as_str()
            .is_some_and(|v| !v.trim().is_empty())
            || std::env::var(env_var).is_ok_and(|v| !v.trim().is_empty())
    }

    /// Expose the value at the point of use (e.g. an HTTP header).
    /// Never store the result.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_redacted_in_debug() {
        let secret = "sk-super-secret-key-12345";
        let cred = ApiCredential::new(secret, CredentialSource::Programmatic, "Test API key");

        let debug = format!("{:?}", cred);
        assert!(!debug.contains(secret), "Secret exposed in Debug!");
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_credential_redacted_in_display() {
        let secret = "sk-super-secret-key-12345";
        let cred = ApiCredential::new(secret, CredentialSource::Config, "Test API key");

        let display = format!("{}", cred);
        assert!(!display.contains(secret), "Secret exposed in Display!");
        assert!(display.contains("Test API key"));
        assert!(display.contains("config"));
    }

    #[test]
    fn test_credential_expose() {
        let cred = ApiCredential::new("sk-abc", CredentialSource::Programmatic, "Test API key");
        assert_eq!(cred.expose(), "sk-abc");
        assert!(!cred.is_empty());
    }

    #[test]
    fn test_from_config_or_env_prefers_config() {
        let config = serde_json::json!({ "api_key": "config-key" });

        std::env::set_var("PROMPTWRIGHT_TEST_KEY_PRIORITY", "env-key");
        let cred = ApiCredential::from_config_or_env(
            &config,
            "api_key",
            "PROMPTWRIGHT_TEST_KEY_PRIORITY",
            "Test key",
        )
        .unwrap();

        assert_eq!(cred.expose(), "config-key");
        assert_eq!(cred.source(), CredentialSource::Config);

        std::env::remove_var("PROMPTWRIGHT_TEST_KEY_PRIORITY");
    }

    #[test]
    fn test_from_config_or_env_falls_back_to_env() {
        let config = serde_json::json!({ "api_key": "  " });

        std::env::set_var("PROMPTWRIGHT_TEST_KEY_FALLBACK", "env-key");
        let cred = ApiCredential::from_config_or_env(
            &config,
            "api_key",
            "PROMPTWRIGHT_TEST_KEY_FALLBACK",
            "Test key",
        )
        .unwrap();

        assert_eq!(cred.expose(), "env-key");
        assert_eq!(cred.source(), CredentialSource::Environment);

        std::env::remove_var("PROMPTWRIGHT_TEST_KEY_FALLBACK");
    }

    #[test]
    fn test_missing_credential_names_both_sources() {
        let err = ApiCredential::from_config_or_env(
            &serde_json::json!({}),
            "api_key",
            "PROMPTWRIGHT_NONEXISTENT_VAR",
            "Test key",
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::MissingCredential(_)));
        let message = err.to_string();
        assert!(message.contains("api_key"));
        assert!(message.contains("PROMPTWRIGHT_NONEXISTENT_VAR"));
    }

    #[test]
    fn test_is_available() {
        let config = serde_json::json!({ "api_key": "value" });
        assert!(ApiCredential::is_available(&config, "api_key", "PROMPTWRIGHT_NONEXISTENT"));
        assert!(!ApiCredential::is_available(
            &serde_json::json!({}),
            "api_key",
            "PROMPTWRIGHT_NONEXISTENT"
        ));
    }
}
