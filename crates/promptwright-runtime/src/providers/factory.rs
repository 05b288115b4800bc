//! Adapter factories for building adapters from configuration.
//!
//! Adapter types register a factory under a type name; `RuntimeConfig`
//! provider entries name that type and carry an opaque JSON config.
//!
//! ## Usage
//!
//! ```ignore
//! let mut factories = AdapterFactoryRegistry::new();
//! factories.register(Arc::new(AnthropicAdapterFactory));
//!
//! let adapter = factories.create("anthropic", "anthropic-eu", &config)?;
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use super::ProviderAdapter;
use crate::config::ConfigError;

/// Factory for creating adapters from configuration.
pub trait AdapterFactory: Send + Sync {
    /// Unique type name, e.g. "anthropic" or "openai".
    fn provider_type(&self) -> &'static str;

    /// Create an adapter registered under `provider_id`.
    fn create(
        &self,
        provider_id: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn ProviderAdapter>, ConfigError>;

    /// Validate configuration without creating an adapter.
    fn validate_config(&self, config: &JsonValue) -> Result<(), ConfigError>;

    /// Defaults for optional fields.
    fn default_config(&self) -> JsonValue {
        serde_json::json!({})
    }

    fn description(&self) -> &'static str {
        "Model provider adapter"
    }
}

/// Registry of adapter factories keyed by type name.
#[derive(Default)]
pub struct AdapterFactoryRegistry {
    factories: BTreeMap<String, Arc<dyn AdapterFactory>>,
}

impl AdapterFactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any factory with the same type name.
    pub fn register(&mut self, factory: Arc<dyn AdapterFactory>) {
        self.factories
            .insert(factory.provider_type().to_string(), factory);
    }

    /// Create an adapter of `provider_type` registered under `provider_id`.
    pub fn create(
        &self,
        provider_type: &str,
        provider_id: &str,
        config: &JsonValue,
    ) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
        self.factory(provider_type)?.create(provider_id, config)
    }

    /// Validate configuration for a provider type.
    pub fn validate(&self, provider_type: &str, config: &JsonValue) -> Result<(), ConfigError> {
        self.factory(provider_type)?.validate_config(config)
    }

    /// List available provider types.
    pub fn available_types(&self) -> Vec<&str> {
        self.factories.keys().map(|s| s.as_str()).collect()
    }

    pub fn has_type(&self, provider_type: &str) -> bool {
        self.factories.contains_key(provider_type)
    }

    pub fn default_config(&self, provider_type: &str) -> Option<JsonValue> {
        self.factories
            .get(provider_type)
            .map(|f| f.default_config())
    }

    /// A registry with every adapter compiled into this build.
    #[allow(unused_mut)]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        #[cfg(feature = "anthropic")]
        registry.register(Arc::new(super::AnthropicAdapterFactory));
        #[cfg(feature = "openai")]
        registry.register(Arc::new(super::OpenAiAdapterFactory));
        registry
    }

    fn factory(&self, provider_type: &str) -> Result<&Arc<dyn AdapterFactory>, ConfigError> {
        self.factories.get(provider_type).ok_or_else(|| {
            ConfigError::UnknownProviderType {
                provider_type: provider_type.to_string(),
                available: self
                    .available_types()
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
            }
        })
    }
}

impl std::fmt::Debug for AdapterFactoryRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterFactoryRegistry")
            .field("types", &self.available_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::InvocationRequest;
    use crate::providers::{Completion, ProviderError, TokenUsage};
    use async_trait::async_trait;

    struct MockAdapter {
        id: String,
    }

    #[async_trait]
    impl ProviderAdapter for MockAdapter {
        fn provider_id(&self) -> &str {
            &self.id
        }

        async fn invoke(
            &self,
            model: &str,
            _request: &InvocationRequest,
        ) -> Result<Completion, ProviderError> {
            Ok(Completion {
                text: "mock response".to_string(),
                model: model.to_string(),
                usage: TokenUsage::default(),
                stop_reason: None,
            })
        }
    }

    struct MockAdapterFactory;

    impl AdapterFactory for MockAdapterFactory {
        fn provider_type(&self) -> &'static str {
            "mock"
        }

        fn create(
            &self,
            provider_id: &str,
            config: &JsonValue,
        ) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
            self.validate_config(config)?;
            Ok(Arc::new(MockAdapter {
                id: provider_id.to_string(),
            }))
        }

        fn validate_config(&self, config: &JsonValue) -> Result<(), ConfigError> {
            if config["broken"].as_bool() == Some(true) {
                return Err(ConfigError::Invalid("broken mock".to_string()));
            }
            Ok(())
        }
    }

    #[test]
    fn test_registry_register_and_create() {
        let mut registry = AdapterFactoryRegistry::new();
        registry.register(Arc::new(MockAdapterFactory));

        assert!(registry.has_type("mock"));
        assert!(!registry.has_type("unknown"));

        let adapter = registry
            .create("mock", "mock-eu", &serde_json::json!({}))
            .unwrap();
        assert_eq!(adapter.provider_id(), "mock-eu");
    }

    #[test]
    fn test_registry_unknown_type_lists_available() {
        let mut registry = AdapterFactoryRegistry::new();
        registry.register(Arc::new(MockAdapterFactory));

        match registry.create("unknown", "x", &serde_json::json!({})) {
            Err(ConfigError::UnknownProviderType {
                provider_type,
                available,
            }) => {
                assert_eq!(provider_type, "unknown");
                assert_eq!(available, vec!["mock".to_string()]);
            }
            other => panic!("Expected UnknownProviderType, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_registry_validate() {
        let mut registry = AdapterFactoryRegistry::new();
        registry.register(Arc::new(MockAdapterFactory));

        assert!(registry.validate("mock", &serde_json::json!({})).is_ok());
        assert!(registry
            .validate("mock", &serde_json::json!({"broken": true}))
            .is_err());
        assert!(registry.validate("unknown", &serde_json::json!({})).is_err());
    }

    #[test]
    fn test_default_config_lookup() {
        let mut registry = AdapterFactoryRegistry::new();
        registry.register(Arc::new(MockAdapterFactory));

        assert_eq!(registry.default_config("mock"), Some(serde_json::json!({})));
        assert_eq!(registry.default_config("unknown"), None);
    }
}
