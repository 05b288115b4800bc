//! Caching layer for promptwright-runtime.
//!
//! Keeps successful results of deterministic (`temperature == 0`),
//! non-streaming requests so that repeated identical calls do not reach a
//! backend again. Failures are never stored.

use std::time::Duration;

use moka::future::Cache;
use serde::{Deserialize, Serialize};

use crate::config::duration_str;
use crate::invocation::{InvocationRequest, InvocationResult};

/// Cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: u64,
    #[serde(with = "duration_str")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: 1_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Response cache using moka.
#[derive(Clone)]
pub struct ResponseCache {
    cache: Cache<u64, InvocationResult>,
}

impl ResponseCache {
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, config.ttl)
    }

    /// Whether results for `request` may be cached.
    pub fn is_cacheable(request: &InvocationRequest) -> bool {
        !request.is_streaming() && request.temperature() == 0.0
    }

    pub async fn get(&self, request: &InvocationRequest) -> Option<InvocationResult> {
        self.cache.get(&request.cache_key()).await
    }

    pub async fn insert(&self, request: &InvocationRequest, result: InvocationResult) {
        self.cache.insert(request.cache_key(), result).await;
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::from_config(&CacheConfig::default())
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.cache.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, TokenUsage};

    fn result(text: &str) -> InvocationResult {
        InvocationResult {
            text: text.to_string(),
            model_used: "m".to_string(),
            provider_used: "p".to_string(),
            tokens_used: TokenUsage::new(1, 1),
            cost_estimate: 0.0,
            latency_ms: 5,
            attempts: Vec::new(),
        }
    }

    #[test]
    fn test_only_deterministic_non_streaming_requests_are_cacheable() {
        let base = InvocationRequest::new(vec![ChatMessage::user("hi")]);
        assert!(!ResponseCache::is_cacheable(&base));
        assert!(ResponseCache::is_cacheable(&base.clone().with_temperature(0.0)));
        assert!(!ResponseCache::is_cacheable(
            &base.with_temperature(0.0).with_streaming(true)
        ));
    }

    #[tokio::test]
    async fn test_cache_operations() {
        let cache = ResponseCache::default();
        let request = InvocationRequest::new(vec![ChatMessage::user("hi")]).with_temperature(0.0);
        let other = InvocationRequest::new(vec![ChatMessage::user("bye")]).with_temperature(0.0);

        assert!(cache.get(&request).await.is_none());

        cache.insert(&request, result("hello")).await;

        assert_eq!(cache.get(&request).await.map(|r| r.text), Some("hello".to_string()));
        assert!(cache.get(&other).await.is_none());

        cache.invalidate_all();
        assert!(cache.get(&request).await.is_none());
    }
}
