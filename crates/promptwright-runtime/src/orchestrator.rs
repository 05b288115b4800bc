//! Invocation orchestrator.
//!
//! Resolves a provider and model for each request, runs the per-provider
//! attempt loop (retry with backoff, rate-limit waits, per-attempt
//! timeouts) and cascades through `fallback_order` when a provider is
//! exhausted.
//!
//! # Resolution
//! - explicit model id: the registered descriptor's provider, or the default
//!   provider when the id is not registered
//! - otherwise: [`CapabilityRegistry::select`] over every registered model
//! - fallback providers: [`CapabilityRegistry::select_for_provider`]
//!
//! The orchestrator holds no per-call mutable state; it can be shared in an
//! `Arc` and invoked concurrently. The registry is the only mutable part and
//! sits behind a read/write lock.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;
use promptwright_core::{
    Capability, CapabilityRegistry, ModelDescriptor, RegistryError, SelectionError,
};
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::cache::ResponseCache;
use crate::config::{ConfigError, RuntimeConfig};
use crate::invocation::{AttemptRecord, InvocationRequest, InvocationResult};
use crate::providers::{AdapterFactoryRegistry, ErrorKind, ProviderAdapter, ProviderError};
use crate::resilience::{provider_sequence, RetryDecision, RetryPolicy};
use crate::streaming::{make_cancellable, StreamHandle};

/// Errors from the orchestrator.
#[derive(Error, Debug)]
pub enum InvocationError {
    #[error("{provider}/{model} failed with a non-retryable error: {error}")]
    Fatal {
        provider: String,
        model: String,
        error: ProviderError,
        attempts: Vec<AttemptRecord>,
    },

    #[error(transparent)]
    NoEligibleModel(#[from] SelectionError),

    #[error("All providers failed: {}", describe_failures(.failures))]
    AllProvidersFailed {
        failures: Vec<ProviderFailure>,
        attempts: Vec<AttemptRecord>,
    },

    #[error("No registered provider can serve the request: {0}")]
    NoProviders(String),
}

impl InvocationError {
    /// Attempts made before the invocation gave up.
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            InvocationError::Fatal { attempts, .. }
            | InvocationError::AllProvidersFailed { attempts, .. } => attempts,
            InvocationError::NoEligibleModel(_) | InvocationError::NoProviders(_) => &[],
        }
    }
}

/// How one provider ended up failing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderFailure {
    pub provider_id: String,
    pub model_id: String,

    /// Kind of the provider's last error
    pub error_kind: ErrorKind,

    pub message: String,
}

fn describe_failures(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}/{} ({})", f.provider_id, f.model_id, f.error_kind))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A provider/model pair chosen for one request.
struct Candidate {
    provider_id: String,
    model_id: String,
    descriptor: Option<ModelDescriptor>,
    adapter: Arc<dyn ProviderAdapter>,
}

enum ProviderOutcome<T> {
    Success(T),
    Exhausted(ProviderError),
    Fatal(ProviderError),
}

struct Execution<T> {
    value: T,
    provider_id: String,
    model_id: String,
    descriptor: Option<ModelDescriptor>,
    attempts: Vec<AttemptRecord>,
}

/// Routes invocations across provider adapters.
pub struct Orchestrator {
    adapters: BTreeMap<String, Arc<dyn ProviderAdapter>>,
    fallback_order: Vec<String>,
    default_provider_id: String,
    registry: RwLock<CapabilityRegistry>,
    retry: RetryPolicy,
    cache: Option<ResponseCache>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// Build adapters, registry and policies from configuration.
    pub fn from_config(
        config: &RuntimeConfig,
        factories: &AdapterFactoryRegistry,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let registry = if config.builtin_models {
            CapabilityRegistry::with_builtin_models()
        } else {
            CapabilityRegistry::new()
        };

        let mut builder = Self::builder()
            .registry(registry)
            .retry(config.retry.clone())
            .default_provider(config.default_provider.clone())
            .fallback_order(config.fallback_order.iter().cloned());

        for descriptor in &config.models {
            builder = builder.model(descriptor.clone());
        }

        for provider in &config.providers {
            let adapter = factories.create(provider.provider_type(), &provider.id, &provider.config)?;
            builder = builder.adapter(adapter);
        }

        if config.cache.enabled {
            builder = builder.cache(ResponseCache::from_config(&config.cache));
        }

        builder.build()
    }

    /// Invoke the best available model and return the complete response.
    pub async fn invoke(
        &self,
        request: &InvocationRequest,
    ) -> Result<InvocationResult, InvocationError> {
        let started = Instant::now();
        let cache = self
            .cache
            .as_ref()
            .filter(|_| ResponseCache::is_cacheable(request));

        if let Some(cache) = cache {
            if let Some(mut hit) = cache.get(request).await {
                // Served without contacting a provider.
                hit.attempts.clear();
                hit.latency_ms = elapsed_ms(started);
                tracing::debug!(provider = %hit.provider_used, model = %hit.model_used, "Cache hit");
                return Ok(hit);
            }
        }

        let required = request.effective_capabilities();
        let execution = self
            .execute(request, &required, |adapter, model| async move {
                adapter.invoke(&model, request).await
            })
            .await?;

        let completion = execution.value;
        let cost_estimate = execution
            .descriptor
            .as_ref()
            .map(|d| d.estimate_cost(completion.usage.total()))
            .unwrap_or(0.0);

        let result = InvocationResult {
            text: completion.text,
            model_used: execution.model_id,
            provider_used: execution.provider_id,
            tokens_used: completion.usage,
            cost_estimate,
            latency_ms: elapsed_ms(started),
            attempts: execution.attempts,
        };

        tracing::debug!(
            provider = %result.provider_used,
            model = %result.model_used,
            attempts = result.attempts.len(),
            latency_ms = result.latency_ms,
            "Invocation succeeded"
        );

        if let Some(cache) = cache {
            cache.insert(request, result.clone()).await;
        }

        Ok(result)
    }

    /// Open a streamed response.
    ///
    /// Retry and fallback apply to opening the stream only; errors after
    /// the first chunk arrive as stream items.
    pub async fn invoke_streaming(
        &self,
        request: &InvocationRequest,
    ) -> Result<StreamHandle, InvocationError> {
        let mut required = request.effective_capabilities();
        required.insert(Capability::Streaming);

        let execution = self
            .execute(request, &required, |adapter, model| async move {
                adapter.invoke_streaming(&model, request).await
            })
            .await?;

        tracing::debug!(
            provider = %execution.provider_id,
            model = %execution.model_id,
            attempts = execution.attempts.len(),
            "Stream opened"
        );

        let (stream, cancel) = make_cancellable(execution.value);
        Ok(StreamHandle {
            stream,
            cancel,
            provider_id: execution.provider_id,
            model_id: execution.model_id,
            attempts: execution.attempts,
        })
    }

    /// Register a model after construction.
    pub fn register_model(&self, descriptor: ModelDescriptor) -> Result<(), RegistryError> {
        self.registry.write().register(descriptor)
    }

    /// Snapshot of a registered model.
    pub fn model(&self, id: &str) -> Option<ModelDescriptor> {
        self.registry.read().get(id).cloned()
    }

    /// Ids of providers with a registered adapter.
    pub fn provider_ids(&self) -> Vec<&str> {
        self.adapters.keys().map(|s| s.as_str()).collect()
    }

    pub fn default_provider(&self) -> &str {
        &self.default_provider_id
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Health of every registered adapter.
    pub async fn health_check(&self) -> BTreeMap<String, bool> {
        let checks = self.adapters.iter().map(|(id, adapter)| async move {
            (id.clone(), adapter.health_check().await)
        });
        futures::future::join_all(checks).await.into_iter().collect()
    }

    /// Resolve the primary candidate and the fallback candidates after it.
    fn plan(
        &self,
        request: &InvocationRequest,
        required: &BTreeSet<Capability>,
    ) -> Result<Vec<Candidate>, InvocationError> {
        let registry = self.registry.read();

        let (primary_provider, primary_model) = match request.explicit_model_id() {
            Some(model_id) => match registry.get(model_id) {
                Some(descriptor) => (descriptor.provider_id.clone(), model_id.to_string()),
                None => (self.default_provider_id.clone(), model_id.to_string()),
            },
            None => {
                let descriptor = registry.select(required, request.max_cost(), request.priority())?;
                (descriptor.provider_id.clone(), descriptor.id.clone())
            }
        };

        let sequence = provider_sequence(&primary_provider, &self.fallback_order, |id| {
            self.adapters.contains_key(id)
        });

        let mut plan = Vec::with_capacity(sequence.len());
        for (index, provider_id) in sequence.into_iter().enumerate() {
            let Some(adapter) = self.adapters.get(&provider_id) else {
                tracing::warn!(provider = %provider_id, "No adapter registered, skipping provider");
                continue;
            };

            let model_id = if index == 0 {
                primary_model.clone()
            } else {
                match registry.select_for_provider(
                    &provider_id,
                    required,
                    request.max_cost(),
                    request.priority(),
                ) {
                    Ok(descriptor) => descriptor.id.clone(),
                    Err(error) => {
                        tracing::debug!(provider = %provider_id, error = %error, "No eligible fallback model");
                        continue;
                    }
                }
            };

            plan.push(Candidate {
                descriptor: registry.get(&model_id).cloned(),
                provider_id,
                model_id,
                adapter: Arc::clone(adapter),
            });
        }

        if plan.is_empty() {
            return Err(InvocationError::NoProviders(format!(
                "model '{primary_model}' resolves to provider '{primary_provider}', which has no adapter"
            )));
        }

        Ok(plan)
    }

    /// Run `op` against each candidate until one succeeds.
    async fn execute<T, F, Fut>(
        &self,
        request: &InvocationRequest,
        required: &BTreeSet<Capability>,
        op: F,
    ) -> Result<Execution<T>, InvocationError>
    where
        F: Fn(Arc<dyn ProviderAdapter>, String) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let plan = self.plan(request, required)?;
        let mut attempts = Vec::new();
        let mut failures = Vec::new();

        for (index, candidate) in plan.into_iter().enumerate() {
            if index > 0 {
                tracing::info!(
                    provider = %candidate.provider_id,
                    model = %candidate.model_id,
                    "Falling back to next provider"
                );
            }

            let outcome = self.run_provider(&candidate, &op, &mut attempts).await;
            match outcome {
                ProviderOutcome::Success(value) => {
                    return Ok(Execution {
                        value,
                        provider_id: candidate.provider_id,
                        model_id: candidate.model_id,
                        descriptor: candidate.descriptor,
                        attempts,
                    });
                }
                ProviderOutcome::Fatal(error) => {
                    return Err(InvocationError::Fatal {
                        provider: candidate.provider_id,
                        model: candidate.model_id,
                        error,
                        attempts,
                    });
                }
                ProviderOutcome::Exhausted(error) => failures.push(ProviderFailure {
                    provider_id: candidate.provider_id,
                    model_id: candidate.model_id,
                    error_kind: error.kind(),
                    message: error.to_string(),
                }),
            }
        }

        Err(InvocationError::AllProvidersFailed { failures, attempts })
    }

    /// The attempt loop for one provider.
    async fn run_provider<T, F, Fut>(
        &self,
        candidate: &Candidate,
        op: &F,
        attempts: &mut Vec<AttemptRecord>,
    ) -> ProviderOutcome<T>
    where
        F: Fn(Arc<dyn ProviderAdapter>, String) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut tracker = self.retry.tracker();
        let timeout = candidate.adapter.attempt_timeout();

        loop {
            let started = Instant::now();
            let call = op(Arc::clone(&candidate.adapter), candidate.model_id.clone());
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(format!(
                    "attempt exceeded {timeout:?}"
                ))),
            };

            let error = match result {
                Ok(value) => {
                    attempts.push(AttemptRecord {
                        provider_id: candidate.provider_id.clone(),
                        model_id: candidate.model_id.clone(),
                        error_kind: None,
                        duration_ms: elapsed_ms(started),
                    });
                    return ProviderOutcome::Success(value);
                }
                Err(error) => error,
            };

            attempts.push(AttemptRecord {
                provider_id: candidate.provider_id.clone(),
                model_id: candidate.model_id.clone(),
                error_kind: Some(error.kind()),
                duration_ms: elapsed_ms(started),
            });

            match tracker.on_failure(&error) {
                RetryDecision::Retry {
                    delay,
                    consumes_slot,
                } => {
                    tracing::warn!(
                        provider = %candidate.provider_id,
                        model = %candidate.model_id,
                        attempt = attempts.len(),
                        error = %error,
                        delay_ms = delay.as_millis() as u64,
                        consumes_slot,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::Exhausted => {
                    tracing::warn!(
                        provider = %candidate.provider_id,
                        model = %candidate.model_id,
                        attempt = attempts.len(),
                        error = %error,
                        "Provider exhausted"
                    );
                    return ProviderOutcome::Exhausted(error);
                }
                RetryDecision::Fatal => {
                    tracing::warn!(
                        provider = %candidate.provider_id,
                        model = %candidate.model_id,
                        attempt = attempts.len(),
                        error = %error,
                        "Non-retryable failure"
                    );
                    return ProviderOutcome::Fatal(error);
                }
            }
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("providers", &self.provider_ids())
            .field("default_provider", &self.default_provider_id)
            .field("fallback_order", &self.fallback_order)
            .field("models", &self.registry.read().len())
            .field("retry", &self.retry)
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    fallback_order: Vec<String>,
    default_provider: Option<String>,
    registry: CapabilityRegistry,
    models: Vec<ModelDescriptor>,
    retry: RetryPolicy,
    cache: Option<ResponseCache>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
            fallback_order: Vec::new(),
            default_provider: None,
            registry: CapabilityRegistry::new(),
            models: Vec::new(),
            retry: RetryPolicy::default(),
            cache: None,
        }
    }

    /// Register an adapter under its `provider_id`.
    pub fn adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn fallback_order<I, S>(mut self, order: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback_order = order.into_iter().map(Into::into).collect();
        self
    }

    /// Provider for explicit model ids missing from the registry.
    /// Defaults to the first adapter added.
    pub fn default_provider(mut self, provider_id: impl Into<String>) -> Self {
        self.default_provider = Some(provider_id.into());
        self
    }

    /// Start from an existing registry (empty by default).
    pub fn registry(mut self, registry: CapabilityRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Register one more model when building.
    pub fn model(mut self, descriptor: ModelDescriptor) -> Self {
        self.models.push(descriptor);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn build(self) -> Result<Orchestrator, ConfigError> {
        if self.retry.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_retries must be at least 1".to_string(),
            ));
        }

        let mut adapters = BTreeMap::new();
        let mut first = None;
        for adapter in self.adapters {
            let id = adapter.provider_id().to_string();
            first.get_or_insert_with(|| id.clone());
            if adapters.insert(id.clone(), adapter).is_some() {
                return Err(ConfigError::Invalid(format!(
                    "provider '{id}' registered more than once"
                )));
            }
        }

        let default_provider_id = self
            .default_provider
            .or(first)
            .ok_or_else(|| ConfigError::Invalid("no provider adapters registered".to_string()))?;

        if !adapters.contains_key(&default_provider_id) {
            return Err(ConfigError::Invalid(format!(
                "default provider '{default_provider_id}' has no registered adapter"
            )));
        }

        let mut registry = self.registry;
        for descriptor in self.models {
            registry.register(descriptor)?;
        }

        Ok(Orchestrator {
            adapters,
            fallback_order: self.fallback_order,
            default_provider_id,
            registry: RwLock::new(registry),
            retry: self.retry,
            cache: self.cache,
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::providers::{AdapterFactory, ChatMessage};
    use crate::testing::{model_for, network_error, registry_for, ScriptedAdapter};
    use futures::StreamExt;
    use promptwright_core::{Priority, SpeedClass};
    use std::time::Duration;

    fn request() -> InvocationRequest {
        InvocationRequest::new(vec![
            ChatMessage::system("You are terse."),
            ChatMessage::user("Say hi"),
        ])
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::default().with_base_delay(Duration::from_millis(100))
    }

    fn orchestrator(adapters: &[&Arc<ScriptedAdapter>], fallback: &[&str]) -> Orchestrator {
        let ids: Vec<&str> = adapters.iter().map(|a| a.provider_id()).collect();
        let mut builder = Orchestrator::builder()
            .registry(registry_for(&ids))
            .retry(fast_retry())
            .fallback_order(fallback.iter().copied());
        for adapter in adapters {
            builder = builder.adapter(Arc::clone(*adapter) as Arc<dyn ProviderAdapter>);
        }
        builder.build().unwrap()
    }

    fn providers_attempted(attempts: &[AttemptRecord]) -> Vec<&str> {
        attempts.iter().map(|a| a.provider_id.as_str()).collect()
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let a = Arc::new(ScriptedAdapter::new("a").respond("hello"));
        let orchestrator = orchestrator(&[&a], &["a"]);

        let result = orchestrator.invoke(&request()).await.unwrap();

        assert_eq!(result.text, "hello");
        assert_eq!(result.provider_used, "a");
        assert_eq!(result.model_used, "a-model");
        assert_eq!(result.tokens_used.total(), 150);
        assert!((result.cost_estimate - 150.0 * 2.0 / 1_000_000.0).abs() < 1e-12);
        assert_eq!(result.attempts.len(), 1);
        assert!(result.attempts[0].succeeded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_error_is_not_retried_or_failed_over() {
        let a = Arc::new(ScriptedAdapter::always_failing(
            "a",
            ProviderError::Authentication("bad key".into()),
        ));
        let b = Arc::new(ScriptedAdapter::new("b"));
        let orchestrator = orchestrator(&[&a, &b], &["a", "b"]);

        let error = orchestrator
            .invoke(&request().with_model("a-model"))
            .await
            .unwrap_err();

        match error {
            InvocationError::Fatal {
                provider,
                error,
                attempts,
                ..
            } => {
                assert_eq!(provider, "a");
                assert_eq!(error.kind(), ErrorKind::Authentication);
                assert_eq!(attempts.len(), 1);
            }
            other => panic!("expected Fatal, got {other:?}"),
        }
        assert_eq!(a.call_count(), 1);
        assert_eq!(b.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_request_and_missing_model_are_fatal() {
        for error in [
            ProviderError::InvalidRequest("bad".into()),
            ProviderError::ModelNotFound("a-model".into()),
        ] {
            let a = Arc::new(ScriptedAdapter::always_failing("a", error));
            let orchestrator = orchestrator(&[&a], &[]);
            let result = orchestrator.invoke(&request()).await;
            assert!(matches!(result, Err(InvocationError::Fatal { .. })));
            assert_eq!(a.call_count(), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_errors_retry_with_increasing_backoff() {
        let a = Arc::new(
            ScriptedAdapter::new("a")
                .fail(network_error())
                .fail(ProviderError::Timeout("slow".into()))
                .respond("finally"),
        );
        let orchestrator = orchestrator(&[&a], &["a"]);

        let result = orchestrator.invoke(&request()).await.unwrap();
        assert_eq!(result.text, "finally");
        assert_eq!(result.attempts.len(), 3);
        assert_eq!(result.attempts[0].error_kind, Some(ErrorKind::Network));
        assert_eq!(result.attempts[1].error_kind, Some(ErrorKind::Timeout));

        let calls = a.calls();
        let first_gap = calls[1].at - calls[0].at;
        let second_gap = calls[2].at - calls[1].at;
        assert!(first_gap >= Duration::from_millis(100));
        assert!(first_gap < Duration::from_millis(105));
        assert!(second_gap >= Duration::from_millis(200));
        assert!(second_gap < Duration::from_millis(205));
        assert!(second_gap > first_gap);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_waits_exactly_retry_after() {
        let a = Arc::new(
            ScriptedAdapter::new("a")
                .fail(ProviderError::RateLimited {
                    retry_after: Some(Duration::from_secs(2)),
                })
                .respond("after wait"),
        );
        let orchestrator = orchestrator(&[&a], &["a"]);

        let result = orchestrator.invoke(&request()).await.unwrap();
        assert_eq!(result.text, "after wait");
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(result.attempts[0].error_kind, Some(ErrorKind::RateLimited));

        let calls = a.calls();
        let gap = calls[1].at - calls[0].at;
        assert!(gap >= Duration::from_secs(2));
        assert!(gap < Duration::from_millis(2_005));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_does_not_consume_retry_slots() {
        let a = Arc::new(
            ScriptedAdapter::new("a")
                .fail(network_error())
                .fail(ProviderError::RateLimited { retry_after: None })
                .fail(network_error())
                .respond("fourth time lucky"),
        );
        let orchestrator = orchestrator(&[&a], &["a"]);

        let result = orchestrator.invoke(&request()).await.unwrap();
        assert_eq!(result.text, "fourth time lucky");
        assert_eq!(result.attempts.len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_follows_configured_order() {
        let a = Arc::new(ScriptedAdapter::always_failing("a", network_error()));
        let b = Arc::new(ScriptedAdapter::new("b").respond("from b"));
        let c = Arc::new(ScriptedAdapter::always_failing("c", network_error()));
        let orchestrator = orchestrator(&[&a, &b, &c], &["a", "c", "b"]);

        let result = orchestrator
            .invoke(&request().with_model("a-model"))
            .await
            .unwrap();

        assert_eq!(result.provider_used, "b");
        assert_eq!(result.model_used, "b-model");
        assert_eq!(
            providers_attempted(&result.attempts),
            vec!["a", "a", "a", "c", "c", "c", "b"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_only_moves_forward_in_order() {
        let a = Arc::new(ScriptedAdapter::always_failing("a", network_error()));
        let b = Arc::new(ScriptedAdapter::new("b"));
        let c = Arc::new(ScriptedAdapter::new("c").respond("from c"));
        let orchestrator = orchestrator(&[&a, &b, &c], &["b", "a", "c"]);

        let result = orchestrator
            .invoke(&request().with_model("a-model"))
            .await
            .unwrap();

        assert_eq!(result.provider_used, "c");
        assert_eq!(b.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_providers_failed_after_every_attempt() {
        let a = Arc::new(ScriptedAdapter::always_failing("a", network_error()));
        let b = Arc::new(ScriptedAdapter::always_failing("b", network_error()));
        let c = Arc::new(ScriptedAdapter::always_failing("c", network_error()));
        let orchestrator = orchestrator(&[&a, &b, &c], &["a", "b", "c"]);
        let max_retries = orchestrator.retry_policy().max_retries as usize;

        let error = orchestrator
            .invoke(&request().with_model("a-model"))
            .await
            .unwrap_err();

        assert_eq!(error.attempts().len(), 3 * max_retries);
        match error {
            InvocationError::AllProvidersFailed { failures, .. } => {
                let providers: Vec<_> = failures.iter().map(|f| f.provider_id.as_str()).collect();
                assert_eq!(providers, vec!["a", "b", "c"]);
                assert!(failures.iter().all(|f| f.error_kind == ErrorKind::Network));
            }
            other => panic!("expected AllProvidersFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_no_eligible_model_makes_no_attempts() {
        let a = Arc::new(ScriptedAdapter::new("a"));
        let orchestrator = orchestrator(&[&a], &["a"]);

        let error = orchestrator
            .invoke(&request().with_max_cost(0.5))
            .await
            .unwrap_err();

        assert!(matches!(error, InvocationError::NoEligibleModel(_)));
        assert!(error.attempts().is_empty());
        assert_eq!(a.call_count(), 0);
    }

    #[tokio::test]
    async fn test_unregistered_explicit_model_goes_to_default_provider() {
        let a = Arc::new(ScriptedAdapter::new("a"));
        let b = Arc::new(ScriptedAdapter::new("b").respond("custom"));
        let orchestrator = Orchestrator::builder()
            .registry(registry_for(&["a", "b"]))
            .adapter(Arc::clone(&a) as Arc<dyn ProviderAdapter>)
            .adapter(Arc::clone(&b) as Arc<dyn ProviderAdapter>)
            .default_provider("b")
            .build()
            .unwrap();

        let result = orchestrator
            .invoke(&request().with_model("fine-tuned-7"))
            .await
            .unwrap();

        assert_eq!(result.provider_used, "b");
        assert_eq!(result.model_used, "fine-tuned-7");
        assert_eq!(result.cost_estimate, 0.0);
        assert_eq!(b.calls()[0].model, "fine-tuned-7");
    }

    #[tokio::test(start_paused = true)]
    async fn test_fallback_skips_provider_without_eligible_model() {
        let a = Arc::new(ScriptedAdapter::always_failing("a", network_error()));
        let b = Arc::new(ScriptedAdapter::new("b"));
        let c = Arc::new(ScriptedAdapter::new("c").respond("from c"));

        let mut registry = registry_for(&["a", "c"]);
        registry
            .register(ModelDescriptor::new("b-text", "b").with_cost(0.1))
            .unwrap();

        let orchestrator = Orchestrator::builder()
            .registry(registry)
            .retry(fast_retry())
            .adapter(Arc::clone(&a) as Arc<dyn ProviderAdapter>)
            .adapter(Arc::clone(&b) as Arc<dyn ProviderAdapter>)
            .adapter(Arc::clone(&c) as Arc<dyn ProviderAdapter>)
            .fallback_order(["a", "b", "c"])
            .build()
            .unwrap();

        let result = orchestrator
            .invoke(&request().with_model("a-model").with_capability(Capability::Vision))
            .await
            .unwrap();

        assert_eq!(result.provider_used, "c");
        assert_eq!(b.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_timeout_counts_as_timeout() {
        let a = Arc::new(
            ScriptedAdapter::new("a")
                .with_latency(Duration::from_secs(5))
                .with_timeout(Duration::from_secs(1)),
        );
        let orchestrator = Orchestrator::builder()
            .registry(registry_for(&["a"]))
            .retry(fast_retry().with_max_retries(2))
            .adapter(Arc::clone(&a) as Arc<dyn ProviderAdapter>)
            .build()
            .unwrap();

        let error = orchestrator.invoke(&request()).await.unwrap_err();

        match error {
            InvocationError::AllProvidersFailed { failures, attempts } => {
                assert_eq!(failures[0].error_kind, ErrorKind::Timeout);
                assert_eq!(attempts.len(), 2);
                assert!(attempts.iter().all(|a| a.duration_ms >= 1_000 && a.duration_ms < 1_100));
            }
            other => panic!("expected AllProvidersFailed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_serves_repeated_deterministic_requests() {
        let a = Arc::new(
            ScriptedAdapter::new("a")
                .fail(network_error())
                .fail(network_error())
                .respond("first")
                .respond("second"),
        );
        let orchestrator = Orchestrator::builder()
            .registry(registry_for(&["a"]))
            .adapter(Arc::clone(&a) as Arc<dyn ProviderAdapter>)
            .retry(fast_retry())
            .cache(ResponseCache::default())
            .build()
            .unwrap();

        let deterministic = request().with_temperature(0.0);
        let first = orchestrator.invoke(&deterministic).await.unwrap();
        assert_eq!(first.text, "first");
        assert_eq!(first.attempts.len(), 3);
        assert!(first.latency_ms >= 300);

        let second = orchestrator.invoke(&deterministic).await.unwrap();
        assert_eq!(second.text, "first");
        assert!(second.attempts.is_empty());
        assert_eq!(second.latency_ms, 0);
        assert_eq!(a.call_count(), 3);

        let creative = request().with_temperature(0.9);
        assert_eq!(orchestrator.invoke(&creative).await.unwrap().text, "second");
        assert_eq!(a.call_count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_streaming_retries_opening_then_streams() {
        let a = Arc::new(ScriptedAdapter::always_failing("a", network_error()));
        let b = Arc::new(ScriptedAdapter::new("b").respond("streamed text"));
        let orchestrator = orchestrator(&[&a, &b], &["a", "b"]);

        let mut handle = orchestrator
            .invoke_streaming(&request().with_model("a-model"))
            .await
            .unwrap();

        assert_eq!(handle.provider_id, "b");
        assert_eq!(handle.model_id, "b-model");
        assert_eq!(handle.attempts.len(), 4);

        let mut text = String::new();
        let mut saw_final = false;
        while let Some(chunk) = handle.stream.next().await {
            let chunk = chunk.unwrap();
            text.push_str(&chunk.delta);
            saw_final |= chunk.is_final;
        }
        assert_eq!(text, "streamed text");
        assert!(saw_final);
    }

    #[tokio::test]
    async fn test_cancelled_stream_yields_nothing_more() {
        let a = Arc::new(ScriptedAdapter::new("a").respond("never read"));
        let orchestrator = orchestrator(&[&a], &["a"]);

        let mut handle = orchestrator.invoke_streaming(&request()).await.unwrap();
        handle.cancel.cancel();
        assert!(handle.stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_invocations_do_not_serialize() {
        let a = Arc::new(ScriptedAdapter::new("a").with_latency(Duration::from_millis(100)));
        let orchestrator = Arc::new(orchestrator(&[&a], &["a"]));

        let started = Instant::now();
        let calls = (0..10).map(|_| {
            let orchestrator = Arc::clone(&orchestrator);
            tokio::spawn(async move { orchestrator.invoke(&request()).await })
        });
        let results = futures::future::join_all(calls).await;

        assert!(results
            .into_iter()
            .all(|r| r.map(|r| r.is_ok()).unwrap_or(false)));
        assert_eq!(a.call_count(), 10);
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_register_model_after_build() {
        let a = Arc::new(ScriptedAdapter::new("a"));
        let b = Arc::new(ScriptedAdapter::new("b"));
        let orchestrator = Orchestrator::builder()
            .registry(registry_for(&["a"]))
            .adapter(Arc::clone(&a) as Arc<dyn ProviderAdapter>)
            .adapter(Arc::clone(&b) as Arc<dyn ProviderAdapter>)
            .build()
            .unwrap();

        orchestrator
            .register_model(
                ModelDescriptor::new("b-fast", "b")
                    .with_cost(0.01)
                    .with_speed(SpeedClass::Fast),
            )
            .unwrap();
        assert!(orchestrator
            .register_model(ModelDescriptor::new("b-fast", "b"))
            .is_err());

        let result = orchestrator
            .invoke(&request().with_priority(Priority::Cost))
            .await
            .unwrap();
        assert_eq!(result.provider_used, "b");
        assert_eq!(result.model_used, "b-fast");
    }

    #[test]
    fn test_builder_validation() {
        assert!(Orchestrator::builder().build().is_err());

        let a: Arc<dyn ProviderAdapter> = Arc::new(ScriptedAdapter::new("a"));
        assert!(Orchestrator::builder()
            .adapter(Arc::clone(&a))
            .adapter(Arc::clone(&a))
            .build()
            .is_err());
        assert!(Orchestrator::builder()
            .adapter(Arc::clone(&a))
            .default_provider("missing")
            .build()
            .is_err());
        assert!(Orchestrator::builder()
            .adapter(Arc::clone(&a))
            .retry(RetryPolicy::default().with_max_retries(0))
            .build()
            .is_err());

        let built = Orchestrator::builder()
            .adapter(a)
            .model(model_for("a", 1.0))
            .build()
            .unwrap();
        assert_eq!(built.default_provider(), "a");
        assert!(built.model("a-model").is_some());
    }

    struct ScriptedFactory;

    impl AdapterFactory for ScriptedFactory {
        fn provider_type(&self) -> &'static str {
            "scripted"
        }

        fn create(
            &self,
            provider_id: &str,
            _config: &serde_json::Value,
        ) -> Result<Arc<dyn ProviderAdapter>, ConfigError> {
            Ok(Arc::new(ScriptedAdapter::new(provider_id)))
        }

        fn validate_config(&self, _config: &serde_json::Value) -> Result<(), ConfigError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = RuntimeConfig::from_yaml(
            r#"
default_provider: primary
fallback_order: [primary, backup]
builtin_models: false
providers:
  - id: primary
    type: scripted
  - id: backup
    type: scripted
models:
  - id: primary-large
    provider_id: primary
    capabilities: [structured-output]
    cost_per_million_tokens: 3.0
    speed_class: slow
    max_context_tokens: 100000
"#,
        )
        .unwrap();

        let mut factories = AdapterFactoryRegistry::new();
        factories.register(Arc::new(ScriptedFactory));

        let orchestrator = Orchestrator::from_config(&config, &factories).unwrap();
        assert_eq!(orchestrator.provider_ids(), vec!["backup", "primary"]);
        assert!(orchestrator.model("claude-sonnet-4-5").is_none());

        let result = orchestrator.invoke(&request()).await.unwrap();
        assert_eq!(result.provider_used, "primary");
        assert_eq!(result.model_used, "primary-large");

        let health = orchestrator.health_check().await;
        assert_eq!(health.get("backup"), Some(&true));
    }

    #[test]
    fn test_from_config_unknown_type() {
        let config = RuntimeConfig {
            default_provider: "x".to_string(),
            fallback_order: Vec::new(),
            retry: RetryPolicy::default(),
            providers: vec![ProviderConfig {
                id: "x".to_string(),
                provider_type: Some("nope".to_string()),
                config: serde_json::Value::Null,
            }],
            models: Vec::new(),
            builtin_models: true,
            enhancement: Default::default(),
            cache: Default::default(),
        };

        assert!(matches!(
            Orchestrator::from_config(&config, &AdapterFactoryRegistry::new()),
            Err(ConfigError::UnknownProviderType { .. })
        ));
    }
}
