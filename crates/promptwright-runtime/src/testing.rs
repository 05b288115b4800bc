//! Scripted adapters shared by the unit tests.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use promptwright_core::{Capability, CapabilityRegistry, ModelDescriptor, SpeedClass};
use tokio::time::Instant;

use crate::invocation::InvocationRequest;
use crate::providers::{Completion, ProviderAdapter, ProviderError, TokenUsage};

pub(crate) const ALL_CAPABILITIES: [Capability; 5] = [
    Capability::Streaming,
    Capability::FunctionCalling,
    Capability::Vision,
    Capability::LongContext,
    Capability::StructuredOutput,
];

/// Adapter that replays a script of results, then repeats `fallback`.
pub(crate) struct ScriptedAdapter {
    id: String,
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    fallback: Result<String, ProviderError>,
    latency: Duration,
    timeout: Duration,
    calls: Mutex<Vec<Call>>,
}

#[derive(Debug, Clone)]
pub(crate) struct Call {
    pub model: String,
    pub at: Instant,
    pub prompt: String,
}

impl ScriptedAdapter {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            script: Mutex::new(VecDeque::new()),
            fallback: Ok("ok".to_string()),
            latency: Duration::ZERO,
            timeout: Duration::from_secs(30),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(self, text: impl Into<String>) -> Self {
        self.script.lock().push_back(Ok(text.into()));
        self
    }

    pub fn fail(self, error: ProviderError) -> Self {
        self.script.lock().push_back(Err(error));
        self
    }

    pub fn then_always(mut self, result: Result<String, ProviderError>) -> Self {
        self.fallback = result;
        self
    }

    pub fn always_failing(id: &str, error: ProviderError) -> Self {
        Self::new(id).then_always(Err(error))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn provider_id(&self) -> &str {
        &self.id
    }

    async fn invoke(
        &self,
        model: &str,
        request: &InvocationRequest,
    ) -> Result<Completion, ProviderError> {
        self.calls.lock().push(Call {
            model: model.to_string(),
            at: Instant::now(),
            prompt: request.prompt_text(),
        });

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let next = self.script.lock().pop_front();
        let text = next.unwrap_or_else(|| self.fallback.clone())?;
        Ok(Completion {
            text,
            model: model.to_string(),
            usage: TokenUsage::new(100, 50),
            stop_reason: Some("end_turn".to_string()),
        })
    }

    fn attempt_timeout(&self) -> Duration {
        self.timeout
    }
}

/// Descriptor for `{provider}-model` with every capability.
pub(crate) fn model_for(provider: &str, cost: f64) -> ModelDescriptor {
    ModelDescriptor::new(format!("{provider}-model"), provider)
        .with_capabilities(ALL_CAPABILITIES)
        .with_cost(cost)
        .with_speed(SpeedClass::Medium)
        .with_max_context(200_000)
}

/// Registry with one full-capability model per provider.
pub(crate) fn registry_for(providers: &[&str]) -> CapabilityRegistry {
    let mut registry = CapabilityRegistry::new();
    for provider in providers {
        let _ = registry.register(model_for(provider, 2.0));
    }
    registry
}

pub(crate) fn network_error() -> ProviderError {
    ProviderError::Network("connection reset".to_string())
}
