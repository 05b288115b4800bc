//! Invocation request and result types.

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use promptwright_core::{Capability, Priority};
use serde::Serialize;

use crate::providers::{ChatMessage, ErrorKind, MessageRole, TokenUsage};

/// Default cap on generated tokens.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;

/// One call to be served by some provider.
///
/// Built once and shared by reference; the orchestrator never modifies it.
///
/// ```
/// use promptwright_core::{Capability, Priority};
/// use promptwright_runtime::{ChatMessage, InvocationRequest};
///
/// let request = InvocationRequest::new(vec![
///     ChatMessage::system("You improve prompts."),
///     ChatMessage::user("Make this clearer: summarize the doc"),
/// ])
/// .with_capability(Capability::StructuredOutput)
/// .with_priority(Priority::Cost)
/// .with_temperature(0.0);
///
/// assert_eq!(request.priority(), Priority::Cost);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    messages: Vec<ChatMessage>,
    required_capabilities: BTreeSet<Capability>,
    priority: Priority,
    explicit_model_id: Option<String>,
    max_cost: Option<f64>,
    max_output_tokens: u32,
    temperature: f32,
    streaming: bool,
}

impl InvocationRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            required_capabilities: BTreeSet::new(),
            priority: Priority::default(),
            explicit_model_id: None,
            max_cost: None,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            temperature: 0.7,
            streaming: false,
        }
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.required_capabilities.insert(capability);
        self
    }

    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        self.required_capabilities.extend(capabilities);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Pin the call to one model, bypassing the selector.
    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.explicit_model_id = Some(model_id.into());
        self
    }

    /// Upper bound on the selected model's price per million tokens.
    pub fn with_max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost = Some(max_cost);
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn required_capabilities(&self) -> &BTreeSet<Capability> {
        &self.required_capabilities
    }

    /// Capabilities the selected model must have. A streaming request
    /// additionally needs [`Capability::Streaming`].
    pub fn effective_capabilities(&self) -> BTreeSet<Capability> {
        let mut capabilities = self.required_capabilities.clone();
        if self.streaming {
            capabilities.insert(Capability::Streaming);
        }
        capabilities
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn explicit_model_id(&self) -> Option<&str> {
        self.explicit_model_id.as_deref()
    }

    pub fn max_cost(&self) -> Option<f64> {
        self.max_cost
    }

    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// System messages joined by blank lines, if there are any.
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join("\n\n"))
        }
    }

    /// Messages other than system messages, in order.
    pub fn conversation(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
    }

    /// All message text joined by blank lines.
    pub fn prompt_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Stable key over everything that affects the response.
    pub fn cache_key(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.messages.hash(&mut hasher);
        self.required_capabilities.hash(&mut hasher);
        self.priority.hash(&mut hasher);
        self.explicit_model_id.hash(&mut hasher);
        self.max_cost.map(f64::to_bits).hash(&mut hasher);
        self.max_output_tokens.hash(&mut hasher);
        self.temperature.to_bits().hash(&mut hasher);
        hasher.finish()
    }
}

/// One attempt against one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub provider_id: String,
    pub model_id: String,

    /// `None` when the attempt succeeded
    pub error_kind: Option<ErrorKind>,

    pub duration_ms: u64,
}

impl AttemptRecord {
    pub fn succeeded(&self) -> bool {
        self.error_kind.is_none()
    }
}

/// A successful invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationResult {
    pub text: String,
    pub model_used: String,
    pub provider_used: String,
    pub tokens_used: TokenUsage,

    /// USD, from the registered descriptor of `model_used` (0 if unknown)
    pub cost_estimate: f64,

    /// Wall-clock time of the whole invocation, including retries
    pub latency_ms: u64,

    /// Every attempt made, the last one being the success; empty when the
    /// result was served from the response cache
    pub attempts: Vec<AttemptRecord>,
}
