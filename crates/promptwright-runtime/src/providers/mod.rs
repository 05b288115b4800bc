//! Provider adapter abstractions for promptwright-runtime.
//!
//! This module defines the trait every model backend implements and the
//! error taxonomy the orchestrator's retry and fallback decisions are
//! driven from. Reference adapters for Anthropic and OpenAI live behind
//! the `anthropic` and `openai` cargo features.
//!
//! ## Security
//!
//! All adapters use the [`secrets`] module for credential handling.
//! See [`ApiCredential`] for the recommended patterns.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::invocation::InvocationRequest;

mod factory;
pub mod http;
pub mod secrets;

#[cfg(feature = "anthropic")]
mod anthropic;

#[cfg(feature = "openai")]
mod openai;

pub use factory::{AdapterFactory, AdapterFactoryRegistry};
pub use secrets::{ApiCredential, CredentialSource};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicAdapter, AnthropicAdapterFactory};

#[cfg(feature = "openai")]
pub use openai::{OpenAiAdapter, OpenAiAdapterFactory};

/// Per-attempt bound used when an adapter does not override
/// [`ProviderAdapter::attempt_timeout`].
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors from provider adapters.
///
/// Every failure an adapter can observe is normalised into exactly one of
/// these variants before it leaves the adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl ProviderError {
    /// The serializable kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProviderError::Authentication(_) => ErrorKind::Authentication,
            ProviderError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            ProviderError::ModelNotFound(_) => ErrorKind::ModelNotFound,
            ProviderError::RateLimited { .. } => ErrorKind::RateLimited,
            ProviderError::Network(_) => ErrorKind::Network,
            ProviderError::Timeout(_) => ErrorKind::Timeout,
        }
    }

    /// Whether the orchestrator may attempt this call again.
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

/// Error classification recorded on attempts and failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    InvalidRequest,
    ModelNotFound,
    RateLimited,
    Network,
    Timeout,
}

impl ErrorKind {
    /// Rate limits, network failures and timeouts are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::Network | ErrorKind::Timeout
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Authentication => "authentication",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::ModelNotFound => "model_not_found",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Network => "network",
            ErrorKind::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

/// A chat message sent to a model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: MessageRole,
    pub content: String,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Token usage reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Total tokens used.
    pub fn total(&self) -> u64 {
        u64::from(self.input_tokens) + u64::from(self.output_tokens)
    }
}

/// A complete, non-streamed response from one adapter call.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// Generated text
    pub text: String,

    /// Model that served the call, as reported by the backend
    pub model: String,

    pub usage: TokenUsage,

    pub stop_reason: Option<String>,
}

/// One piece of a streamed response.
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    /// Text appended by this chunk (may be empty on the final chunk)
    pub delta: String,

    /// Set on the last chunk of a stream
    pub is_final: bool,

    /// Usage, when the backend reports it (usually on the final chunk)
    pub usage: Option<TokenUsage>,
}

impl TextChunk {
    pub fn delta(text: impl Into<String>) -> Self {
        Self {
            delta: text.into(),
            is_final: false,
            usage: None,
        }
    }

    pub fn finished(usage: Option<TokenUsage>) -> Self {
        Self {
            delta: String::new(),
            is_final: true,
            usage,
        }
    }
}

/// A finite stream of text chunks. Dropping it releases the connection.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<TextChunk, ProviderError>> + Send>>;

/// Adapter abstraction that lets backends be swapped behind one interface.
///
/// Adapters are stateless with respect to individual calls and must be safe
/// to share between concurrent invocations.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Identifier the registry's model descriptors refer to.
    fn provider_id(&self) -> &str;

    /// Execute a single, complete call.
    async fn invoke(
        &self,
        model: &str,
        request: &InvocationRequest,
    ) -> Result<Completion, ProviderError>;

    /// Open a streamed call.
    ///
    /// The default runs [`invoke`](Self::invoke) and yields the whole text
    /// as one chunk followed by the final chunk, for backends without
    /// native streaming.
    async fn invoke_streaming(
        &self,
        model: &str,
        request: &InvocationRequest,
    ) -> Result<TextStream, ProviderError> {
        let completion = self.invoke(model, request).await?;
        let chunks = vec![
            Ok(TextChunk::delta(completion.text)),
            Ok(TextChunk::finished(Some(completion.usage))),
        ];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    /// Check if the adapter is usable.
    async fn health_check(&self) -> bool {
        true
    }

    /// Upper bound for one attempt, enforced by the orchestrator.
    fn attempt_timeout(&self) -> Duration {
        DEFAULT_ATTEMPT_TIMEOUT
    }

    /// Estimate tokens for a prompt.
    fn estimate_tokens(&self, text: &str) -> u32 {
        estimate_tokens_for_len(text.len())
    }
}

/// ~4 bytes per token, saturating at `u32::MAX`.
pub fn estimate_tokens_for_len(len: usize) -> u32 {
    u32::try_from(len / 4).unwrap_or(u32::MAX)
}
