//! # promptwright-runtime
//!
//! Resilient model invocation and iterative prompt enhancement.
//!
//! This crate provides:
//! - [`ProviderAdapter`]: one interface over generative-model backends, with a
//!   six-kind error taxonomy ([`ProviderError`])
//! - [`Orchestrator`]: capability-aware model selection, retry with backoff,
//!   rate-limit waits and fallback across providers
//! - [`EnhancementLoop`]: repeatedly asks a backend to improve a prompt, scores
//!   each candidate with `promptwright-core` and decides when to stop
//!
//! ## Important
//!
//! Scoring and selection live in `promptwright-core` and never touch the
//! network. This crate is where I/O happens.
//!
//! ## Features
//!
//! - `anthropic`: Anthropic Messages API adapter
//! - `openai`: OpenAI Chat Completions API adapter
//! - `all-providers`: both
//!
//! ## Example
//!
//! ```rust,ignore
//! use promptwright_core::{Dimension, PromptContent};
//! use promptwright_runtime::{
//!     AdapterFactoryRegistry, EnhancementLoop, EnhancementTarget, LoopConfig, Orchestrator,
//!     RuntimeConfig,
//! };
//!
//! let config = RuntimeConfig::from_file("promptwright.yaml")?;
//! let orchestrator = Orchestrator::from_config(&config, &AdapterFactoryRegistry::with_defaults())?;
//!
//! let session = EnhancementLoop::new(config.enhancement.clone())
//!     .run(
//!         PromptContent::new("a bedtime story about a dragon"),
//!         vec![EnhancementTarget::new(Dimension::Clarity, 4.0)],
//!         5,
//!         &orchestrator,
//!     )
//!     .await;
//!
//! println!("{:?}: {}", session.state(), session.final_content().render());
//! ```

pub mod cache;
pub mod config;
pub mod enhancement;
pub mod invocation;
pub mod orchestrator;
pub mod providers;
pub mod resilience;
pub mod streaming;
pub mod telemetry;

#[cfg(test)]
mod testing;

pub use cache::{CacheConfig, ResponseCache};
pub use config::{ConfigError, ProviderConfig, RuntimeConfig};
pub use enhancement::{
    EnhancementLoop, EnhancementSession, EnhancementTarget, IterationRecord, LoopConfig,
    NoopObserver, ParseError, SessionObserver, SessionState, StopReason, TargetPriority,
};
pub use invocation::{AttemptRecord, InvocationRequest, InvocationResult};
pub use orchestrator::{InvocationError, Orchestrator, OrchestratorBuilder, ProviderFailure};
pub use providers::{
    AdapterFactory, AdapterFactoryRegistry, ApiCredential, ChatMessage, Completion,
    CredentialSource, ErrorKind, MessageRole, ProviderAdapter, ProviderError, TextChunk,
    TextStream, TokenUsage,
};
pub use resilience::RetryPolicy;
pub use streaming::{CancelHandle, StreamHandle};
pub use telemetry::{init_tracing, TracingObserver};

#[cfg(feature = "anthropic")]
pub use providers::{AnthropicAdapter, AnthropicAdapterFactory};

#[cfg(feature = "openai")]
pub use providers::{OpenAiAdapter, OpenAiAdapterFactory};
