//! Resilience patterns for promptwright-runtime.
//!
//! This module provides:
//! - Retry with exponential backoff and rate-limit waits
//! - The cross-provider fallback cascade

mod fallback;
mod retry;

pub use fallback::provider_sequence;
pub use retry::{RetryDecision, RetryPolicy, RetryTracker};
