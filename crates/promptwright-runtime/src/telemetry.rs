//! Logging setup and a `tracing`-backed session observer.

use thiserror::Error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::enhancement::{EnhancementSession, IterationRecord, SessionObserver};
use crate::invocation::InvocationResult;

/// Filter used when neither an explicit filter nor `RUST_LOG` is given.
pub const DEFAULT_FILTER: &str = "promptwright_runtime=info";

#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter '{filter}': {message}")]
    InvalidFilter { filter: String, message: String },

    #[error("A global tracing subscriber is already installed: {0}")]
    AlreadyInitialized(String),
}

/// Install a formatted `tracing` subscriber.
///
/// `filter` takes precedence, then `RUST_LOG`, then [`DEFAULT_FILTER`].
/// Fails instead of panicking when a subscriber is already installed.
pub fn init_tracing(filter: Option<&str>) -> Result<(), TelemetryError> {
    let env_filter = match filter {
        Some(filter) => EnvFilter::try_new(filter).map_err(|e| TelemetryError::InvalidFilter {
            filter: filter.to_string(),
            message: e.to_string(),
        })?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))
}

/// Logs session events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SessionObserver for TracingObserver {
    fn on_iteration(&self, record: &IterationRecord) {
        tracing::info!(
            iteration = record.index,
            overall = record.metrics.overall(),
            clarity = record.metrics.clarity(),
            completeness = record.metrics.completeness(),
            structure = record.metrics.structure(),
            examples = record.metrics.examples(),
            guardrails = record.metrics.guardrails(),
            changes = record.applied_changes_summary.len(),
            elapsed_ms = record.elapsed_ms,
            "Enhancement iteration"
        );
    }

    fn on_invocation(&self, result: &InvocationResult) {
        tracing::debug!(
            provider = %result.provider_used,
            model = %result.model_used,
            input_tokens = result.tokens_used.input_tokens,
            output_tokens = result.tokens_used.output_tokens,
            cost = result.cost_estimate,
            latency_ms = result.latency_ms,
            attempts = result.attempts.len(),
            "Enhancement invocation"
        );
    }

    fn on_session_complete(&self, session: &EnhancementSession) {
        let reason = session
            .stop_reason()
            .map(|r| r.to_string())
            .unwrap_or_default();
        tracing::info!(
            state = ?session.state(),
            reason = %reason,
            iterations = session.iterations().len().saturating_sub(1),
            improvement = session.improvement(),
            calls = session.usage().calls,
            tokens = session.usage().total_tokens(),
            cost = session.usage().cost_estimate,
            "Enhancement session complete"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_filter_is_rejected() {
        assert!(matches!(
            init_tracing(Some("promptwright=loud")),
            Err(TelemetryError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_second_install_fails_without_panicking() {
        let first = init_tracing(Some("warn"));
        let second = init_tracing(Some("warn"));
        assert!(first.is_ok() || matches!(first, Err(TelemetryError::AlreadyInitialized(_))));
        assert!(matches!(second, Err(TelemetryError::AlreadyInitialized(_))));
    }
}
