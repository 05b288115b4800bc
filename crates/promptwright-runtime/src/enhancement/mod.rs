//! Iterative prompt enhancement.
//!
//! A session starts from the caller's content (iteration 0, never sent to a
//! backend), then repeatedly asks the orchestrator for an improved version,
//! scores it and decides whether to stop:
//!
//! ```text
//! Initialized -> Iterating -> TargetsAchieved
//!                          -> Converged
//!                          -> MaxIterationsReached
//!                          -> Failed (providers, parse, timeout)
//! ```
//!
//! Sessions run one iteration at a time. Every outcome, failures included,
//! returns the full history recorded so far.

mod observer;
pub mod prompts;
mod response;
mod session;

use std::collections::BTreeSet;
use std::time::Duration;

use promptwright_core::{diff, Capability, Priority, PromptContent, QualityScorer, ScoreCard};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::config::{option_duration_str, ConfigError};
use crate::invocation::{InvocationRequest, InvocationResult};
use crate::orchestrator::{InvocationError, Orchestrator};

pub use observer::{NoopObserver, SessionObserver};
pub use response::{parse_enhanced_content, EnhancedContent, ParseError};
pub use session::{
    convergence_deltas, targets_met, EnhancementSession, EnhancementTarget, InvocationSummary,
    IterationRecord, SessionState, SessionUsage, StopReason, TargetPriority,
};

/// Enhancement loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Iterations used by [`EnhancementLoop::run_configured`]
    pub max_iterations: u32,

    /// Overall deltas below this count as diminishing returns
    pub convergence_threshold: f64,

    /// Consecutive small deltas needed to converge
    pub convergence_window: usize,

    /// Wall-clock budget for a whole session
    #[serde(with = "option_duration_str", skip_serializing_if = "Option::is_none")]
    pub session_timeout: Option<Duration>,

    pub required_capabilities: BTreeSet<Capability>,
    pub priority: Priority,

    /// Pin enhancement requests to one model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            convergence_threshold: 0.1,
            convergence_window: 3,
            session_timeout: None,
            required_capabilities: BTreeSet::from([Capability::StructuredOutput]),
            priority: Priority::Quality,
            model: None,
            temperature: 0.7,
            max_output_tokens: 2048,
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.convergence_window == 0 {
            return Err(ConfigError::Invalid(
                "enhancement.convergence_window must be at least 1".to_string(),
            ));
        }
        if !self.convergence_threshold.is_finite() || self.convergence_threshold < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "enhancement.convergence_threshold must be a non-negative number, got {}",
                self.convergence_threshold
            )));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "enhancement.temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        if self.max_output_tokens == 0 {
            return Err(ConfigError::Invalid(
                "enhancement.max_output_tokens must be at least 1".to_string(),
            ));
        }
        if self.session_timeout.is_some_and(|t| t.is_zero()) {
            return Err(ConfigError::Invalid(
                "enhancement.session_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Runs enhancement sessions against an orchestrator.
pub struct EnhancementLoop {
    config: LoopConfig,
    scorer: QualityScorer,
}

impl EnhancementLoop {
    pub fn new(config: LoopConfig) -> Self {
        Self {
            config,
            scorer: QualityScorer::new(),
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Run a session of at most `max_iterations` enhancement iterations.
    pub async fn run(
        &self,
        original: PromptContent,
        targets: Vec<EnhancementTarget>,
        max_iterations: u32,
        orchestrator: &Orchestrator,
    ) -> EnhancementSession {
        self.run_with_observer(original, targets, max_iterations, orchestrator, &NoopObserver)
            .await
    }

    /// Run a session using the configured iteration limit.
    pub async fn run_configured(
        &self,
        original: PromptContent,
        targets: Vec<EnhancementTarget>,
        orchestrator: &Orchestrator,
    ) -> EnhancementSession {
        self.run(original, targets, self.config.max_iterations, orchestrator)
            .await
    }

    /// Run a session, reporting progress to `observer`.
    pub async fn run_with_observer(
        &self,
        original: PromptContent,
        targets: Vec<EnhancementTarget>,
        max_iterations: u32,
        orchestrator: &Orchestrator,
        observer: &dyn SessionObserver,
    ) -> EnhancementSession {
        let deadline = self.config.session_timeout.map(|t| Instant::now() + t);

        let card = self.scorer.score_card(&original);
        let mut session = EnhancementSession::new(original.clone(), targets, max_iterations);
        let baseline = IterationRecord::baseline(original, card.metrics);

        tracing::info!(
            max_iterations,
            targets = session.targets().len(),
            overall = card.metrics.overall(),
            "Enhancement session started"
        );

        observer.on_iteration(&baseline);
        session.push_iteration(baseline);

        let reason = self
            .iterate(&mut session, card, orchestrator, observer, deadline)
            .await;

        tracing::info!(
            iterations = session.iterations().len() - 1,
            overall = session.latest().map(|r| r.metrics.overall()),
            reason = %reason,
            "Enhancement session finished"
        );

        session.finish(reason);
        observer.on_session_complete(&session);
        session
    }

    async fn iterate(
        &self,
        session: &mut EnhancementSession,
        mut card: ScoreCard,
        orchestrator: &Orchestrator,
        observer: &dyn SessionObserver,
        deadline: Option<Instant>,
    ) -> StopReason {
        if targets_met(session.targets(), &card.metrics) {
            return StopReason::TargetsAchieved;
        }

        let max_iterations = session.max_iterations();
        for index in 1..=max_iterations {
            let iteration_started = Instant::now();
            let previous = session.final_content().clone();
            let request = prompts::enhancement_request(
                &previous,
                &card,
                session.targets(),
                index,
                max_iterations,
                &self.config,
            );

            let result = match invoke_within(orchestrator, &request, deadline).await {
                Ok(result) => result,
                Err(reason) => return reason,
            };
            session.record_usage(&result);
            observer.on_invocation(&result);

            let (enhanced, result) = match parse_enhanced_content(&result.text) {
                Ok(enhanced) => (enhanced, result),
                Err(error) => {
                    tracing::warn!(
                        iteration = index,
                        error = %error,
                        "Unusable enhancement reply, asking again"
                    );
                    let retry = prompts::strict_retry_request(
                        &request,
                        &result.text,
                        &error.to_string(),
                        &self.config,
                    );
                    let retried = match invoke_within(orchestrator, &retry, deadline).await {
                        Ok(result) => result,
                        Err(reason) => return reason,
                    };
                    session.record_usage(&retried);
                    observer.on_invocation(&retried);

                    match parse_enhanced_content(&retried.text) {
                        Ok(enhanced) => (enhanced, retried),
                        Err(error) => {
                            return StopReason::ParseError {
                                message: error.to_string(),
                            }
                        }
                    }
                }
            };

            card = self.scorer.score_card(&enhanced.content);

            let mut changes = diff(&previous, &enhanced.content);
            if let Some(rationale) = enhanced.rationale {
                changes.push(format!("Rationale: {rationale}"));
            }

            let record = IterationRecord {
                index,
                content_snapshot: enhanced.content,
                metrics: card.metrics,
                applied_changes_summary: changes,
                elapsed_ms: u64::try_from(iteration_started.elapsed().as_millis())
                    .unwrap_or(u64::MAX),
                invocation: Some(InvocationSummary::from(&result)),
            };

            tracing::info!(
                iteration = index,
                overall = record.metrics.overall(),
                provider = %result.provider_used,
                model = %result.model_used,
                "Iteration recorded"
            );

            observer.on_iteration(&record);
            session.push_iteration(record);

            if targets_met(session.targets(), &card.metrics) {
                return StopReason::TargetsAchieved;
            }

            let overalls: Vec<f64> = session
                .iterations()
                .iter()
                .map(|r| r.metrics.overall())
                .collect();
            if let Some(deltas) = convergence_deltas(
                &overalls,
                self.config.convergence_window,
                self.config.convergence_threshold,
            ) {
                return StopReason::Converged { deltas };
            }
        }

        StopReason::MaxIterationsReached
    }
}

impl Default for EnhancementLoop {
    fn default() -> Self {
        Self::new(LoopConfig::default())
    }
}

/// Invoke, racing the call against the session deadline.
///
/// On expiry the in-flight invocation future is dropped, which cancels it.
async fn invoke_within(
    orchestrator: &Orchestrator,
    request: &InvocationRequest,
    deadline: Option<Instant>,
) -> Result<InvocationResult, StopReason> {
    let outcome = match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, orchestrator.invoke(request))
            .await
            .map_err(|_| StopReason::SessionTimeout)?,
        None => orchestrator.invoke(request).await,
    };

    outcome.map_err(|error| {
        let message = error.to_string();
        if matches!(error, InvocationError::AllProvidersFailed { .. }) {
            StopReason::AllProvidersFailed { message }
        } else {
            StopReason::InvocationFailed { message }
        }
    })
}
