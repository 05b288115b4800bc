//! Enhancement session state and history.

use std::fmt;

use chrono::{DateTime, Utc};
use promptwright_core::{Dimension, PromptContent, QualityMetrics};
use serde::{Deserialize, Serialize};

use crate::invocation::InvocationResult;
use crate::providers::TokenUsage;

/// How much a target matters to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPriority {
    High,
    Medium,
    Low,
}

/// A score the session should reach on one dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementTarget {
    pub dimension: Dimension,
    pub priority: TargetPriority,
    pub target_score: f64,
}

impl EnhancementTarget {
    pub fn new(dimension: Dimension, target_score: f64) -> Self {
        Self {
            dimension,
            priority: TargetPriority::Medium,
            target_score,
        }
    }

    pub fn with_priority(mut self, priority: TargetPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn is_met(&self, metrics: &QualityMetrics) -> bool {
        metrics.get(self.dimension) >= self.target_score
    }

    /// Distance still to cover, zero once met.
    pub fn gap(&self, metrics: &QualityMetrics) -> f64 {
        (self.target_score - metrics.get(self.dimension)).max(0.0)
    }
}

/// Whether every target is met. An empty target list is never met.
pub fn targets_met(targets: &[EnhancementTarget], metrics: &QualityMetrics) -> bool {
    !targets.is_empty() && targets.iter().all(|t| t.is_met(metrics))
}

/// The call that produced an iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationSummary {
    pub provider: String,
    pub model: String,
    pub tokens: TokenUsage,
    pub cost_estimate: f64,
    pub latency_ms: u64,
    pub attempts: usize,
}

impl From<&InvocationResult> for InvocationSummary {
    fn from(result: &InvocationResult) -> Self {
        Self {
            provider: result.provider_used.clone(),
            model: result.model_used.clone(),
            tokens: result.tokens_used,
            cost_estimate: result.cost_estimate,
            latency_ms: result.latency_ms,
            attempts: result.attempts.len(),
        }
    }
}

/// One step of the session. Index 0 is the unmodified baseline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IterationRecord {
    pub index: u32,
    pub content_snapshot: PromptContent,
    pub metrics: QualityMetrics,
    pub applied_changes_summary: Vec<String>,
    pub elapsed_ms: u64,

    /// `None` for the baseline
    pub invocation: Option<InvocationSummary>,
}

impl IterationRecord {
    pub(crate) fn baseline(content: PromptContent, metrics: QualityMetrics) -> Self {
        Self {
            index: 0,
            content_snapshot: content,
            metrics,
            applied_changes_summary: Vec::new(),
            elapsed_ms: 0,
            invocation: None,
        }
    }

    pub fn is_baseline(&self) -> bool {
        self.index == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Initialized,
    Iterating,
    TargetsAchieved,
    Converged,
    MaxIterationsReached,
    Failed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Initialized | SessionState::Iterating)
    }
}

/// Why a session stopped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    TargetsAchieved,

    /// The last overall deltas, oldest first
    Converged { deltas: Vec<f64> },

    MaxIterationsReached,
    AllProvidersFailed { message: String },
    InvocationFailed { message: String },
    ParseError { message: String },
    SessionTimeout,
}

impl StopReason {
    /// Terminal state this reason leads to.
    pub fn state(&self) -> SessionState {
        match self {
            StopReason::TargetsAchieved => SessionState::TargetsAchieved,
            StopReason::Converged { .. } => SessionState::Converged,
            StopReason::MaxIterationsReached => SessionState::MaxIterationsReached,
            StopReason::AllProvidersFailed { .. }
            | StopReason::InvocationFailed { .. }
            | StopReason::ParseError { .. }
            | StopReason::SessionTimeout => SessionState::Failed,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::TargetsAchieved => write!(f, "all targets achieved"),
            StopReason::Converged { deltas } => {
                let deltas: Vec<String> = deltas.iter().map(|d| format!("{d:+.2}")).collect();
                write!(f, "converged (last deltas {})", deltas.join(", "))
            }
            StopReason::MaxIterationsReached => write!(f, "maximum iterations reached"),
            StopReason::AllProvidersFailed { message } => {
                write!(f, "all providers failed: {message}")
            }
            StopReason::InvocationFailed { message } => write!(f, "invocation failed: {message}"),
            StopReason::ParseError { message } => write!(f, "unusable response: {message}"),
            StopReason::SessionTimeout => write!(f, "session timed out"),
        }
    }
}

/// Resources consumed by a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SessionUsage {
    pub calls: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost_estimate: f64,
}

impl SessionUsage {
    pub(crate) fn record(&mut self, result: &InvocationResult) {
        self.calls += 1;
        self.input_tokens += u64::from(result.tokens_used.input_tokens);
        self.output_tokens += u64::from(result.tokens_used.output_tokens);
        self.cost_estimate += result.cost_estimate;
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A complete enhancement run.
///
/// History is kept whatever the outcome: a failed session still returns
/// every iteration recorded before the failure.
#[derive(Debug, Clone, Serialize)]
pub struct EnhancementSession {
    original_content: PromptContent,
    targets: Vec<EnhancementTarget>,
    max_iterations: u32,
    iterations: Vec<IterationRecord>,
    state: SessionState,
    stop_reason: Option<StopReason>,
    usage: SessionUsage,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
}

impl EnhancementSession {
    pub(crate) fn new(
        original_content: PromptContent,
        targets: Vec<EnhancementTarget>,
        max_iterations: u32,
    ) -> Self {
        Self {
            original_content,
            targets,
            max_iterations,
            iterations: Vec::new(),
            state: SessionState::Initialized,
            stop_reason: None,
            usage: SessionUsage::default(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub(crate) fn push_iteration(&mut self, record: IterationRecord) {
        if self.state == SessionState::Initialized {
            self.state = SessionState::Iterating;
        }
        self.iterations.push(record);
    }

    pub(crate) fn record_usage(&mut self, result: &InvocationResult) {
        self.usage.record(result);
    }

    pub(crate) fn finish(&mut self, reason: StopReason) {
        self.state = reason.state();
        self.stop_reason = Some(reason);
        self.finished_at = Some(Utc::now());
    }

    pub fn original_content(&self) -> &PromptContent {
        &self.original_content
    }

    pub fn targets(&self) -> &[EnhancementTarget] {
        &self.targets
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// Every recorded iteration, baseline first.
    pub fn iterations(&self) -> &[IterationRecord] {
        &self.iterations
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop_reason.as_ref()
    }

    pub fn usage(&self) -> &SessionUsage {
        &self.usage
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// The most recent iteration (the baseline if none ran).
    pub fn latest(&self) -> Option<&IterationRecord> {
        self.iterations.last()
    }

    pub fn final_content(&self) -> &PromptContent {
        self.latest()
            .map(|r| &r.content_snapshot)
            .unwrap_or(&self.original_content)
    }

    /// The highest-scoring iteration, earliest on ties.
    pub fn best(&self) -> Option<&IterationRecord> {
        self.iterations.iter().fold(None, |best, record| match best {
            Some(b) if b.metrics.overall() >= record.metrics.overall() => Some(b),
            _ => Some(record),
        })
    }

    /// Overall gain from the baseline to the latest iteration.
    pub fn improvement(&self) -> f64 {
        match (self.iterations.first(), self.iterations.last()) {
            (Some(first), Some(last)) => last.metrics.overall() - first.metrics.overall(),
            _ => 0.0,
        }
    }

    /// Targets not met by the latest iteration.
    pub fn unmet_targets(&self) -> Vec<&EnhancementTarget> {
        match self.latest() {
            Some(latest) => self
                .targets
                .iter()
                .filter(|t| !t.is_met(&latest.metrics))
                .collect(),
            None => self.targets.iter().collect(),
        }
    }
}

/// Deltas of the last `window` overall scores when every one is smaller
/// than `threshold` in magnitude.
///
/// `overalls` starts with the baseline; at least `window` non-baseline
/// values are needed. Deltas are rounded to two decimals and keep their
/// sign, so a steady decline is not mistaken for a plateau.
pub fn convergence_deltas(overalls: &[f64], window: usize, threshold: f64) -> Option<Vec<f64>> {
    if window == 0 || overalls.len() < window + 1 {
        return None;
    }

    let tail = &overalls[overalls.len() - window - 1..];
    let deltas: Vec<f64> = tail.windows(2).map(|w| round2(w[1] - w[0])).collect();

    if deltas.iter().all(|d| d.abs() < threshold) {
        Some(deltas)
    } else {
        None
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
