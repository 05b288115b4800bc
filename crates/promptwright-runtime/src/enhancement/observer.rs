//! Write-only hooks into a running session.

use super::session::{EnhancementSession, IterationRecord};
use crate::invocation::InvocationResult;

/// Receives session events. Implementations must not block.
pub trait SessionObserver: Send + Sync {
    /// Called for every recorded iteration, baseline included.
    fn on_iteration(&self, _record: &IterationRecord) {}

    /// Called for every successful backend call.
    fn on_invocation(&self, _result: &InvocationResult) {}

    /// Called once when the session reaches a terminal state.
    fn on_session_complete(&self, _session: &EnhancementSession) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SessionObserver for NoopObserver {}
