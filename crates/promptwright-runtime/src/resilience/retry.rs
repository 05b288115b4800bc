//! Retry policy for a single provider.
//!
//! Decisions are table-driven from the error kind:
//!
//! | kind | action |
//! |------|--------|
//! | authentication, invalid request, model not found | fail immediately |
//! | rate limited | wait `retry_after` (or the default), retry, no slot consumed |
//! | network, timeout | exponential backoff, one slot consumed |

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration_str;
use crate::providers::ProviderError;

/// Retry settings shared by every provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per provider that transient failures may consume
    pub max_retries: u32,

    /// Delay after the first transient failure; doubles for each further one
    #[serde(with = "duration_str")]
    pub base_delay: Duration,

    /// Wait used when a rate-limited response carries no `retry-after`
    #[serde(with = "duration_str")]
    pub default_rate_limit_wait: Duration,

    /// Rate-limit waits allowed per provider before it counts as exhausted
    pub max_rate_limit_waits: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            default_rate_limit_wait: Duration::from_secs(1),
            max_rate_limit_waits: 5,
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Sleep, then try the same provider again
    Retry { delay: Duration, consumes_slot: bool },
    /// Move on to the next provider
    Exhausted,
    /// Stop the whole invocation
    Fatal,
}

impl RetryPolicy {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_default_rate_limit_wait(mut self, wait: Duration) -> Self {
        self.default_rate_limit_wait = wait;
        self
    }

    pub fn with_max_rate_limit_waits(mut self, waits: u32) -> Self {
        self.max_rate_limit_waits = waits;
        self
    }

    /// Fresh state for one provider's attempt loop.
    pub fn tracker(&self) -> RetryTracker<'_> {
        RetryTracker {
            policy: self,
            slots_used: 0,
            rate_limit_waits: 0,
        }
    }

    /// Delay after the transient failure with zero-based `attempt_index`:
    /// `base_delay * 2^attempt_index`, saturating at `Duration::MAX`.
    pub fn backoff_delay(&self, attempt_index: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt_index).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Backoff delays in the order a provider can use them.
    pub fn backoff_delays(&self) -> Vec<Duration> {
        (0..self.max_retries.saturating_sub(1))
            .map(|i| self.backoff_delay(i))
            .collect()
    }
}

/// Per-provider retry state.
pub struct RetryTracker<'a> {
    policy: &'a RetryPolicy,
    slots_used: u32,
    rate_limit_waits: u32,
}

impl RetryTracker<'_> {
    /// Record a failed attempt and decide what happens next.
    pub fn on_failure(&mut self, error: &ProviderError) -> RetryDecision {
        match error {
            ProviderError::RateLimited { retry_after } => {
                if self.rate_limit_waits >= self.policy.max_rate_limit_waits {
                    return RetryDecision::Exhausted;
                }
                self.rate_limit_waits += 1;
                RetryDecision::Retry {
                    delay: retry_after.unwrap_or(self.policy.default_rate_limit_wait),
                    consumes_slot: false,
                }
            }
            ProviderError::Network(_) | ProviderError::Timeout(_) => {
                let attempt_index = self.slots_used;
                self.slots_used += 1;
                if self.slots_used >= self.policy.max_retries {
                    return RetryDecision::Exhausted;
                }
                RetryDecision::Retry {
                    delay: self.policy.backoff_delay(attempt_index),
                    consumes_slot: true,
                }
            }
            _ => RetryDecision::Fatal,
        }
    }

    /// Attempts that consumed a retry slot so far.
    pub fn slots_used(&self) -> u32 {
        self.slots_used
    }
}
