//! Retry Policy
//!
//! Bounded attempts with exponential backoff. Which failures are worth
//! another attempt is decided by [`ActionError::is_retryable`].

use std::time::Duration;

use crate::error::ActionError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Upper bound for a server-provided `Retry-After` wait.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles each time
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Backoff after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Wait before the next attempt, honouring a server hint if present.
    pub fn next_delay(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        match hint {
            Some(hint) => hint.min(MAX_RETRY_AFTER),
            None => self.delay_for(attempt),
        }
    }
}

/// Progress of one logical call across its attempts.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Attempts made so far
    pub attempt: u32,
    pub last_error: Option<ActionError>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exhausted(&self, policy: &RetryPolicy) -> bool {
        self.attempt >= policy.max_attempts
    }

    /// Consumes the state, yielding the error of the final attempt.
    pub fn into_error(self) -> ActionError {
        self.last_error.unwrap_or_else(|| {
            ActionError::Network(format!("request failed after {} attempts", self.attempt))
        })
    }
}
