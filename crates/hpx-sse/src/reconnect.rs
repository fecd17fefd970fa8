//! Reconnect/backoff policy.
//!
//! Everything here is pure: no clocks, no I/O, so the policy can be tested in
//! isolation from the connection driver.

use std::time::Duration;

/// Largest exponent applied to the base delay (2^6 = 64x).
pub const MAX_BACKOFF_EXPONENT: u32 = 6;

/// Default ceiling for any reconnect delay.
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(5 * 60);

/// Capped exponential backoff with an optional attempt limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Delay before the first reconnect attempt.
    pub base_delay: Duration,
    /// Absolute ceiling for any delay.
    pub max_delay: Duration,
    /// Maximum consecutive reconnect attempts; `0` means unlimited.
    pub max_attempts: u32,
}

impl ReconnectPolicy {
    /// Create a policy with the default 5 minute ceiling.
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_delay: DEFAULT_MAX_DELAY,
            max_attempts,
        }
    }

    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        backoff_delay(self.base_delay, self.max_delay, attempt)
    }

    /// Whether another attempt is allowed after `attempt_count` attempts.
    pub fn should_attempt(&self, attempt_count: u32) -> bool {
        should_attempt(attempt_count, self.max_attempts)
    }

    /// Validate the policy.
    ///
    /// # Errors
    ///
    /// Returns an error message string if any delay is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_delay.is_zero() {
            return Err("Base reconnect delay must be > 0".to_string());
        }
        if self.max_delay.is_zero() {
            return Err("Max reconnect delay must be > 0".to_string());
        }
        if self.max_delay < self.base_delay {
            return Err("Max reconnect delay must be >= base reconnect delay".to_string());
        }
        Ok(())
    }
}

/// `min(base * 2^min(attempt - 1, 6), max)`.
///
/// Attempt `0` is treated like attempt `1`. Overflow saturates to `max`.
pub fn backoff_delay(base: Duration, max: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    base.checked_mul(1u32 << exponent).unwrap_or(max).min(max)
}

/// `true` when `max_attempts` is `0` (unlimited) or `attempt_count` is below it.
pub fn should_attempt(attempt_count: u32, max_attempts: u32) -> bool {
    max_attempts == 0 || attempt_count < max_attempts
}
