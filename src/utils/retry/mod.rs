//! Reconnect backoff with exponential growth, cap, and jitter.
//!
//! Workers never give up reconnecting; the supervisor decides when a
//! connection has been down for too long.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Configuration for reconnect backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Delay before the first retry (before jitter).
    pub base_delay: Duration,
    /// Maximum delay cap (before jitter).
    pub max_delay: Duration,
    /// Jitter factor: delay is multiplied by random value in [1-jitter, 1+jitter].
    /// Set to 0.0 for no jitter.
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: 0.25,
        }
    }
}

impl RetryConfig {
    /// Backoff between `base` and `max`, with the default jitter.
    pub fn for_reconnect(base: Duration, max: Duration) -> Self {
        Self {
            base_delay: base,
            max_delay: max.max(base),
            ..Self::default()
        }
    }

    /// Delay before reconnect attempt `attempt` (0-indexed): `base * 2^attempt`
    /// capped at `max_delay`, then spread by the jitter factor so that
    /// several workers losing the same broker do not reconnect in lockstep.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let capped = self
            .base_delay
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_delay);
        if self.jitter <= 0.0 {
            return capped;
        }
        let spread = jitter_unit() * 2.0 - 1.0;
        capped.mul_f64((1.0 + spread * self.jitter).max(0.0))
    }
}

/// Pseudo-random value in `[0, 1)` from the clock's sub-second part.
fn jitter_unit() -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    f64::from(nanos % 1000) / 1000.0
}

#[cfg(test)]
mod tests;
