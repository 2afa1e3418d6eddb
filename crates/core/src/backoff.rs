//! Exponential backoff and timeout escalation shared by every retry loop.
//!
//! The policy is pure: `wait(n)` and `escalate(t)` depend only on their
//! inputs and the configured constants. Call sites differ only in the
//! constants they use (see the `*_defaults` constructors).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff constants for one retrying call site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BackoffPolicy {
    /// Base of the exponential wait, in seconds (`wait(n) = base^n`).
    pub base: f64,

    /// Upper bound for a single wait, in seconds.
    pub max_wait_secs: f64,

    /// Multiplier applied to a timeout after a failed attempt.
    pub growth_factor: f64,

    /// Upper bound for an escalated timeout, in seconds.
    pub max_timeout_secs: f64,
}

impl BackoffPolicy {
    /// Creates a policy from its four constants.
    pub fn new(base: f64, max_wait_secs: f64, growth_factor: f64, max_timeout_secs: f64) -> Self {
        Self {
            base,
            max_wait_secs,
            growth_factor,
            max_timeout_secs,
        }
    }

    /// Favorites API fetches.
    pub fn catalog_defaults() -> Self {
        Self::new(2.0, 5.0, 1.5, 30.0)
    }

    /// Video downloads.
    pub fn download_defaults() -> Self {
        Self::new(2.0, 5.0, 1.25, 120.0)
    }

    /// Audio extraction. A flat one second pause between attempts.
    pub fn conversion_defaults() -> Self {
        Self::new(1.0, 1.0, 1.0, 3600.0)
    }

    /// Remote compression sessions.
    pub fn compression_defaults() -> Self {
        Self::new(5.0, 30.0, 2.0, 300.0)
    }

    /// Wait before the retry that follows failed attempt `attempt` (1-based).
    ///
    /// Non-decreasing in `attempt` and never above `max_wait_secs`.
    pub fn wait(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base.max(0.0).powi(exponent);
        clamp_secs(secs, self.max_wait_secs)
    }

    /// Timeout to use on the next attempt after `timeout` proved too short.
    ///
    /// Never above `max_timeout_secs`.
    pub fn escalate(&self, timeout: Duration) -> Duration {
        let secs = timeout.as_secs_f64() * self.growth_factor.max(0.0);
        clamp_secs(secs, self.max_timeout_secs)
    }

    /// Checks the constants describe a non-decreasing schedule.
    pub fn validate(&self) -> Result<(), String> {
        if !self.base.is_finite() || self.base < 1.0 {
            return Err(format!("base must be >= 1, got {}", self.base));
        }
        if !self.growth_factor.is_finite() || self.growth_factor < 1.0 {
            return Err(format!(
                "growth_factor must be >= 1, got {}",
                self.growth_factor
            ));
        }
        if !self.max_wait_secs.is_finite() || self.max_wait_secs < 0.0 {
            return Err(format!(
                "max_wait_secs must be a non-negative number, got {}",
                self.max_wait_secs
            ));
        }
        if !self.max_timeout_secs.is_finite() || self.max_timeout_secs <= 0.0 {
            return Err(format!(
                "max_timeout_secs must be positive, got {}",
                self.max_timeout_secs
            ));
        }
        Ok(())
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::download_defaults()
    }
}

fn clamp_secs(secs: f64, cap: f64) -> Duration {
    let cap = if cap.is_finite() { cap.max(0.0) } else { 0.0 };
    if secs.is_nan() || secs >= cap {
        Duration::from_secs_f64(cap)
    } else {
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// A set of timeouts that grows together after a failed attempt.
pub trait Escalate {
    /// Escalates every timeout in the set with `policy`.
    fn escalate(&mut self, policy: &BackoffPolicy);
}

impl Escalate for Duration {
    fn escalate(&mut self, policy: &BackoffPolicy) {
        *self = policy.escalate(*self);
    }
}

/// Ephemeral state of one retry loop.
#[derive(Debug, Clone)]
pub struct RetryState<T> {
    /// Attempts started so far.
    pub attempt: u32,
    /// Wait applied after the most recent failure.
    pub wait: Duration,
    /// Timeouts for the next attempt.
    pub timeouts: T,
}

impl<T: Escalate> RetryState<T> {
    /// Starts a loop with the configured initial timeouts.
    pub fn new(timeouts: T) -> Self {
        Self {
            attempt: 0,
            wait: Duration::ZERO,
            timeouts,
        }
    }

    /// Marks the start of the next attempt and returns its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    /// Records a failure of the current attempt.
    ///
    /// Returns how long to wait before the next attempt and escalates the
    /// timeouts for it.
    pub fn record_failure(&mut self, policy: &BackoffPolicy) -> Duration {
        self.wait = policy.wait(self.attempt.max(1));
        self.timeouts.escalate(policy);
        self.wait
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_is_exponential_until_cap() {
        let policy = BackoffPolicy::compression_defaults();
        assert_eq!(policy.wait(1), Duration::from_secs(5));
        assert_eq!(policy.wait(2), Duration::from_secs(25));
        assert_eq!(policy.wait(3), Duration::from_secs(30));
        assert_eq!(policy.wait(50), Duration::from_secs(30));
    }

    #[test]
    fn test_wait_monotonic_and_bounded() {
        for policy in [
            BackoffPolicy::catalog_defaults(),
            BackoffPolicy::download_defaults(),
            BackoffPolicy::conversion_defaults(),
            BackoffPolicy::compression_defaults(),
        ] {
            let cap = Duration::from_secs_f64(policy.max_wait_secs);
            let mut previous = Duration::ZERO;
            for n in 1..=200 {
                let wait = policy.wait(n);
                assert!(wait >= previous, "wait decreased at n={n}");
                assert!(wait <= cap, "wait exceeded cap at n={n}");
                previous = wait;
            }
        }
    }

    #[test]
    fn test_wait_handles_huge_attempt_numbers() {
        let policy = BackoffPolicy::catalog_defaults();
        assert_eq!(policy.wait(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_escalate_monotonic_and_bounded() {
        let policy = BackoffPolicy::compression_defaults();
        let cap = Duration::from_secs_f64(policy.max_timeout_secs);
        let mut timeout = Duration::from_secs(5);
        for _ in 0..100 {
            let next = policy.escalate(timeout);
            assert!(next >= timeout);
            assert!(next <= cap);
            timeout = next;
        }
        assert_eq!(timeout, cap);
    }

    #[test]
    fn test_escalate_doubles() {
        let policy = BackoffPolicy::compression_defaults();
        assert_eq!(
            policy.escalate(Duration::from_secs(20)),
            Duration::from_secs(40)
        );
        assert_eq!(
            policy.escalate(Duration::from_secs(200)),
            Duration::from_secs(300)
        );
    }

    #[test]
    fn test_conversion_defaults_constant_wait() {
        let policy = BackoffPolicy::conversion_defaults();
        assert_eq!(policy.wait(1), Duration::from_secs(1));
        assert_eq!(policy.wait(5), Duration::from_secs(1));
    }

    #[test]
    fn test_validate_rejects_shrinking_schedules() {
        assert!(BackoffPolicy::new(0.5, 5.0, 2.0, 10.0).validate().is_err());
        assert!(BackoffPolicy::new(2.0, 5.0, 0.5, 10.0).validate().is_err());
        assert!(BackoffPolicy::new(2.0, f64::NAN, 2.0, 10.0)
            .validate()
            .is_err());
        assert!(BackoffPolicy::download_defaults().validate().is_ok());
    }

    #[test]
    fn test_retry_state_tracks_attempts() {
        let policy = BackoffPolicy::download_defaults();
        let mut state = RetryState::new(Duration::from_secs(60));

        assert_eq!(state.begin_attempt(), 1);
        let wait = state.record_failure(&policy);
        assert_eq!(wait, Duration::from_secs(2));
        assert_eq!(state.timeouts, Duration::from_secs(75));

        assert_eq!(state.begin_attempt(), 2);
        let wait = state.record_failure(&policy);
        assert_eq!(wait, Duration::from_secs(4));
        assert_eq!(state.wait, Duration::from_secs(4));
    }
}
