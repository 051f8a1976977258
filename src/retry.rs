//! Bounded retry with exponential backoff for flaky external operations.
use std::time::Duration;

use serde::Deserialize;

/// How often and how patiently an operation is retried.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. At least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after every failed attempt.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            backoff_factor: 1.0,
        }
    }

    /// Delay to wait before attempt number `attempt` (1-based).
    ///
    /// The first attempt never waits.
    #[must_use]
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt.saturating_sub(2)).unwrap_or(i32::MAX);
        self.base_delay
            .mul_f64(self.backoff_factor.max(1.0).powi(exponent))
    }
}

/// `[retry]` section of `rice.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts.
    pub max_attempts: u32,
    /// Initial delay in milliseconds.
    pub base_delay_ms: u64,
    /// Exponential multiplier.
    pub backoff_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: u64::try_from(policy.base_delay.as_millis()).unwrap_or(u64::MAX),
            backoff_factor: policy.backoff_factor,
        }
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(s: &RetrySettings) -> Self {
        Self {
            max_attempts: s.max_attempts.max(1),
            base_delay: Duration::from_millis(s.base_delay_ms),
            backoff_factor: s.backoff_factor,
        }
    }
}

/// Run `op` until it succeeds or the policy's attempts are exhausted.
///
/// `on_retry` is called with the attempt number about to start and the error
/// of the previous attempt, before sleeping. The last error is returned when
/// every attempt fails.
///
/// # Errors
///
/// Returns the error of the final attempt.
pub fn retry<T, E, F, R>(policy: &RetryPolicy, mut op: F, mut on_retry: R) -> Result<T, E>
where
    F: FnMut(u32) -> Result<T, E>,
    R: FnMut(u32, &E),
{
    let attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                attempt += 1;
                on_retry(attempt, &err);
                std::thread::sleep(policy.delay_before(attempt));
            }
            Err(err) => return Err(err),
        }
    }
}
