//! Retry configuration, backoff strategies, and the per-call retry policy.

use http::StatusCode;
use std::sync::Arc;
use std::time::Duration;

/// Status codes retried by default.
pub const DEFAULT_RETRY_STATUS_CODES: [u16; 5] = [429, 500, 502, 503, 504];

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first. `0` means unlimited.
    pub max_attempts: u32,
    /// Backoff strategy.
    pub backoff: BackoffStrategy,
    /// Status codes that should trigger a retry.
    pub retry_status_codes: Vec<u16>,
    /// `Retry-After` values at or below this are ignored in favor of the
    /// backoff schedule.
    pub min_retry_after: Duration,
    /// Upper bound applied to honored `Retry-After` values. Zero disables the
    /// bound.
    pub max_retry_after: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential {
                initial: Duration::from_secs(1),
                max: Duration::from_secs(5),
                multiplier: 2.0,
            },
            retry_status_codes: DEFAULT_RETRY_STATUS_CODES.to_vec(),
            min_retry_after: Duration::from_secs(3),
            max_retry_after: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Create a retry config with exponential backoff.
    pub fn exponential(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Exponential {
                initial: initial_delay,
                max: Duration::from_secs(30),
                multiplier: 2.0,
            },
            ..Default::default()
        }
    }

    /// Create a retry config with linear backoff.
    pub fn linear(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Linear {
                delay,
                max: Duration::from_secs(30),
            },
            ..Default::default()
        }
    }

    /// Create a retry config with constant delay.
    pub fn constant(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::Constant(delay),
            ..Default::default()
        }
    }

    /// Create a retry config with no delay.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: BackoffStrategy::None,
            ..Default::default()
        }
    }

    /// Replace the retryable status codes.
    pub fn with_status_codes(mut self, codes: Vec<u16>) -> Self {
        self.retry_status_codes = codes;
        self
    }

    /// Set the `Retry-After` bounds.
    pub fn with_retry_after(mut self, min: Duration, max: Duration) -> Self {
        self.min_retry_after = min;
        self.max_retry_after = max;
        self
    }

    /// Check if a status code should trigger a retry.
    pub fn should_retry_status(&self, status: StatusCode) -> bool {
        self.retry_status_codes.contains(&status.as_u16())
    }

    /// Clamp a server-provided delay, or `None` when it does not exceed the
    /// minimum and the backoff schedule should be used instead.
    pub fn clamp_retry_after(&self, delay: Duration) -> Option<Duration> {
        if delay <= self.min_retry_after {
            return None;
        }
        if !self.max_retry_after.is_zero() && delay > self.max_retry_after {
            return Some(self.max_retry_after);
        }
        Some(delay)
    }

    /// A fresh policy for one call.
    pub fn policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(Retrier::new(self.backoff.clone(), self.max_attempts))
    }
}

/// Backoff strategy for retries.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// No delay between retries.
    None,
    /// Constant delay between retries.
    Constant(Duration),
    /// Linear backoff: delay increases by a fixed amount.
    Linear {
        /// Delay increment per attempt.
        delay: Duration,
        /// Maximum delay.
        max: Duration,
    },
    /// Exponential backoff: delay is multiplied each attempt.
    Exponential {
        /// Initial delay.
        initial: Duration,
        /// Maximum delay.
        max: Duration,
        /// Multiplier (typically 2.0).
        multiplier: f64,
    },
}

impl BackoffStrategy {
    /// Calculate delay for a given retry (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Constant(d) => *d,
            Self::Linear { delay, max } => delay.saturating_mul(attempt.saturating_add(1)).min(*max),
            Self::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let nanos = initial.as_nanos() as f64 * multiplier.powi(exponent);
                if !nanos.is_finite() || nanos >= max.as_nanos() as f64 {
                    return *max;
                }
                Duration::from_nanos(nanos.max(0.0) as u64)
            }
        }
    }
}

/// Attempt accounting and delay schedule for one call.
///
/// A policy is created per call and never shared between concurrent calls.
pub trait RetryPolicy: Send {
    /// Whether another attempt may be made.
    fn has_attempts_remaining(&self) -> bool;

    /// Consume one attempt and return the delay before it.
    fn next_delay(&mut self) -> Duration;

    /// Use `delay` for the next call to [`next_delay`](Self::next_delay)
    /// instead of the backoff schedule.
    fn override_next_delay(&mut self, delay: Duration);
}

/// Builds a fresh [`RetryPolicy`] for each call.
pub type PolicyFactory = Arc<dyn Fn() -> Box<dyn RetryPolicy> + Send + Sync>;

/// Default [`RetryPolicy`] over a [`BackoffStrategy`].
#[derive(Debug, Clone)]
pub struct Retrier {
    backoff: BackoffStrategy,
    max_attempts: u32,
    attempt: u32,
    next_override: Option<Duration>,
}

impl Retrier {
    /// Create a retrier. The first attempt is counted as already made.
    pub fn new(backoff: BackoffStrategy, max_attempts: u32) -> Self {
        Self {
            backoff,
            max_attempts,
            attempt: 1,
            next_override: None,
        }
    }

    /// Number of attempts granted so far, including the first.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl RetryPolicy for Retrier {
    fn has_attempts_remaining(&self) -> bool {
        self.max_attempts == 0 || self.attempt < self.max_attempts
    }

    fn next_delay(&mut self) -> Duration {
        let delay = match self.next_override.take() {
            Some(delay) => delay,
            None => self.backoff.delay_for_attempt(self.attempt - 1),
        };
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    fn override_next_delay(&mut self, delay: Duration) {
        self.next_override = Some(delay);
    }
}
