//! Retry decisions and backoff scheduling.
//!
//! Wraps the outcome of one HTTP attempt in a [`RetryDecision`]: whether
//! another attempt may run and how long to sleep first. The policy never
//! touches the rate limiter; the engine re-acquires a permit before every
//! attempt because each upstream attempt consumes real capacity.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

use msbridge_core::errors::DispatchError;

/// Ceiling for a single computed backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Symmetric jitter applied to every computed backoff (fraction of delay).
const JITTER_FRACTION: f64 = 0.2;

/// Per-dispatch retry settings resolved from the request and config.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(base_delay_ms),
        }
    }

    /// Total attempts allowed: the first one plus `max_retries` retries.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Exponential backoff for the attempt that just failed (1-based):
    /// `min(base * 2^(attempt-1), 30 s)` with ±20% jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let raw = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(MAX_BACKOFF);

        let jitter = rand::thread_rng().gen_range(-JITTER_FRACTION..=JITTER_FRACTION);
        raw.mul_f64(1.0 + jitter)
    }

    /// Decides whether to run another attempt after `error` on `attempt`.
    ///
    /// For 429 responses, the upstream `Retry-After` wins whenever it is
    /// longer than the computed backoff.
    pub fn decide(
        &self,
        attempt: u32,
        error: &DispatchError,
        retry_after: Option<Duration>,
    ) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision {
                retry: false,
                delay: Duration::ZERO,
                reason: format!("{} is not retryable", error.kind()),
            };
        }

        if attempt >= self.max_attempts() {
            return RetryDecision {
                retry: false,
                delay: Duration::ZERO,
                reason: format!("retry budget exhausted after {attempt} attempts"),
            };
        }

        let mut delay = self.backoff(attempt);
        if let Some(upstream) = retry_after {
            if upstream > delay {
                delay = upstream;
            }
        }

        RetryDecision {
            retry: true,
            delay,
            reason: format!("{} on attempt {attempt}", error.kind()),
        }
    }
}

/// The retry controller's verdict for one failed attempt.
#[derive(Debug, Clone)]
pub struct RetryDecision {
    pub retry: bool,
    pub delay: Duration,
    pub reason: String,
}

/// Parses a `Retry-After` header value: either delta-seconds or an
/// HTTP-date. Unparseable values yield `None` and the computed backoff
/// stands alone.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let trimmed = value.trim();

    if let Ok(seconds) = trimmed.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    if let Ok(date) = chrono::DateTime::parse_from_rfc2822(trimmed) {
        let target = date.with_timezone(&chrono::Utc);
        let now = chrono::Utc::now();
        if target > now {
            if let Ok(secs) = u64::try_from((target - now).num_seconds()) {
                return Some(Duration::from_secs(secs));
            }
        }
        return Some(Duration::ZERO);
    }

    warn!(value = trimmed, "unparseable Retry-After header");
    None
}
