//! Backoff for transient provider failures
//!
//! The consolidation engine never retries on its own; its per-call timeout
//! wraps whatever a provider does here.

use std::time::Duration;

/// Backoff policy for a provider's HTTP calls
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts including the first (at least 1)
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Stretch each delay by up to 25%
    pub add_jitter: bool,
    /// Status codes treated as transient
    pub retryable_status_codes: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            add_jitter: true,
            retryable_status_codes: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// Single attempt, no backoff
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Wait before retry `retry` (0 is the first retry)
    pub fn delay_for_attempt(&self, retry: usize) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let millis = (self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent))
            .min(self.max_delay.as_millis() as f64);

        let stretched = if self.add_jitter {
            millis * (1.0 + 0.25 * clock_fraction())
        } else {
            millis
        };
        Duration::from_millis(stretched as u64)
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }
}

/// Value in [0, 1) from the clock's sub-second nanos
fn clock_fraction() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    f64::from(nanos % 1_000) / 1_000.0
}

/// Run `operation` until it succeeds, fails with an error `is_transient`
/// rejects, or `config.max_attempts` is used up. The last error is returned.
pub async fn with_retry_when<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation: F,
    is_transient: P,
) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if attempt >= max_attempts || !is_transient(&err) {
            return Err(err);
        }

        let delay = config.delay_for_attempt(attempt - 1);
        tracing::debug!(
            "Generation attempt {}/{} failed, retrying in {:?}: {}",
            attempt,
            max_attempts,
            delay,
            err
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}
