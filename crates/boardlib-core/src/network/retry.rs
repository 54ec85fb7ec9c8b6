//! Retries for transient transfer failures.
//!
//! Only errors for which [`BoardlibError::is_retryable`] holds are retried.
//! The wait between attempts races the cancellation token, so a cancelled
//! download never sits out a backoff delay.

use crate::cancel::CancellationToken;
use crate::config::NetworkConfig;
use crate::error::{BoardlibError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff schedule for downloads.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Spread each delay over `[0.5, 1.5)` of its nominal value.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: NetworkConfig::MAX_RETRIES,
            base_delay: NetworkConfig::RETRY_BASE_DELAY,
            max_delay: NetworkConfig::RETRY_MAX_DELAY,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// A schedule that makes exactly one attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Wait before attempt `failed + 1`, where `failed` counts the failed
    /// attempts so far (at least one).
    pub fn delay_after(&self, failed: u32) -> Duration {
        let doubled = self
            .base_delay
            .saturating_mul(1u32 << failed.saturating_sub(1).min(16));
        let nominal = doubled.min(self.max_delay);
        if !self.jitter {
            return nominal;
        }
        let factor: f64 = rand::rng().random_range(0.5..1.5);
        nominal.mul_f64(factor).min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails permanently, runs out of
/// attempts or `cancel` fires. The closure receives the 1-based attempt
/// number. Returns the last result and the number of attempts made.
pub async fn retry_async<F, Fut, T>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
) -> (Result<T>, u32)
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match operation(attempt).await {
            Ok(value) => return (Ok(value), attempt),
            Err(e) => e,
        };

        if !err.is_retryable() || cancel.is_cancelled() {
            debug!("Giving up after attempt {}: {}", attempt, err);
            return (Err(err), attempt);
        }
        if attempt >= config.max_attempts {
            warn!("All {} attempts failed, last error: {}", attempt, err);
            return (Err(err), attempt);
        }

        let delay = config.delay_after(attempt);
        warn!(
            "Attempt {}/{} failed: {}. Retrying in {:?}",
            attempt, config.max_attempts, err, delay
        );
        tokio::select! {
            _ = cancel.cancelled() => return (Err(BoardlibError::Cancelled), attempt),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
