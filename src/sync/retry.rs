//! Retry policy for remote-store probes
//!
//! Probes are retried on any transport failure. The default policy fires the
//! next attempt immediately; a backoff policy can be configured instead.

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;

use crate::error::SyncTransportFailure;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    /// Three attempts, no delay between them
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }
}

impl RetryConfig {
    /// Exponential backoff with jitter, for hosts that need write spreading
    pub fn backoff() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }

    /// A single attempt
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` until it succeeds or the attempt ceiling is reached
    ///
    /// The closure receives the 1-based attempt number. On success returns the
    /// number of attempts made; on exhaustion returns the last failure.
    pub async fn execute<F, Fut>(
        &self,
        label: &str,
        operation: F,
    ) -> Result<u32, SyncTransportFailure>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<(), SyncTransportFailure>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            debug!("[{}] probe attempt {}/{}", label, attempt, max_attempts);

            match operation(attempt).await {
                Ok(()) => {
                    if attempt > 1 {
                        debug!("[{}] probe delivered after {} attempts", label, attempt);
                    }
                    return Ok(attempt);
                }
                Err(failure) => {
                    if attempt >= max_attempts {
                        return Err(failure);
                    }

                    warn!("[{}] probe attempt {} failed: {}", label, attempt, failure);

                    let delay = self.calculate_delay(attempt);
                    if !delay.is_zero() {
                        debug!("[{}] waiting {:?} before retry", label, delay);
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Exponential backoff delay with optional jitter
    fn calculate_delay(&self, attempt: u32) -> Duration {
        if self.config.base_delay.is_zero() {
            return Duration::ZERO;
        }

        let delay_ms = (self.config.base_delay.as_millis() as f64)
            * self.config.backoff_multiplier.powi(attempt as i32 - 1);

        let mut delay = Duration::from_millis(delay_ms as u64);

        if delay > self.config.max_delay {
            delay = self.config.max_delay;
        }

        if self.config.jitter {
            let jitter_factor = rand::thread_rng().gen_range(0.5..=1.5);
            let jittered_ms = (delay.as_millis() as f64 * jitter_factor) as u64;
            delay = Duration::from_millis(jittered_ms);
        }

        delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}
