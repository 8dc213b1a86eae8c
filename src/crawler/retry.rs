//! Retry utilities for upstream requests
//!
//! A `RetryPolicy` re-invokes an async operation until it succeeds or the
//! attempt ceiling is reached, sleeping between attempts. Two back-off shapes
//! are supported: a fixed delay, and a delay that grows linearly with the
//! attempt number.

use crate::config::RetryConfig;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Delay shape between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Always wait the base delay
    Fixed,

    /// Wait `attempt * base delay` after the given failed attempt
    Linear,
}

/// Attempt ceiling plus delay shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    backoff: Backoff,
}

impl RetryPolicy {
    /// Creates a policy
    ///
    /// `max_attempts` counts every invocation including the first, and is
    /// raised to 1 if given as 0.
    pub fn new(max_attempts: u32, base_delay: Duration, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            backoff,
        }
    }

    /// Fixed-delay policy from configuration
    pub fn fixed(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay(), Backoff::Fixed)
    }

    /// Linear back-off policy from configuration
    pub fn linear(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay(), Backoff::Linear)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.base_delay,
            Backoff::Linear => self.base_delay.saturating_mul(attempt.max(1)),
        }
    }

    /// Runs `operation`, retrying every failure
    ///
    /// The operation receives the 1-based attempt number. Returns the first
    /// success, or the last error once the ceiling is reached.
    pub async fn run<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.run_if(operation, |_| true).await
    }

    /// Runs `operation`, retrying only failures `should_retry` accepts
    ///
    /// A rejected error is returned immediately without further attempts.
    pub async fn run_if<T, E, F, Fut, P>(&self, mut operation: F, should_retry: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!(attempt = attempt, "Operation succeeded after retry");
                    }
                    return Ok(result);
                }
                Err(e) => {
                    if attempt >= self.max_attempts || !should_retry(&e) {
                        warn!(
                            attempt = attempt,
                            max_attempts = self.max_attempts,
                            error = %e,
                            "Operation failed, giving up"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Operation failed, retrying after delay"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
