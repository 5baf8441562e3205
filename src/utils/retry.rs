// src/utils/retry.rs

//! Fixed-attempt, fixed-delay retry.

use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included (at least 1).
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        let secs = config.retry_backoff_secs;
        let delay = if secs.is_finite() && secs > 0.0 {
            Duration::from_secs_f64(secs)
        } else {
            Duration::ZERO
        };
        Self::new(config.retry_count, delay)
    }

    /// Retry `op` on any error; the last error is returned once attempts
    /// run out.
    pub async fn run<T, F, Fut>(&self, label: &str, op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_if(label, op, |_| true).await
    }

    /// Retry `op` only while `should_retry` accepts the error.
    pub async fn run_if<T, F, Fut, P>(&self, label: &str, mut op: F, should_retry: P) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&AppError) -> bool,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt >= self.max_attempts || !should_retry(&error) {
                        return Err(error);
                    }
                    log::warn!(
                        "{label}: attempt {attempt}/{} failed: {error}",
                        self.max_attempts
                    );
                    attempt += 1;
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }
    }
}
