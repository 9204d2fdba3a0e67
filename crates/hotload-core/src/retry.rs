//! Bounded retry with a fixed delay between attempts.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::LoaderConfig;
use crate::fetch::FetchOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

/// Final outcome of a retried operation plus the number of attempts made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retried {
    pub outcome: FetchOutcome,
    pub attempts: u32,
}

impl RetryPolicy {
    /// `max_retries` is the total attempt budget; zero is raised to one.
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self {
            max_retries: max_retries.max(1),
            delay,
        }
    }

    pub fn from_config(config: &LoaderConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay())
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `attempt` (called with the 1-based attempt number) until it
    /// succeeds or the budget is spent. Every non-success outcome is
    /// retried; the delay is slept only between attempts.
    pub async fn run<F, Fut>(&self, mut attempt: F) -> Retried
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = FetchOutcome>,
    {
        let mut n = 1;
        loop {
            let outcome = attempt(n).await;
            if outcome.is_success() {
                debug!(attempt = n, "attempt succeeded");
                return Retried {
                    outcome,
                    attempts: n,
                };
            }
            if n >= self.max_retries {
                warn!(attempts = n, last = %outcome, "retry budget exhausted");
                return Retried {
                    outcome,
                    attempts: n,
                };
            }
            debug!(
                attempt = n,
                max = self.max_retries,
                %outcome,
                delay_ms = self.delay.as_millis() as u64,
                "attempt failed; retrying"
            );
            tokio::time::sleep(self.delay).await;
            n += 1;
        }
    }
}
