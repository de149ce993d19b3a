//! Bounded retry with a fixed delay

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::config::RetryConfig;

/// How many times to retry and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt, so `retries + 1` attempts in total
    pub retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            delay: Duration::from_millis(333),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            retries: config.retries,
            delay: config.delay(),
        }
    }
}

/// Every attempt was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhausted {
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        self.retries + 1
    }

    /// Run `attempt` until `accept` approves its output or the attempts run out.
    ///
    /// `attempt` receives the zero-based attempt number. The delay is only slept
    /// between attempts, never after the last one.
    pub async fn run<T, F, Fut, P>(&self, mut attempt: F, accept: P) -> Result<T, Exhausted>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = T>,
        P: Fn(&T) -> bool,
    {
        let mut count = 0;
        loop {
            let outcome = attempt(count).await;
            if accept(&outcome) {
                return Ok(outcome);
            }

            if count >= self.retries {
                return Err(Exhausted { attempts: count + 1 });
            }

            debug!("Attempt {}/{} rejected, retrying in {:?}", count + 1, self.max_attempts(), self.delay);
            tokio::time::sleep(self.delay).await;
            count += 1;
        }
    }
}
