use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Bounded retry with a fixed delay between attempts.
///
/// Only the transient-failure-prone calls (currently the audio download) go
/// through this; collaborator API errors fail the episode on first error.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds or `max_attempts` is exhausted, sleeping
    /// `delay` between attempts. The last error is returned on exhaustion.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts => {
                    warn!(
                        "{} interrupted ({}), retrying in {}s (attempt {}/{})",
                        what,
                        e,
                        self.delay.as_secs(),
                        attempt,
                        self.max_attempts
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_on_a_later_attempt() {
        let policy = RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        };
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> = policy
            .run("test op", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Err("connection reset".to_string())
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let policy = RetryPolicy {
            max_attempts: 3,
            delay: Duration::ZERO,
        };
        let calls = AtomicU32::new(0);
        let result: Result<(), String> = policy
            .run("test op", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("failure {attempt}")) }
            })
            .await;
        assert_eq!(result.unwrap_err(), "failure 3");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
