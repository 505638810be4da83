//! Timeout and retry policy around backend calls
//!
//! With the default settings a call gets one attempt and a 60 second limit.

use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::BackendError;
use crate::logger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallPolicy {
    pub timeout: Option<Duration>,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(60)),
            max_retries: 0,
            backoff: Duration::from_millis(500),
        }
    }
}

impl CallPolicy {
    pub const fn from_config(cfg: &RetryConfig) -> Self {
        Self {
            timeout: if cfg.timeout_secs == 0 {
                None
            } else {
                Some(Duration::from_secs(cfg.timeout_secs))
            },
            max_retries: cfg.max_retries,
            backoff: Duration::from_millis(cfg.backoff_ms),
        }
    }

    /// Run `call`, retrying retryable failures with doubling backoff
    pub async fn run<T, F, Fut>(
        &self,
        backend: &'static str,
        operation: &'static str,
        mut call: F,
    ) -> Result<T, BackendError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        let mut attempt = 0;
        let mut delay = self.backoff;

        loop {
            let outcome = match self.timeout {
                Some(limit) => tokio::time::timeout(limit, call())
                    .await
                    .unwrap_or_else(|_| {
                        Err(BackendError::Transport {
                            backend,
                            phase: operation,
                            message: format!("timed out after {}ms", limit.as_millis()),
                        })
                    }),
                None => call().await,
            };

            match outcome {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    logger::log_warning(&format!(
                        "{backend} {operation} failed (attempt {attempt}/{}): {e}; retrying in {}ms",
                        self.max_retries + 1,
                        delay.as_millis()
                    ));
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                other => return other,
            }
        }
    }
}
