//! Bounded waits and retry policy shared by every navigation step.

use crate::error::AutomationError;
use std::future::Future;
use std::time::{Duration, Instant};
use thirtyfour::prelude::*;
use tracing::warn;

/// Interval between element probes.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Explicit attempt count and backoff, parameterized per call site.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first.
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Policy for transient navigation races: 3 attempts, short backoff.
    pub const NAVIGATION: Self = Self {
        attempts: 3,
        backoff: Duration::from_secs(2),
    };
}

/// Polls for an element until it appears or the bound elapses.
pub async fn wait_for_element(
    driver: &WebDriver,
    by: By,
    timeout: Duration,
    what: &str,
) -> Result<WebElement, AutomationError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Ok(elem) = driver.find(by.clone()).await {
            return Ok(elem);
        }
        if Instant::now() >= deadline {
            return Err(AutomationError::Timeout {
                what: what.to_string(),
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Polls an arbitrary probe until it yields a value or the bound elapses.
pub async fn wait_until<T, Fut, F>(
    timeout: Duration,
    what: &str,
    mut probe: F,
) -> Result<T, AutomationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = probe().await {
            return Ok(value);
        }
        if Instant::now() >= deadline {
            return Err(AutomationError::Timeout {
                what: what.to_string(),
            });
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Runs an operation under a bounded retry policy, sleeping the fixed
/// backoff between attempts and returning the last error when exhausted.
pub async fn with_retries<T, Fut, F>(
    policy: RetryPolicy,
    what: &str,
    mut op: F,
) -> Result<T, AutomationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AutomationError>>,
{
    let mut last_err = None;
    for attempt in 1..=policy.attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!("{what} failed (attempt {attempt}/{}): {err}", policy.attempts);
                last_err = Some(err);
                if attempt < policy.attempts {
                    tokio::time::sleep(policy.backoff).await;
                }
            }
        }
    }
    Err(last_err.unwrap_or_else(|| AutomationError::Automation(format!("{what} failed"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn wait_until_returns_first_hit() {
        let calls = AtomicU32::new(0);
        let value = wait_until(Duration::from_secs(5), "probe", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { (n >= 2).then_some(n) }
        })
        .await
        .unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test]
    async fn wait_until_times_out() {
        let err = wait_until(Duration::from_millis(50), "never", || async { None::<u32> }).await;
        assert!(matches!(err, Err(AutomationError::Timeout { .. })));
    }

    #[tokio::test]
    async fn retries_stop_after_bound() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(1),
        };
        let result: Result<(), _> = with_retries(policy, "op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AutomationError::Automation("nope".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retries_return_first_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            attempts: 3,
            backoff: Duration::from_millis(1),
        };
        let value = with_retries(policy, "op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(AutomationError::Automation("transient".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 1);
    }
}
