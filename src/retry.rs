//! Retry executor with exponential backoff
//!
//! Wraps any fallible async operation. Errors are classified through
//! [`Classify`] into retryable (rate limiting) or fatal; only retryable
//! errors are retried, with `min(base * 2^attempt + jitter, max)` delays.
//! The executor knows nothing about any particular provider.

use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Outcome of classifying an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    Retryable,
    Fatal,
}

/// Text markers that signal rate limiting when no status code is available
const RATE_LIMIT_MARKERS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "overloaded",
];

impl RetryClass {
    /// Classify from an optional HTTP status and the error text.
    ///
    /// The status wins when present; the text markers are a fallback for
    /// errors that never carried one.
    pub fn from_signal(status: Option<u16>, message: &str) -> Self {
        match status {
            Some(429) | Some(529) => RetryClass::Retryable,
            Some(_) if !looks_rate_limited(message) => RetryClass::Fatal,
            _ if looks_rate_limited(message) => RetryClass::Retryable,
            _ => RetryClass::Fatal,
        }
    }
}

fn looks_rate_limited(message: &str) -> bool {
    let lowered = message.to_lowercase();
    RATE_LIMIT_MARKERS.iter().any(|m| lowered.contains(m))
}

/// Errors that the retry executor can classify
pub trait Classify {
    fn classify(&self) -> RetryClass;

    /// Server-provided minimum wait, if any
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Terminal failure of a retried operation
#[derive(Error, Debug)]
pub enum RetryError<E: fmt::Display + fmt::Debug> {
    #[error("non-retryable failure: {0}")]
    Fatal(E),

    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },

    #[error("cancelled while waiting to retry")]
    Cancelled,
}

/// Backoff parameters
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first call
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry that follows failed attempt `attempt` (0-based)
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let base_ms = self.base_delay.as_millis() as u64;
        let exponential = base_ms.saturating_mul(1u64 << attempt.min(20));
        let jitter = if base_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=base_ms)
        };

        let mut delay = Duration::from_millis(exponential.saturating_add(jitter));
        if let Some(hint) = retry_after {
            delay = delay.max(hint);
        }
        delay.min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails fatally, exhausts the policy, or
/// `cancel` fires. An attempt in progress is dropped when `cancel` fires.
///
/// The closure receives the 1-based attempt number.
pub async fn execute<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> std::result::Result<T, RetryError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Classify + fmt::Display + fmt::Debug,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            result = operation(attempt + 1) => result,
        };

        let err = match result {
            Ok(value) => {
                if attempt > 0 {
                    debug!(attempt = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if err.classify() == RetryClass::Fatal {
            return Err(RetryError::Fatal(err));
        }

        if attempt + 1 >= max_attempts {
            warn!(attempts = max_attempts, error = %err, "Retry attempts exhausted");
            return Err(RetryError::Exhausted {
                attempts: max_attempts,
                last_error: err,
            });
        }

        let delay = policy.delay_for(attempt, err.retry_after());
        warn!(
            attempt = attempt + 1,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "Rate limited, backing off before retry"
        );

        tokio::select! {
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum TestError {
        RateLimited,
        Auth,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                TestError::RateLimited => write!(f, "429 rate limited"),
                TestError::Auth => write!(f, "401 unauthorized"),
            }
        }
    }

    impl Classify for TestError {
        fn classify(&self) -> RetryClass {
            match self {
                TestError::RateLimited => RetryClass::Retryable,
                TestError::Auth => RetryClass::Fatal,
            }
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result = execute(&fast_policy(3), &cancel, |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(TestError::RateLimited)
                } else {
                    Ok("done")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_fatal_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result: std::result::Result<(), _> = execute(&fast_policy(3), &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::Auth) }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Fatal(TestError::Auth))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result: std::result::Result<(), _> = execute(&fast_policy(3), &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::RateLimited) }
        })
        .await;

        match result {
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(last_error, TestError::RateLimited));
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cancel_during_backoff() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(60),
        };
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result: std::result::Result<(), _> = execute(&policy, &cancel, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(TestError::RateLimited) }
        })
        .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_during_attempt() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let result: std::result::Result<(), RetryError<TestError>> =
            execute(&fast_policy(3), &cancel, |_| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_already_cancelled_skips_operation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);

        let result: std::result::Result<(), RetryError<TestError>> =
            execute(&fast_policy(3), &cancel, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert!(matches!(result, Err(RetryError::Cancelled)));
        // the closure runs to build the future, which is never polled
        assert!(calls.load(Ordering::SeqCst) <= 1);
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(2),
        };

        assert!(policy.delay_for(0, None) <= Duration::from_millis(1000));
        assert_eq!(policy.delay_for(8, None), Duration::from_secs(2));
        assert_eq!(
            policy.delay_for(0, Some(Duration::from_secs(90))),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn test_classification_prefers_status() {
        assert_eq!(RetryClass::from_signal(Some(429), ""), RetryClass::Retryable);
        assert_eq!(RetryClass::from_signal(Some(401), "invalid x-api-key"), RetryClass::Fatal);
        assert_eq!(
            RetryClass::from_signal(None, "Rate limit reached for requests"),
            RetryClass::Retryable
        );
        assert_eq!(RetryClass::from_signal(None, "connection reset"), RetryClass::Fatal);
    }
}
