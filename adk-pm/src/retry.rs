use crate::error::{PmError, Result};
use crate::models::PublishConfig;
use std::{future::Future, time::Duration};

/// Retry budget for calls to external systems.
///
/// Each attempt runs under `timeout`; an elapsed timeout counts as a
/// retryable failure.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub enabled: bool,
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f32,
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 2,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
            backoff_multiplier: 2.0,
            timeout: Duration::from_secs(10),
        }
    }
}

impl From<&PublishConfig> for RetryPolicy {
    fn from(config: &PublishConfig) -> Self {
        Self {
            enabled: true,
            max_retries: config.max_retries,
            initial_delay: Duration::from_millis(config.initial_backoff_ms),
            max_delay: Duration::from_millis(config.max_backoff_ms),
            backoff_multiplier: 2.0,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::default() }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[must_use]
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    #[must_use]
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[must_use]
pub fn is_retryable_status_code(status_code: u16) -> bool {
    matches!(status_code, 408 | 429 | 500 | 502 | 503 | 504)
}

#[must_use]
pub fn is_retryable_error_message(message: &str) -> bool {
    let normalized = message.to_ascii_uppercase();
    normalized.contains("429")
        || normalized.contains("408")
        || normalized.contains("500")
        || normalized.contains("502")
        || normalized.contains("503")
        || normalized.contains("504")
        || normalized.contains("RATE LIMIT")
        || normalized.contains("TOO MANY REQUESTS")
        || normalized.contains("UNAVAILABLE")
        || normalized.contains("TIMEOUT")
        || normalized.contains("TIMED OUT")
        || normalized.contains("CONNECTION")
}

/// Publish errors worth another attempt.
#[must_use]
pub fn is_retryable_publish_error(error: &PmError) -> bool {
    match error {
        PmError::Publish { message, .. } => is_retryable_error_message(message),
        _ => false,
    }
}

fn next_retry_delay(current: Duration, policy: &RetryPolicy) -> Duration {
    if current >= policy.max_delay {
        return policy.max_delay;
    }

    let multiplier = policy.backoff_multiplier.max(1.0) as f64;
    let scaled = Duration::from_secs_f64(current.as_secs_f64() * multiplier);
    scaled.min(policy.max_delay)
}

/// Outcome of a retried operation together with the attempts it took.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: Result<T>,
    pub attempts: u32,
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the retry budget runs out.
pub async fn execute_with_retry<T, Op, Fut, Classify>(
    policy: &RetryPolicy,
    target: &str,
    classify_error: Classify,
    mut operation: Op,
) -> RetryOutcome<T>
where
    Op: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    Classify: Fn(&PmError) -> bool,
{
    let mut attempt: u32 = 0;
    let mut delay = policy.initial_delay;

    loop {
        let result = match tokio::time::timeout(policy.timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(PmError::publish(
                target,
                format!("timed out after {}ms", policy.timeout.as_millis()),
            )),
        };
        attempt += 1;

        match result {
            Ok(value) => {
                return RetryOutcome { result: Ok(value), attempts: attempt };
            }
            Err(error)
                if policy.enabled && attempt <= policy.max_retries && classify_error(&error) =>
            {
                tracing::warn!(
                    attempt = attempt,
                    max_retries = policy.max_retries,
                    delay_ms = delay.as_millis(),
                    error = %error,
                    "External call failed with retryable error; retrying"
                );
                tokio::time::sleep(delay).await;
                delay = next_retry_delay(delay, policy);
            }
            Err(error) => {
                return RetryOutcome { result: Err(error), attempts: attempt };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_retries(max_retries)
            .with_initial_delay(Duration::ZERO)
            .with_max_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn execute_with_retry_retries_when_classified_retryable() {
        let attempts = Arc::new(AtomicU32::new(0));

        let outcome = execute_with_retry(&fast_policy(2), "issue_tracker", is_retryable_publish_error, || {
            let attempts = Arc::clone(&attempts);
            async move {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                if attempt < 2 {
                    return Err(PmError::publish("issue_tracker", "HTTP 503 unavailable"));
                }
                Ok("ok")
            }
        })
        .await;

        assert_eq!(outcome.result.expect("should succeed after retries"), "ok");
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test]
    async fn execute_with_retry_gives_up_after_budget() {
        let attempts = Arc::new(AtomicU32::new(0));

        let outcome = execute_with_retry(&fast_policy(2), "whiteboard", is_retryable_publish_error, || {
            let attempts = Arc::clone(&attempts);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(PmError::publish("whiteboard", "HTTP 502 bad gateway"))
            }
        })
        .await;

        assert!(outcome.result.is_err());
        assert_eq!(outcome.attempts, 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn execute_with_retry_stops_on_non_retryable_error() {
        let attempts = Arc::new(AtomicU32::new(0));

        let outcome = execute_with_retry(&fast_policy(3), "document_store", is_retryable_publish_error, || {
            let attempts = Arc::clone(&attempts);
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(PmError::publish("document_store", "HTTP 401 unauthorized"))
            }
        })
        .await;

        assert!(matches!(outcome.result, Err(PmError::Publish { .. })));
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn execute_with_retry_respects_disabled_policy() {
        let policy = RetryPolicy::disabled().with_max_retries(10);

        let outcome = execute_with_retry(&policy, "document_store", is_retryable_publish_error, || async {
            Err::<(), _>(PmError::publish("document_store", "HTTP 429 too many requests"))
        })
        .await;

        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn execute_with_retry_treats_timeout_as_failure() {
        let policy = fast_policy(1).with_timeout(Duration::from_millis(50));

        let outcome = execute_with_retry(&policy, "whiteboard", is_retryable_publish_error, || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;

        let error = outcome.result.expect_err("slow call should time out");
        assert!(error.to_string().contains("timed out"));
        assert_eq!(outcome.attempts, 2);
    }

    #[test]
    fn retryable_status_code_matches_transient_errors() {
        assert!(is_retryable_status_code(429));
        assert!(is_retryable_status_code(503));
        assert!(!is_retryable_status_code(400));
    }

    #[test]
    fn policy_from_publish_config() {
        let config = PublishConfig {
            max_retries: 4,
            timeout_ms: 1500,
            ..Default::default()
        };
        let policy = RetryPolicy::from(&config);
        assert_eq!(policy.max_retries, 4);
        assert_eq!(policy.timeout, Duration::from_millis(1500));
    }
}
