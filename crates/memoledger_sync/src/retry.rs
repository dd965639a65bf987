//! Retry with exponential backoff.

use crate::config::RetryConfig;
use crate::error::{ErrorKind, OperationError, OperationResult};
use crate::operation::OperationId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Message fragments that mark an unclassified error as transient.
const TRANSIENT_MARKERS: &[&str] = &[
    "network",
    "timeout",
    "timed out",
    "unavailable",
    "connection refused",
    "econnrefused",
    "502",
    "503",
    "504",
];

/// Retry counters, as reported by [`RetryPolicy::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryStats {
    /// Backoff sleeps taken.
    pub retries: u64,
    /// Calls that failed after spending every retry.
    pub exhausted: u64,
    /// Calls that failed with a non-retryable error.
    pub permanent_failures: u64,
}

/// Runs work with bounded retries and exponential backoff.
#[derive(Debug)]
pub struct RetryPolicy {
    config: RetryConfig,
    attempts: Mutex<HashMap<OperationId, u32>>,
    retries: AtomicU64,
    exhausted: AtomicU64,
    permanent_failures: AtomicU64,
}

impl RetryPolicy {
    /// Creates a policy.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            attempts: Mutex::new(HashMap::new()),
            retries: AtomicU64::new(0),
            exhausted: AtomicU64::new(0),
            permanent_failures: AtomicU64::new(0),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Returns the retry budget.
    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Runs `run` until it succeeds, fails permanently, or the retry budget
    /// is spent.
    ///
    /// Attempts are numbered from `start_attempt`, so an offline-queue entry
    /// that already spent part of its budget resumes where it left off. After
    /// a retryable failure on attempt `a < max_retries` the policy sleeps
    /// `delay_for_attempt(a)` and tries again.
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        name: &str,
        id: OperationId,
        start_attempt: u32,
        run: F,
    ) -> OperationResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = OperationResult<T>>,
    {
        let mut attempt = start_attempt;
        loop {
            self.attempts.lock().insert(id, attempt);

            let err = match run().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !self.is_retryable_error(&err) {
                self.permanent_failures.fetch_add(1, Ordering::Relaxed);
                debug!(operation = name, %id, attempt, error = %err, "non-retryable failure");
                return Err(err);
            }

            if attempt >= self.config.max_retries {
                self.exhausted.fetch_add(1, Ordering::Relaxed);
                warn!(operation = name, %id, attempt, error = %err, "retries exhausted");
                return Err(err);
            }

            let delay = self.calculate_backoff_delay(attempt);
            warn!(
                operation = name,
                %id,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient failure, retrying"
            );
            self.retries.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }

    /// Returns true if `err` is worth retrying.
    ///
    /// Transient errors always are. Unclassified errors are matched against
    /// the transient vocabulary; validation, not-found, conflict and
    /// permission errors never are.
    pub fn is_retryable_error(&self, err: &OperationError) -> bool {
        match err.kind() {
            ErrorKind::Transient => true,
            ErrorKind::Other => {
                let message = err.message().to_lowercase();
                TRANSIENT_MARKERS.iter().any(|m| message.contains(m))
            }
            _ => false,
        }
    }

    /// Delay after a failed attempt.
    pub fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        self.config.delay_for_attempt(attempt)
    }

    /// Returns the last attempt number started for `id`.
    pub fn attempts(&self, id: OperationId) -> Option<u32> {
        self.attempts.lock().get(&id).copied()
    }

    /// Forgets attempt bookkeeping for `id`.
    pub fn clear(&self, id: OperationId) {
        self.attempts.lock().remove(&id);
    }

    /// Returns the retry counters.
    pub fn stats(&self) -> RetryStats {
        RetryStats {
            retries: self.retries.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
            permanent_failures: self.permanent_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Arc;
    use tokio::time::Instant;

    type Attempt = std::pin::Pin<Box<dyn Future<Output = OperationResult<u32>> + Send>>;

    fn failing_until(
        calls: Arc<AtomicU32>,
        successes_after: u32,
        error: OperationError,
    ) -> impl Fn() -> Attempt {
        move || -> Attempt {
            let calls = Arc::clone(&calls);
            let error = error.clone();
            Box::pin(async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n > successes_after {
                    Ok(n)
                } else {
                    Err(error)
                }
            })
        }
    }

    #[test]
    fn classifies_errors() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retryable_error(&OperationError::transient("x")));
        assert!(policy.is_retryable_error(&OperationError::other("Network request failed")));
        assert!(policy.is_retryable_error(&OperationError::other("ECONNREFUSED 10.0.0.1")));
        assert!(policy.is_retryable_error(&OperationError::other("HTTP 503")));
        assert!(!policy.is_retryable_error(&OperationError::other("bad gateway config")));
        assert!(!policy.is_retryable_error(&OperationError::Validation(
            "network field missing".into()
        )));
        assert!(!policy.is_retryable_error(&OperationError::Permission("timeout".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result = policy
            .execute_with_retry(
                "op",
                OperationId::new(),
                0,
                failing_until(calls.clone(), 2, OperationError::transient("timeout")),
            )
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_millis(3000));
        assert_eq!(policy.stats().retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_budget() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));
        let id = OperationId::new();
        let started = Instant::now();

        let result = policy
            .execute_with_retry(
                "op",
                id,
                0,
                failing_until(calls.clone(), u32::MAX, OperationError::transient("down")),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_millis(1000 + 2000 + 4000));
        assert_eq!(policy.attempts(id), Some(3));
        assert_eq!(policy.stats().exhausted, 1);

        policy.clear(id);
        assert_eq!(policy.attempts(id), None);
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failure_is_not_retried() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result = policy
            .execute_with_retry(
                "op",
                OperationId::new(),
                0,
                failing_until(calls.clone(), u32::MAX, OperationError::Validation("amount".into())),
            )
            .await;

        assert_eq!(result, Err(OperationError::Validation("amount".into())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(policy.stats().permanent_failures, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn resumes_from_start_attempt() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let result = policy
            .execute_with_retry(
                "op",
                OperationId::new(),
                2,
                failing_until(calls.clone(), u32::MAX, OperationError::transient("down")),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(started.elapsed(), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn no_retry_config_runs_once() {
        let policy = RetryPolicy::new(RetryConfig::no_retry());
        let calls = Arc::new(AtomicU32::new(0));

        let result = policy
            .execute_with_retry(
                "op",
                OperationId::new(),
                0,
                failing_until(calls.clone(), u32::MAX, OperationError::transient("down")),
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
