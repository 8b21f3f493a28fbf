//! Retry/backpressure policy for idempotent mutating calls.
//!
//! A timed-out call is retried after a fixed backoff for as long as the
//! request window is open. Any other error ends the attempt so the caller
//! can roll back its tentative state.

use std::future::Future;
use std::time::Duration;

use campus_client::ApiError;
use campus_core::ledger::Ledger;

use crate::deadline::Deadline;

/// Result of driving a call through [`RetryPolicy::run`].
#[derive(Debug)]
pub enum Attempt<T> {
    Done(T),
    /// `409 Conflict` on a creation call. Carries the response body.
    AlreadyExists(String),
    Failed(ApiError),
    /// The window closed before the call succeeded.
    Expired,
}

impl<T> Attempt<T> {
    /// Whether the server-side effect is known to be in place.
    pub fn is_committed(&self) -> bool {
        matches!(self, Attempt::Done(_) | Attempt::AlreadyExists(_))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub backoff: Duration,
    /// Treat `409 Conflict` as "already exists" instead of a failure.
    pub conflict_is_success: bool,
}

impl RetryPolicy {
    /// For idempotent updates such as course registration.
    pub fn idempotent(backoff: Duration) -> Self {
        Self {
            backoff,
            conflict_is_success: false,
        }
    }

    /// For creation calls, where `409` means the entity is already there.
    pub fn creation(backoff: Duration) -> Self {
        Self {
            backoff,
            conflict_is_success: true,
        }
    }

    /// Drive `call` until it succeeds, fails with a non-timeout error, or the deadline passes.
    pub async fn run<T, F, Fut>(&self, deadline: &Deadline, ledger: &Ledger, mut call: F) -> Attempt<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 0u32;
        loop {
            if deadline.is_expired() {
                return Attempt::Expired;
            }
            attempt += 1;
            match call().await {
                Ok(value) => return Attempt::Done(value),
                Err(e) if e.is_timeout() => {
                    ledger.add_timeout();
                    tracing::debug!(attempt, error = %e, "Retrying after timeout");
                    if !deadline.sleep(self.backoff).await {
                        return Attempt::Expired;
                    }
                }
                Err(e) if self.conflict_is_success && e.is_conflict() => {
                    return Attempt::AlreadyExists(e.body().unwrap_or_default().to_string());
                }
                Err(e) => return Attempt::Failed(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_util::sync::CancellationToken;

    fn timeout() -> ApiError {
        ApiError::Timeout {
            method: "POST".into(),
            path: "/api/courses".into(),
        }
    }

    fn status(code: u16) -> ApiError {
        ApiError::Status {
            method: "POST".into(),
            path: "/api/courses".into(),
            status: code,
            body: r#"{"id":"c1"}"#.into(),
        }
    }

    fn deadline(secs: u64) -> Deadline {
        Deadline::after(Duration::from_secs(secs), CancellationToken::new())
    }

    #[tokio::test(start_paused = true)]
    async fn retries_timeouts_until_success() {
        let ledger = Ledger::new();
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::idempotent(Duration::from_millis(100));

        let outcome = policy
            .run(&deadline(60), &ledger, move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(timeout())
                } else {
                    Ok(42)
                }
            })
            .await;

        assert_matches!(outcome, Attempt::Done(42));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(ledger.tally().timeouts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn other_errors_end_the_attempt() {
        let ledger = Ledger::new();
        let policy = RetryPolicy::idempotent(Duration::from_millis(100));
        let outcome: Attempt<()> = policy
            .run(&deadline(60), &ledger, || async { Err(status(500)) })
            .await;
        assert_matches!(outcome, Attempt::Failed(ApiError::Status { status: 500, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn conflict_is_success_only_for_creation() {
        let ledger = Ledger::new();
        let creation: Attempt<()> = RetryPolicy::creation(Duration::from_millis(100))
            .run(&deadline(60), &ledger, || async { Err(status(409)) })
            .await;
        assert_matches!(creation, Attempt::AlreadyExists(ref body) if body.contains("c1"));
        assert!(creation.is_committed());

        let update: Attempt<()> = RetryPolicy::idempotent(Duration::from_millis(100))
            .run(&deadline(60), &ledger, || async { Err(status(409)) })
            .await;
        assert_matches!(update, Attempt::Failed(_));
    }

    #[tokio::test(start_paused = true)]
    async fn endless_timeouts_stop_at_the_deadline() {
        let ledger = Ledger::new();
        let outcome: Attempt<()> = RetryPolicy::idempotent(Duration::from_millis(100))
            .run(&deadline(1), &ledger, || async { Err(timeout()) })
            .await;
        assert_matches!(outcome, Attempt::Expired);
        assert!(ledger.tally().timeouts >= 9);
    }
}
