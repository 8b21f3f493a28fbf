//! The single request-window deadline shared by every task of a run.
//!
//! The deadline is passed explicitly to every workflow. Whether a new
//! action may start is a pure function of the deadline and a clock reading,
//! see [`Deadline::is_expired_at`].

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct Deadline {
    end: Instant,
    cancel: CancellationToken,
}

impl Deadline {
    /// A deadline `window` from now, also tripped by `cancel`.
    pub fn after(window: Duration, cancel: CancellationToken) -> Self {
        Self {
            end: Instant::now() + window,
            cancel,
        }
    }

    pub fn at(end: Instant, cancel: CancellationToken) -> Self {
        Self { end, cancel }
    }

    pub fn end(&self) -> Instant {
        self.end
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether no new action may start at `now`.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.end || self.cancel.is_cancelled()
    }

    /// Whether no new action may start right now. Check before every request.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub fn remaining(&self) -> Duration {
        self.end.saturating_duration_since(Instant::now())
    }

    /// Resolve when the window closes or the run is cancelled.
    pub async fn expired(&self) {
        tokio::select! {
            _ = tokio::time::sleep_until(self.end) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    /// Run `future` unless the deadline passes first.
    ///
    /// Returns `None` when the deadline won. A future that is already
    /// complete when the deadline has also passed still yields `None`.
    pub async fn race<F: Future>(&self, future: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.expired() => None,
            output = future => Some(output),
        }
    }

    /// Sleep for `duration`. Returns `false` if the deadline cut the sleep short.
    pub async fn sleep(&self, duration: Duration) -> bool {
        self.race(tokio::time::sleep(duration)).await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expiry_is_a_function_of_the_clock() {
        let deadline = Deadline::after(Duration::from_secs(10), CancellationToken::new());
        let start = Instant::now();
        assert!(!deadline.is_expired_at(start));
        assert!(!deadline.is_expired_at(start + Duration::from_secs(9)));
        assert!(deadline.is_expired_at(start + Duration::from_secs(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_expires_immediately() {
        let cancel = CancellationToken::new();
        let deadline = Deadline::after(Duration::from_secs(3600), cancel.clone());
        cancel.cancel();
        assert!(deadline.is_expired());
        deadline.expired().await;
    }

    #[tokio::test(start_paused = true)]
    async fn race_returns_none_after_the_deadline() {
        let deadline = Deadline::after(Duration::from_secs(1), CancellationToken::new());
        let slow = tokio::time::sleep(Duration::from_secs(5));
        assert!(deadline.race(slow).await.is_none());
        assert!(deadline.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn race_returns_output_within_the_window() {
        let deadline = Deadline::after(Duration::from_secs(5), CancellationToken::new());
        let fast = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            7
        };
        assert_eq!(deadline.race(fast).await, Some(7));
    }

    #[tokio::test(start_paused = true)]
    async fn sleep_is_cut_short() {
        let deadline = Deadline::after(Duration::from_millis(50), CancellationToken::new());
        assert!(deadline.sleep(Duration::from_millis(10)).await);
        assert!(!deadline.sleep(Duration::from_secs(1)).await);
    }
}
