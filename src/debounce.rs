//! Quiet-period debouncing for bursty triggers.
//!
//! A [`Debouncer`] runs an action only after its trigger has been quiet for a
//! configured period; re-triggering during the quiet period supersedes the
//! pending action. Used to hold back weather fetches while station
//! identifiers are still being typed, but carries no UI assumptions.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Runs the most recent action once its trigger goes quiet.
///
/// Each [`call`](Self::call) aborts the previously pending action (if it has
/// not fired yet) and schedules the new one after the quiet period. Dropping
/// the debouncer leaves an already-scheduled action running.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// Create a debouncer with the given quiet period.
    #[must_use]
    pub fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
        }
    }

    /// Schedule `action` to run after the quiet period, superseding any
    /// action scheduled earlier that has not fired yet.
    ///
    /// Must be called from within a tokio runtime.
    pub fn call<F, Fut>(&mut self, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }

        let quiet = self.quiet;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(quiet).await;
            action().await;
        }));
    }

    /// Cancel any pending action without scheduling a new one.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }

    /// Whether an action is currently scheduled and has not fired.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|p| !p.is_finished())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_action_fires_after_quiet_period() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(20));

        let counter = Arc::clone(&fired);
        debouncer.call(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rapid_calls_fire_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(40));

        for _ in 0..5 {
            let counter = Arc::clone(&fired);
            debouncer.call(move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancel_prevents_firing() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut debouncer = Debouncer::new(Duration::from_millis(20));

        let counter = Arc::clone(&fired);
        debouncer.call(move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        debouncer.cancel();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!debouncer.is_pending());
    }
}
