// Deadline and cancellation shared by every adapter call an orchestrator issues.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::config::SyncConfig;

#[derive(Debug, Default)]
struct CancelState {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Cloneable cancellation handle. Every clone observes the same signal.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    state: Arc<CancelState>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::SeqCst);
        self.state.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called on any clone.
    pub async fn cancelled(&self) {
        loop {
            // Register before checking the flag so a concurrent cancel is not missed.
            let notified = self.state.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

/// Why a guarded call did not run to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    Cancelled,
    TimedOut(Duration),
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Upper bound on each individual adapter call.
    pub timeout: Option<Duration>,
    pub cancel: CancelSignal,
}

impl SyncOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            cancel: CancelSignal::new(),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::with_timeout(Duration::from_secs(config.timeout_secs))
    }

    /// Run `call` until it completes, the deadline passes, or the signal fires.
    /// On interruption the call future is dropped.
    pub async fn guard<F, T>(&self, call: F) -> Result<T, Interrupted>
    where
        F: Future<Output = T>,
    {
        match self.timeout {
            Some(limit) => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
                outcome = tokio::time::timeout(limit, call) => {
                    outcome.map_err(|_| Interrupted::TimedOut(limit))
                }
            },
            None => tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
                outcome = call => Ok(outcome),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_guard_passes_through_completed_call() {
        let options = SyncOptions::with_timeout(Duration::from_secs(1));
        assert_eq!(options.guard(async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn test_guard_times_out_slow_call() {
        let options = SyncOptions::with_timeout(Duration::from_millis(20));
        let outcome = options
            .guard(tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert_eq!(outcome, Err(Interrupted::TimedOut(Duration::from_millis(20))));
    }

    #[tokio::test]
    async fn test_guard_observes_cancel_from_another_task() {
        let options = SyncOptions::default();
        let signal = options.cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            signal.cancel();
        });

        let outcome = options
            .guard(tokio::time::sleep(Duration::from_secs(5)))
            .await;
        assert_eq!(outcome, Err(Interrupted::Cancelled));
    }

    #[tokio::test]
    async fn test_already_cancelled_signal_resolves_immediately() {
        let signal = CancelSignal::new();
        signal.cancel();
        signal.cancelled().await;
        assert!(signal.is_cancelled());
    }
}
