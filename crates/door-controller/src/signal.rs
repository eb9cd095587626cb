//! `AsyncSignal` - a value-less rendezvous between one trigger and many waiters.
//!
//! `wait()` registers the caller *when it is called* and returns a future that
//! resolves on the next `trigger()`. `trigger()` resolves every waiter registered
//! so far, in registration order, and clears the list. Waiters registered while a
//! trigger is in progress belong to the next trigger, because `trigger()` works on
//! a snapshot taken under the lock.
//!
//! Registering at call time lets the admission cycle register for the modem's
//! `OK` before it writes the dial command.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// One-shot broadcast signal.
#[derive(Debug, Default)]
pub struct AsyncSignal {
    waiters: Mutex<Vec<oneshot::Sender<()>>>,
}

impl AsyncSignal {
    /// Create a signal with no registered waiters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register for the next trigger.
    ///
    /// The returned future also resolves if the signal itself is dropped, so a
    /// waiter can never outlive its source.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let (tx, rx) = oneshot::channel();
        self.lock().push(tx);
        async move {
            let _ = rx.await;
        }
    }

    /// Resolve every currently registered waiter and clear the registrations.
    ///
    /// Returns the number of waiters that were still listening.
    pub fn trigger(&self) -> usize {
        let snapshot = std::mem::take(&mut *self.lock());
        snapshot
            .into_iter()
            .filter_map(|waiter| waiter.send(()).ok())
            .count()
    }

    /// Number of waiters registered for the next trigger.
    #[must_use]
    pub fn waiter_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<oneshot::Sender<()>>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_resolves_all_registered_waiters_once() {
        let signal = Arc::new(AsyncSignal::new());
        let resolved = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let waiter = signal.wait();
            let resolved = Arc::clone(&resolved);
            handles.push(tokio::spawn(async move {
                waiter.await;
                resolved.fetch_add(1, Ordering::SeqCst);
            }));
        }
        assert_eq!(signal.waiter_count(), 5);

        assert_eq!(signal.trigger(), 5);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(resolved.load(Ordering::SeqCst), 5);
        assert_eq!(signal.waiter_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_waiter_blocks_until_next_trigger() {
        let signal = AsyncSignal::new();

        let early = signal.wait();
        signal.trigger();
        early.await;

        let late = signal.wait();
        tokio::pin!(late);
        let timed_out = tokio::time::timeout(Duration::from_millis(50), &mut late)
            .await
            .is_err();
        assert!(timed_out, "late waiter must not see the earlier trigger");

        assert_eq!(signal.trigger(), 1);
        late.await;
    }

    #[tokio::test]
    async fn test_registration_happens_before_first_poll() {
        let signal = AsyncSignal::new();

        // Not polled yet, but already registered.
        let waiter = signal.wait();
        assert_eq!(signal.waiter_count(), 1);

        signal.trigger();
        waiter.await;
    }

    #[test]
    fn test_trigger_without_waiters_is_noop() {
        let signal = AsyncSignal::new();
        assert_eq!(signal.trigger(), 0);
    }

    #[tokio::test]
    async fn test_dropped_waiter_is_not_counted() {
        let signal = AsyncSignal::new();
        drop(signal.wait());
        let kept = signal.wait();

        assert_eq!(signal.trigger(), 1);
        kept.await;
    }
}
