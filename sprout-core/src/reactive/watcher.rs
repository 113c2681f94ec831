//! Watcher Implementation
//!
//! A Watcher runs a side-effecting callback whenever the values it read last
//! time change.
//!
//! # How Watchers Work
//!
//! 1. The callback is wrapped in an internal [`Computed`], so its reads are
//!    tracked exactly like any computed's. It runs once on creation to
//!    establish its dependencies.
//!
//! 2. The watcher subscribes to that computed. The first notification marks
//!    the watcher pending and queues one microtask; further notifications
//!    while pending are absorbed.
//!
//! 3. When the microtask runs, it clears the pending flag and re-reads the
//!    computed, which reruns the callback with fresh dependency tracking.
//!
//! # Stopping
//!
//! The [`Watcher`] handle is the disposer. `unwatch` (or dropping the handle)
//! unsubscribes, and a rerun already queued checks liveness before it runs,
//! so nothing executes after `unwatch` returns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::computed::Computed;
use super::subscriber::{Subscriber, SubscriberId, Subscription};
use crate::error::Result;
use crate::scheduler::queue_microtask;

/// A batched side effect.
///
/// # Example
///
/// ```rust
/// use sprout_core::reactive::{watch, Signal};
/// use sprout_core::scheduler::run_microtasks;
///
/// let a = Signal::new(1);
/// let b = Signal::new(2);
/// let watcher = {
///     let (a, b) = (a.clone(), b.clone());
///     watch(move || println!("sum = {}", a.get() + b.get())).unwrap()
/// };
///
/// a.set(10);
/// b.set(20);
/// run_microtasks(); // prints "sum = 30" once
/// assert_eq!(watcher.run_count(), 2);
/// ```
#[must_use = "dropping a Watcher stops it"]
pub struct Watcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    subscriber_id: SubscriberId,
    computed: Computed<()>,
    pending: AtomicBool,
    active: AtomicBool,
    subscription: Mutex<Option<Subscription>>,
    this: Weak<WatcherInner>,
}

/// Run `callback` now and again after every batch of changes to what it read.
pub fn watch<F>(callback: F) -> Result<Watcher>
where
    F: Fn() + Send + Sync + 'static,
{
    Watcher::new(callback)
}

impl Watcher {
    /// Create a watcher and run the callback once.
    pub fn new<F>(callback: F) -> Result<Self>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let computed = Computed::new(callback);
        computed.get_untracked()?;

        let inner = Arc::new_cyclic(|this| WatcherInner {
            subscriber_id: SubscriberId::new(),
            computed,
            pending: AtomicBool::new(false),
            active: AtomicBool::new(true),
            subscription: Mutex::new(None),
            this: this.clone(),
        });

        let subscriber: Weak<dyn Subscriber> = inner.this.clone();
        let subscription = inner
            .computed
            .subscribers()
            .subscribe(inner.subscriber_id, subscriber);
        *inner.subscription.lock() = Some(subscription);

        Ok(Self { inner })
    }

    /// Stop watching. Any queued rerun is suppressed.
    pub fn unwatch(self) {
        drop(self);
    }

    /// Whether a rerun is queued.
    pub fn is_pending(&self) -> bool {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Number of times the callback has run.
    pub fn run_count(&self) -> usize {
        self.inner.computed.recompute_count()
    }

    /// Number of values the callback read on its last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.computed.dependency_count()
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

impl std::fmt::Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("run_count", &self.run_count())
            .field("pending", &self.is_pending())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

impl WatcherInner {
    fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        let subscription = self.subscription.lock().take();
        drop(subscription);
    }

    fn flush(&self) {
        self.pending.store(false, Ordering::SeqCst);
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        if let Err(err) = self.computed.get_untracked() {
            tracing::warn!(error = %err, "watcher rerun failed");
        }
    }
}

impl Subscriber for WatcherInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn notify(&self) {
        if !self.active.load(Ordering::SeqCst) || self.pending.swap(true, Ordering::SeqCst) {
            return;
        }

        tracing::debug!(subscriber = ?self.subscriber_id, "watcher scheduled");
        let this = self.this.clone();
        queue_microtask(move || {
            if let Some(inner) = this.upgrade() {
                inner.flush();
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use crate::scheduler::{pending_microtasks, run_microtasks};
    use std::sync::atomic::AtomicI32;

    #[test]
    fn runs_on_creation() {
        let runs = Arc::new(AtomicI32::new(0));
        let runs_clone = runs.clone();

        let watcher = watch(move || {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(watcher.run_count(), 1);
        assert!(!watcher.is_pending());
    }

    #[test]
    fn reruns_are_deferred_until_drained() {
        let signal = Signal::new(0);
        let seen = Arc::new(AtomicI32::new(-1));

        let _watcher = {
            let (signal, seen) = (signal.clone(), seen.clone());
            watch(move || seen.store(signal.get(), Ordering::SeqCst)).unwrap()
        };
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        signal.set(42);
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        run_microtasks();
        assert_eq!(seen.load(Ordering::SeqCst), 42);
    }

    #[test]
    fn same_tick_changes_coalesce() {
        let a = Signal::new(1);
        let b = Signal::new(2);
        let runs = Arc::new(AtomicI32::new(0));

        let watcher = {
            let (a, b, runs) = (a.clone(), b.clone(), runs.clone());
            watch(move || {
                a.get();
                b.get();
                runs.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        };

        a.set(10);
        b.set(20);
        a.set(11);
        assert!(watcher.is_pending());
        assert_eq!(pending_microtasks(), 1);

        run_microtasks();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert!(!watcher.is_pending());
    }

    #[test]
    fn unwatch_suppresses_a_queued_rerun() {
        let signal = Signal::new(0);
        let runs = Arc::new(AtomicI32::new(0));

        let watcher = {
            let (signal, runs) = (signal.clone(), runs.clone());
            watch(move || {
                signal.get();
                runs.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        };

        signal.set(1);
        assert_eq!(pending_microtasks(), 1);
        watcher.unwatch();

        run_microtasks();
        signal.set(2);
        run_microtasks();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn rerun_retracks_dependencies() {
        let toggle = Signal::new(true);
        let left = Signal::new(0);
        let right = Signal::new(0);
        let runs = Arc::new(AtomicI32::new(0));

        let _watcher = {
            let (toggle, left, right, runs) =
                (toggle.clone(), left.clone(), right.clone(), runs.clone());
            watch(move || {
                runs.fetch_add(1, Ordering::SeqCst);
                if toggle.get() {
                    left.get();
                } else {
                    right.get();
                }
            })
            .unwrap()
        };

        toggle.set(false);
        run_microtasks();
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        left.set(1);
        assert_eq!(run_microtasks(), 0);

        right.set(1);
        run_microtasks();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
