//! Computed Implementation
//!
//! A Computed is a cached derived value whose dependency set is discovered
//! every time it evaluates.
//!
//! # How Computeds Work
//!
//! 1. A new computed starts `Dirty` and evaluates on first access.
//!
//! 2. While evaluating, every signal or computed it reads is recorded in its
//!    own evaluation frame. Afterwards the recorded set replaces the previous
//!    one: stale dependencies are unsubscribed, new ones subscribed.
//!
//! 3. When a dependency changes, the computed is marked `Dirty` and forwards
//!    the notification to its own subscribers. It does not recompute until
//!    it is read again, and any number of notifications between two reads
//!    cost a single recomputation.
//!
//! 4. Reading a computed while the same thread is evaluating it is a cycle
//!    and fails with [`ReactiveError::CircularDependency`]. A read from
//!    another thread during evaluation runs the callback for that reader
//!    alone and caches nothing.
//!
//! If the callback fails or panics the computed goes back to `Dirty`, so the
//! next read retries instead of reporting a bogus cycle.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};

use super::context::{ReactiveContext, TrackedSources};
use super::node::{NodeId, Source};
use super::subscriber::{FnSubscriber, Subscriber, SubscriberId, SubscriberList, Subscription};
use crate::error::{ReactiveError, Result};

/// Evaluation state of a computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value reflects the current dependency values.
    Clean,

    /// A dependency changed, or the computed never evaluated.
    Dirty,

    /// The callback is running.
    Computing,
}

type ComputeFn<T> = Box<dyn Fn() -> Result<T> + Send + Sync>;

/// A lazily recomputed derived value.
///
/// # Example
///
/// ```rust
/// use sprout_core::reactive::{Computed, Signal};
///
/// let count = Signal::new(1);
/// let doubled = {
///     let count = count.clone();
///     Computed::new(move || count.get() * 2)
/// };
///
/// assert_eq!(doubled.get().unwrap(), 2);
/// count.set(5);
/// assert_eq!(doubled.get().unwrap(), 10);
/// ```
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

struct ComputedInner<T> {
    id: NodeId,
    subscriber_id: SubscriberId,
    compute: ComputeFn<T>,
    value: RwLock<Option<T>>,
    state: Mutex<ComputedState>,
    /// Thread running the callback while `Computing`. Locked after `state`.
    evaluator: Mutex<Option<ThreadId>>,
    /// Set when a dependency changes mid-evaluation.
    invalidated: AtomicBool,
    dependencies: Mutex<IndexMap<NodeId, Dependency>>,
    subscribers: Arc<SubscriberList>,
    recomputations: AtomicUsize,
    this: Weak<ComputedInner<T>>,
}

/// A live edge to one dependency. Dropping it unsubscribes.
struct Dependency {
    _subscription: Subscription,
    _source: Arc<dyn Source>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a computed from an infallible callback.
    ///
    /// The callback is not run until the first `get`.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::try_new(move || Ok(compute()))
    }

    /// Create a computed whose callback may fail.
    ///
    /// Use this when the callback reads other computeds, so their errors can
    /// be forwarded with `?`.
    pub fn try_new<F>(compute: F) -> Self
    where
        F: Fn() -> Result<T> + Send + Sync + 'static,
    {
        let inner = Arc::new_cyclic(|this| ComputedInner {
            id: NodeId::new(),
            subscriber_id: SubscriberId::new(),
            compute: Box::new(compute),
            value: RwLock::new(None),
            state: Mutex::new(ComputedState::Dirty),
            evaluator: Mutex::new(None),
            invalidated: AtomicBool::new(false),
            dependencies: Mutex::new(IndexMap::new()),
            subscribers: Arc::new(SubscriberList::new()),
            recomputations: AtomicUsize::new(0),
            this: this.clone(),
        });

        Self { inner }
    }

    /// Get the computed's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// If another computed is evaluating, this computed becomes one of its
    /// dependencies.
    pub fn get(&self) -> Result<T> {
        let value = self.inner.current()?;
        ReactiveContext::track(&self.inner);
        Ok(value)
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> Result<T> {
        self.inner.current()
    }

    /// Evaluate the callback now, whatever the current state.
    pub fn recompute(&self) -> Result<T> {
        self.inner.recompute()
    }

    /// Mark the computed dirty and notify its subscribers.
    pub fn mark_dirty(&self) {
        self.inner.notify();
    }

    /// Run `notify` every time this computed is invalidated.
    pub fn subscribe<F>(&self, notify: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner
            .subscribers
            .subscribe_owned(Arc::new(FnSubscriber::new(notify)))
    }

    pub(crate) fn subscribers(&self) -> &Arc<SubscriberList> {
        &self.inner.subscribers
    }

    /// Get the current state.
    pub fn state(&self) -> ComputedState {
        *self.inner.state.lock()
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Number of dependencies read during the last successful evaluation.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }

    /// Whether `node` was read during the last successful evaluation.
    pub fn depends_on(&self, node: NodeId) -> bool {
        self.inner.dependencies.lock().contains_key(&node)
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Number of completed evaluations.
    pub fn recompute_count(&self) -> usize {
        self.inner.recomputations.load(Ordering::Relaxed)
    }

    /// Whether both handles point at the same computed.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn current(&self) -> Result<T> {
        let state = *self.state.lock();
        if state == ComputedState::Clean {
            if let Some(value) = self.value.read().as_ref() {
                return Ok(value.clone());
            }
        }
        self.recompute()
    }

    fn recompute(&self) -> Result<T> {
        let here = thread::current().id();
        {
            let mut state = self.state.lock();
            if *state == ComputedState::Computing {
                let evaluator = *self.evaluator.lock();
                if evaluator == Some(here) {
                    tracing::warn!(node = ?self.id, "circular dependency detected");
                    return Err(ReactiveError::CircularDependency { node: self.id });
                }
                drop(state);
                return self.evaluate_detached();
            }
            *state = ComputedState::Computing;
            *self.evaluator.lock() = Some(here);
        }
        self.invalidated.store(false, Ordering::SeqCst);
        let _reset = ResetOnFailure {
            state: &self.state,
            evaluator: &self.evaluator,
        };

        let frame = ReactiveContext::enter(self.subscriber_id);
        let result = (self.compute)();
        let tracked = frame.finish();
        let value = result?;

        self.replace_dependencies(tracked);
        *self.value.write() = Some(value.clone());
        self.recomputations.fetch_add(1, Ordering::Relaxed);

        let next = if self.invalidated.swap(false, Ordering::SeqCst) {
            ComputedState::Dirty
        } else {
            ComputedState::Clean
        };
        {
            let mut state = self.state.lock();
            *state = next;
            *self.evaluator.lock() = None;
        }

        tracing::trace!(node = ?self.id, state = ?next, "computed re-evaluated");
        Ok(value)
    }

    /// Evaluate for a reader on another thread while this one is busy.
    fn evaluate_detached(&self) -> Result<T> {
        let frame = ReactiveContext::enter(self.subscriber_id);
        let result = (self.compute)();
        drop(frame.finish());
        result
    }

    fn replace_dependencies(&self, tracked: TrackedSources) {
        let mut dependencies = self.dependencies.lock();
        let mut previous = std::mem::take(&mut *dependencies);

        for (id, source) in tracked {
            let dependency = match previous.swap_remove(&id) {
                Some(existing) => existing,
                None => {
                    let subscriber: Weak<dyn Subscriber> = self.this.clone();
                    Dependency {
                        _subscription: source
                            .subscribers()
                            .subscribe(self.subscriber_id, subscriber),
                        _source: source,
                    }
                }
            };
            dependencies.insert(id, dependency);
        }
        drop(dependencies);

        if !previous.is_empty() {
            tracing::trace!(node = ?self.id, dropped = previous.len(), "released stale dependencies");
        }
        // Whatever is left was not read this time; dropping it unsubscribes.
        drop(previous);
    }
}

impl<T> Source for ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn subscribers(&self) -> &Arc<SubscriberList> {
        &self.subscribers
    }
}

impl<T> Subscriber for ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn notify(&self) {
        {
            let mut state = self.state.lock();
            if *state == ComputedState::Computing {
                self.invalidated.store(true, Ordering::SeqCst);
            } else {
                *state = ComputedState::Dirty;
            }
        }
        self.subscribers.notify_all();
    }
}

/// Returns a computed to `Dirty` if evaluation did not finish.
struct ResetOnFailure<'a> {
    state: &'a Mutex<ComputedState>,
    evaluator: &'a Mutex<Option<ThreadId>>,
}

impl Drop for ResetOnFailure<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if *state == ComputedState::Computing {
            *state = ComputedState::Dirty;
            *self.evaluator.lock() = None;
        }
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Computeds compare by identity, so they can appear in dependency lists.
impl<T> PartialEq for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::AtomicI32;
    use std::sync::{mpsc, OnceLock};

    #[test]
    fn computes_on_first_access() {
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let computed = Computed::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        assert!(!computed.has_value());
        assert_eq!(computed.state(), ComputedState::Dirty);
        assert_eq!(call_count.load(Ordering::SeqCst), 0);

        assert_eq!(computed.get().unwrap(), 42);
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(computed.state(), ComputedState::Clean);
    }

    #[test]
    fn doubles_a_signal_and_reads_once_per_change() {
        let c = Signal::new(1);
        let calls = Arc::new(AtomicI32::new(0));

        let d = {
            let c = c.clone();
            let calls = calls.clone();
            Computed::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                c.get() * 2
            })
        };

        assert_eq!(d.get().unwrap(), 2);
        c.set(5);
        assert_eq!(d.get().unwrap(), 10);
        assert_eq!(d.get().unwrap(), 10);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn many_invalidations_cost_one_recompute() {
        let signal = Signal::new(0);
        let computed = {
            let signal = signal.clone();
            Computed::new(move || signal.get() + 1)
        };

        assert_eq!(computed.get().unwrap(), 1);
        for i in 1..=10 {
            signal.set(i);
        }
        assert_eq!(computed.state(), ComputedState::Dirty);

        assert_eq!(computed.get().unwrap(), 11);
        assert_eq!(computed.recompute_count(), 2);
    }

    #[test]
    fn notifications_fire_on_every_invalidation() {
        let signal = Signal::new(0);
        let computed = {
            let signal = signal.clone();
            Computed::new(move || signal.get())
        };
        computed.get().unwrap();

        let notified = Arc::new(AtomicI32::new(0));
        let notified_clone = notified.clone();
        let _subscription = computed.subscribe(move || {
            notified_clone.fetch_add(1, Ordering::SeqCst);
        });

        signal.set(1);
        signal.set(2);
        assert_eq!(notified.load(Ordering::SeqCst), 2);
        assert_eq!(computed.recompute_count(), 1);
    }

    #[test]
    fn switching_branches_drops_the_old_dependency() {
        let use_a = Signal::new(true);
        let a = Signal::new(1);
        let b = Signal::new(100);

        let computed = {
            let (use_a, a, b) = (use_a.clone(), a.clone(), b.clone());
            Computed::new(move || if use_a.get() { a.get() } else { b.get() })
        };

        assert_eq!(computed.get().unwrap(), 1);
        assert!(computed.depends_on(a.id()));
        assert!(!computed.depends_on(b.id()));

        use_a.set(false);
        assert_eq!(computed.get().unwrap(), 100);
        assert!(!computed.depends_on(a.id()));
        assert_eq!(a.subscriber_count(), 0);

        a.set(2);
        assert_eq!(computed.state(), ComputedState::Clean);

        b.set(200);
        assert_eq!(computed.state(), ComputedState::Dirty);
        assert_eq!(computed.get().unwrap(), 200);
    }

    #[test]
    fn nested_computeds_propagate_invalidation() {
        let base = Signal::new(5);
        let doubled = {
            let base = base.clone();
            Computed::new(move || base.get() * 2)
        };
        let plus_ten = {
            let doubled = doubled.clone();
            Computed::try_new(move || Ok(doubled.get()? + 10))
        };

        assert_eq!(plus_ten.get().unwrap(), 20);
        assert!(plus_ten.depends_on(doubled.id()));
        assert!(!plus_ten.depends_on(base.id()));

        base.set(10);
        assert_eq!(doubled.state(), ComputedState::Dirty);
        assert_eq!(plus_ten.state(), ComputedState::Dirty);
        assert_eq!(plus_ten.get().unwrap(), 30);
    }

    #[test]
    fn reading_itself_is_a_cycle() {
        let slot: Arc<OnceLock<Computed<i32>>> = Arc::new(OnceLock::new());
        let computed = {
            let slot = slot.clone();
            Computed::try_new(move || match slot.get() {
                Some(me) => Ok(me.get()? + 1),
                None => Ok(0),
            })
        };
        assert!(slot.set(computed.clone()).is_ok());

        let err = computed.get().unwrap_err();
        assert!(matches!(err, ReactiveError::CircularDependency { node } if node == computed.id()));
        assert_eq!(computed.state(), ComputedState::Dirty);
    }

    #[test]
    fn recompute_on_a_self_reading_computed_is_a_cycle() {
        let slot: Arc<OnceLock<Computed<i32>>> = Arc::new(OnceLock::new());
        let computed = {
            let slot = slot.clone();
            Computed::try_new(move || match slot.get() {
                Some(me) => Ok(me.recompute()? + 1),
                None => Ok(0),
            })
        };
        assert!(slot.set(computed.clone()).is_ok());

        let err = computed.recompute().unwrap_err();
        assert!(matches!(err, ReactiveError::CircularDependency { node } if node == computed.id()));
        assert_eq!(computed.state(), ComputedState::Dirty);
        assert_eq!(computed.recompute_count(), 0);
    }

    #[test]
    fn read_from_another_thread_during_evaluation_is_not_a_cycle() {
        let (started_tx, started_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let started_tx = Mutex::new(started_tx);
        let release_rx = Mutex::new(release_rx);
        let first_run = AtomicBool::new(true);

        let computed = Computed::new(move || {
            if first_run.swap(false, Ordering::SeqCst) {
                let _ = started_tx.lock().send(());
                let _ = release_rx.lock().recv();
            }
            7
        });

        let evaluating = {
            let computed = computed.clone();
            thread::spawn(move || computed.get())
        };
        started_rx.recv().unwrap();
        assert_eq!(computed.state(), ComputedState::Computing);

        assert_eq!(computed.get().unwrap(), 7);
        assert_eq!(computed.recompute_count(), 0);

        release_tx.send(()).unwrap();
        assert_eq!(evaluating.join().unwrap().unwrap(), 7);
        assert_eq!(computed.state(), ComputedState::Clean);
        assert_eq!(computed.recompute_count(), 1);
    }

    #[test]
    fn transitive_cycle_fails_on_both_ends() {
        let slot: Arc<OnceLock<Computed<i32>>> = Arc::new(OnceLock::new());
        let b = {
            let slot = slot.clone();
            Computed::try_new(move || match slot.get() {
                Some(a) => Ok(a.get()? * 2),
                None => Ok(0),
            })
        };
        let a = {
            let b = b.clone();
            Computed::try_new(move || Ok(b.get()? + 1))
        };
        assert!(slot.set(a.clone()).is_ok());

        assert!(matches!(a.get(), Err(ReactiveError::CircularDependency { .. })));
        assert_eq!(a.state(), ComputedState::Dirty);
        assert_eq!(b.state(), ComputedState::Dirty);
    }

    #[test]
    fn panicking_callback_does_not_poison() {
        let fail = Arc::new(AtomicBool::new(true));
        let computed = {
            let fail = fail.clone();
            Computed::new(move || {
                if fail.load(Ordering::SeqCst) {
                    panic!("callback failed");
                }
                7
            })
        };

        let result = catch_unwind(AssertUnwindSafe(|| computed.get()));
        assert!(result.is_err());
        assert_eq!(computed.state(), ComputedState::Dirty);
        assert_eq!(ReactiveContext::depth(), 0);

        fail.store(false, Ordering::SeqCst);
        assert_eq!(computed.get().unwrap(), 7);
    }

    #[test]
    fn dropping_a_computed_releases_its_subscriptions() {
        let signal = Signal::new(1);
        let computed = {
            let signal = signal.clone();
            Computed::new(move || signal.get())
        };
        computed.get().unwrap();
        assert_eq!(signal.subscriber_count(), 1);

        drop(computed);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn write_during_evaluation_leaves_it_dirty() {
        let signal = Signal::new(0);
        let computed = {
            let signal = signal.clone();
            Computed::new(move || {
                let value = signal.get();
                signal.set(value + 1);
                value
            })
        };

        // The first run reads before subscribing, so its own write goes unseen.
        assert_eq!(computed.get().unwrap(), 0);
        assert_eq!(computed.state(), ComputedState::Clean);

        signal.set(10);
        assert_eq!(computed.get().unwrap(), 10);
        assert_eq!(computed.state(), ComputedState::Dirty);
    }
}
