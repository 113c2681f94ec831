//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read while a computed is evaluating, the signal is
//!    recorded in that computed's innermost evaluation frame.
//!
//! 2. When the computed finishes, it subscribes to every signal it read.
//!
//! 3. `set` with a different value notifies every subscriber synchronously,
//!    in subscription order, before returning.
//!
//! # Equality
//!
//! `set` compares with `PartialEq`; writing an equal value is a no-op.
//! `replace` always writes and always notifies.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::node::{NodeId, Source};
use super::subscriber::{FnSubscriber, SubscriberList, Subscription};

/// A reactive signal holding a value of type T.
///
/// Cloning a signal yields another handle to the same cell.
///
/// # Example
///
/// ```rust
/// use sprout_core::reactive::Signal;
///
/// let count = Signal::new(0);
/// assert_eq!(count.get(), 0);
///
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

struct SignalInner<T> {
    id: NodeId,
    value: RwLock<T>,
    subscribers: Arc<SubscriberList>,
}

impl<T: Send + Sync> Source for SignalInner<T> {
    fn node_id(&self) -> NodeId {
        self.id
    }

    fn subscribers(&self) -> &Arc<SubscriberList> {
        &self.subscribers
    }
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value.
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: NodeId::new(),
                value: RwLock::new(value),
                subscribers: Arc::new(SubscriberList::new()),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called while a computed is evaluating, the signal becomes one of
    /// that computed's dependencies.
    pub fn get(&self) -> T {
        ReactiveContext::track(&self.inner);
        self.get_untracked()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Borrow the current value, tracking the read.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        ReactiveContext::track(&self.inner);
        f(&self.inner.value.read())
    }

    /// Store `value` and notify subscribers, even if it equals the old value.
    pub fn replace(&self, value: T) -> T {
        let previous = std::mem::replace(&mut *self.inner.value.write(), value);
        self.inner.subscribers.notify_all();
        previous
    }

    /// Run `notify` every time this signal changes.
    pub fn subscribe<F>(&self, notify: F) -> Subscription
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner
            .subscribers
            .subscribe_owned(Arc::new(FnSubscriber::new(notify)))
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Whether both handles point at the same cell.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + PartialEq + 'static,
{
    /// Set a new value and notify subscribers.
    ///
    /// Returns `false` without notifying when the value is unchanged.
    pub fn set(&self, value: T) -> bool {
        {
            let mut guard = self.inner.value.write();
            if *guard == value {
                return false;
            }
            *guard = value;
        }

        self.inner.subscribers.notify_all();
        true
    }

    /// Update the value using a function.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = f(&self.inner.value.read());
        self.set(new_value)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Signals compare by identity, so they can appear in dependency lists.
impl<T> PartialEq for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
