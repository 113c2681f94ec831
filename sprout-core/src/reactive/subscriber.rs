//! Subscriber types for the reactive system.
//!
//! A Subscriber is anything notified when an observable node changes:
//! computeds, watchers, or plain callbacks. Nodes keep subscribers in an
//! ordered list of weak references; the strong side of every subscription is
//! a [`Subscription`] token, and dropping the token unsubscribes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

/// Unique identifier for a subscriber.
///
/// Each subscriber gets a unique ID when created. Subscriber lists are keyed
/// by this ID so subscribing twice keeps a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Something that reacts when a dependency changes.
pub trait Subscriber: Send + Sync {
    /// The identity used in subscriber lists.
    fn subscriber_id(&self) -> SubscriberId;

    /// Called synchronously by the node that changed.
    fn notify(&self);
}

/// A subscriber backed by a plain callback.
pub struct FnSubscriber {
    id: SubscriberId,
    notify: Box<dyn Fn() + Send + Sync>,
}

impl FnSubscriber {
    /// Create a new subscriber with the given notification callback.
    pub fn new<F>(notify: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            id: SubscriberId::new(),
            notify: Box::new(notify),
        }
    }
}

impl Subscriber for FnSubscriber {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn notify(&self) {
        (self.notify)();
    }
}

/// Ordered set of subscribers attached to one node.
#[derive(Default)]
pub struct SubscriberList {
    entries: Mutex<IndexMap<SubscriberId, Weak<dyn Subscriber>>>,
}

impl SubscriberList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe without keeping the subscriber alive.
    ///
    /// The caller owns the subscriber; the returned token removes the entry
    /// when dropped.
    pub fn subscribe(
        self: &Arc<Self>,
        id: SubscriberId,
        subscriber: Weak<dyn Subscriber>,
    ) -> Subscription {
        self.entries.lock().insert(id, subscriber);
        Subscription {
            list: Arc::downgrade(self),
            id,
            _owned: None,
        }
    }

    /// Subscribe and hand ownership of the subscriber to the token.
    pub fn subscribe_owned(self: &Arc<Self>, subscriber: Arc<dyn Subscriber>) -> Subscription {
        let id = subscriber.subscriber_id();
        let mut subscription = self.subscribe(id, Arc::downgrade(&subscriber));
        subscription._owned = Some(subscriber);
        subscription
    }

    /// Remove a subscriber. Unknown IDs are ignored.
    pub fn unsubscribe(&self, id: SubscriberId) {
        self.entries.lock().shift_remove(&id);
    }

    /// Notify every live subscriber, in subscription order.
    ///
    /// The list is snapshotted first so subscribers may subscribe or
    /// unsubscribe while being notified.
    pub fn notify_all(&self) {
        let snapshot: SmallVec<[Weak<dyn Subscriber>; 4]> = {
            let mut entries = self.entries.lock();
            entries.retain(|_, subscriber| subscriber.strong_count() > 0);
            entries.values().cloned().collect()
        };

        for subscriber in snapshot {
            if let Some(subscriber) = subscriber.upgrade() {
                subscriber.notify();
            }
        }
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.entries.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Disposer for one subscription. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    list: Weak<SubscriberList>,
    id: SubscriberId,
    _owned: Option<Arc<dyn Subscriber>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Unsubscribe now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(list) = self.list.upgrade() {
            list.unsubscribe(self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
