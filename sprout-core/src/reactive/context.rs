//! Reactive Context
//!
//! The reactive context tracks which computation is currently evaluating.
//! When a signal or computed is read, it registers itself with the innermost
//! evaluation frame, so dependency sets are always attributed to the nearest
//! enclosing computation even when computeds read other computeds.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Entering a frame pushes it and the
//! returned guard pops it on drop, so the stack stays balanced if the
//! computation returns early or panics.

use std::cell::RefCell;
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::node::{NodeId, Source};
use super::SubscriberId;

/// Dependencies recorded by one evaluation, in first-read order.
pub type TrackedSources = IndexMap<NodeId, Arc<dyn Source>>;

thread_local! {
    static CONTEXT_STACK: RefCell<SmallVec<[ContextEntry; 4]>> = RefCell::new(SmallVec::new());
}

/// One evaluation frame.
struct ContextEntry {
    /// `None` marks an untracked frame: reads inside it register nothing.
    subscriber_id: Option<SubscriberId>,
    dependencies: TrackedSources,
}

/// Guard that pops its frame when dropped.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a new evaluation frame for the given subscriber.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        Self::push(Some(subscriber_id))
    }

    fn push(subscriber_id: Option<SubscriberId>) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                dependencies: IndexMap::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        Self::current_subscriber().is_some()
    }

    /// Get the subscriber of the innermost frame, if it tracks.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().and_then(|entry| entry.subscriber_id))
    }

    /// Number of frames on this thread's stack.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    /// Record a read of `source` in the innermost frame.
    pub fn track<S: Source + 'static>(source: &Arc<S>) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                if entry.subscriber_id.is_some() {
                    entry
                        .dependencies
                        .entry(source.node_id())
                        .or_insert_with(|| Arc::clone(source) as Arc<dyn Source>);
                }
            }
        });
    }

    /// Leave the frame and return what it recorded.
    pub fn finish(self) -> TrackedSources {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow_mut()
                .last_mut()
                .map(|entry| std::mem::take(&mut entry.dependencies))
                .unwrap_or_default()
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        // Verify we're popping the right frame.
        if let Some(entry) = popped {
            debug_assert_eq!(
                entry.subscriber_id, self.subscriber_id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.subscriber_id, entry.subscriber_id
            );
        }
    }
}

/// Run `f` without registering any reads with the enclosing computation.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _frame = ReactiveContext::push(None);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;

    #[test]
    fn context_tracks_subscriber() {
        let id = SubscriberId::new();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(id);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        }

        assert!(!ReactiveContext::is_active());
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn reads_are_recorded_once_in_order() {
        let a = Signal::new(1);
        let b = Signal::new(2);

        let ctx = ReactiveContext::enter(SubscriberId::new());
        a.get();
        b.get();
        a.get();
        let deps = ctx.finish();

        let ids: Vec<_> = deps.keys().copied().collect();
        assert_eq!(ids, vec![a.id(), b.id()]);
        assert_eq!(ReactiveContext::depth(), 0);
    }

    #[test]
    fn nested_frames_attribute_to_innermost() {
        let outer_signal = Signal::new(0);
        let inner_signal = Signal::new(0);

        let outer = ReactiveContext::enter(SubscriberId::new());
        outer_signal.get();

        let inner = ReactiveContext::enter(SubscriberId::new());
        inner_signal.get();
        let inner_deps = inner.finish();

        let outer_deps = outer.finish();

        assert_eq!(inner_deps.len(), 1);
        assert!(inner_deps.contains_key(&inner_signal.id()));
        assert_eq!(outer_deps.len(), 1);
        assert!(outer_deps.contains_key(&outer_signal.id()));
    }

    #[test]
    fn untracked_reads_are_not_recorded() {
        let signal = Signal::new(3);

        let ctx = ReactiveContext::enter(SubscriberId::new());
        let value = untracked(|| {
            assert!(!ReactiveContext::is_active());
            signal.get()
        });
        assert!(ReactiveContext::is_active());
        let deps = ctx.finish();

        assert_eq!(value, 3);
        assert!(deps.is_empty());
    }
}
