//! Reactive Primitives
//!
//! This module implements the observable core: signals, computeds, and
//! watchers. These primitives are independent of rendering; components reach
//! them through hooks, but any code may create and share them.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. Reading it while a computed
//! evaluates makes it a dependency of that computed. Writing a different
//! value notifies every subscriber synchronously.
//!
//! ## Computeds
//!
//! A Computed is a lazily evaluated derived value. Its dependency set is
//! rediscovered on every evaluation, so branches not taken stop triggering
//! it. Invalidation propagates eagerly; recomputation happens only on read.
//!
//! ## Watchers
//!
//! A Watcher runs a side effect when its dependencies change, batching every
//! change made in one synchronous stretch into a single deferred rerun on
//! the [`scheduler`](crate::scheduler) queue.
//!
//! # Implementation Notes
//!
//! Dependency tracking uses a thread-local stack of evaluation frames (see
//! [`ReactiveContext`]). Each read registers with the innermost frame only,
//! which keeps nested computeds attributing their reads correctly.

mod computed;
mod context;
mod node;
mod signal;
mod subscriber;
mod watcher;

pub use computed::{Computed, ComputedState};
pub use context::{untracked, ReactiveContext, TrackedSources};
pub use node::{NodeId, Source};
pub use signal::Signal;
pub use subscriber::{FnSubscriber, Subscriber, SubscriberId, SubscriberList, Subscription};
pub use watcher::{watch, Watcher};
