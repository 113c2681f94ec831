//! Microtask Scheduler
//!
//! Watchers defer their reruns onto a thread-local FIFO queue of microtasks.
//! Everything that happens synchronously before the queue is drained lands
//! in the same batch, so a burst of `set` calls produces one rerun per
//! watcher.
//!
//! # Draining
//!
//! Hosts drain the queue at the end of each unit of work, either directly
//! with [`run_microtasks`] or from an async loop with [`tick`]. Tasks queued
//! while draining run in the same drain, after the tasks already queued.

use std::cell::RefCell;
use std::collections::VecDeque;

type Microtask = Box<dyn FnOnce()>;

thread_local! {
    static MICROTASKS: RefCell<VecDeque<Microtask>> = RefCell::new(VecDeque::new());
}

/// Defer `task` until the queue is next drained on this thread.
pub fn queue_microtask<F>(task: F)
where
    F: FnOnce() + 'static,
{
    MICROTASKS.with(|queue| queue.borrow_mut().push_back(Box::new(task)));
}

/// Run queued microtasks until the queue is empty.
///
/// Returns the number of tasks that ran.
pub fn run_microtasks() -> usize {
    let mut ran = 0;
    // Pop one at a time so tasks can queue more work.
    while let Some(task) = MICROTASKS.with(|queue| queue.borrow_mut().pop_front()) {
        task();
        ran += 1;
    }
    if ran > 0 {
        tracing::trace!(ran, "drained microtasks");
    }
    ran
}

/// Number of microtasks waiting on this thread.
pub fn pending_microtasks() -> usize {
    MICROTASKS.with(|queue| queue.borrow().len())
}

/// Yield to the async executor once, then drain the microtask queue.
pub async fn tick() -> usize {
    tokio::task::yield_now().await;
    run_microtasks()
}
