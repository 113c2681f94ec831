//! Sprout Core
//!
//! This crate provides the core runtime for the Sprout reactive UI framework.
//! It implements:
//!
//! - Reactive primitives (signals, computeds, watchers)
//! - Dynamically scoped context values
//! - Component lifecycle contexts and the standard hooks
//! - Component factories and host node collection
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Observable core and dependency tracking
//! - `scheduler`: Microtask queue used to defer watcher reruns
//! - `dynamic`: Scoped override of a shared value for the extent of a call
//! - `component`: Lifecycle contexts, hooks, and component factories
//! - `config`: Hook policy
//!
//! # Example
//!
//! ```rust
//! use sprout_core::reactive::{watch, Computed, Signal};
//! use sprout_core::scheduler::run_microtasks;
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use std::sync::Arc;
//!
//! // Create a signal
//! let count = Signal::new(1);
//!
//! // Create a derived value
//! let doubled = {
//!     let count = count.clone();
//!     Computed::new(move || count.get() * 2)
//! };
//!
//! // Watch it
//! let seen = Arc::new(AtomicI32::new(0));
//! let _watcher = {
//!     let (doubled, seen) = (doubled.clone(), seen.clone());
//!     watch(move || seen.store(doubled.get().unwrap_or_default(), Ordering::SeqCst)).unwrap()
//! };
//! assert_eq!(seen.load(Ordering::SeqCst), 2);
//!
//! // Update the signal, then let the deferred rerun happen
//! count.set(5);
//! run_microtasks();
//! assert_eq!(seen.load(Ordering::SeqCst), 10);
//! ```

pub mod component;
pub mod config;
pub mod dynamic;
pub mod error;
pub mod reactive;
pub mod scheduler;

pub use dynamic::DynamicContext;
pub use error::{ReactiveError, Result};
