//! Component Layer
//!
//! Components are render functions (or [`Render`] types) invoked through a
//! [`Component`] factory. Each instantiation owns a [`LifecycleContext`]
//! whose hook chain gives the standard hooks their persistent state.
//!
//! # Example
//!
//! ```rust
//! use sprout_core::component::{use_state, Component};
//!
//! let counter = Component::function(|start: i32| {
//!     let (count, set_count) = use_state(start)?;
//!     set_count.set(count + 1);
//!     Ok(count)
//! });
//!
//! let mut handle = counter.invoke(1).unwrap().key("counter");
//! assert_eq!(*handle, 1);
//!
//! counter.update(&mut handle, 1).unwrap();
//! assert_eq!(*handle, 2);
//! ```
//!
//! The component layer is single-threaded: contexts live in `Rc` and the
//! ambient instance is thread-local.

mod factory;
mod hooks;
mod host;
mod lifecycle;

pub use factory::{Component, Handle, Render};
pub use hooks::{
    use_callback, use_computed, use_effect, use_hook, use_memo, use_ref, use_signal, use_state,
    use_state_with, Cleanup, HookSlot, MutableRef, StateSetter,
};
pub use host::{collect_children, emit_child, is_collecting};
pub use lifecycle::{current, Key, LifecycleContext, LifecycleStatus};
