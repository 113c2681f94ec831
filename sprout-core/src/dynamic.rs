//! Dynamic Context
//!
//! A dynamically scoped ambient value. `bind` makes a value ambient for the
//! extent of a callback and restores the previous value on every exit path,
//! including unwinding. Nesting is the only stack mechanism: each `bind`
//! keeps the value it displaced on its own call frame.
//!
//! Contexts are intended to live in a `thread_local!`:
//!
//! ```rust
//! use sprout_core::DynamicContext;
//!
//! thread_local! {
//!     static THEME: DynamicContext<&'static str> = const { DynamicContext::new("light") };
//! }
//!
//! THEME.with(|theme| {
//!     assert_eq!(theme.read(), "light");
//!     theme.bind("dark", || assert_eq!(theme.read(), "dark"));
//!     assert_eq!(theme.read(), "light");
//! });
//! ```
//!
//! Bindings do not survive suspension: a body that yields across an `.await`
//! and resumes later sees whatever is ambient at that point.

use std::cell::RefCell;

/// A call-stack scoped ambient binding.
pub struct DynamicContext<T> {
    current: RefCell<T>,
}

impl<T> DynamicContext<T> {
    /// Create a context whose value is `default` until it is first bound.
    pub const fn new(default: T) -> Self {
        Self {
            current: RefCell::new(default),
        }
    }

    /// Make `value` ambient while `body` runs.
    pub fn bind<R>(&self, value: T, body: impl FnOnce() -> R) -> R {
        let previous = self.current.replace(value);
        let _restore = Restore {
            slot: &self.current,
            previous: Some(previous),
        };
        body()
    }
}

impl<T: Clone> DynamicContext<T> {
    /// Read the ambient value.
    pub fn read(&self) -> T {
        self.current.borrow().clone()
    }
}

impl<T: Default> Default for DynamicContext<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for DynamicContext<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicContext")
            .field("current", &self.current)
            .finish()
    }
}

/// Puts the displaced value back when the binding frame unwinds.
struct Restore<'a, T> {
    slot: &'a RefCell<T>,
    previous: Option<T>,
}

impl<T> Drop for Restore<'_, T> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.slot.replace(previous);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn read_returns_default_when_unbound() {
        let ctx = DynamicContext::new(7);
        assert_eq!(ctx.read(), 7);
    }

    #[test]
    fn bind_restores_previous_value() {
        let ctx = DynamicContext::new(0);

        let seen = ctx.bind(1, || ctx.read());
        assert_eq!(seen, 1);
        assert_eq!(ctx.read(), 0);
    }

    #[test]
    fn nested_binds_unwind_in_order() {
        let ctx = DynamicContext::new("root");
        let mut trail = Vec::new();

        ctx.bind("outer", || {
            trail.push(ctx.read());
            ctx.bind("inner", || trail.push(ctx.read()));
            trail.push(ctx.read());
        });
        trail.push(ctx.read());

        assert_eq!(trail, vec!["outer", "inner", "outer", "root"]);
    }

    #[test]
    fn panic_inside_body_still_restores() {
        let ctx = DynamicContext::new(String::from("before"));

        let result = catch_unwind(AssertUnwindSafe(|| {
            ctx.bind(String::from("during"), || panic!("body failed"));
        }));

        assert!(result.is_err());
        assert_eq!(ctx.read(), "before");
    }

    #[test]
    fn works_from_thread_local() {
        thread_local! {
            static DEPTH: DynamicContext<u32> = const { DynamicContext::new(0) };
        }

        DEPTH.with(|depth| {
            depth.bind(depth.read() + 1, || {
                DEPTH.with(|inner| {
                    inner.bind(inner.read() + 1, || assert_eq!(inner.read(), 2));
                });
                assert_eq!(depth.read(), 1);
            });
        });
        DEPTH.with(|depth| assert_eq!(depth.read(), 0));
    }
}
