//! Hooks
//!
//! Hooks attach persistent state to a position in a component's call
//! sequence. Every hook claims the next record of the ambient instance's
//! hook chain through [`use_hook`]; on mount it initializes the record, on
//! update and unmount it reads back what mount stored.
//!
//! Hooks must be called unconditionally and in the same order on every pass.
//!
//! # Dependency lists
//!
//! Memoizing hooks take a dependency list: any `PartialEq` value, usually a
//! tuple or array. A list is unchanged when it compares equal to the one
//! stored last time, which for tuples, arrays, and vectors means equal length
//! and pairwise-equal entries.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use super::lifecycle::{self, LifecycleContext, LifecycleStatus};
use crate::config::{MissingDepsPolicy, StateUpdatePolicy};
use crate::error::{ReactiveError, Result};
use crate::reactive::{Computed, Signal};

/// Cleanup returned by an effect.
pub type Cleanup = Box<dyn FnOnce()>;

/// The hook record claimed by one hook call.
pub struct HookSlot {
    context: Rc<LifecycleContext>,
    index: usize,
}

/// Claim the next record in the ambient component's hook chain.
///
/// Fails with [`ReactiveError::HookOutsideComponent`] when no component is
/// rendering.
pub fn use_hook() -> Result<HookSlot> {
    let context = lifecycle::current().ok_or(ReactiveError::HookOutsideComponent)?;
    let index = context.next_slot()?;
    Ok(HookSlot { context, index })
}

impl HookSlot {
    /// Position of this record in the chain.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn status(&self) -> LifecycleStatus {
        self.context.status()
    }

    pub fn context(&self) -> &Rc<LifecycleContext> {
        &self.context
    }

    /// Clone the stored payload.
    pub fn payload<T: Clone + 'static>(&self) -> Result<T> {
        self.context.payload(self.index)
    }

    /// Replace the stored payload.
    pub fn set_payload<T: 'static>(&self, payload: T) {
        self.context.set_payload(self.index, payload);
    }

    /// Store `init()` on mount, then return the stored payload.
    fn mount_with<T: Clone + 'static>(&self, init: impl FnOnce() -> T) -> Result<T> {
        if self.status() == LifecycleStatus::Mount {
            self.set_payload(init());
        }
        self.payload()
    }
}

// ----------------------------------------------------------------------------
// State
// ----------------------------------------------------------------------------

/// Setter returned by [`use_state`].
pub struct StateSetter<T> {
    cell: Rc<RefCell<T>>,
    context: Weak<LifecycleContext>,
}

impl<T: PartialEq> StateSetter<T> {
    /// Store `value` and flag the instance for re-render.
    ///
    /// Under [`StateUpdatePolicy::ChangeGated`] an equal value is ignored.
    /// Returns whether the value was stored.
    pub fn set(&self, value: T) -> bool {
        let context = self.context.upgrade();
        let policy = context
            .as_ref()
            .map(|context| context.policy().state_updates)
            .unwrap_or_default();

        if policy == StateUpdatePolicy::ChangeGated && *self.cell.borrow() == value {
            return false;
        }

        *self.cell.borrow_mut() = value;
        if let Some(context) = context {
            context.mark_dirty();
        }
        true
    }

    /// Compute the next value from the stored one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) -> bool {
        let next = f(&self.cell.borrow());
        self.set(next)
    }
}

impl<T: Clone> StateSetter<T> {
    /// The value as of the latest `set`.
    pub fn current(&self) -> T {
        self.cell.borrow().clone()
    }
}

impl<T> Clone for StateSetter<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Rc::clone(&self.cell),
            context: Weak::clone(&self.context),
        }
    }
}

/// Persistent per-instance state.
pub fn use_state<T>(initial: T) -> Result<(T, StateSetter<T>)>
where
    T: Clone + PartialEq + 'static,
{
    use_state_with(move || initial)
}

/// Like [`use_state`], but only runs `init` on mount.
pub fn use_state_with<T, F>(init: F) -> Result<(T, StateSetter<T>)>
where
    T: Clone + PartialEq + 'static,
    F: FnOnce() -> T,
{
    let slot = use_hook()?;
    let cell: Rc<RefCell<T>> = slot.mount_with(|| Rc::new(RefCell::new(init())))?;
    let value = cell.borrow().clone();
    let setter = StateSetter {
        cell,
        context: Rc::downgrade(slot.context()),
    };
    Ok((value, setter))
}

// ----------------------------------------------------------------------------
// Observables
// ----------------------------------------------------------------------------

/// A signal created on mount and returned unchanged on later passes.
pub fn use_signal<T>(initial: T) -> Result<Signal<T>>
where
    T: Clone + Send + Sync + 'static,
{
    use_hook()?.mount_with(move || Signal::new(initial))
}

/// A computed created on mount and returned unchanged on later passes.
pub fn use_computed<T, F>(compute: F) -> Result<Computed<T>>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    use_hook()?.mount_with(move || Computed::new(compute))
}

// ----------------------------------------------------------------------------
// Effects
// ----------------------------------------------------------------------------

struct EffectRecord<D> {
    cleanup: Option<Cleanup>,
    deps: Option<D>,
}

/// Run `effect` on mount and whenever `deps` changes.
///
/// The previous cleanup runs right before each rerun and on unmount. `None`
/// dependencies rerun on every update unless the instance's policy rejects
/// them. The unmount pass only runs the cleanup and accepts any `deps`.
pub fn use_effect<D, F>(effect: F, deps: Option<D>) -> Result<()>
where
    D: PartialEq + 'static,
    F: FnOnce() -> Option<Cleanup>,
{
    let slot = use_hook()?;

    // Teardown ignores dependencies, so it never rejects them.
    let tearing_down = slot.status() == LifecycleStatus::Unmount;
    if !tearing_down
        && deps.is_none()
        && slot.context().policy().missing_deps == MissingDepsPolicy::Reject
    {
        return Err(ReactiveError::InvalidDependencyList {
            reason: "the hook policy requires effect dependencies",
        });
    }

    match slot.status() {
        LifecycleStatus::Mount => {
            let cleanup = effect();
            slot.set_payload(Rc::new(RefCell::new(EffectRecord { cleanup, deps })));
        }
        LifecycleStatus::Update => {
            let record: Rc<RefCell<EffectRecord<D>>> = slot.payload()?;
            let changed = match (&record.borrow().deps, &deps) {
                (Some(previous), Some(next)) => previous != next,
                _ => true,
            };
            if changed {
                run_cleanup(&record);
                let cleanup = effect();
                *record.borrow_mut() = EffectRecord { cleanup, deps };
            }
        }
        LifecycleStatus::Unmount => {
            let record: Rc<RefCell<EffectRecord<D>>> = slot.payload()?;
            run_cleanup(&record);
        }
    }
    Ok(())
}

fn run_cleanup<D>(record: &RefCell<EffectRecord<D>>) {
    let cleanup = record.borrow_mut().cleanup.take();
    if let Some(cleanup) = cleanup {
        cleanup();
    }
}

// ----------------------------------------------------------------------------
// Memoization
// ----------------------------------------------------------------------------

struct MemoRecord<T, D> {
    value: T,
    deps: D,
}

/// Cache `factory()` until `deps` changes.
pub fn use_memo<T, D, F>(factory: F, deps: D) -> Result<T>
where
    T: Clone + 'static,
    D: PartialEq + 'static,
    F: FnOnce() -> T,
{
    let slot = use_hook()?;

    if slot.status() == LifecycleStatus::Mount {
        let value = factory();
        slot.set_payload(Rc::new(RefCell::new(MemoRecord {
            value: value.clone(),
            deps,
        })));
        return Ok(value);
    }

    // Unmount passes read the cache without recomputing.
    let record: Rc<RefCell<MemoRecord<T, D>>> = slot.payload()?;
    let changed = slot.status() == LifecycleStatus::Update && record.borrow().deps != deps;
    if changed {
        let value = factory();
        *record.borrow_mut() = MemoRecord { value, deps };
    }
    let value = record.borrow().value.clone();
    Ok(value)
}

/// Keep the same callback until `deps` changes.
pub fn use_callback<F, D>(callback: F, deps: D) -> Result<F>
where
    F: Clone + 'static,
    D: PartialEq + 'static,
{
    use_memo(move || callback, deps)
}

/// A boxed value that survives every pass of the instance.
pub struct MutableRef<T>(Rc<RefCell<T>>);

impl<T> MutableRef<T> {
    pub fn new(value: T) -> Self {
        Self(Rc::new(RefCell::new(value)))
    }

    pub fn borrow(&self) -> Ref<'_, T> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.0.borrow_mut()
    }

    /// Replace the current value, returning the old one.
    pub fn set(&self, value: T) -> T {
        self.0.replace(value)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: Clone> MutableRef<T> {
    pub fn current(&self) -> T {
        self.0.borrow().clone()
    }
}

impl<T> Clone for MutableRef<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> PartialEq for MutableRef<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for MutableRef<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("MutableRef").field(&self.0.borrow()).finish()
    }
}

/// A [`MutableRef`] created on mount with `initial`.
pub fn use_ref<T: 'static>(initial: T) -> Result<MutableRef<T>> {
    use_memo(move || MutableRef::new(initial), ())
}
