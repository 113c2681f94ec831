//! Component Lifecycle Context
//!
//! Every component instantiation owns one [`LifecycleContext`]: its hook
//! chain, the status of the pass currently running (mount, update, or
//! unmount), a dirty flag raised by state setters, and an optional identity
//! key for keyed reconciliation.
//!
//! A pass binds the context as the ambient component through a
//! [`DynamicContext`], so hooks find it without parameter threading.
//!
//! # Hook chain
//!
//! The chain is a vector indexed by call order with a cursor reset at the
//! start of every pass. A mount pass appends one record per hook call;
//! update and unmount passes replay the records in the same order. Calling
//! hooks conditionally breaks that pairing, and the runtime reports it as a
//! [`ReactiveError::HookOrderViolation`] wherever the mismatch is visible.
//!
//! # Pass order
//!
//! An instance mounts once, updates any number of times, and unmounts once.
//! Unmount is terminal. Any other order fails with
//! [`ReactiveError::InvalidPass`] before the body runs.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::config::HookPolicy;
use crate::dynamic::DynamicContext;
use crate::error::{ReactiveError, Result};

thread_local! {
    static CURRENT: DynamicContext<Option<Rc<LifecycleContext>>> = const { DynamicContext::new(None) };
}

/// The component instance currently rendering on this thread, if any.
pub fn current() -> Option<Rc<LifecycleContext>> {
    CURRENT.with(|current| current.read())
}

/// Which pass a component body is running under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    Mount,
    Update,
    Unmount,
}

/// Identity key a reconciler uses to match instances across renders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Num(i64),
    Str(String),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Num(n) => write!(f, "{n}"),
            Key::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Key {
    fn from(key: &str) -> Self {
        Key::Str(key.to_owned())
    }
}

impl From<String> for Key {
    fn from(key: String) -> Self {
        Key::Str(key)
    }
}

impl From<i64> for Key {
    fn from(key: i64) -> Self {
        Key::Num(key)
    }
}

impl From<i32> for Key {
    fn from(key: i32) -> Self {
        Key::Num(key.into())
    }
}

impl From<u32> for Key {
    fn from(key: u32) -> Self {
        Key::Num(key.into())
    }
}

// Values past `i64::MAX` fall back to their decimal string, which stays unique.
impl From<u64> for Key {
    fn from(key: u64) -> Self {
        i64::try_from(key).map_or_else(|_| Key::Str(key.to_string()), Key::Num)
    }
}

impl From<usize> for Key {
    fn from(key: usize) -> Self {
        i64::try_from(key).map_or_else(|_| Key::Str(key.to_string()), Key::Num)
    }
}

/// Where an instance is in its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Fresh,
    Mounted,
    Unmounted,
}

/// One position in the hook chain.
#[derive(Default)]
struct HookRecord {
    payload: Option<Box<dyn Any>>,
}

/// Per-instantiation lifecycle state.
pub struct LifecycleContext {
    status: Cell<LifecycleStatus>,
    phase: Cell<Phase>,
    hooks: RefCell<Vec<HookRecord>>,
    cursor: Cell<usize>,
    dirty: Cell<bool>,
    key: RefCell<Option<Key>>,
    policy: HookPolicy,
}

impl LifecycleContext {
    /// Create a context that has not rendered yet.
    pub fn new(policy: HookPolicy) -> Rc<Self> {
        Rc::new(Self {
            status: Cell::new(LifecycleStatus::Mount),
            phase: Cell::new(Phase::Fresh),
            hooks: RefCell::new(Vec::new()),
            cursor: Cell::new(0),
            dirty: Cell::new(false),
            key: RefCell::new(None),
            policy,
        })
    }

    /// Run `body` as one pass of this instance.
    ///
    /// The mount pass builds the hook chain. Update and unmount passes must
    /// call exactly as many hooks as the mount pass did.
    pub fn run<R>(
        self: &Rc<Self>,
        status: LifecycleStatus,
        body: impl FnOnce() -> Result<R>,
    ) -> Result<R> {
        self.advance(status)?;
        self.status.set(status);
        self.cursor.set(0);

        tracing::debug!(?status, key = ?self.key(), "component pass");
        let value = CURRENT.with(|current| current.bind(Some(Rc::clone(self)), body))?;

        let replayed = self.cursor.get();
        let recorded = self.hook_count();
        if status != LifecycleStatus::Mount && replayed != recorded {
            tracing::warn!(replayed, recorded, ?status, "hook chain replayed with a different length");
            return Err(ReactiveError::HookOrderViolation {
                index: replayed,
                expected: "the same number of hooks as the mount pass",
            });
        }
        Ok(value)
    }

    pub fn mount<R>(self: &Rc<Self>, body: impl FnOnce() -> Result<R>) -> Result<R> {
        self.run(LifecycleStatus::Mount, body)
    }

    pub fn update<R>(self: &Rc<Self>, body: impl FnOnce() -> Result<R>) -> Result<R> {
        self.run(LifecycleStatus::Update, body)
    }

    pub fn unmount<R>(self: &Rc<Self>, body: impl FnOnce() -> Result<R>) -> Result<R> {
        self.run(LifecycleStatus::Unmount, body)
    }

    /// Whether the unmount pass has run. No pass runs after it.
    pub fn is_unmounted(&self) -> bool {
        self.phase.get() == Phase::Unmounted
    }

    fn advance(&self, status: LifecycleStatus) -> Result<()> {
        let next = match (self.phase.get(), status) {
            (Phase::Unmounted, _) => Err("the instance was unmounted"),
            (Phase::Fresh, LifecycleStatus::Mount) => Ok(Phase::Mounted),
            (Phase::Fresh, _) => Err("the instance has not mounted"),
            (Phase::Mounted, LifecycleStatus::Mount) => Err("the instance is already mounted"),
            (Phase::Mounted, LifecycleStatus::Update) => Ok(Phase::Mounted),
            (Phase::Mounted, LifecycleStatus::Unmount) => Ok(Phase::Unmounted),
        };

        match next {
            Ok(phase) => {
                self.phase.set(phase);
                Ok(())
            }
            Err(reason) => {
                tracing::warn!(?status, reason, "pass rejected");
                Err(ReactiveError::InvalidPass { status, reason })
            }
        }
    }

    /// Status of the current (or most recent) pass.
    pub fn status(&self) -> LifecycleStatus {
        self.status.get()
    }

    pub fn policy(&self) -> HookPolicy {
        self.policy
    }

    /// Number of records in the hook chain.
    pub fn hook_count(&self) -> usize {
        self.hooks.borrow().len()
    }

    /// Record the identity key used by keyed reconciliation.
    pub fn set_key(&self, key: Key) {
        *self.key.borrow_mut() = Some(key);
    }

    pub fn key(&self) -> Option<Key> {
        self.key.borrow().clone()
    }

    /// Flag the instance as needing a re-render.
    pub fn mark_dirty(&self) {
        self.dirty.set(true);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Clear the dirty flag, returning whether it was set.
    pub fn take_dirty(&self) -> bool {
        self.dirty.replace(false)
    }

    /// Advance the cursor to the next hook record.
    ///
    /// Appends a record on mount; replays an existing one otherwise.
    pub(crate) fn next_slot(&self) -> Result<usize> {
        let index = self.cursor.get();
        match self.status.get() {
            LifecycleStatus::Mount => self.hooks.borrow_mut().push(HookRecord::default()),
            LifecycleStatus::Update | LifecycleStatus::Unmount => {
                if index >= self.hook_count() {
                    tracing::warn!(index, "more hooks called than at mount");
                    return Err(ReactiveError::HookOrderViolation {
                        index,
                        expected: "no more hooks than the mount pass",
                    });
                }
            }
        }
        self.cursor.set(index + 1);
        Ok(index)
    }

    /// Clone the payload stored at `index`.
    pub(crate) fn payload<T: Clone + 'static>(&self, index: usize) -> Result<T> {
        self.hooks
            .borrow()
            .get(index)
            .and_then(|record| record.payload.as_ref())
            .and_then(|payload| payload.downcast_ref::<T>())
            .cloned()
            .ok_or(ReactiveError::HookOrderViolation {
                index,
                expected: "a payload of the type stored at mount",
            })
    }

    /// Overwrite the payload stored at `index`.
    pub(crate) fn set_payload<T: 'static>(&self, index: usize, payload: T) {
        if let Some(record) = self.hooks.borrow_mut().get_mut(index) {
            record.payload = Some(Box::new(payload));
        }
    }
}

impl fmt::Debug for LifecycleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleContext")
            .field("status", &self.status())
            .field("unmounted", &self.is_unmounted())
            .field("hook_count", &self.hook_count())
            .field("dirty", &self.is_dirty())
            .field("key", &self.key())
            .finish()
    }
}
