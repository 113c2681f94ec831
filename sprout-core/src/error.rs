//! Error types shared by the reactive core and the component runtime.

use crate::component::LifecycleStatus;
use crate::reactive::NodeId;

/// Errors surfaced by signals, computeds, hooks, and component passes.
///
/// None of these are retried internally. Each one propagates synchronously to
/// the immediate caller.
#[derive(Debug, thiserror::Error)]
pub enum ReactiveError {
    /// A computed was read while it was already evaluating, directly or
    /// through a chain of other computeds.
    #[error("circular dependency detected while evaluating computed {node:?}")]
    CircularDependency { node: NodeId },

    /// A hook was called with no component being rendered.
    #[error("hooks can only be called while a component is rendering")]
    HookOutsideComponent,

    /// An effect received a dependency list the active policy does not accept.
    #[error("invalid dependency list: {reason}")]
    InvalidDependencyList { reason: &'static str },

    /// The hook chain was replayed with a different shape than at mount.
    #[error("hook order violation at slot {index}: {expected}")]
    HookOrderViolation {
        index: usize,
        expected: &'static str,
    },

    /// A pass was run out of lifecycle order: before mount, a second mount,
    /// or anything after unmount.
    #[error("cannot run a {status:?} pass: {reason}")]
    InvalidPass {
        status: LifecycleStatus,
        reason: &'static str,
    },

    /// A node was emitted with no children collection bound.
    #[error("no children collection is bound for the current render")]
    NoChildCollector,

    /// The bound children collection holds a different node type.
    #[error("host node type mismatch: expected {expected}")]
    HostNodeMismatch { expected: &'static str },

    /// A hook policy could not be parsed.
    #[error("invalid hook policy: {0}")]
    Config(#[from] serde_json::Error),
}

/// Convenience result type for the runtime.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;
