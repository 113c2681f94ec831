//! Observable nodes
//!
//! Anything a computed can depend on (a signal or another computed) is a
//! [`Source`]. Sources are identified by a [`NodeId`] so dependency sets can
//! be diffed between evaluations.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::subscriber::SubscriberList;

/// Unique identifier for an observable node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

/// A node other computations can depend on.
pub trait Source: Send + Sync {
    /// The node's identity in dependency sets.
    fn node_id(&self) -> NodeId;

    /// The ordered subscriber list notified when this node changes.
    fn subscribers(&self) -> &Arc<SubscriberList>;
}
