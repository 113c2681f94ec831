//! Hook Policy
//!
//! Two behaviors of the standard hooks are policy choices rather than fixed
//! rules. A [`HookPolicy`] pins both for every instance a component creates.
//!
//! ```rust
//! use sprout_core::config::{HookPolicy, MissingDepsPolicy, StateUpdatePolicy};
//!
//! let policy = HookPolicy::from_json(r#"{ "missing_deps": "reject" }"#).unwrap();
//! assert_eq!(policy.missing_deps, MissingDepsPolicy::Reject);
//! assert_eq!(policy.state_updates, StateUpdatePolicy::ChangeGated);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// How a state setter treats a value equal to the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateUpdatePolicy {
    /// Store and mark the instance dirty only when the value changed.
    #[default]
    ChangeGated,

    /// Always store and mark the instance dirty.
    Always,
}

/// How an effect treats a missing dependency list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDepsPolicy {
    /// Rerun the effect on every update pass.
    #[default]
    AlwaysRerun,

    /// Fail with [`ReactiveError::InvalidDependencyList`](crate::ReactiveError::InvalidDependencyList).
    Reject,
}

/// Policy carried by every lifecycle context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HookPolicy {
    pub state_updates: StateUpdatePolicy,
    pub missing_deps: MissingDepsPolicy,
}

impl HookPolicy {
    /// Strict variant: missing effect dependencies are an error.
    pub fn strict() -> Self {
        Self {
            missing_deps: MissingDepsPolicy::Reject,
            ..Self::default()
        }
    }

    /// Parse a policy from JSON. Omitted fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_state_updates(mut self, state_updates: StateUpdatePolicy) -> Self {
        self.state_updates = state_updates;
        self
    }

    pub fn with_missing_deps(mut self, missing_deps: MissingDepsPolicy) -> Self {
        self.missing_deps = missing_deps;
        self
    }
}
