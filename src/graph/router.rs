// SPDX-License-Identifier: MIT

//! Conditional edge routing

use std::fmt;

use super::config::RunConfig;
use super::state::StateSnapshot;

/// Name of the virtual node every run begins at
pub const START: &str = "__start__";

/// Name of the terminal marker
pub const END: &str = "__end__";

/// Where a transition leads
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Run the named node next
    Node(String),
    /// Terminate the run
    End,
}

impl Target {
    pub fn node(name: impl Into<String>) -> Self {
        Self::Node(name.into())
    }

    /// Parse a node name, mapping [`END`] to the terminal marker
    pub fn from_name(name: &str) -> Self {
        if name == END {
            Self::End
        } else {
            Self::Node(name.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Target::Node(name) => name,
            Target::End => END,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for Target {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

/// Pure routing function of state and configuration
///
/// Routers are synchronous and receive shared references only, so they
/// cannot have effects on the run.
pub trait Router: Send + Sync {
    fn route(&self, state: &StateSnapshot, config: &RunConfig) -> Target;
}

impl<F> Router for F
where
    F: Fn(&StateSnapshot, &RunConfig) -> Target + Send + Sync,
{
    fn route(&self, state: &StateSnapshot, config: &RunConfig) -> Target {
        self(state, config)
    }
}
