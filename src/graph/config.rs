// SPDX-License-Identifier: MIT

//! Immutable per-invocation run configuration

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Options supplied when a run is invoked
///
/// Nodes and routers only ever see `&RunConfig`; nothing mutates it after
/// the run starts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunConfig {
    options: Map<String, Value>,
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option, builder style
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Boolean flag, absent or non-boolean reads as false
    pub fn get_bool(&self, key: &str) -> bool {
        self.options.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(Value::as_str)
    }

    /// Option rendered as a partition identifier
    ///
    /// Strings are used as-is and numbers are formatted; anything else, or an
    /// empty string, yields `None`.
    pub fn partition_value(&self, key: &str) -> Option<String> {
        match self.options.get(key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for RunConfig {
    fn from(options: Map<String, Value>) -> Self {
        Self { options }
    }
}
