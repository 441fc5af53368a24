// SPDX-License-Identifier: MIT

//! Shared value store for state that outlives a run
//!
//! Shared fields are never held in transient run state. Each one is stored
//! under a [`PartitionKey`] made of the field name and the value of the run
//! configuration option the schema partitions it by.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::InMemoryStore;

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use crate::error::StoreError;

/// Address of a shared value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    /// Shared field name
    pub namespace: String,
    /// Owner of the value, e.g. an assistant id
    pub id: String,
}

impl PartitionKey {
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.id)
    }
}

/// Key-value store backing shared fields
///
/// Implementations must give read-your-writes for a single key once `put`
/// has returned. Writes are last-write-wins; there is no cross-key atomicity.
#[async_trait]
pub trait SharedStore: Send + Sync {
    /// Current value, `None` if nothing was ever written
    async fn get(&self, key: &PartitionKey) -> Result<Option<Value>, StoreError>;

    /// Replace the value under `key`
    async fn put(&self, key: &PartitionKey, value: Value) -> Result<(), StoreError>;
}
