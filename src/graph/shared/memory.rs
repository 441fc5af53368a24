// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{PartitionKey, SharedStore};
use crate::error::StoreError;

/// Process-local store, shared by cloning
#[derive(Clone, Default)]
pub struct InMemoryStore {
    values: Arc<RwLock<HashMap<PartitionKey, Value>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of partitions holding a value
    pub async fn len(&self) -> usize {
        self.values.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.values.read().await.is_empty()
    }
}

#[async_trait]
impl SharedStore for InMemoryStore {
    async fn get(&self, key: &PartitionKey) -> Result<Option<Value>, StoreError> {
        let values = self.values.read().await;
        Ok(values.get(key).cloned())
    }

    async fn put(&self, key: &PartitionKey, value: Value) -> Result<(), StoreError> {
        let mut values = self.values.write().await;
        values.insert(key.clone(), value);
        Ok(())
    }
}
