// SPDX-License-Identifier: MIT

//! Directory-backed store, one JSON document per partition

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{PartitionKey, SharedStore};
use crate::error::StoreError;

/// On-disk layout of a partition
#[derive(Debug, Serialize, Deserialize)]
struct StoredValue {
    value: Value,
    updated_at: DateTime<Utc>,
}

/// Stores each partition at `<root>/<namespace>/<id>.json`
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &PartitionKey) -> Result<PathBuf, StoreError> {
        for part in [&key.namespace, &key.id] {
            let valid = !part.is_empty()
                && part != "."
                && part != ".."
                && !part.contains(['/', '\\', '\0']);
            if !valid {
                return Err(StoreError::InvalidKey(key.to_string()));
            }
        }
        Ok(self
            .root
            .join(&key.namespace)
            .join(format!("{}.json", key.id)))
    }

    /// Last time the partition was written, if ever
    pub async fn updated_at(
        &self,
        key: &PartitionKey,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        Ok(self.read(key).await?.map(|stored| stored.updated_at))
    }

    async fn read(&self, key: &PartitionKey) -> Result<Option<StoredValue>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl SharedStore for FileStore {
    async fn get(&self, key: &PartitionKey) -> Result<Option<Value>, StoreError> {
        let stored = self.read(key).await?;
        log::debug!("FileStore get {} (hit: {})", key, stored.is_some());
        Ok(stored.map(|s| s.value))
    }

    async fn put(&self, key: &PartitionKey, value: Value) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let stored = StoredValue {
            value,
            updated_at: Utc::now(),
        };
        let bytes = serde_json::to_vec_pretty(&stored)?;

        // write then rename so readers never observe a partial document
        let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4()));
        fs::write(&tmp, bytes).await?;
        fs::rename(&tmp, &path).await?;

        log::debug!("FileStore put {}", key);
        Ok(())
    }
}
