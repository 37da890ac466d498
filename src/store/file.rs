//! File-backed store
//!
//! Keeps all pairs in memory and rewrites the whole JSON object on every change, so
//! thresholds and last-sent timestamps survive a restart of the hub.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, trace};

use super::ConfigStore;
use super::error::{StoreError, StoreResult};

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`; a missing file starts out empty.
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();

        let values = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => HashMap::new(),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!("opened store {} with {} keys", path.display(), values.len());

        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    async fn persist(&self, values: &HashMap<String, String>) -> StoreResult<()> {
        let content = serde_json::to_string_pretty(values)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        trace!("persisted {} keys to {}", values.len(), self.path.display());
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    // changes are applied to a copy and only become visible once they are on disk

    async fn set(&self, key: &str, value: String) -> StoreResult<()> {
        let mut values = self.values.write().await;
        let mut updated = values.clone();
        updated.insert(key.to_string(), value);
        self.persist(&updated).await?;
        *values = updated;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        let mut values = self.values.write().await;
        if !values.contains_key(key) {
            return Ok(());
        }

        let mut updated = values.clone();
        updated.remove(key);
        self.persist(&updated).await?;
        *values = updated;
        Ok(())
    }
}
