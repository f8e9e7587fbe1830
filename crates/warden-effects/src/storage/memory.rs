//! In-memory anchor store
//!
//! Records live for the lifetime of the process. Useful for dry runs and as
//! the default when no state directory is configured.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use warden_core::effects::{AnchorRecord, AnchorStoreEffects};
use warden_core::StorageError;

/// In-memory anchor store
#[derive(Debug, Clone, Default)]
pub struct MemoryAnchorStore {
    records: Arc<RwLock<BTreeMap<String, AnchorRecord>>>,
}

impl MemoryAnchorStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `records`
    pub fn with_records(records: impl IntoIterator<Item = AnchorRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|record| (record.name.clone(), record))
            .collect();
        Self {
            records: Arc::new(RwLock::new(map)),
        }
    }
}

#[async_trait]
impl AnchorStoreEffects for MemoryAnchorStore {
    async fn load_anchor(&self, name: &str) -> Result<Option<AnchorRecord>, StorageError> {
        let records = self.records.read().await;
        Ok(records.get(name).cloned())
    }

    async fn save_anchor(&self, record: &AnchorRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        records.insert(record.name.clone(), record.clone());
        Ok(())
    }

    async fn forget_anchor(&self, name: &str) -> Result<bool, StorageError> {
        let mut records = self.records.write().await;
        Ok(records.remove(name).is_some())
    }

    async fn list_anchors(&self) -> Result<Vec<AnchorRecord>, StorageError> {
        let records = self.records.read().await;
        Ok(records.values().cloned().collect())
    }
}
