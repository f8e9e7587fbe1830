//! Filesystem-backed anchor store
//!
//! Each anchor is one JSON file named `<anchor>_message.json` holding
//! `{"message_id": .., "channel_id": ..}`. Files written before channels were
//! tracked carry only `message_id` and still load.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use warden_core::effects::{AnchorRecord, AnchorStoreEffects};
use warden_core::{ChannelId, MessageId, StorageError};

const FILE_SUFFIX: &str = "_message.json";

#[derive(Debug, Serialize, Deserialize)]
struct PersistedAnchor {
    #[serde(default)]
    message_id: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channel_id: Option<ChannelId>,
}

/// Filesystem anchor store for production use
#[derive(Debug, Clone)]
pub struct FilesystemAnchorStore {
    base_path: PathBuf,
}

impl FilesystemAnchorStore {
    /// Create a store rooted at `base_path`
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Directory holding the records
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path of the record file for `name`
    pub fn record_path(&self, name: &str) -> PathBuf {
        self.base_path.join(format!("{name}{FILE_SUFFIX}"))
    }

    fn check_name(name: &str) -> Result<(), StorageError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if valid {
            Ok(())
        } else {
            Err(StorageError::InvalidKey {
                reason: format!("anchor name '{name}' must be non-empty [A-Za-z0-9_-]"),
            })
        }
    }

    async fn read_record(&self, name: &str, path: &Path) -> Option<AnchorRecord> {
        let raw = match fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(anchor = name, error = %e, "anchor record unreadable, ignoring");
                return None;
            }
        };

        match serde_json::from_slice::<PersistedAnchor>(&raw) {
            Ok(persisted) => Some(AnchorRecord {
                name: name.to_string(),
                channel_id: persisted.channel_id,
                message_id: persisted.message_id,
            }),
            Err(e) => {
                tracing::warn!(anchor = name, error = %e, "anchor record corrupt, ignoring");
                None
            }
        }
    }
}

#[async_trait]
impl AnchorStoreEffects for FilesystemAnchorStore {
    async fn load_anchor(&self, name: &str) -> Result<Option<AnchorRecord>, StorageError> {
        Self::check_name(name)?;
        let path = self.record_path(name);
        Ok(self.read_record(name, &path).await)
    }

    async fn save_anchor(&self, record: &AnchorRecord) -> Result<(), StorageError> {
        Self::check_name(&record.name)?;

        fs::create_dir_all(&self.base_path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create directory: {}", e))
        })?;

        let payload = serde_json::to_vec(&PersistedAnchor {
            message_id: record.message_id,
            channel_id: record.channel_id,
        })
        .map_err(|e| StorageError::WriteFailed(format!("Failed to encode record: {}", e)))?;

        // Write-then-rename so a crash never leaves a half-written record.
        let path = self.record_path(&record.name);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, payload)
            .await
            .map_err(|e| StorageError::WriteFailed(format!("Failed to write file: {}", e)))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| StorageError::WriteFailed(format!("Failed to replace file: {}", e)))?;

        Ok(())
    }

    async fn forget_anchor(&self, name: &str) -> Result<bool, StorageError> {
        Self::check_name(name)?;
        match fs::remove_file(self.record_path(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to remove file: {}",
                e
            ))),
        }
    }

    async fn list_anchors(&self) -> Result<Vec<AnchorRecord>, StorageError> {
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::ReadFailed(format!(
                    "Failed to read directory: {}",
                    e
                )))
            }
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            StorageError::ReadFailed(format!("Failed to read directory entry: {}", e))
        })? {
            let file_name = entry.file_name();
            let Some(name) = file_name
                .to_str()
                .and_then(|n| n.strip_suffix(FILE_SUFFIX))
            else {
                continue;
            };
            if Self::check_name(name).is_err() {
                continue;
            }
            if let Some(record) = self.read_record(name, &entry.path()).await {
                records.push(record);
            }
        }

        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_record_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemAnchorStore::new(dir.path());
        assert_eq!(store.load_anchor("ticket").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemAnchorStore::new(dir.path());
        let record = AnchorRecord::new("ticket", ChannelId::new(10), MessageId::new(42));

        store.save_anchor(&record).await.unwrap();
        assert_eq!(store.load_anchor("ticket").await.unwrap(), Some(record));
        assert!(dir.path().join("ticket_message.json").exists());
    }

    #[tokio::test]
    async fn test_legacy_file_without_channel() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("roles_message.json"), r#"{"message_id": 99}"#).unwrap();

        let store = FilesystemAnchorStore::new(dir.path());
        let record = store.load_anchor("roles").await.unwrap().unwrap();
        assert_eq!(record.message_id, Some(MessageId::new(99)));
        assert_eq!(record.channel_id, None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_treated_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ticket_message.json"), b"{not json").unwrap();

        let store = FilesystemAnchorStore::new(dir.path());
        assert_eq!(store.load_anchor("ticket").await.unwrap(), None);
        assert!(store.list_anchors().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_and_forget() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemAnchorStore::new(dir.path());
        store
            .save_anchor(&AnchorRecord::new("roles", ChannelId::new(2), MessageId::new(20)))
            .await
            .unwrap();
        store
            .save_anchor(&AnchorRecord::new("ticket", ChannelId::new(1), MessageId::new(10)))
            .await
            .unwrap();

        let names: Vec<_> = store
            .list_anchors()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["roles", "ticket"]);

        assert!(store.forget_anchor("roles").await.unwrap());
        assert!(!store.forget_anchor("roles").await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemAnchorStore::new(dir.path());
        assert!(matches!(
            store.load_anchor("../etc").await,
            Err(StorageError::InvalidKey { .. })
        ));
    }
}
