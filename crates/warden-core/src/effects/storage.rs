//! Anchor persistence effects

use crate::errors::StorageError;
use crate::identifiers::{ChannelId, MessageId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Persisted identity of an anchor message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    /// Logical anchor name (`ticket`, `roles`)
    pub name: String,
    /// Channel the message lives in; absent in records written before
    /// channels were tracked
    pub channel_id: Option<ChannelId>,
    /// Authoritative message id
    pub message_id: Option<MessageId>,
}

impl AnchorRecord {
    /// Record pointing at a live message
    pub fn new(name: impl Into<String>, channel_id: ChannelId, message_id: MessageId) -> Self {
        Self {
            name: name.into(),
            channel_id: Some(channel_id),
            message_id: Some(message_id),
        }
    }

    /// True if the record may be used for `channel`
    pub fn applies_to(&self, channel: ChannelId) -> bool {
        self.channel_id.map(|c| c == channel).unwrap_or(true)
    }
}

/// One small record per anchor name
///
/// Implementations must treat a missing or unreadable record as `Ok(None)`;
/// a corrupt file is "no anchor recorded yet", never a fatal error.
#[async_trait]
pub trait AnchorStoreEffects: Send + Sync {
    /// Read the record for `name`
    async fn load_anchor(&self, name: &str) -> Result<Option<AnchorRecord>, StorageError>;

    /// Overwrite the record for `record.name`
    async fn save_anchor(&self, record: &AnchorRecord) -> Result<(), StorageError>;

    /// Delete the record; returns whether one existed
    async fn forget_anchor(&self, name: &str) -> Result<bool, StorageError>;

    /// Every readable record, sorted by name
    async fn list_anchors(&self) -> Result<Vec<AnchorRecord>, StorageError>;
}
