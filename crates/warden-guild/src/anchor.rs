//! Anchor message resolution
//!
//! An anchor is a well-known control message (the ticket button, the
//! role-reaction list) whose identity must survive restarts and out-of-band
//! deletion. Resolution tries, in order:
//!
//! 1. the persisted message id, if the message still exists;
//! 2. the most recent [`HISTORY_SCAN_WINDOW`] messages of the channel, adopting
//!    the first one matching the anchor's [`RecognitionRule`];
//! 3. posting a fresh message.
//!
//! The first success wins. Only paths 2 and 3 write the store, and at most
//! one message is created per call. Resolution of one anchor name is
//! serialized so concurrent callers never both reach path 3.

use crate::error::AnchorError;
use crate::keyed_lock::KeyedLocks;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use warden_core::effects::{AnchorRecord, AnchorStoreEffects, GuildPlatformEffects};
use warden_core::{AnchorConfig, ChannelId, Message, MessageId, MessageRef, OutgoingMessage, UserId};

/// Number of recent messages searched for an orphaned anchor
pub const HISTORY_SCAN_WINDOW: usize = 50;

/// Predicate identifying an existing message as a given anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionRule {
    marker: String,
}

impl RecognitionRule {
    /// Match system-authored messages whose text contains `marker` or whose
    /// embed title equals it
    pub fn marker(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// The configured marker
    pub fn marker_text(&self) -> &str {
        &self.marker
    }

    /// Does `message` match
    pub fn matches(&self, message: &Message, system_user: UserId) -> bool {
        if message.author.user_id != system_user || self.marker.is_empty() {
            return false;
        }
        message.content.contains(&self.marker)
            || message.embed_title.as_deref() == Some(self.marker.as_str())
    }
}

/// Everything needed to find or recreate one anchor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorSpec {
    /// Logical name, also the persistence key
    pub name: String,
    /// Channel the anchor lives in
    pub channel_id: ChannelId,
    /// Message posted when the anchor has to be created
    pub content: OutgoingMessage,
    /// How an orphaned copy is recognized in history
    pub recognition: RecognitionRule,
    /// Reactions added right after creation
    pub seed_reactions: Vec<String>,
}

impl AnchorSpec {
    /// Build an anchor from its configuration
    ///
    /// The configured `text` becomes the message content, or the embed
    /// description when a `title` is set.
    pub fn from_config(name: impl Into<String>, channel_id: ChannelId, config: &AnchorConfig) -> Self {
        let content = match &config.title {
            Some(title) => OutgoingMessage::default().with_embed(title.clone(), config.text.clone()),
            None => OutgoingMessage::text(config.text.clone()),
        };
        Self {
            name: name.into(),
            channel_id,
            content,
            recognition: RecognitionRule::marker(config.marker.clone()),
            seed_reactions: Vec::new(),
        }
    }

    /// Attach a button to the created message
    pub fn with_button(mut self, label: impl Into<String>, custom_id: impl Into<String>) -> Self {
        self.content = self.content.with_button(label, custom_id);
        self
    }

    /// Reactions to seed on creation
    pub fn with_seed_reactions<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seed_reactions = symbols.into_iter().map(Into::into).collect();
        self
    }
}

/// How a resolution was satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionPath {
    /// Persisted id still valid
    Stored,
    /// Orphaned message found in history and adopted
    Adopted,
    /// New message posted
    Created,
}

/// Three-tier anchor resolver
pub struct AnchorResolver {
    platform: Arc<dyn GuildPlatformEffects>,
    store: Arc<dyn AnchorStoreEffects>,
    locks: KeyedLocks<String>,
    current: RwLock<HashMap<String, MessageRef>>,
}

impl std::fmt::Debug for AnchorResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnchorResolver")
            .field("current", &*self.current.read())
            .finish_non_exhaustive()
    }
}

impl AnchorResolver {
    /// Create a new resolver
    pub fn new(platform: Arc<dyn GuildPlatformEffects>, store: Arc<dyn AnchorStoreEffects>) -> Self {
        Self {
            platform,
            store,
            locks: KeyedLocks::new(),
            current: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the live anchor message for `spec`
    pub async fn resolve(&self, spec: &AnchorSpec) -> Result<MessageRef, AnchorError> {
        self.resolve_with_path(spec).await.map(|(message, _)| message)
    }

    /// Resolve and report which path succeeded
    pub async fn resolve_with_path(
        &self,
        spec: &AnchorSpec,
    ) -> Result<(MessageRef, ResolutionPath), AnchorError> {
        let _guard = self.locks.lock(spec.name.clone()).await;

        let (message, path) = match self.try_stored(spec).await? {
            Some(message) => (message, ResolutionPath::Stored),
            None => match self.try_history(spec).await? {
                Some(message) => (message, ResolutionPath::Adopted),
                None => (self.create(spec).await?, ResolutionPath::Created),
            },
        };

        if path != ResolutionPath::Stored {
            self.persist(&spec.name, message).await;
        }
        self.current.write().insert(spec.name.clone(), message);
        Ok((message, path))
    }

    /// Last resolved message for `name`
    pub fn current(&self, name: &str) -> Option<MessageRef> {
        self.current.read().get(name).copied()
    }

    /// Is `message` the live anchor named `name`
    pub fn is_anchor(&self, name: &str, message: MessageId) -> bool {
        self.current(name).is_some_and(|m| m.message_id == message)
    }

    async fn try_stored(&self, spec: &AnchorSpec) -> Result<Option<MessageRef>, AnchorError> {
        let record = match self.store.load_anchor(&spec.name).await {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(None),
            Err(e) => {
                tracing::warn!(anchor = %spec.name, error = %e, "anchor record unreadable, treating as absent");
                return Ok(None);
            }
        };

        if !record.applies_to(spec.channel_id) {
            tracing::info!(
                anchor = %spec.name,
                channel = %spec.channel_id,
                "anchor record belongs to another channel, ignoring"
            );
            return Ok(None);
        }
        let Some(message_id) = record.message_id else {
            return Ok(None);
        };

        match self.platform.fetch_message(spec.channel_id, message_id).await {
            Ok(message) => {
                tracing::info!(anchor = %spec.name, message = %message.id, "found existing anchor message");
                Ok(Some(message.reference()))
            }
            Err(e) if e.is_not_found() => {
                tracing::info!(
                    anchor = %spec.name,
                    message = %message_id,
                    "stored anchor message not found, searching history"
                );
                Ok(None)
            }
            Err(e) => Err(AnchorError::channel_unavailable(&spec.name, spec.channel_id, &e)),
        }
    }

    async fn try_history(&self, spec: &AnchorSpec) -> Result<Option<MessageRef>, AnchorError> {
        let history = self
            .platform
            .channel_history(spec.channel_id, HISTORY_SCAN_WINDOW)
            .await
            .map_err(|e| AnchorError::channel_unavailable(&spec.name, spec.channel_id, &e))?;

        let system_user = self.platform.system_user();
        let found = history
            .iter()
            .take(HISTORY_SCAN_WINDOW)
            .find(|m| spec.recognition.matches(m, system_user))
            .map(Message::reference);

        if let Some(message) = found {
            tracing::info!(anchor = %spec.name, message = %message.message_id, "adopted anchor message from history");
        }
        Ok(found)
    }

    async fn create(&self, spec: &AnchorSpec) -> Result<MessageRef, AnchorError> {
        let message = self
            .platform
            .send_channel_message(spec.channel_id, spec.content.clone())
            .await
            .map_err(|e| AnchorError::channel_unavailable(&spec.name, spec.channel_id, &e))?;

        for symbol in &spec.seed_reactions {
            if let Err(e) = self.platform.add_reaction(message, symbol).await {
                tracing::warn!(anchor = %spec.name, symbol = %symbol, error = %e, "failed to seed anchor reaction");
            }
        }

        tracing::info!(anchor = %spec.name, message = %message.message_id, "created new anchor message");
        Ok(message)
    }

    async fn persist(&self, name: &str, message: MessageRef) {
        let record = AnchorRecord::new(name, message.channel_id, message.message_id);
        // The message exists either way; a later resolution re-adopts it from history.
        if let Err(e) = self.store.save_anchor(&record).await {
            tracing::warn!(anchor = name, error = %e, "failed to persist anchor record");
        }
    }
}
