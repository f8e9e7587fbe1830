//! Integration Tests for Anchor Resolution
//!
//! Covers the three resolution paths against the in-memory guild:
//! - stored id still valid
//! - orphaned message adopted from history
//! - fresh message created and seeded
//!
//! plus idempotence, concurrency and failure handling.

use async_trait::async_trait;
use std::sync::Arc;
use warden_core::effects::{AnchorRecord, AnchorStoreEffects};
use warden_core::{ChannelId, MessageId, OutgoingMessage, StorageError};
use warden_effects::{FilesystemAnchorStore, MemoryAnchorStore};
use warden_guild::{
    AnchorError, AnchorResolver, AnchorSpec, RecognitionRule, ResolutionPath, HISTORY_SCAN_WINDOW,
};
use warden_testkit::fixtures::ROLE_CHANNEL;
use warden_testkit::{init_test_tracing, test_member, MockPlatform, PlatformAction};

// ============================================================================
// Test Helpers
// ============================================================================

const MARKER: &str = "Self-Assign Roles";

fn role_spec() -> AnchorSpec {
    AnchorSpec {
        name: "roles".to_string(),
        channel_id: ROLE_CHANNEL,
        content: OutgoingMessage::default().with_embed(MARKER, "React to assign yourself a role:"),
        recognition: RecognitionRule::marker(MARKER),
        seed_reactions: vec!["🔥".to_string(), "💧".to_string()],
    }
}

fn guild() -> MockPlatform {
    init_test_tracing();
    let platform = MockPlatform::new();
    platform.add_text_channel(ROLE_CHANNEL, "roles");
    platform
}

fn resolver(platform: &MockPlatform, store: impl AnchorStoreEffects + 'static) -> AnchorResolver {
    AnchorResolver::new(Arc::new(platform.clone()), Arc::new(store))
}

fn anchor_message() -> OutgoingMessage {
    OutgoingMessage::default().with_embed(MARKER, "React to assign yourself a role:")
}

/// Store whose reads always fail
#[derive(Debug, Default)]
struct UnreadableStore {
    saved: parking_lot::Mutex<Vec<AnchorRecord>>,
}

#[async_trait]
impl AnchorStoreEffects for UnreadableStore {
    async fn load_anchor(&self, _name: &str) -> Result<Option<AnchorRecord>, StorageError> {
        Err(StorageError::ReadFailed("disk on fire".into()))
    }

    async fn save_anchor(&self, record: &AnchorRecord) -> Result<(), StorageError> {
        self.saved.lock().push(record.clone());
        Ok(())
    }

    async fn forget_anchor(&self, _name: &str) -> Result<bool, StorageError> {
        Ok(false)
    }

    async fn list_anchors(&self) -> Result<Vec<AnchorRecord>, StorageError> {
        Ok(self.saved.lock().clone())
    }
}

// ============================================================================
// Resolution Paths
// ============================================================================

#[tokio::test]
async fn test_stored_id_is_reused_without_writes() {
    let platform = guild();
    let existing = platform.seed_system_message(ROLE_CHANNEL, anchor_message());
    let store = MemoryAnchorStore::with_records([AnchorRecord::new("roles", ROLE_CHANNEL, existing.id)]);
    let anchors = resolver(&platform, store.clone());

    let (message, path) = anchors.resolve_with_path(&role_spec()).await.unwrap();

    assert_eq!(path, ResolutionPath::Stored);
    assert_eq!(message, existing.reference());
    assert_eq!(platform.channel_messages_sent(), 0);
    assert_eq!(anchors.current("roles"), Some(message));
}

#[tokio::test]
async fn test_missing_id_adopts_message_from_history() {
    let platform = guild();
    let orphan = platform.seed_system_message(ROLE_CHANNEL, anchor_message());
    let chatter = test_member(50, "chatter");
    platform.post_message(ROLE_CHANNEL, &chatter, "nice roles");

    let store = MemoryAnchorStore::with_records([AnchorRecord::new("roles", ROLE_CHANNEL, MessageId::new(42))]);
    let anchors = resolver(&platform, store.clone());

    let (message, path) = anchors.resolve_with_path(&role_spec()).await.unwrap();

    assert_eq!(path, ResolutionPath::Adopted);
    assert_eq!(message, orphan.reference());
    assert_eq!(platform.channel_messages_sent(), 0);
    assert_eq!(
        store.load_anchor("roles").await.unwrap(),
        Some(AnchorRecord::new("roles", ROLE_CHANNEL, orphan.id))
    );
}

#[tokio::test]
async fn test_nothing_found_creates_and_seeds() {
    let platform = guild();
    let store = MemoryAnchorStore::with_records([AnchorRecord::new("roles", ROLE_CHANNEL, MessageId::new(42))]);
    let anchors = resolver(&platform, store.clone());

    let (message, path) = anchors.resolve_with_path(&role_spec()).await.unwrap();

    assert_eq!(path, ResolutionPath::Created);
    assert_eq!(platform.channel_messages_sent(), 1);
    assert_eq!(platform.reactions_on(message).len(), 2);
    assert_eq!(
        store.load_anchor("roles").await.unwrap().and_then(|r| r.message_id),
        Some(message.message_id)
    );

    // The next resolution finds the new message through the stored id.
    let (again, path) = anchors.resolve_with_path(&role_spec()).await.unwrap();
    assert_eq!(path, ResolutionPath::Stored);
    assert_eq!(again, message);
    assert_ne!(again.message_id, MessageId::new(42));
    assert_eq!(platform.channel_messages_sent(), 1);
}

#[tokio::test]
async fn test_user_authored_lookalike_is_not_adopted() {
    let platform = guild();
    let mimic = test_member(51, "mimic");
    platform.post_message(ROLE_CHANNEL, &mimic, MARKER);
    let anchors = resolver(&platform, MemoryAnchorStore::new());

    let (_, path) = anchors.resolve_with_path(&role_spec()).await.unwrap();
    assert_eq!(path, ResolutionPath::Created);
}

#[tokio::test]
async fn test_history_scan_is_bounded() {
    let platform = guild();
    platform.seed_system_message(ROLE_CHANNEL, anchor_message());
    let chatter = test_member(50, "chatter");
    for i in 0..HISTORY_SCAN_WINDOW {
        platform.post_message(ROLE_CHANNEL, &chatter, &format!("message {i}"));
    }
    let anchors = resolver(&platform, MemoryAnchorStore::new());

    let (_, path) = anchors.resolve_with_path(&role_spec()).await.unwrap();
    assert_eq!(path, ResolutionPath::Created);
}

// ============================================================================
// Idempotence and Concurrency
// ============================================================================

#[tokio::test]
async fn test_repeated_resolution_creates_once() {
    let platform = guild();
    let anchors = resolver(&platform, MemoryAnchorStore::new());

    let first = anchors.resolve(&role_spec()).await.unwrap();
    for _ in 0..3 {
        assert_eq!(anchors.resolve(&role_spec()).await.unwrap(), first);
    }
    assert_eq!(platform.channel_messages_sent(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_resolution_creates_once() {
    let platform = guild();
    let anchors = Arc::new(resolver(&platform, MemoryAnchorStore::new()));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let anchors = anchors.clone();
        tasks.push(tokio::spawn(async move { anchors.resolve(&role_spec()).await }));
    }
    let mut resolved = Vec::new();
    for task in tasks {
        resolved.push(task.await.unwrap().unwrap());
    }

    assert!(resolved.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(platform.channel_messages_sent(), 1);
}

#[tokio::test]
async fn test_out_of_band_deletion_recreates() {
    let platform = guild();
    let store = MemoryAnchorStore::new();
    let anchors = resolver(&platform, store.clone());

    let first = anchors.resolve(&role_spec()).await.unwrap();
    platform.delete_message(first);

    let second = anchors.resolve(&role_spec()).await.unwrap();
    assert_ne!(first, second);
    assert_eq!(platform.channel_messages_sent(), 2);
    assert_eq!(anchors.current("roles"), Some(second));
    assert_eq!(
        store.load_anchor("roles").await.unwrap().and_then(|r| r.message_id),
        Some(second.message_id)
    );
}

// ============================================================================
// Failure Handling
// ============================================================================

#[tokio::test]
async fn test_unreachable_channel_is_reported() {
    let platform = guild();
    platform.make_unreachable(ROLE_CHANNEL);
    let anchors = resolver(&platform, MemoryAnchorStore::new());

    let err = anchors.resolve(&role_spec()).await.unwrap_err();
    assert!(matches!(err, AnchorError::ChannelUnavailable { channel, .. } if channel == ROLE_CHANNEL));
    assert_eq!(anchors.current("roles"), None);
}

#[tokio::test]
async fn test_unreadable_store_falls_back_to_history() {
    let platform = guild();
    let orphan = platform.seed_system_message(ROLE_CHANNEL, anchor_message());
    let store = Arc::new(UnreadableStore::default());
    let anchors = AnchorResolver::new(Arc::new(platform.clone()), store.clone());

    let (message, path) = anchors.resolve_with_path(&role_spec()).await.unwrap();
    assert_eq!(path, ResolutionPath::Adopted);
    assert_eq!(message, orphan.reference());
    assert_eq!(store.saved.lock().len(), 1);
}

#[tokio::test]
async fn test_record_for_other_channel_is_ignored() {
    let platform = guild();
    let other = platform.add_text_channel(ChannelId::new(999), "old-roles");
    let stale = platform.seed_system_message(other, anchor_message());
    let store = MemoryAnchorStore::with_records([AnchorRecord::new("roles", other, stale.id)]);
    let anchors = resolver(&platform, store);

    let (message, path) = anchors.resolve_with_path(&role_spec()).await.unwrap();
    assert_eq!(path, ResolutionPath::Created);
    assert_eq!(message.channel_id, ROLE_CHANNEL);
}

#[tokio::test]
async fn test_seed_failures_do_not_block_creation() {
    let platform = guild();
    platform.fail_reactions();
    let store = MemoryAnchorStore::new();
    let anchors = resolver(&platform, store.clone());

    let message = anchors.resolve(&role_spec()).await.unwrap();
    assert!(platform.message_exists(message));
    assert_eq!(
        platform.count_actions(|a| matches!(a, PlatformAction::AddedReaction { .. })),
        0
    );
    assert!(store.load_anchor("roles").await.unwrap().is_some());
}

#[tokio::test]
async fn test_legacy_file_record_is_honoured() {
    let dir = tempfile::tempdir().unwrap();
    let platform = guild();
    let existing = platform.seed_system_message(ROLE_CHANNEL, anchor_message());
    std::fs::write(
        dir.path().join("roles_message.json"),
        format!(r#"{{"message_id": {}}}"#, existing.id),
    )
    .unwrap();

    let store = FilesystemAnchorStore::new(dir.path());
    let anchors = resolver(&platform, store.clone());
    let (message, path) = anchors.resolve_with_path(&role_spec()).await.unwrap();

    assert_eq!(path, ResolutionPath::Stored);
    assert_eq!(message.message_id, existing.id);
    // No write on the stored path: the legacy file keeps its original shape.
    let record = store.load_anchor("roles").await.unwrap().unwrap();
    assert_eq!(record.channel_id, None);
}
