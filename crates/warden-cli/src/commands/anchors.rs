//! `warden anchors ...`
//!
//! Works on the filesystem store under the configured `state_dir`. Forgetting
//! a record makes the next start recover the anchor from channel history.

use anyhow::Result;
use clap::Subcommand;
use warden_core::effects::AnchorStoreEffects;
use warden_core::GuildConfig;
use warden_effects::FilesystemAnchorStore;

/// Anchor record operations
#[derive(Subcommand, Debug)]
pub enum AnchorsCommand {
    /// Show every persisted anchor record
    List,
    /// Delete the record for an anchor
    Forget {
        /// Anchor name (`ticket`, `roles`)
        name: String,
    },
}

/// Run an anchors subcommand against the configured state directory
pub async fn run(cmd: AnchorsCommand, config: &GuildConfig) -> Result<String> {
    let store = FilesystemAnchorStore::new(&config.state_dir);
    match cmd {
        AnchorsCommand::List => list(&store).await,
        AnchorsCommand::Forget { name } => forget(&store, &name).await,
    }
}

async fn list(store: &FilesystemAnchorStore) -> Result<String> {
    let records = store.list_anchors().await?;
    if records.is_empty() {
        return Ok(format!(
            "No anchor records in {}",
            store.base_path().display()
        ));
    }

    let lines: Vec<String> = records
        .iter()
        .map(|record| {
            let channel = record
                .channel_id
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".to_string());
            let message = record
                .message_id
                .map(|m| m.to_string())
                .unwrap_or_else(|| "-".to_string());
            format!("{:<8} channel={channel} message={message}", record.name)
        })
        .collect();
    Ok(lines.join("\n"))
}

async fn forget(store: &FilesystemAnchorStore, name: &str) -> Result<String> {
    if store.forget_anchor(name).await? {
        tracing::info!(anchor = name, "anchor record removed");
        Ok(format!("Forgot anchor '{name}'"))
    } else {
        Ok(format!("No record for anchor '{name}'"))
    }
}
