//! Command handlers
//!
//! Each handler returns the text to print so it can be asserted on directly.

pub mod anchors;
pub mod check_config;

pub use anchors::AnchorsCommand;

use anyhow::{Context, Result};
use std::path::Path;
use warden_core::GuildConfig;

/// Load `path` and apply `WARDEN_*` overrides from the environment
pub fn load_config(path: &Path) -> Result<GuildConfig> {
    let mut config = GuildConfig::load_from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    config.merge_with_env();
    tracing::debug!(path = %path.display(), guild = %config.guild_id, "configuration loaded");
    Ok(config)
}
