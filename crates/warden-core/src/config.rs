//! Startup configuration
//!
//! `GuildConfig` is read once at startup and handed to services as read-only
//! input. Files ending in `.toml` are parsed as TOML; anything else as JSON,
//! which keeps existing `config.json` deployments loadable unchanged.

use crate::errors::WardenError;
use crate::identifiers::{ChannelId, GuildId, RoleId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "WARDEN_";

/// Configuration of one anchor message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorConfig {
    /// Recognition marker: a system-authored message whose content contains
    /// this text, or whose embed title equals it, is this anchor
    pub marker: String,
    /// Message text posted when the anchor is created
    pub text: String,
    /// Embed title, if the anchor is an embed
    #[serde(default)]
    pub title: Option<String>,
    /// Button label, if the anchor carries a button
    #[serde(default)]
    pub button_label: Option<String>,
}

/// Both anchors Warden maintains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorsConfig {
    /// Ticket-button message
    #[serde(default = "AnchorsConfig::default_ticket")]
    pub ticket: AnchorConfig,
    /// Role-reaction message
    #[serde(default = "AnchorsConfig::default_roles")]
    pub roles: AnchorConfig,
}

impl AnchorsConfig {
    fn default_ticket() -> AnchorConfig {
        AnchorConfig {
            marker: "Click the button below to create a ticket!".to_string(),
            text: "Click the button below to create a ticket!".to_string(),
            title: None,
            button_label: Some("Create Ticket".to_string()),
        }
    }

    fn default_roles() -> AnchorConfig {
        AnchorConfig {
            marker: "Self-Assign Roles".to_string(),
            text: "React to assign yourself a role:".to_string(),
            title: Some("Self-Assign Roles".to_string()),
            button_label: None,
        }
    }
}

impl Default for AnchorsConfig {
    fn default() -> Self {
        Self {
            ticket: Self::default_ticket(),
            roles: Self::default_roles(),
        }
    }
}

/// Join-verification tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Seconds a new member has to answer
    #[serde(default = "VerificationConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    /// Smallest operand
    #[serde(default = "VerificationConfig::default_operand_min")]
    pub operand_min: i64,
    /// Largest operand
    #[serde(default = "VerificationConfig::default_operand_max")]
    pub operand_max: i64,
}

impl VerificationConfig {
    fn default_timeout_secs() -> u64 {
        120
    }

    fn default_operand_min() -> i64 {
        1
    }

    fn default_operand_max() -> i64 {
        20
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout_secs(),
            operand_min: Self::default_operand_min(),
            operand_max: Self::default_operand_max(),
        }
    }
}

/// Guild configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    /// Gateway token; only the transport reads it
    #[serde(default)]
    pub token: Option<String>,
    /// Command prefix
    #[serde(default = "GuildConfig::default_prefix")]
    pub prefix: String,
    /// Guild served by this process
    pub guild_id: GuildId,
    /// Channel holding the ticket-button anchor
    pub ticket_channel_id: ChannelId,
    /// Role whose holders can see and close every ticket
    pub staff_role_id: RoleId,
    /// Channel holding the role-reaction anchor
    pub role_channel_id: ChannelId,
    /// Channel (or category) whose messages get vote reactions
    #[serde(default, alias = "target_channel_id")]
    pub vote_channel_id: Option<ChannelId>,
    /// Channels exempt from link filtering; consumed by the external content filter
    #[serde(default)]
    pub allowed_link_channels: BTreeSet<ChannelId>,
    /// Reaction symbol to role mapping
    #[serde(default)]
    pub emoji_to_role: BTreeMap<String, RoleId>,
    /// Join verification
    #[serde(default)]
    pub verification: VerificationConfig,
    /// Anchor messages
    #[serde(default)]
    pub anchors: AnchorsConfig,
    /// Directory holding persisted anchor records
    #[serde(default = "GuildConfig::default_state_dir")]
    pub state_dir: PathBuf,
}

impl GuildConfig {
    fn default_prefix() -> String {
        "!".to_string()
    }

    fn default_state_dir() -> PathBuf {
        PathBuf::from(".")
    }

    /// Minimal configuration for tests and tooling
    pub fn new(
        guild_id: GuildId,
        ticket_channel_id: ChannelId,
        staff_role_id: RoleId,
        role_channel_id: ChannelId,
    ) -> Self {
        Self {
            token: None,
            prefix: Self::default_prefix(),
            guild_id,
            ticket_channel_id,
            staff_role_id,
            role_channel_id,
            vote_channel_id: None,
            allowed_link_channels: BTreeSet::new(),
            emoji_to_role: BTreeMap::new(),
            verification: VerificationConfig::default(),
            anchors: AnchorsConfig::default(),
            state_dir: Self::default_state_dir(),
        }
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self, WardenError> {
        let content = std::fs::read_to_string(path)?;

        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);

        if is_toml {
            Self::from_toml_str(&content)
        } else {
            Self::from_json_str(&content)
        }
    }

    /// Parse TOML configuration
    pub fn from_toml_str(content: &str) -> Result<Self, WardenError> {
        toml::from_str(content).map_err(|e| WardenError::serialization(format!("Invalid TOML: {e}")))
    }

    /// Parse JSON configuration
    pub fn from_json_str(content: &str) -> Result<Self, WardenError> {
        Ok(serde_json::from_str(content)?)
    }

    /// Apply `WARDEN_*` environment overrides
    pub fn merge_with_env(&mut self) {
        self.merge_with_vars(std::env::vars());
    }

    /// Apply overrides from `(key, value)` pairs using the `WARDEN_` convention
    pub fn merge_with_vars<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "TOKEN" => self.token = Some(value),
                "PREFIX" => self.prefix = value,
                "STATE_DIR" => self.state_dir = PathBuf::from(value),
                _ => {}
            }
        }
    }

    /// Collect every validation problem
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = vec![];

        if self.prefix.trim().is_empty() {
            errors.push("prefix cannot be empty".to_string());
        }

        let ids = [
            ("guild_id", self.guild_id.get()),
            ("ticket_channel_id", self.ticket_channel_id.get()),
            ("staff_role_id", self.staff_role_id.get()),
            ("role_channel_id", self.role_channel_id.get()),
        ];
        for (field, raw) in ids {
            if raw == 0 {
                errors.push(format!("{field} must be set"));
            }
        }

        let timeout = self.verification.timeout_secs;
        if !(10..=900).contains(&timeout) {
            errors.push("verification.timeout_secs must be between 10 and 900".to_string());
        }
        if self.verification.operand_min > self.verification.operand_max {
            errors.push("verification.operand_min must not exceed operand_max".to_string());
        }

        let mut seen_roles = BTreeSet::new();
        for (symbol, role) in &self.emoji_to_role {
            if symbol.trim().is_empty() {
                errors.push("emoji_to_role contains an empty symbol".to_string());
            }
            if !seen_roles.insert(*role) {
                errors.push(format!("role {role} is mapped to more than one symbol"));
            }
        }

        for (name, anchor) in [("ticket", &self.anchors.ticket), ("roles", &self.anchors.roles)] {
            if anchor.marker.trim().is_empty() {
                errors.push(format!("anchors.{name}.marker cannot be empty"));
            }
        }

        errors
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), WardenError> {
        let errors = self.validation_errors();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(WardenError::invalid(format!(
                "Validation failed: {}",
                errors.join("; ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LEGACY_JSON: &str = r#"{
        "token": "TOKEN_HERE",
        "prefix": "!",
        "guild_id": 123456789012345678,
        "ticket_channel_id": 11,
        "staff_role_id": 12,
        "role_channel_id": 13,
        "target_channel_id": 14,
        "allowed_link_channels": [15, 16],
        "emoji_to_role": {"🔥": 111, "💧": 222}
    }"#;

    #[test]
    fn test_legacy_json_config_loads() {
        let config = GuildConfig::from_json_str(LEGACY_JSON).unwrap();
        assert_eq!(config.vote_channel_id, Some(ChannelId::new(14)));
        assert_eq!(config.emoji_to_role.get("🔥"), Some(&RoleId::new(111)));
        assert_eq!(config.verification.timeout_secs, 120);
        assert_eq!(config.anchors.ticket.button_label.as_deref(), Some("Create Ticket"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_file_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
guild_id = 1
ticket_channel_id = 2
staff_role_id = 3
role_channel_id = 4

[verification]
timeout_secs = 60

[emoji_to_role]
"🌿" = 333
"#
        )
        .unwrap();

        let config = GuildConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.verification.timeout_secs, 60);
        assert_eq!(config.verification.operand_max, 20);
        assert_eq!(config.prefix, "!");
    }

    #[test]
    fn test_load_failures_are_classified() {
        let dir = tempfile::tempdir().unwrap();
        let missing = GuildConfig::load_from_file(&dir.path().join("config.json"));
        assert!(missing.unwrap_err().is_not_found());

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ \"guild_id\": ").unwrap();
        assert!(matches!(
            GuildConfig::load_from_file(&broken),
            Err(WardenError::Serialization { .. })
        ));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GuildConfig::from_json_str(LEGACY_JSON).unwrap();
        config.merge_with_vars(vec![
            ("WARDEN_TOKEN".to_string(), "secret".to_string()),
            ("WARDEN_PREFIX".to_string(), "?".to_string()),
            ("OTHER".to_string(), "ignored".to_string()),
        ]);
        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.prefix, "?");
    }

    #[test]
    fn test_validation_reports_every_problem() {
        let mut config = GuildConfig::new(GuildId::new(0), ChannelId::new(1), RoleId::new(2), ChannelId::new(3));
        config.verification.timeout_secs = 5;
        config.emoji_to_role.insert("a".into(), RoleId::new(9));
        config.emoji_to_role.insert("b".into(), RoleId::new(9));

        let errors = config.validation_errors();
        assert_eq!(errors.len(), 3);
        assert!(config.validate().is_err());
    }
}
