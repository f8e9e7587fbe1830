//! Reaction-driven role assignment
//!
//! Reactions on the role anchor grant the mapped role; removing the reaction
//! revokes it. Both directions are idempotent on the platform, so the engine
//! keeps no copy of who reacted with what.

use crate::anchor::AnchorResolver;
use std::collections::BTreeMap;
use std::sync::Arc;
use warden_core::effects::GuildPlatformEffects;
use warden_core::{PlatformError, ReactionEvent, RoleId};

/// Variation selector some clients append to emoji
const VARIATION_SELECTOR: char = '\u{fe0f}';

/// Static reaction symbol to role mapping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleReactionMap {
    roles: BTreeMap<String, RoleId>,
}

impl RoleReactionMap {
    /// Create a new map
    pub fn new(roles: impl IntoIterator<Item = (String, RoleId)>) -> Self {
        Self {
            roles: roles
                .into_iter()
                .map(|(symbol, role)| (normalize(&symbol), role))
                .collect(),
        }
    }

    /// Role mapped to `symbol`
    pub fn role_for(&self, symbol: &str) -> Option<RoleId> {
        self.roles.get(&normalize(symbol)).copied()
    }

    /// Mapped symbols, in a stable order
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(String::as_str)
    }

    /// `(symbol, role)` pairs, in a stable order
    pub fn entries(&self) -> impl Iterator<Item = (&str, RoleId)> {
        self.roles.iter().map(|(s, r)| (s.as_str(), *r))
    }

    /// True when nothing is mapped
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

fn normalize(symbol: &str) -> String {
    symbol.trim().chars().filter(|c| *c != VARIATION_SELECTOR).collect()
}

/// Why a reaction was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Not on the live role anchor
    OtherMessage,
    /// Reactor is the system user or a bot
    NonHuman,
    /// Symbol has no mapped role
    Unmapped,
}

/// Result of handling one reaction event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleSyncOutcome {
    /// Role granted (or already held)
    Granted(RoleId),
    /// Role revoked (or already absent)
    Revoked(RoleId),
    /// Event did not concern role sync
    Ignored(IgnoreReason),
    /// Platform refused or failed the change
    Failed {
        /// Role involved
        role: RoleId,
        /// Platform answer
        error: PlatformError,
    },
}

/// Role-sync engine
pub struct RoleSyncEngine {
    platform: Arc<dyn GuildPlatformEffects>,
    anchors: Arc<AnchorResolver>,
    anchor_name: String,
    map: RoleReactionMap,
}

impl std::fmt::Debug for RoleSyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleSyncEngine")
            .field("anchor_name", &self.anchor_name)
            .field("map", &self.map)
            .finish_non_exhaustive()
    }
}

impl RoleSyncEngine {
    /// Create an engine bound to the anchor named `anchor_name`
    pub fn new(
        platform: Arc<dyn GuildPlatformEffects>,
        anchors: Arc<AnchorResolver>,
        anchor_name: impl Into<String>,
        map: RoleReactionMap,
    ) -> Self {
        Self {
            platform,
            anchors,
            anchor_name: anchor_name.into(),
            map,
        }
    }

    /// Symbol mapping in use
    pub fn map(&self) -> &RoleReactionMap {
        &self.map
    }

    /// Grant the mapped role for an added reaction
    pub async fn on_reaction_added(&self, event: &ReactionEvent) -> RoleSyncOutcome {
        let role = match self.relevant_role(event) {
            Ok(role) => role,
            Err(reason) => return RoleSyncOutcome::Ignored(reason),
        };

        match self
            .platform
            .grant_role(event.user_id, role, "Self-assigned via reaction")
            .await
        {
            Ok(()) => {
                tracing::info!(user = %event.user_id, role = %role, "role added");
                RoleSyncOutcome::Granted(role)
            }
            Err(error) => {
                tracing::warn!(user = %event.user_id, role = %role, error = %error, "failed to add role");
                RoleSyncOutcome::Failed { role, error }
            }
        }
    }

    /// Revoke the mapped role for a removed reaction
    pub async fn on_reaction_removed(&self, event: &ReactionEvent) -> RoleSyncOutcome {
        let role = match self.relevant_role(event) {
            Ok(role) => role,
            Err(reason) => return RoleSyncOutcome::Ignored(reason),
        };

        match self
            .platform
            .revoke_role(event.user_id, role, "Self-removed via reaction")
            .await
        {
            Ok(()) => {
                tracing::info!(user = %event.user_id, role = %role, "role removed");
                RoleSyncOutcome::Revoked(role)
            }
            Err(error) => {
                tracing::warn!(user = %event.user_id, role = %role, error = %error, "failed to remove role");
                RoleSyncOutcome::Failed { role, error }
            }
        }
    }

    fn relevant_role(&self, event: &ReactionEvent) -> Result<RoleId, IgnoreReason> {
        if !self.anchors.is_anchor(&self.anchor_name, event.message_id) {
            return Err(IgnoreReason::OtherMessage);
        }
        if event.user_is_bot || event.user_id == self.platform.system_user() {
            return Err(IgnoreReason::NonHuman);
        }
        self.map.role_for(&event.symbol).ok_or(IgnoreReason::Unmapped)
    }
}
