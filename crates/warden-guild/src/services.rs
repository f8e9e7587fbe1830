//! Service construction
//!
//! `GuildEffects` bundles the effect handlers; `GuildServices` owns one
//! instance of every coordination service, built from configuration.

use crate::anchor::{AnchorResolver, AnchorSpec};
use crate::moderation::ModerationService;
use crate::role_sync::{RoleReactionMap, RoleSyncEngine};
use crate::task_registry::TaskRegistry;
use crate::ticket::{TicketRegistry, TICKET_BUTTON_ID};
use crate::verification::VerificationService;
use std::sync::Arc;
use warden_core::effects::{
    AnchorStoreEffects, GuildPlatformEffects, PhysicalTimeEffects, RandomEffects,
};
use warden_core::GuildConfig;

/// Anchor name of the ticket-button message
pub const TICKET_ANCHOR: &str = "ticket";
/// Anchor name of the role-reaction message
pub const ROLE_ANCHOR: &str = "roles";

const DEFAULT_BUTTON_LABEL: &str = "Create Ticket";

/// Effect handlers shared by every service
#[derive(Clone)]
pub struct GuildEffects {
    /// Chat platform
    pub platform: Arc<dyn GuildPlatformEffects>,
    /// Anchor persistence
    pub anchors: Arc<dyn AnchorStoreEffects>,
    /// Clock and timers
    pub time: Arc<dyn PhysicalTimeEffects>,
    /// Randomness
    pub random: Arc<dyn RandomEffects>,
}

impl GuildEffects {
    /// Bundle effect handlers
    pub fn new(
        platform: Arc<dyn GuildPlatformEffects>,
        anchors: Arc<dyn AnchorStoreEffects>,
        time: Arc<dyn PhysicalTimeEffects>,
        random: Arc<dyn RandomEffects>,
    ) -> Self {
        Self {
            platform,
            anchors,
            time,
            random,
        }
    }
}

impl std::fmt::Debug for GuildEffects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuildEffects").finish_non_exhaustive()
    }
}

/// Every coordination service of one guild
#[derive(Debug, Clone)]
pub struct GuildServices {
    /// Anchor resolver
    pub anchors: Arc<AnchorResolver>,
    /// Ticket registry
    pub tickets: Arc<TicketRegistry>,
    /// Join verification
    pub verification: VerificationService,
    /// Reaction role sync
    pub roles: Arc<RoleSyncEngine>,
    /// Bans and vote reactions
    pub moderation: ModerationService,
}

impl GuildServices {
    /// Build services from configuration
    pub fn new(config: &GuildConfig, effects: &GuildEffects, tasks: Arc<TaskRegistry>) -> Self {
        let anchors = Arc::new(AnchorResolver::new(
            effects.platform.clone(),
            effects.anchors.clone(),
        ));
        let tickets = Arc::new(TicketRegistry::new(
            effects.platform.clone(),
            effects.time.clone(),
            config.staff_role_id,
            config.prefix.clone(),
        ));
        let verification = VerificationService::new(
            effects.platform.clone(),
            effects.time.clone(),
            effects.random.clone(),
            config.verification,
            tasks.clone(),
        );
        let roles = Arc::new(RoleSyncEngine::new(
            effects.platform.clone(),
            anchors.clone(),
            ROLE_ANCHOR,
            role_map(config),
        ));
        let moderation = ModerationService::new(
            effects.platform.clone(),
            effects.time.clone(),
            tasks,
            config.vote_channel_id,
        );

        Self {
            anchors,
            tickets,
            verification,
            roles,
            moderation,
        }
    }
}

/// Reaction map from configuration
pub fn role_map(config: &GuildConfig) -> RoleReactionMap {
    RoleReactionMap::new(
        config
            .emoji_to_role
            .iter()
            .map(|(symbol, role)| (symbol.clone(), *role)),
    )
}

/// Ticket-button anchor
pub fn ticket_anchor_spec(config: &GuildConfig) -> AnchorSpec {
    let anchor = &config.anchors.ticket;
    let label = anchor
        .button_label
        .clone()
        .unwrap_or_else(|| DEFAULT_BUTTON_LABEL.to_string());
    AnchorSpec::from_config(TICKET_ANCHOR, config.ticket_channel_id, anchor)
        .with_button(label, TICKET_BUTTON_ID)
}

/// Role-reaction anchor listing every mapped symbol, seeded with them
pub fn role_anchor_spec(config: &GuildConfig) -> AnchorSpec {
    let map = role_map(config);
    let mut spec = AnchorSpec::from_config(ROLE_ANCHOR, config.role_channel_id, &config.anchors.roles)
        .with_seed_reactions(map.symbols().map(str::to_string));

    let listing: String = map
        .entries()
        .map(|(symbol, role)| format!("\n{symbol} : {}", role.mention()))
        .collect();
    match spec.content.embed.as_mut() {
        Some(embed) => embed.description.push_str(&listing),
        None => spec.content.content.push_str(&listing),
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_testkit::fixtures::{FIRE_ROLE, ROLE_CHANNEL, TICKET_CHANNEL};
    use warden_testkit::test_config;

    #[test]
    fn test_ticket_anchor_carries_button() {
        let spec = ticket_anchor_spec(&test_config());
        assert_eq!(spec.channel_id, TICKET_CHANNEL);
        assert_eq!(spec.content.buttons[0].custom_id, TICKET_BUTTON_ID);
        assert_eq!(spec.content.buttons[0].label, "Create Ticket");
        assert!(spec.seed_reactions.is_empty());
    }

    #[test]
    fn test_role_anchor_lists_mapping() {
        let spec = role_anchor_spec(&test_config());
        assert_eq!(spec.channel_id, ROLE_CHANNEL);
        assert_eq!(spec.seed_reactions.len(), 2);

        let embed = spec.content.embed.unwrap();
        assert_eq!(embed.title, "Self-Assign Roles");
        assert!(embed.description.starts_with("React to assign yourself a role:"));
        assert!(embed
            .description
            .contains(&format!("🔥 : {}", FIRE_ROLE.mention())));
    }
}
