//! Shared fixtures

use warden_core::{ChannelId, GuildConfig, GuildId, Member, RoleId, UserId};

/// Guild id used by fixtures
pub const TEST_GUILD: GuildId = GuildId::new(100);
/// Ticket anchor channel used by fixtures
pub const TICKET_CHANNEL: ChannelId = ChannelId::new(200);
/// Role anchor channel used by fixtures
pub const ROLE_CHANNEL: ChannelId = ChannelId::new(201);
/// Vote channel used by fixtures
pub const VOTE_CHANNEL: ChannelId = ChannelId::new(202);
/// General channel used by fixtures
pub const GENERAL_CHANNEL: ChannelId = ChannelId::new(203);
/// Staff role used by fixtures
pub const STAFF_ROLE: RoleId = RoleId::new(300);
/// Roles mapped to reaction symbols by `test_config`
pub const FIRE_ROLE: RoleId = RoleId::new(301);
/// Second mapped role
pub const WATER_ROLE: RoleId = RoleId::new(302);

/// Configuration matching the fixture ids, with two mapped symbols
pub fn test_config() -> GuildConfig {
    let mut config = GuildConfig::new(TEST_GUILD, TICKET_CHANNEL, STAFF_ROLE, ROLE_CHANNEL);
    config.vote_channel_id = Some(VOTE_CHANNEL);
    config.emoji_to_role.insert("🔥".to_string(), FIRE_ROLE);
    config.emoji_to_role.insert("💧".to_string(), WATER_ROLE);
    config
}

/// Human member with no roles
pub fn test_member(id: u64, name: &str) -> Member {
    Member::new(UserId::new(id), name)
}

/// Member holding the staff role
pub fn test_staff(id: u64, name: &str) -> Member {
    let mut member = Member::new(UserId::new(id), name);
    member.roles.push(STAFF_ROLE);
    member
}

/// Install a test subscriber once; later calls are no-ops
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}
