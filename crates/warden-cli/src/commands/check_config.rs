//! `warden check-config`

use anyhow::Result;
use std::fmt::Write;
use warden_core::GuildConfig;

/// Validate `config` and summarize what the coordinator will manage
pub fn run(config: &GuildConfig) -> Result<String> {
    config.validate()?;
    Ok(summary(config))
}

fn summary(config: &GuildConfig) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Configuration OK");
    let _ = writeln!(out, "  guild:          {}", config.guild_id);
    let _ = writeln!(out, "  prefix:         {}", config.prefix);
    let _ = writeln!(out, "  ticket channel: {}", config.ticket_channel_id);
    let _ = writeln!(out, "  staff role:     {}", config.staff_role_id);
    let _ = writeln!(out, "  role channel:   {}", config.role_channel_id);
    match config.vote_channel_id {
        Some(channel) => {
            let _ = writeln!(out, "  vote channel:   {channel}");
        }
        None => {
            let _ = writeln!(out, "  vote channel:   (none)");
        }
    }
    let _ = writeln!(
        out,
        "  verification:   {}s, operands {}..={}",
        config.verification.timeout_secs,
        config.verification.operand_min,
        config.verification.operand_max
    );
    let _ = writeln!(out, "  state dir:      {}", config.state_dir.display());
    let _ = write!(out, "  reaction roles: {}", config.emoji_to_role.len());
    for (symbol, role) in &config.emoji_to_role {
        let _ = write!(out, "\n    {symbol} -> {role}");
    }
    out
}
