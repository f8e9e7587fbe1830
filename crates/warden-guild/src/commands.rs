//! Prefix command parsing

use thiserror::Error;
use warden_core::UserId;

/// Usage line of the ban command
pub const BAN_USAGE: &str = "ban <user> [duration] [reason]";

const DEFAULT_BAN_REASON: &str = "No reason provided";

/// A recognized prefix command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Close the ticket of the current channel
    Close,
    /// Ban a user, optionally for a limited time
    Ban {
        /// User to ban
        target: UserId,
        /// Raw duration argument, validated by the moderation service
        duration: Option<String>,
        /// Audit-log reason
        reason: String,
    },
}

/// A recognized command with unusable arguments
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// Required argument missing
    #[error("missing argument; usage: {usage}")]
    MissingArgument {
        /// Expected usage
        usage: &'static str,
    },

    /// Argument is not a user mention or id
    #[error("'{0}' is not a user")]
    InvalidUser(String),
}

impl Command {
    /// Parse a message
    ///
    /// `None` means the message is not a command Warden handles.
    pub fn parse(prefix: &str, content: &str) -> Option<Result<Self, CommandError>> {
        if prefix.is_empty() {
            return None;
        }
        let body = content.trim_start().strip_prefix(prefix)?;
        if body.starts_with(char::is_whitespace) {
            return None;
        }

        let mut words = body.split_whitespace();
        let name = words.next()?;
        match name.to_ascii_lowercase().as_str() {
            "close" => Some(Ok(Self::Close)),
            "ban" => Some(Self::parse_ban(words)),
            _ => None,
        }
    }

    fn parse_ban<'a>(mut words: impl Iterator<Item = &'a str>) -> Result<Self, CommandError> {
        let raw_target = words
            .next()
            .ok_or(CommandError::MissingArgument { usage: BAN_USAGE })?;
        let target = UserId::parse_mention(raw_target)
            .ok_or_else(|| CommandError::InvalidUser(raw_target.to_string()))?;
        let duration = words.next().map(str::to_string);
        let reason = words.collect::<Vec<_>>().join(" ");

        Ok(Self::Ban {
            target,
            duration,
            reason: if reason.is_empty() {
                DEFAULT_BAN_REASON.to_string()
            } else {
                reason
            },
        })
    }
}
