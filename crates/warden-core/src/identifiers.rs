//! Platform identifier types
//!
//! Every entity on the platform is addressed by a 64-bit snowflake. Each kind
//! of entity gets its own newtype so a channel id can never be passed where a
//! role id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

macro_rules! snowflake_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Create from a raw snowflake
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// Get the raw snowflake
            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl FromStr for $name {
            type Err = crate::WardenError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self).map_err(|e| {
                    crate::WardenError::invalid(format!("invalid {} '{}': {}", $label, s, e))
                })
            }
        }
    };
}

snowflake_id!(
    /// Guild (server) identifier
    GuildId,
    "guild id"
);
snowflake_id!(
    /// Channel identifier (text channels, categories and direct-message channels)
    ChannelId,
    "channel id"
);
snowflake_id!(
    /// Message identifier
    MessageId,
    "message id"
);
snowflake_id!(
    /// User identifier; members of a guild are addressed by their user id
    UserId,
    "user id"
);
snowflake_id!(
    /// Role identifier
    RoleId,
    "role id"
);
snowflake_id!(
    /// Interaction identifier (button presses)
    InteractionId,
    "interaction id"
);

impl UserId {
    /// Platform mention syntax for this user
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }

    /// Parse a mention (`<@123>` or `<@!123>`) or a bare id
    pub fn parse_mention(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix("<@")
            .and_then(|rest| rest.strip_suffix('>'))
            .map(|rest| rest.trim_start_matches('!'))
            .unwrap_or(trimmed);
        inner.parse::<u64>().ok().map(Self)
    }
}

impl ChannelId {
    /// Platform mention syntax for this channel
    pub fn mention(&self) -> String {
        format!("<#{}>", self.0)
    }
}

impl RoleId {
    /// Platform mention syntax for this role
    pub fn mention(&self) -> String {
        format!("<@&{}>", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mention_round_trip() {
        let user = UserId::new(1234);
        assert_eq!(user.mention(), "<@1234>");
        assert_eq!(UserId::parse_mention("<@1234>"), Some(user));
        assert_eq!(UserId::parse_mention("<@!1234>"), Some(user));
        assert_eq!(UserId::parse_mention("1234"), Some(user));
        assert_eq!(UserId::parse_mention("@someone"), None);
    }

    #[test]
    fn test_ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&MessageId::new(42)).unwrap();
        assert_eq!(json, "42");
        let back: MessageId = serde_json::from_str("42").unwrap();
        assert_eq!(back, MessageId::new(42));
    }

    #[test]
    fn test_from_str_rejects_garbage() {
        assert!("abc".parse::<ChannelId>().is_err());
        assert_eq!(" 7 ".parse::<ChannelId>().unwrap(), ChannelId::new(7));
    }
}
