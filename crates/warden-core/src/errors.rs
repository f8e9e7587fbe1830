//! Unified error system for Warden
//!
//! `WardenError` is the single error type surfaced by services. Effect traits
//! report narrower errors (`PlatformError`, `StorageError`) that convert into
//! it, so handlers can match on the platform's answer before deciding whether
//! a failure is a fallback trigger, a user-facing rejection, or a log line.

use serde::{Deserialize, Serialize};

/// Unified error type for all Warden operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum WardenError {
    /// Anchor message, channel, member or record missing
    #[error("Not found: {message}")]
    NotFound {
        /// What was not found
        message: String,
    },

    /// Duplicate creation (e.g. a second open ticket)
    #[error("Already exists: {message}")]
    AlreadyExists {
        /// What already exists
        message: String,
    },

    /// Actor lacks the capability for the operation
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Why the operation was refused
        message: String,
    },

    /// Platform call failed for network or permission reasons
    #[error("Transient failure: {message}")]
    Transient {
        /// Failure detail
        message: String,
    },

    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Configuration file could not be decoded
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// Unexpected I/O or system failure
    #[error("Internal error: {message}")]
    Internal {
        /// Error message describing the internal error
        message: String,
    },
}

impl WardenError {
    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an already exists error
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
        }
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Create a transient error
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// True for the `NotFound` variant
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Standard Result type for Warden operations
pub type Result<T> = std::result::Result<T, WardenError>;

/// Failure reported by a platform call
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlatformError {
    /// The target (message, channel, member, ban) does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The system user lacks the permission for this call
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Network failure, rate limit or unexpected platform answer
    #[error("transient: {0}")]
    Transient(String),
}

impl PlatformError {
    /// True when the target is already gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<PlatformError> for WardenError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotFound(message) => Self::NotFound { message },
            PlatformError::Forbidden(message) => Self::Forbidden { message },
            PlatformError::Transient(message) => Self::Transient { message },
        }
    }
}

/// Failure reported by an anchor store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Reading the persisted record failed
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// Writing the record failed
    #[error("write failed: {0}")]
    WriteFailed(String),

    /// Removing the record failed
    #[error("delete failed: {0}")]
    DeleteFailed(String),

    /// Key is not usable as a record name
    #[error("invalid key: {reason}")]
    InvalidKey {
        /// Why the key was rejected
        reason: String,
    },
}

impl From<serde_json::Error> for WardenError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for WardenError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::not_found(err.to_string()),
            std::io::ErrorKind::PermissionDenied => Self::forbidden(err.to_string()),
            _ => Self::internal(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = WardenError::invalid("test message");
        assert!(matches!(err, WardenError::Invalid { .. }));
        assert_eq!(err.to_string(), "Invalid: test message");
    }

    #[test]
    fn test_platform_error_conversion() {
        let err: WardenError = PlatformError::NotFound("message 42".into()).into();
        assert!(err.is_not_found());

        let err: WardenError = PlatformError::Forbidden("missing permission".into()).into();
        assert!(matches!(err, WardenError::Forbidden { .. }));

        let err: WardenError = PlatformError::Transient("timeout".into()).into();
        assert!(matches!(err, WardenError::Transient { .. }));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        assert!(WardenError::from(io_err).is_not_found());

        let io_err = std::io::Error::new(std::io::ErrorKind::Other, "disk failure");
        assert!(matches!(
            WardenError::from(io_err),
            WardenError::Internal { .. }
        ));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<u64>("not json").unwrap_err();
        assert!(matches!(
            WardenError::from(json_err),
            WardenError::Serialization { .. }
        ));
    }
}
