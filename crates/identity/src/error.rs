//! Error types for the identity crate.

use thiserror::Error;

/// Identity store error type covering all possible failure modes.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// A user with this name is already registered.
    #[error("user already exists: {username}")]
    Conflict {
        /// The username that was already taken.
        username: String,
    },

    /// Registration input was rejected before touching storage.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Reading or writing the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The backing file could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The relational backend reported an error.
    #[error("database error: {0}")]
    Sqlite(rusqlite::Error),

    /// A lock was poisoned by a panicking thread.
    #[error("lock poisoned: {context}")]
    LockPoisoned {
        /// Which lock was poisoned.
        context: String,
    },
}

impl IdentityError {
    /// Returns true for the recoverable "username taken" outcome.
    pub fn is_conflict(&self) -> bool {
        matches!(self, IdentityError::Conflict { .. })
    }

    pub(crate) fn poisoned(context: &str) -> Self {
        IdentityError::LockPoisoned {
            context: context.to_string(),
        }
    }
}

impl From<rusqlite::Error> for IdentityError {
    fn from(err: rusqlite::Error) -> Self {
        IdentityError::Sqlite(err)
    }
}

/// Result type alias for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_error_display() {
        let err = IdentityError::Conflict {
            username: "alice".to_string(),
        };
        assert_eq!(err.to_string(), "user already exists: alice");
        assert!(err.is_conflict());
    }

    #[test]
    fn test_invalid_input_display() {
        let err = IdentityError::InvalidInput("username must not be empty".to_string());
        assert_eq!(
            err.to_string(),
            "invalid input: username must not be empty"
        );
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: IdentityError = io.into();
        assert!(matches!(err, IdentityError::Io(_)));
    }

    #[test]
    fn test_lock_poisoned_display() {
        let err = IdentityError::poisoned("user records");
        assert_eq!(err.to_string(), "lock poisoned: user records");
    }
}
