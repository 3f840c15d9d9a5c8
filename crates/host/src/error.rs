//! Error types for file host operations.

use identity::IdentityError;
use thiserror::Error;

use crate::files::{ContentError, RegistryError};

/// Result type for file host operations.
pub type HostResult<T> = Result<T, HostError>;

/// Errors surfaced by [`crate::FileHost`] operations.
///
/// Every variant is an outcome for the caller to render; none of them
/// should take the process down.
#[derive(Debug, Error)]
pub enum HostError {
    /// No valid credential accompanied the request.
    #[error("authentication required")]
    Unauthenticated,

    /// A login attempt used the wrong username or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The requester may not perform this action on the file.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The referenced file or record does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The username is already registered.
    #[error("user already exists: {0}")]
    Conflict(String),

    /// The request was malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// File too large.
    #[error("file too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    /// The request body exceeded the transport limit before it was read.
    #[error("request body too large: {0}")]
    PayloadTooLarge(String),

    /// The identity store failed.
    #[error("identity store error: {0}")]
    Identity(IdentityError),

    /// The ownership registry failed.
    #[error("registry error: {0}")]
    Registry(RegistryError),

    /// Reading or writing file content failed.
    #[error("storage error: {0}")]
    Content(ContentError),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HostError {
    /// Returns a short machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            HostError::Unauthenticated => "unauthenticated",
            HostError::InvalidCredentials => "invalid_credentials",
            HostError::PermissionDenied(_) => "permission_denied",
            HostError::NotFound(_) => "not_found",
            HostError::Conflict(_) => "conflict",
            HostError::InvalidRequest(_) => "invalid_request",
            HostError::TooLarge { .. } | HostError::PayloadTooLarge(_) => "too_large",
            HostError::Identity(_)
            | HostError::Registry(_)
            | HostError::Content(_)
            | HostError::Internal(_) => "internal",
        }
    }
}

impl From<IdentityError> for HostError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Conflict { username } => HostError::Conflict(username),
            IdentityError::InvalidInput(msg) => HostError::InvalidRequest(msg),
            other => HostError::Identity(other),
        }
    }
}

impl From<RegistryError> for HostError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(name) => HostError::NotFound(name),
            other => HostError::Registry(other),
        }
    }
}

impl From<ContentError> for HostError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::InvalidName(name) => {
                HostError::InvalidRequest(format!("invalid file name: {:?}", name))
            }
            ContentError::NotFound(name) => HostError::NotFound(name),
            ContentError::TooLarge { size, limit } => HostError::TooLarge { size, limit },
            other => HostError::Content(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_conflict_maps_to_conflict() {
        let err: HostError = IdentityError::Conflict {
            username: "alice".to_string(),
        }
        .into();
        assert!(matches!(err, HostError::Conflict(ref u) if u == "alice"));
        assert_eq!(err.code(), "conflict");
    }

    #[test]
    fn test_identity_invalid_input_maps_to_invalid_request() {
        let err: HostError = IdentityError::InvalidInput("empty".to_string()).into();
        assert!(matches!(err, HostError::InvalidRequest(_)));
    }

    #[test]
    fn test_registry_not_found_maps_to_not_found() {
        let err: HostError = RegistryError::NotFound("a.txt".to_string()).into();
        assert!(matches!(err, HostError::NotFound(ref n) if n == "a.txt"));
    }

    #[test]
    fn test_content_errors_map() {
        let err: HostError = ContentError::InvalidName("../x".to_string()).into();
        assert!(matches!(err, HostError::InvalidRequest(_)));

        let err: HostError = ContentError::TooLarge { size: 10, limit: 5 }.into();
        assert!(matches!(err, HostError::TooLarge { size: 10, limit: 5 }));

        let err: HostError = ContentError::Io(std::io::Error::other("disk")).into();
        assert_eq!(err.code(), "internal");
    }
}
