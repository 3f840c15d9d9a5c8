//! User records and cookie credentials.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, Result};

/// Name of the cookie carrying the caller's credential.
pub const AUTH_COOKIE_NAME: &str = "auth";

/// Separator between username and password in the cookie value.
const CREDENTIAL_SEPARATOR: char = ':';

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Unique, case-sensitive login name.
    pub username: String,
    /// Plaintext password.
    pub password: String,
    /// Whether the user may edit or delete any file.
    #[serde(default)]
    pub is_admin: bool,
}

impl UserRecord {
    /// Creates a regular (non-admin) user.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            is_admin: false,
        }
    }

    /// Creates an admin user.
    pub fn admin(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            is_admin: true,
            ..Self::new(username, password)
        }
    }

    /// Exact match on both fields.
    pub fn matches(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

/// Checks registration input before it reaches a backend.
///
/// Usernames may not contain `:` because the cookie format splits on the
/// first one.
pub fn validate_new_user(username: &str, password: &str) -> Result<()> {
    if username.is_empty() || password.is_empty() {
        return Err(IdentityError::InvalidInput(
            "username and password are required".to_string(),
        ));
    }
    if username.contains(CREDENTIAL_SEPARATOR) {
        return Err(IdentityError::InvalidInput(format!(
            "username must not contain '{}'",
            CREDENTIAL_SEPARATOR
        )));
    }
    Ok(())
}

/// A `(username, password)` pair rebuilt from the client cookie.
///
/// There is no server-side session; the credential is re-validated on
/// every request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Claimed username.
    pub username: String,
    /// Claimed password.
    pub password: String,
}

impl Credential {
    /// Creates a credential from its parts.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parses a cookie value of the form `username:password`.
    ///
    /// Splits on the first `:` so passwords may contain colons. Returns
    /// `None` when the separator is missing or either half is empty.
    pub fn from_cookie_value(value: &str) -> Option<Self> {
        let (username, password) = value.split_once(CREDENTIAL_SEPARATOR)?;
        if username.is_empty() || password.is_empty() {
            return None;
        }
        Some(Self::new(username, password))
    }

    /// Encodes the credential as a cookie value.
    pub fn to_cookie_value(&self) -> String {
        format!("{}{}{}", self.username, CREDENTIAL_SEPARATOR, self.password)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
