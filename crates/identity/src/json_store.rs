//! JSON file identity backend.
//!
//! All records live in memory behind an `RwLock`. Validation takes the
//! read lock; registration takes the write lock and rewrites the whole
//! file (write to a temp file, then rename) before releasing it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{IdentityError, Result};
use crate::store::{IdentityStore, StorageMode};
use crate::user::{validate_new_user, UserRecord};

/// On-disk layout of the user file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct UserFileData {
    #[serde(default)]
    users: Vec<UserRecord>,
}

/// Identity store backed by a JSON file.
pub struct JsonIdentityStore {
    /// The path to the JSON file.
    path: PathBuf,
    /// The user records, in file order.
    users: RwLock<Vec<UserRecord>>,
}

impl JsonIdentityStore {
    /// Creates a store that persists to the given path.
    ///
    /// This does not read the file; call `load_all()` for that.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            users: RwLock::new(Vec::new()),
        }
    }

    /// Returns the path to the user file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of loaded users.
    pub fn len(&self) -> Result<usize> {
        let users = self
            .users
            .read()
            .map_err(|_| IdentityError::poisoned("user records"))?;
        Ok(users.len())
    }

    /// Returns true if no users are loaded.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Writes the given records to disk atomically.
    ///
    /// The caller holds the write lock, so concurrent registrations cannot
    /// interleave their rewrites.
    fn persist(&self, users: &[UserRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let data = UserFileData {
            users: users.to_vec(),
        };

        let mut contents = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut contents, formatter);
        data.serialize(&mut serializer)?;
        contents.push(b'\n');

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &contents)?;
        fs::rename(&temp_path, &self.path)?;

        tracing::debug!("Saved {} users to {:?}", users.len(), self.path);
        Ok(())
    }
}

impl IdentityStore for JsonIdentityStore {
    /// Loads the user file.
    ///
    /// A missing file leaves the store empty. A file that exists but cannot
    /// be read or parsed is an error.
    fn load_all(&self) -> Result<()> {
        if !self.path.exists() {
            tracing::warn!("User file not found at {:?}, starting empty", self.path);
            return Ok(());
        }

        let contents = fs::read_to_string(&self.path)?;
        let data: UserFileData = serde_json::from_str(&contents)?;

        let mut users = self
            .users
            .write()
            .map_err(|_| IdentityError::poisoned("user records"))?;

        users.clear();
        for user in data.users {
            if users.iter().any(|u| u.username == user.username) {
                tracing::warn!(
                    "Ignoring duplicate user {:?} in {:?}",
                    user.username,
                    self.path
                );
                continue;
            }
            users.push(user);
        }

        tracing::info!("Loaded {} users from {:?}", users.len(), self.path);
        Ok(())
    }

    fn validate(&self, username: &str, password: &str) -> bool {
        let users = match self.users.read() {
            Ok(users) => users,
            Err(_) => {
                tracing::warn!("User records lock poisoned, rejecting credentials");
                return false;
            }
        };
        users.iter().any(|u| u.matches(username, password))
    }

    fn register_with_role(&self, username: &str, password: &str, is_admin: bool) -> Result<()> {
        validate_new_user(username, password)?;

        let mut users = self
            .users
            .write()
            .map_err(|_| IdentityError::poisoned("user records"))?;

        if users.iter().any(|u| u.username == username) {
            return Err(IdentityError::Conflict {
                username: username.to_string(),
            });
        }

        users.push(UserRecord {
            username: username.to_string(),
            password: password.to_string(),
            is_admin,
        });

        if let Err(e) = self.persist(&users) {
            users.pop();
            return Err(e);
        }

        tracing::info!("Registered user {} (admin: {})", username, is_admin);
        Ok(())
    }

    fn is_admin(&self, username: &str) -> Result<bool> {
        let users = self
            .users
            .read()
            .map_err(|_| IdentityError::poisoned("user records"))?;

        Ok(users
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.is_admin)
            .unwrap_or(false))
    }

    fn list_users(&self) -> Result<Vec<UserRecord>> {
        let users = self
            .users
            .read()
            .map_err(|_| IdentityError::poisoned("user records"))?;
        Ok(users.clone())
    }

    fn mode(&self) -> StorageMode {
        StorageMode::Json
    }
}
