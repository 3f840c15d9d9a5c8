//! The identity store trait and backend selection.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::json_store::JsonIdentityStore;
use crate::sqlite_store::SqliteIdentityStore;
use crate::user::UserRecord;

/// Which backend holds the user records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Records in a JSON file, held in memory.
    #[default]
    Json,
    /// Records in an SQLite `users` table.
    Sqlite,
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageMode::Json => write!(f, "json"),
            StorageMode::Sqlite => write!(f, "sqlite"),
        }
    }
}

impl std::str::FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(StorageMode::Json),
            "sqlite" => Ok(StorageMode::Sqlite),
            other => Err(format!("invalid storage mode: {}", other)),
        }
    }
}

/// Where the selected backend keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Path to the JSON user file.
    Json(PathBuf),
    /// Path to the SQLite database file.
    Sqlite(PathBuf),
}

impl StoreLocation {
    /// The storage mode this location selects.
    pub fn mode(&self) -> StorageMode {
        match self {
            StoreLocation::Json(_) => StorageMode::Json,
            StoreLocation::Sqlite(_) => StorageMode::Sqlite,
        }
    }
}

/// Validates credentials and registers users.
///
/// Implementations are shared across request handlers, so every method
/// takes `&self` and does its own locking. `validate` never reports an
/// error: any failure inside it means "not authenticated".
pub trait IdentityStore: Send + Sync {
    /// Loads every record from the backing store.
    fn load_all(&self) -> Result<()>;

    /// Returns true only for an exact username and password match.
    fn validate(&self, username: &str, password: &str) -> bool;

    /// Registers a new user with the given admin flag.
    fn register_with_role(&self, username: &str, password: &str, is_admin: bool) -> Result<()>;

    /// Registers a new regular user.
    fn register(&self, username: &str, password: &str) -> Result<()> {
        self.register_with_role(username, password, false)
    }

    /// Looks up the admin flag. Unknown users are not admins.
    fn is_admin(&self, username: &str) -> Result<bool>;

    /// Lists every user record.
    fn list_users(&self) -> Result<Vec<UserRecord>>;

    /// Which backend this is.
    fn mode(&self) -> StorageMode;
}

/// Opens the configured backend and loads its records.
///
/// Called once at startup; a failure here must stop the process before it
/// serves traffic.
pub fn open_store(location: &StoreLocation) -> Result<Arc<dyn IdentityStore>> {
    let store: Arc<dyn IdentityStore> = match location {
        StoreLocation::Json(path) => Arc::new(JsonIdentityStore::new(path)),
        StoreLocation::Sqlite(path) => Arc::new(SqliteIdentityStore::open(path)?),
    };
    store.load_all()?;
    tracing::info!("Identity store ready (mode: {})", store.mode());
    Ok(store)
}
