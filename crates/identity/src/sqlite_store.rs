//! SQLite identity backend.
//!
//! Users live in a single `users` table keyed by a unique username. The
//! connection sits behind a `Mutex`; SQLite itself enforces uniqueness, so
//! registration is a plain insert.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Result as SqliteResult};

use crate::error::{IdentityError, Result};
use crate::store::{IdentityStore, StorageMode};
use crate::user::{validate_new_user, UserRecord};

/// Current schema version.
const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Identity store backed by an SQLite database.
pub struct SqliteIdentityStore {
    conn: Mutex<Connection>,
}

impl SqliteIdentityStore {
    /// Opens or creates a database at the given path and applies migrations.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        tracing::debug!("Opened identity database at {:?}", path);
        Self::from_connection(conn)
    }

    /// Opens an in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Get the current schema version.
    pub fn schema_version(&self) -> Result<i32> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| IdentityError::poisoned("identity database"))?;
        Ok(schema_version(&conn)?)
    }
}

fn schema_version(conn: &Connection) -> SqliteResult<i32> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
}

fn has_column(conn: &Connection, table: &str, column: &str) -> SqliteResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<SqliteResult<Vec<_>>>()?;
    Ok(names.iter().any(|name| name == column))
}

/// Run all pending migrations.
fn run_migrations(conn: &mut Connection) -> Result<()> {
    let current_version = schema_version(conn)?;

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Migration to version 1: the bare users table.
fn migrate_v1(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            password TEXT NOT NULL
        )
        "#,
        [],
    )?;

    tx.execute(&format!("PRAGMA user_version = {}", 1), [])?;
    tx.commit()?;
    Ok(())
}

/// Migration to version 2: the admin flag.
///
/// Rows that predate the column read as non-admin.
fn migrate_v2(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    if !has_column(&tx, "users", "is_admin")? {
        tx.execute(
            "ALTER TABLE users ADD COLUMN is_admin INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
    }

    tx.execute(
        &format!("PRAGMA user_version = {}", CURRENT_SCHEMA_VERSION),
        [],
    )?;
    tx.commit()?;
    Ok(())
}

impl IdentityStore for SqliteIdentityStore {
    /// The schema is created when the database is opened; nothing to load.
    fn load_all(&self) -> Result<()> {
        Ok(())
    }

    fn validate(&self, username: &str, password: &str) -> bool {
        let conn = match self.conn.lock() {
            Ok(conn) => conn,
            Err(_) => {
                tracing::warn!("Identity database lock poisoned, rejecting credentials");
                return false;
            }
        };

        let stored = conn
            .query_row(
                "SELECT password FROM users WHERE username = ?1",
                params![username],
                |row| row.get::<_, String>(0),
            )
            .optional();

        match stored {
            Ok(Some(stored)) => stored == password,
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Credential lookup for {} failed: {}", username, e);
                false
            }
        }
    }

    fn register_with_role(&self, username: &str, password: &str, is_admin: bool) -> Result<()> {
        validate_new_user(username, password)?;

        let conn = self
            .conn
            .lock()
            .map_err(|_| IdentityError::poisoned("identity database"))?;

        let inserted = conn.execute(
            "INSERT INTO users (username, password, is_admin) VALUES (?1, ?2, ?3)",
            params![username, password, is_admin],
        );

        match inserted {
            Ok(_) => {
                tracing::info!("Registered user {} (admin: {})", username, is_admin);
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(IdentityError::Conflict {
                    username: username.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    fn is_admin(&self, username: &str) -> Result<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| IdentityError::poisoned("identity database"))?;

        let flag = conn
            .query_row(
                "SELECT is_admin FROM users WHERE username = ?1",
                params![username],
                |row| row.get::<_, bool>(0),
            )
            .optional()?;

        Ok(flag.unwrap_or(false))
    }

    fn list_users(&self) -> Result<Vec<UserRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| IdentityError::poisoned("identity database"))?;

        let mut stmt = conn.prepare(
            r#"
            SELECT username, password, is_admin
            FROM users
            ORDER BY id
            "#,
        )?;

        let users = stmt
            .query_map([], |row| {
                Ok(UserRecord {
                    username: row.get(0)?,
                    password: row.get(1)?,
                    is_admin: row.get(2)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(users)
    }

    fn mode(&self) -> StorageMode {
        StorageMode::Sqlite
    }
}
