//! # FileHost Identity Library
//!
//! This crate holds user accounts for the FileHost shared-file server and
//! answers the one question every request asks first: who is calling?
//!
//! ## Overview
//!
//! - **User Records**: username, plaintext password and admin flag
//! - **Credentials**: the `username:password` pair carried in the `auth` cookie
//! - **Identity Stores**: a single [`IdentityStore`] trait with two backends,
//!   a JSON file ([`JsonIdentityStore`]) and an SQLite table
//!   ([`SqliteIdentityStore`])
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │        Arc<dyn IdentityStore>           │  chosen once at startup
//! ├────────────────────┬────────────────────┤
//! │  JsonIdentityStore │ SqliteIdentityStore│
//! │  RwLock<Vec<User>> │ Mutex<Connection>  │
//! ├────────────────────┼────────────────────┤
//! │   users.json       │   users.db         │
//! └────────────────────┴────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use identity::{open_store, IdentityStore, StoreLocation};
//!
//! let store = open_store(&StoreLocation::Json("users.json".into())).unwrap();
//! store.register("alice", "pw1").unwrap();
//! assert!(store.validate("alice", "pw1"));
//! assert!(!store.validate("alice", "wrong"));
//! ```
//!
//! ## Modules
//!
//! - [`user`]: User records and cookie credentials
//! - [`store`]: The store trait and backend selection
//! - [`json_store`]: JSON file backend
//! - [`sqlite_store`]: SQLite backend
//! - [`error`]: Error types

pub mod error;
pub mod json_store;
pub mod sqlite_store;
pub mod store;
pub mod user;

pub use error::{IdentityError, Result};
pub use json_store::JsonIdentityStore;
pub use sqlite_store::SqliteIdentityStore;
pub use store::{open_store, IdentityStore, StorageMode, StoreLocation};
pub use user::{validate_new_user, Credential, UserRecord, AUTH_COOKIE_NAME};
