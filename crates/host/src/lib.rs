//! # FileHost Server Library
//!
//! Shared file hosting over HTTP with per-file ownership.
//!
//! ## Overview
//!
//! - **Accounts**: users register and log in; the `auth` cookie carries
//!   their credentials on every request
//! - **Files**: any authenticated user can list, upload and download
//! - **Ownership**: only a file's uploader or an admin may open, save or
//!   delete it
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  HTTP router (axum)                       │
//! ├──────────────────────────────────────────────────────────┤
//! │                       FileHost                            │
//! │                                                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐  │
//! │  │   Identity   │  │     File     │  │    Content     │  │
//! │  │    Store     │  │   Registry   │  │     Store      │  │
//! │  └──────────────┘  └──────────────┘  └────────────────┘  │
//! │   json | sqlite     .fileinfo.json     files directory    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use host::{http, Config, FileHost};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default()?;
//!     let host = Arc::new(FileHost::from_config(&config)?);
//!
//!     let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
//!     axum::serve(listener, http::router(host)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Configuration loading and defaults
//! - [`files`]: File content, ownership registry and access control
//! - [`host`]: The service tying accounts and files together
//! - [`http`]: Routes and handlers
//! - [`error`]: Error types

pub mod config;
pub mod error;
pub mod files;
pub mod host;
pub mod http;

pub use config::Config;
pub use error::{HostError, HostResult};
pub use host::{Dashboard, FileHost, FileListing};
