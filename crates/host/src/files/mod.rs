//! File storage and ownership.
//!
//! This module provides:
//! - File content storage in the files directory with name validation
//! - The ownership registry mapping file names to owners
//! - Owner/admin access control for edit and delete
//!
//! # Consistency
//!
//! Content and metadata are separate files. Deletes remove content first
//! and metadata second, so a partial failure leaves at worst a stale record
//! with no content, never content with no owner.

pub mod access;
pub mod content;
pub mod registry;

pub use access::{AccessDecision, AccessPolicy, DenyReason, FileAction};
pub use content::{validate_file_name, ContentError, ContentStore};
pub use registry::{FileRecord, FileRegistry, RegistryError};
