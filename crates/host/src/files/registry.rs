//! File ownership registry.
//!
//! Maps uploaded file names to their owner and creation time. The registry
//! is a JSON array on disk (`.fileinfo.json` inside the files directory)
//! mirrored in memory. Every mutation holds one `Mutex` across the whole
//! read-modify-write, including the rewrite of the file, so concurrent
//! uploads and deletes cannot lose each other's updates.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while reading or updating the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No record exists for the file.
    #[error("no record for file: {0}")]
    NotFound(String),

    /// Reading or writing the registry file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The registry file could not be encoded or decoded.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Lock poisoned during operation.
    #[error("lock poisoned: {context}")]
    LockPoisoned { context: String },
}

/// Ownership metadata for one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// File name, unique within the registry.
    pub name: String,
    /// Username of the uploader.
    pub owner: String,
    /// Upload time, stored as an RFC 3339 string.
    #[serde(rename = "created")]
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    /// Creates a new record.
    pub fn new(name: impl Into<String>, owner: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            created_at,
        }
    }
}

/// Thread-safe registry of file ownership records.
pub struct FileRegistry {
    /// The path to the JSON file.
    path: PathBuf,
    /// Records in insertion order.
    records: Mutex<Vec<FileRecord>>,
}

impl FileRegistry {
    /// Creates an empty registry that will persist to the given path.
    ///
    /// This does not load the file; call `load()` to read existing data.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            records: Mutex::new(Vec::new()),
        }
    }

    /// Creates a registry and loads it from disk.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RegistryError> {
        let registry = Self::new(path);
        registry.load()?;
        Ok(registry)
    }

    /// Returns the path to the registry file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<FileRecord>>, RegistryError> {
        self.records.lock().map_err(|_| RegistryError::LockPoisoned {
            context: "file registry".to_string(),
        })
    }

    /// Loads the registry from disk, replacing the in-memory records.
    ///
    /// A missing file or a file containing `null` reads as empty. If the
    /// file lists a name more than once, the first entry wins.
    pub fn load(&self) -> Result<(), RegistryError> {
        let loaded = if self.path.exists() {
            let contents = fs::read_to_string(&self.path)?;
            let parsed: Option<Vec<FileRecord>> = serde_json::from_str(&contents)?;
            parsed.unwrap_or_default()
        } else {
            tracing::debug!("Registry file not found at {:?}, starting empty", self.path);
            Vec::new()
        };

        let mut records = self.lock()?;
        records.clear();
        for record in loaded {
            if records.iter().any(|r| r.name == record.name) {
                tracing::warn!("Ignoring duplicate registry entry for {:?}", record.name);
                continue;
            }
            records.push(record);
        }

        tracing::info!("Loaded {} file records from {:?}", records.len(), self.path);
        Ok(())
    }

    /// Writes the given records to disk via a temp file and rename.
    fn persist(&self, records: &[FileRecord]) -> Result<(), RegistryError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let contents = serde_json::to_string_pretty(records)?;
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, contents)?;
        fs::rename(&temp_path, &self.path)?;

        tracing::debug!("Saved {} file records to {:?}", records.len(), self.path);
        Ok(())
    }

    /// Lists every record in insertion order.
    pub fn list(&self) -> Result<Vec<FileRecord>, RegistryError> {
        Ok(self.lock()?.clone())
    }

    /// Looks up the record for a file name.
    pub fn get(&self, name: &str) -> Result<Option<FileRecord>, RegistryError> {
        Ok(self.lock()?.iter().find(|r| r.name == name).cloned())
    }

    /// Records ownership of a file, replacing any existing record with the
    /// same name.
    ///
    /// Memory is only updated once the file on disk has been rewritten.
    pub fn record(
        &self,
        name: &str,
        owner: &str,
        created_at: DateTime<Utc>,
    ) -> Result<(), RegistryError> {
        let mut records = self.lock()?;

        let record = FileRecord::new(name, owner, created_at);
        let mut next = records.clone();
        match next.iter_mut().find(|r| r.name == name) {
            Some(existing) => *existing = record,
            None => next.push(record),
        }

        self.persist(&next)?;
        *records = next;

        tracing::info!("Recorded file {} (owner: {})", name, owner);
        Ok(())
    }

    /// Removes the record for a file name.
    ///
    /// Call only after the file content is gone. Returns `NotFound` and
    /// leaves the registry untouched when no record matches.
    pub fn remove(&self, name: &str) -> Result<FileRecord, RegistryError> {
        let mut records = self.lock()?;

        let index = records
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;

        let mut next = records.clone();
        let removed = next.remove(index);

        self.persist(&next)?;
        *records = next;

        tracing::info!("Removed file record {} (owner: {})", removed.name, removed.owner);
        Ok(removed)
    }

    /// Returns the number of records.
    pub fn len(&self) -> Result<usize, RegistryError> {
        Ok(self.lock()?.len())
    }

    /// Returns true if the registry has no records.
    pub fn is_empty(&self) -> Result<bool, RegistryError> {
        Ok(self.len()? == 0)
    }
}
