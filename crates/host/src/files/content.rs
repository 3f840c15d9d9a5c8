//! Uploaded file content on disk.
//!
//! Every file lives directly in the files directory under its upload name.
//! Names are a single plain path component; hidden names are reserved for
//! the ownership registry and in-flight temp files. Writes land in a temp
//! file first and are renamed into place.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors that can occur while reading or writing file content.
#[derive(Debug, Error)]
pub enum ContentError {
    /// The file name is not a plain, visible file name.
    #[error("invalid file name: {0:?}")]
    InvalidName(String),

    /// The requested file does not exist.
    #[error("file not found: {0}")]
    NotFound(String),

    /// File too large.
    #[error("file too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Checks that a name is safe to use as a file in the files directory.
pub fn validate_file_name(name: &str) -> Result<(), ContentError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);

    if invalid {
        return Err(ContentError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// File content storage rooted at the files directory.
pub struct ContentStore {
    root: PathBuf,
    max_size: u64,
}

impl ContentStore {
    /// Creates a store rooted at `root` that rejects files over `max_size` bytes.
    pub fn new<P: AsRef<Path>>(root: P, max_size: u64) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_size,
        }
    }

    /// Returns the files directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the size limit in bytes.
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Creates the files directory if it does not exist.
    pub fn ensure_root(&self) -> Result<(), ContentError> {
        if !self.root.exists() {
            fs::create_dir_all(&self.root)?;
            tracing::info!("Created files directory {:?}", self.root);
        }
        Ok(())
    }

    /// Resolves a validated file name to its path.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, ContentError> {
        validate_file_name(name)?;
        Ok(self.root.join(name))
    }

    /// Rejects content larger than the configured limit.
    pub fn check_size(&self, size: u64) -> Result<(), ContentError> {
        if size > self.max_size {
            return Err(ContentError::TooLarge {
                size,
                limit: self.max_size,
            });
        }
        Ok(())
    }

    /// Returns true if a file with this name exists.
    pub fn exists(&self, name: &str) -> Result<bool, ContentError> {
        Ok(self.path_for(name)?.is_file())
    }

    /// Writes a file, replacing any existing content.
    pub fn write(&self, name: &str, data: &[u8]) -> Result<(), ContentError> {
        let path = self.path_for(name)?;
        self.check_size(data.len() as u64)?;

        let temp_path = self
            .root
            .join(format!(".upload-{}.tmp", uuid::Uuid::new_v4()));

        if let Err(e) = fs::write(&temp_path, data) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        tracing::debug!("Wrote {} bytes to {:?}", data.len(), path);
        Ok(())
    }

    /// Reads a whole file.
    pub fn read(&self, name: &str) -> Result<Vec<u8>, ContentError> {
        let path = self.path_for(name)?;
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(ContentError::NotFound(name.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes a file.
    ///
    /// Returns `false` if it was already gone, so a retried delete can go on
    /// to clear stale metadata.
    pub fn delete(&self, name: &str) -> Result<bool, ContentError> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::debug!("Deleted {:?}", path);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
