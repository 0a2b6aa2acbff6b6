//! Where configuration documents come from.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// A configuration document plus a marker that changes whenever it does.
pub trait ConfigSource: Send + Sync {
    /// Modification marker of the current document.
    fn modified(&self) -> Result<DateTime<Utc>, ConfigError>;

    /// Raw document text.
    fn read(&self) -> Result<String, ConfigError>;
}

/// Configuration file on the local filesystem, versioned by its mtime.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> ConfigError {
        ConfigError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl ConfigSource for FileSource {
    fn modified(&self) -> Result<DateTime<Utc>, ConfigError> {
        let modified = std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .map_err(|e| self.io_error(e))?;
        Ok(modified.into())
    }

    fn read(&self) -> Result<String, ConfigError> {
        std::fs::read_to_string(&self.path).map_err(|e| self.io_error(e))
    }
}
