//! A single operation backup and its on-disk manifest.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{BackupError, RiceError};
use crate::store::write_json_atomic;

/// Manifest file name inside an operation directory.
pub const MANIFEST: &str = "manifest.json";

/// Everything one operation changed, enough to undo it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationBackup {
    /// `<timestamp>-<name>`, also the directory name.
    pub id: String,
    /// Operation name given to `start_operation`.
    pub name: String,
    /// Operation directory.
    pub path: PathBuf,
    /// Original path → captured copy inside `path`.
    #[serde(default)]
    pub created_files: BTreeMap<PathBuf, PathBuf>,
    /// Paths the operation created, removed on rollback.
    #[serde(default)]
    pub created_paths: Vec<PathBuf>,
    /// When the operation started.
    pub timestamp: DateTime<Utc>,
}

impl OperationBackup {
    pub(super) fn new(id: String, name: String, path: PathBuf) -> Self {
        Self {
            id,
            name,
            path,
            created_files: BTreeMap::new(),
            created_paths: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Returns `true` if the operation neither captured nor created anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created_files.is_empty() && self.created_paths.is_empty()
    }

    /// Load the manifest stored in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Storage`] if the manifest is missing or corrupt.
    pub fn load(dir: &Path) -> Result<Self, BackupError> {
        let manifest = dir.join(MANIFEST);
        let content = std::fs::read_to_string(&manifest).map_err(|e| storage(&manifest, e))?;
        serde_json::from_str(&content).map_err(|e| storage(&manifest, e))
    }

    /// Rewrite the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Storage`] if it cannot be written.
    pub fn save(&self) -> Result<(), BackupError> {
        let manifest = self.path.join(MANIFEST);
        write_json_atomic(&manifest, self).map_err(|e| match e {
            RiceError::FileOperation { path, message } => BackupError::Storage { path, message },
            other => storage(&manifest, other),
        })
    }
}

pub(super) fn storage(path: &Path, err: impl std::fmt::Display) -> BackupError {
    BackupError::Storage {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
