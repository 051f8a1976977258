//! Named snapshots of the live configuration tree and package set.
//!
//! ```text
//! snapshots/<name>/
//! ├── metadata.json
//! └── tree/            copy of the configuration home, minus rice's own state
//! ```
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use super::BackupManager;
use super::operation::storage;
use crate::error::{BackupError, Result};
use crate::resources::PackageInstaller;
use crate::resources::fs::{copy_tree, remove_path, sorted_entries};
use crate::store::{validate_name, write_json_atomic};

const METADATA: &str = "metadata.json";
const TREE: &str = "tree";

/// Snapshot metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot name, also its directory name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Packages recorded at creation.
    #[serde(default)]
    pub packages: BTreeSet<String>,
    /// The live tree that was captured.
    pub config_tree: PathBuf,
    /// Rice the snapshot was taken for; `None` for whole-system snapshots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rice: Option<String>,
}

/// Outcome of restoring a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotRestore {
    /// Packages that were missing and got installed.
    pub installed: Vec<String>,
    /// Installed packages the snapshot does not list.
    pub extras: Vec<String>,
    /// Whether `extras` were removed.
    pub removed_extras: bool,
}

impl BackupManager {
    /// Capture the live configuration tree and `packages` as snapshot `name`.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::SnapshotExists`] if the name is taken, or a
    /// storage error if copying fails.
    pub fn create_snapshot(
        &self,
        name: &str,
        description: &str,
        packages: BTreeSet<String>,
        rice: Option<&str>,
    ) -> Result<Snapshot> {
        validate_name(name)?;
        let dir = self.snapshots_dir.join(name);
        if dir.exists() {
            return Err(BackupError::SnapshotExists(name.to_string()).into());
        }
        let tree = dir.join(TREE);
        std::fs::create_dir_all(&tree).map_err(|e| storage(&tree, e))?;

        for entry in self.live_entries()? {
            let Some(file_name) = entry.file_name() else {
                continue;
            };
            if let Err(e) = copy_tree(&entry, &tree.join(file_name), false) {
                let _ = std::fs::remove_dir_all(&dir);
                return Err(storage(&entry, format!("{e:#}")).into());
            }
        }

        let snapshot = Snapshot {
            name: name.to_string(),
            description: description.to_string(),
            created_at: Utc::now(),
            packages,
            config_tree: self.live_tree.clone(),
            rice: rice.map(String::from),
        };
        write_json_atomic(&dir.join(METADATA), &snapshot)?;
        self.log.info(&format!("created snapshot {name}"));
        Ok(snapshot)
    }

    /// Replace the live configuration tree with snapshot `name` and reconcile
    /// packages: missing ones are installed.
    ///
    /// For whole-system snapshots, installed packages the snapshot does not
    /// list are removed unless `keep_extras` is set; kept extras are only
    /// reported. Rice snapshots never compute extras.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::SnapshotMissing`], a storage error, or the
    /// installer's error.
    pub fn restore_snapshot(
        &self,
        name: &str,
        installer: &dyn PackageInstaller,
        keep_extras: bool,
    ) -> Result<SnapshotRestore> {
        let snapshot = self.load_snapshot(name)?;
        let tree = self.snapshots_dir.join(name).join(TREE);

        for entry in self.live_entries()? {
            remove_path(&entry).map_err(|e| storage(&entry, format!("{e:#}")))?;
        }
        std::fs::create_dir_all(&self.live_tree).map_err(|e| storage(&self.live_tree, e))?;
        for entry in sorted_entries(&tree).map_err(|e| storage(&tree, format!("{e:#}")))? {
            let Some(file_name) = entry.file_name() else {
                continue;
            };
            copy_tree(&entry, &self.live_tree.join(file_name), false)
                .map_err(|e| storage(&entry, format!("{e:#}")))?;
        }
        self.log
            .info(&format!("restored {} from snapshot {name}", self.live_tree.display()));

        let mut outcome = SnapshotRestore::default();
        let missing: Vec<String> = snapshot
            .packages
            .iter()
            .filter(|p| !installer.is_installed(p))
            .cloned()
            .collect();
        if !missing.is_empty() {
            installer.install(&missing)?;
            outcome.installed = missing;
        }

        if snapshot.rice.is_none() {
            let current = installer.installed_packages()?;
            outcome.extras = current.difference(&snapshot.packages).cloned().collect();
            if !outcome.extras.is_empty() {
                self.log.info(&format!(
                    "{} package(s) not in snapshot: {}",
                    outcome.extras.len(),
                    outcome.extras.join(", ")
                ));
                if !keep_extras {
                    installer.remove(&outcome.extras)?;
                    outcome.removed_extras = true;
                }
            }
        }
        Ok(outcome)
    }

    /// Delete snapshot `name`.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::SnapshotMissing`] or a storage error.
    pub fn delete_snapshot(&self, name: &str) -> Result<()> {
        validate_name(name)?;
        let dir = self.snapshots_dir.join(name);
        if !dir.is_dir() {
            return Err(BackupError::SnapshotMissing(name.to_string()).into());
        }
        std::fs::remove_dir_all(&dir).map_err(|e| storage(&dir, e))?;
        self.log.info(&format!("deleted snapshot {name}"));
        Ok(())
    }

    /// Every snapshot, oldest first. Unreadable metadata is warned and skipped.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the snapshot area cannot be read.
    pub fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        let mut snapshots = Vec::new();
        let entries = sorted_entries(&self.snapshots_dir)
            .map_err(|e| storage(&self.snapshots_dir, format!("{e:#}")))?;
        for dir in entries.iter().filter(|p| p.is_dir()) {
            match read_metadata(dir) {
                Ok(s) => snapshots.push(s),
                Err(e) => self
                    .log
                    .warn(&format!("skipping snapshot {}: {e}", dir.display())),
            }
        }
        snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(snapshots)
    }

    fn load_snapshot(&self, name: &str) -> Result<Snapshot> {
        validate_name(name)?;
        let dir = self.snapshots_dir.join(name);
        if !dir.is_dir() {
            return Err(BackupError::SnapshotMissing(name.to_string()).into());
        }
        Ok(read_metadata(&dir)?)
    }

    /// Top-level entries of the live tree, excluding rice's state directory.
    fn live_entries(&self) -> Result<Vec<PathBuf>> {
        let entries = sorted_entries(&self.live_tree)
            .map_err(|e| storage(&self.live_tree, format!("{e:#}")))?;
        Ok(entries
            .into_iter()
            .filter(|p| !self.state_dir.starts_with(p))
            .collect())
    }
}

fn read_metadata(dir: &Path) -> std::result::Result<Snapshot, BackupError> {
    let path = dir.join(METADATA);
    let content = std::fs::read_to_string(&path).map_err(|e| storage(&path, e))?;
    serde_json::from_str(&content).map_err(|e| storage(&path, e))
}
