//! Operation-scoped backups with rollback, plus named snapshots.
//!
//! Each mutating operation gets its own directory under `backups/`:
//!
//! ```text
//! backups/20240101_120000-apply-gruvbox/
//! ├── manifest.json        original path → captured copy, created paths
//! └── files/<sha256>       one entry per captured path
//! ```
//!
//! The manifest is rewritten after every capture so a crashed or finished
//! operation can still be rolled back by id.
pub mod operation;
pub mod snapshot;

use chrono::{Duration, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Paths;
use crate::error::BackupError;
use crate::logging::Log;
use crate::resources::fs::{copy_tree, ensure_parent_dir, path_present, remove_path};

pub use operation::OperationBackup;
pub use snapshot::{Snapshot, SnapshotRestore};

use operation::storage;

/// Directory inside an operation that holds captured copies.
const FILES_DIR: &str = "files";

/// Owns the backup area and the (at most one) open operation.
pub struct BackupManager {
    backups_dir: PathBuf,
    snapshots_dir: PathBuf,
    /// Live configuration tree captured by snapshots.
    live_tree: PathBuf,
    /// Subdirectory of `live_tree` that snapshots leave alone.
    state_dir: PathBuf,
    active: Option<OperationBackup>,
    log: Arc<dyn Log>,
}

impl std::fmt::Debug for BackupManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupManager")
            .field("backups_dir", &self.backups_dir)
            .field("snapshots_dir", &self.snapshots_dir)
            .field("active", &self.active.as_ref().map(|op| &op.id))
            .finish_non_exhaustive()
    }
}

impl BackupManager {
    /// Manager rooted at the rice state directory of `paths`.
    #[must_use]
    pub fn new(paths: &Paths, log: Arc<dyn Log>) -> Self {
        Self {
            backups_dir: paths.backups_dir(),
            snapshots_dir: paths.snapshots_dir(),
            live_tree: paths.config_home.clone(),
            state_dir: paths.state_dir.clone(),
            active: None,
            log,
        }
    }

    /// The open operation, if any.
    #[must_use]
    pub const fn active(&self) -> Option<&OperationBackup> {
        self.active.as_ref()
    }

    /// Open a new operation.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::OperationInProgress`] without touching the
    /// filesystem if an operation is already open, or
    /// [`BackupError::Storage`] if its directory cannot be created.
    pub fn start_operation(&mut self, name: &str) -> Result<OperationBackup, BackupError> {
        if let Some(active) = &self.active {
            return Err(BackupError::OperationInProgress {
                active: active.id.clone(),
            });
        }

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let safe_name = name.replace(['/', '\\'], "_");
        let mut id = format!("{stamp}-{safe_name}");
        let mut n = 2;
        while self.backups_dir.join(&id).exists() {
            id = format!("{stamp}-{safe_name}-{n}");
            n += 1;
        }

        let path = self.backups_dir.join(&id);
        std::fs::create_dir_all(&path).map_err(|e| storage(&path, e))?;
        let op = OperationBackup::new(id, name.to_string(), path);
        op.save()?;
        self.log.debug(&format!("opened backup operation {}", op.id));
        self.active = Some(op.clone());
        Ok(op)
    }

    /// Capture `path` into the open operation before it is modified.
    ///
    /// Files, directories and symlinks are copied with their mode. Returns
    /// `false` (and does nothing) when `path` does not exist or was already
    /// captured by this operation.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::NoActiveOperation`] without an open operation,
    /// or [`BackupError::Capture`] if the copy fails.
    pub fn backup_file(&mut self, path: &Path) -> Result<bool, BackupError> {
        let op = self.active.as_mut().ok_or(BackupError::NoActiveOperation)?;
        if !path_present(path) || op.created_files.contains_key(path) {
            return Ok(false);
        }

        let dest = op.path.join(FILES_DIR).join(path_digest(path));
        let captured = ensure_parent_dir(&dest).and_then(|()| {
            remove_path(&dest)?;
            copy_tree(path, &dest, false)
        });
        if let Err(e) = captured {
            return Err(BackupError::Capture {
                path: path.display().to_string(),
                message: format!("{e:#}"),
            });
        }

        op.created_files.insert(path.to_path_buf(), dest);
        op.save()?;
        self.log.debug(&format!("backed up {}", path.display()));
        Ok(true)
    }

    /// Record a path the open operation created.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::NoActiveOperation`] without an open operation.
    pub fn track_created(&mut self, path: &Path) -> Result<(), BackupError> {
        let op = self.active.as_mut().ok_or(BackupError::NoActiveOperation)?;
        if !op.created_paths.iter().any(|p| p == path) {
            op.created_paths.push(path.to_path_buf());
            op.save()?;
        }
        Ok(())
    }

    /// Undo operation `id`: remove the paths it created, then put every
    /// captured path back.
    ///
    /// Works on the open operation and on finished ones loaded from disk. A
    /// missing captured copy is a warning.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::UnknownOperation`] for an unknown id, or
    /// [`BackupError::Rollback`] listing every path that could not be
    /// restored.
    pub fn rollback(&mut self, id: &str) -> Result<(), BackupError> {
        let op = match self.active.as_ref() {
            Some(active) if active.id == id => active.clone(),
            _ => self.load_operation(id)?,
        };
        self.log.info(&format!("rolling back {}", op.id));

        let mut failures = Vec::new();
        for created in op.created_paths.iter().rev() {
            if let Err(e) = remove_path(created) {
                failures.push(format!("{}: {e:#}", created.display()));
            }
        }

        for (original, captured) in &op.created_files {
            if !path_present(captured) {
                self.log.warn(&format!(
                    "backup of {} is missing ({})",
                    original.display(),
                    captured.display()
                ));
                continue;
            }
            match put_back(captured, original) {
                Ok(()) => self.log.debug(&format!("restored {}", original.display())),
                Err(e) => failures.push(format!("{}: {e:#}", original.display())),
            }
        }

        if self.active.as_ref().is_some_and(|a| a.id == id) {
            self.active = None;
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BackupError::Rollback {
                operation: op.id,
                failures,
            })
        }
    }

    /// Put the captured copies of `paths` back in place without closing the
    /// open operation. Paths it did not capture are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::NoActiveOperation`] without an open operation,
    /// or [`BackupError::Rollback`] listing every path that could not be
    /// restored.
    pub fn restore(&self, paths: &[PathBuf]) -> Result<(), BackupError> {
        let op = self.active.as_ref().ok_or(BackupError::NoActiveOperation)?;
        let mut failures = Vec::new();
        for original in paths {
            let Some(captured) = op.created_files.get(original) else {
                continue;
            };
            match put_back(captured, original) {
                Ok(()) => self.log.debug(&format!("restored {}", original.display())),
                Err(e) => failures.push(format!("{}: {e:#}", original.display())),
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(BackupError::Rollback {
                operation: op.id.clone(),
                failures,
            })
        }
    }

    /// Close the open operation `id`.
    ///
    /// An operation that captured and created nothing leaves no directory
    /// behind and yields `None`.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::NoActiveOperation`] if `id` is not the open
    /// operation, or [`BackupError::Storage`] if the empty directory cannot be
    /// removed.
    pub fn finish(&mut self, id: &str) -> Result<Option<OperationBackup>, BackupError> {
        let op = match self.active.take() {
            Some(op) if op.id == id => op,
            other => {
                self.active = other;
                return Err(BackupError::NoActiveOperation);
            }
        };
        if op.is_empty() {
            std::fs::remove_dir_all(&op.path).map_err(|e| storage(&op.path, e))?;
            self.log.debug(&format!("discarded empty backup {}", op.id));
            return Ok(None);
        }
        self.log
            .debug(&format!("kept backup {} ({} captured)", op.id, op.created_files.len()));
        Ok(Some(op))
    }

    /// Every operation backup on disk, oldest first.
    ///
    /// Directories without a readable manifest are warned and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Storage`] if the backup area cannot be read.
    pub fn list_operations(&self) -> Result<Vec<OperationBackup>, BackupError> {
        let entries = crate::resources::fs::sorted_entries(&self.backups_dir)
            .map_err(|e| storage(&self.backups_dir, format!("{e:#}")))?;
        let mut ops = Vec::new();
        for dir in entries.iter().filter(|p| p.is_dir()) {
            match OperationBackup::load(dir) {
                Ok(op) => ops.push(op),
                Err(e) => self.log.warn(&format!("skipping backup {}: {e}", dir.display())),
            }
        }
        ops.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(ops)
    }

    /// Remove operation backups older than `max_age_days`. Snapshots and the
    /// open operation are never touched. Returns the removed ids.
    ///
    /// # Errors
    ///
    /// Returns [`BackupError::Storage`] if a backup cannot be removed.
    pub fn cleanup_old(&self, max_age_days: u32) -> Result<Vec<String>, BackupError> {
        let cutoff = Utc::now() - Duration::days(i64::from(max_age_days));
        let mut removed = Vec::new();
        for op in self.list_operations()? {
            let is_active = self.active.as_ref().is_some_and(|a| a.id == op.id);
            if op.timestamp < cutoff && !is_active {
                std::fs::remove_dir_all(&op.path).map_err(|e| storage(&op.path, e))?;
                self.log.info(&format!("removed backup {}", op.id));
                removed.push(op.id);
            }
        }
        Ok(removed)
    }

    fn load_operation(&self, id: &str) -> Result<OperationBackup, BackupError> {
        let dir = self.backups_dir.join(id);
        if id.contains(['/', '\\']) || !dir.is_dir() {
            return Err(BackupError::UnknownOperation(id.to_string()));
        }
        OperationBackup::load(&dir)
    }
}

/// Replace whatever is at `original` with the captured copy.
fn put_back(captured: &Path, original: &Path) -> anyhow::Result<()> {
    remove_path(original)?;
    ensure_parent_dir(original)?;
    copy_tree(captured, original, false)
}

/// Lowercase hex SHA-256 of the original path, used as the captured name.
fn path_digest(path: &Path) -> String {
    use sha2::{Digest, Sha256};
    use std::fmt::Write as _;

    let digest = Sha256::digest(path.as_os_str().as_encoded_bytes());
    let mut hex = String::with_capacity(64);
    for b in &digest {
        // write! to a String is infallible.
        write!(hex, "{b:02x}").unwrap_or(());
    }
    hex
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::CaptureLog;

    fn manager(home: &Path) -> (BackupManager, Arc<CaptureLog>) {
        let log = Arc::new(CaptureLog::default());
        (BackupManager::new(&Paths::under(home), log.clone()), log)
    }

    // -----------------------------------------------------------------------
    // start_operation
    // -----------------------------------------------------------------------

    #[test]
    fn second_start_fails_without_touching_disk() {
        let home = tempfile::tempdir().unwrap();
        let (mut mgr, _) = manager(home.path());
        let first = mgr.start_operation("apply-a").unwrap();
        let before: Vec<_> = std::fs::read_dir(mgr.backups_dir.clone()).unwrap().collect();

        let err = mgr.start_operation("apply-b").unwrap_err();
        assert!(
            matches!(&err, BackupError::OperationInProgress { active } if *active == first.id),
            "unexpected error: {err}"
        );
        let after: Vec<_> = std::fs::read_dir(mgr.backups_dir.clone()).unwrap().collect();
        assert_eq!(before.len(), after.len(), "no directory should be created");
    }

    #[test]
    fn ids_are_unique_within_a_second() {
        let home = tempfile::tempdir().unwrap();
        let (mut mgr, _) = manager(home.path());
        let a = mgr.start_operation("apply").unwrap();
        mgr.track_created(&home.path().join("x")).unwrap();
        mgr.finish(&a.id).unwrap();
        let b = mgr.start_operation("apply").unwrap();
        assert_ne!(a.id, b.id);
    }

    // -----------------------------------------------------------------------
    // backup_file + rollback
    // -----------------------------------------------------------------------

    #[cfg(unix)]
    #[test]
    fn rollback_restores_content_and_mode_after_deletion() {
        use std::os::unix::fs::PermissionsExt;
        let home = tempfile::tempdir().unwrap();
        let (mut mgr, _) = manager(home.path());
        let file = home.path().join(".config/kitty/kitty.conf");
        std::fs::create_dir_all(file.parent().unwrap()).unwrap();
        std::fs::write(&file, "font_size 11").unwrap();
        std::fs::set_permissions(&file, std::fs::Permissions::from_mode(0o640)).unwrap();

        let op = mgr.start_operation("apply-kitty").unwrap();
        assert!(mgr.backup_file(&file).unwrap());
        std::fs::remove_dir_all(home.path().join(".config/kitty")).unwrap();

        mgr.rollback(&op.id).unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "font_size 11");
        let mode = std::fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
        assert!(mgr.active().is_none(), "rollback closes the operation");
    }

    #[test]
    fn backup_file_is_noop_for_missing_or_captured_paths() {
        let home = tempfile::tempdir().unwrap();
        let (mut mgr, _) = manager(home.path());
        let file = home.path().join("a.conf");
        std::fs::write(&file, "one").unwrap();

        mgr.start_operation("apply").unwrap();
        assert!(!mgr.backup_file(&home.path().join("absent")).unwrap());
        assert!(mgr.backup_file(&file).unwrap());
        std::fs::write(&file, "two").unwrap();
        assert!(!mgr.backup_file(&file).unwrap(), "already captured");
        assert_eq!(mgr.active().unwrap().created_files.len(), 1);
    }

    #[test]
    fn backup_file_without_operation_fails() {
        let home = tempfile::tempdir().unwrap();
        let (mut mgr, _) = manager(home.path());
        let err = mgr.backup_file(home.path()).unwrap_err();
        assert!(matches!(err, BackupError::NoActiveOperation));
    }

    #[test]
    fn rollback_removes_created_paths() {
        let home = tempfile::tempdir().unwrap();
        let (mut mgr, _) = manager(home.path());
        let op = mgr.start_operation("apply").unwrap();
        let created = home.path().join(".local/share/wallpapers");
        std::fs::create_dir_all(&created).unwrap();
        std::fs::write(created.join("bg.png"), "png").unwrap();
        mgr.track_created(&created).unwrap();

        mgr.rollback(&op.id).unwrap();
        assert!(!created.exists());
    }

    #[test]
    fn restore_puts_back_selected_paths_and_keeps_operation_open() {
        let home = tempfile::tempdir().unwrap();
        let (mut mgr, _) = manager(home.path());
        let kitty = home.path().join("kitty.conf");
        let foot = home.path().join("foot.ini");
        std::fs::write(&kitty, "old kitty").unwrap();
        std::fs::write(&foot, "old foot").unwrap();
        mgr.start_operation("apply").unwrap();
        mgr.backup_file(&kitty).unwrap();
        mgr.backup_file(&foot).unwrap();
        std::fs::remove_file(&kitty).unwrap();
        std::fs::write(&foot, "new foot").unwrap();

        mgr.restore(&[kitty.clone(), home.path().join("never-captured")])
            .unwrap();

        assert_eq!(std::fs::read_to_string(&kitty).unwrap(), "old kitty");
        assert_eq!(std::fs::read_to_string(&foot).unwrap(), "new foot");
        assert!(mgr.active().is_some());
        assert!(mgr.restore(&[]).is_ok());
    }

    #[test]
    fn finished_operation_rolls_back_from_manifest() {
        let home = tempfile::tempdir().unwrap();
        let file = home.path().join("waybar.conf");
        std::fs::write(&file, "original").unwrap();

        let id = {
            let (mut mgr, _) = manager(home.path());
            let op = mgr.start_operation("apply").unwrap();
            mgr.backup_file(&file).unwrap();
            std::fs::write(&file, "changed").unwrap();
            assert!(mgr.finish(&op.id).unwrap().is_some(), "captured, so kept");
            op.id
        };

        let (mut fresh, _) = manager(home.path());
        fresh.rollback(&id).unwrap();
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "original");
    }

    #[test]
    fn missing_captured_copy_is_a_warning() {
        let home = tempfile::tempdir().unwrap();
        let (mut mgr, log) = manager(home.path());
        let file = home.path().join("a");
        std::fs::write(&file, "x").unwrap();
        let op = mgr.start_operation("apply").unwrap();
        mgr.backup_file(&file).unwrap();
        std::fs::remove_dir_all(op.path.join(FILES_DIR)).unwrap();

        mgr.rollback(&op.id).unwrap();
        assert_eq!(log.warnings().len(), 1);
    }

    #[test]
    fn unknown_operation_is_reported() {
        let home = tempfile::tempdir().unwrap();
        let (mut mgr, _) = manager(home.path());
        let err = mgr.rollback("nope").unwrap_err();
        assert!(matches!(err, BackupError::UnknownOperation(id) if id == "nope"));
    }

    // -----------------------------------------------------------------------
    // finish / list / cleanup
    // -----------------------------------------------------------------------

    #[test]
    fn finish_drops_empty_operation() {
        let home = tempfile::tempdir().unwrap();
        let (mut mgr, _) = manager(home.path());
        let op = mgr.start_operation("apply").unwrap();
        assert!(mgr.finish(&op.id).unwrap().is_none());
        assert!(!op.path.exists());
        assert!(mgr.list_operations().unwrap().is_empty());
    }

    #[test]
    fn finish_with_wrong_id_keeps_operation_open() {
        let home = tempfile::tempdir().unwrap();
        let (mut mgr, _) = manager(home.path());
        let op = mgr.start_operation("apply").unwrap();
        assert!(mgr.finish("other").is_err());
        assert_eq!(mgr.active().map(|a| a.id.clone()), Some(op.id));
    }

    #[test]
    fn cleanup_removes_only_old_operations() {
        let home = tempfile::tempdir().unwrap();
        let (mut mgr, _) = manager(home.path());
        let file = home.path().join("f");
        std::fs::write(&file, "x").unwrap();

        let old = mgr.start_operation("old").unwrap();
        mgr.backup_file(&file).unwrap();
        mgr.finish(&old.id).unwrap();
        let mut aged = OperationBackup::load(&old.path).unwrap();
        aged.timestamp = Utc::now() - Duration::days(40);
        aged.save().unwrap();

        let recent = mgr.start_operation("recent").unwrap();
        mgr.backup_file(&file).unwrap();
        mgr.finish(&recent.id).unwrap();

        let removed = mgr.cleanup_old(30).unwrap();
        assert_eq!(removed, vec![old.id]);
        let left: Vec<_> = mgr.list_operations().unwrap().into_iter().map(|o| o.id).collect();
        assert_eq!(left, vec![recent.id]);
    }

    #[test]
    fn digest_is_stable_hex() {
        let a = path_digest(Path::new("/home/u/.config/nvim"));
        assert_eq!(a.len(), 64);
        assert_eq!(a, path_digest(Path::new("/home/u/.config/nvim")));
        assert_ne!(a, path_digest(Path::new("/home/u/.config/kitty")));
    }
}
