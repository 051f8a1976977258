//! Exclusive state lock held by every mutating command.
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{Result, RiceError};

/// Lock file guard. The file is removed when the guard is dropped.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
}

impl StateLock {
    /// Acquire the lock at `path`, creating parent directories as needed.
    ///
    /// The file is created with `create_new` and carries the holder's pid.
    ///
    /// # Errors
    ///
    /// Returns [`RiceError::Locked`] if the file already exists, or a file
    /// operation error if it cannot be created.
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| RiceError::file(parent, e))?;
        }
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(RiceError::Locked {
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(RiceError::file(path, e)),
        };
        writeln!(file, "{}", std::process::id()).map_err(|e| RiceError::file(path, e))?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Path of the held lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/rice.lock");

        let first = StateLock::acquire(&path).unwrap();
        let pid = fs::read_to_string(first.path()).unwrap();
        assert_eq!(pid.trim(), std::process::id().to_string());

        let second = StateLock::acquire(&path);
        assert!(
            matches!(second, Err(RiceError::Locked { .. })),
            "second holder must be rejected"
        );

        drop(first);
        assert!(!path.exists(), "lock file is removed on drop");
        assert!(StateLock::acquire(&path).is_ok());
    }
}
