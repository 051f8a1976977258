//! Filesystem operation abstractions for dependency injection.
//!
//! Provides the [`FileSystemOps`] trait so that the repository walk in
//! [`classify`](crate::classify) can be unit-tested without touching the real
//! filesystem.  Production code uses [`SystemFileSystemOps`]; tests use
//! `MockFileSystemOps`.

use anyhow::Result;
use std::io::Read as _;
use std::path::{Path, PathBuf};

/// Abstraction over the read-only filesystem queries made while walking a rice.
pub trait FileSystemOps: Send + Sync + std::fmt::Debug {
    /// Returns `true` if `path` exists on the filesystem.
    fn exists(&self, path: &Path) -> bool;

    /// Returns `true` if `path` is a regular file (not a directory or broken symlink).
    fn is_file(&self, path: &Path) -> bool;

    /// Returns `true` if `path` is a directory (following symlinks).
    fn is_dir(&self, path: &Path) -> bool;

    /// Returns the immediate child paths inside `path`, sorted by file name.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be opened or read as a directory.
    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Read at most `limit` bytes from the start of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or read.
    fn read_prefix(&self, path: &Path, limit: usize) -> std::io::Result<Vec<u8>>;
}

/// Production [`FileSystemOps`] implementation that delegates to [`std::fs`].
#[derive(Debug, Default)]
pub struct SystemFileSystemOps;

impl FileSystemOps for SystemFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = std::fs::read_dir(path)?
            .map(|e| e.map(|entry| entry.path()).map_err(Into::into))
            .collect::<Result<Vec<_>>>()?;
        entries.sort();
        Ok(entries)
    }

    fn read_prefix(&self, path: &Path, limit: usize) -> std::io::Result<Vec<u8>> {
        let file = std::fs::File::open(path)?;
        let mut buf = Vec::with_capacity(limit);
        file.take(u64::try_from(limit).unwrap_or(u64::MAX))
            .read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// Mock [`FileSystemOps`] for unit tests.
///
/// Pre-configure files (with contents) and directory listings using the
/// builder-style methods, then pass `&mock` to
/// [`DirTree::build_with`](crate::classify::tree::DirTree::build_with).
///
/// # Example
///
/// ```ignore
/// let fs = MockFileSystemOps::new()
///     .with_dir_entries("/rice", vec![PathBuf::from("/rice/nvim")])
///     .with_dir_entries("/rice/nvim", vec![PathBuf::from("/rice/nvim/init.lua")])
///     .with_file("/rice/nvim/init.lua", "vim.o.number = true");
/// ```
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockFileSystemOps {
    files: std::collections::HashMap<PathBuf, Vec<u8>>,
    dirs: std::collections::HashMap<PathBuf, Vec<PathBuf>>,
    unreadable: std::collections::HashSet<PathBuf>,
}

#[cfg(test)]
impl MockFileSystemOps {
    /// Create an empty mock with nothing configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a regular file with the given contents.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.files.insert(path.into(), contents.as_bytes().to_vec());
        self
    }

    /// Set the directory entries returned by [`FileSystemOps::read_dir`] for `dir`.
    #[must_use]
    pub fn with_dir_entries(mut self, dir: impl Into<PathBuf>, entries: Vec<PathBuf>) -> Self {
        self.dirs.insert(dir.into(), entries);
        self
    }

    /// Register a directory whose listing fails with permission denied.
    #[must_use]
    pub fn with_unreadable_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.unreadable.insert(dir.into());
        self
    }
}

#[cfg(test)]
impl FileSystemOps for MockFileSystemOps {
    fn exists(&self, path: &Path) -> bool {
        self.is_file(path) || self.is_dir(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.dirs.contains_key(path) || self.unreadable.contains(path)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if self.unreadable.contains(path) {
            anyhow::bail!("mock: permission denied reading {}", path.display());
        }
        let mut entries = self
            .dirs
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("mock: no entries configured for {}", path.display()))?;
        entries.sort();
        Ok(entries)
    }

    fn read_prefix(&self, path: &Path, limit: usize) -> std::io::Result<Vec<u8>> {
        self.files
            .get(path)
            .map(|c| c.iter().copied().take(limit).collect())
            .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn system_read_dir_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["waybar", "alacritty", "nvim"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        let entries = SystemFileSystemOps.read_dir(dir.path()).unwrap();
        let names: Vec<_> = entries
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["alacritty", "nvim", "waybar"]);
    }

    #[test]
    fn system_read_prefix_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.conf");
        std::fs::write(&file, "x".repeat(4096)).unwrap();
        let bytes = SystemFileSystemOps.read_prefix(&file, 1024).unwrap();
        assert_eq!(bytes.len(), 1024);
    }

    #[test]
    fn mock_unreadable_dir_errors() {
        let fs = MockFileSystemOps::new().with_unreadable_dir("/rice/secret");
        assert!(fs.is_dir(Path::new("/rice/secret")));
        assert!(fs.read_dir(Path::new("/rice/secret")).is_err());
    }

    #[test]
    fn mock_file_prefix() {
        let fs = MockFileSystemOps::new().with_file("/rice/a.conf", "theme = dark");
        assert_eq!(fs.read_prefix(Path::new("/rice/a.conf"), 5).unwrap(), b"theme");
        assert!(fs.exists(Path::new("/rice/a.conf")));
    }
}
