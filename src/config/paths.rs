//! Resolution of the directories rice reads from and writes to.
use std::path::{Path, PathBuf};

use crate::error::{Result, RiceError};

/// Well-known locations, resolved once per process.
///
/// Everything rice owns lives under `state_dir`
/// (`$XDG_CONFIG_HOME/rice`, default `~/.config/rice`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    /// User home directory.
    pub home: PathBuf,
    /// `$XDG_CONFIG_HOME`, default `~/.config`.
    pub config_home: PathBuf,
    /// `$XDG_DATA_HOME`, default `~/.local/share`.
    pub data_home: PathBuf,
    /// Rice state directory.
    pub state_dir: PathBuf,
}

impl Paths {
    /// Resolve from `HOME`, `XDG_CONFIG_HOME` and `XDG_DATA_HOME`.
    ///
    /// # Errors
    ///
    /// Returns [`RiceError::Validation`] if `HOME` is not set.
    pub fn from_env() -> Result<Self> {
        let home = std::env::var_os("HOME")
            .filter(|h| !h.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| RiceError::Validation("HOME is not set".to_string()))?;
        let xdg = |var: &str| {
            std::env::var_os(var)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .filter(|p| p.is_absolute())
        };
        let config_home = xdg("XDG_CONFIG_HOME").unwrap_or_else(|| home.join(".config"));
        let data_home = xdg("XDG_DATA_HOME").unwrap_or_else(|| home.join(".local/share"));
        Ok(Self::new(home, config_home, data_home))
    }

    /// Explicit locations; `state_dir` is derived from `config_home`.
    #[must_use]
    pub fn new(home: PathBuf, config_home: PathBuf, data_home: PathBuf) -> Self {
        let state_dir = config_home.join("rice");
        Self {
            home,
            config_home,
            data_home,
            state_dir,
        }
    }

    /// XDG defaults rooted at `home`, for sandboxes and tests.
    #[must_use]
    pub fn under(home: &Path) -> Self {
        Self::new(
            home.to_path_buf(),
            home.join(".config"),
            home.join(".local/share"),
        )
    }

    /// `~/.cache`.
    #[must_use]
    pub fn cache_home(&self) -> PathBuf {
        self.home.join(".cache")
    }

    /// `~/.local`.
    #[must_use]
    pub fn local_home(&self) -> PathBuf {
        self.home.join(".local")
    }

    /// The JSON record store.
    #[must_use]
    pub fn store_file(&self) -> PathBuf {
        self.state_dir.join("rices.json")
    }

    /// Default settings file.
    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.state_dir.join("rice.toml")
    }

    /// Operation backups.
    #[must_use]
    pub fn backups_dir(&self) -> PathBuf {
        self.state_dir.join("backups")
    }

    /// Named snapshots.
    #[must_use]
    pub fn snapshots_dir(&self) -> PathBuf {
        self.state_dir.join("snapshots")
    }

    /// Default clone destination root.
    #[must_use]
    pub fn repos_dir(&self) -> PathBuf {
        self.state_dir.join("repos")
    }

    /// Exclusive lock file.
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.state_dir.join("rice.lock")
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn under_derives_xdg_layout() {
        let paths = Paths::under(Path::new("/home/u"));
        assert_eq!(paths.config_home, PathBuf::from("/home/u/.config"));
        assert_eq!(paths.data_home, PathBuf::from("/home/u/.local/share"));
        assert_eq!(paths.state_dir, PathBuf::from("/home/u/.config/rice"));
        assert_eq!(
            paths.store_file(),
            PathBuf::from("/home/u/.config/rice/rices.json")
        );
        assert_eq!(paths.lock_file(), PathBuf::from("/home/u/.config/rice/rice.lock"));
        assert_eq!(paths.cache_home(), PathBuf::from("/home/u/.cache"));
    }

    #[test]
    fn state_dir_follows_config_home() {
        let paths = Paths::new(
            PathBuf::from("/h"),
            PathBuf::from("/xdg/config"),
            PathBuf::from("/xdg/data"),
        );
        assert_eq!(paths.state_dir, PathBuf::from("/xdg/config/rice"));
        assert_eq!(paths.backups_dir(), PathBuf::from("/xdg/config/rice/backups"));
    }
}
