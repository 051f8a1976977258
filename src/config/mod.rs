//! Settings (`rice.toml`) and well-known paths.
pub mod loader;
pub mod paths;
pub mod rules;

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::retry::{RetryPolicy, RetrySettings};

pub use paths::Paths;
pub use rules::{RuleDef, RuleSet};

/// Default acceptance threshold of the classifier.
pub const DEFAULT_THRESHOLD: f64 = 2.0;

/// All user settings, loaded from `rice.toml`. Every field has a default.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// `[classifier]` section.
    pub classifier: ClassifierSettings,
    /// `[dependencies]`: directory name (or fragment) → packages.
    pub dependencies: BTreeMap<String, Vec<String>>,
    /// `[install]` section.
    pub install: InstallSettings,
    /// `[retry]` section.
    pub retry: RetrySettings,
    /// `[backup]` section.
    pub backup: BackupSettings,
}

impl Settings {
    /// Load settings from `path`; a missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a
    /// classifier rule does not compile.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let settings: Self = loader::load_config(path)?;
        settings.rules()?;
        Ok(settings)
    }

    /// Compiled classifier rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidRule`] for a regex that does not compile.
    pub fn rules(&self) -> Result<RuleSet, ConfigError> {
        RuleSet::compile(&self.classifier.rules)
    }

    /// Retry policy for clones and package installs.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }
}

/// `[classifier]` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierSettings {
    /// Minimum `name_score + content_score` for a candidate to be accepted.
    pub threshold: f64,
    /// User rules, each worth +3 on a match.
    pub rules: Vec<RuleDef>,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            rules: Vec::new(),
        }
    }
}

/// Which [`Linker`](crate::resources::Linker) drives config deployment.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LinkerKind {
    /// GNU stow.
    #[default]
    Stow,
    /// Native symlinks, no external tool.
    Symlink,
}

/// `[install]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct InstallSettings {
    /// Linker implementation.
    pub linker: LinkerKind,
    /// AUR helper (`yay`, `paru`, …) used for `aur:` packages and, when set,
    /// for all packages on Arch.
    pub aur_helper: Option<String>,
    /// Install packages concurrently on a rayon pool.
    pub parallel: bool,
    /// Destination root of the `Extras/` directory. Defaults to `$HOME`.
    pub extras_target: Option<PathBuf>,
    /// Shell used to run hook scripts.
    pub shell: String,
}

impl Default for InstallSettings {
    fn default() -> Self {
        Self {
            linker: LinkerKind::default(),
            aur_helper: None,
            parallel: true,
            extras_target: None,
            shell: "bash".to_string(),
        }
    }
}

/// `[backup]` section.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackupSettings {
    /// Age after which `rice backup cleanup` removes operation backups.
    pub max_age_days: u32,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self { max_age_days: 30 }
    }
}
