//! Persistent rice records (`rices.json`).
//!
//! One JSON object keyed by rice name. Every write goes to a `.new` sibling
//! first and is renamed into place.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::classify::DirectoryCategory;
use crate::error::{ConfigError, Result, RiceError};

/// Profile used when none is named.
pub const DEFAULT_PROFILE: &str = "default";

/// Hook scripts configured for a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptConfig {
    /// Phase name → extra scripts (relative to the rice root) run after the
    /// discovered `scriptdata/` ones.
    pub custom_scripts: BTreeMap<String, Vec<String>>,
    /// Shell override for this profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<String>,
}

/// One deployable selection of a rice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    /// Relative path → category.
    pub dotfile_directories: BTreeMap<String, DirectoryCategory>,
    /// Packages the profile needs.
    pub dependencies: BTreeSet<String>,
    /// Hook script settings.
    pub script_config: ScriptConfig,
    /// Relative path → absolute destination directory, copied like `Extras/`.
    pub custom_extras_paths: BTreeMap<String, PathBuf>,
}

/// Everything rice remembers about one rice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiceRecord {
    /// Where it was cloned from; absent for local or imported rices.
    #[serde(default)]
    pub repository_url: Option<String>,
    /// Checkout on disk.
    pub local_directory: PathBuf,
    /// Named profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
    /// Profile used by `apply` and `uninstall`.
    #[serde(default = "default_profile_name")]
    pub active_profile: String,
    /// Whether the rice is currently deployed.
    #[serde(default)]
    pub applied: bool,
    /// Last mutation.
    pub timestamp: DateTime<Utc>,
    /// Whether the root carries a Nix configuration.
    #[serde(default)]
    pub nix_config: bool,
}

fn default_profile_name() -> String {
    DEFAULT_PROFILE.to_string()
}

impl RiceRecord {
    /// Fresh record with an empty default profile.
    #[must_use]
    pub fn new(local_directory: PathBuf, repository_url: Option<String>) -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(DEFAULT_PROFILE.to_string(), Profile::default());
        Self {
            repository_url,
            local_directory,
            profiles,
            active_profile: DEFAULT_PROFILE.to_string(),
            applied: false,
            timestamp: Utc::now(),
            nix_config: false,
        }
    }

    /// The active profile, if it exists.
    #[must_use]
    pub fn active(&self) -> Option<&Profile> {
        self.profiles.get(&self.active_profile)
    }

    /// The active profile, created empty when missing.
    pub fn active_mut(&mut self) -> &mut Profile {
        self.profiles.entry(self.active_profile.clone()).or_default()
    }

    /// Bump the timestamp.
    pub fn touch(&mut self) {
        self.timestamp = Utc::now();
    }
}

/// The record store bound to its file.
#[derive(Debug, Clone)]
pub struct RiceStore {
    path: PathBuf,
    rices: BTreeMap<String, RiceRecord>,
}

impl RiceStore {
    /// Load the store at `path`; a missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Malformed`] if the file does not parse.
    pub fn load(path: &Path) -> Result<Self> {
        let rices = if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.display().to_string(),
                source,
            })?;
            if content.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&content).map_err(|e| ConfigError::Malformed {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            rices,
        })
    }

    /// Write the store back to its file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        write_json_atomic(&self.path, &self.rices)
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Registered rice names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rices.keys().map(String::as_str)
    }

    /// All records.
    #[must_use]
    pub const fn records(&self) -> &BTreeMap<String, RiceRecord> {
        &self.rices
    }

    /// Look a record up.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RiceRecord> {
        self.rices.get(name)
    }

    /// Look a record up, failing when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRice`].
    pub fn require(&self, name: &str) -> Result<&RiceRecord> {
        self.rices
            .get(name)
            .ok_or_else(|| ConfigError::MissingRice(name.to_string()).into())
    }

    /// Mutable lookup, failing when absent.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRice`].
    pub fn require_mut(&mut self, name: &str) -> Result<&mut RiceRecord> {
        self.rices
            .get_mut(name)
            .ok_or_else(|| ConfigError::MissingRice(name.to_string()).into())
    }

    /// Insert or replace a record.
    pub fn upsert(&mut self, name: &str, record: RiceRecord) {
        self.rices.insert(name.to_string(), record);
    }

    /// Remove a record, returning it.
    pub fn remove(&mut self, name: &str) -> Option<RiceRecord> {
        self.rices.remove(name)
    }

    /// Name of the rice currently marked applied, other than `except`.
    #[must_use]
    pub fn applied_other_than(&self, except: &str) -> Option<&str> {
        self.rices
            .iter()
            .find(|(name, r)| r.applied && name.as_str() != except)
            .map(|(name, _)| name.as_str())
    }

    /// Add an empty profile to `rice`, or a copy of `from`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rice or the source profile is missing, or the
    /// profile already exists.
    pub fn create_profile(&mut self, rice: &str, profile: &str, from: Option<&str>) -> Result<()> {
        let record = self.require_mut(rice)?;
        if record.profiles.contains_key(profile) {
            return Err(ConfigError::AlreadyExists(format!("{rice}/{profile}")).into());
        }
        let base = match from {
            Some(src) => record
                .profiles
                .get(src)
                .cloned()
                .ok_or_else(|| ConfigError::MissingProfile {
                    rice: rice.to_string(),
                    profile: src.to_string(),
                })?,
            None => Profile::default(),
        };
        record.profiles.insert(profile.to_string(), base);
        record.touch();
        Ok(())
    }

    /// Switch the active profile of `rice`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rice or profile is missing.
    pub fn set_active_profile(&mut self, rice: &str, profile: &str) -> Result<()> {
        let record = self.require_mut(rice)?;
        if !record.profiles.contains_key(profile) {
            return Err(ConfigError::MissingProfile {
                rice: rice.to_string(),
                profile: profile.to_string(),
            }
            .into());
        }
        profile.clone_into(&mut record.active_profile);
        record.touch();
        Ok(())
    }

    /// Portable JSON of one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the rice is missing.
    pub fn export(&self, rice: &str) -> Result<String> {
        let record = self.require(rice)?;
        let exported = ExportedRice {
            name: rice.to_string(),
            record: record.clone(),
        };
        serde_json::to_string_pretty(&exported).map_err(|e| RiceError::Validation(e.to_string()))
    }

    /// Register a record from [`RiceStore::export`] output.
    ///
    /// The imported rice is never marked applied. Returns the name used.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or the name is taken.
    pub fn import(&mut self, json: &str, name: Option<&str>) -> Result<String> {
        let exported: ExportedRice =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed {
                path: "import".to_string(),
                message: e.to_string(),
            })?;
        let name = name.map_or(exported.name, String::from);
        validate_name(&name)?;
        if self.rices.contains_key(&name) {
            return Err(ConfigError::AlreadyExists(name).into());
        }
        let mut record = exported.record;
        record.applied = false;
        record.touch();
        self.rices.insert(name.clone(), record);
        Ok(name)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ExportedRice {
    name: String,
    #[serde(flatten)]
    record: RiceRecord,
}

/// Reject names that would escape the state directory or confuse the CLI.
///
/// # Errors
///
/// Returns [`RiceError::Validation`] describing the problem.
pub fn validate_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.starts_with('-')
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if bad {
        return Err(RiceError::Validation(format!("invalid rice name '{name}'")));
    }
    Ok(())
}

/// Serialize `value` as pretty JSON to `path` through a `.new` sibling.
///
/// # Errors
///
/// Returns a file operation error if writing or renaming fails.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| RiceError::file(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value).map_err(|e| RiceError::file(path, e))?;
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".new");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, json).map_err(|e| RiceError::file(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| RiceError::file(path, e))
}
