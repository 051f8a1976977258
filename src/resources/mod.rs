//! External collaborators behind narrow traits, plus the idempotent
//! check-and-apply resource primitives the native implementations use.
pub mod fs;
pub mod git;
pub mod linker;
pub mod nix;
pub mod package;
pub mod script;
pub mod symlink;
pub mod template;

use anyhow::Result;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::CollaboratorError;
use crate::store::ScriptConfig;

pub use git::Git2Cloner;
pub use linker::{StowLinker, SymlinkLinker};
pub use nix::NixCli;
pub use package::{PackageManager, SystemPackageInstaller};
pub use script::{HookPhase, ShellScriptRunner};
pub use template::PlaceholderRenderer;

/// One directory handed to a [`Linker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRequest {
    /// Directory containing `item` (the rice root for top-level entries).
    pub source_dir: PathBuf,
    /// Name of the directory to link, relative to `source_dir`.
    pub item: String,
    /// Directory the entries of `item` are linked into.
    pub target: PathBuf,
    /// Extra linker arguments (`--stow-options`).
    pub options: Vec<String>,
}

impl LinkRequest {
    /// Absolute path of the linked directory.
    #[must_use]
    pub fn source(&self) -> PathBuf {
        self.source_dir.join(&self.item)
    }
}

/// Symlink-farm linking of a directory into a target.
#[cfg_attr(test, mockall::automock)]
pub trait Linker: Send + Sync {
    /// Link every entry of the requested directory into its target.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Link`] with the linker's stderr.
    fn link(&self, request: &LinkRequest) -> Result<(), CollaboratorError>;

    /// Remove links created by [`Linker::link`].
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Link`] with the linker's stderr.
    fn unlink(&self, request: &LinkRequest) -> Result<(), CollaboratorError>;
}

/// Package installation.
#[cfg_attr(test, mockall::automock)]
pub trait PackageInstaller: Send + Sync {
    /// Install `names`, each optionally prefixed with `manager:`.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::PackageManager`] listing the packages
    /// that failed.
    fn install(&self, names: &[String]) -> Result<(), CollaboratorError>;

    /// Whether `name` is already installed.
    fn is_installed(&self, name: &str) -> bool;

    /// Install a font file into the user font directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be copied or the font cache not
    /// refreshed.
    fn install_font_manually(&self, path: &Path) -> Result<(), CollaboratorError>;

    /// Every package the system manager reports as installed.
    ///
    /// # Errors
    ///
    /// Returns an error if the package manager cannot be queried.
    fn installed_packages(&self) -> Result<BTreeSet<String>, CollaboratorError>;

    /// Remove `names`.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::PackageManager`] listing the failures.
    fn remove(&self, names: &[String]) -> Result<(), CollaboratorError>;
}

/// Lifecycle hook scripts.
#[cfg_attr(test, mockall::automock)]
pub trait ScriptRunner: Send + Sync {
    /// Run every script for `phase` found in `dir`. Returns how many ran.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Script`] for a missing configured script
    /// or a non-zero exit.
    fn run_phase(
        &self,
        dir: &Path,
        phase: HookPhase,
        config: &ScriptConfig,
        env: &[(String, String)],
    ) -> Result<usize, CollaboratorError>;
}

/// Template rendering inside a checkout.
#[cfg_attr(test, mockall::automock)]
pub trait TemplateRenderer: Send + Sync {
    /// Render every template under `source_dir` with `context`. Returns the
    /// files written.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Template`] on unknown keys or I/O errors.
    fn render(
        &self,
        source_dir: &Path,
        context: &serde_json::Value,
    ) -> Result<Vec<PathBuf>, CollaboratorError>;
}

/// Nix-based deployment of a whole rice.
#[cfg_attr(test, mockall::automock)]
pub trait NixDeployer: Send + Sync {
    /// Build and activate the Nix configuration in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Nix`] with the tool's stderr.
    fn deploy(&self, dir: &Path) -> Result<(), CollaboratorError>;
}

/// Repository cloning.
#[cfg_attr(test, mockall::automock)]
pub trait GitCloner: Send + Sync {
    /// Clone `url` into `dest`.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Git`].
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), CollaboratorError>;
}

/// Minimal interface for resources that can be described, applied, and removed.
pub trait Applicable {
    /// Human-readable description of this resource.
    fn description(&self) -> String;

    /// Bring the resource to its desired state.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be applied due to I/O failures,
    /// permission issues, invalid paths, or other system errors.
    fn apply(&self) -> Result<ResourceChange>;

    /// Undo a previous `apply()`.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be removed, or if removal is not supported
    /// for this resource type.
    fn remove(&self) -> Result<ResourceChange> {
        anyhow::bail!(
            "operation 'remove' is not supported for resource '{}'",
            self.description()
        )
    }
}

/// State of a resource.
///
/// # Examples
///
/// ```
/// use rice_cli::resources::ResourceState;
///
/// let missing = ResourceState::Missing;
/// let wrong = ResourceState::Incorrect { current: "/other/path".into() };
///
/// assert_ne!(missing, ResourceState::Correct);
/// assert_ne!(wrong, missing);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Resource does not exist or is not present.
    Missing,
    /// Resource exists and matches the desired state.
    Correct,
    /// Resource exists but does not match the desired state.
    Incorrect {
        /// The current value of the resource.
        current: String,
    },
    /// Resource cannot be applied (e.g., target is a real directory).
    Invalid {
        /// Reason why the resource cannot be applied.
        reason: String,
    },
}

/// Result of applying a resource change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceChange {
    /// Resource was created or updated.
    Applied,
    /// Resource was already correct (no change needed).
    AlreadyCorrect,
    /// Resource was skipped.
    Skipped {
        /// Reason why the resource was skipped.
        reason: String,
    },
}

/// Resources that can determine their own state.
pub trait Resource: Applicable {
    /// Check the current state of the resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource state cannot be determined.
    fn current_state(&self) -> Result<ResourceState>;

    /// Determine if the resource needs to be changed.
    ///
    /// # Errors
    ///
    /// Propagates errors from `current_state()`.
    fn needs_change(&self) -> Result<bool> {
        Ok(matches!(
            self.current_state()?,
            ResourceState::Missing | ResourceState::Incorrect { .. }
        ))
    }
}
