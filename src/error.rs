//! Domain-specific error types for the rice engine.
//!
//! Library modules return [`RiceError`] (or one of its sub-errors) while the
//! command handlers at the CLI boundary convert them to [`anyhow::Error`]
//! through the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! RiceError
//! ├── Config(ConfigError)              store, rules and settings files
//! ├── Validation(String)               invalid names and target paths
//! ├── FileOperation { path, message }  copy, move and permission failures
//! ├── Backup(BackupError)              operation backups, rollback, snapshots
//! ├── Collaborator(CollaboratorError)  git, scripts, templates, packages, linker, nix
//! ├── Cancelled(String)                ambiguity left unresolved
//! ├── Locked { path }                  another process holds the lock file
//! └── RollbackFailed { cause, .. }     the failure plus the rollback that failed after it
//! ```

use std::path::Path;

use thiserror::Error;

/// Convenience alias used throughout the library.
pub type Result<T, E = RiceError> = std::result::Result<T, E>;

/// Top-level error type for the rice engine.
#[derive(Error, Debug)]
pub enum RiceError {
    /// Malformed or missing persisted record, rule set or settings file.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A name or target path failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A copy, move, removal or permission change failed.
    #[error("File operation failed on {path}: {message}")]
    FileOperation {
        /// Path the operation was acting on.
        path: String,
        /// Underlying failure, already formatted.
        message: String,
    },

    /// Operation backup, rollback or snapshot failure.
    #[error("Backup error: {0}")]
    Backup(#[from] BackupError),

    /// An external collaborator (git, scripts, packages, …) reported failure.
    #[error("{0}")]
    Collaborator(#[from] CollaboratorError),

    /// The operator (or a headless policy) declined to pick a variant.
    #[error("Apply cancelled: {0}")]
    Cancelled(String),

    /// Another process holds the state lock.
    #[error("Another rice operation is running (lock file {path})")]
    Locked {
        /// Path of the lock file that could not be acquired.
        path: String,
    },

    /// An operation failed and restoring its backup failed as well.
    #[error("{cause}; {rollback}")]
    RollbackFailed {
        /// Error that stopped the operation.
        cause: Box<RiceError>,
        /// What could not be restored.
        rollback: BackupError,
    },
}

impl RiceError {
    /// Build a [`RiceError::FileOperation`] from a path and any displayable error.
    pub fn file(path: &Path, err: impl std::fmt::Display) -> Self {
        Self::FileOperation {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    /// Returns `true` when the error means restored state could not be
    /// guaranteed and the operator has to recover by hand.
    #[must_use]
    pub const fn needs_manual_recovery(&self) -> bool {
        matches!(
            self,
            Self::Backup(BackupError::Rollback { .. }) | Self::RollbackFailed { .. }
        )
    }
}

/// Errors that arise from loading or saving configuration and records.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A file exists but could not be parsed.
    #[error("Malformed {path}: {message}")]
    Malformed {
        /// File that failed to parse.
        path: String,
        /// Parser message.
        message: String,
    },

    /// No record is stored under the requested rice name.
    #[error("No rice named '{0}' is registered")]
    MissingRice(String),

    /// The rice has no profile of that name.
    #[error("Rice '{rice}' has no profile '{profile}'")]
    MissingProfile {
        /// Rice name.
        rice: String,
        /// Requested profile.
        profile: String,
    },

    /// A record or profile of that name already exists.
    #[error("'{0}' already exists")]
    AlreadyExists(String),

    /// A classifier rule carries an invalid regular expression.
    #[error("Invalid rule '{rule}': {message}")]
    InvalidRule {
        /// The offending rule pattern.
        rule: String,
        /// Regex compiler message.
        message: String,
    },

    /// An I/O error occurred while reading or writing a configuration file.
    #[error("IO error on config file {path}: {source}")]
    Io {
        /// Path to the file.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors raised by the backup manager.
#[derive(Error, Debug)]
pub enum BackupError {
    /// `start_operation` was called while another operation is open.
    #[error("Operation '{active}' is still open; finish or roll it back first")]
    OperationInProgress {
        /// Id of the operation that is already open.
        active: String,
    },

    /// A call that needs an open operation was made without one.
    #[error("No backup operation is open")]
    NoActiveOperation,

    /// No operation backup with that id exists.
    #[error("Unknown backup operation '{0}'")]
    UnknownOperation(String),

    /// Capturing a path before mutation failed.
    #[error("Could not back up {path}: {message}")]
    Capture {
        /// Path that could not be captured.
        path: String,
        /// Underlying failure.
        message: String,
    },

    /// Restoring captured state failed for at least one path.
    #[error(
        "Rollback of '{operation}' failed for {} path(s); manual recovery required: {}",
        .failures.len(),
        .failures.join("; ")
    )]
    Rollback {
        /// Operation id.
        operation: String,
        /// One entry per path that could not be restored.
        failures: Vec<String>,
    },

    /// A snapshot with that name already exists.
    #[error("Snapshot '{0}' already exists")]
    SnapshotExists(String),

    /// No snapshot with that name exists.
    #[error("Snapshot '{0}' does not exist")]
    SnapshotMissing(String),

    /// Backup storage could not be read or written.
    #[error("Backup storage error at {path}: {message}")]
    Storage {
        /// Path inside the backup area.
        path: String,
        /// Underlying failure.
        message: String,
    },
}

/// Failures reported by external collaborators, surfaced verbatim.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    /// Cloning or opening a repository failed.
    #[error("Git operation failed: {0}")]
    Git(String),

    /// A lifecycle hook script failed or is missing.
    #[error("Script execution failed in phase '{phase}': {message}")]
    Script {
        /// Hook phase name.
        phase: String,
        /// Script output or reason.
        message: String,
    },

    /// Rendering a template failed.
    #[error("Template rendering failed: {0}")]
    Template(String),

    /// One or more packages could not be installed.
    #[error("Package manager error: {message}")]
    PackageManager {
        /// Summary message, including stderr when available.
        message: String,
        /// Package names that failed.
        failed: Vec<String>,
    },

    /// The linker could not link or unlink a directory.
    #[error("Linking '{item}' failed: {message}")]
    Link {
        /// Directory name handed to the linker.
        item: String,
        /// Linker stderr.
        message: String,
    },

    /// Nix evaluation or activation failed.
    #[error("Nix deployment failed: {0}")]
    Nix(String),
}
