//! Rice deployment engine.
//!
//! Takes a cloned dotfile repository ("a rice"), decides which of its
//! directories are configuration, assets, themes, scripts, caches, local
//! trees or Nix configurations, works out the packages they need, and
//! deploys or retracts them transactionally with operation-scoped backups.
//!
//! The public API is organised into layers:
//!
//! - **[`classify`]** and **[`scan`]**: directory scoring and dependency discovery
//! - **[`backup`]**: operation backups with rollback, and named snapshots
//! - **[`resources`]**: collaborator traits (linker, packages, scripts, …) and their native implementations
//! - **[`engine`]**: the apply / uninstall lifecycle over those collaborators
//! - **[`commands`]**: top-level subcommand orchestration
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod backup;
pub mod classify;
pub mod cli;
pub mod commands;
pub mod config;
pub mod engine;
pub mod error;
pub mod exec;
pub mod interrupt;
pub mod lock;
pub mod logging;
pub mod operations;
pub mod platform;
pub mod resources;
pub mod retry;
pub mod scan;
pub mod store;

/// Version string: `RICE_VERSION` from the build, else the package version.
#[must_use]
pub const fn version() -> &'static str {
    match option_env!("RICE_VERSION") {
        Some(v) => v,
        None => env!("CARGO_PKG_VERSION"),
    }
}
