pub mod apply;
pub mod backup;
pub mod classify;
pub mod clone;
pub mod list;
pub mod profile;
pub mod snapshot;
pub mod transfer;
pub mod uninstall;

use anyhow::{Context as _, Result};
use clap::CommandFactory;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backup::BackupManager;
use crate::cli::{Cli, Command, GlobalOpts};
use crate::config::{LinkerKind, Paths, Settings};
use crate::engine::{ApplyEngine, Collaborators};
use crate::exec::{Executor, SystemExecutor};
use crate::lock::StateLock;
use crate::logging::{Log, Logger};
use crate::platform::Platform;
use crate::resources::{
    Linker, NixCli, PackageInstaller, PackageManager, PlaceholderRenderer, ShellScriptRunner,
    StowLinker, SymlinkLinker, SystemPackageInstaller,
};
use crate::store::RiceStore;

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "RICE_CONFIG";

/// Dispatch a parsed command line.
///
/// # Errors
///
/// Returns the command's error; `main` turns it into exit code 1.
pub fn run(args: Cli, log: &Arc<Logger>) -> Result<()> {
    let global = &args.global;
    match &args.command {
        Command::Clone(opts) => clone::run(global, opts, log),
        Command::Apply(opts) => apply::run(global, opts, log, false),
        Command::Manage(opts) => apply::run(global, opts, log, true),
        Command::Uninstall(opts) => uninstall::run(global, opts, log),
        Command::Classify(opts) => classify::run(global, opts, log),
        Command::List(opts) => list::run(global, opts, log),
        Command::Profile(opts) => profile::run(global, opts, log),
        Command::Backup(opts) => backup::run(global, opts, log),
        Command::Snapshot(opts) => snapshot::run(global, opts, log),
        Command::Export(opts) => transfer::export(global, opts, log),
        Command::Import(opts) => transfer::import(global, opts, log),
        Command::Completions(opts) => {
            clap_complete::generate(
                opts.shell,
                &mut Cli::command(),
                "rice",
                &mut std::io::stdout(),
            );
            Ok(())
        }
        Command::Version => {
            print_line(&format!("rice {}", crate::version()));
            Ok(())
        }
    }
}

/// Write one line of command output to stdout.
#[allow(clippy::print_stdout)]
pub(crate) fn print_line(line: &str) {
    println!("{line}");
}

/// Settings file: `--config`, then `$RICE_CONFIG`, then the default location.
#[must_use]
pub fn settings_path(explicit: Option<&Path>, env: Option<OsString>, paths: &Paths) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| env.filter(|v| !v.is_empty()).map(PathBuf::from))
        .unwrap_or_else(|| paths.settings_file())
}

/// Locations, settings and flags every command starts from.
#[derive(Debug)]
pub struct CommandContext {
    /// Resolved live-filesystem and state locations.
    pub paths: Paths,
    /// Loaded `rice.toml`.
    pub settings: Settings,
    /// Shared logger.
    pub log: Arc<Logger>,
    /// `--dry-run`.
    pub dry_run: bool,
    /// `--no-parallel` unset and `[install] parallel` on.
    pub parallel: bool,
}

impl CommandContext {
    /// Resolve paths from the environment and load the settings file.
    ///
    /// # Errors
    ///
    /// Returns an error if `HOME` is unset or the settings file is invalid.
    pub fn init(global: &GlobalOpts, log: &Arc<Logger>) -> Result<Self> {
        let paths = Paths::from_env()?;
        let file = settings_path(
            global.config.as_deref(),
            std::env::var_os(CONFIG_ENV),
            &paths,
        );
        let settings =
            Settings::load(&file).with_context(|| format!("loading {}", file.display()))?;
        log.debug(&format!("settings: {}", file.display()));
        Ok(Self::new(paths, settings, Arc::clone(log), global))
    }

    /// Context over explicit locations and settings.
    #[must_use]
    pub fn new(paths: Paths, settings: Settings, log: Arc<Logger>, global: &GlobalOpts) -> Self {
        let parallel = global.parallel && settings.install.parallel;
        Self {
            paths,
            settings,
            log,
            dry_run: global.dry_run,
            parallel,
        }
    }

    fn log_handle(&self) -> Arc<dyn Log> {
        self.log.clone()
    }

    /// Take the state lock; dry runs change nothing and skip it.
    ///
    /// # Errors
    ///
    /// Returns an error if another process holds the lock.
    pub fn lock(&self) -> Result<Option<StateLock>> {
        if self.dry_run {
            return Ok(None);
        }
        Ok(Some(StateLock::acquire(&self.paths.lock_file())?))
    }

    /// Load the record store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store file is malformed.
    pub fn store(&self) -> Result<RiceStore> {
        let path = self.paths.store_file();
        RiceStore::load(&path).with_context(|| format!("loading {}", path.display()))
    }

    /// Backup manager over the state directory.
    #[must_use]
    pub fn backup_manager(&self) -> BackupManager {
        BackupManager::new(&self.paths, self.log_handle())
    }

    /// Installer for the detected platform, configured from `[install]`.
    #[must_use]
    pub fn installer(&self) -> Arc<dyn PackageInstaller> {
        let executor: Arc<dyn Executor> = Arc::new(SystemExecutor);
        let aur_helper = self.settings.install.aur_helper.as_deref();
        let system = PackageManager::detect(&Platform::detect(), aur_helper, executor.as_ref());
        if system.is_none() {
            self.log_handle()
                .debug("no usable system package manager; unprefixed packages will fail");
        }
        let mut installer = SystemPackageInstaller::new(
            executor,
            system,
            self.paths.data_home.join("fonts"),
            self.log_handle(),
        )
        .with_retry(self.settings.retry_policy())
        .with_parallel(self.parallel);
        if let Some(helper) = aur_helper {
            installer = installer.with_aur_helper(helper);
        }
        Arc::new(installer)
    }

    /// The production collaborators.
    #[must_use]
    pub fn collaborators(&self) -> Collaborators {
        let executor: Arc<dyn Executor> = Arc::new(SystemExecutor);
        let linker: Arc<dyn Linker> = match self.settings.install.linker {
            LinkerKind::Stow => Arc::new(StowLinker::new(Arc::clone(&executor))),
            LinkerKind::Symlink => Arc::new(SymlinkLinker::new(self.log_handle())),
        };
        Collaborators {
            linker,
            installer: self.installer(),
            scripts: Arc::new(ShellScriptRunner::new(
                Arc::clone(&executor),
                &self.settings.install.shell,
                self.log_handle(),
            )),
            templates: Arc::new(PlaceholderRenderer::new(self.log_handle())),
            nix: Arc::new(NixCli::new(executor, self.log_handle())),
        }
    }

    /// Engine over the store and the production collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be loaded.
    pub fn engine(&self) -> Result<ApplyEngine> {
        Ok(ApplyEngine::new(
            self.paths.clone(),
            self.settings.clone(),
            self.store()?,
            self.collaborators(),
            self.log_handle(),
        ))
    }
}

/// Print the task summary and fail if any task failed.
///
/// # Errors
///
/// Returns an error when the logger recorded a failed task.
pub fn finish(log: &Logger) -> Result<()> {
    log.print_summary();
    let failures = log.failure_count();
    if failures > 0 {
        anyhow::bail!("{failures} task(s) failed");
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn global(dry_run: bool, parallel: bool) -> GlobalOpts {
        GlobalOpts {
            dry_run,
            parallel,
            config: None,
        }
    }

    #[test]
    fn settings_path_prefers_flag_then_env() {
        let paths = Paths::under(Path::new("/home/u"));
        assert_eq!(
            settings_path(
                Some(Path::new("/etc/rice.toml")),
                Some("/env.toml".into()),
                &paths
            ),
            PathBuf::from("/etc/rice.toml")
        );
        assert_eq!(
            settings_path(None, Some("/env.toml".into()), &paths),
            PathBuf::from("/env.toml")
        );
        assert_eq!(
            settings_path(None, Some(OsString::new()), &paths),
            paths.settings_file()
        );
    }

    #[test]
    fn parallel_needs_flag_and_setting() {
        let log = Arc::new(Logger::new("test"));
        let paths = Paths::under(Path::new("/home/u"));
        let mut settings = Settings::default();
        let ctx = CommandContext::new(paths.clone(), settings.clone(), log.clone(), &global(false, true));
        assert!(ctx.parallel);
        settings.install.parallel = false;
        let ctx = CommandContext::new(paths.clone(), settings, log.clone(), &global(false, true));
        assert!(!ctx.parallel);
        let ctx = CommandContext::new(paths, Settings::default(), log, &global(false, false));
        assert!(!ctx.parallel);
    }

    #[test]
    fn dry_run_skips_lock() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(Logger::new("test"));
        let paths = Paths::under(dir.path());
        let ctx = CommandContext::new(paths.clone(), Settings::default(), log.clone(), &global(true, true));
        assert!(ctx.lock().unwrap().is_none());
        assert!(!paths.lock_file().exists());

        let ctx = CommandContext::new(paths.clone(), Settings::default(), log, &global(false, true));
        let held = ctx.lock().unwrap();
        assert!(held.is_some());
        assert!(ctx.lock().is_err(), "second acquire must fail");
        drop(held);
        assert!(!paths.lock_file().exists());
    }
}
