//! Transactional apply and uninstall of a rice.
//!
//! ```text
//! Discovering → BackingUp → InstallingDependencies → Applying → RunningHooks → Committed
//!      └────────────┴──────────────┴─────────────────┴────────────┴──→ Failed → RolledBack
//! ```
//!
//! Every mutation of the live filesystem happens inside one operation
//! backup. A fatal error rolls it back; per-directory failures are recorded
//! and the remaining directories are still deployed.
pub mod ambiguity;
pub mod dispatch;
pub mod report;
pub mod state;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backup::BackupManager;
use crate::classify::{ClassifyOptions, DirectoryCategory, DirectoryClassifier};
use crate::config::{Paths, Settings};
use crate::error::{Result, RiceError};
use crate::interrupt::Interrupt;
use crate::logging::{Log, TaskStatus};
use crate::resources::fs::sorted_entries;
use crate::resources::nix::is_nix_rice;
use crate::resources::{
    HookPhase, Linker, NixDeployer, PackageInstaller, ScriptRunner, TemplateRenderer,
};
use crate::scan::DependencyScanner;
use crate::store::{Profile, RiceStore, ScriptConfig};

pub use ambiguity::{
    AmbiguityResolver, CancelAll, FirstCandidate, Preselected, PromptResolver, Resolution,
};
use dispatch::{Dispatcher, base_name};
pub use report::{ApplyReport, DirectoryFailure, DirectoryResults, UninstallReport};
pub use state::{Lifecycle, Phase};

/// Directory whose entries are copied to the extras target.
pub const EXTRAS_DIR: &str = "Extras";
/// Directory scanned for font files.
pub const FONTS_DIR: &str = "fonts";
const FONT_EXTENSIONS: &[&str] = &["ttf", "otf", "woff", "woff2"];

/// The collaborators an engine drives.
#[derive(Clone)]
pub struct Collaborators {
    /// Links config, cache and local trees.
    pub linker: Arc<dyn Linker>,
    /// Installs fonts and packages.
    pub installer: Arc<dyn PackageInstaller>,
    /// Runs lifecycle hooks.
    pub scripts: Arc<dyn ScriptRunner>,
    /// Renders `*.template` files.
    pub templates: Arc<dyn TemplateRenderer>,
    /// Deploys Nix rices.
    pub nix: Arc<dyn NixDeployer>,
}

/// Knobs of one apply.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Do not install fonts or packages.
    pub skip_packages: bool,
    /// Deploy only these directory names.
    pub targets: Vec<String>,
    /// Extra linker arguments.
    pub link_options: Vec<String>,
    /// Link into this directory instead of the configuration home.
    pub destination: Option<PathBuf>,
    /// Deploy exactly these relative paths.
    pub custom_paths: Vec<String>,
    /// Accept every candidate directory.
    pub ignore_rules: bool,
    /// Render templates with this context before classifying.
    pub template_context: Option<serde_json::Value>,
    /// Log the plan and change nothing.
    pub dry_run: bool,
}

struct Discovery {
    profile: Profile,
    nix_root: bool,
}

/// Applies, manages and uninstalls rices recorded in a [`RiceStore`].
pub struct ApplyEngine {
    paths: Paths,
    settings: Settings,
    store: RiceStore,
    backup: BackupManager,
    tools: Collaborators,
    resolver: Arc<dyn AmbiguityResolver>,
    interrupt: Interrupt,
    log: Arc<dyn Log>,
}

impl std::fmt::Debug for ApplyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplyEngine")
            .field("paths", &self.paths)
            .field("store", &self.store.path())
            .field("backup", &self.backup)
            .finish_non_exhaustive()
    }
}

impl ApplyEngine {
    /// Engine over `store`. Variants are never chosen implicitly until a
    /// resolver is set with [`ApplyEngine::with_resolver`].
    #[must_use]
    pub fn new(
        paths: Paths,
        settings: Settings,
        store: RiceStore,
        tools: Collaborators,
        log: Arc<dyn Log>,
    ) -> Self {
        let backup = BackupManager::new(&paths, Arc::clone(&log));
        Self {
            paths,
            settings,
            store,
            backup,
            tools,
            resolver: Arc::new(CancelAll),
            interrupt: Interrupt::new(),
            log,
        }
    }

    /// Decide multi-variant rices with `resolver`.
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn AmbiguityResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Stop between phases once `interrupt` is triggered.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// The record store, as last written.
    #[must_use]
    pub const fn store(&self) -> &RiceStore {
        &self.store
    }

    /// Apply rice `name`.
    ///
    /// Never fails: fatal errors are rolled back and returned inside the
    /// report.
    pub fn apply(&mut self, name: &str, options: &ApplyOptions) -> ApplyReport {
        let mut lifecycle = Lifecycle::new();
        let mut report = ApplyReport::new(name);
        if let Err(err) = self.run_apply(name, options, &mut lifecycle, &mut report) {
            self.fail(&mut lifecycle, &mut report, err);
        }
        report.finish(&lifecycle);
        if report.succeeded() && !report.dry_run {
            self.log.info(&format!(
                "{name}: {}",
                if report.applied_all {
                    "applied"
                } else {
                    "applied with skipped or failed directories"
                }
            ));
        }
        report
    }

    /// Apply `name` after uninstalling whichever other rice is applied.
    ///
    /// If that uninstall fails, `name` is not applied.
    pub fn manage(&mut self, name: &str, options: &ApplyOptions) -> ApplyReport {
        if let Some(other) = self.store.applied_other_than(name).map(str::to_string) {
            if options.dry_run {
                self.log.dry_run(&format!("would uninstall {other}"));
            } else {
                let blocked = match self.uninstall(&other) {
                    Ok(report) if report.succeeded() => None,
                    Ok(report) => Some(RiceError::Validation(format!(
                        "'{other}' could not be fully uninstalled ({} failed director{}); '{name}' was not applied",
                        report.directories.failures.len(),
                        if report.directories.failures.len() == 1 { "y" } else { "ies" }
                    ))),
                    Err(err) => Some(err),
                };
                if let Some(err) = blocked {
                    self.log.error(&err.to_string());
                    return ApplyReport::aborted(name, err);
                }
            }
        }
        self.apply(name, options)
    }

    /// Retract rice `name` from the live filesystem.
    ///
    /// Copies that were removed are kept in an `uninstall-<name>` operation
    /// backup. `applied` is cleared only when no directory failed.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown rice, a failing hook (after rolling
    /// back what was removed and unlinked), or a backup failure. When the
    /// rollback fails too, [`RiceError::RollbackFailed`] carries both.
    pub fn uninstall(&mut self, name: &str) -> Result<UninstallReport> {
        let record = self.store.require(name)?.clone();
        let profile = record.active().cloned().unwrap_or_default();
        let root = record.local_directory.clone();
        let env = hook_env(name);
        let mut report = UninstallReport::new(name);

        self.log.stage(&format!("Uninstalling {name}"));
        let op = self.backup.start_operation(&format!("uninstall-{name}"))?;
        if let Err(err) = self.run_uninstall(&root, record.nix_config, &profile, &env, &mut report)
        {
            self.log.error(&format!("{name}: {err}"));
            if let Err(rollback) = self.backup.rollback(&op.id) {
                return Err(RiceError::RollbackFailed {
                    cause: Box::new(err),
                    rollback,
                });
            }
            return Err(err);
        }
        if self.backup.finish(&op.id)?.is_some() {
            report.backup_id = Some(op.id);
        }

        if report.succeeded() {
            let record = self.store.require_mut(name)?;
            record.applied = false;
            record.touch();
            self.store.save()?;
        }
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Apply phases
    // -----------------------------------------------------------------------

    fn run_apply(
        &mut self,
        name: &str,
        options: &ApplyOptions,
        lifecycle: &mut Lifecycle,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let record = self.store.require(name)?.clone();
        let root = record.local_directory.clone();
        if !root.is_dir() {
            return Err(RiceError::Validation(format!(
                "checkout of '{name}' is missing: {}",
                root.display()
            )));
        }
        let env = hook_env(name);

        self.log.stage(&format!("Discovering {name}"));
        if let Some(context) = &options.template_context
            && !options.dry_run
        {
            let written = self.tools.templates.render(&root, context)?;
            self.log
                .info(&format!("rendered {} template(s)", written.len()));
        }
        let discovery = self.discover(&root, options, record.active().cloned().unwrap_or_default())?;
        if options.dry_run {
            self.preview(&root, &discovery, options, report);
            return Ok(());
        }
        let Discovery { profile, nix_root } = discovery;
        let scripts = &profile.script_config;
        self.hook(&root, HookPhase::PreClone, scripts, &env)?;
        self.hook(&root, HookPhase::PostClone, scripts, &env)?;

        self.enter(lifecycle, Phase::BackingUp)?;
        let op = self.backup.start_operation(&format!("apply-{name}"))?;
        report.backup_id = Some(op.id.clone());
        {
            let record = self.store.require_mut(name)?;
            *record.active_mut() = profile.clone();
            record.nix_config = nix_root;
            record.touch();
        }
        self.store.save()?;

        self.enter(lifecycle, Phase::InstallingDependencies)?;
        self.hook(&root, HookPhase::PreInstallDependencies, scripts, &env)?;
        if options.skip_packages {
            self.log.info("skipping fonts and packages");
            self.log
                .record_task("packages", TaskStatus::Skipped, Some("--skip-packages"));
        } else {
            if !nix_root {
                report.fonts_installed = self.install_fonts(&root)?;
            }
            report.packages_installed = self.install_packages(&profile.dependencies)?;
        }
        self.hook(&root, HookPhase::PostInstallDependencies, scripts, &env)?;

        self.enter(lifecycle, Phase::Applying)?;
        self.hook(&root, HookPhase::PreApply, scripts, &env)?;
        self.deploy_all(&root, &profile, nix_root, options, report)?;
        report.applied_all = report.directories.is_clean();

        self.enter(lifecycle, Phase::RunningHooks)?;
        self.hook(&root, HookPhase::PostApply, scripts, &env)?;

        self.checkpoint(&Phase::Committed)?;
        if self.backup.finish(&op.id)?.is_none() {
            report.backup_id = None;
        }
        {
            let record = self.store.require_mut(name)?;
            record.applied = report.applied_all;
            record.touch();
        }
        self.store.save()?;
        lifecycle.advance(Phase::Committed)
    }

    fn discover(&self, root: &Path, options: &ApplyOptions, previous: Profile) -> Result<Discovery> {
        let mut profile = Profile {
            script_config: previous.script_config,
            custom_extras_paths: previous.custom_extras_paths,
            ..Profile::default()
        };
        if is_nix_rice(root) {
            self.log
                .info("Nix configuration found, skipping per-directory discovery");
            return Ok(Discovery {
                profile,
                nix_root: true,
            });
        }

        let classifier = DirectoryClassifier::new(self.settings.rules()?, Arc::clone(&self.log))
            .with_threshold(self.settings.classifier.threshold);
        let mut classification = classifier.classify(
            root,
            &ClassifyOptions {
                targets: options.targets.clone(),
                custom_paths: options.custom_paths.clone(),
                ignore_rules: options.ignore_rules,
            },
        )?;

        if !classification.variants().is_empty() {
            let candidates = classification.variants().to_vec();
            match self.resolver.resolve(&candidates) {
                Resolution::Choice(chosen) if candidates.contains(&chosen) => {
                    self.log.info(&format!("using variant {chosen}"));
                    classification.retain_variant(&chosen);
                }
                Resolution::Choice(chosen) => {
                    return Err(RiceError::Cancelled(format!(
                        "'{chosen}' is not one of: {}",
                        candidates.join(", ")
                    )));
                }
                Resolution::Cancel => {
                    return Err(RiceError::Cancelled(format!(
                        "no variant chosen among: {}",
                        candidates.join(", ")
                    )));
                }
            }
        }

        profile.dotfile_directories = classification.categories();
        if profile.dotfile_directories.is_empty() {
            return Err(RiceError::Validation(format!(
                "no dotfile directories found in {}",
                root.display()
            )));
        }
        profile.dependencies = DependencyScanner::new(Arc::clone(&self.log)).scan(
            classification.tree(),
            &profile.dotfile_directories,
            &self.settings.dependencies,
        );
        self.log.info(&format!(
            "{} directories, {} dependencies",
            profile.dotfile_directories.len(),
            profile.dependencies.len()
        ));
        Ok(Discovery {
            profile,
            nix_root: false,
        })
    }

    fn preview(&self, root: &Path, discovery: &Discovery, options: &ApplyOptions, report: &mut ApplyReport) {
        report.dry_run = true;
        if discovery.nix_root {
            self.log.dry_run(&format!(
                "would deploy the Nix configuration in {}",
                root.display()
            ));
            return;
        }
        let dispatcher = self.dispatcher(root, options);
        for (rel, category) in &discovery.profile.dotfile_directories {
            let action = match dispatcher.target(rel, *category) {
                Some(target) if category.is_linked() => format!("link {rel} into {}", target.display()),
                Some(target) => format!("copy {rel} to {}", target.display()),
                None => format!("deploy {rel} with Nix"),
            };
            self.log.dry_run(&format!("would {action}"));
            self.log.record_task(rel, TaskStatus::DryRun, None);
        }
        if !options.skip_packages {
            let missing: Vec<&str> = discovery
                .profile
                .dependencies
                .iter()
                .filter(|p| !self.tools.installer.is_installed(p))
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                self.log
                    .dry_run(&format!("would install: {}", missing.join(", ")));
            }
        }
    }

    fn install_fonts(&self, root: &Path) -> Result<Vec<String>> {
        let dir = root.join(FONTS_DIR);
        let entries = sorted_entries(&dir).map_err(|e| RiceError::file(&dir, format!("{e:#}")))?;
        let mut installed = Vec::new();
        for path in entries.iter().filter(|p| p.is_file() && is_font(p)) {
            let Some(font) = font_name(path) else {
                continue;
            };
            if self.tools.installer.is_installed(&font) {
                self.log.debug(&format!("font {font} already installed"));
                continue;
            }
            if let Err(e) = self.tools.installer.install(std::slice::from_ref(&font)) {
                self.log
                    .info(&format!("{font} is not a package ({e}), installing the file"));
                self.tools.installer.install_font_manually(path)?;
            }
            installed.push(font);
        }
        if installed.is_empty() {
            self.log.record_task("fonts", TaskStatus::NotApplicable, None);
        } else {
            self.log.record_task(
                "fonts",
                TaskStatus::Ok,
                Some(&format!("{} installed", installed.len())),
            );
        }
        Ok(installed)
    }

    fn install_packages(&self, dependencies: &BTreeSet<String>) -> Result<Vec<String>> {
        let missing: Vec<String> = dependencies
            .iter()
            .filter(|p| !self.tools.installer.is_installed(p))
            .cloned()
            .collect();
        if missing.is_empty() {
            self.log.info(&format!(
                "all {} dependencies already installed",
                dependencies.len()
            ));
            self.log
                .record_task("packages", TaskStatus::Ok, Some("nothing to install"));
            return Ok(missing);
        }
        self.log.info(&format!(
            "installing {} package(s): {}",
            missing.len(),
            missing.join(", ")
        ));
        self.tools.installer.install(&missing).inspect_err(|e| {
            self.log
                .record_task("packages", TaskStatus::Failed, Some(&e.to_string()));
        })?;
        self.log.record_task(
            "packages",
            TaskStatus::Ok,
            Some(&format!("{} installed", missing.len())),
        );
        Ok(missing)
    }

    fn deploy_all(
        &mut self,
        root: &Path,
        profile: &Profile,
        nix_root: bool,
        options: &ApplyOptions,
        report: &mut ApplyReport,
    ) -> Result<()> {
        let nix_dir = if nix_root {
            Some(root.to_path_buf())
        } else {
            profile
                .dotfile_directories
                .iter()
                .find(|(_, c)| **c == DirectoryCategory::Nix)
                .map(|(rel, _)| root.join(rel))
        };
        if let Some(dir) = nix_dir {
            self.log.stage("Deploying Nix configuration");
            self.tools.nix.deploy(&dir)?;
            self.log.record_task("nix", TaskStatus::Ok, None);
            report.directories.changed.push(dir.display().to_string());
            return Ok(());
        }

        let extras_root = self
            .settings
            .install
            .extras_target
            .clone()
            .unwrap_or_else(|| self.paths.home.clone());
        let extras = sorted_entries(&root.join(EXTRAS_DIR))
            .map_err(|e| RiceError::file(&root.join(EXTRAS_DIR), format!("{e:#}")))?;

        let log = Arc::clone(&self.log);
        let dispatcher = Dispatcher {
            paths: &self.paths,
            root,
            linker: self.tools.linker.as_ref(),
            link_options: &options.link_options,
            destination: options.destination.as_deref(),
            log: log.as_ref(),
        };
        self.log.stage("Deploying directories");
        for (rel, category) in &profile.dotfile_directories {
            let outcome = dispatcher.deploy(rel, *category, &mut self.backup);
            report
                .directories
                .record(rel, *category, outcome, log.as_ref())?;
        }

        for (rel, target_dir) in &profile.custom_extras_paths {
            let outcome = dispatcher.copy_extra(
                &root.join(rel),
                &target_dir.join(base_name(rel)),
                &mut self.backup,
            );
            report.directories.record(
                &format!("extras:{rel}"),
                DirectoryCategory::Other,
                outcome,
                log.as_ref(),
            )?;
        }
        for entry in extras.iter().filter(|p| p.is_dir()) {
            let Some(item) = entry.file_name() else {
                continue;
            };
            let outcome = dispatcher.copy_extra(entry, &extras_root.join(item), &mut self.backup);
            report.directories.record(
                &format!("{EXTRAS_DIR}/{}", item.to_string_lossy()),
                DirectoryCategory::Other,
                outcome,
                log.as_ref(),
            )?;
        }
        Ok(())
    }

    fn run_uninstall(
        &mut self,
        root: &Path,
        nix_config: bool,
        profile: &Profile,
        env: &[(String, String)],
        report: &mut UninstallReport,
    ) -> Result<()> {
        let scripts = &profile.script_config;
        self.hook(root, HookPhase::PreUninstall, scripts, env)?;
        if nix_config {
            self.log.warn("Nix configurations are not retracted; use the Nix tooling to switch back");
        } else {
            let extras_root = self
                .settings
                .install
                .extras_target
                .clone()
                .unwrap_or_else(|| self.paths.home.clone());
            let extras = sorted_entries(&root.join(EXTRAS_DIR))
                .map_err(|e| RiceError::file(&root.join(EXTRAS_DIR), format!("{e:#}")))?;
            let log = Arc::clone(&self.log);
            let dispatcher = Dispatcher {
                paths: &self.paths,
                root,
                linker: self.tools.linker.as_ref(),
                link_options: &[],
                destination: None,
                log: log.as_ref(),
            };
            for (rel, category) in &profile.dotfile_directories {
                let outcome = dispatcher.retract(rel, *category, &mut self.backup);
                report
                    .directories
                    .record(rel, *category, outcome, log.as_ref())?;
            }
            for (rel, target_dir) in &profile.custom_extras_paths {
                let outcome = dispatcher.remove_extra(
                    &root.join(rel),
                    &target_dir.join(base_name(rel)),
                    &mut self.backup,
                );
                report.directories.record(
                    &format!("extras:{rel}"),
                    DirectoryCategory::Other,
                    outcome,
                    log.as_ref(),
                )?;
            }
            for entry in extras.iter().filter(|p| p.is_dir()) {
                let Some(item) = entry.file_name() else {
                    continue;
                };
                let outcome =
                    dispatcher.remove_extra(entry, &extras_root.join(item), &mut self.backup);
                report.directories.record(
                    &format!("{EXTRAS_DIR}/{}", item.to_string_lossy()),
                    DirectoryCategory::Other,
                    outcome,
                    log.as_ref(),
                )?;
            }
        }
        self.hook(root, HookPhase::PostUninstall, scripts, env)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn dispatcher<'a>(&'a self, root: &'a Path, options: &'a ApplyOptions) -> Dispatcher<'a> {
        Dispatcher {
            paths: &self.paths,
            root,
            linker: self.tools.linker.as_ref(),
            link_options: &options.link_options,
            destination: options.destination.as_deref(),
            log: self.log.as_ref(),
        }
    }

    fn checkpoint(&self, next: &Phase) -> Result<()> {
        if self.interrupt.requested() {
            return Err(RiceError::Cancelled(format!(
                "interrupted before {}",
                next.name()
            )));
        }
        Ok(())
    }

    fn enter(&self, lifecycle: &mut Lifecycle, next: Phase) -> Result<()> {
        self.checkpoint(&next)?;
        self.log.debug(&format!("phase: {}", next.name()));
        lifecycle.advance(next)
    }

    fn hook(
        &self,
        root: &Path,
        phase: HookPhase,
        config: &ScriptConfig,
        env: &[(String, String)],
    ) -> Result<()> {
        let task = format!("hook {phase}");
        let ran = self
            .tools
            .scripts
            .run_phase(root, phase, config, env)
            .inspect_err(|e| {
                self.log
                    .record_task(&task, TaskStatus::Failed, Some(&e.to_string()));
            })?;
        if ran > 0 {
            self.log
                .record_task(&task, TaskStatus::Ok, Some(&format!("{ran} script(s)")));
        }
        Ok(())
    }

    fn fail(&mut self, lifecycle: &mut Lifecycle, report: &mut ApplyReport, err: RiceError) {
        self.log.error(&format!("{}: {err}", report.rice));
        lifecycle.fail(err.to_string());
        report.applied_all = false;

        let open = self.backup.active().map(|op| op.id.clone());
        if let Some(id) = open {
            match self.backup.rollback(&id) {
                Ok(()) => {
                    self.log.info(&format!("rolled back {id}"));
                    if let Err(e) = lifecycle.advance(Phase::RolledBack) {
                        self.log.warn(&e.to_string());
                    }
                }
                Err(rollback) => {
                    self.log.error(&rollback.to_string());
                    report.rollback_error = Some(rollback.into());
                }
            }
        } else if let Some(id) = &report.backup_id {
            self.log
                .warn(&format!("backup {id} was kept; restore it with `rice backup rollback {id}`"));
        }
        report.error = Some(err);
    }
}

fn hook_env(name: &str) -> Vec<(String, String)> {
    vec![("RICE_NAME".to_string(), name.to_string())]
}

fn is_font(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| FONT_EXTENSIONS.iter().any(|f| ext.eq_ignore_ascii_case(f)))
}

/// File name up to its first dot: `JetBrainsMono.Regular.ttf` → `JetBrainsMono`.
fn font_name(path: &Path) -> Option<String> {
    let file = path.file_name()?.to_str()?;
    let name = file.split('.').next().unwrap_or(file);
    (!name.is_empty()).then(|| name.to_string())
}
