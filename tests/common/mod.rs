// Shared helpers for integration tests.
//
// Provides an isolated home directory with rice checkouts under the state
// directory, and in-process collaborators so no external tool is invoked.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rice_cli::config::{Paths, Settings};
use rice_cli::engine::{ApplyEngine, Collaborators};
use rice_cli::error::CollaboratorError;
use rice_cli::logging::{Log, TaskStatus};
use rice_cli::resources::{
    HookPhase, NixDeployer, PackageInstaller, ScriptRunner, SymlinkLinker, TemplateRenderer,
};
use rice_cli::store::{RiceRecord, RiceStore, ScriptConfig};

/// [`Log`] that keeps every message, prefixed with its level.
#[derive(Debug, Default)]
pub struct TestLog {
    lines: Mutex<Vec<String>>,
}

impl TestLog {
    fn push(&self, level: &str, msg: &str) {
        self.lines.lock().unwrap().push(format!("{level}: {msg}"));
    }

    /// Every captured line.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Whether any line contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.contains(needle))
    }
}

impl Log for TestLog {
    fn stage(&self, msg: &str) {
        self.push("stage", msg);
    }
    fn info(&self, msg: &str) {
        self.push("info", msg);
    }
    fn debug(&self, msg: &str) {
        self.push("debug", msg);
    }
    fn warn(&self, msg: &str) {
        self.push("warn", msg);
    }
    fn error(&self, msg: &str) {
        self.push("error", msg);
    }
    fn dry_run(&self, msg: &str) {
        self.push("dry_run", msg);
    }
    fn record_task(&self, name: &str, status: TaskStatus, _message: Option<&str>) {
        self.push("task", &format!("{name} {status:?}"));
    }
}

/// Package installer over an in-memory package set.
#[derive(Debug, Default)]
pub struct FakeInstaller {
    installed: Mutex<BTreeSet<String>>,
    batches: Mutex<Vec<Vec<String>>>,
}

impl FakeInstaller {
    /// Installer that reports `names` as already installed.
    pub fn with_installed(names: &[&str]) -> Self {
        let installer = Self::default();
        installer
            .installed
            .lock()
            .unwrap()
            .extend(names.iter().map(|n| (*n).to_string()));
        installer
    }

    /// Every `install` call, in order.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.batches.lock().unwrap().clone()
    }

    /// The current package set.
    pub fn installed(&self) -> BTreeSet<String> {
        self.installed.lock().unwrap().clone()
    }
}

impl PackageInstaller for FakeInstaller {
    fn install(&self, names: &[String]) -> Result<(), CollaboratorError> {
        self.batches.lock().unwrap().push(names.to_vec());
        self.installed.lock().unwrap().extend(names.iter().cloned());
        Ok(())
    }

    fn is_installed(&self, name: &str) -> bool {
        self.installed.lock().unwrap().contains(name)
    }

    fn install_font_manually(&self, _path: &Path) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn installed_packages(&self) -> Result<BTreeSet<String>, CollaboratorError> {
        Ok(self.installed())
    }

    fn remove(&self, names: &[String]) -> Result<(), CollaboratorError> {
        let mut installed = self.installed.lock().unwrap();
        for name in names {
            installed.remove(name);
        }
        Ok(())
    }
}

/// Script runner that finds no scripts.
#[derive(Debug, Default)]
pub struct NoScripts;

impl ScriptRunner for NoScripts {
    fn run_phase(
        &self,
        _dir: &Path,
        _phase: HookPhase,
        _config: &ScriptConfig,
        _env: &[(String, String)],
    ) -> Result<usize, CollaboratorError> {
        Ok(0)
    }
}

/// Renderer that writes nothing.
#[derive(Debug, Default)]
pub struct NoTemplates;

impl TemplateRenderer for NoTemplates {
    fn render(
        &self,
        _source_dir: &Path,
        _context: &serde_json::Value,
    ) -> Result<Vec<PathBuf>, CollaboratorError> {
        Ok(Vec::new())
    }
}

/// Nix deployer that records the directories it was given.
#[derive(Debug, Default)]
pub struct RecordingNix {
    deployed: Mutex<Vec<PathBuf>>,
}

impl RecordingNix {
    pub fn deployed(&self) -> Vec<PathBuf> {
        self.deployed.lock().unwrap().clone()
    }
}

impl NixDeployer for RecordingNix {
    fn deploy(&self, dir: &Path) -> Result<(), CollaboratorError> {
        self.deployed.lock().unwrap().push(dir.to_path_buf());
        Ok(())
    }
}

/// An isolated home with rice checkouts, backed by a [`tempfile::TempDir`].
pub struct RiceFixture {
    /// Temporary home directory.
    pub home: tempfile::TempDir,
    /// Locations under `home`.
    pub paths: Paths,
    /// Shared log.
    pub log: Arc<TestLog>,
    /// Shared installer.
    pub installer: Arc<FakeInstaller>,
    /// Shared Nix deployer.
    pub nix: Arc<RecordingNix>,
}

impl RiceFixture {
    /// Empty home; nothing is installed.
    pub fn new() -> Self {
        let home = tempfile::tempdir().expect("create temp dir");
        let paths = Paths::under(home.path());
        Self {
            home,
            paths,
            log: Arc::new(TestLog::default()),
            installer: Arc::new(FakeInstaller::default()),
            nix: Arc::new(RecordingNix::default()),
        }
    }

    /// Checkout directory of `rice`.
    pub fn rice_root(&self, rice: &str) -> PathBuf {
        self.paths.repos_dir().join(rice)
    }

    /// Write a file inside the checkout of `rice`.
    pub fn write(&self, rice: &str, rel: &str, body: &str) {
        write_file(&self.rice_root(rice).join(rel), body);
    }

    /// Write a file relative to `$XDG_CONFIG_HOME`.
    pub fn write_config(&self, rel: &str, body: &str) {
        write_file(&self.paths.config_home.join(rel), body);
    }

    /// Register `rice` in the store, pointing at its checkout.
    pub fn register(&self, rice: &str) {
        std::fs::create_dir_all(self.rice_root(rice)).expect("create checkout");
        let mut store = self.store();
        store.upsert(rice, RiceRecord::new(self.rice_root(rice), None));
        store.save().expect("save store");
    }

    /// The store as currently on disk.
    pub fn store(&self) -> RiceStore {
        RiceStore::load(&self.paths.store_file()).expect("load store")
    }

    /// In-process collaborators with the native symlink linker.
    pub fn collaborators(&self) -> Collaborators {
        let log: Arc<dyn Log> = self.log.clone();
        Collaborators {
            linker: Arc::new(SymlinkLinker::new(log)),
            installer: self.installer.clone(),
            scripts: Arc::new(NoScripts),
            templates: Arc::new(NoTemplates),
            nix: self.nix.clone(),
        }
    }

    /// Engine with default settings over the on-disk store.
    pub fn engine(&self) -> ApplyEngine {
        self.engine_with(Settings::default())
    }

    /// Engine with `settings` over the on-disk store.
    pub fn engine_with(&self, settings: Settings) -> ApplyEngine {
        ApplyEngine::new(
            self.paths.clone(),
            settings,
            self.store(),
            self.collaborators(),
            self.log.clone(),
        )
    }
}

/// Write `body` to `path`, creating parent directories.
pub fn write_file(path: &Path, body: &str) {
    std::fs::create_dir_all(path.parent().expect("path has a parent")).expect("create parent");
    std::fs::write(path, body).expect("write file");
}

/// Read a file to a string.
pub fn read(path: &Path) -> String {
    std::fs::read_to_string(path).expect("read file")
}
