//! Package installation: the system package manager plus language
//! ecosystems, routed by `manager:name` prefixes.
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context as _, Result};

use super::PackageInstaller;
use crate::error::CollaboratorError;
use crate::exec::Executor;
use crate::logging::Log;
use crate::platform::{Distro, Platform};
use crate::retry::{RetryPolicy, retry};

/// AUR helper used for `aur:` packages when none is configured.
const DEFAULT_AUR_HELPER: &str = "yay";

/// System package managers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PackageManager {
    /// Arch Linux official repositories.
    Pacman,
    /// Debian and derivatives.
    Apt,
    /// Fedora and derivatives.
    Dnf,
    /// openSUSE.
    Zypper,
    /// An AUR helper such as `yay` or `paru`.
    AurHelper(String),
    /// `nix-env` against nixpkgs.
    Nix,
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pacman => write!(f, "pacman"),
            Self::Apt => write!(f, "apt"),
            Self::Dnf => write!(f, "dnf"),
            Self::Zypper => write!(f, "zypper"),
            Self::AurHelper(helper) => write!(f, "{helper}"),
            Self::Nix => write!(f, "nix"),
        }
    }
}

impl PackageManager {
    /// The manager native to `platform`. On Arch a configured AUR helper
    /// takes over from pacman.
    #[must_use]
    pub fn for_platform(platform: &Platform, aur_helper: Option<&str>) -> Option<Self> {
        match &platform.distro {
            Distro::Arch => Some(
                aur_helper.map_or(Self::Pacman, |helper| Self::AurHelper(helper.to_string())),
            ),
            Distro::Debian => Some(Self::Apt),
            Distro::Fedora => Some(Self::Dnf),
            Distro::OpenSuse => Some(Self::Zypper),
            Distro::NixOs => Some(Self::Nix),
            Distro::Other(_) => None,
        }
    }

    /// [`PackageManager::for_platform`], kept only when its binary is on
    /// `PATH`.
    #[must_use]
    pub fn detect(
        platform: &Platform,
        aur_helper: Option<&str>,
        executor: &dyn Executor,
    ) -> Option<Self> {
        Self::for_platform(platform, aur_helper).filter(|pm| pm.is_available(executor))
    }

    /// The binary that must be on `PATH`.
    #[must_use]
    pub fn program(&self) -> &str {
        match self {
            Self::Pacman => "pacman",
            Self::Apt => "apt-get",
            Self::Dnf => "dnf",
            Self::Zypper => "zypper",
            Self::AurHelper(helper) => helper,
            Self::Nix => "nix-env",
        }
    }

    /// Whether the manager can be used on this machine.
    #[must_use]
    pub fn is_available(&self, executor: &dyn Executor) -> bool {
        executor.which(self.program())
    }

    /// Whether `name` is installed.
    #[must_use]
    pub fn is_installed(&self, executor: &dyn Executor, name: &str) -> bool {
        let result = match self {
            Self::Pacman | Self::AurHelper(_) => executor.run_unchecked("pacman", &["-Q", name]),
            Self::Apt => executor.run_unchecked("dpkg", &["-s", name]),
            Self::Dnf | Self::Zypper => executor.run_unchecked("rpm", &["-q", name]),
            Self::Nix => executor.run_unchecked("nix-env", &["-q", name]),
        };
        result.is_ok_and(|r| r.success)
    }

    /// Install `names` in one command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub fn install(&self, executor: &dyn Executor, names: &[&str]) -> Result<()> {
        let (program, mut args): (&str, Vec<&str>) = match self {
            Self::Pacman => ("sudo", vec!["pacman", "-S", "--needed", "--noconfirm"]),
            Self::AurHelper(helper) => (helper, vec!["-S", "--needed", "--noconfirm"]),
            Self::Apt => ("sudo", vec!["apt-get", "install", "-y"]),
            Self::Dnf => ("sudo", vec!["dnf", "install", "-y"]),
            Self::Zypper => ("sudo", vec!["zypper", "--non-interactive", "install"]),
            Self::Nix => ("nix-env", vec!["-iA"]),
        };
        let nix_attrs: Vec<String> = if *self == Self::Nix {
            names.iter().map(|n| format!("nixpkgs.{n}")).collect()
        } else {
            Vec::new()
        };
        if nix_attrs.is_empty() {
            args.extend_from_slice(names);
        } else {
            args.extend(nix_attrs.iter().map(String::as_str));
        }
        executor.run(program, &args)?;
        Ok(())
    }

    /// Remove `names` in one command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub fn remove(&self, executor: &dyn Executor, names: &[&str]) -> Result<()> {
        let (program, mut args): (&str, Vec<&str>) = match self {
            Self::Pacman => ("sudo", vec!["pacman", "-Rns", "--noconfirm"]),
            Self::AurHelper(helper) => (helper, vec!["-Rns", "--noconfirm"]),
            Self::Apt => ("sudo", vec!["apt-get", "remove", "-y"]),
            Self::Dnf => ("sudo", vec!["dnf", "remove", "-y"]),
            Self::Zypper => ("sudo", vec!["zypper", "--non-interactive", "remove"]),
            Self::Nix => ("nix-env", vec!["-e"]),
        };
        args.extend_from_slice(names);
        executor.run(program, &args)?;
        Ok(())
    }

    /// Refresh the package database.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub fn update_db(&self, executor: &dyn Executor) -> Result<()> {
        match self {
            Self::Pacman => executor.run("sudo", &["pacman", "-Sy"]),
            Self::AurHelper(helper) => executor.run(helper, &["-Sy"]),
            Self::Apt => executor.run("sudo", &["apt-get", "update"]),
            Self::Dnf => executor.run("sudo", &["dnf", "makecache"]),
            Self::Zypper => executor.run("sudo", &["zypper", "--non-interactive", "refresh"]),
            Self::Nix => executor.run("nix-channel", &["--update"]),
        }?;
        Ok(())
    }

    /// Every installed package name, from a single query.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be run.
    pub fn installed(&self, executor: &dyn Executor) -> Result<BTreeSet<String>> {
        let result = match self {
            Self::Pacman | Self::AurHelper(_) => executor.run_unchecked("pacman", &["-Qq"])?,
            Self::Apt => executor.run_unchecked("dpkg-query", &["-W", "-f=${Package}\\n"])?,
            Self::Dnf | Self::Zypper => {
                executor.run_unchecked("rpm", &["-qa", "--qf", "%{NAME}\\n"])?
            }
            Self::Nix => executor.run_unchecked("nix-env", &["-q"])?,
        };
        if !result.success {
            anyhow::bail!("{self} query failed: {}", result.stderr.trim());
        }
        Ok(result
            .stdout
            .lines()
            .filter_map(|l| l.split_whitespace().next())
            .map(String::from)
            .collect())
    }
}

/// Where one package name is sent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum Route {
    System(PackageManager),
    Pip,
    Npm,
    Cargo,
    Brew,
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System(pm) => write!(f, "{pm}"),
            Self::Pip => write!(f, "pip"),
            Self::Npm => write!(f, "npm"),
            Self::Cargo => write!(f, "cargo"),
            Self::Brew => write!(f, "brew"),
        }
    }
}

impl Route {
    fn install(&self, executor: &dyn Executor, names: &[&str]) -> Result<()> {
        let (program, mut args) = match self {
            Self::System(pm) => return pm.install(executor, names),
            Self::Pip => ("pip", vec!["install", "--user"]),
            Self::Npm => ("npm", vec!["install", "-g"]),
            Self::Cargo => ("cargo", vec!["install"]),
            Self::Brew => ("brew", vec!["install"]),
        };
        args.extend_from_slice(names);
        executor.run(program, &args)?;
        Ok(())
    }

    fn remove(&self, executor: &dyn Executor, names: &[&str]) -> Result<()> {
        let (program, mut args) = match self {
            Self::System(pm) => return pm.remove(executor, names),
            Self::Pip => ("pip", vec!["uninstall", "-y"]),
            Self::Npm => ("npm", vec!["uninstall", "-g"]),
            Self::Cargo => ("cargo", vec!["uninstall"]),
            Self::Brew => ("brew", vec!["uninstall"]),
        };
        args.extend_from_slice(names);
        executor.run(program, &args)?;
        Ok(())
    }

    fn is_installed(&self, executor: &dyn Executor, name: &str) -> bool {
        match self {
            Self::System(pm) => pm.is_installed(executor, name),
            Self::Pip => executor
                .run_unchecked("pip", &["show", name])
                .is_ok_and(|r| r.success),
            Self::Npm => executor
                .run_unchecked("npm", &["ls", "-g", "--depth=0", name])
                .is_ok_and(|r| r.success),
            Self::Cargo => executor
                .run_unchecked("cargo", &["install", "--list"])
                .is_ok_and(|r| {
                    let prefix = format!("{name} v");
                    r.stdout.lines().any(|l| l.starts_with(&prefix))
                }),
            Self::Brew => executor
                .run_unchecked("brew", &["list", name])
                .is_ok_and(|r| r.success),
        }
    }
}

/// [`PackageInstaller`] over the real package managers.
pub struct SystemPackageInstaller {
    executor: Arc<dyn Executor>,
    system: Option<PackageManager>,
    aur_helper: String,
    retry: RetryPolicy,
    parallel: bool,
    fonts_dir: PathBuf,
    log: Arc<dyn Log>,
}

impl std::fmt::Debug for SystemPackageInstaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemPackageInstaller")
            .field("system", &self.system)
            .field("aur_helper", &self.aur_helper)
            .field("parallel", &self.parallel)
            .finish_non_exhaustive()
    }
}

impl SystemPackageInstaller {
    /// Installer for `system` (selected once, usually through
    /// [`PackageManager::for_platform`]). Fonts installed by hand go to
    /// `fonts_dir`.
    #[must_use]
    pub fn new(
        executor: Arc<dyn Executor>,
        system: Option<PackageManager>,
        fonts_dir: PathBuf,
        log: Arc<dyn Log>,
    ) -> Self {
        let aur_helper = match &system {
            Some(PackageManager::AurHelper(helper)) => helper.clone(),
            _ => DEFAULT_AUR_HELPER.to_string(),
        };
        Self {
            executor,
            system,
            aur_helper,
            retry: RetryPolicy::default(),
            parallel: true,
            fonts_dir,
            log,
        }
    }

    /// Use `policy` for every install command.
    #[must_use]
    pub const fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Install manager groups concurrently, one command per group.
    #[must_use]
    pub const fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// AUR helper for `aur:` packages.
    #[must_use]
    pub fn with_aur_helper(mut self, helper: &str) -> Self {
        helper.clone_into(&mut self.aur_helper);
        self
    }

    /// Split `manager:name` into its route and bare name.
    fn route<'a>(&self, name: &'a str) -> Result<(Route, &'a str)> {
        let system = || {
            self.system
                .clone()
                .map(Route::System)
                .context("no system package manager detected")
        };
        let Some((prefix, bare)) = name.split_once(':') else {
            return Ok((system()?, name));
        };
        let route = match prefix {
            "pacman" => Route::System(PackageManager::Pacman),
            "apt" => Route::System(PackageManager::Apt),
            "dnf" => Route::System(PackageManager::Dnf),
            "zypper" => Route::System(PackageManager::Zypper),
            "aur" => Route::System(PackageManager::AurHelper(self.aur_helper.clone())),
            "nix" => Route::System(PackageManager::Nix),
            "pip" => Route::Pip,
            "npm" => Route::Npm,
            "cargo" => Route::Cargo,
            "brew" => Route::Brew,
            _ => anyhow::bail!("unknown package manager prefix '{prefix}' in '{name}'"),
        };
        Ok((route, bare))
    }

    /// Group `names` by route. Unroutable names are returned separately.
    fn group<'a>(&self, names: &'a [String]) -> (BTreeMap<Route, Vec<&'a str>>, Vec<String>) {
        let mut groups: BTreeMap<Route, Vec<&str>> = BTreeMap::new();
        let mut unroutable = Vec::new();
        for name in names {
            match self.route(name) {
                Ok((route, bare)) => groups.entry(route).or_default().push(bare),
                Err(e) => {
                    self.log.warn(&format!("{e:#}"));
                    unroutable.push(name.clone());
                }
            }
        }
        (groups, unroutable)
    }

    /// Install one group; returns the names that could not be installed.
    ///
    /// The whole group is tried as one command first. When that keeps
    /// failing each package is retried alone so only the real culprits are
    /// reported.
    fn install_group(&self, route: &Route, names: &[&str]) -> Vec<String> {
        let executor = self.executor.as_ref();
        let on_retry = |attempt: u32, e: &anyhow::Error| {
            self.log
                .warn(&format!("{route} attempt {attempt} failed, retrying: {e:#}"));
        };
        if retry(&self.retry, |_| route.install(executor, names), on_retry).is_ok() {
            self.log.debug(&format!("{route}: installed {}", names.join(" ")));
            return Vec::new();
        }
        if names.len() == 1 {
            self.log.error(&format!("{route}: failed to install {}", names.join(" ")));
            return names.iter().map(|n| (*n).to_string()).collect();
        }

        let mut failed = Vec::new();
        for name in names {
            if let Err(e) = route.install(executor, &[name]) {
                self.log.error(&format!("{route}: failed to install {name}: {e:#}"));
                failed.push((*name).to_string());
            }
        }
        failed
    }
}

impl PackageInstaller for SystemPackageInstaller {
    fn install(&self, names: &[String]) -> Result<(), CollaboratorError> {
        if names.is_empty() {
            return Ok(());
        }
        let (groups, mut failed) = self.group(names);

        if let Some(pm) = groups.keys().find_map(|r| match r {
            Route::System(pm) => Some(pm),
            _ => None,
        }) && let Err(e) = pm.update_db(self.executor.as_ref())
        {
            self.log.warn(&format!("{pm}: database refresh failed: {e:#}"));
        }

        let groups: Vec<(Route, Vec<&str>)> = groups.into_iter().collect();
        if self.parallel && groups.len() > 1 {
            use rayon::prelude::*;
            let shared = Mutex::new(Vec::new());
            groups.into_par_iter().for_each(|(route, names)| {
                let group_failed = self.install_group(&route, &names);
                if let Ok(mut all) = shared.lock() {
                    all.extend(group_failed);
                }
            });
            failed.extend(
                shared
                    .into_inner()
                    .unwrap_or_else(std::sync::PoisonError::into_inner),
            );
        } else {
            for (route, names) in &groups {
                failed.extend(self.install_group(route, names));
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            failed.sort();
            Err(CollaboratorError::PackageManager {
                message: format!("failed to install: {}", failed.join(", ")),
                failed,
            })
        }
    }

    fn is_installed(&self, name: &str) -> bool {
        self.route(name)
            .is_ok_and(|(route, bare)| route.is_installed(self.executor.as_ref(), bare))
    }

    fn install_font_manually(&self, path: &Path) -> Result<(), CollaboratorError> {
        let font_err = |message: String| CollaboratorError::PackageManager {
            message,
            failed: vec![path.display().to_string()],
        };
        let file_name = path
            .file_name()
            .ok_or_else(|| font_err(format!("{} is not a font file", path.display())))?;
        std::fs::create_dir_all(&self.fonts_dir)
            .map_err(|e| font_err(format!("create {}: {e}", self.fonts_dir.display())))?;
        let dest = self.fonts_dir.join(file_name);
        std::fs::copy(path, &dest)
            .map_err(|e| font_err(format!("copy {}: {e}", path.display())))?;

        if self.executor.which("fc-cache") {
            let refreshed = self.executor.run_unchecked("fc-cache", &["-f"]);
            if !refreshed.is_ok_and(|r| r.success) {
                self.log.warn("fc-cache failed; fonts may need a cache refresh");
            }
        }
        self.log.debug(&format!("installed font {}", dest.display()));
        Ok(())
    }

    fn installed_packages(&self) -> Result<BTreeSet<String>, CollaboratorError> {
        let Some(system) = &self.system else {
            return Ok(BTreeSet::new());
        };
        system
            .installed(self.executor.as_ref())
            .map_err(|e| CollaboratorError::PackageManager {
                message: format!("{e:#}"),
                failed: Vec::new(),
            })
    }

    fn remove(&self, names: &[String]) -> Result<(), CollaboratorError> {
        let (groups, mut failed) = self.group(names);
        for (route, names) in &groups {
            if let Err(e) = route.remove(self.executor.as_ref(), names) {
                self.log.error(&format!("{route}: {e:#}"));
                failed.extend(names.iter().map(|n| (*n).to_string()));
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(CollaboratorError::PackageManager {
                message: format!("failed to remove: {}", failed.join(", ")),
                failed,
            })
        }
    }
}
