//! Lifecycle hook scripts.
//!
//! A rice can ship hooks as `scriptdata/<phase>*` (for example
//! `scriptdata/post_apply.sh`) and list more per phase in its profile's
//! script configuration. Every hook runs from the rice root with
//! `RICE_DIRECTORY` set.
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::ScriptRunner;
use crate::error::CollaboratorError;
use crate::exec::Executor;
use crate::logging::Log;
use crate::store::ScriptConfig;

/// Directory inside a rice holding discovered hooks.
pub const SCRIPT_DIR: &str = "scriptdata";

/// Points in the lifecycle where hooks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HookPhase {
    /// Before the repository is cloned (or discovered).
    PreClone,
    /// After the repository is cloned (or discovered).
    PostClone,
    /// Before packages are installed.
    PreInstallDependencies,
    /// After packages are installed.
    PostInstallDependencies,
    /// Before directories are deployed.
    PreApply,
    /// After directories are deployed.
    PostApply,
    /// Before an uninstall.
    PreUninstall,
    /// After an uninstall.
    PostUninstall,
}

impl HookPhase {
    /// Snake-case phase name, also the script file prefix.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreClone => "pre_clone",
            Self::PostClone => "post_clone",
            Self::PreInstallDependencies => "pre_install_dependencies",
            Self::PostInstallDependencies => "post_install_dependencies",
            Self::PreApply => "pre_apply",
            Self::PostApply => "post_apply",
            Self::PreUninstall => "pre_uninstall",
            Self::PostUninstall => "post_uninstall",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Runs hooks with a shell through an [`Executor`].
pub struct ShellScriptRunner {
    executor: Arc<dyn Executor>,
    shell: String,
    log: Arc<dyn Log>,
}

impl fmt::Debug for ShellScriptRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShellScriptRunner")
            .field("shell", &self.shell)
            .finish_non_exhaustive()
    }
}

impl ShellScriptRunner {
    /// Runner using `shell` unless a profile overrides it.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>, shell: &str, log: Arc<dyn Log>) -> Self {
        Self {
            executor,
            shell: shell.to_string(),
            log,
        }
    }

    /// Scripts for `phase`: discovered ones first (sorted), then configured.
    fn scripts(
        dir: &Path,
        phase: HookPhase,
        config: &ScriptConfig,
    ) -> Result<Vec<PathBuf>, CollaboratorError> {
        let mut scripts: Vec<PathBuf> = std::fs::read_dir(dir.join(SCRIPT_DIR))
            .into_iter()
            .flatten()
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with(phase.as_str()))
                    && is_executable(p)
            })
            .collect();
        scripts.sort();

        for configured in config.custom_scripts.get(phase.as_str()).into_iter().flatten() {
            let path = dir.join(configured);
            if !path.is_file() {
                return Err(CollaboratorError::Script {
                    phase: phase.to_string(),
                    message: format!("configured script not found: {}", path.display()),
                });
            }
            if !scripts.contains(&path) {
                scripts.push(path);
            }
        }
        Ok(scripts)
    }
}

impl ScriptRunner for ShellScriptRunner {
    fn run_phase(
        &self,
        dir: &Path,
        phase: HookPhase,
        config: &ScriptConfig,
        env: &[(String, String)],
    ) -> Result<usize, CollaboratorError> {
        let scripts = Self::scripts(dir, phase, config)?;
        if scripts.is_empty() {
            return Ok(0);
        }

        let shell = config.shell.as_deref().unwrap_or(&self.shell);
        let rice_dir = dir.to_string_lossy();
        let mut vars: Vec<(&str, &str)> = vec![("RICE_DIRECTORY", rice_dir.as_ref())];
        vars.extend(env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        for script in &scripts {
            self.log.info(&format!("{phase}: {}", script.display()));
            let script_arg = script.to_string_lossy();
            let result = self
                .executor
                .run_in_with_env(dir, shell, &[script_arg.as_ref()], &vars)
                .map_err(|e| CollaboratorError::Script {
                    phase: phase.to_string(),
                    message: format!("{}: {e:#}", script.display()),
                })?;
            if !result.stdout.trim().is_empty() {
                self.log.debug(result.stdout.trim());
            }
        }
        Ok(scripts.len())
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
