//! Nix deployment through the `nix`, `home-manager` and `nixos-rebuild` CLIs.
use std::path::Path;
use std::sync::Arc;

use super::NixDeployer;
use crate::error::CollaboratorError;
use crate::exec::Executor;
use crate::logging::Log;

/// Root files that mark a rice as a Nix configuration.
pub const NIX_MARKERS: &[&str] = &["flake.nix", "configuration.nix", "home.nix"];

/// Returns `true` if `dir` carries one of [`NIX_MARKERS`].
#[must_use]
pub fn is_nix_rice(dir: &Path) -> bool {
    NIX_MARKERS.iter().any(|m| dir.join(m).is_file())
}

/// How a directory gets activated.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Plan {
    HomeManagerFlake,
    NixosFlake,
    FlakePackage,
    HomeManagerFile,
    NixosFile,
}

impl Plan {
    fn detect(dir: &Path) -> Option<Self> {
        if let Ok(flake) = std::fs::read_to_string(dir.join("flake.nix")) {
            return Some(if flake.contains("homeConfigurations") {
                Self::HomeManagerFlake
            } else if flake.contains("nixosConfigurations") {
                Self::NixosFlake
            } else {
                Self::FlakePackage
            });
        }
        if dir.join("home.nix").is_file() {
            return Some(Self::HomeManagerFile);
        }
        dir.join("configuration.nix")
            .is_file()
            .then_some(Self::NixosFile)
    }

    fn commands(&self, dir: &Path) -> Vec<(String, Vec<String>)> {
        let cmd = |program: &str, args: &[&str]| {
            (
                program.to_string(),
                args.iter().map(|a| (*a).to_string()).collect(),
            )
        };
        match self {
            Self::HomeManagerFlake => vec![cmd("home-manager", &["switch", "--flake", "."])],
            Self::NixosFlake => vec![cmd("sudo", &["nixos-rebuild", "switch", "--flake", "."])],
            Self::FlakePackage => vec![
                cmd("nix", &["build", ".#default"]),
                cmd("nix-env", &["-i", "./result"]),
            ],
            Self::HomeManagerFile => vec![cmd("home-manager", &["switch", "-f", "home.nix"])],
            Self::NixosFile => {
                let config = format!("nixos-config={}", dir.join("configuration.nix").display());
                vec![cmd("sudo", &["nixos-rebuild", "switch", "-I", config.as_str()])]
            }
        }
    }
}

/// [`NixDeployer`] shelling out to the Nix tools.
pub struct NixCli {
    executor: Arc<dyn Executor>,
    log: Arc<dyn Log>,
}

impl std::fmt::Debug for NixCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NixCli").finish_non_exhaustive()
    }
}

impl NixCli {
    /// Deployer running through `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>, log: Arc<dyn Log>) -> Self {
        Self { executor, log }
    }
}

impl NixDeployer for NixCli {
    fn deploy(&self, dir: &Path) -> Result<(), CollaboratorError> {
        let plan = Plan::detect(dir).ok_or_else(|| {
            CollaboratorError::Nix(format!("no Nix configuration in {}", dir.display()))
        })?;
        if !self.executor.which("nix") && !self.executor.which("nix-env") {
            return Err(CollaboratorError::Nix("nix is not installed".to_string()));
        }
        for (program, args) in plan.commands(dir) {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            self.log.info(&format!("{program} {}", args.join(" ")));
            self.executor
                .run_in(dir, &program, &args)
                .map_err(|e| CollaboratorError::Nix(format!("{e:#}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::CaptureLog;
    use crate::resources::test_helpers::MockExecutor;

    fn deployer(exec: Arc<MockExecutor>) -> NixCli {
        NixCli::new(exec, Arc::new(CaptureLog::default()))
    }

    #[test]
    fn detects_markers() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_nix_rice(dir.path()));
        std::fs::write(dir.path().join("home.nix"), "{ }").unwrap();
        assert!(is_nix_rice(dir.path()));
    }

    #[test]
    fn home_manager_flake_switches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("flake.nix"),
            "{ outputs = _: { homeConfigurations.me = {}; }; }",
        )
        .unwrap();
        let exec = Arc::new(MockExecutor::ok("").with_which(true));
        deployer(exec.clone()).deploy(dir.path()).unwrap();
        assert_eq!(exec.calls(), vec!["home-manager switch --flake .".to_string()]);
    }

    #[test]
    fn plain_flake_builds_then_installs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("flake.nix"), "{ }").unwrap();
        let exec = Arc::new(
            MockExecutor::with_responses(vec![(true, String::new()), (true, String::new())])
                .with_which(true),
        );
        deployer(exec.clone()).deploy(dir.path()).unwrap();
        assert_eq!(
            exec.calls(),
            vec!["nix build .#default".to_string(), "nix-env -i ./result".to_string()]
        );
    }

    #[test]
    fn failure_is_nix_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("home.nix"), "{ }").unwrap();
        let err = deployer(Arc::new(MockExecutor::fail().with_which(true)))
            .deploy(dir.path())
            .unwrap_err();
        assert!(matches!(err, CollaboratorError::Nix(_)));
    }

    #[test]
    fn missing_configuration_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = deployer(Arc::new(MockExecutor::ok("").with_which(true)))
            .deploy(dir.path())
            .unwrap_err();
        assert!(err.to_string().contains("no Nix configuration"));
    }
}
