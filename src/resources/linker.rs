//! [`Linker`] implementations: GNU stow and native symlinks.
use std::path::Path;
use std::sync::Arc;

use super::fs::{is_real_dir, sorted_entries};
use super::symlink::SymlinkResource;
use super::{Applicable, LinkRequest, Linker, ResourceChange};
use crate::error::CollaboratorError;
use crate::exec::Executor;
use crate::logging::Log;

/// Links through `stow -v --dir <source_dir> --target <target> <item>`.
#[derive(Debug)]
pub struct StowLinker {
    executor: Arc<dyn Executor>,
}

impl StowLinker {
    /// Linker running stow through `executor`.
    #[must_use]
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    fn stow(&self, request: &LinkRequest, delete: bool) -> Result<(), CollaboratorError> {
        let err = |message: String| CollaboratorError::Link {
            item: request.item.clone(),
            message,
        };
        if !self.executor.which("stow") {
            return Err(err("stow is not installed".to_string()));
        }
        std::fs::create_dir_all(&request.target)
            .map_err(|e| err(format!("create {}: {e}", request.target.display())))?;

        let source_dir = request.source_dir.to_string_lossy();
        let target = request.target.to_string_lossy();
        let mut args = vec!["-v"];
        if delete {
            args.push("-D");
        }
        args.extend(["--dir", source_dir.as_ref(), "--target", target.as_ref()]);
        args.extend(request.options.iter().map(String::as_str));
        args.push(&request.item);

        self.executor
            .run("stow", &args)
            .map(|_| ())
            .map_err(|e| err(format!("{e:#}")))
    }
}

impl Linker for StowLinker {
    fn link(&self, request: &LinkRequest) -> Result<(), CollaboratorError> {
        self.stow(request, false)
    }

    fn unlink(&self, request: &LinkRequest) -> Result<(), CollaboratorError> {
        self.stow(request, true)
    }
}

/// Links each entry of the source directory with a native symlink.
///
/// Where the target already has a real directory for a source directory,
/// the linker descends and links that directory's entries instead.
pub struct SymlinkLinker {
    log: Arc<dyn Log>,
}

impl std::fmt::Debug for SymlinkLinker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymlinkLinker").finish_non_exhaustive()
    }
}

impl SymlinkLinker {
    /// Native linker.
    #[must_use]
    pub fn new(log: Arc<dyn Log>) -> Self {
        Self { log }
    }

    fn resources(request: &LinkRequest) -> Result<Vec<SymlinkResource>, CollaboratorError> {
        let mut resources = Vec::new();
        collect(&request.source(), &request.target, &mut resources).map_err(|e| {
            CollaboratorError::Link {
                item: request.item.clone(),
                message: format!("{e:#}"),
            }
        })?;
        Ok(resources)
    }

    fn each(
        &self,
        request: &LinkRequest,
        op: impl Fn(&SymlinkResource) -> anyhow::Result<ResourceChange>,
    ) -> Result<(), CollaboratorError> {
        let mut failures = Vec::new();
        for resource in Self::resources(request)? {
            match op(&resource) {
                Ok(ResourceChange::Applied) => self.log.debug(&resource.description()),
                Ok(ResourceChange::AlreadyCorrect) => {}
                Ok(ResourceChange::Skipped { reason }) => {
                    failures.push(format!("{}: {reason}", resource.target.display()));
                }
                Err(e) => failures.push(format!("{e:#}")),
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(CollaboratorError::Link {
                item: request.item.clone(),
                message: failures.join("; "),
            })
        }
    }
}

impl Linker for SymlinkLinker {
    fn link(&self, request: &LinkRequest) -> Result<(), CollaboratorError> {
        self.each(request, |r| r.apply())
    }

    fn unlink(&self, request: &LinkRequest) -> Result<(), CollaboratorError> {
        self.each(request, |r| match r.remove()? {
            // Already gone or replaced by the user: nothing to undo.
            ResourceChange::Skipped { .. } => Ok(ResourceChange::AlreadyCorrect),
            other => Ok(other),
        })?;
        remove_if_empty(&request.target);
        Ok(())
    }
}

/// One link per entry of `source`, descending where `target` already holds
/// a real directory for a source directory.
fn collect(source: &Path, target: &Path, out: &mut Vec<SymlinkResource>) -> anyhow::Result<()> {
    for entry in sorted_entries(source)? {
        let Some(name) = entry.file_name().map(ToOwned::to_owned) else {
            continue;
        };
        if name == ".git" {
            continue;
        }
        let live = target.join(&name);
        if is_real_dir(&live) && is_real_dir(&entry) {
            collect(&entry, &live, out)?;
        } else {
            out.push(SymlinkResource {
                source: entry,
                target: live,
            });
        }
    }
    Ok(())
}

fn remove_if_empty(dir: &Path) {
    if std::fs::read_dir(dir).is_ok_and(|mut d| d.next().is_none()) {
        let _ = std::fs::remove_dir(dir);
    }
}
