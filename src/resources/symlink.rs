//! Symlink resource.
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

use super::fs::{create_symlink, ensure_parent_dir, path_present};
use super::{Applicable, Resource, ResourceChange, ResourceState};

/// A symlink at `target` that should point to `source`.
#[derive(Debug, Clone)]
pub struct SymlinkResource {
    /// What the symlink points to.
    pub source: PathBuf,
    /// Where the symlink lives.
    pub target: PathBuf,
}

impl SymlinkResource {
    /// Create a new symlink resource.
    #[must_use]
    pub const fn new(source: PathBuf, target: PathBuf) -> Self {
        Self { source, target }
    }
}

impl Applicable for SymlinkResource {
    fn description(&self) -> String {
        format!("{} -> {}", self.target.display(), self.source.display())
    }

    fn apply(&self) -> Result<ResourceChange> {
        match self.current_state()? {
            ResourceState::Correct => return Ok(ResourceChange::AlreadyCorrect),
            ResourceState::Invalid { reason } => return Ok(ResourceChange::Skipped { reason }),
            ResourceState::Incorrect { .. } => {
                std::fs::remove_file(&self.target)
                    .with_context(|| format!("remove existing: {}", self.target.display()))?;
            }
            ResourceState::Missing => {}
        }
        ensure_parent_dir(&self.target)?;
        create_symlink(&self.source, &self.target)?;
        Ok(ResourceChange::Applied)
    }

    /// Remove the link if it still points to `source`; anything else at
    /// `target` is left alone.
    fn remove(&self) -> Result<ResourceChange> {
        if self.current_state()? != ResourceState::Correct {
            return Ok(ResourceChange::Skipped {
                reason: format!("{} is not linked to the source", self.target.display()),
            });
        }
        std::fs::remove_file(&self.target)
            .with_context(|| format!("remove link: {}", self.target.display()))?;
        Ok(ResourceChange::Applied)
    }
}

impl Resource for SymlinkResource {
    fn current_state(&self) -> Result<ResourceState> {
        if !self.source.exists() {
            return Ok(ResourceState::Invalid {
                reason: format!("source does not exist: {}", self.source.display()),
            });
        }

        let Ok(meta) = self.target.symlink_metadata() else {
            return Ok(ResourceState::Missing);
        };
        if meta.is_dir() {
            return Ok(ResourceState::Invalid {
                reason: "target is a real directory".to_string(),
            });
        }

        match std::fs::read_link(&self.target) {
            Ok(existing) if paths_equal(&existing, &self.source) => Ok(ResourceState::Correct),
            Ok(existing) => Ok(ResourceState::Incorrect {
                current: format!("points to {}", existing.display()),
            }),
            Err(_) if path_present(&self.target) => Ok(ResourceState::Incorrect {
                current: "target is a regular file".to_string(),
            }),
            Err(_) => Ok(ResourceState::Missing),
        }
    }
}

/// Compare two paths, resolving both when they exist.
fn paths_equal(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    matches!(
        (dunce::canonicalize(a), dunce::canonicalize(b)),
        (Ok(x), Ok(y)) if x == y
    )
}
