//! Apply lifecycle: the phases an apply moves through and the transitions
//! allowed between them.
use std::fmt;

use crate::error::{Result, RiceError};

/// One phase of an apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Templates, classification, ambiguity resolution, scanning.
    Discovering,
    /// Operation backup opened, profile persisted.
    BackingUp,
    /// Fonts and packages.
    InstallingDependencies,
    /// Per-category dispatch and extras.
    Applying,
    /// `post_apply` hooks and commit bookkeeping.
    RunningHooks,
    /// Finished; the record reflects the outcome.
    Committed,
    /// A fatal error stopped the apply.
    Failed(String),
    /// The operation backup of a failed apply was restored.
    RolledBack,
}

impl Phase {
    /// Short name for logs and summaries.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Discovering => "discovering",
            Self::BackingUp => "backing up",
            Self::InstallingDependencies => "installing dependencies",
            Self::Applying => "applying",
            Self::RunningHooks => "running hooks",
            Self::Committed => "committed",
            Self::Failed(_) => "failed",
            Self::RolledBack => "rolled back",
        }
    }

    /// No further transition is possible except `Failed → RolledBack`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Failed(_) | Self::RolledBack)
    }

    const fn successor(&self) -> Option<Self> {
        match self {
            Self::Discovering => Some(Self::BackingUp),
            Self::BackingUp => Some(Self::InstallingDependencies),
            Self::InstallingDependencies => Some(Self::Applying),
            Self::Applying => Some(Self::RunningHooks),
            Self::RunningHooks => Some(Self::Committed),
            Self::Failed(_) => Some(Self::RolledBack),
            Self::Committed | Self::RolledBack => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(reason) => write!(f, "failed: {reason}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Tracks the current [`Phase`] and rejects out-of-order transitions.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    current: Phase,
    history: Vec<Phase>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    /// Start in [`Phase::Discovering`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: Phase::Discovering,
            history: vec![Phase::Discovering],
        }
    }

    /// The phase the apply is in.
    #[must_use]
    pub const fn current(&self) -> &Phase {
        &self.current
    }

    /// Every phase entered so far, in order.
    #[must_use]
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Returns [`RiceError::Validation`] unless `next` directly follows the
    /// current phase, or is `Failed` from a non-terminal phase.
    pub fn advance(&mut self, next: Phase) -> Result<()> {
        let allowed = match &next {
            Phase::Failed(_) => !self.current.is_terminal(),
            other => self.current.successor().as_ref() == Some(other),
        };
        if !allowed {
            return Err(RiceError::Validation(format!(
                "illegal phase transition: {} -> {}",
                self.current.name(),
                next.name()
            )));
        }
        self.history.push(next.clone());
        self.current = next;
        Ok(())
    }

    /// Move to [`Phase::Failed`]. Returns `false` if already terminal.
    pub fn fail(&mut self, reason: impl Into<String>) -> bool {
        self.advance(Phase::Failed(reason.into())).is_ok()
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn walk_to(phase: &Phase) -> Lifecycle {
        let mut lc = Lifecycle::new();
        while lc.current() != phase {
            let next = lc.current().successor().unwrap();
            lc.advance(next).unwrap();
        }
        lc
    }

    #[test]
    fn happy_path_reaches_committed() {
        let lc = walk_to(&Phase::Committed);
        assert_eq!(lc.history().len(), 6);
        assert!(lc.current().is_terminal());
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        let mut lc = Lifecycle::new();
        let err = lc.advance(Phase::Applying).unwrap_err();
        assert!(err.to_string().contains("discovering -> applying"), "{err}");
        assert_eq!(lc.current(), &Phase::Discovering);
    }

    #[test]
    fn every_non_terminal_phase_can_fail() {
        for phase in [
            Phase::Discovering,
            Phase::BackingUp,
            Phase::InstallingDependencies,
            Phase::Applying,
            Phase::RunningHooks,
        ] {
            let mut lc = walk_to(&phase);
            assert!(lc.fail("boom"), "{phase} should accept failure");
            assert_eq!(lc.current(), &Phase::Failed("boom".to_string()));
        }
    }

    #[test]
    fn committed_cannot_fail() {
        let mut lc = walk_to(&Phase::Committed);
        assert!(!lc.fail("late"));
        assert_eq!(lc.current(), &Phase::Committed);
    }

    #[test]
    fn rolled_back_only_after_failure() {
        let mut lc = walk_to(&Phase::Applying);
        assert!(lc.advance(Phase::RolledBack).is_err());
        lc.fail("link failed");
        lc.advance(Phase::RolledBack).unwrap();
        assert!(lc.current().is_terminal());
        assert!(!lc.fail("again"));
    }

    #[test]
    fn display_includes_failure_reason() {
        assert_eq!(
            Phase::Failed("hook pre_apply".to_string()).to_string(),
            "failed: hook pre_apply"
        );
        assert_eq!(Phase::InstallingDependencies.to_string(), "installing dependencies");
    }
}
