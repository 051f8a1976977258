//! Outcome of apply and uninstall runs.
use std::fmt::Write as _;

use super::dispatch::Outcome;
use super::state::{Lifecycle, Phase};
use crate::classify::DirectoryCategory;
use crate::error::{Result, RiceError};
use crate::logging::{Log, TaskStatus};

/// A directory that could not be deployed or retracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryFailure {
    /// Relative path inside the rice.
    pub path: String,
    /// Its category.
    pub category: DirectoryCategory,
    /// Error text.
    pub message: String,
}

/// Per-directory bookkeeping shared by apply and uninstall.
#[derive(Debug, Clone, Default)]
pub struct DirectoryResults {
    /// Directories that were changed.
    pub changed: Vec<String>,
    /// Directories that already matched.
    pub unchanged: Vec<String>,
    /// Directories left alone, with the reason.
    pub skipped: Vec<(String, String)>,
    /// Directories that failed.
    pub failures: Vec<DirectoryFailure>,
}

impl DirectoryResults {
    /// Record the outcome of one directory.
    ///
    /// # Errors
    ///
    /// Backup errors are passed through: they abort the whole operation.
    pub fn record(
        &mut self,
        rel: &str,
        category: DirectoryCategory,
        outcome: Result<Outcome>,
        log: &dyn Log,
    ) -> Result<()> {
        match outcome {
            Ok(Outcome::Changed) => {
                log.record_task(rel, TaskStatus::Ok, None);
                self.changed.push(rel.to_string());
            }
            Ok(Outcome::Unchanged) => {
                log.record_task(rel, TaskStatus::Ok, Some("up to date"));
                self.unchanged.push(rel.to_string());
            }
            Ok(Outcome::Skipped(reason)) => {
                log.record_task(rel, TaskStatus::Skipped, Some(&reason));
                self.skipped.push((rel.to_string(), reason));
            }
            Err(err @ RiceError::Backup(_)) => return Err(err),
            Err(err) => {
                let message = err.to_string();
                log.error(&format!("{rel}: {message}"));
                log.record_task(rel, TaskStatus::Failed, Some(&message));
                self.failures.push(DirectoryFailure {
                    path: rel.to_string(),
                    category,
                    message,
                });
            }
        }
        Ok(())
    }

    /// Nothing was skipped and nothing failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty() && self.failures.is_empty()
    }

    fn write_lines(&self, out: &mut String, changed_label: &str) {
        let mut list = |label: &str, items: &[String]| {
            if !items.is_empty() {
                let _ = writeln!(out, "  {label}: {}", items.join(", "));
            }
        };
        list(changed_label, &self.changed);
        list("unchanged", &self.unchanged);
        for (rel, reason) in &self.skipped {
            let _ = writeln!(out, "  skipped: {rel} ({reason})");
        }
        for failure in &self.failures {
            let _ = writeln!(out, "  failed: {} ({})", failure.path, failure.message);
        }
    }
}

/// Everything an apply did, including the fatal error if there was one.
///
/// [`ApplyEngine::apply`](super::ApplyEngine::apply) always returns a
/// report; [`ApplyReport::into_result`] turns a fatal outcome into an error.
#[derive(Debug)]
pub struct ApplyReport {
    /// Rice name.
    pub rice: String,
    /// Final phase.
    pub phase: Phase,
    /// Every phase entered.
    pub history: Vec<Phase>,
    /// Per-directory results, extras included.
    pub directories: DirectoryResults,
    /// Cleared by any skipped or failed directory.
    pub applied_all: bool,
    /// Nothing was changed; the plan was only logged.
    pub dry_run: bool,
    /// Packages that were missing and got installed.
    pub packages_installed: Vec<String>,
    /// Fonts that were installed.
    pub fonts_installed: Vec<String>,
    /// Operation backup kept on disk, if any.
    pub backup_id: Option<String>,
    /// The fatal error.
    pub error: Option<RiceError>,
    /// Restoring the operation backup failed as well.
    pub rollback_error: Option<RiceError>,
}

impl ApplyReport {
    pub(super) fn new(rice: &str) -> Self {
        Self {
            rice: rice.to_string(),
            phase: Phase::Discovering,
            history: Vec::new(),
            directories: DirectoryResults::default(),
            applied_all: true,
            dry_run: false,
            packages_installed: Vec::new(),
            fonts_installed: Vec::new(),
            backup_id: None,
            error: None,
            rollback_error: None,
        }
    }

    /// A report for an apply that never started.
    pub(super) fn aborted(rice: &str, err: RiceError) -> Self {
        let mut lifecycle = Lifecycle::new();
        lifecycle.fail(err.to_string());
        let mut report = Self::new(rice);
        report.finish(&lifecycle);
        report.applied_all = false;
        report.error = Some(err);
        report
    }

    pub(super) fn finish(&mut self, lifecycle: &Lifecycle) {
        self.phase = lifecycle.current().clone();
        self.history = lifecycle.history().to_vec();
    }

    /// Committed (or previewed) without a fatal error.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
            && self.rollback_error.is_none()
            && (self.dry_run || self.phase == Phase::Committed)
    }

    /// The rollback error, then the fatal error, else the report itself.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the apply.
    pub fn into_result(mut self) -> Result<Self> {
        if let Some(err) = self.rollback_error.take() {
            return Err(err);
        }
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        Ok(self)
    }

    /// Plain-text summary for the terminal.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "rice {}: {}", self.rice, self.phase);
        self.directories.write_lines(&mut out, "deployed");
        if !self.fonts_installed.is_empty() {
            let _ = writeln!(out, "  fonts: {}", self.fonts_installed.join(", "));
        }
        if !self.packages_installed.is_empty() {
            let _ = writeln!(out, "  packages: {}", self.packages_installed.join(", "));
        }
        if let Some(id) = &self.backup_id {
            let _ = writeln!(out, "  backup: {id}");
        }
        if let Some(err) = &self.rollback_error {
            let _ = writeln!(out, "  rollback: {err}");
        }
        out
    }
}

/// Everything an uninstall did.
#[derive(Debug, Clone)]
pub struct UninstallReport {
    /// Rice name.
    pub rice: String,
    /// Per-directory results.
    pub directories: DirectoryResults,
    /// Operation backup holding removed copies, if any.
    pub backup_id: Option<String>,
}

impl UninstallReport {
    pub(super) fn new(rice: &str) -> Self {
        Self {
            rice: rice.to_string(),
            directories: DirectoryResults::default(),
            backup_id: None,
        }
    }

    /// No directory failed. Skips (missing targets, modified copies) are
    /// not failures.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.directories.failures.is_empty()
    }

    /// Plain-text summary for the terminal.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let status = if self.succeeded() { "uninstalled" } else { "incomplete" };
        let _ = writeln!(out, "rice {}: {status}", self.rice);
        self.directories.write_lines(&mut out, "removed");
        if let Some(id) = &self.backup_id {
            let _ = writeln!(out, "  backup: {id}");
        }
        out
    }
}
