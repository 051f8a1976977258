use anyhow::{Context as _, Result};
use std::fmt::Write as _;
use std::sync::Arc;

use super::{CommandContext, print_line};
use crate::backup::Snapshot;
use crate::cli::{GlobalOpts, SnapshotAction, SnapshotOpts};
use crate::logging::{Log as _, Logger};

/// Run a `snapshot` action.
///
/// # Errors
///
/// Returns an error if the snapshot area cannot be read or written, the
/// snapshot is unknown or taken, or the package manager fails.
pub fn run(global: &GlobalOpts, opts: &SnapshotOpts, log: &Arc<Logger>) -> Result<()> {
    let ctx = CommandContext::init(global, log)?;
    match &opts.action {
        SnapshotAction::List => {
            let snapshots = ctx.backup_manager().list_snapshots()?;
            for line in render_snapshots(&snapshots).lines() {
                print_line(line);
            }
            Ok(())
        }
        SnapshotAction::Create {
            name,
            description,
            rice,
        } => {
            if ctx.dry_run {
                log.dry_run(&format!("would create snapshot {name}"));
                return Ok(());
            }
            let _lock = ctx.lock()?;
            let packages = match rice {
                Some(rice) => ctx
                    .store()?
                    .require(rice)?
                    .active()
                    .map(|p| p.dependencies.clone())
                    .unwrap_or_default(),
                None => ctx
                    .installer()
                    .installed_packages()
                    .context("listing installed packages")?,
            };
            ctx.backup_manager()
                .create_snapshot(name, description, packages, rice.as_deref())
                .with_context(|| format!("creating snapshot {name}"))?;
            Ok(())
        }
        SnapshotAction::Restore { name, keep_extras } => {
            if ctx.dry_run {
                log.dry_run(&format!("would restore snapshot {name}"));
                return Ok(());
            }
            let _lock = ctx.lock()?;
            let installer = ctx.installer();
            let outcome = ctx
                .backup_manager()
                .restore_snapshot(name, installer.as_ref(), *keep_extras)
                .with_context(|| format!("restoring snapshot {name}"))?;
            if !outcome.installed.is_empty() {
                log.info(&format!("installed: {}", outcome.installed.join(", ")));
            }
            if outcome.removed_extras {
                log.info(&format!("removed: {}", outcome.extras.join(", ")));
            } else if !outcome.extras.is_empty() {
                log.info(&format!("kept: {}", outcome.extras.join(", ")));
            }
            Ok(())
        }
        SnapshotAction::Delete { name } => {
            if ctx.dry_run {
                log.dry_run(&format!("would delete snapshot {name}"));
                return Ok(());
            }
            let _lock = ctx.lock()?;
            ctx.backup_manager().delete_snapshot(name)?;
            Ok(())
        }
    }
}

/// One line per snapshot, oldest first.
#[must_use]
pub fn render_snapshots(snapshots: &[Snapshot]) -> String {
    if snapshots.is_empty() {
        return "no snapshots\n".to_string();
    }
    let width = snapshots.iter().map(|s| s.name.len()).max().unwrap_or_default();
    let mut out = String::new();
    for snapshot in snapshots {
        let _ = write!(
            out,
            "{:<width$}  {}  {} packages",
            snapshot.name,
            snapshot.created_at.format("%Y-%m-%d %H:%M"),
            snapshot.packages.len()
        );
        if let Some(rice) = &snapshot.rice {
            let _ = write!(out, "  [{rice}]");
        }
        if !snapshot.description.is_empty() {
            let _ = write!(out, "  {}", snapshot.description);
        }
        out.push('\n');
    }
    out
}
