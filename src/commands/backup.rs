use anyhow::{Context as _, Result};
use std::fmt::Write as _;
use std::sync::Arc;

use super::{CommandContext, print_line};
use crate::backup::OperationBackup;
use crate::cli::{BackupAction, BackupOpts, GlobalOpts};
use crate::logging::{Log as _, Logger};

/// Run a `backup` action, or take a named snapshot of a rice.
///
/// # Errors
///
/// Returns an error if the backup area cannot be read or written, or the
/// requested operation or rice is unknown.
pub fn run(global: &GlobalOpts, opts: &BackupOpts, log: &Arc<Logger>) -> Result<()> {
    let ctx = CommandContext::init(global, log)?;
    match (&opts.action, &opts.name, &opts.rice) {
        (Some(BackupAction::List), _, _) => {
            let ops = ctx.backup_manager().list_operations()?;
            for line in render_operations(&ops).lines() {
                print_line(line);
            }
            Ok(())
        }
        (Some(BackupAction::Rollback { id }), _, _) => {
            if ctx.dry_run {
                log.dry_run(&format!("would roll back {id}"));
                return Ok(());
            }
            let _lock = ctx.lock()?;
            ctx.backup_manager()
                .rollback(id)
                .with_context(|| format!("rolling back {id}"))?;
            log.info(&format!("rolled back {id}"));
            Ok(())
        }
        (Some(BackupAction::Cleanup { max_age_days }), _, _) => {
            let days = max_age_days.unwrap_or(ctx.settings.backup.max_age_days);
            if ctx.dry_run {
                log.dry_run(&format!("would remove backups older than {days} days"));
                return Ok(());
            }
            let _lock = ctx.lock()?;
            let removed = ctx.backup_manager().cleanup_old(days)?;
            log.info(&format!("removed {} backup(s)", removed.len()));
            Ok(())
        }
        (None, Some(name), Some(rice)) => snapshot_rice(&ctx, name, rice),
        _ => anyhow::bail!("expected a backup action, or a snapshot name and a rice"),
    }
}

/// Snapshot the live tree with `rice`'s recorded dependencies.
fn snapshot_rice(ctx: &CommandContext, name: &str, rice: &str) -> Result<()> {
    if ctx.dry_run {
        ctx.log
            .dry_run(&format!("would create snapshot {name} for {rice}"));
        return Ok(());
    }
    let _lock = ctx.lock()?;
    let store = ctx.store()?;
    let packages = store
        .require(rice)?
        .active()
        .map(|p| p.dependencies.clone())
        .unwrap_or_default();
    ctx.backup_manager()
        .create_snapshot(name, &format!("backup of {rice}"), packages, Some(rice))
        .with_context(|| format!("creating snapshot {name}"))?;
    Ok(())
}

/// One line per operation backup, oldest first.
#[must_use]
pub fn render_operations(ops: &[OperationBackup]) -> String {
    if ops.is_empty() {
        return "no backups\n".to_string();
    }
    let width = ops.iter().map(|o| o.id.len()).max().unwrap_or_default();
    let mut out = String::new();
    for op in ops {
        let _ = writeln!(
            out,
            "{:<width$}  {}  {} captured, {} created",
            op.id,
            op.timestamp.format("%Y-%m-%d %H:%M"),
            op.created_files.len(),
            op.created_paths.len()
        );
    }
    out
}
