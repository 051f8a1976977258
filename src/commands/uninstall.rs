use anyhow::{Context as _, Result};
use std::sync::Arc;

use super::CommandContext;
use crate::cli::{GlobalOpts, RiceArg};
use crate::logging::Logger;

/// Run the uninstall command.
///
/// # Errors
///
/// Returns an error if the rice is unknown, a hook failed, or any directory
/// could not be retracted.
pub fn run(global: &GlobalOpts, opts: &RiceArg, log: &Arc<Logger>) -> Result<()> {
    let ctx = CommandContext::init(global, log)?;

    if ctx.dry_run {
        let store = ctx.store()?;
        let record = store.require(&opts.rice)?;
        let directories = record
            .active()
            .map(|p| p.dotfile_directories.len())
            .unwrap_or_default();
        log.dry_run(&format!(
            "would uninstall {} ({directories} directories)",
            opts.rice
        ));
        return Ok(());
    }

    let _lock = ctx.lock()?;
    let mut engine = ctx.engine()?;
    let report = engine
        .uninstall(&opts.rice)
        .with_context(|| format!("uninstalling {}", opts.rice))?;

    for line in report.summary().lines() {
        log.info(line);
    }
    log.print_summary();

    if !report.succeeded() {
        anyhow::bail!(
            "{} was not fully uninstalled ({} failed)",
            opts.rice,
            report.directories.failures.len()
        );
    }
    Ok(())
}
