//! `export` and `import` of single rice records.
use anyhow::{Context as _, Result};
use std::sync::Arc;

use super::{CommandContext, print_line};
use crate::cli::{ExportOpts, GlobalOpts, ImportOpts};
use crate::logging::{Log as _, Logger};

/// Write a rice's record as JSON to `--output` or stdout.
///
/// # Errors
///
/// Returns an error if the rice is unknown or the file cannot be written.
pub fn export(global: &GlobalOpts, opts: &ExportOpts, log: &Arc<Logger>) -> Result<()> {
    let ctx = CommandContext::init(global, log)?;
    let json = ctx.store()?.export(&opts.rice)?;
    match &opts.output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("writing {}", path.display()))?;
            log.info(&format!("exported {} to {}", opts.rice, path.display()));
        }
        None => print_line(&json),
    }
    Ok(())
}

/// Register a record previously written by `export`.
///
/// # Errors
///
/// Returns an error if the file is unreadable or malformed, or the name is
/// taken.
pub fn import(global: &GlobalOpts, opts: &ImportOpts, log: &Arc<Logger>) -> Result<()> {
    let ctx = CommandContext::init(global, log)?;
    let json = std::fs::read_to_string(&opts.file)
        .with_context(|| format!("reading {}", opts.file.display()))?;
    if ctx.dry_run {
        log.dry_run(&format!("would import {}", opts.file.display()));
        return Ok(());
    }

    let _lock = ctx.lock()?;
    let mut store = ctx.store()?;
    let name = store.import(&json, opts.name.as_deref())?;
    store.save()?;
    log.info(&format!("imported {name}"));
    if let Some(record) = store.get(&name)
        && !record.local_directory.is_dir()
    {
        log.warn(&format!(
            "{} does not exist on this machine; clone the rice there before applying",
            record.local_directory.display()
        ));
    }
    Ok(())
}
