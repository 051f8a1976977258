use anyhow::{Context as _, Result};
use std::sync::Arc;

use super::CommandContext;
use crate::cli::{CloneOpts, GlobalOpts};
use crate::error::ConfigError;
use crate::logging::{Log, Logger};
use crate::resources::{Git2Cloner, GitCloner as _};
use crate::store::{RiceRecord, validate_name};

/// Clone a rice repository and register it.
///
/// # Errors
///
/// Returns an error if the name is invalid or taken, the destination exists,
/// or the clone fails after retries.
pub fn run(global: &GlobalOpts, opts: &CloneOpts, log: &Arc<Logger>) -> Result<()> {
    let ctx = CommandContext::init(global, log)?;
    let name = match &opts.name {
        Some(name) => name.clone(),
        None => rice_name_from_url(&opts.url)
            .with_context(|| format!("cannot derive a rice name from {}", opts.url))?,
    };
    validate_name(&name)?;
    let dest = opts
        .dest
        .clone()
        .unwrap_or_else(|| ctx.paths.repos_dir().join(&name));

    if ctx.dry_run {
        log.dry_run(&format!("would clone {} into {}", opts.url, dest.display()));
        return Ok(());
    }

    let _lock = ctx.lock()?;
    let mut store = ctx.store()?;
    if store.get(&name).is_some() {
        return Err(ConfigError::AlreadyExists(name).into());
    }
    if dest.exists() {
        anyhow::bail!("{} already exists", dest.display());
    }

    let handle: Arc<dyn Log> = log.clone();
    Git2Cloner::new(ctx.settings.retry_policy(), handle).clone_repo(&opts.url, &dest)?;
    store.upsert(&name, RiceRecord::new(dest.clone(), Some(opts.url.clone())));
    store.save()?;
    log.info(&format!("registered {name} at {}", dest.display()));
    Ok(())
}

/// Last path segment of a repository URL, without `.git`.
#[must_use]
pub fn rice_name_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim_end_matches('/');
    let segment = trimmed.rsplit(['/', ':']).next()?;
    let name = segment.strip_suffix(".git").unwrap_or(segment);
    (!name.is_empty()).then(|| name.to_string())
}
