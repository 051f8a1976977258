use anyhow::Result;
use std::fmt::Write as _;
use std::sync::Arc;

use super::{CommandContext, print_line};
use crate::cli::{GlobalOpts, ListOpts};
use crate::logging::Logger;
use crate::store::{RiceRecord, RiceStore};

/// List registered rices, or show one in detail.
///
/// # Errors
///
/// Returns an error if the store cannot be read or the named rice is unknown.
pub fn run(global: &GlobalOpts, opts: &ListOpts, log: &Arc<Logger>) -> Result<()> {
    let ctx = CommandContext::init(global, log)?;
    let store = ctx.store()?;
    let rendered = match &opts.rice {
        Some(name) => render_detail(name, store.require(name)?),
        None => render_list(&store),
    };
    for line in rendered.lines() {
        print_line(line);
    }
    Ok(())
}

/// One line per rice; `*` marks the applied one.
#[must_use]
pub fn render_list(store: &RiceStore) -> String {
    if store.records().is_empty() {
        return "no rices registered\n".to_string();
    }
    let name_width = store.names().map(str::len).max().unwrap_or_default();
    let profile_width = store
        .records()
        .values()
        .map(|r| r.active_profile.len())
        .max()
        .unwrap_or_default();

    let mut out = String::new();
    for (name, record) in store.records() {
        let mark = if record.applied { '*' } else { ' ' };
        let source = record
            .repository_url
            .clone()
            .unwrap_or_else(|| record.local_directory.display().to_string());
        let _ = writeln!(
            out,
            "{mark} {name:<name_width$}  {:<profile_width$}  {source}",
            record.active_profile
        );
    }
    out
}

/// Everything recorded about one rice.
#[must_use]
pub fn render_detail(name: &str, record: &RiceRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "name: {name}");
    let _ = writeln!(out, "directory: {}", record.local_directory.display());
    let _ = writeln!(
        out,
        "repository: {}",
        record.repository_url.as_deref().unwrap_or("none")
    );
    let _ = writeln!(out, "applied: {}", if record.applied { "yes" } else { "no" });
    let profiles: Vec<&str> = record.profiles.keys().map(String::as_str).collect();
    let _ = writeln!(
        out,
        "profile: {} (of {})",
        record.active_profile,
        profiles.join(", ")
    );
    if record.nix_config {
        out.push_str("nix: yes\n");
    }

    let Some(profile) = record.active() else {
        return out;
    };
    if !profile.dotfile_directories.is_empty() {
        out.push_str("directories:\n");
        for (rel, category) in &profile.dotfile_directories {
            let _ = writeln!(out, "  {rel} ({})", category.as_str());
        }
    }
    if !profile.dependencies.is_empty() {
        let deps: Vec<&str> = profile.dependencies.iter().map(String::as_str).collect();
        let _ = writeln!(out, "dependencies: {}", deps.join(", "));
    }
    for (phase, commands) in &profile.script_config.custom_scripts {
        let _ = writeln!(out, "{phase}: {}", commands.join("; "));
    }
    out
}
