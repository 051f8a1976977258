use anyhow::Result;
use std::sync::Arc;

use super::{CommandContext, print_line};
use crate::cli::{GlobalOpts, ProfileAction, ProfileOpts};
use crate::logging::{Log as _, Logger};
use crate::store::RiceRecord;

/// Run a `profile` action.
///
/// # Errors
///
/// Returns an error if the rice or profile is unknown, or a new profile name
/// is taken.
pub fn run(global: &GlobalOpts, opts: &ProfileOpts, log: &Arc<Logger>) -> Result<()> {
    let ctx = CommandContext::init(global, log)?;
    match &opts.action {
        ProfileAction::List(arg) => {
            let store = ctx.store()?;
            for line in render_profiles(store.require(&arg.rice)?).lines() {
                print_line(line);
            }
            Ok(())
        }
        ProfileAction::Create {
            rice,
            profile,
            from,
        } => {
            if ctx.dry_run {
                log.dry_run(&format!("would create profile {rice}/{profile}"));
                return Ok(());
            }
            let _lock = ctx.lock()?;
            let mut store = ctx.store()?;
            store.create_profile(rice, profile, from.as_deref())?;
            store.save()?;
            log.info(&format!("created profile {rice}/{profile}"));
            Ok(())
        }
        ProfileAction::Switch { rice, profile } => {
            if ctx.dry_run {
                log.dry_run(&format!("would switch {rice} to profile {profile}"));
                return Ok(());
            }
            let _lock = ctx.lock()?;
            let mut store = ctx.store()?;
            store.set_active_profile(rice, profile)?;
            store.save()?;
            log.info(&format!("{rice} now uses profile {profile}"));
            if store.require(rice)?.applied {
                log.warn(&format!("re-run `rice apply {rice}` to deploy it"));
            }
            Ok(())
        }
    }
}

/// Profile names, the active one marked with `*`.
#[must_use]
pub fn render_profiles(record: &RiceRecord) -> String {
    record
        .profiles
        .iter()
        .map(|(name, profile)| {
            let mark = if *name == record.active_profile { '*' } else { ' ' };
            format!(
                "{mark} {name} ({} directories)\n",
                profile.dotfile_directories.len()
            )
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::classify::DirectoryCategory;
    use std::path::PathBuf;

    #[test]
    fn active_profile_is_marked() {
        let mut record = RiceRecord::new(PathBuf::from("/rices/nord"), None);
        record
            .active_mut()
            .dotfile_directories
            .insert("kitty".to_string(), DirectoryCategory::Config);
        record.profiles.insert("work".to_string(), Default::default());
        record.active_profile = "work".to_string();

        assert_eq!(
            render_profiles(&record),
            "  default (1 directories)\n* work (0 directories)\n"
        );
    }
}
