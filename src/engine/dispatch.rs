//! Per-category deployment of classified directories.
use std::path::{Path, PathBuf};

use crate::backup::BackupManager;
use crate::classify::DirectoryCategory;
use crate::config::Paths;
use crate::error::{Result, RiceError};
use crate::logging::Log;
use crate::resources::fs::{
    copy_tree, ensure_parent_dir, is_real_dir, links_into, path_present, remove_path,
    sorted_entries, trees_identical,
};
use crate::resources::{LinkRequest, Linker};

/// What happened to one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Something was created, replaced or removed.
    Changed,
    /// The live state already matched.
    Unchanged,
    /// Deliberately left alone; the reason is logged.
    Skipped(String),
}

/// Deploys and retracts single directories of one rice checkout.
pub struct Dispatcher<'a> {
    /// Live-filesystem locations.
    pub paths: &'a Paths,
    /// Rice checkout.
    pub root: &'a Path,
    /// Linker for config, cache and local trees.
    pub linker: &'a dyn Linker,
    /// Extra linker arguments.
    pub link_options: &'a [String],
    /// Replaces the configuration home as link destination root.
    pub destination: Option<&'a Path>,
    /// Log handle.
    pub log: &'a dyn Log,
}

/// Last path component of a relative path.
pub fn base_name(rel: &str) -> &str {
    rel.trim_end_matches('/').rsplit('/').next().unwrap_or(rel)
}

impl Dispatcher<'_> {
    /// Where `rel` of `category` lands on the live filesystem. `None` for Nix.
    #[must_use]
    pub fn target(&self, rel: &str, category: DirectoryCategory) -> Option<PathBuf> {
        let name = base_name(rel);
        let link_root = |default: PathBuf| self.destination.map_or(default, Path::to_path_buf);
        match category {
            DirectoryCategory::Config => Some(link_root(self.paths.config_home.clone()).join(name)),
            DirectoryCategory::Cache => Some(link_root(self.paths.cache_home()).join(name)),
            DirectoryCategory::Local => Some(self.paths.local_home()),
            DirectoryCategory::Asset | DirectoryCategory::Theme | DirectoryCategory::Wallpaper => {
                Some(self.paths.data_home.join(name))
            }
            DirectoryCategory::Script | DirectoryCategory::Other => Some(self.paths.home.join(name)),
            DirectoryCategory::Nix => None,
        }
    }

    fn request(&self, rel: &str, target: PathBuf) -> LinkRequest {
        let source = self.root.join(rel);
        LinkRequest {
            source_dir: source
                .parent()
                .map_or_else(|| self.root.to_path_buf(), Path::to_path_buf),
            item: base_name(rel).to_string(),
            target,
            options: self.link_options.to_vec(),
        }
    }

    /// Deploy `rel` according to `category`.
    ///
    /// # Errors
    ///
    /// Returns [`RiceError::Backup`] when a colliding path cannot be
    /// captured or put back, which callers treat as fatal; any other error
    /// concerns this directory only, and whatever the failed link replaced is
    /// restored first.
    pub fn deploy(
        &self,
        rel: &str,
        category: DirectoryCategory,
        backup: &mut BackupManager,
    ) -> Result<Outcome> {
        let source = self.root.join(rel);
        if !path_present(&source) {
            return Ok(self.skip(format!("{} does not exist", source.display())));
        }
        let Some(target) = self.target(rel, category) else {
            return Ok(self.skip(format!("{rel}: handled by the Nix deployer")));
        };
        match category {
            c if c.is_linked() => self.link(rel, &source, target, backup),
            c if c.is_data() => copy_replacing(&source, &target, backup),
            _ => self.copy_refusing(&source, &target, backup),
        }
    }

    /// Undo [`Dispatcher::deploy`] for `rel`.
    ///
    /// The links are captured in `backup` before the linker removes them.
    /// Copied trees are only removed while they still match the checkout;
    /// the removed copy is captured first.
    ///
    /// # Errors
    ///
    /// Returns an error if the linker or a removal fails.
    pub fn retract(
        &self,
        rel: &str,
        category: DirectoryCategory,
        backup: &mut BackupManager,
    ) -> Result<Outcome> {
        let Some(target) = self.target(rel, category) else {
            return Ok(self.skip(format!("{rel}: Nix configurations are not retracted")));
        };
        if !path_present(&target) {
            return Ok(self.skip(format!("{} does not exist", target.display())));
        }
        if category.is_linked() {
            return self.unlink(rel, target, backup);
        }
        self.remove_copy(&self.root.join(rel), &target, backup)
    }

    /// Copy an opaque tree (`Extras/` entries, custom extras) to `target`,
    /// refusing to overwrite anything that differs.
    ///
    /// # Errors
    ///
    /// Returns an error if copying fails or the created path cannot be
    /// recorded.
    pub fn copy_extra(
        &self,
        source: &Path,
        target: &Path,
        backup: &mut BackupManager,
    ) -> Result<Outcome> {
        if !path_present(source) {
            return Ok(self.skip(format!("{} does not exist", source.display())));
        }
        self.copy_refusing(source, target, backup)
    }

    /// Remove an extras copy that still matches `source`.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy cannot be captured or removed.
    pub fn remove_extra(
        &self,
        source: &Path,
        target: &Path,
        backup: &mut BackupManager,
    ) -> Result<Outcome> {
        if !path_present(target) {
            return Ok(Outcome::Unchanged);
        }
        self.remove_copy(source, target, backup)
    }

    fn skip(&self, reason: String) -> Outcome {
        self.log.warn(&reason);
        Outcome::Skipped(reason)
    }

    fn link(
        &self,
        rel: &str,
        source: &Path,
        target: PathBuf,
        backup: &mut BackupManager,
    ) -> Result<Outcome> {
        let target_existed = path_present(&target);
        if target_existed && links_into(&target, source) {
            return Ok(Outcome::Unchanged);
        }
        let mut cleared = Vec::new();
        let mut fresh = Vec::new();
        let creates_target = if is_real_dir(&target) {
            clear_collisions(source, &target, backup, &mut cleared, &mut fresh)?;
            if cleared.is_empty() && fresh.is_empty() {
                return Ok(Outcome::Unchanged);
            }
            false
        } else {
            if target_existed {
                // A file or a foreign link where the directory goes.
                clear(&target, backup)?;
                cleared.push(target.clone());
            }
            true
        };

        let request = self.request(rel, target);
        if let Err(err) = self.linker.link(&request) {
            let leftovers = if creates_target {
                vec![request.target.clone()]
            } else {
                fresh
            };
            for path in &leftovers {
                if let Err(e) = remove_path(path) {
                    self.log.warn(&format!("{e:#}"));
                }
            }
            backup.restore(&cleared)?;
            return Err(err.into());
        }
        if creates_target {
            backup.track_created(&request.target)?;
        } else {
            for live in &fresh {
                backup.track_created(live)?;
            }
        }
        self.log
            .debug(&format!("linked {rel} into {}", request.target.display()));
        Ok(Outcome::Changed)
    }

    fn unlink(
        &self,
        rel: &str,
        target: PathBuf,
        backup: &mut BackupManager,
    ) -> Result<Outcome> {
        let links = linked_entries(&self.root.join(rel), &target)?;
        for link in &links {
            backup.backup_file(link)?;
        }
        if let Err(err) = self.linker.unlink(&self.request(rel, target)) {
            backup.restore(&links)?;
            return Err(err.into());
        }
        Ok(Outcome::Changed)
    }

    fn copy_refusing(
        &self,
        source: &Path,
        target: &Path,
        backup: &mut BackupManager,
    ) -> Result<Outcome> {
        if path_present(target) {
            if trees_identical(source, target) {
                return Ok(Outcome::Unchanged);
            }
            return Ok(self.skip(format!("{} already exists, not overwriting", target.display())));
        }
        copy_new(source, target)?;
        backup.track_created(target)?;
        Ok(Outcome::Changed)
    }

    fn remove_copy(
        &self,
        source: &Path,
        target: &Path,
        backup: &mut BackupManager,
    ) -> Result<Outcome> {
        if !trees_identical(source, target) {
            return Ok(self.skip(format!(
                "{} differs from the rice, leaving it in place",
                target.display()
            )));
        }
        backup.backup_file(target)?;
        remove_path(target).map_err(|e| RiceError::file(target, format!("{e:#}")))?;
        Ok(Outcome::Changed)
    }
}

fn clear(live: &Path, backup: &mut BackupManager) -> Result<()> {
    backup.backup_file(live)?;
    remove_path(live).map_err(|e| RiceError::file(live, format!("{e:#}")))
}

/// Capture and remove what under `target` would block linking the entries
/// of `source`. Real directories on both sides are descended into, never
/// replaced; entries with nothing in the way go to `fresh`.
fn clear_collisions(
    source: &Path,
    target: &Path,
    backup: &mut BackupManager,
    cleared: &mut Vec<PathBuf>,
    fresh: &mut Vec<PathBuf>,
) -> Result<()> {
    for entry in sorted_entries(source).map_err(|e| RiceError::file(source, format!("{e:#}")))? {
        let Some(name) = entry.file_name() else {
            continue;
        };
        if name == ".git" {
            continue;
        }
        let live = target.join(name);
        if links_into(&live, &entry) {
            continue;
        }
        if is_real_dir(&live) && is_real_dir(&entry) {
            clear_collisions(&entry, &live, backup, cleared, fresh)?;
        } else if path_present(&live) {
            clear(&live, backup)?;
            cleared.push(live);
        } else {
            fresh.push(live);
        }
    }
    Ok(())
}

/// Links under `target` that point at the matching entry of `source`,
/// following real directories on both sides.
fn linked_entries(source: &Path, target: &Path) -> Result<Vec<PathBuf>> {
    if links_into(target, source) {
        return Ok(vec![target.to_path_buf()]);
    }
    let mut found = Vec::new();
    for entry in sorted_entries(source).map_err(|e| RiceError::file(source, format!("{e:#}")))? {
        let Some(name) = entry.file_name() else {
            continue;
        };
        if name == ".git" {
            continue;
        }
        let live = target.join(name);
        if links_into(&live, &entry) {
            found.push(live);
        } else if is_real_dir(&live) && is_real_dir(&entry) {
            found.extend(linked_entries(&entry, &live)?);
        }
    }
    Ok(found)
}

/// Copy `source` over `target`, capturing a differing `target` first.
fn copy_replacing(source: &Path, target: &Path, backup: &mut BackupManager) -> Result<Outcome> {
    let existed = path_present(target);
    if existed {
        if trees_identical(source, target) {
            return Ok(Outcome::Unchanged);
        }
        backup.backup_file(target)?;
        remove_path(target).map_err(|e| RiceError::file(target, format!("{e:#}")))?;
    }
    copy_new(source, target)?;
    if !existed {
        backup.track_created(target)?;
    }
    Ok(Outcome::Changed)
}

fn copy_new(source: &Path, target: &Path) -> Result<()> {
    ensure_parent_dir(target)
        .and_then(|()| copy_tree(source, target, true))
        .map_err(|e| RiceError::file(target, format!("{e:#}")))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::CollaboratorError;
    use crate::logging::CaptureLog;
    use crate::resources::fs::create_symlink;
    use crate::resources::{MockLinker, SymlinkLinker};
    use std::fs;
    use std::sync::Arc;

    struct Env {
        _home: tempfile::TempDir,
        paths: Paths,
        root: PathBuf,
        log: Arc<CaptureLog>,
    }

    fn env() -> Env {
        let home = tempfile::tempdir().unwrap();
        let paths = Paths::under(home.path());
        let root = home.path().join("rices/gruvbox");
        fs::create_dir_all(root.join("nvim")).unwrap();
        fs::write(root.join("nvim/init.lua"), "-- rice").unwrap();
        fs::create_dir_all(root.join("wallpapers")).unwrap();
        fs::write(root.join("wallpapers/bg.png"), "png").unwrap();
        fs::create_dir_all(root.join("scripts")).unwrap();
        fs::write(root.join("scripts/launch.sh"), "#!/bin/sh").unwrap();
        Env {
            _home: home,
            paths,
            root,
            log: Arc::new(CaptureLog::default()),
        }
    }

    fn manager(env: &Env) -> BackupManager {
        let mut m = BackupManager::new(&env.paths, env.log.clone());
        m.start_operation("apply-gruvbox").unwrap();
        m
    }

    fn dispatcher<'a>(env: &'a Env, linker: &'a dyn Linker) -> Dispatcher<'a> {
        Dispatcher {
            paths: &env.paths,
            root: &env.root,
            linker,
            link_options: &[],
            destination: None,
            log: env.log.as_ref(),
        }
    }

    // -----------------------------------------------------------------------
    // Targets
    // -----------------------------------------------------------------------

    #[test]
    fn targets_follow_category() {
        let env = env();
        let linker = MockLinker::new();
        let d = dispatcher(&env, &linker);
        let home = &env.paths.home;
        assert_eq!(
            d.target(".config/kitty", DirectoryCategory::Config).unwrap(),
            home.join(".config/kitty")
        );
        assert_eq!(
            d.target("wallpapers", DirectoryCategory::Asset).unwrap(),
            home.join(".local/share/wallpapers")
        );
        assert_eq!(
            d.target("scripts", DirectoryCategory::Script).unwrap(),
            home.join("scripts")
        );
        assert_eq!(
            d.target(".local", DirectoryCategory::Local).unwrap(),
            home.join(".local")
        );
        assert!(d.target("nixos", DirectoryCategory::Nix).is_none());
    }

    #[test]
    fn destination_override_moves_link_targets_only() {
        let env = env();
        let linker = MockLinker::new();
        let custom = env.paths.home.join("alt");
        let mut d = dispatcher(&env, &linker);
        d.destination = Some(&custom);
        assert_eq!(
            d.target("nvim", DirectoryCategory::Config).unwrap(),
            custom.join("nvim")
        );
        assert_eq!(
            d.target("wallpapers", DirectoryCategory::Asset).unwrap(),
            env.paths.data_home.join("wallpapers")
        );
    }

    // -----------------------------------------------------------------------
    // Linking
    // -----------------------------------------------------------------------

    #[test]
    fn link_request_points_at_checkout() {
        let env = env();
        let mut linker = MockLinker::new();
        let root = env.root.clone();
        let target = env.paths.config_home.join("nvim");
        linker
            .expect_link()
            .withf(move |r| r.source_dir == root && r.item == "nvim" && r.target == target)
            .times(1)
            .returning(|_| Ok(()));
        let mut backup = manager(&env);
        let outcome = dispatcher(&env, &linker)
            .deploy("nvim", DirectoryCategory::Config, &mut backup)
            .unwrap();
        assert_eq!(outcome, Outcome::Changed);
        assert_eq!(
            backup.active().unwrap().created_paths,
            vec![env.paths.config_home.join("nvim")]
        );
    }

    #[test]
    fn colliding_entry_is_captured_before_linking() {
        let env = env();
        let live = env.paths.config_home.join("nvim");
        fs::create_dir_all(&live).unwrap();
        fs::write(live.join("init.lua"), "-- mine").unwrap();
        fs::write(live.join("notes.md"), "keep").unwrap();

        let linker = SymlinkLinker::new(env.log.clone());
        let mut backup = manager(&env);
        let outcome = dispatcher(&env, &linker)
            .deploy("nvim", DirectoryCategory::Config, &mut backup)
            .unwrap();

        assert_eq!(outcome, Outcome::Changed);
        assert!(links_into(&live.join("init.lua"), &env.root.join("nvim")));
        assert_eq!(fs::read_to_string(live.join("notes.md")).unwrap(), "keep");
        let op = backup.active().unwrap();
        assert_eq!(op.created_files.len(), 1, "only the colliding entry is captured");
        assert!(op.created_files.contains_key(&live.join("init.lua")));
    }

    #[test]
    fn already_linked_directory_is_unchanged() {
        let env = env();
        let linker = SymlinkLinker::new(env.log.clone());
        let mut backup = manager(&env);
        let d = dispatcher(&env, &linker);
        d.deploy("nvim", DirectoryCategory::Config, &mut backup).unwrap();

        let mut second = BackupManager::new(&env.paths, env.log.clone());
        let id = backup.active().unwrap().id.clone();
        backup.finish(&id).unwrap();
        second.start_operation("again").unwrap();
        let outcome = d
            .deploy("nvim", DirectoryCategory::Config, &mut second)
            .unwrap();
        assert_eq!(outcome, Outcome::Unchanged);
        assert!(second.active().unwrap().is_empty());
    }

    #[test]
    fn foreign_symlink_target_is_replaced() {
        let env = env();
        let elsewhere = env.paths.home.join("old-rice/nvim");
        fs::create_dir_all(&elsewhere).unwrap();
        fs::create_dir_all(&env.paths.config_home).unwrap();
        let live = env.paths.config_home.join("nvim");
        create_symlink(&elsewhere, &live).unwrap();

        let linker = SymlinkLinker::new(env.log.clone());
        let mut backup = manager(&env);
        dispatcher(&env, &linker)
            .deploy("nvim", DirectoryCategory::Config, &mut backup)
            .unwrap();
        assert!(!live.is_symlink(), "the foreign link is gone");
        assert!(links_into(&live.join("init.lua"), &env.root));
        assert!(backup.active().unwrap().created_files.contains_key(&live));
    }

    #[cfg(unix)]
    #[test]
    fn local_tree_merges_into_existing_data_home() {
        let env = env();
        let applications = env.root.join(".local/share/applications");
        fs::create_dir_all(&applications).unwrap();
        fs::write(applications.join("rice.desktop"), "[Desktop Entry]").unwrap();
        let notes = env.paths.data_home.join("important/notes.txt");
        fs::create_dir_all(notes.parent().unwrap()).unwrap();
        fs::write(&notes, "keep me").unwrap();

        let linker = SymlinkLinker::new(env.log.clone());
        let mut backup = manager(&env);
        let outcome = dispatcher(&env, &linker)
            .deploy(".local", DirectoryCategory::Local, &mut backup)
            .unwrap();

        assert_eq!(outcome, Outcome::Changed);
        assert!(!env.paths.local_home().is_symlink());
        assert!(!env.paths.data_home.is_symlink());
        assert_eq!(fs::read_to_string(&notes).unwrap(), "keep me");
        let live = env.paths.data_home.join("applications");
        assert!(links_into(&live, &applications));
        let op = backup.active().unwrap();
        assert!(op.created_files.is_empty(), "nothing was in the way");
        assert_eq!(op.created_paths, vec![live]);
    }

    #[test]
    fn failed_link_puts_cleared_entries_back() {
        let env = env();
        fs::write(env.root.join("nvim/extra.lua"), "-- extra").unwrap();
        let live = env.paths.config_home.join("nvim");
        fs::create_dir_all(&live).unwrap();
        fs::write(live.join("init.lua"), "-- mine").unwrap();

        let mut linker = MockLinker::new();
        linker.expect_link().times(1).returning(|r| {
            // Half-linked before giving up.
            fs::write(r.target.join("extra.lua"), "partial").unwrap();
            Err(CollaboratorError::Link {
                item: r.item.clone(),
                message: "conflict".to_string(),
            })
        });
        let mut backup = manager(&env);
        let err = dispatcher(&env, &linker)
            .deploy("nvim", DirectoryCategory::Config, &mut backup)
            .unwrap_err();

        assert!(matches!(err, RiceError::Collaborator(_)), "{err}");
        assert_eq!(fs::read_to_string(live.join("init.lua")).unwrap(), "-- mine");
        assert!(!path_present(&live.join("extra.lua")));
        assert!(backup.active().unwrap().created_paths.is_empty());
    }

    #[test]
    fn failed_link_removes_the_created_target() {
        let env = env();
        let live = env.paths.config_home.join("nvim");
        let mut linker = MockLinker::new();
        linker.expect_link().times(1).returning(|r| {
            fs::create_dir_all(&r.target).unwrap();
            Err(CollaboratorError::Link {
                item: r.item.clone(),
                message: "conflict".to_string(),
            })
        });
        let mut backup = manager(&env);
        dispatcher(&env, &linker)
            .deploy("nvim", DirectoryCategory::Config, &mut backup)
            .unwrap_err();
        assert!(!path_present(&live));
    }

    #[test]
    fn missing_source_is_skipped() {
        let env = env();
        let linker = MockLinker::new();
        let mut backup = manager(&env);
        let outcome = dispatcher(&env, &linker)
            .deploy("ghost", DirectoryCategory::Config, &mut backup)
            .unwrap();
        assert!(matches!(outcome, Outcome::Skipped(_)));
        assert_eq!(env.log.warnings().len(), 1);
    }

    // -----------------------------------------------------------------------
    // Copying
    // -----------------------------------------------------------------------

    #[test]
    fn data_copy_replaces_differing_tree_after_backup() {
        let env = env();
        let live = env.paths.data_home.join("wallpapers");
        fs::create_dir_all(&live).unwrap();
        fs::write(live.join("bg.png"), "old").unwrap();

        let linker = MockLinker::new();
        let mut backup = manager(&env);
        let d = dispatcher(&env, &linker);
        let outcome = d
            .deploy("wallpapers", DirectoryCategory::Asset, &mut backup)
            .unwrap();
        assert_eq!(outcome, Outcome::Changed);
        assert_eq!(fs::read_to_string(live.join("bg.png")).unwrap(), "png");
        assert!(backup.active().unwrap().created_files.contains_key(&live));

        let again = d
            .deploy("wallpapers", DirectoryCategory::Asset, &mut backup)
            .unwrap();
        assert_eq!(again, Outcome::Unchanged);
    }

    #[test]
    fn opaque_copy_refuses_to_overwrite() {
        let env = env();
        let live = env.paths.home.join("scripts");
        fs::create_dir_all(&live).unwrap();
        fs::write(live.join("launch.sh"), "mine").unwrap();

        let linker = MockLinker::new();
        let mut backup = manager(&env);
        let outcome = dispatcher(&env, &linker)
            .deploy("scripts", DirectoryCategory::Script, &mut backup)
            .unwrap();
        assert!(matches!(outcome, Outcome::Skipped(ref r) if r.contains("not overwriting")));
        assert_eq!(fs::read_to_string(live.join("launch.sh")).unwrap(), "mine");
        assert!(backup.active().unwrap().is_empty());
    }

    #[test]
    fn opaque_copy_creates_and_tracks() {
        let env = env();
        let linker = MockLinker::new();
        let mut backup = manager(&env);
        dispatcher(&env, &linker)
            .deploy("scripts", DirectoryCategory::Script, &mut backup)
            .unwrap();
        let live = env.paths.home.join("scripts");
        assert!(live.join("launch.sh").exists());
        assert_eq!(backup.active().unwrap().created_paths, vec![live]);
    }

    // -----------------------------------------------------------------------
    // Retracting
    // -----------------------------------------------------------------------

    #[test]
    fn retract_unlinks_existing_config() {
        let env = env();
        fs::create_dir_all(env.paths.config_home.join("nvim")).unwrap();
        let mut linker = MockLinker::new();
        linker
            .expect_unlink()
            .withf(|r| r.item == "nvim")
            .times(1)
            .returning(|_| Ok(()));
        let mut backup = manager(&env);
        let outcome = dispatcher(&env, &linker)
            .retract("nvim", DirectoryCategory::Config, &mut backup)
            .unwrap();
        assert_eq!(outcome, Outcome::Changed);
    }

    #[cfg(unix)]
    #[test]
    fn retract_captures_links_so_rollback_relinks() {
        let env = env();
        let linker = SymlinkLinker::new(env.log.clone());
        let d = dispatcher(&env, &linker);
        let mut first = manager(&env);
        d.deploy("nvim", DirectoryCategory::Config, &mut first).unwrap();
        let id = first.active().unwrap().id.clone();
        first.finish(&id).unwrap();

        let mut backup = BackupManager::new(&env.paths, env.log.clone());
        backup.start_operation("uninstall-gruvbox").unwrap();
        let live = env.paths.config_home.join("nvim/init.lua");
        d.retract("nvim", DirectoryCategory::Config, &mut backup)
            .unwrap();
        assert!(!path_present(&live));
        assert!(backup.active().unwrap().created_files.contains_key(&live));

        let id = backup.active().unwrap().id.clone();
        backup.rollback(&id).unwrap();
        assert!(links_into(&live, &env.root.join("nvim")));
    }

    #[cfg(unix)]
    #[test]
    fn failed_unlink_puts_links_back() {
        let env = env();
        let live = env.paths.config_home.join("nvim");
        fs::create_dir_all(&live).unwrap();
        create_symlink(&env.root.join("nvim/init.lua"), &live.join("init.lua")).unwrap();
        let mut linker = MockLinker::new();
        linker.expect_unlink().times(1).returning(|r| {
            fs::remove_file(r.target.join("init.lua")).unwrap();
            Err(CollaboratorError::Link {
                item: r.item.clone(),
                message: "busy".to_string(),
            })
        });
        let mut backup = manager(&env);
        dispatcher(&env, &linker)
            .retract("nvim", DirectoryCategory::Config, &mut backup)
            .unwrap_err();
        assert!(links_into(&live.join("init.lua"), &env.root.join("nvim")));
    }

    #[test]
    fn retract_missing_config_target_warns() {
        let env = env();
        let linker = MockLinker::new();
        let mut backup = manager(&env);
        let outcome = dispatcher(&env, &linker)
            .retract("nvim", DirectoryCategory::Config, &mut backup)
            .unwrap();
        assert!(matches!(outcome, Outcome::Skipped(_)));
        assert_eq!(env.log.warnings().len(), 1);
    }

    #[test]
    fn retract_keeps_modified_copies() {
        let env = env();
        let linker = MockLinker::new();
        let mut backup = manager(&env);
        let d = dispatcher(&env, &linker);
        d.deploy("wallpapers", DirectoryCategory::Asset, &mut backup)
            .unwrap();
        let live = env.paths.data_home.join("wallpapers");
        fs::write(live.join("extra.png"), "user").unwrap();

        let outcome = d
            .retract("wallpapers", DirectoryCategory::Asset, &mut backup)
            .unwrap();
        assert!(matches!(outcome, Outcome::Skipped(_)));
        assert!(live.join("extra.png").exists());

        fs::remove_file(live.join("extra.png")).unwrap();
        let outcome = d
            .retract("wallpapers", DirectoryCategory::Asset, &mut backup)
            .unwrap();
        assert_eq!(outcome, Outcome::Changed);
        assert!(!live.exists());
    }

    #[test]
    fn base_name_of_nested_paths() {
        assert_eq!(base_name("nvim"), "nvim");
        assert_eq!(base_name(".config/kitty"), "kitty");
        assert_eq!(base_name("dark/.config/waybar/"), "waybar");
    }
}
