//! Directory classification: which parts of a rice are configuration,
//! assets, themes, scripts, caches, local trees or Nix configurations.
pub mod category;
pub mod known;
pub mod score;
pub mod tree;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::config::{DEFAULT_THRESHOLD, RuleSet};
use crate::error::{Result, RiceError};
use crate::logging::Log;
use crate::operations::{FileSystemOps, SystemFileSystemOps};

pub use category::DirectoryCategory;
pub use score::{Confidence, ScoreResult};
pub use tree::{DirTree, NodeId};

/// Top-level directories that hold rice metadata rather than dotfiles.
const RESERVED_DIRS: &[&str] = &[".github", "scriptdata", "Extras", "arch-packages"];

/// Caller-supplied knobs for one classification run.
#[derive(Debug, Clone, Default)]
pub struct ClassifyOptions {
    /// Explicit targets: matching base names are accepted without scoring,
    /// everything else is dropped.
    pub targets: Vec<String>,
    /// Classify exactly these paths (relative to the root) and skip discovery.
    pub custom_paths: Vec<String>,
    /// Accept every candidate.
    pub ignore_rules: bool,
}

/// One accepted directory.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedDir {
    /// Deployment category.
    pub category: DirectoryCategory,
    /// Score, absent for custom paths.
    pub score: Option<ScoreResult>,
}

/// Result of classifying a repository.
#[derive(Debug, Clone)]
pub struct Classification {
    tree: DirTree,
    entries: BTreeMap<String, ClassifiedDir>,
    variants: Vec<String>,
}

impl Classification {
    /// The tree the classification was computed from.
    #[must_use]
    pub const fn tree(&self) -> &DirTree {
        &self.tree
    }

    /// Accepted entries with their scores, keyed by relative path.
    #[must_use]
    pub const fn entries(&self) -> &BTreeMap<String, ClassifiedDir> {
        &self.entries
    }

    /// Relative path → category.
    #[must_use]
    pub fn categories(&self) -> BTreeMap<String, DirectoryCategory> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.category))
            .collect()
    }

    /// Top-level directories carrying their own `.config` tree.
    ///
    /// Only populated when two or more exist and no explicit targets were
    /// given; the caller must resolve the ambiguity.
    #[must_use]
    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    /// Keep only entries that do not belong to a variant other than `chosen`.
    pub fn retain_variant(&mut self, chosen: &str) {
        let others: Vec<String> = self
            .variants
            .iter()
            .filter(|v| v.as_str() != chosen)
            .map(|v| format!("{v}/"))
            .collect();
        self.entries
            .retain(|rel, _| !others.iter().any(|prefix| rel.starts_with(prefix.as_str())));
        self.variants.clear();
    }
}

/// Scores candidate directories and assigns categories.
pub struct DirectoryClassifier {
    rules: RuleSet,
    threshold: f64,
    fs: Arc<dyn FileSystemOps>,
    log: Arc<dyn Log>,
}

impl std::fmt::Debug for DirectoryClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryClassifier")
            .field("rules", &self.rules.len())
            .field("threshold", &self.threshold)
            .finish_non_exhaustive()
    }
}

impl DirectoryClassifier {
    /// Classifier over the real filesystem with the default threshold.
    #[must_use]
    pub fn new(rules: RuleSet, log: Arc<dyn Log>) -> Self {
        Self {
            rules,
            threshold: DEFAULT_THRESHOLD,
            fs: Arc::new(SystemFileSystemOps),
            log,
        }
    }

    /// Override the acceptance threshold.
    #[must_use]
    pub const fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Read through `fs` instead of the real filesystem.
    #[must_use]
    pub fn with_fs_ops(mut self, fs: Arc<dyn FileSystemOps>) -> Self {
        self.fs = fs;
        self
    }

    /// Classify the repository at `root`.
    ///
    /// Per-candidate problems (unreadable directories, missing custom paths)
    /// are warned and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RiceError::Validation`] if `root` is not a directory.
    pub fn classify(&self, root: &Path, options: &ClassifyOptions) -> Result<Classification> {
        if !self.fs.is_dir(root) {
            return Err(RiceError::Validation(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let tree = DirTree::build_with(root, self.fs.as_ref(), tree::MAX_DEPTH, self.log.as_ref());
        Ok(self.classify_tree(tree, options))
    }

    /// Classify an already-built tree.
    #[must_use]
    pub fn classify_tree(&self, tree: DirTree, options: &ClassifyOptions) -> Classification {
        if !options.custom_paths.is_empty() {
            let entries = self.classify_custom_paths(tree.root_path(), &options.custom_paths);
            return Classification {
                tree,
                entries,
                variants: Vec::new(),
            };
        }

        let mut entries = BTreeMap::new();
        let mut variants = Vec::new();
        for candidate in candidates(&tree, &mut variants) {
            let node = tree.node(candidate);
            let score = score::score_dir(&tree, candidate, &self.rules, self.fs.as_ref());
            let accepted = if options.targets.is_empty() {
                options.ignore_rules || score.total() >= self.threshold
            } else {
                options.targets.iter().any(|t| *t == node.name)
            };
            self.log.debug(&format!(
                "{}: name {:.1} + content {:.1} ({}) {}",
                node.rel,
                score.name_score,
                score.content_score,
                score.confidence,
                if accepted { "accepted" } else { "rejected" }
            ));
            if accepted {
                entries.insert(
                    node.rel.clone(),
                    ClassifiedDir {
                        category: DirectoryCategory::for_dir_name(&node.name),
                        score: Some(score),
                    },
                );
            }
        }

        if variants.len() < 2 || !options.targets.is_empty() {
            variants.clear();
        }
        Classification {
            tree,
            entries,
            variants,
        }
    }

    fn classify_custom_paths(
        &self,
        root: &Path,
        paths: &[String],
    ) -> BTreeMap<String, ClassifiedDir> {
        let mut entries = BTreeMap::new();
        for rel in paths {
            let rel = rel.trim_matches('/');
            let full = root.join(rel);
            let category = if self.fs.is_dir(&full) {
                let name = full
                    .file_name()
                    .map_or_else(String::new, |n| n.to_string_lossy().into_owned());
                DirectoryCategory::for_dir_name(&name)
            } else if self.fs.is_file(&full) {
                DirectoryCategory::Other
            } else {
                self.log.warn(&format!("custom path not found: {rel}"));
                continue;
            };
            entries.insert(
                rel.to_string(),
                ClassifiedDir {
                    category,
                    score: None,
                },
            );
        }
        entries
    }
}

/// Candidate directories of `tree`, recording variant names on the way.
fn candidates(tree: &DirTree, variants: &mut Vec<String>) -> Vec<NodeId> {
    let mut out = Vec::new();
    for (id, item) in tree.dirs(tree.root()) {
        if RESERVED_DIRS.contains(&item.name.as_str()) {
            continue;
        }
        if item.name == ".config" {
            out.extend(tree.dirs(id).map(|(c, _)| c));
        } else if let Some(config) = tree.child(id, ".config")
            && tree.node(config).kind == tree::NodeKind::Dir
        {
            variants.push(item.name.clone());
            out.extend(tree.dirs(config).map(|(c, _)| c));
        } else {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::CaptureLog;
    use crate::operations::MockFileSystemOps;
    use std::fs;
    use std::path::PathBuf;

    fn classifier() -> DirectoryClassifier {
        DirectoryClassifier::new(RuleSet::default(), Arc::new(CaptureLog::default()))
    }

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    // -----------------------------------------------------------------------
    // Discovery
    // -----------------------------------------------------------------------

    #[test]
    fn classifies_typical_rice() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "nvim/init.lua", "vim.o.number = true");
        write(dir.path(), "waybar/config", "{}");
        write(dir.path(), "wallpapers/bg.png", "");
        write(dir.path(), "notes/todo.txt", "buy milk");

        let result = classifier()
            .classify(dir.path(), &ClassifyOptions::default())
            .unwrap();
        let categories = result.categories();

        assert_eq!(categories.len(), 3, "notes must be rejected: {categories:?}");
        assert_eq!(categories["nvim"], DirectoryCategory::Config);
        assert_eq!(categories["waybar"], DirectoryCategory::Config);
        assert_eq!(categories["wallpapers"], DirectoryCategory::Asset);
        let nvim = result.entries()["nvim"].score.as_ref().unwrap();
        assert_eq!(nvim.confidence, Confidence::High);
    }

    #[test]
    fn every_well_known_tool_is_a_high_confidence_config() {
        let dir = tempfile::tempdir().unwrap();
        for (tool, _) in known::WELL_KNOWN_TOOLS {
            fs::create_dir_all(dir.path().join(tool)).unwrap();
        }

        let result = classifier()
            .classify(dir.path(), &ClassifyOptions::default())
            .unwrap();

        for (tool, _) in known::WELL_KNOWN_TOOLS {
            let entry = result.entries().get(*tool);
            assert!(entry.is_some(), "{tool} was rejected");
            let entry = entry.unwrap();
            assert_ne!(entry.category, DirectoryCategory::Other, "{tool}");
            let score = entry.score.as_ref().unwrap();
            assert_eq!(score.confidence, Confidence::High, "{tool}");
        }
    }

    #[test]
    fn dot_config_children_are_candidates() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".config/kitty/kitty.conf", "font_size 11");
        write(dir.path(), ".config/random/readme.md", "");

        let result = classifier()
            .classify(dir.path(), &ClassifyOptions::default())
            .unwrap();
        let keys: Vec<_> = result.categories().into_keys().collect();
        assert_eq!(keys, vec![".config/kitty"]);
    }

    #[test]
    fn reserved_directories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "scriptdata/pre_apply.sh", "#!/bin/sh");
        write(dir.path(), "Extras/etc/motd", "");
        write(dir.path(), "arch-packages/eww-git/PKGBUILD", "");

        let result = classifier()
            .classify(
                dir.path(),
                &ClassifyOptions {
                    ignore_rules: true,
                    ..ClassifyOptions::default()
                },
            )
            .unwrap();
        assert!(result.entries().is_empty());
    }

    #[test]
    fn classification_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["sway", "rofi", "dunst", "picom", "alacritty"] {
            write(dir.path(), &format!("{name}/config"), "");
        }
        let c = classifier();
        let first = c.classify(dir.path(), &ClassifyOptions::default()).unwrap();
        let second = c.classify(dir.path(), &ClassifyOptions::default()).unwrap();
        assert_eq!(first.categories(), second.categories());
        assert_eq!(first.entries(), second.entries());
    }

    #[test]
    fn not_a_directory_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = classifier()
            .classify(&dir.path().join("missing"), &ClassifyOptions::default())
            .unwrap_err();
        assert!(matches!(err, RiceError::Validation(_)));
    }

    // -----------------------------------------------------------------------
    // Options
    // -----------------------------------------------------------------------

    #[test]
    fn targets_bypass_scoring_and_drop_others() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "nvim/init.lua", "");
        write(dir.path(), "notes/todo.txt", "");

        let result = classifier()
            .classify(
                dir.path(),
                &ClassifyOptions {
                    targets: vec!["notes".to_string()],
                    ..ClassifyOptions::default()
                },
            )
            .unwrap();
        let keys: Vec<_> = result.categories().into_keys().collect();
        assert_eq!(keys, vec!["notes"]);
    }

    #[test]
    fn ignore_rules_accepts_everything() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "notes/todo.txt", "");
        let result = classifier()
            .classify(
                dir.path(),
                &ClassifyOptions {
                    ignore_rules: true,
                    ..ClassifyOptions::default()
                },
            )
            .unwrap();
        assert_eq!(result.categories()["notes"], DirectoryCategory::Config);
    }

    #[test]
    fn custom_paths_bypass_discovery() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "home/scripts/run.sh", "");
        write(dir.path(), "home/.xprofile", "");
        write(dir.path(), "nvim/init.lua", "");

        let log = Arc::new(CaptureLog::default());
        let result = DirectoryClassifier::new(RuleSet::default(), log.clone())
            .classify(
                dir.path(),
                &ClassifyOptions {
                    custom_paths: vec![
                        "home/scripts".to_string(),
                        "home/.xprofile".to_string(),
                        "gone".to_string(),
                    ],
                    ..ClassifyOptions::default()
                },
            )
            .unwrap();
        let categories = result.categories();
        assert_eq!(categories.len(), 2);
        assert_eq!(categories["home/scripts"], DirectoryCategory::Script);
        assert_eq!(categories["home/.xprofile"], DirectoryCategory::Other);
        assert_eq!(log.warnings(), vec!["custom path not found: gone".to_string()]);
    }

    #[test]
    fn threshold_is_configurable() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "wallpapers/bg.png", "");
        let strict = classifier().with_threshold(3.0);
        let result = strict
            .classify(dir.path(), &ClassifyOptions::default())
            .unwrap();
        assert!(result.entries().is_empty(), "generic name alone scores 2");
    }

    // -----------------------------------------------------------------------
    // Variants
    // -----------------------------------------------------------------------

    #[test]
    fn detects_multiple_variants() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "dark/.config/hypr/hyprland.conf", "");
        write(dir.path(), "light/.config/hypr/hyprland.conf", "");

        let mut result = classifier()
            .classify(dir.path(), &ClassifyOptions::default())
            .unwrap();
        assert_eq!(result.variants(), ["dark".to_string(), "light".to_string()]);
        assert_eq!(result.entries().len(), 2);

        result.retain_variant("light");
        let keys: Vec<_> = result.categories().into_keys().collect();
        assert_eq!(keys, vec!["light/.config/hypr"]);
        assert!(result.variants().is_empty());
    }

    #[test]
    fn single_variant_is_not_ambiguous() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "main/.config/sway/config", "");
        let result = classifier()
            .classify(dir.path(), &ClassifyOptions::default())
            .unwrap();
        assert!(result.variants().is_empty());
        assert!(result.entries().contains_key("main/.config/sway"));
    }

    #[test]
    fn unreadable_candidate_is_scored_by_name_only() {
        let fs = MockFileSystemOps::new()
            .with_dir_entries("/r", vec![PathBuf::from("/r/kitty"), PathBuf::from("/r/notes")])
            .with_unreadable_dir("/r/kitty")
            .with_dir_entries("/r/notes", vec![]);
        let log = Arc::new(CaptureLog::default());
        let result = DirectoryClassifier::new(RuleSet::default(), log.clone())
            .with_fs_ops(Arc::new(fs))
            .classify(Path::new("/r"), &ClassifyOptions::default())
            .unwrap();
        assert_eq!(result.categories().len(), 1);
        assert!(result.entries().contains_key("kitty"));
        assert_eq!(log.warnings().len(), 1);
    }
}
