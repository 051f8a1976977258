//! Dependency scanning: which external packages a classified rice needs.
pub mod manifest;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::classify::known;
use crate::classify::{DirTree, DirectoryCategory};
use crate::logging::Log;

/// Custom dependency lists, relative to the root.
const CUSTOM_DEPENDENCY_FILES: &[&str] = &["scriptdata/dependencies.conf", "dependencies.txt"];

/// Directory whose subdirectories are AUR package sources.
const AUR_SOURCES_DIR: &str = "arch-packages";

/// Collects package names from manifests, well-known tools, the user
/// dependency map, custom lists and local AUR sources.
pub struct DependencyScanner {
    log: Arc<dyn Log>,
}

impl std::fmt::Debug for DependencyScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DependencyScanner").finish_non_exhaustive()
    }
}

fn base_name(rel: &str) -> &str {
    rel.rsplit('/').next().unwrap_or(rel)
}

impl DependencyScanner {
    /// Create a scanner logging to `log`.
    #[must_use]
    pub fn new(log: Arc<dyn Log>) -> Self {
        Self { log }
    }

    /// Union of every dependency source, sorted and duplicate-free.
    ///
    /// Unreadable or malformed manifests are warned and skipped.
    #[must_use]
    pub fn scan(
        &self,
        tree: &DirTree,
        classified: &BTreeMap<String, DirectoryCategory>,
        dependency_map: &BTreeMap<String, Vec<String>>,
    ) -> BTreeSet<String> {
        let mut deps = BTreeSet::new();
        self.scan_manifests(tree, &mut deps);

        for rel in classified.keys() {
            let name = base_name(rel);
            if let Some(pkgs) = known::packages_for(name) {
                deps.extend(pkgs.iter().map(|p| (*p).to_string()));
            }
            for (key, pkgs) in dependency_map {
                if name.contains(key.as_str()) {
                    deps.extend(pkgs.iter().cloned());
                }
            }
        }

        self.scan_custom_lists(tree, &mut deps);

        if let Some(dir) = tree.find(AUR_SOURCES_DIR) {
            deps.extend(tree.dirs(dir).map(|(_, n)| format!("aur:{}", n.name)));
        }

        self.log.debug(&format!("{} dependencies found", deps.len()));
        deps
    }

    fn read_root_file(&self, tree: &DirTree, rel: &str) -> Option<String> {
        let id = tree.find(rel)?;
        let node = tree.node(id);
        if node.kind != crate::classify::tree::NodeKind::File {
            return None;
        }
        match std::fs::read_to_string(&node.path) {
            Ok(content) => Some(content),
            Err(e) => {
                self.log.warn(&format!("cannot read {rel}: {e}"));
                None
            }
        }
    }

    fn scan_manifests(&self, tree: &DirTree, deps: &mut BTreeSet<String>) {
        for (file, prefix, kind) in manifest::ROOT_MANIFESTS {
            let Some(content) = self.read_root_file(tree, file) else {
                continue;
            };
            match manifest::parse(*kind, prefix, &content) {
                Ok(names) => {
                    self.log.debug(&format!("{file}: {} package(s)", names.len()));
                    deps.extend(names);
                }
                Err(e) => self.log.warn(&format!("skipping malformed {file}: {e}")),
            }
        }
    }

    fn scan_custom_lists(&self, tree: &DirTree, deps: &mut BTreeSet<String>) {
        for file in CUSTOM_DEPENDENCY_FILES {
            if let Some(content) = self.read_root_file(tree, file) {
                deps.extend(manifest::plain_lines(&content).map(String::from));
            }
        }
    }
}
