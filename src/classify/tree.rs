//! Arena tree of a rice repository.
//!
//! The repository is read once. Nodes live in a flat `Vec` and refer to each
//! other by [`NodeId`] index; there are no back references to keep alive.
use std::path::{Path, PathBuf};

use crate::logging::Log;
use crate::operations::{FileSystemOps, SystemFileSystemOps};

/// Deepest level read: root (0) → item → `.config` → tool → files.
pub const MAX_DEPTH: usize = 4;

/// Directory names never entered.
const SKIPPED_DIRS: &[&str] = &[".git"];

/// Index of a node inside its [`DirTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// File or directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Regular file (or symlink to one).
    File,
    /// Directory (or symlink to one).
    Dir,
}

/// One entry of the tree.
#[derive(Debug, Clone)]
pub struct DirNode {
    /// Base name.
    pub name: String,
    /// Absolute path.
    pub path: PathBuf,
    /// Path relative to the tree root, `/`-separated; empty for the root.
    pub rel: String,
    /// File or directory.
    pub kind: NodeKind,
    /// Parent node, `None` for the root.
    pub parent: Option<NodeId>,
    /// Children in file-name order.
    pub children: Vec<NodeId>,
    /// Distance from the root.
    pub depth: usize,
    /// `false` when the directory listing failed.
    pub readable: bool,
}

/// Flat arena holding the repository structure.
#[derive(Debug, Clone)]
pub struct DirTree {
    nodes: Vec<DirNode>,
}

impl DirTree {
    /// Read `root` from the real filesystem.
    #[must_use]
    pub fn build(root: &Path, log: &dyn Log) -> Self {
        Self::build_with(root, &SystemFileSystemOps, MAX_DEPTH, log)
    }

    /// Read `root` through `fs`, down to `max_depth`.
    ///
    /// Unreadable directories are kept with `readable = false` and a warning;
    /// their siblings are still read.
    #[must_use]
    pub fn build_with(root: &Path, fs: &dyn FileSystemOps, max_depth: usize, log: &dyn Log) -> Self {
        let mut tree = Self {
            nodes: vec![DirNode {
                name: root
                    .file_name()
                    .map_or_else(String::new, |n| n.to_string_lossy().into_owned()),
                path: root.to_path_buf(),
                rel: String::new(),
                kind: NodeKind::Dir,
                parent: None,
                children: Vec::new(),
                depth: 0,
                readable: true,
            }],
        };

        let mut stack = vec![NodeId(0)];
        while let Some(id) = stack.pop() {
            let (path, rel, depth) = {
                let node = tree.node(id);
                (node.path.clone(), node.rel.clone(), node.depth)
            };
            if depth >= max_depth {
                continue;
            }
            let entries = match fs.read_dir(&path) {
                Ok(entries) => entries,
                Err(e) => {
                    log.warn(&format!("cannot read {}: {e}", path.display()));
                    if let Some(node) = tree.nodes.get_mut(id.0) {
                        node.readable = false;
                    }
                    continue;
                }
            };

            let mut dirs = Vec::new();
            for entry in entries {
                let Some(name) = entry.file_name().map(|n| n.to_string_lossy().into_owned())
                else {
                    continue;
                };
                let kind = if fs.is_dir(&entry) {
                    if SKIPPED_DIRS.contains(&name.as_str()) {
                        continue;
                    }
                    NodeKind::Dir
                } else if fs.is_file(&entry) {
                    NodeKind::File
                } else {
                    continue;
                };
                let child_rel = if rel.is_empty() {
                    name.clone()
                } else {
                    format!("{rel}/{name}")
                };
                let child = tree.push(DirNode {
                    name,
                    path: entry,
                    rel: child_rel,
                    kind,
                    parent: Some(id),
                    children: Vec::new(),
                    depth: depth + 1,
                    readable: true,
                });
                if kind == NodeKind::Dir {
                    dirs.push(child);
                }
            }
            // Reverse so the stack pops in file-name order.
            stack.extend(dirs.into_iter().rev());
        }
        tree
    }

    fn push(&mut self, node: DirNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        if let Some(parent) = node.parent
            && let Some(p) = self.nodes.get_mut(parent.0)
        {
            p.children.push(id);
        }
        self.nodes.push(node);
        id
    }

    /// The root node id.
    #[must_use]
    pub const fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Absolute path of the repository root.
    #[must_use]
    pub fn root_path(&self) -> &Path {
        &self.node(self.root()).path
    }

    /// Access a node. Ids always come from this tree.
    #[must_use]
    #[allow(clippy::indexing_slicing)]
    pub fn node(&self, id: NodeId) -> &DirNode {
        &self.nodes[id.0]
    }

    /// Total number of nodes, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: a tree has at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Child nodes of `id`.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &DirNode)> {
        self.node(id).children.iter().map(|&c| (c, self.node(c)))
    }

    /// Child directories of `id`.
    pub fn dirs(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &DirNode)> {
        self.children(id).filter(|(_, n)| n.kind == NodeKind::Dir)
    }

    /// Child files of `id`.
    pub fn files(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &DirNode)> {
        self.children(id).filter(|(_, n)| n.kind == NodeKind::File)
    }

    /// Child of `id` named `name`.
    #[must_use]
    pub fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children(id).find(|(_, n)| n.name == name).map(|(c, _)| c)
    }

    /// Node at a `/`-separated path relative to the root.
    #[must_use]
    pub fn find(&self, rel: &str) -> Option<NodeId> {
        rel.split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self.root(), |id, part| self.child(id, part))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::CaptureLog;
    use crate::operations::MockFileSystemOps;

    fn p(s: &str) -> PathBuf {
        PathBuf::from(s)
    }

    #[test]
    fn builds_arena_from_real_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("nvim/lua")).unwrap();
        std::fs::write(dir.path().join("nvim/init.lua"), "").unwrap();
        std::fs::create_dir_all(dir.path().join(".git/objects")).unwrap();

        let log = CaptureLog::default();
        let tree = DirTree::build(dir.path(), &log);

        let nvim = tree.find("nvim").expect("nvim node");
        assert_eq!(tree.node(nvim).rel, "nvim");
        assert_eq!(tree.node(nvim).parent, Some(tree.root()));
        let names: Vec<_> = tree.children(nvim).map(|(_, n)| n.name.as_str()).collect();
        assert_eq!(names, vec!["init.lua", "lua"]);
        assert!(tree.find(".git").is_none(), ".git must never be entered");
    }

    #[test]
    fn depth_is_bounded() {
        let fs = MockFileSystemOps::new()
            .with_dir_entries("/r", vec![p("/r/a")])
            .with_dir_entries("/r/a", vec![p("/r/a/b")])
            .with_dir_entries("/r/a/b", vec![p("/r/a/b/c")])
            .with_dir_entries("/r/a/b/c", vec![]);
        let log = CaptureLog::default();
        let tree = DirTree::build_with(Path::new("/r"), &fs, 2, &log);
        assert!(tree.find("a/b").is_some());
        assert!(tree.find("a/b/c").is_none(), "level 3 is beyond max depth 2");
    }

    #[test]
    fn unreadable_directory_does_not_abort_siblings() {
        let fs = MockFileSystemOps::new()
            .with_dir_entries("/r", vec![p("/r/locked"), p("/r/waybar")])
            .with_unreadable_dir("/r/locked")
            .with_dir_entries("/r/waybar", vec![p("/r/waybar/config")])
            .with_file("/r/waybar/config", "{}");
        let log = CaptureLog::default();
        let tree = DirTree::build_with(Path::new("/r"), &fs, MAX_DEPTH, &log);

        let locked = tree.find("locked").expect("unreadable node is kept");
        assert!(!tree.node(locked).readable);
        assert!(tree.find("waybar/config").is_some(), "sibling is still read");
        assert_eq!(log.warnings().len(), 1);
        assert!(log.warnings()[0].contains("/r/locked"));
    }

    #[test]
    fn find_nested_relative_path() {
        let fs = MockFileSystemOps::new()
            .with_dir_entries("/r", vec![p("/r/.config")])
            .with_dir_entries("/r/.config", vec![p("/r/.config/kitty")])
            .with_dir_entries("/r/.config/kitty", vec![]);
        let log = CaptureLog::default();
        let tree = DirTree::build_with(Path::new("/r"), &fs, MAX_DEPTH, &log);
        let kitty = tree.find(".config/kitty").unwrap();
        assert_eq!(tree.node(kitty).rel, ".config/kitty");
        assert_eq!(tree.node(kitty).depth, 2);
        assert_eq!(tree.len(), 3);
    }
}
