//! File-system helpers shared by the backup manager and the apply engine.
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create parent: {}", parent.display()))?;
    }
    Ok(())
}

/// Returns `true` if anything (including a broken symlink) exists at `path`.
#[must_use]
pub fn path_present(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

/// `true` for a directory that is not a symlink.
#[must_use]
pub fn is_real_dir(path: &Path) -> bool {
    path.symlink_metadata().is_ok_and(|m| m.is_dir())
}

/// Remove whatever lives at `path`: file, symlink or directory tree.
///
/// Symlinks are removed without following them. Does nothing if `path` does
/// not exist.
///
/// # Errors
///
/// Returns an error if the path exists but cannot be removed.
pub fn remove_path(path: &Path) -> Result<()> {
    let Ok(meta) = path.symlink_metadata() else {
        return Ok(());
    };
    if meta.is_dir() {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("remove directory: {}", path.display()))
    } else {
        std::fs::remove_file(path).with_context(|| format!("remove: {}", path.display()))
    }
}

/// Copy `src` to `dst`, which must not exist yet.
///
/// Regular files keep their permission bits, directories are copied
/// recursively with their mode, and symlinks are recreated as symlinks
/// rather than followed. `.git` directories are skipped when `skip_git` is
/// set.
///
/// # Errors
///
/// Returns an error if any entry cannot be read, created or copied.
pub fn copy_tree(src: &Path, dst: &Path, skip_git: bool) -> Result<()> {
    let meta = src
        .symlink_metadata()
        .with_context(|| format!("reading metadata: {}", src.display()))?;
    if meta.is_symlink() {
        let target =
            std::fs::read_link(src).with_context(|| format!("reading link: {}", src.display()))?;
        return create_symlink(&target, dst);
    }
    if meta.is_file() {
        std::fs::copy(src, dst)
            .with_context(|| format!("copying {} to {}", src.display(), dst.display()))?;
        return Ok(());
    }

    std::fs::create_dir_all(dst)
        .with_context(|| format!("creating directory {}", dst.display()))?;
    for entry in
        std::fs::read_dir(src).with_context(|| format!("reading directory {}", src.display()))?
    {
        let entry = entry.with_context(|| format!("reading entry in {}", src.display()))?;
        if skip_git && entry.file_name() == ".git" {
            continue;
        }
        copy_tree(&entry.path(), &dst.join(entry.file_name()), skip_git)?;
    }
    std::fs::set_permissions(dst, meta.permissions())
        .with_context(|| format!("set permissions: {}", dst.display()))?;
    Ok(())
}

/// Returns `true` if `a` and `b` hold the same tree: same entry names, same
/// file contents, same symlink targets. `.git` is ignored on both sides.
///
/// Unreadable entries count as differing.
#[must_use]
pub fn trees_identical(a: &Path, b: &Path) -> bool {
    let (Ok(ma), Ok(mb)) = (a.symlink_metadata(), b.symlink_metadata()) else {
        return false;
    };
    if ma.is_symlink() || mb.is_symlink() {
        return ma.is_symlink()
            && mb.is_symlink()
            && std::fs::read_link(a).ok() == std::fs::read_link(b).ok();
    }
    if ma.is_file() && mb.is_file() {
        return ma.len() == mb.len()
            && matches!((std::fs::read(a), std::fs::read(b)), (Ok(x), Ok(y)) if x == y);
    }
    if !(ma.is_dir() && mb.is_dir()) {
        return false;
    }
    let (Some(names_a), Some(names_b)) = (entry_names(a), entry_names(b)) else {
        return false;
    };
    names_a == names_b
        && names_a
            .iter()
            .all(|name| trees_identical(&a.join(name), &b.join(name)))
}

fn entry_names(dir: &Path) -> Option<Vec<std::ffi::OsString>> {
    let mut names: Vec<_> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok().map(|e| e.file_name()))
        .filter(|n| n != ".git")
        .collect();
    names.sort();
    Some(names)
}

/// Returns `true` if `path` is a symlink whose target resolves inside `root`.
#[must_use]
pub fn links_into(path: &Path, root: &Path) -> bool {
    let Ok(target) = std::fs::read_link(path) else {
        return false;
    };
    let target = if target.is_absolute() {
        target
    } else {
        path.parent()
            .map_or_else(|| target.clone(), |parent| parent.join(&target))
    };
    match (dunce::canonicalize(&target), dunce::canonicalize(root)) {
        (Ok(t), Ok(r)) => t.starts_with(r),
        _ => false,
    }
}

/// Sorted entries of `dir`; empty when it does not exist.
///
/// # Errors
///
/// Returns an error if `dir` exists but cannot be read.
pub fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut entries = std::fs::read_dir(dir)
        .with_context(|| format!("reading directory {}", dir.display()))?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()
        .with_context(|| format!("reading entry in {}", dir.display()))?;
    entries.sort();
    Ok(entries)
}

/// Create a symlink at `link` pointing to `target`.
///
/// # Errors
///
/// Returns an error if the link cannot be created.
pub fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link).with_context(|| {
            format!(
                "creating symlink {} -> {}",
                link.display(),
                target.display()
            )
        })
    }
    #[cfg(not(unix))]
    {
        anyhow::bail!(
            "symlinks are not supported on this platform: {}",
            link.display()
        )
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn copies_files_and_subdirectories() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        std::fs::write(src.path().join("a.txt"), b"aaa").unwrap();
        std::fs::create_dir(src.path().join("sub")).unwrap();
        std::fs::write(src.path().join("sub/b.txt"), b"bbb").unwrap();

        let target = dst.path().join("out");
        copy_tree(src.path(), &target, false).unwrap();

        assert_eq!(std::fs::read(target.join("a.txt")).unwrap(), b"aaa");
        assert_eq!(std::fs::read(target.join("sub/b.txt")).unwrap(), b"bbb");
        assert!(trees_identical(src.path(), &target));
    }

    #[test]
    fn skips_git_directory_when_flag_set() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        std::fs::write(src.path().join("file.txt"), b"content").unwrap();
        std::fs::create_dir(src.path().join(".git")).unwrap();
        std::fs::write(src.path().join(".git/HEAD"), b"ref: refs/heads/main").unwrap();

        let target = dst.path().join("out");
        copy_tree(src.path(), &target, true).unwrap();

        assert!(target.join("file.txt").exists());
        assert!(
            !target.join(".git").exists(),
            ".git directory should be skipped"
        );
    }

    #[cfg(unix)]
    #[test]
    fn copy_preserves_mode_and_symlinks() {
        use std::os::unix::fs::PermissionsExt;
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        let script = src.path().join("run.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o750)).unwrap();
        std::os::unix::fs::symlink("run.sh", src.path().join("alias")).unwrap();

        let target = dst.path().join("out");
        copy_tree(src.path(), &target, false).unwrap();

        let mode = std::fs::metadata(target.join("run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
        assert_eq!(
            std::fs::read_link(target.join("alias")).unwrap(),
            PathBuf::from("run.sh")
        );
    }

    // -----------------------------------------------------------------------
    // trees_identical
    // -----------------------------------------------------------------------

    #[test]
    fn trees_differ_on_content_and_names() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        std::fs::write(a.join("f"), "one").unwrap();
        std::fs::write(b.join("f"), "two").unwrap();
        assert!(!trees_identical(&a, &b));

        std::fs::write(b.join("f"), "one").unwrap();
        assert!(trees_identical(&a, &b));

        std::fs::write(b.join("extra"), "").unwrap();
        assert!(!trees_identical(&a, &b));
    }

    #[test]
    fn missing_tree_is_never_identical() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!trees_identical(dir.path(), &dir.path().join("absent")));
    }

    // -----------------------------------------------------------------------
    // remove_path / links_into
    // -----------------------------------------------------------------------

    #[test]
    fn remove_path_handles_files_dirs_and_absence() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        let tree = dir.path().join("tree/sub");
        std::fs::write(&file, "x").unwrap();
        std::fs::create_dir_all(&tree).unwrap();

        remove_path(&file).unwrap();
        remove_path(&dir.path().join("tree")).unwrap();
        remove_path(&dir.path().join("absent")).unwrap();
        assert!(!file.exists());
        assert!(!dir.path().join("tree").exists());
    }

    #[cfg(unix)]
    #[test]
    fn remove_path_does_not_follow_directory_symlinks() {
        let dir = tempfile::tempdir().unwrap();
        let real = dir.path().join("real");
        std::fs::create_dir(&real).unwrap();
        std::fs::write(real.join("keep"), "x").unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        remove_path(&link).unwrap();
        assert!(!path_present(&link));
        assert!(real.join("keep").exists(), "link target must survive");
    }

    #[cfg(unix)]
    #[test]
    fn links_into_detects_links_to_source() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("rice/nvim");
        std::fs::create_dir_all(&source).unwrap();
        let link = dir.path().join("nvim");
        std::os::unix::fs::symlink(&source, &link).unwrap();

        assert!(links_into(&link, &dir.path().join("rice")));
        assert!(!links_into(&link, &dir.path().join("other")));
        assert!(!links_into(&source, &dir.path().join("rice")), "not a link");
    }

    #[test]
    fn ensure_parent_dir_creates_missing_parents() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("file.txt");
        ensure_parent_dir(&nested).unwrap();
        assert!(dir.path().join("a").join("b").exists());
    }

    #[test]
    fn sorted_entries_of_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b"), "").unwrap();
        std::fs::write(dir.path().join("a"), "").unwrap();
        let entries = sorted_entries(dir.path()).unwrap();
        assert_eq!(entries, vec![dir.path().join("a"), dir.path().join("b")]);
        assert!(sorted_entries(&dir.path().join("absent")).unwrap().is_empty());
    }
}
