use anyhow::{Context as _, Result};
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;

use super::{CommandContext, print_line};
use crate::classify::{Classification, ClassifyOptions, DirectoryClassifier};
use crate::cli::{ClassifyOpts, GlobalOpts};
use crate::logging::{Log, Logger};
use crate::scan::DependencyScanner;

/// Classify a directory and print the result.
///
/// # Errors
///
/// Returns an error if the settings are invalid or the path is not a
/// directory.
pub fn run(global: &GlobalOpts, opts: &ClassifyOpts, log: &Arc<Logger>) -> Result<()> {
    let ctx = CommandContext::init(global, log)?;
    let handle: Arc<dyn Log> = log.clone();

    let threshold = opts.threshold.unwrap_or(ctx.settings.classifier.threshold);
    let classifier = DirectoryClassifier::new(ctx.settings.rules()?, Arc::clone(&handle))
        .with_threshold(threshold);
    let classification = classifier
        .classify(
            &opts.path,
            &ClassifyOptions {
                targets: opts.target_packages.clone(),
                custom_paths: opts.custom_paths.clone(),
                ignore_rules: opts.ignore_rules,
            },
        )
        .with_context(|| format!("classifying {}", opts.path.display()))?;
    let dependencies = DependencyScanner::new(handle).scan(
        classification.tree(),
        &classification.categories(),
        &ctx.settings.dependencies,
    );

    for line in render(&classification, &dependencies).lines() {
        print_line(line);
    }
    Ok(())
}

/// One line per accepted directory, then variants and dependencies.
#[must_use]
pub fn render(classification: &Classification, dependencies: &BTreeSet<String>) -> String {
    let mut out = String::new();
    let width = classification
        .entries()
        .keys()
        .map(String::len)
        .max()
        .unwrap_or_default();
    for (rel, dir) in classification.entries() {
        let score = dir.score.as_ref().map_or_else(
            || "custom".to_string(),
            |s| format!("{:.1} {}", s.total(), s.confidence),
        );
        let _ = writeln!(out, "{rel:<width$}  {:<9}  {score}", dir.category.as_str());
    }
    if classification.entries().is_empty() {
        out.push_str("no dotfile directories found\n");
    }
    if !classification.variants().is_empty() {
        let _ = writeln!(out, "variants: {}", classification.variants().join(", "));
    }
    if !dependencies.is_empty() {
        let deps: Vec<&str> = dependencies.iter().map(String::as_str).collect();
        let _ = writeln!(out, "dependencies: {}", deps.join(", "));
    }
    out
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::config::RuleSet;
    use crate::logging::CaptureLog;
    use std::fs;
    use std::path::Path;

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[test]
    fn render_lists_categories_and_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "nvim/init.lua", "vim.o.number = true");
        write(dir.path(), "waybar/config", "{}");
        write(dir.path(), "wallpapers/bg.png", "");
        write(dir.path(), "notes/todo.txt", "buy milk");
        let log: Arc<dyn Log> = Arc::new(CaptureLog::default());

        let classification = DirectoryClassifier::new(RuleSet::default(), Arc::clone(&log))
            .classify(dir.path(), &ClassifyOptions::default())
            .unwrap();
        let deps = DependencyScanner::new(log).scan(
            classification.tree(),
            &classification.categories(),
            &std::collections::BTreeMap::new(),
        );
        let rendered = render(&classification, &deps);

        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 4, "{rendered}");
        assert!(lines[0].starts_with("nvim        config"), "{rendered}");
        assert!(lines[0].ends_with("high"), "{rendered}");
        assert!(lines[1].starts_with("wallpapers  asset"), "{rendered}");
        assert!(lines[2].starts_with("waybar      config"), "{rendered}");
        assert_eq!(lines[3], "dependencies: neovim, waybar");
    }

    #[test]
    fn render_empty_classification() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "notes/todo.txt", "");
        let classification =
            DirectoryClassifier::new(RuleSet::default(), Arc::new(CaptureLog::default()))
                .classify(dir.path(), &ClassifyOptions::default())
                .unwrap();
        insta::assert_snapshot!(render(&classification, &BTreeSet::new()).trim_end(), @"no dotfile directories found");
    }
}
