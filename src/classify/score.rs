//! Heuristic scoring of candidate directories.
use serde::Serialize;
use std::fmt;

use super::known;
use super::tree::{DirTree, NodeId};
use crate::config::RuleSet;
use crate::operations::FileSystemOps;

/// Bytes of each file inspected for keywords.
const CONTENT_PREFIX: usize = 1024;

/// File count above which the content score is normalised.
const NORMALISE_ABOVE: usize = 10;

const RULE_POINTS: f64 = 3.0;
const WELL_KNOWN_POINTS: f64 = 4.0;
const GENERIC_POINTS: f64 = 2.0;
const CONVENTION_POINTS: f64 = 1.0;
const CONFIG_FILE_POINTS: f64 = 1.0;
const SCRIPT_FILE_POINTS: f64 = 0.5;
const KEYWORD_POINTS: f64 = 0.5;

const CONFIG_EXTENSIONS: &[&str] = &[
    "conf", "toml", "yaml", "yml", "json", "ini", "ron", "lua", "vim", "el", "kdl", "rasi", "css",
    "scss", "xml", "config",
];

const SCRIPT_EXTENSIONS: &[&str] = &["sh", "bash", "zsh", "fish", "js", "py"];

const CONFIG_KEYWORDS: &[&str] = &[
    "nvim",
    "hyprland",
    "waybar",
    "zsh",
    "alacritty",
    "dunst",
    "rofi",
    "sway",
    "gtk",
    "fish",
    "kitty",
    "config",
    "theme",
    "colorscheme",
    "keybind",
    "workspace",
    "window",
    "border",
    "font",
    "opacity",
    "ags",
];

/// Confidence band of a total score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Below 2.
    Low,
    /// From 2 up to 4.
    Medium,
    /// 4 and above.
    High,
}

impl Confidence {
    /// Band for a total score.
    #[must_use]
    pub fn from_total(total: f64) -> Self {
        if total >= 4.0 {
            Self::High
        } else if total >= 2.0 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

/// Per-candidate score, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResult {
    /// Points earned from the directory name.
    pub name_score: f64,
    /// Points earned from the files directly inside.
    pub content_score: f64,
    /// Labels of everything that matched (`rule:…`, `builtin:…`, …).
    pub matched_rules: Vec<String>,
    /// Band of the total.
    pub confidence: Confidence,
}

impl ScoreResult {
    /// `name_score + content_score`.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.name_score + self.content_score
    }
}

/// Name score of `name` and the labels that produced it.
#[must_use]
pub fn score_name(name: &str, rules: &RuleSet) -> (f64, Vec<String>) {
    let mut labels = rules.matches(name);
    #[allow(clippy::cast_precision_loss)]
    let mut score = RULE_POINTS * labels.len() as f64;

    let lower = name.to_lowercase();
    if known::is_well_known(&lower) {
        score += WELL_KNOWN_POINTS;
        labels.push(format!("builtin:{lower}"));
    } else if known::is_generic(&lower) {
        score += GENERIC_POINTS;
        labels.push(format!("generic:{lower}"));
    }

    let conventions: [(&str, bool); 4] = [
        ("dot", lower.starts_with('.')),
        ("dot_", lower.starts_with("dot_")),
        ("rc", lower.ends_with("rc")),
        ("config", lower.ends_with("config")),
    ];
    for (kind, hit) in conventions {
        if hit {
            score += CONVENTION_POINTS;
            labels.push(format!("convention:{kind}"));
        }
    }
    (score, labels)
}

fn is_config_file(name: &str) -> bool {
    let lower = name.to_lowercase();
    match lower.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => CONFIG_EXTENSIONS.contains(&ext),
        // Extensionless names and dotfiles such as `.zshrc`.
        _ => lower == "config" || lower.ends_with("rc"),
    }
}

fn is_script_file(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && SCRIPT_EXTENSIONS.contains(&ext))
}

/// Content score of the files directly under `dir`.
#[must_use]
pub fn score_content(tree: &DirTree, dir: NodeId, fs: &dyn FileSystemOps) -> f64 {
    let mut raw = 0.0;
    let mut count = 0usize;
    for (_, file) in tree.files(dir) {
        count += 1;
        if is_config_file(&file.name) {
            raw += CONFIG_FILE_POINTS;
        } else if is_script_file(&file.name) {
            raw += SCRIPT_FILE_POINTS;
        }
        if let Ok(bytes) = fs.read_prefix(&file.path, CONTENT_PREFIX) {
            let text = String::from_utf8_lossy(&bytes).to_lowercase();
            #[allow(clippy::cast_precision_loss)]
            let hits = CONFIG_KEYWORDS.iter().filter(|k| text.contains(*k)).count() as f64;
            raw += KEYWORD_POINTS * hits;
        }
    }
    if count > NORMALISE_ABOVE {
        #[allow(clippy::cast_precision_loss)]
        let divisor = (count as f64).log2() + 1.0;
        raw / divisor
    } else {
        raw
    }
}

/// Full score of the directory node `dir`.
#[must_use]
pub fn score_dir(tree: &DirTree, dir: NodeId, rules: &RuleSet, fs: &dyn FileSystemOps) -> ScoreResult {
    let (name_score, matched_rules) = score_name(&tree.node(dir).name, rules);
    let content_score = score_content(tree, dir, fs);
    ScoreResult {
        name_score,
        content_score,
        matched_rules,
        confidence: Confidence::from_total(name_score + content_score),
    }
}

#[cfg(test)]
#[allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::float_cmp
)]
mod tests {
    use super::*;
    use crate::classify::tree::MAX_DEPTH;
    use crate::config::RuleDef;
    use crate::logging::CaptureLog;
    use crate::operations::MockFileSystemOps;
    use std::path::{Path, PathBuf};

    // -----------------------------------------------------------------------
    // Name scoring
    // -----------------------------------------------------------------------

    #[test]
    fn well_known_name_is_high_on_its_own() {
        let (score, labels) = score_name("nvim", &RuleSet::default());
        assert_eq!(score, 4.0);
        assert_eq!(labels, vec!["builtin:nvim"]);
        assert_eq!(Confidence::from_total(score), Confidence::High);
    }

    #[test]
    fn generic_name_reaches_threshold() {
        let (score, labels) = score_name("wallpapers", &RuleSet::default());
        assert_eq!(score, 2.0);
        assert_eq!(labels, vec!["generic:wallpapers"]);
    }

    #[test]
    fn conventions_stack() {
        let (score, labels) = score_name(".xinitrc", &RuleSet::default());
        assert_eq!(score, 2.0);
        assert_eq!(labels, vec!["convention:dot", "convention:rc"]);
    }

    #[test]
    fn user_rule_adds_three() {
        let rules = RuleSet::compile(&[RuleDef {
            name: Some("quickshell".to_string()),
            regex: None,
        }])
        .unwrap();
        let (score, labels) = score_name("quickshell", &rules);
        assert_eq!(score, 3.0);
        assert_eq!(labels, vec!["rule:quickshell"]);
    }

    #[test]
    fn unknown_name_scores_zero() {
        assert_eq!(score_name("notes", &RuleSet::default()).0, 0.0);
    }

    // -----------------------------------------------------------------------
    // Content scoring
    // -----------------------------------------------------------------------

    #[test]
    fn file_kinds() {
        assert!(is_config_file("style.css"));
        assert!(is_config_file("config"));
        assert!(is_config_file(".zshrc"));
        assert!(!is_config_file("bg.png"));
        assert!(is_script_file("launch.sh"));
        assert!(!is_script_file(".sh"));
    }

    fn tree_with(files: &[(&str, &str)]) -> (DirTree, MockFileSystemOps) {
        let entries: Vec<PathBuf> = files
            .iter()
            .map(|(name, _)| PathBuf::from(format!("/r/widgets/{name}")))
            .collect();
        let mut fs = MockFileSystemOps::new()
            .with_dir_entries("/r", vec![PathBuf::from("/r/widgets")])
            .with_dir_entries("/r/widgets", entries);
        for (name, body) in files {
            fs = fs.with_file(format!("/r/widgets/{name}"), body);
        }
        let log = CaptureLog::default();
        let tree = DirTree::build_with(Path::new("/r"), &fs, MAX_DEPTH, &log);
        (tree, fs)
    }

    #[test]
    fn extensions_and_keywords_add_up() {
        let (tree, fs) = tree_with(&[
            ("widgets.yuck", "(defwindow bar :monitor 0)"),
            ("style.scss", "$font: Iosevka;"),
            ("launch.sh", "#!/bin/sh"),
        ]);
        let dir = tree.find("widgets").unwrap();
        // scss +1, font +0.5, sh +0.5, window +0.5
        assert_eq!(score_content(&tree, dir, &fs), 2.5);
    }

    #[test]
    fn large_directories_are_normalised() {
        let files: Vec<(String, &str)> = (0..16).map(|i| (format!("f{i:02}.conf"), "")).collect();
        let refs: Vec<(&str, &str)> = files.iter().map(|(n, b)| (n.as_str(), *b)).collect();
        let (tree, fs) = tree_with(&refs);
        let dir = tree.find("widgets").unwrap();
        // 16 / (log2(16) + 1)
        assert_eq!(score_content(&tree, dir, &fs), 16.0 / 5.0);
    }

    #[test]
    fn score_dir_combines_both_parts() {
        let (tree, fs) = tree_with(&[("theme.json", "{\"theme\": \"dark\"}")]);
        let dir = tree.find("widgets").unwrap();
        let result = score_dir(&tree, dir, &RuleSet::default(), &fs);
        assert_eq!(result.name_score, 0.0);
        assert_eq!(result.content_score, 1.5);
        assert_eq!(result.total(), 1.5);
        assert_eq!(result.confidence, Confidence::Low);
    }
}
