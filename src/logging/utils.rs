//! Log file location and ANSI stripping.
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

/// CSI sequences (`ESC [ params final`) and two-byte escapes (`ESC M`).
static ANSI: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\x1b(?:\[[0-?]*[ -/]*[@-~]|[@-_])").ok());

/// Remove terminal escape sequences so log files stay plain text.
pub(super) fn strip_ansi(s: &str) -> String {
    match ANSI.as_ref() {
        Some(re) => re.replace_all(s, "").into_owned(),
        None => s.to_string(),
    }
}

/// Directory holding one log per subcommand:
/// `$XDG_CACHE_HOME/rice/logs`, default `~/.cache/rice/logs`.
fn log_dir() -> Option<PathBuf> {
    let cache = std::env::var_os("XDG_CACHE_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".cache")))?;
    let dir = cache.join("rice").join("logs");
    std::fs::create_dir_all(&dir).ok()?;
    Some(dir)
}

/// Log file of `command`; the previous run's log is overwritten.
pub(super) fn log_file_path(command: &str) -> Option<PathBuf> {
    log_dir().map(|d| d.join(format!("{command}.log")))
}
