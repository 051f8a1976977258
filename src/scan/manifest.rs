//! Parsers for the package manifests a rice may ship at its root.

/// Format of a root manifest file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    /// One package per line, `#` comments.
    PlainList,
    /// Homebrew bundle (`brew "name"`).
    Brewfile,
    /// pip requirements, version specifiers stripped.
    Requirements,
    /// Cargo manifest: `[dependencies]` and `[dev-dependencies]` keys.
    CargoToml,
    /// npm manifest: `dependencies` and `devDependencies` keys.
    PackageJson,
}

/// Root manifests: file name, manager prefix and format.
pub const ROOT_MANIFESTS: &[(&str, &str, ManifestKind)] = &[
    ("pkglist.txt", "pacman", ManifestKind::PlainList),
    ("packages.txt", "pacman", ManifestKind::PlainList),
    ("arch-packages.txt", "pacman", ManifestKind::PlainList),
    ("apt-packages.txt", "apt", ManifestKind::PlainList),
    ("debian-packages.txt", "apt", ManifestKind::PlainList),
    ("fedora-packages.txt", "dnf", ManifestKind::PlainList),
    ("rpm-packages.txt", "dnf", ManifestKind::PlainList),
    ("Brewfile", "brew", ManifestKind::Brewfile),
    ("requirements.txt", "pip", ManifestKind::Requirements),
    ("python-packages.txt", "pip", ManifestKind::Requirements),
    ("Cargo.toml", "cargo", ManifestKind::CargoToml),
    ("package.json", "npm", ManifestKind::PackageJson),
];

/// Non-empty, non-comment lines, trimmed.
pub fn plain_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
}

/// Parse `content` as `kind`, returning names prefixed with `prefix:`.
///
/// # Errors
///
/// Returns the parser message when a structured manifest is malformed.
pub fn parse(kind: ManifestKind, prefix: &str, content: &str) -> Result<Vec<String>, String> {
    let names: Vec<String> = match kind {
        ManifestKind::PlainList => plain_lines(content).map(String::from).collect(),
        ManifestKind::Brewfile => plain_lines(content)
            .filter_map(|l| l.strip_prefix("brew "))
            .filter_map(|rest| rest.trim().split(['"', '\'']).nth(1))
            .filter(|n| !n.is_empty())
            .map(String::from)
            .collect(),
        ManifestKind::Requirements => plain_lines(content)
            .filter(|l| !l.starts_with('-'))
            .filter_map(|l| {
                l.split(['=', '<', '>', '!', '~', ';', '[', ' ', '@'])
                    .next()
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
            })
            .map(String::from)
            .collect(),
        ManifestKind::CargoToml => {
            let table: toml::Table = toml::from_str(content).map_err(|e| e.message().to_string())?;
            ["dependencies", "dev-dependencies"]
                .iter()
                .filter_map(|section| table.get(*section).and_then(toml::Value::as_table))
                .flat_map(|deps| deps.keys().cloned())
                .collect()
        }
        ManifestKind::PackageJson => {
            let value: serde_json::Value =
                serde_json::from_str(content).map_err(|e| e.to_string())?;
            ["dependencies", "devDependencies"]
                .iter()
                .filter_map(|section| value.get(*section).and_then(serde_json::Value::as_object))
                .flat_map(|deps| deps.keys().cloned())
                .collect()
        }
    };
    Ok(names.into_iter().map(|n| format!("{prefix}:{n}")).collect())
}
