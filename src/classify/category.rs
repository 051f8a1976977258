//! Directory categories and the name-based category decision.
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a classified directory is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectoryCategory {
    /// Linked into `$XDG_CONFIG_HOME`.
    Config,
    /// Copied into `$XDG_DATA_HOME`.
    Asset,
    /// Copied into `$XDG_DATA_HOME`.
    Theme,
    /// Copied into `$HOME` as an opaque tree.
    Script,
    /// Linked into `~/.cache`.
    Cache,
    /// Linked into `~/.local`.
    Local,
    /// Handed to the Nix deployer.
    Nix,
    /// Copied into `$XDG_DATA_HOME`.
    Wallpaper,
    /// Copied into `$HOME` as an opaque tree.
    Other,
}

impl DirectoryCategory {
    /// All categories, in display order.
    pub const ALL: [Self; 9] = [
        Self::Config,
        Self::Asset,
        Self::Theme,
        Self::Script,
        Self::Cache,
        Self::Local,
        Self::Nix,
        Self::Wallpaper,
        Self::Other,
    ];

    /// Lowercase name, as persisted.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Asset => "asset",
            Self::Theme => "theme",
            Self::Script => "script",
            Self::Cache => "cache",
            Self::Local => "local",
            Self::Nix => "nix",
            Self::Wallpaper => "wallpaper",
            Self::Other => "other",
        }
    }

    /// Category of a directory from its base name.
    ///
    /// Checked in a fixed order: nix, wallpaper, asset, theme, script, cache,
    /// local, falling back to config.
    #[must_use]
    pub fn for_dir_name(name: &str) -> Self {
        let name = name.to_lowercase();
        let name = name.as_str();
        if matches!(name, "nix" | "nixos" | "home-manager") || name.ends_with(".nix") {
            Self::Nix
        } else if matches!(name, "wallpaper" | "walls" | "wall") {
            Self::Wallpaper
        } else if matches!(
            name,
            "wallpapers"
                | "backgrounds"
                | "images"
                | "assets"
                | "fonts"
                | "icons"
                | "cursors"
                | "stickers"
                | "sounds"
                | "readme_resources"
        ) {
            Self::Asset
        } else if matches!(name, "themes" | "theme" | "colors" | "colorschemes") {
            Self::Theme
        } else if matches!(name, "scripts" | "bin") {
            Self::Script
        } else if matches!(name, "cache" | ".cache") {
            Self::Cache
        } else if matches!(name, "local" | ".local") {
            Self::Local
        } else {
            Self::Config
        }
    }

    /// Returns `true` for categories deployed through the linker.
    #[must_use]
    pub const fn is_linked(self) -> bool {
        matches!(self, Self::Config | Self::Cache | Self::Local)
    }

    /// Returns `true` for categories copied into the data directory.
    #[must_use]
    pub const fn is_data(self) -> bool {
        matches!(self, Self::Asset | Self::Theme | Self::Wallpaper)
    }
}

impl fmt::Display for DirectoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
