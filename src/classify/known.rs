//! Static knowledge about common desktop tools.

/// Well-known tools: directory name and the packages it implies.
///
/// A candidate with one of these names scores high on name alone and
/// contributes its packages to the dependency scan.
pub const WELL_KNOWN_TOOLS: &[(&str, &[&str])] = &[
    ("nvim", &["neovim"]),
    ("zsh", &["zsh"]),
    ("bash", &["bash"]),
    ("fish", &["fish"]),
    ("tmux", &["tmux"]),
    ("hypr", &["hyprland"]),
    ("waybar", &["waybar"]),
    ("alacritty", &["alacritty"]),
    ("kitty", &["kitty"]),
    ("wezterm", &["wezterm"]),
    ("foot", &["foot"]),
    ("dunst", &["dunst"]),
    ("mako", &["mako"]),
    ("rofi", &["rofi"]),
    ("wofi", &["wofi"]),
    ("fuzzel", &["fuzzel"]),
    ("sway", &["sway"]),
    ("swaylock", &["swaylock"]),
    ("i3", &["i3-wm"]),
    ("bspwm", &["bspwm"]),
    ("sxhkd", &["sxhkd"]),
    ("polybar", &["polybar"]),
    ("picom", &["picom"]),
    ("qtile", &["qtile"]),
    ("xmonad", &["xmonad"]),
    ("eww", &["eww-wayland"]),
    ("ags", &["npm:yarn", "npm:esbuild", "npm:sass", "gtk4"]),
    ("neofetch", &["neofetch"]),
    ("fastfetch", &["fastfetch"]),
    ("starship", &["starship"]),
    ("btop", &["btop"]),
    ("ranger", &["ranger"]),
    ("yazi", &["yazi"]),
    ("zathura", &["zathura"]),
    ("mpv", &["mpv"]),
    ("cava", &["cava"]),
];

/// Generic desktop-environment and category directory names.
///
/// Worth less than a well-known tool but enough, alone, to reach the default
/// threshold.
pub const GENERIC_NAMES: &[&str] = &[
    "gtk-2.0",
    "gtk-3.0",
    "gtk-4.0",
    "awesome",
    "openbox",
    "dwm",
    "herbstluftwm",
    "fontconfig",
    "qt5ct",
    "qt6ct",
    "kvantum",
    "hyprlock",
    "hypridle",
    "wlogout",
    "swww",
    "wallpapers",
    "wallpaper",
    "walls",
    "backgrounds",
    "images",
    "assets",
    "fonts",
    "icons",
    "cursors",
    "themes",
    "colors",
    "scripts",
    "bin",
    "cache",
    ".cache",
    "local",
    ".local",
];

/// Packages implied by a well-known tool name.
#[must_use]
pub fn packages_for(name: &str) -> Option<&'static [&'static str]> {
    let name = name.to_lowercase();
    WELL_KNOWN_TOOLS
        .iter()
        .find(|(tool, _)| *tool == name)
        .map(|(_, pkgs)| *pkgs)
}

/// Returns `true` if `name` is a well-known tool.
#[must_use]
pub fn is_well_known(name: &str) -> bool {
    packages_for(name).is_some()
}

/// Returns `true` if `name` is a generic desktop or category name.
#[must_use]
pub fn is_generic(name: &str) -> bool {
    let name = name.to_lowercase();
    GENERIC_NAMES.contains(&name.as_str())
}
