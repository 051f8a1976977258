//! Host platform detection from `/etc/os-release`.
use std::fmt;
use std::path::Path;

/// Linux distribution family, used to pick the system package manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Distro {
    /// Arch Linux and derivatives (Manjaro, EndeavourOS, …).
    Arch,
    /// Debian and derivatives (Ubuntu, Mint, Pop!_OS, …).
    Debian,
    /// Fedora, RHEL and derivatives.
    Fedora,
    /// openSUSE Leap and Tumbleweed.
    OpenSuse,
    /// NixOS.
    NixOs,
    /// Anything else, carrying the raw `ID` value.
    Other(String),
}

impl fmt::Display for Distro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arch => write!(f, "arch"),
            Self::Debian => write!(f, "debian"),
            Self::Fedora => write!(f, "fedora"),
            Self::OpenSuse => write!(f, "opensuse"),
            Self::NixOs => write!(f, "nixos"),
            Self::Other(id) => write!(f, "{id}"),
        }
    }
}

impl Distro {
    /// Map an os-release `ID` to a family, without consulting `ID_LIKE`.
    fn from_id(id: &str) -> Option<Self> {
        match id {
            "arch" | "archarm" | "manjaro" | "endeavouros" | "garuda" | "artix" => Some(Self::Arch),
            "debian" | "ubuntu" | "linuxmint" | "pop" | "elementary" | "raspbian" | "kali" => {
                Some(Self::Debian)
            }
            "fedora" | "rhel" | "centos" | "rocky" | "almalinux" | "nobara" => Some(Self::Fedora),
            id if id.starts_with("opensuse") || id == "sles" => Some(Self::OpenSuse),
            "nixos" => Some(Self::NixOs),
            _ => None,
        }
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Distribution family.
    pub distro: Distro,
    /// Human-readable name (`PRETTY_NAME`), when present.
    pub pretty_name: Option<String>,
}

impl Platform {
    /// Detect the current platform from `/etc/os-release`, falling back to
    /// `/usr/lib/os-release`.
    #[must_use]
    pub fn detect() -> Self {
        ["/etc/os-release", "/usr/lib/os-release"]
            .iter()
            .find_map(|p| std::fs::read_to_string(Path::new(p)).ok())
            .map_or_else(
                || Self {
                    distro: Distro::Other("unknown".to_string()),
                    pretty_name: None,
                },
                |contents| Self::from_os_release(&contents),
            )
    }

    /// Create a platform with an explicit distribution.
    #[must_use]
    pub const fn new(distro: Distro) -> Self {
        Self {
            distro,
            pretty_name: None,
        }
    }

    /// Parse the contents of an os-release file.
    ///
    /// `ID` is checked first, then every word of `ID_LIKE` in order.
    #[must_use]
    pub fn from_os_release(contents: &str) -> Self {
        let mut id = None;
        let mut id_like = None;
        let mut pretty_name = None;
        for line in contents.lines() {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').trim_matches('\'').to_string();
            match key {
                "ID" => id = Some(value.to_lowercase()),
                "ID_LIKE" => id_like = Some(value.to_lowercase()),
                "PRETTY_NAME" => pretty_name = Some(value),
                _ => {}
            }
        }

        let id = id.unwrap_or_else(|| "linux".to_string());
        let distro = Distro::from_id(&id)
            .or_else(|| {
                id_like
                    .as_deref()
                    .unwrap_or_default()
                    .split_whitespace()
                    .find_map(Distro::from_id)
            })
            .unwrap_or(Distro::Other(id));

        Self {
            distro,
            pretty_name,
        }
    }

    /// Returns `true` on Arch Linux and derivatives.
    #[must_use]
    pub fn is_arch(&self) -> bool {
        self.distro == Distro::Arch
    }
}
