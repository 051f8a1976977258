use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "rice",
    about = "Classify, deploy and retract desktop rice dotfile repositories",
    version = crate::version()
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Preview changes without applying
    #[arg(short = 'd', long, global = true)]
    pub dry_run: bool,

    /// Install packages one manager at a time (parallel is enabled by default)
    #[arg(long = "no-parallel", global = true, action = clap::ArgAction::SetFalse)]
    pub parallel: bool,

    /// Settings file (defaults to $RICE_CONFIG, then <config_home>/rice/rice.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Clone a rice repository and register it
    Clone(CloneOpts),
    /// Apply a registered rice
    Apply(ApplyOpts),
    /// Uninstall the applied rice, then apply this one
    Manage(ApplyOpts),
    /// Retract a rice from the live filesystem
    Uninstall(RiceArg),
    /// Show how a directory would be classified
    Classify(ClassifyOpts),
    /// List registered rices, or show one in detail
    List(ListOpts),
    /// Manage the profiles of a rice
    Profile(ProfileOpts),
    /// Operation backups, or `backup <name> <rice>` for a named snapshot
    Backup(BackupOpts),
    /// Named snapshots of the live configuration tree
    Snapshot(SnapshotOpts),
    /// Write a rice record as portable JSON
    Export(ExportOpts),
    /// Register a rice from exported JSON
    Import(ImportOpts),
    /// Generate shell completions
    Completions(CompletionsOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Subcommand name, used for the log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Clone(_) => "clone",
            Self::Apply(_) => "apply",
            Self::Manage(_) => "manage",
            Self::Uninstall(_) => "uninstall",
            Self::Classify(_) => "classify",
            Self::List(_) => "list",
            Self::Profile(_) => "profile",
            Self::Backup(_) => "backup",
            Self::Snapshot(_) => "snapshot",
            Self::Export(_) => "export",
            Self::Import(_) => "import",
            Self::Completions(_) => "completions",
            Self::Version => "version",
        }
    }
}

/// Options for `clone`.
#[derive(Args, Debug, Clone)]
pub struct CloneOpts {
    /// Repository URL or local path
    pub url: String,

    /// Name to register the rice under (defaults to the repository name)
    #[arg(long)]
    pub name: Option<String>,

    /// Checkout directory (defaults to <state_dir>/repos/<name>)
    #[arg(long)]
    pub dest: Option<PathBuf>,
}

/// Options for `apply` and `manage`.
#[derive(Args, Debug, Clone)]
pub struct ApplyOpts {
    /// Rice name
    pub rice: String,

    /// Do not install fonts or packages
    #[arg(long)]
    pub skip_packages: bool,

    /// Deploy only these directories
    #[arg(long, value_delimiter = ',', value_name = "DIRS")]
    pub target_packages: Vec<String>,

    /// Extra arguments passed to the linker
    #[arg(long, value_name = "OPTIONS", allow_hyphen_values = true)]
    pub stow_options: Option<String>,

    /// Link config and cache directories under this directory instead
    #[arg(long, value_name = "DIR")]
    pub overwrite_sym: Option<PathBuf>,

    /// Deploy exactly these paths, relative to the rice root
    #[arg(long, value_delimiter = ',', value_name = "PATHS")]
    pub custom_paths: Vec<String>,

    /// Accept every candidate directory
    #[arg(long)]
    pub ignore_rules: bool,

    /// Template variable, repeatable
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,

    /// Variant to deploy when the rice ships several
    #[arg(long, value_name = "VARIANT", conflicts_with = "first_variant")]
    pub choose: Option<String>,

    /// Deploy the first variant without asking
    #[arg(long)]
    pub first_variant: bool,
}

/// A single rice name.
#[derive(Args, Debug, Clone)]
pub struct RiceArg {
    /// Rice name
    pub rice: String,
}

/// Options for `classify`.
#[derive(Args, Debug, Clone)]
pub struct ClassifyOpts {
    /// Directory to classify
    pub path: PathBuf,

    /// Accept only these directories
    #[arg(long, value_delimiter = ',', value_name = "DIRS")]
    pub target_packages: Vec<String>,

    /// Classify exactly these paths
    #[arg(long, value_delimiter = ',', value_name = "PATHS")]
    pub custom_paths: Vec<String>,

    /// Accept every candidate directory
    #[arg(long)]
    pub ignore_rules: bool,

    /// Override the acceptance threshold
    #[arg(long)]
    pub threshold: Option<f64>,
}

/// Options for `list`.
#[derive(Args, Debug, Clone)]
pub struct ListOpts {
    /// Show this rice in detail
    pub rice: Option<String>,
}

/// Options for `profile`.
#[derive(Args, Debug, Clone)]
pub struct ProfileOpts {
    #[command(subcommand)]
    pub action: ProfileAction,
}

/// `profile` actions.
#[derive(Subcommand, Debug, Clone)]
pub enum ProfileAction {
    /// List the profiles of a rice
    List(RiceArg),
    /// Create a profile
    Create {
        /// Rice name
        rice: String,
        /// New profile name
        profile: String,
        /// Copy this profile instead of starting empty
        #[arg(long)]
        from: Option<String>,
    },
    /// Make a profile the active one
    Switch {
        /// Rice name
        rice: String,
        /// Profile name
        profile: String,
    },
}

/// Options for `backup`.
#[derive(Args, Debug, Clone)]
#[command(args_conflicts_with_subcommands = true)]
pub struct BackupOpts {
    #[command(subcommand)]
    pub action: Option<BackupAction>,

    /// Snapshot name
    #[arg(requires = "rice")]
    pub name: Option<String>,

    /// Rice the snapshot is taken for
    pub rice: Option<String>,
}

/// `backup` actions.
#[derive(Subcommand, Debug, Clone)]
pub enum BackupAction {
    /// List operation backups
    List,
    /// Restore an operation backup
    Rollback {
        /// Operation id, as shown by `backup list`
        id: String,
    },
    /// Remove old operation backups
    Cleanup {
        /// Age limit (defaults to `[backup] max_age_days`)
        #[arg(long)]
        max_age_days: Option<u32>,
    },
}

/// Options for `snapshot`.
#[derive(Args, Debug, Clone)]
pub struct SnapshotOpts {
    #[command(subcommand)]
    pub action: SnapshotAction,
}

/// `snapshot` actions.
#[derive(Subcommand, Debug, Clone)]
pub enum SnapshotAction {
    /// Capture the live configuration tree and installed packages
    Create {
        /// Snapshot name
        name: String,
        /// Free-form description
        #[arg(long, default_value = "")]
        description: String,
        /// Record this rice's dependencies instead of every installed package
        #[arg(long)]
        rice: Option<String>,
    },
    /// List snapshots
    List,
    /// Restore a snapshot
    Restore {
        /// Snapshot name
        name: String,
        /// Keep installed packages a whole-system snapshot does not list
        #[arg(long)]
        keep_extras: bool,
    },
    /// Delete a snapshot
    Delete {
        /// Snapshot name
        name: String,
    },
}

/// Options for `export`.
#[derive(Args, Debug, Clone)]
pub struct ExportOpts {
    /// Rice name
    pub rice: String,

    /// Write to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Options for `import`.
#[derive(Args, Debug, Clone)]
pub struct ImportOpts {
    /// Exported JSON file
    pub file: PathBuf,

    /// Register under this name instead of the exported one
    #[arg(long)]
    pub name: Option<String>,
}

/// Options for `completions`.
#[derive(Args, Debug, Clone)]
pub struct CompletionsOpts {
    /// Target shell
    pub shell: clap_complete::Shell,
}

/// Parse `KEY=VALUE`.
fn parse_var(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}
