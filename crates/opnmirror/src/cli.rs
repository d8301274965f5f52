//! Clap derive structures for the `opnmirror` CLI.
//!
//! Defines the command tree, global flags, and shared value enums.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use opnmirror_core::EntityKind;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// opnmirror -- mirror OPNsense state and deploy without collisions
#[derive(Debug, Parser)]
#[command(
    name = "opnmirror",
    version,
    about = "Mirror OPNsense appliances and deploy resources without collisions",
    long_about = "Keeps a local mirror of each appliance's interfaces, VLANs, firewall rules,\n\
        port forwards and DHCP reservations, and refuses to push VLANs, port\n\
        forwards or containers that would collide with what is already there.\n\n\
        The appliance stays the source of truth: run `opnmirror sync` to pick up\n\
        changes made through its own UI.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Appliance profile to use (also the registered server name)
    #[arg(long, short = 'p', env = "OPNMIRROR_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Config file (default: platform config dir)
    #[arg(long, env = "OPNMIRROR_CONFIG", global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Mirror state file (default: platform data dir)
    #[arg(long, env = "OPNMIRROR_STATE", global = true, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "OPNMIRROR_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates (overrides the profile)
    #[arg(long, short = 'k', env = "OPNMIRROR_INSECURE", global = true)]
    pub insecure: bool,

    /// Remote call timeout in seconds (overrides the profile)
    #[arg(long, env = "OPNMIRROR_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one key per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Register, test, list, and remove appliances
    #[command(alias = "srv")]
    Server(ServerArgs),

    /// Pull appliance state into the mirror
    Sync(SyncArgs),

    /// Check a declaration file for conflicts without touching the appliance
    Check(CheckArgs),

    /// Deploy the resources in a declaration file
    Deploy(DeployArgs),

    /// List mirrored resources of one kind
    #[command(alias = "ls")]
    List(ListArgs),

    /// Manage deployed container records
    Container(ContainerArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// How a command uses the state file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateAccess {
    /// Load only; never written back.
    Read,
    /// Hold the state lock from load to save, waiting for other writers.
    Exclusive,
    /// Like `Exclusive`, but fail at once when another process holds it.
    TryExclusive,
    /// The command locks, reloads and saves on its own, once per pass.
    PerPass,
}

impl Command {
    pub fn state_access(&self) -> StateAccess {
        match self {
            Self::Server(args) => match args.command {
                ServerCommand::List | ServerCommand::Test => StateAccess::Read,
                _ => StateAccess::Exclusive,
            },
            Self::Sync(args) => match args.command {
                Some(SyncCommand::Status) => StateAccess::Read,
                Some(SyncCommand::Watch { .. }) => StateAccess::PerPass,
                Some(SyncCommand::Run { .. }) | None => StateAccess::TryExclusive,
            },
            Self::Deploy(args) if args.dry_run => StateAccess::Read,
            Self::Deploy(_) | Self::Container(_) => StateAccess::Exclusive,
            Self::Check(_) | Self::List(_) | Self::Config(_) | Self::Completions(_) => StateAccess::Read,
        }
    }

    /// Whether the mirror state file is written back after this command.
    pub fn writes_state(&self) -> bool {
        matches!(
            self.state_access(),
            StateAccess::Exclusive | StateAccess::TryExclusive
        )
    }
}

// ── Server ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ServerArgs {
    #[command(subcommand)]
    pub command: ServerCommand,
}

#[derive(Debug, Subcommand)]
pub enum ServerCommand {
    /// Check connectivity and credentials of the active profile
    Test,

    /// Register the active profile's appliance and import its interfaces
    #[command(alias = "add")]
    Register {
        /// Skip the initial full sync
        #[arg(long)]
        no_sync: bool,
    },

    /// List registered appliances
    #[command(alias = "ls")]
    List,

    /// Forget an appliance and its mirrored state
    #[command(alias = "rm")]
    Remove {
        /// Server name or id
        server: String,
    },
}

// ── Sync ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SyncArgs {
    #[command(subcommand)]
    pub command: Option<SyncCommand>,

    /// Sync every registered server (with `sync` alone)
    #[arg(long)]
    pub all: bool,
}

#[derive(Debug, Subcommand)]
pub enum SyncCommand {
    /// Run one sync pass (the default)
    Run {
        /// Sync every registered server
        #[arg(long)]
        all: bool,
    },

    /// Show the last sync of every server
    Status,

    /// Sync every server on an interval until interrupted
    Watch {
        /// Seconds between passes
        #[arg(long, short = 'i', default_value = "300")]
        interval: u64,
    },
}

// ── Check / Deploy ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Declaration file (YAML)
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct DeployArgs {
    /// Declaration file (YAML)
    pub file: PathBuf,

    /// Apply even when conflicts are found
    #[arg(long)]
    pub force: bool,

    /// Only check for conflicts
    #[arg(long)]
    pub dry_run: bool,

    /// Sync the server before deploying
    #[arg(long)]
    pub sync: bool,
}

// ── List ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Resource kind
    pub kind: ResourceKind,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ResourceKind {
    #[value(alias = "interface", alias = "if")]
    Interfaces,
    #[value(alias = "vlan")]
    Vlans,
    #[value(alias = "firewall-rule", alias = "rules")]
    FirewallRules,
    #[value(alias = "port-forward", alias = "nat")]
    PortForwards,
    #[value(alias = "dhcp-server", alias = "dhcp")]
    DhcpServers,
    #[value(alias = "dhcp-mapping", alias = "reservations")]
    DhcpMappings,
    #[value(alias = "container")]
    Containers,
}

impl From<ResourceKind> for EntityKind {
    fn from(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Interfaces => Self::Interface,
            ResourceKind::Vlans => Self::Vlan,
            ResourceKind::FirewallRules => Self::FirewallRule,
            ResourceKind::PortForwards => Self::PortForward,
            ResourceKind::DhcpServers => Self::DhcpServer,
            ResourceKind::DhcpMappings => Self::DhcpStaticMapping,
            ResourceKind::Containers => Self::Container,
        }
    }
}

// ── Container ────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ContainerArgs {
    #[command(subcommand)]
    pub command: ContainerCommand,
}

#[derive(Debug, Subcommand)]
pub enum ContainerCommand {
    /// Drop a container record, releasing its address, MAC, and ports
    #[command(alias = "rm")]
    Remove {
        /// Container name
        name: String,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive profile wizard
    Init,

    /// Show the merged configuration (secrets redacted)
    Show,

    /// Print the config and state file locations
    Path,

    /// List configured profiles
    Profiles,

    /// Store a profile's API secret in the system keyring
    SetSecret,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn access(args: &[&str]) -> StateAccess {
        let cli = Cli::try_parse_from(std::iter::once("opnmirror").chain(args.iter().copied())).unwrap();
        cli.command.state_access()
    }

    #[test]
    fn sync_passes_never_wait_for_the_state_lock() {
        assert_eq!(access(&["sync"]), StateAccess::TryExclusive);
        assert_eq!(access(&["sync", "run", "--all"]), StateAccess::TryExclusive);
        assert_eq!(access(&["sync", "watch"]), StateAccess::PerPass);
        assert_eq!(access(&["sync", "status"]), StateAccess::Read);
    }

    #[test]
    fn writers_hold_the_state_lock() {
        assert_eq!(access(&["deploy", "web.yaml"]), StateAccess::Exclusive);
        assert_eq!(access(&["--yes", "container", "remove", "web"]), StateAccess::Exclusive);
        assert_eq!(access(&["server", "register"]), StateAccess::Exclusive);
        assert!(!Cli::try_parse_from(["opnmirror", "sync", "watch"]).unwrap().command.writes_state());
    }

    #[test]
    fn dry_runs_and_checks_only_read() {
        assert_eq!(access(&["deploy", "--dry-run", "web.yaml"]), StateAccess::Read);
        assert_eq!(access(&["check", "web.yaml"]), StateAccess::Read);
        assert_eq!(access(&["list", "vlans"]), StateAccess::Read);
    }
}
