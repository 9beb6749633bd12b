mod commands;

pub use commands::{build_toggles, run};

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hivesync",
    version,
    about = "Reconcile client groups, provision secrets and clone workloads"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Config path given on the command line, if any.
    pub fn config_path(&self) -> Option<&str> {
        let common = match &self.command {
            Commands::Clients(opts) => &opts.common,
            Commands::Restore(opts) => &opts.common,
            Commands::Secrets(opts) => &opts.common,
            Commands::Clone(opts) => &opts.common,
            Commands::State(opts) => &opts.common,
            Commands::Config(opts) => &opts.common,
            Commands::Version => return None,
        };
        common.config.as_deref()
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Converge a group's clients to the requested toggles.
    Clients(ClientsOpts),
    /// Give the optimizer group's clients back to a group.
    Restore(RestoreOpts),
    /// Create secrets under collision-free keys.
    Secrets(SecretsOpts),
    /// Copy a workload into a group, asking for a new name on conflict.
    Clone(CloneOpts),
    State(StateOpts),
    Config(ConfigOpts),
    Version,
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct CommonOpts {
    #[arg(short, long)]
    pub config: Option<String>,
    /// State file (JSON or YAML).
    #[arg(short, long)]
    pub state: Option<String>,
}

#[derive(clap::Args)]
pub struct ClientsOpts {
    #[command(flatten)]
    pub common: CommonOpts,
    pub group: String,
    /// Client to register to the group.
    #[arg(long = "enable", value_name = "CLIENT")]
    pub enable: Vec<String>,
    /// Client to remove from the group.
    #[arg(long = "disable", value_name = "CLIENT")]
    pub disable: Vec<String>,
    /// Print the planned changes without applying them.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(clap::Args)]
pub struct RestoreOpts {
    #[command(flatten)]
    pub common: CommonOpts,
    /// Group that receives the clients.
    pub group: String,
}

#[derive(clap::Args)]
pub struct SecretsOpts {
    #[command(flatten)]
    pub common: CommonOpts,
    /// New secret for a field, as FIELD=VALUE.
    #[arg(long = "new", value_name = "FIELD=VALUE", value_parser = parse_key_value)]
    pub new: Vec<(String, String)>,
    /// Existing store key for a field, as FIELD=KEY.
    #[arg(long = "stored", value_name = "FIELD=KEY", value_parser = parse_key_value)]
    pub stored: Vec<(String, String)>,
    /// Create secrets back to back.
    #[arg(long)]
    pub no_pacing: bool,
}

#[derive(clap::Args)]
pub struct CloneOpts {
    #[command(flatten)]
    pub common: CommonOpts,
    /// Workload to copy.
    pub source: String,
    #[arg(short, long)]
    pub group: String,
    /// Name of the copy. Defaults to `<source>-<group>`.
    #[arg(short, long)]
    pub name: Option<String>,
}

#[derive(clap::Args)]
pub struct StateOpts {
    #[command(flatten)]
    pub common: CommonOpts,
    #[command(subcommand)]
    pub action: StateAction,
}

#[derive(Subcommand)]
pub enum StateAction {
    /// Write an example state file.
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[derive(clap::Args)]
pub struct ConfigOpts {
    #[command(flatten)]
    pub common: CommonOpts,
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    Show,
    Validate,
    Init,
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected NAME=VALUE, got '{raw}'")),
    }
}
