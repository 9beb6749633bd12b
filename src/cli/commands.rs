use super::{
    ClientsOpts, CloneOpts, Cli, Commands, CommonOpts, ConfigAction, ConfigOpts, RestoreOpts,
    SecretsOpts, StateAction, StateOpts,
};
use crate::api::{ClientRegistry, InMemoryApi, LocalState};
use crate::config::{validate_config_object, Config};
use crate::hooks::{HookEvent, HookRegistry};
use crate::roster::{
    move_optimizer, restore_clients_to_group, GroupReconciler, ReconcileSummary,
};
use crate::secrets::{Pacing, SecretFieldValue, SecretProvisioner};
use crate::workloads::{CloneOutcome, LinePrompt, LogProgress, WorkloadCloner};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

/// Execute a parsed command line against `config`.
pub async fn run(cli: Cli, config: Config) -> Result<()> {
    match cli.command {
        Commands::Clients(opts) => run_clients(&config, opts).await,
        Commands::Restore(opts) => run_restore(&config, opts).await,
        Commands::Secrets(opts) => run_secrets(&config, opts).await,
        Commands::Clone(opts) => run_clone(&config, opts).await,
        Commands::State(opts) => run_state(&config, opts),
        Commands::Config(opts) => run_config(&config, opts),
        Commands::Version => {
            println!("hivesync {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Toggle map for a group: current members on, then `enable` on, then
/// `disable` off.
pub fn build_toggles<'a, I>(current: I, enable: &[String], disable: &[String]) -> BTreeMap<String, bool>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut toggles: BTreeMap<String, bool> = current.into_iter().map(|c| (c.clone(), true)).collect();
    for client in enable {
        toggles.insert(client.clone(), true);
    }
    for client in disable {
        toggles.insert(client.clone(), false);
    }
    toggles
}

// ============================================================================
// State file
// ============================================================================

/// Loaded state plus the file it came from.
struct Workspace {
    path: PathBuf,
    loaded: LocalState,
    api: InMemoryApi,
}

impl Workspace {
    fn open(config: &Config, common: &CommonOpts) -> Result<Self> {
        let path = config.state_path(common.state.as_deref());
        info!("Using state file {}", path.display());
        let state = LocalState::load_or_default(&path)?;
        Ok(Self {
            path,
            api: InMemoryApi::new(state.clone()),
            loaded: state,
        })
    }

    /// Write the state back when it differs from what was loaded.
    fn persist(&self) -> Result<()> {
        let state = self.api.state();
        if state == self.loaded {
            return Ok(());
        }
        write_state(&state, &self.path)
    }
}

fn write_state(state: &LocalState, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create state directory '{}'", parent.display()))?;
    }
    state.save(path)
}

fn logging_hooks() -> HookRegistry {
    let mut hooks = HookRegistry::new();
    hooks.on_all(Arc::new(|event: &HookEvent| {
        info!(?event, "hivesync event");
    }));
    hooks
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlannedChanges<'a> {
    group: &'a str,
    to_add: Vec<String>,
    to_remove: Vec<String>,
}

async fn run_clients(config: &Config, opts: ClientsOpts) -> Result<()> {
    let workspace = Workspace::open(config, &opts.common)?;
    let roster = workspace.api.list_group_roster(&opts.group).await?;
    let current = roster.registered_clients.unwrap_or_default();
    let toggles = build_toggles(&current, &opts.enable, &opts.disable);

    let hooks = logging_hooks();
    let mut reconciler = GroupReconciler::new(&workspace.api).with_hooks(&hooks);
    if let Some(shadow) = config.shadow_group() {
        reconciler = reconciler.with_shadow_group(shadow);
    }

    if opts.dry_run {
        let diff = reconciler.plan(&opts.group, &toggles).await?;
        return print_json(&PlannedChanges {
            group: &opts.group,
            to_add: diff.to_add.into_iter().collect(),
            to_remove: diff.to_remove.into_iter().collect(),
        });
    }

    let result = match config.shadow_group() {
        Some(shadow) => {
            serve_with_optimizer(&workspace.api, &reconciler, shadow, &opts.group, &toggles).await
        }
        None => reconciler
            .reconcile(&opts.group, &toggles)
            .await
            .map_err(Into::into),
    };
    // Requests that succeeded before a failure are kept.
    workspace.persist()?;
    let summary = result?;
    print_json(&summary)
}

/// Reconcile `group` with the optimizer serving it. A group the optimizer
/// served before gets its clients back first.
async fn serve_with_optimizer(
    api: &InMemoryApi,
    reconciler: &GroupReconciler<'_, InMemoryApi>,
    shadow: &str,
    group: &str,
    toggles: &BTreeMap<String, bool>,
) -> Result<ReconcileSummary> {
    let previous = api.optimized_group();
    move_optimizer(api, shadow, previous.as_deref(), group).await?;
    let summary = reconciler.reconcile(group, toggles).await?;
    api.set_optimized_group(group);
    Ok(summary)
}

async fn run_restore(config: &Config, opts: RestoreOpts) -> Result<()> {
    let workspace = Workspace::open(config, &opts.common)?;
    let shadow = &config.optimizer.group_name;
    let result = restore_clients_to_group(&workspace.api, shadow, &opts.group).await;
    workspace.persist()?;
    let restored = result?;
    print_json(&restored)
}

async fn run_secrets(config: &Config, opts: SecretsOpts) -> Result<()> {
    let workspace = Workspace::open(config, &opts.common)?;
    let fields: Vec<SecretFieldValue> = opts
        .new
        .into_iter()
        .map(|(field, value)| SecretFieldValue::new_secret(field, value))
        .chain(
            opts.stored
                .into_iter()
                .map(|(field, key)| SecretFieldValue::from_store(field, key)),
        )
        .collect();

    let pacing = if opts.no_pacing {
        Pacing::Disabled
    } else {
        Pacing::from_config(&config.secrets.pacing)
    };

    let hooks = logging_hooks();
    let result = SecretProvisioner::new(&workspace.api)
        .with_pacing(pacing)
        .with_hooks(&hooks)
        .provision(
            fields,
            |done, total| info!("Created secret {} of {}", done, total),
            |err, secret| error!("Failed to create secret '{}': {}", secret.secret_store_key, err),
        )
        .await;
    workspace.persist()?;
    let provisioned = result?;
    print_json(&provisioned.bindings())
}

async fn run_clone(config: &Config, opts: CloneOpts) -> Result<()> {
    let workspace = Workspace::open(config, &opts.common)?;
    let name = opts
        .name
        .clone()
        .unwrap_or_else(|| default_clone_name(&opts.source, &opts.group));

    let prompt = LinePrompt::new(BufReader::new(std::io::stdin()), std::io::stderr());
    let progress = LogProgress;
    let hooks = logging_hooks();
    let outcome = WorkloadCloner::new(&workspace.api, &prompt, &progress)
        .with_hooks(&hooks)
        .clone_to_group(&opts.source, &opts.group, &name)
        .await?;

    if let CloneOutcome::Created { .. } = outcome {
        workspace.persist()?;
    }
    print_json(&outcome)
}

/// Name for a copy when none is given: `<source>-<group>`.
fn default_clone_name(source: &str, group: &str) -> String {
    format!("{source}-{group}")
}

fn run_state(config: &Config, opts: StateOpts) -> Result<()> {
    match opts.action {
        StateAction::Init { force } => {
            let path = config.state_path(opts.common.state.as_deref());
            if path.exists() && !force {
                bail!("State file '{}' already exists, pass --force to replace it", path.display());
            }
            write_state(&LocalState::example(&config.optimizer.group_name), &path)?;
            info!("State file created at {}", path.display());
            Ok(())
        }
    }
}

fn run_config(config: &Config, opts: ConfigOpts) -> Result<()> {
    match opts.action {
        ConfigAction::Show => print_json(config),
        ConfigAction::Validate => {
            validate_config_object(config)?;
            info!("Configuration is valid");
            Ok(())
        }
        ConfigAction::Init => {
            Config::write_default(opts.common.config.as_deref().unwrap_or("hivesync.json"))?;
            info!("Configuration file created");
            Ok(())
        }
    }
}
