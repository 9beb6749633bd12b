//! In-process management backend.
//!
//! Holds groups, client memberships, secret keys and workloads in memory,
//! journals every call and can be told to fail the next call of a given
//! operation. The CLI persists it to a state file between runs.

use super::{
    ApiError, ClientGroups, ClientRegistry, CreatedSecret, CreatedWorkload, GroupRoster,
    SecretKeys, SecretStore, WorkloadService,
};
use crate::workloads::{CreateWorkloadRequest, RunConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::path::Path;
use tracing::debug;

// ============================================================================
// State
// ============================================================================

/// A workload known to the local backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadRecord {
    pub group: String,
    #[serde(flatten)]
    pub config: RunConfig,
}

/// Serializable contents of the local backend.
///
/// Secret values are never kept; only a SHA-256 digest of each value is
/// recorded against its key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalState {
    #[serde(default)]
    pub groups: BTreeSet<String>,
    /// Client id → groups it is registered to.
    #[serde(default)]
    pub clients: BTreeMap<String, BTreeSet<String>>,
    /// Secret key → `sha256:<hex>` digest of the value.
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
    #[serde(default)]
    pub workloads: BTreeMap<String, WorkloadRecord>,
    /// Group the optimizer served on the last `clients` run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimized_group: Option<String>,
}

impl LocalState {
    /// Load a state file (JSON, or YAML by extension).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file '{}'", path.display()))?;
        let state = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("Invalid YAML state file '{}'", path.display()))?,
            _ => serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON state file '{}'", path.display()))?,
        };
        Ok(state)
    }

    /// Load a state file, or start empty if it does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::to_string(self)?,
            _ => serde_json::to_string_pretty(self)?,
        };
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write state file '{}'", path.display()))?;
        Ok(())
    }

    /// A small starter state with a default group, the optimizer group and
    /// one workload.
    pub fn example(optimizer_group: &str) -> Self {
        let mut state = Self::default();
        state.groups.insert("default".to_string());
        state.groups.insert(optimizer_group.to_string());
        state.clients.insert(
            "vscode".to_string(),
            BTreeSet::from(["default".to_string()]),
        );
        state.clients.insert(
            "cursor".to_string(),
            BTreeSet::from(["default".to_string()]),
        );
        state.workloads.insert(
            "fetch".to_string(),
            WorkloadRecord {
                group: "default".to_string(),
                config: RunConfig {
                    image: "ghcr.io/stackloklabs/gofetch/server:latest".to_string(),
                    transport: "streamable-http".to_string(),
                    ..RunConfig::default()
                },
            },
        );
        state
    }

    /// Clients registered to `group`, sorted.
    pub fn roster(&self, group: &str) -> BTreeSet<String> {
        self.clients
            .iter()
            .filter(|(_, groups)| groups.contains(group))
            .map(|(client, _)| client.clone())
            .collect()
    }
}

/// Digest recorded for a stored secret value.
pub fn secret_digest(value: &str) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(value.as_bytes())))
}

// ============================================================================
// Journal
// ============================================================================

/// Operation kinds, used for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListGroupRoster,
    RegisterClient,
    UnregisterClient,
    ListClientGroups,
    ListSecretKeys,
    CreateSecret,
    ExportWorkload,
    CreateWorkload,
}

/// A call received by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    ListGroupRoster { group: String },
    RegisterClient { client: String, groups: Vec<String> },
    UnregisterClient { client: String, group: String },
    ListClientGroups { client: String },
    ListSecretKeys,
    CreateSecret { key: String },
    ExportWorkload { name: String },
    CreateWorkload { name: String, group: String },
}

impl ApiCall {
    pub fn operation(&self) -> Operation {
        match self {
            ApiCall::ListGroupRoster { .. } => Operation::ListGroupRoster,
            ApiCall::RegisterClient { .. } => Operation::RegisterClient,
            ApiCall::UnregisterClient { .. } => Operation::UnregisterClient,
            ApiCall::ListClientGroups { .. } => Operation::ListClientGroups,
            ApiCall::ListSecretKeys => Operation::ListSecretKeys,
            ApiCall::CreateSecret { .. } => Operation::CreateSecret,
            ApiCall::ExportWorkload { .. } => Operation::ExportWorkload,
            ApiCall::CreateWorkload { .. } => Operation::CreateWorkload,
        }
    }

    /// Whether the call changes backend state.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            ApiCall::RegisterClient { .. }
                | ApiCall::UnregisterClient { .. }
                | ApiCall::CreateSecret { .. }
                | ApiCall::CreateWorkload { .. }
        )
    }
}

// ============================================================================
// Backend
// ============================================================================

#[derive(Default)]
struct Inner {
    state: LocalState,
    journal: Vec<ApiCall>,
    failures: HashMap<Operation, VecDeque<ApiError>>,
}

/// In-memory implementation of every management trait.
#[derive(Default)]
pub struct InMemoryApi {
    inner: Mutex<Inner>,
}

impl InMemoryApi {
    pub fn new(state: LocalState) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state,
                ..Inner::default()
            }),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> LocalState {
        self.inner.lock().state.clone()
    }

    pub fn optimized_group(&self) -> Option<String> {
        self.inner.lock().state.optimized_group.clone()
    }

    pub fn set_optimized_group(&self, group: impl Into<String>) {
        self.inner.lock().state.optimized_group = Some(group.into());
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.inner.lock().journal.clone()
    }

    /// Only the state-changing calls.
    pub fn mutations(&self) -> Vec<ApiCall> {
        self.calls().into_iter().filter(ApiCall::is_mutation).collect()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.inner
            .lock()
            .journal
            .iter()
            .filter(|c| c.operation() == operation)
            .count()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().journal.clear();
    }

    /// Make the next call of `operation` fail with `error`.
    ///
    /// Queued failures are consumed one per call, in order.
    pub fn fail_next(&self, operation: Operation, error: ApiError) {
        self.inner
            .lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Journal the call and pop any queued failure for it.
    fn begin(&self, inner: &mut Inner, call: ApiCall) -> Result<(), ApiError> {
        debug!(?call, "management call");
        let operation = call.operation();
        inner.journal.push(call);
        match inner.failures.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn require_group(state: &LocalState, group: &str) -> Result<(), ApiError> {
    if state.groups.contains(group) {
        Ok(())
    } else {
        Err(ApiError::NotFound {
            kind: "group",
            name: group.to_string(),
        })
    }
}

#[async_trait]
impl ClientRegistry for InMemoryApi {
    async fn list_group_roster(&self, group: &str) -> Result<GroupRoster, ApiError> {
        let mut inner = self.inner.lock();
        self.begin(
            &mut inner,
            ApiCall::ListGroupRoster {
                group: group.to_string(),
            },
        )?;
        require_group(&inner.state, group)?;

        let roster: Vec<String> = inner.state.roster(group).into_iter().collect();
        Ok(GroupRoster {
            // The real runtime reports an empty roster as null.
            registered_clients: (!roster.is_empty()).then_some(roster),
        })
    }

    async fn register_client_to_groups(
        &self,
        client: &str,
        groups: &[String],
    ) -> Result<(), ApiError> {
        let mut inner = self.inner.lock();
        self.begin(
            &mut inner,
            ApiCall::RegisterClient {
                client: client.to_string(),
                groups: groups.to_vec(),
            },
        )?;
        for group in groups {
            require_group(&inner.state, group)?;
        }

        let groups: BTreeSet<String> = groups.iter().cloned().collect();
        if groups.is_empty() {
            inner.state.clients.remove(client);
        } else {
            inner.state.clients.insert(client.to_string(), groups);
        }
        Ok(())
    }

    async fn unregister_client_from_group(
        &self,
        client: &str,
        group: &str,
    ) -> Result<(), ApiError> {
        let mut inner = self.inner.lock();
        self.begin(
            &mut inner,
            ApiCall::UnregisterClient {
                client: client.to_string(),
                group: group.to_string(),
            },
        )?;
        require_group(&inner.state, group)?;

        let now_empty = match inner.state.clients.get_mut(client) {
            Some(groups) => {
                groups.remove(group);
                groups.is_empty()
            }
            None => false,
        };
        if now_empty {
            inner.state.clients.remove(client);
        }
        Ok(())
    }

    async fn list_client_current_groups(&self, client: &str) -> Result<ClientGroups, ApiError> {
        let mut inner = self.inner.lock();
        self.begin(
            &mut inner,
            ApiCall::ListClientGroups {
                client: client.to_string(),
            },
        )?;
        let groups = inner
            .state
            .clients
            .get(client)
            .map(|g| g.iter().cloned().collect())
            .unwrap_or_default();
        Ok(ClientGroups { groups })
    }
}

#[async_trait]
impl SecretStore for InMemoryApi {
    async fn list_stored_secret_keys(&self) -> Result<SecretKeys, ApiError> {
        let mut inner = self.inner.lock();
        self.begin(&mut inner, ApiCall::ListSecretKeys)?;
        Ok(SecretKeys {
            keys: inner.state.secrets.keys().cloned().collect(),
        })
    }

    async fn create_secret(&self, key: &str, value: &str) -> Result<CreatedSecret, ApiError> {
        let mut inner = self.inner.lock();
        self.begin(
            &mut inner,
            ApiCall::CreateSecret {
                key: key.to_string(),
            },
        )?;
        if key.is_empty() {
            return Err(ApiError::remote("secret key must not be empty"));
        }
        if inner.state.secrets.contains_key(key) {
            return Err(ApiError::remote(format!(
                "secret with key '{key}' already exists"
            )));
        }
        inner
            .state
            .secrets
            .insert(key.to_string(), secret_digest(value));
        Ok(CreatedSecret {
            key: key.to_string(),
        })
    }
}

#[async_trait]
impl WorkloadService for InMemoryApi {
    async fn export_workload_config(&self, name: &str) -> Result<RunConfig, ApiError> {
        let mut inner = self.inner.lock();
        self.begin(
            &mut inner,
            ApiCall::ExportWorkload {
                name: name.to_string(),
            },
        )?;
        inner
            .state
            .workloads
            .get(name)
            .map(|w| w.config.clone())
            .ok_or_else(|| ApiError::NotFound {
                kind: "workload",
                name: name.to_string(),
            })
    }

    async fn create_workload(
        &self,
        request: &CreateWorkloadRequest,
    ) -> Result<CreatedWorkload, ApiError> {
        let mut inner = self.inner.lock();
        self.begin(
            &mut inner,
            ApiCall::CreateWorkload {
                name: request.name.clone(),
                group: request.group.clone(),
            },
        )?;
        require_group(&inner.state, &request.group)?;
        if inner.state.workloads.contains_key(&request.name) {
            return Err(ApiError::remote(format!(
                "workload with name {} already exists",
                request.name
            )));
        }
        inner.state.workloads.insert(
            request.name.clone(),
            WorkloadRecord {
                group: request.group.clone(),
                config: request.to_run_config(),
            },
        );
        Ok(CreatedWorkload {
            name: request.name.clone(),
        })
    }
}
