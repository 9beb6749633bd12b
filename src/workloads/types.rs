//! Workload run configuration as exported by the runtime, and the create
//! request derived from it.

use crate::api::parse_secret_binding;
use crate::secrets::StoredSecretReference;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Exported configuration of an existing workload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub image: String,
    pub transport: String,
    #[serde(default)]
    pub cmd_args: Vec<String>,
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
    /// Secret bindings, each `<name>,target=<target>`.
    #[serde(default)]
    pub secrets: Vec<String>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub isolate_network: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_profile: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<u16>,
}

/// Body of a create-workload call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateWorkloadRequest {
    pub name: String,
    pub group: String,
    pub image: String,
    pub transport: String,
    pub cmd_arguments: Vec<String>,
    pub env_vars: BTreeMap<String, String>,
    pub secrets: Vec<StoredSecretReference>,
    pub volumes: Vec<String>,
    pub network_isolation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_profile: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_port: Option<u16>,
}

impl CreateWorkloadRequest {
    /// Build a request that recreates `config` under a new name and group.
    pub fn from_run_config(config: &RunConfig, name: &str, group: &str) -> Self {
        Self {
            name: name.to_string(),
            group: group.to_string(),
            image: config.image.clone(),
            transport: config.transport.clone(),
            cmd_arguments: config.cmd_args.clone(),
            env_vars: config.env_vars.clone(),
            secrets: config
                .secrets
                .iter()
                .map(|binding| parse_secret_binding(binding))
                .collect(),
            volumes: config.volumes.clone(),
            network_isolation: config.isolate_network,
            permission_profile: config.permission_profile.clone(),
            host: config.host.clone(),
            target_port: config.target_port,
        }
    }

    /// Point the request at another name and group; everything else stays.
    pub fn retarget(&mut self, name: &str, group: &str) {
        self.name = name.to_string();
        self.group = group.to_string();
    }

    /// The run configuration a workload created from this request exports.
    pub fn to_run_config(&self) -> RunConfig {
        RunConfig {
            image: self.image.clone(),
            transport: self.transport.clone(),
            cmd_args: self.cmd_arguments.clone(),
            env_vars: self.env_vars.clone(),
            secrets: self
                .secrets
                .iter()
                .map(|s| format!("{},target={}", s.name, s.target))
                .collect(),
            volumes: self.volumes.clone(),
            isolate_network: self.network_isolation,
            permission_profile: self.permission_profile.clone(),
            host: self.host.clone(),
            target_port: self.target_port,
        }
    }
}
