//! Remote management operations consumed by the reconciliation pipelines.
//!
//! The runtime's management API is an external service. Each pipeline takes
//! only the trait it calls, so tests and the local backend can stand in for
//! the real transport.

pub mod memory;

use crate::secrets::StoredSecretReference;
use crate::workloads::{CreateWorkloadRequest, RunConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use memory::{ApiCall, InMemoryApi, LocalState, Operation};

/// Substring the runtime uses to report a duplicate resource name.
pub const NAME_CONFLICT_MARKER: &str = "already exists";

// ============================================================================
// Errors
// ============================================================================

/// Error returned by a remote operation.
///
/// Treated as opaque by the pipelines; the only classification performed is
/// the name-conflict check used by the clone retry loop.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Remote(String),
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
    #[error("transport error: {0}")]
    Transport(String),
}

impl ApiError {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    /// Whether the runtime rejected a create because the name is taken.
    pub fn is_name_conflict(&self) -> bool {
        self.to_string()
            .to_lowercase()
            .contains(NAME_CONFLICT_MARKER)
    }
}

// ============================================================================
// Response payloads
// ============================================================================

/// Roster of a group as reported by the runtime.
///
/// The runtime may send `null` instead of an empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRoster {
    #[serde(default)]
    pub registered_clients: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientGroups {
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretKeys {
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedSecret {
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedWorkload {
    pub name: String,
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Client-to-group registration.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    async fn list_group_roster(&self, group: &str) -> Result<GroupRoster, ApiError>;

    /// Upsert the full set of groups a client belongs to.
    async fn register_client_to_groups(
        &self,
        client: &str,
        groups: &[String],
    ) -> Result<(), ApiError>;

    /// Remove a client from one group, leaving its other memberships alone.
    async fn unregister_client_from_group(&self, client: &str, group: &str)
        -> Result<(), ApiError>;

    async fn list_client_current_groups(&self, client: &str) -> Result<ClientGroups, ApiError>;
}

/// Encrypted key/value secret store.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn list_stored_secret_keys(&self) -> Result<SecretKeys, ApiError>;

    async fn create_secret(&self, key: &str, value: &str) -> Result<CreatedSecret, ApiError>;
}

/// Managed workload lifecycle.
#[async_trait]
pub trait WorkloadService: Send + Sync {
    async fn export_workload_config(&self, name: &str) -> Result<RunConfig, ApiError>;

    async fn create_workload(
        &self,
        request: &CreateWorkloadRequest,
    ) -> Result<CreatedWorkload, ApiError>;
}

/// Parse an exported secret binding of the form `<name>,target=<target>`.
///
/// A binding without a target maps the secret onto a field of the same name.
pub fn parse_secret_binding(binding: &str) -> StoredSecretReference {
    match binding.split_once(",target=") {
        Some((name, target)) => StoredSecretReference {
            name: name.to_string(),
            target: target.to_string(),
        },
        None => StoredSecretReference {
            name: binding.to_string(),
            target: binding.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_detection_is_case_insensitive() {
        assert!(ApiError::remote("Workload foo ALREADY EXISTS").is_name_conflict());
        assert!(ApiError::remote("409: already exists").is_name_conflict());
        assert!(!ApiError::remote("image pull failed").is_name_conflict());
        assert!(!ApiError::Transport("connection reset".into()).is_name_conflict());
    }

    #[test]
    fn not_found_message() {
        let err = ApiError::NotFound {
            kind: "group",
            name: "staging".into(),
        };
        assert_eq!(err.to_string(), "group 'staging' not found");
    }

    #[test]
    fn null_roster_deserializes() {
        let roster: GroupRoster =
            serde_json::from_str(r#"{"registered_clients": null}"#).unwrap();
        assert_eq!(roster.registered_clients, None);

        let roster: GroupRoster = serde_json::from_str("{}").unwrap();
        assert_eq!(roster.registered_clients, None);
    }

    #[test]
    fn secret_binding_with_target() {
        let parsed = parse_secret_binding("GITHUB_TOKEN_2,target=GITHUB_TOKEN");
        assert_eq!(parsed.name, "GITHUB_TOKEN_2");
        assert_eq!(parsed.target, "GITHUB_TOKEN");
    }

    #[test]
    fn secret_binding_without_target() {
        let parsed = parse_secret_binding("API_KEY");
        assert_eq!(parsed.name, "API_KEY");
        assert_eq!(parsed.target, "API_KEY");
    }
}
