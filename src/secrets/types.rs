//! Core types for secret provisioning.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Input
// ============================================================================

/// Raw secret material entered for one field.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretValue {
    /// Plain secret text, or the store key when `is_from_store` is set.
    pub secret: String,
    /// The value names a secret that is already in the store.
    #[serde(default)]
    pub is_from_store: bool,
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = if self.is_from_store {
            self.secret.clone()
        } else {
            redact_secret(&self.secret)
        };
        f.debug_struct("SecretValue")
            .field("secret", &shown)
            .field("is_from_store", &self.is_from_store)
            .finish()
    }
}

/// A secret destined for a named field of a workload's configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretFieldValue {
    /// Target field in the workload config.
    pub name: String,
    pub value: SecretValue,
}

impl SecretFieldValue {
    /// A secret that still has to be created in the store.
    pub fn new_secret(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: SecretValue {
                secret: secret.into(),
                is_from_store: false,
            },
        }
    }

    /// A reference to a secret that already exists under `key`.
    pub fn from_store(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: SecretValue {
                secret: key.into(),
                is_from_store: true,
            },
        }
    }
}

// ============================================================================
// Pipeline stages
// ============================================================================

/// A new secret with its collision-free store key chosen.
#[derive(Clone, PartialEq, Eq)]
pub struct PreparedSecret {
    pub secret_store_key: String,
    /// Original field name.
    pub target: String,
    pub value: String,
}

impl fmt::Debug for PreparedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedSecret")
            .field("secret_store_key", &self.secret_store_key)
            .field("target", &self.target)
            .field("value", &redact_secret(&self.value))
            .finish()
    }
}

/// Binding of a stored secret to a workload field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoredSecretReference {
    /// Key the secret is stored under.
    pub name: String,
    /// Workload field it fills.
    pub target: String,
}

/// Outcome of a provisioning run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedSecrets {
    /// Secrets created by this run, in input order.
    pub newly_created_secrets: Vec<StoredSecretReference>,
    /// Store references passed through unchanged.
    pub existing_secrets: Vec<SecretFieldValue>,
}

impl ProvisionedSecrets {
    /// All bindings the workload should receive, new first.
    pub fn bindings(&self) -> Vec<StoredSecretReference> {
        self.newly_created_secrets
            .iter()
            .cloned()
            .chain(self.existing_secrets.iter().map(|s| StoredSecretReference {
                name: s.value.secret.clone(),
                target: s.name.clone(),
            }))
            .collect()
    }
}

/// Redact a secret value for display (first 2 and last 2 chars).
pub fn redact_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 6 {
        return "***".to_string();
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}…{tail}")
}
