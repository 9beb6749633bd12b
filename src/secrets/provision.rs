//! Serial secret creation with progress reporting.

use super::prepare::{filter_secret_fields, partition_secret_fields, prepare_secrets};
use super::types::{PreparedSecret, ProvisionedSecrets, SecretFieldValue, StoredSecretReference};
use crate::api::{ApiError, SecretStore};
use crate::config::PacingConfig;
use crate::error::{Error, Result};
use crate::hooks::{HookEvent, HookRegistry};
use crate::naming::KeyNamespace;
use rand::Rng;
use std::time::Duration;
use tracing::{debug, error, info};

// ============================================================================
// Pacing
// ============================================================================

/// Pause inserted between consecutive secret creations so a progress
/// indicator can show each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    Disabled,
    /// Uniformly random pause in `min..=max`.
    Random { min: Duration, max: Duration },
}

impl Pacing {
    pub fn from_config(config: &PacingConfig) -> Self {
        if !config.enabled {
            return Pacing::Disabled;
        }
        let min = config.min_ms.min(config.max_ms);
        let max = config.min_ms.max(config.max_ms);
        Pacing::Random {
            min: Duration::from_millis(min),
            max: Duration::from_millis(max),
        }
    }

    /// The next pause to apply, if any.
    pub fn next_delay(&self) -> Option<Duration> {
        match *self {
            Pacing::Disabled => None,
            Pacing::Random { min, max } if max <= min => Some(min),
            Pacing::Random { min, max } => {
                let (lo, hi) = (min.as_millis() as u64, max.as_millis() as u64);
                Some(Duration::from_millis(rand::thread_rng().gen_range(lo..=hi)))
            }
        }
    }

    async fn pause(&self) {
        if let Some(delay) = self.next_delay() {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::from_config(&PacingConfig::default())
    }
}

// ============================================================================
// Creation
// ============================================================================

/// Create prepared secrets one after another.
///
/// `on_success(completed, total)` fires after each create; `on_error` fires
/// with the failing secret before the error is returned. Secrets created
/// before a failure stay created.
pub async fn save_secrets<S, F, E>(
    store: &S,
    secrets: &[PreparedSecret],
    pacing: Pacing,
    mut on_success: F,
    mut on_error: E,
) -> Result<Vec<StoredSecretReference>>
where
    S: SecretStore + ?Sized,
    F: FnMut(usize, usize),
    E: FnMut(&ApiError, &PreparedSecret),
{
    let total = secrets.len();
    let mut created = Vec::with_capacity(total);

    for (index, secret) in secrets.iter().enumerate() {
        if index > 0 {
            pacing.pause().await;
        }

        debug!("Creating secret '{}' ({}/{})", secret.secret_store_key, index + 1, total);
        let response = match store
            .create_secret(&secret.secret_store_key, &secret.value)
            .await
        {
            Ok(response) => response,
            Err(err) => {
                error!("Failed to create secret '{}': {}", secret.secret_store_key, err);
                on_error(&err, secret);
                return Err(err.into());
            }
        };

        if response.key.is_empty() {
            error!(
                "Secret store returned an empty key for '{}'",
                secret.secret_store_key
            );
            return Err(Error::EmptySecretKey {
                key: secret.secret_store_key.clone(),
            });
        }

        on_success(index + 1, total);
        created.push(StoredSecretReference {
            name: response.key,
            target: secret.target.clone(),
        });
    }

    Ok(created)
}

/// Runs the full provisioning pipeline against one secret store.
pub struct SecretProvisioner<'a, S: SecretStore + ?Sized> {
    store: &'a S,
    pacing: Pacing,
    hooks: Option<&'a HookRegistry>,
}

impl<'a, S: SecretStore + ?Sized> SecretProvisioner<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            pacing: Pacing::default(),
            hooks: None,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_hooks(mut self, hooks: &'a HookRegistry) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Create every new secret in `fields` under a collision-free key and
    /// pass store references through.
    ///
    /// The store's key list is fetched on every call and extended in memory
    /// as keys are chosen. It is not re-checked against the store between
    /// creations.
    pub async fn provision<F, E>(
        &self,
        fields: Vec<SecretFieldValue>,
        on_success: F,
        on_error: E,
    ) -> Result<ProvisionedSecrets>
    where
        F: FnMut(usize, usize),
        E: FnMut(&ApiError, &PreparedSecret),
    {
        let (new_secrets, existing_secrets) = partition_secret_fields(filter_secret_fields(fields));

        let snapshot = self.store.list_stored_secret_keys().await?;
        let mut namespace = KeyNamespace::from_snapshot(snapshot.keys);
        let prepared = prepare_secrets(&new_secrets, &mut namespace);

        let newly_created_secrets = if prepared.is_empty() {
            Vec::new()
        } else {
            save_secrets(self.store, &prepared, self.pacing, on_success, on_error).await?
        };

        info!(
            "Secrets provisioned: {} created, {} from store",
            newly_created_secrets.len(),
            existing_secrets.len()
        );

        if let Some(hooks) = self.hooks {
            hooks.emit(HookEvent::SecretsProvisioned {
                created: newly_created_secrets.iter().map(|s| s.name.clone()).collect(),
                from_store: existing_secrets.len(),
            });
        }

        Ok(ProvisionedSecrets {
            newly_created_secrets,
            existing_secrets,
        })
    }
}

/// Provision `fields` with the given pacing and callbacks.
pub async fn provision_secrets<S, F, E>(
    store: &S,
    fields: Vec<SecretFieldValue>,
    pacing: Pacing,
    on_success: F,
    on_error: E,
) -> Result<ProvisionedSecrets>
where
    S: SecretStore + ?Sized,
    F: FnMut(usize, usize),
    E: FnMut(&ApiError, &PreparedSecret),
{
    SecretProvisioner::new(store)
        .with_pacing(pacing)
        .provision(fields, on_success, on_error)
        .await
}
