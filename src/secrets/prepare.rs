//! Filtering, partitioning and key selection for secret fields.

use super::types::{PreparedSecret, SecretFieldValue};
use crate::naming::KeyNamespace;
use tracing::{debug, warn};

/// Drop fields with an empty name or an empty secret value.
///
/// Half-filled rows are expected input and are not an error.
pub fn filter_secret_fields(fields: Vec<SecretFieldValue>) -> Vec<SecretFieldValue> {
    let total = fields.len();
    let kept: Vec<SecretFieldValue> = fields
        .into_iter()
        .filter(|f| !f.name.is_empty() && !f.value.secret.is_empty())
        .collect();
    if kept.len() < total {
        debug!("Skipped {} incomplete secret field(s)", total - kept.len());
    }
    kept
}

/// Split fields into `(new, existing)` by whether the value is already in
/// the store. Order is preserved within each half.
pub fn partition_secret_fields(
    fields: Vec<SecretFieldValue>,
) -> (Vec<SecretFieldValue>, Vec<SecretFieldValue>) {
    fields.into_iter().partition(|f| !f.value.is_from_store)
}

/// Choose a store key for each new secret.
///
/// Each chosen key is claimed in `namespace` before the next secret is
/// resolved, so keys are unique against the snapshot and within the batch.
pub fn prepare_secrets(
    new_secrets: &[SecretFieldValue],
    namespace: &mut KeyNamespace,
) -> Vec<PreparedSecret> {
    new_secrets
        .iter()
        .filter_map(|field| {
            if field.value.is_from_store {
                warn!(
                    "Secret field '{}' refers to a stored secret; not recreating it",
                    field.name
                );
                return None;
            }

            let key = namespace.claim(&field.name);
            if key != field.name {
                debug!("Secret key '{}' is taken, using '{}'", field.name, key);
            }
            Some(PreparedSecret {
                secret_store_key: key,
                target: field.name.clone(),
                value: field.value.secret.clone(),
            })
        })
        .collect()
}
