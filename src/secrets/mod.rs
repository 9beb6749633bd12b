//! Secret provisioning for workload configuration.
//!
//! Turns the secret fields a workload needs into stored-secret references:
//! 1. **Filter**: drop fields with no name or no value
//! 2. **Partition**: fields already in the store pass through untouched
//! 3. **Prepare**: pick a collision-free store key for each new secret
//! 4. **Provision**: create the secrets one at a time, reporting progress

pub mod prepare;
pub mod provision;
pub mod types;

pub use prepare::{filter_secret_fields, partition_secret_fields, prepare_secrets};
pub use provision::{provision_secrets, save_secrets, Pacing, SecretProvisioner};
pub use types::{
    redact_secret, PreparedSecret, ProvisionedSecrets, SecretFieldValue, SecretValue,
    StoredSecretReference,
};
