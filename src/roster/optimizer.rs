//! Shadow group used by the optimizer feature.
//!
//! While the optimizer is enabled its fixed group carries the same clients as
//! the group the optimizer serves. Moving the optimizer off a group gives that
//! group its clients back.

use super::diff::diff_membership;
use super::reconcile::{add_client_to_group, apply_diff, AppliedChanges};
use crate::api::ClientRegistry;
use crate::error::{Error, MembershipFailure, MembershipOp, Result};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Name of the optimizer's shadow group.
pub const OPTIMIZER_GROUP_NAME: &str = "mcp-optimizer---";

/// Converge `shadow_group` to `desired`.
///
/// The shadow roster is always fetched and diffed, even when its size
/// already matches: a client can be in the shadow group through a different
/// source group and still has to leave it.
pub async fn mirror_to_shadow<R>(
    registry: &R,
    shadow_group: &str,
    desired: &BTreeSet<String>,
) -> Result<AppliedChanges>
where
    R: ClientRegistry + ?Sized,
{
    let roster = registry.list_group_roster(shadow_group).await?;
    let diff = diff_membership(roster.registered_clients.as_deref(), desired);
    if !diff.is_empty() {
        info!(
            "Syncing shadow group '{}': {} to add, {} to remove",
            shadow_group,
            diff.to_add.len(),
            diff.to_remove.len()
        );
    }
    apply_diff(registry, shadow_group, &diff).await
}

/// Register every client of `shadow_group` back to `target_group`.
///
/// Returns the clients restored. An empty shadow group is a no-op.
pub async fn restore_clients_to_group<R>(
    registry: &R,
    shadow_group: &str,
    target_group: &str,
) -> Result<Vec<String>>
where
    R: ClientRegistry + ?Sized,
{
    let roster = registry.list_group_roster(shadow_group).await?;
    let clients = roster.registered_clients.unwrap_or_default();
    if clients.is_empty() {
        info!("No clients to restore from '{}'", shadow_group);
        return Ok(Vec::new());
    }

    let mut restored = Vec::with_capacity(clients.len());
    let mut failures = Vec::new();
    for client in clients {
        match add_client_to_group(registry, &client, target_group).await {
            Ok(()) => restored.push(client),
            Err(error) => {
                warn!("Failed to restore '{}' to '{}': {}", client, target_group, error);
                failures.push(MembershipFailure {
                    client,
                    op: MembershipOp::Register,
                    error,
                });
            }
        }
    }

    if !failures.is_empty() {
        return Err(Error::Membership {
            group: target_group.to_string(),
            failures,
        });
    }

    info!(
        "Restored clients {} to group '{}'",
        restored.join(", "),
        target_group
    );
    Ok(restored)
}

/// Hand the shadow group over from `previous` to `next`.
///
/// When the optimizer served a different group before, that group gets the
/// shadow group's clients back first. Returns the clients restored.
pub async fn move_optimizer<R>(
    registry: &R,
    shadow_group: &str,
    previous: Option<&str>,
    next: &str,
) -> Result<Vec<String>>
where
    R: ClientRegistry + ?Sized,
{
    match previous {
        Some(previous) if previous != next => {
            info!("Optimizer moves from group '{}' to '{}'", previous, next);
            restore_clients_to_group(registry, shadow_group, previous).await
        }
        _ => Ok(Vec::new()),
    }
}
