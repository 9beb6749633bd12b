//! Converge a group's client roster to a desired set of toggles.
//!
//! A run fetches the group's roster, diffs it against the enabled toggles and
//! issues one register or unregister per changed client. When a shadow group
//! is configured the same desired roster is then mirrored into it.

use super::diff::{desired_roster, diff_membership, MembershipDiff};
use super::optimizer::mirror_to_shadow;
use crate::api::{ApiError, ClientRegistry};
use crate::error::{Error, MembershipFailure, MembershipOp, Result};
use crate::hooks::{HookEvent, HookRegistry};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Changes applied to one group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AppliedChanges {
    pub group: String,
    pub added: Vec<String>,
    pub removed: Vec<String>,
}

impl AppliedChanges {
    fn empty(group: &str) -> Self {
        Self {
            group: group.to_string(),
            ..Self::default()
        }
    }

    pub fn changes_count(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

/// Result of a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub target: AppliedChanges,
    /// Present when shadow mirroring ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow: Option<AppliedChanges>,
}

impl ReconcileSummary {
    pub fn changes_count(&self) -> usize {
        self.target.changes_count() + self.shadow.as_ref().map_or(0, AppliedChanges::changes_count)
    }
}

/// Register `client` to `group` on top of the groups it already belongs to.
pub async fn add_client_to_group<R>(registry: &R, client: &str, group: &str) -> Result<(), ApiError>
where
    R: ClientRegistry + ?Sized,
{
    let mut groups = registry.list_client_current_groups(client).await?.groups;
    if !groups.iter().any(|g| g == group) {
        groups.push(group.to_string());
    }
    debug!("Registering '{}' to groups {:?}", client, groups);
    registry.register_client_to_groups(client, &groups).await
}

/// Remove `client` from `group` only.
pub async fn remove_client_from_group<R>(
    registry: &R,
    client: &str,
    group: &str,
) -> Result<(), ApiError>
where
    R: ClientRegistry + ?Sized,
{
    debug!("Unregistering '{}' from group '{}'", client, group);
    registry.unregister_client_from_group(client, group).await
}

/// Apply a diff to `group`, one request at a time: adds first, then
/// removes. A failure does not stop the remaining requests or undo the ones
/// that succeeded.
pub async fn apply_diff<R>(registry: &R, group: &str, diff: &MembershipDiff) -> Result<AppliedChanges>
where
    R: ClientRegistry + ?Sized,
{
    let mut applied = AppliedChanges::empty(group);
    if diff.is_empty() {
        debug!("Group '{}' already matches, no changes", group);
        return Ok(applied);
    }

    let mut failures = Vec::new();
    let planned = diff
        .to_add
        .iter()
        .map(|client| (client, MembershipOp::Register))
        .chain(diff.to_remove.iter().map(|client| (client, MembershipOp::Unregister)));

    for (client, op) in planned {
        let result = match op {
            MembershipOp::Register => add_client_to_group(registry, client, group).await,
            MembershipOp::Unregister => remove_client_from_group(registry, client, group).await,
        };
        match result {
            Ok(()) if op == MembershipOp::Register => applied.added.push(client.clone()),
            Ok(()) => applied.removed.push(client.clone()),
            Err(error) => {
                warn!("Failed to {} '{}' for group '{}': {}", op, client, group, error);
                failures.push(MembershipFailure {
                    client: client.clone(),
                    op,
                    error,
                });
            }
        }
    }

    if !failures.is_empty() {
        return Err(Error::Membership {
            group: group.to_string(),
            failures,
        });
    }
    Ok(applied)
}

/// Reconciles client rosters, optionally mirroring into a shadow group.
pub struct GroupReconciler<'a, R: ClientRegistry + ?Sized> {
    registry: &'a R,
    shadow_group: Option<String>,
    hooks: Option<&'a HookRegistry>,
}

impl<'a, R: ClientRegistry + ?Sized> GroupReconciler<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self {
            registry,
            shadow_group: None,
            hooks: None,
        }
    }

    /// Mirror every reconciled roster into `group` as well.
    pub fn with_shadow_group(mut self, group: impl Into<String>) -> Self {
        self.shadow_group = Some(group.into());
        self
    }

    pub fn with_hooks(mut self, hooks: &'a HookRegistry) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Fetch the group's roster and diff it against `toggles` without
    /// changing anything.
    pub async fn plan(&self, group: &str, toggles: &BTreeMap<String, bool>) -> Result<MembershipDiff> {
        let desired = desired_roster(toggles);
        self.diff_against(group, &desired).await
    }

    async fn diff_against(&self, group: &str, desired: &BTreeSet<String>) -> Result<MembershipDiff> {
        let roster = self.registry.list_group_roster(group).await?;
        Ok(diff_membership(roster.registered_clients.as_deref(), desired))
    }

    /// Converge `group` to the clients enabled in `toggles`.
    ///
    /// Target and shadow groups are reconciled one after the other with no
    /// rollback between them. If the target group fails, the shadow group is
    /// not touched.
    pub async fn reconcile(
        &self,
        group: &str,
        toggles: &BTreeMap<String, bool>,
    ) -> Result<ReconcileSummary> {
        let desired = desired_roster(toggles);
        let diff = self.diff_against(group, &desired).await?;
        info!(
            "Reconciling group '{}': {} to add, {} to remove",
            group,
            diff.to_add.len(),
            diff.to_remove.len()
        );

        let target = apply_diff(self.registry, group, &diff).await?;

        let shadow = match self.shadow_group.as_deref() {
            Some(shadow) if shadow != group => {
                Some(mirror_to_shadow(self.registry, shadow, &desired).await?)
            }
            Some(_) => {
                warn!("Shadow group is the reconciled group '{}', skipping mirror", group);
                None
            }
            None => None,
        };

        let summary = ReconcileSummary { target, shadow };
        if summary.changes_count() > 0 {
            info!(
                "Group '{}' reconciled with {} change(s)",
                group,
                summary.changes_count()
            );
            if let Some(hooks) = self.hooks {
                hooks.emit(HookEvent::ClientsReconciled {
                    group: group.to_string(),
                    added: summary.target.added.len(),
                    removed: summary.target.removed.len(),
                    shadow_added: summary.shadow.as_ref().map_or(0, |s| s.added.len()),
                    shadow_removed: summary.shadow.as_ref().map_or(0, |s| s.removed.len()),
                });
            }
        }
        Ok(summary)
    }
}
