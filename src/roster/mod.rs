//! Client roster reconciliation for groups.

pub mod diff;
pub mod optimizer;
pub mod reconcile;

pub use diff::{desired_roster, diff_membership, diff_sets, MembershipDiff};
pub use optimizer::{
    mirror_to_shadow, move_optimizer, restore_clients_to_group, OPTIMIZER_GROUP_NAME,
};
pub use reconcile::{
    add_client_to_group, apply_diff, remove_client_from_group, AppliedChanges, GroupReconciler,
    ReconcileSummary,
};
