//! Set difference between an actual and a desired roster.

use std::collections::{BTreeMap, BTreeSet};

/// Changes needed to turn `current` into `desired`.
///
/// `to_add` and `to_remove` are always disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipDiff {
    /// In `desired` but not `current`.
    pub to_add: BTreeSet<String>,
    /// In `current` but not `desired`.
    pub to_remove: BTreeSet<String>,
}

impl MembershipDiff {
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }

    pub fn changes_count(&self) -> usize {
        self.to_add.len() + self.to_remove.len()
    }
}

/// Diff two rosters.
pub fn diff_sets(current: &BTreeSet<String>, desired: &BTreeSet<String>) -> MembershipDiff {
    MembershipDiff {
        to_add: desired.difference(current).cloned().collect(),
        to_remove: current.difference(desired).cloned().collect(),
    }
}

/// Diff a roster as reported by the runtime, where `None` means empty.
pub fn diff_membership(current: Option<&[String]>, desired: &BTreeSet<String>) -> MembershipDiff {
    let current: BTreeSet<String> = current.unwrap_or_default().iter().cloned().collect();
    diff_sets(&current, desired)
}

/// Clients whose toggle is on.
pub fn desired_roster(toggles: &BTreeMap<String, bool>) -> BTreeSet<String> {
    toggles
        .iter()
        .filter(|(_, enabled)| **enabled)
        .map(|(client, _)| client.clone())
        .collect()
}
