//! Integration tests for group reconciliation with optimizer mirroring.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use hivesync::api::{
    ApiCall, ApiError, ClientGroups, ClientRegistry, GroupRoster, InMemoryApi, LocalState,
    Operation,
};
use hivesync::hooks::{HookEvent, HookKind, HookRegistry};
use hivesync::roster::{
    move_optimizer, restore_clients_to_group, GroupReconciler, OPTIMIZER_GROUP_NAME,
};
use hivesync::Error;
use parking_lot::Mutex;

const SHADOW: &str = OPTIMIZER_GROUP_NAME;

fn api(clients: &[(&str, &[&str])]) -> InMemoryApi {
    let mut state = LocalState::default();
    state.groups = ["default", "research", SHADOW]
        .iter()
        .map(|g| g.to_string())
        .collect();
    for (client, groups) in clients {
        state
            .clients
            .insert(client.to_string(), groups.iter().map(|g| g.to_string()).collect());
    }
    InMemoryApi::new(state)
}

fn toggles(items: &[(&str, bool)]) -> BTreeMap<String, bool> {
    items.iter().map(|(c, on)| (c.to_string(), *on)).collect()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// `default: [vscode, cursor]`, shadow: `[cursor]`.
fn optimizer_scenario() -> InMemoryApi {
    api(&[
        ("vscode", &["default"]),
        ("cursor", &["default", SHADOW]),
    ])
}

fn desired() -> BTreeMap<String, bool> {
    toggles(&[("vscode", false), ("cursor", true), ("claude-code", true)])
}

#[tokio::test]
async fn target_group_gets_minimal_calls() {
    let api = optimizer_scenario();
    let summary = GroupReconciler::new(&api)
        .reconcile("default", &desired())
        .await
        .unwrap();

    assert_eq!(summary.target.added, strings(&["claude-code"]));
    assert_eq!(summary.target.removed, strings(&["vscode"]));
    assert!(summary.shadow.is_none());

    let mutations = api.mutations();
    assert_eq!(mutations.len(), 2);
    assert!(mutations.contains(&ApiCall::UnregisterClient {
        client: "vscode".into(),
        group: "default".into(),
    }));
    assert!(mutations.contains(&ApiCall::RegisterClient {
        client: "claude-code".into(),
        groups: strings(&["default"]),
    }));
    assert_eq!(api.state().roster("default"), set(&["claude-code", "cursor"]));
}

#[tokio::test]
async fn shadow_group_converges_without_redundant_calls() {
    let api = optimizer_scenario();
    let summary = GroupReconciler::new(&api)
        .with_shadow_group(SHADOW)
        .reconcile("default", &desired())
        .await
        .unwrap();

    let shadow = summary.shadow.clone().unwrap();
    assert_eq!(shadow.added, strings(&["claude-code"]));
    assert!(shadow.removed.is_empty());
    assert_eq!(summary.changes_count(), 3);

    // Shadow registration extends the memberships gained a moment earlier.
    let registers: Vec<ApiCall> = api
        .mutations()
        .into_iter()
        .filter(|c| c.operation() == Operation::RegisterClient)
        .collect();
    assert_eq!(
        registers,
        vec![
            ApiCall::RegisterClient {
                client: "claude-code".into(),
                groups: strings(&["default"]),
            },
            ApiCall::RegisterClient {
                client: "claude-code".into(),
                groups: strings(&["default", SHADOW]),
            },
        ]
    );
    // Nothing for cursor, which already sits in both groups.
    assert!(!api.mutations().iter().any(|c| matches!(
        c,
        ApiCall::RegisterClient { client, .. } | ApiCall::UnregisterClient { client, .. }
            if client == "cursor"
    )));

    let state = api.state();
    assert_eq!(state.roster(SHADOW), set(&["claude-code", "cursor"]));
    assert_eq!(state.roster(SHADOW), state.roster("default"));
}

#[tokio::test]
async fn second_run_is_idempotent() {
    let api = optimizer_scenario();
    let reconciler = GroupReconciler::new(&api).with_shadow_group(SHADOW);
    reconciler.reconcile("default", &desired()).await.unwrap();
    api.clear_calls();

    let summary = reconciler.reconcile("default", &desired()).await.unwrap();
    assert_eq!(summary.changes_count(), 0);
    assert!(api.mutations().is_empty());
    assert_eq!(api.count(Operation::ListGroupRoster), 2);
}

#[tokio::test]
async fn shadow_drops_clients_leaving_through_another_group() {
    // Same size as desired, but vscode reached the shadow group from
    // another source group.
    let api = api(&[
        ("cursor", &["default"]),
        ("vscode", &["research", SHADOW]),
    ]);
    let summary = GroupReconciler::new(&api)
        .with_shadow_group(SHADOW)
        .reconcile("default", &toggles(&[("cursor", true)]))
        .await
        .unwrap();

    assert_eq!(summary.target.changes_count(), 0);
    let shadow = summary.shadow.unwrap();
    assert_eq!(shadow.added, strings(&["cursor"]));
    assert_eq!(shadow.removed, strings(&["vscode"]));
    assert!(api.state().roster("research").contains("vscode"));
}

#[tokio::test]
async fn shadow_failure_keeps_target_changes() {
    let api = api(&[("vscode", &["default"]), ("cursor", &["default"])]);
    // Target only unregisters; the first register is the shadow's.
    api.fail_next(Operation::RegisterClient, ApiError::remote("shadow offline"));

    let err = GroupReconciler::new(&api)
        .with_shadow_group(SHADOW)
        .reconcile("default", &toggles(&[("cursor", true), ("vscode", false)]))
        .await
        .unwrap_err();

    match err {
        Error::Membership { group, failures } => {
            assert_eq!(group, SHADOW);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].client, "cursor");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(api.state().roster("default"), set(&["cursor"]));
    assert!(api.state().roster(SHADOW).is_empty());
}

#[tokio::test]
async fn target_failure_skips_shadow() {
    let api = optimizer_scenario();
    api.fail_next(Operation::UnregisterClient, ApiError::remote("locked"));

    let err = GroupReconciler::new(&api)
        .with_shadow_group(SHADOW)
        .reconcile("default", &desired())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Membership { ref group, .. } if group == "default"));
    // The independent add still went through.
    assert!(api.state().roster("default").contains("claude-code"));
    assert!(!api
        .calls()
        .contains(&ApiCall::ListGroupRoster { group: SHADOW.into() }));
}

#[tokio::test]
async fn summary_event_fires_only_on_change() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let mut hooks = HookRegistry::new();
    let seen = events.clone();
    hooks.on(
        HookKind::ClientsReconciled,
        Arc::new(move |event: &HookEvent| seen.lock().push(event.clone())),
    );

    let api = optimizer_scenario();
    let reconciler = GroupReconciler::new(&api)
        .with_shadow_group(SHADOW)
        .with_hooks(&hooks);
    reconciler.reconcile("default", &desired()).await.unwrap();
    reconciler.reconcile("default", &desired()).await.unwrap();

    assert_eq!(
        *events.lock(),
        vec![HookEvent::ClientsReconciled {
            group: "default".into(),
            added: 1,
            removed: 1,
            shadow_added: 1,
            shadow_removed: 0,
        }]
    );
}

#[tokio::test]
async fn restore_extends_memberships() {
    let api = api(&[("cursor", &[SHADOW]), ("vscode", &[SHADOW, "research"])]);
    let restored = restore_clients_to_group(&api, SHADOW, "default").await.unwrap();

    assert_eq!(restored, strings(&["cursor", "vscode"]));
    let state = api.state();
    assert_eq!(state.roster("default"), set(&["cursor", "vscode"]));
    assert_eq!(
        state.clients["vscode"],
        set(&["default", "research", SHADOW])
    );
}

#[tokio::test]
async fn unknown_group_is_a_remote_error() {
    let api = optimizer_scenario();
    let err = GroupReconciler::new(&api)
        .reconcile("staging", &desired())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Api(ApiError::NotFound { .. })));
}

#[tokio::test]
async fn moving_optimizer_restores_previous_group_then_mirrors() {
    // The optimizer served `research`; its clients sit in the shadow group.
    let api = api(&[("cursor", &[SHADOW]), ("vscode", &["default"])]);

    let restored = move_optimizer(&api, SHADOW, Some("research"), "default")
        .await
        .unwrap();
    assert_eq!(restored, strings(&["cursor"]));

    GroupReconciler::new(&api)
        .with_shadow_group(SHADOW)
        .reconcile("default", &toggles(&[("vscode", true)]))
        .await
        .unwrap();

    let state = api.state();
    assert_eq!(state.roster("research"), set(&["cursor"]));
    assert_eq!(state.roster(SHADOW), set(&["vscode"]));
    assert_eq!(state.roster("default"), set(&["vscode"]));
}

// ============================================================================
// Recording registry
// ============================================================================

/// Logs the start and end of every membership change and yields in between,
/// so overlapping requests would interleave in the log.
struct RecordingRegistry {
    roster: Vec<String>,
    events: Mutex<Vec<String>>,
}

impl RecordingRegistry {
    fn new(roster: &[&str]) -> Self {
        Self {
            roster: strings(roster),
            events: Mutex::new(Vec::new()),
        }
    }

    async fn record(&self, label: String) {
        self.events.lock().push(format!("start {label}"));
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.events.lock().push(format!("end {label}"));
    }
}

#[async_trait]
impl ClientRegistry for RecordingRegistry {
    async fn list_group_roster(&self, _group: &str) -> Result<GroupRoster, ApiError> {
        Ok(GroupRoster {
            registered_clients: Some(self.roster.clone()),
        })
    }

    async fn register_client_to_groups(
        &self,
        client: &str,
        _groups: &[String],
    ) -> Result<(), ApiError> {
        self.record(format!("reg {client}")).await;
        Ok(())
    }

    async fn unregister_client_from_group(
        &self,
        client: &str,
        _group: &str,
    ) -> Result<(), ApiError> {
        self.record(format!("unreg {client}")).await;
        Ok(())
    }

    async fn list_client_current_groups(&self, _client: &str) -> Result<ClientGroups, ApiError> {
        Ok(ClientGroups { groups: vec![] })
    }
}

#[tokio::test]
async fn membership_changes_never_overlap() {
    let registry = RecordingRegistry::new(&["a", "b"]);
    let summary = GroupReconciler::new(&registry)
        .reconcile("default", &toggles(&[("a", false), ("b", false), ("c", true)]))
        .await
        .unwrap();

    assert_eq!(summary.target.changes_count(), 3);
    assert_eq!(
        *registry.events.lock(),
        vec![
            "start reg c",
            "end reg c",
            "start unreg a",
            "end unreg a",
            "start unreg b",
            "end unreg b",
        ]
    );
}
