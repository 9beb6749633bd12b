//! Integration tests for copying workloads with name-conflict retry.

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::Arc;

use hivesync::api::{ApiCall, ApiError, InMemoryApi, LocalState, Operation};
use hivesync::api::memory::WorkloadRecord;
use hivesync::hooks::{HookEvent, HookKind, HookRegistry};
use hivesync::workloads::{
    CloneOutcome, NamePrompt, NamePromptRequest, ProgressIndicator, RunConfig, WorkloadCloner,
};
use hivesync::Error;

// ============================================================================
// Fixtures
// ============================================================================

fn source_config() -> RunConfig {
    RunConfig {
        image: "ghcr.io/github/github-mcp-server:latest".into(),
        transport: "stdio".into(),
        cmd_args: vec!["--toolsets".into(), "repos".into()],
        env_vars: BTreeMap::from([("GITHUB_HOST".into(), "github.com".into())]),
        secrets: vec!["GITHUB_TOKEN_2,target=GITHUB_PERSONAL_ACCESS_TOKEN".into()],
        isolate_network: true,
        ..RunConfig::default()
    }
}

/// `github` lives in `default`; `foo` and `foo2` are already taken.
fn api() -> InMemoryApi {
    let mut state = LocalState::default();
    state.groups = ["default", "dev"].iter().map(|g| g.to_string()).collect();
    let record = |group: &str, config: RunConfig| WorkloadRecord {
        group: group.to_string(),
        config,
    };
    state
        .workloads
        .insert("github".into(), record("default", source_config()));
    state
        .workloads
        .insert("foo".into(), record("default", RunConfig::default()));
    state
        .workloads
        .insert("foo2".into(), record("dev", RunConfig::default()));
    InMemoryApi::new(state)
}

/// Answers prompts from a script and records what it was asked.
struct ScriptedPrompt {
    answers: Mutex<VecDeque<Option<&'static str>>>,
    asked: Mutex<Vec<NamePromptRequest>>,
}

impl ScriptedPrompt {
    fn new(answers: &[Option<&'static str>]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    fn asked(&self) -> Vec<NamePromptRequest> {
        self.asked.lock().clone()
    }
}

#[async_trait]
impl NamePrompt for ScriptedPrompt {
    async fn ask_name(&self, request: &NamePromptRequest) -> io::Result<Option<String>> {
        self.asked.lock().push(request.clone());
        match self.answers.lock().pop_front() {
            Some(answer) => Ok(answer.map(String::from)),
            None => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted")),
        }
    }
}

#[derive(Default)]
struct RecordingProgress {
    events: Mutex<Vec<String>>,
}

impl RecordingProgress {
    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl ProgressIndicator for RecordingProgress {
    fn loading(&self, _message: &str) {
        self.events.lock().push("loading".into());
    }

    fn dismiss(&self) {
        self.events.lock().push("dismiss".into());
    }

    fn success(&self, _message: &str) {
        self.events.lock().push("success".into());
    }

    fn failure(&self, message: &str) {
        self.events.lock().push(format!("failure: {message}"));
    }
}

fn created_names(api: &InMemoryApi) -> Vec<String> {
    api.calls()
        .into_iter()
        .filter_map(|call| match call {
            ApiCall::CreateWorkload { name, .. } => Some(name),
            _ => None,
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn retries_until_a_free_name_is_found() {
    let api = api();
    let prompt = ScriptedPrompt::new(&[Some("foo2"), Some("foo3")]);
    let progress = RecordingProgress::default();

    let outcome = WorkloadCloner::new(&api, &prompt, &progress)
        .clone_to_group("github", "dev", "foo")
        .await
        .unwrap();

    assert_eq!(
        outcome,
        CloneOutcome::Created {
            name: "foo3".into(),
            group: "dev".into(),
            retry_count: 2,
        }
    );
    assert_eq!(created_names(&api), vec!["foo", "foo2", "foo3"]);
    assert_eq!(api.count(Operation::ExportWorkload), 1);

    let rejected: Vec<Option<String>> = prompt.asked().into_iter().map(|r| r.rejected_name).collect();
    assert_eq!(rejected, vec![Some("foo".to_string()), Some("foo2".to_string())]);
    assert!(prompt.asked().iter().all(|r| r.validate_on_mount));
    assert_eq!(prompt.asked()[1].initial_value, "foo2");

    assert_eq!(
        progress.events(),
        vec!["loading", "dismiss", "loading", "dismiss", "loading", "success"]
    );
}

#[tokio::test]
async fn copy_keeps_the_exported_configuration() {
    let api = api();
    let prompt = ScriptedPrompt::new(&[Some("github-dev")]);
    let progress = RecordingProgress::default();

    WorkloadCloner::new(&api, &prompt, &progress)
        .clone_to_group("github", "dev", "foo")
        .await
        .unwrap();

    let state = api.state();
    let copy = &state.workloads["github-dev"];
    assert_eq!(copy.group, "dev");
    assert_eq!(copy.config, source_config());
}

#[tokio::test]
async fn rejected_name_is_refused_before_retrying() {
    let api = api();
    // Re-entering the rejected name and a blank name never reach the runtime.
    let prompt = ScriptedPrompt::new(&[Some("foo"), Some("  "), Some("foo-copy")]);
    let progress = RecordingProgress::default();

    let outcome = WorkloadCloner::new(&api, &prompt, &progress)
        .clone_to_group("github", "dev", "foo")
        .await
        .unwrap();

    assert_eq!(outcome.retry_count(), 1);
    assert_eq!(created_names(&api), vec!["foo", "foo-copy"]);
    assert_eq!(prompt.asked().len(), 3);
    assert!(prompt
        .asked()
        .iter()
        .all(|r| r.rejected_name.as_deref() == Some("foo")));
}

#[tokio::test]
async fn cancelling_the_prompt_is_not_an_error() {
    let api = api();
    let prompt = ScriptedPrompt::new(&[Some("foo2"), None]);
    let progress = RecordingProgress::default();

    let outcome = WorkloadCloner::new(&api, &prompt, &progress)
        .clone_to_group("github", "dev", "foo")
        .await
        .unwrap();

    assert_eq!(outcome, CloneOutcome::Cancelled { retry_count: 1 });
    assert_eq!(created_names(&api), vec!["foo", "foo2"]);
    assert!(!progress.events().iter().any(|e| e.starts_with("failure")));
}

#[tokio::test]
async fn other_errors_are_terminal() {
    let api = api();
    let prompt = ScriptedPrompt::new(&[]);
    let progress = RecordingProgress::default();

    let err = WorkloadCloner::new(&api, &prompt, &progress)
        .clone_to_group("github", "staging", "fresh")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Api(ApiError::NotFound { kind: "group", .. })));
    assert!(prompt.asked().is_empty());
    assert_eq!(
        progress.events(),
        vec!["loading", "dismiss", "failure: group 'staging' not found"]
    );
}

#[tokio::test]
async fn conflict_detection_ignores_case() {
    let api = api();
    api.fail_next(
        Operation::CreateWorkload,
        ApiError::remote("Workload 'fresh' ALREADY EXISTS in runtime"),
    );
    let prompt = ScriptedPrompt::new(&[Some("fresh-2")]);
    let progress = RecordingProgress::default();

    let outcome = WorkloadCloner::new(&api, &prompt, &progress)
        .clone_to_group("github", "dev", "fresh")
        .await
        .unwrap();
    assert_eq!(outcome.retry_count(), 1);
    assert!(api.state().workloads.contains_key("fresh-2"));
}

#[tokio::test]
async fn missing_source_fails_before_any_create() {
    let api = api();
    let prompt = ScriptedPrompt::new(&[]);
    let progress = RecordingProgress::default();

    let err = WorkloadCloner::new(&api, &prompt, &progress)
        .clone_to_group("nope", "dev", "nope")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Api(ApiError::NotFound { kind: "workload", .. })));
    assert_eq!(api.count(Operation::CreateWorkload), 0);
}

#[tokio::test]
async fn prompt_failure_surfaces_as_prompt_error() {
    let api = api();
    let prompt = ScriptedPrompt::new(&[]);
    let progress = RecordingProgress::default();

    let err = WorkloadCloner::new(&api, &prompt, &progress)
        .clone_to_group("github", "dev", "foo")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Prompt(ref msg) if msg.contains("script exhausted")));
}

#[tokio::test]
async fn success_reports_retries_to_hooks() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let mut hooks = HookRegistry::new();
    let sink = seen.clone();
    hooks.on(
        HookKind::WorkloadCloned,
        Arc::new(move |event: &HookEvent| sink.lock().push(event.clone())),
    );

    let api = api();
    let prompt = ScriptedPrompt::new(&[Some("foo2"), Some("foo3")]);
    let progress = RecordingProgress::default();
    WorkloadCloner::new(&api, &prompt, &progress)
        .with_hooks(&hooks)
        .clone_to_group("github", "dev", "foo")
        .await
        .unwrap();

    assert_eq!(
        *seen.lock(),
        vec![HookEvent::WorkloadCloned {
            source: "github".into(),
            name: "foo3".into(),
            group: "dev".into(),
            retries: 2,
        }]
    );
}
