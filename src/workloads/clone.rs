//! Copy a workload into another group, retrying under a new name whenever
//! the runtime reports the name as taken.
//!
//! ```text
//! AttemptCreate ─ ok ──────────────► Created
//!      │ "already exists"
//!      ▼
//! PromptForName ─ name ─► AttemptCreate
//!      │ cancel
//!      ▼
//!  Cancelled                 (any other error ─► Err)
//! ```

use super::prompt::{NamePrompt, NamePromptRequest};
use super::types::CreateWorkloadRequest;
use crate::api::WorkloadService;
use crate::error::{Error, Result};
use crate::hooks::{HookEvent, HookRegistry};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{info, warn};

// ============================================================================
// Progress feedback
// ============================================================================

/// In-flight feedback shown while a create is running.
pub trait ProgressIndicator: Send + Sync {
    fn loading(&self, message: &str);
    /// Hide the loading feedback without a result.
    fn dismiss(&self);
    fn success(&self, message: &str);
    fn failure(&self, message: &str);
}

/// Progress reported through the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressIndicator for LogProgress {
    fn loading(&self, message: &str) {
        info!("{message}");
    }

    fn dismiss(&self) {}

    fn success(&self, message: &str) {
        info!("{message}");
    }

    fn failure(&self, message: &str) {
        warn!("{message}");
    }
}

// ============================================================================
// Retry state
// ============================================================================

/// Bookkeeping for one clone attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRetryState {
    pub attempted_name: String,
    pub rejected_names: BTreeSet<String>,
    /// Number of retries started; for reporting only.
    pub retry_count: u32,
}

impl ConflictRetryState {
    pub fn new(name: &str) -> Self {
        Self {
            attempted_name: name.to_string(),
            rejected_names: BTreeSet::new(),
            retry_count: 0,
        }
    }

    /// Record that the runtime rejected the current name.
    pub fn reject_current(&mut self) {
        self.rejected_names.insert(self.attempted_name.clone());
    }

    /// Prompt pre-filled with the rejected name, which the validator refuses.
    pub fn prompt_request(&self) -> NamePromptRequest {
        NamePromptRequest {
            initial_value: self.attempted_name.clone(),
            rejected_name: Some(self.attempted_name.clone()),
            validate_on_mount: true,
        }
    }

    pub fn retry_with(&mut self, name: String) {
        self.attempted_name = name;
        self.retry_count += 1;
    }
}

/// How a clone finished when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CloneOutcome {
    Created {
        name: String,
        group: String,
        retry_count: u32,
    },
    /// The operator closed the name prompt.
    Cancelled { retry_count: u32 },
}

impl CloneOutcome {
    pub fn retry_count(&self) -> u32 {
        match self {
            CloneOutcome::Created { retry_count, .. } | CloneOutcome::Cancelled { retry_count } => {
                *retry_count
            }
        }
    }
}

// ============================================================================
// Cloner
// ============================================================================

/// Copies workloads between groups with prompt-driven conflict retry.
pub struct WorkloadCloner<'a, W: WorkloadService + ?Sized, P: NamePrompt + ?Sized> {
    service: &'a W,
    prompt: &'a P,
    progress: &'a dyn ProgressIndicator,
    hooks: Option<&'a HookRegistry>,
}

impl<'a, W, P> WorkloadCloner<'a, W, P>
where
    W: WorkloadService + ?Sized,
    P: NamePrompt + ?Sized,
{
    pub fn new(service: &'a W, prompt: &'a P, progress: &'a dyn ProgressIndicator) -> Self {
        Self {
            service,
            prompt,
            progress,
            hooks: None,
        }
    }

    pub fn with_hooks(mut self, hooks: &'a HookRegistry) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Create a copy of `source` named `name` in `group`.
    ///
    /// The source configuration is exported once; retries change only the
    /// name. There is no retry limit: the loop ends on success, on operator
    /// cancellation, or on any error other than a name conflict.
    pub async fn clone_to_group(&self, source: &str, group: &str, name: &str) -> Result<CloneOutcome> {
        let config = match self.service.export_workload_config(source).await {
            Ok(config) => config,
            Err(err) => {
                self.progress.failure(&err.to_string());
                return Err(err.into());
            }
        };
        let mut request = CreateWorkloadRequest::from_run_config(&config, name, group);
        let mut state = ConflictRetryState::new(name);

        loop {
            self.progress.loading("Copying server to group...");

            let err = match self.service.create_workload(&request).await {
                Ok(created) => {
                    self.progress.success(&format!(
                        "Server \"{source}\" copied to group \"{group}\" successfully"
                    ));
                    if let Some(hooks) = self.hooks {
                        hooks.emit(HookEvent::WorkloadCloned {
                            source: source.to_string(),
                            name: created.name.clone(),
                            group: group.to_string(),
                            retries: state.retry_count,
                        });
                    }
                    return Ok(CloneOutcome::Created {
                        name: created.name,
                        group: group.to_string(),
                        retry_count: state.retry_count,
                    });
                }
                Err(err) => err,
            };

            self.progress.dismiss();
            if !err.is_name_conflict() {
                self.progress.failure(&err.to_string());
                return Err(err.into());
            }

            info!("Workload name '{}' is taken, asking for another", state.attempted_name);
            state.reject_current();
            match self.ask_valid_name(state.prompt_request()).await? {
                Some(next) => {
                    state.retry_with(next);
                    request.retarget(&state.attempted_name, group);
                }
                None => {
                    info!("Copy of '{}' cancelled", source);
                    return Ok(CloneOutcome::Cancelled {
                        retry_count: state.retry_count,
                    });
                }
            }
        }
    }

    /// Ask until the operator enters a name the validator accepts, or
    /// cancels.
    async fn ask_valid_name(&self, mut request: NamePromptRequest) -> Result<Option<String>> {
        loop {
            let answer = self
                .prompt
                .ask_name(&request)
                .await
                .map_err(|e| Error::Prompt(e.to_string()))?;

            let Some(name) = answer else {
                return Ok(None);
            };
            match request.validate(&name) {
                Ok(valid) => return Ok(Some(valid)),
                Err(reason) => {
                    warn!("Rejected name '{}': {}", name, reason);
                    request.initial_value = name;
                    request.validate_on_mount = true;
                }
            }
        }
    }
}
