//! Workload copies between groups.

pub mod clone;
pub mod prompt;
pub mod types;

pub use clone::{CloneOutcome, ConflictRetryState, LogProgress, ProgressIndicator, WorkloadCloner};
pub use prompt::{LinePrompt, NamePrompt, NamePromptRequest, NameValidationError};
pub use types::{CreateWorkloadRequest, RunConfig};
