use crate::api::ApiError;
use std::fmt;

/// Which membership change a failed request was making.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipOp {
    Register,
    Unregister,
}

impl fmt::Display for MembershipOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MembershipOp::Register => f.write_str("register"),
            MembershipOp::Unregister => f.write_str("unregister"),
        }
    }
}

/// One add or remove that the runtime rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipFailure {
    pub client: String,
    pub op: MembershipOp,
    pub error: ApiError,
}

impl fmt::Display for MembershipFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.op, self.client, self.error)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Api(#[from] ApiError),
    /// The store acknowledged a create but returned no key.
    #[error("Failed to create secret for key \"{key}\"")]
    EmptySecretKey { key: String },
    #[error("{} membership change(s) failed for group '{group}': {}", .failures.len(), join_failures(.failures))]
    Membership {
        group: String,
        failures: Vec<MembershipFailure>,
    },
    #[error("name prompt failed: {0}")]
    Prompt(String),
}

fn join_failures(failures: &[MembershipFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
