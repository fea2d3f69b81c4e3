//! Failure taxonomy of a deployment run.

use serde::{Deserialize, Serialize};

/// Errors that terminate a deployment run.
///
/// None of these are retried by the orchestrator. Retry policy, if any,
/// belongs to the [`ChainClient`](crate::ChainClient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum DeployError {
    /// No signing account is configured or reachable.
    #[error("deployer identity unavailable: {0}")]
    IdentityUnavailable(String),

    /// The chain could not be queried.
    #[error("chain unreachable: {0}")]
    ChainUnreachable(String),

    /// A spec references a deployment that has not produced a result yet.
    ///
    /// This is an ordering bug on the caller side.
    #[error("unresolved dependency: `{0}` has not been deployed earlier in the run")]
    UnresolvedDependency(String),

    /// The chain client rejected the deployment or failed to confirm it.
    #[error("deployment of `{spec}` failed: {reason}")]
    SubmissionFailed { spec: String, reason: String },

    /// Two specs in the same run share a name.
    #[error("duplicate deployment name `{0}`")]
    DuplicateSpec(String),

    /// The run was cancelled between two deployments.
    #[error("run cancelled")]
    Cancelled,
}

impl DeployError {
    /// Build a [`DeployError::SubmissionFailed`] from any chain client error,
    /// keeping the full context chain in the reason.
    pub(crate) fn submission(spec: &str, err: anyhow::Error) -> Self {
        Self::SubmissionFailed {
            spec: spec.to_string(),
            reason: format!("{err:#}"),
        }
    }
}
