//! Error types for the merge engine.

use thiserror::Error;

/// Errors returned by [`Manager`](crate::Manager) operations.
///
/// Merge-internal outcomes (duplicates, rejected patches) never surface here;
/// callers only ever learn that the engine is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ManagerError {
    /// The engine has been canceled. Not retryable.
    #[error("manager is canceled")]
    Canceled,

    /// `run()` was called while another merge loop owns the inbound queue.
    #[error("merge loop is already running")]
    AlreadyRunning,
}

/// Reasons a patch could not be applied to the snapshot.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The transaction data is not a JSON Patch document.
    #[error("malformed patch: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The patch parsed but one of its operations could not be applied.
    #[error("patch rejected: {0}")]
    Rejected(#[from] json_patch::PatchError),
}

impl PatchError {
    /// Static label used for logs and metrics.
    #[inline]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::Rejected(_) => "rejected",
        }
    }
}
