#![forbid(unsafe_code)]

use st_core::TransitionError;
use st_core::ids::ProjectId;
use st_storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Transient store failure; the persisted record is unchanged and the call may be retried.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("no timeline record for project {project_id}; reconcile it first")]
    RecordNotFound { project_id: ProjectId },
}

impl LifecycleError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }
}
