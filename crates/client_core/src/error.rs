use shared::domain::{DraftError, PostId};
use thiserror::Error;

/// Failures reported by a [`crate::PostStore`] adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store write failed: {0}")]
    Write(String),
}

/// Failures surfaced by the view controller. None of them is fatal; every
/// one also lands in the controller's notification state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("post store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("post store rejected the write: {0}")]
    StoreWrite(String),
    #[error("invalid credentials")]
    Auth,
    #[error("invalid draft: {0}")]
    Validation(#[from] DraftError),
    #[error("an active session is required")]
    Unauthorized,
    #[error("a publish is already in flight")]
    PublishInFlight,
    #[error("post {0} is not in the loaded collection")]
    PostNotFound(PostId),
}

impl From<StoreError> for ControllerError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Unavailable(message) => Self::StoreUnavailable(message),
            StoreError::Write(message) => Self::StoreWrite(message),
        }
    }
}
