//! Error taxonomy for the sync core.
//!
//! Validation errors are raised before any network call and carry no
//! partial side effects. `RemoteUnavailable` and `PartialUpdateFailure`
//! surface store failures to the caller; retry policy lives above this
//! crate.

use crate::models::Message;
use convo_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("invalid participant id: {0}")]
    InvalidParticipant(String),

    #[error("message text is empty")]
    EmptyMessage,

    #[error("unsupported message kind: {0}")]
    UnsupportedMessageKind(String),

    #[error("invalid group name: {0}")]
    InvalidGroupName(String),

    #[error("group member set is empty")]
    EmptyMemberSet,

    #[error("remote store unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// The message write succeeded but the follow-up group summary update
    /// failed. The written message is carried so the caller can retry the
    /// summary or recompute it lazily.
    #[error("group summary update failed after message write: {reason}")]
    PartialUpdateFailure {
        message: Box<Message>,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, SyncError>;

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(path) => SyncError::NotFound(path),
            StoreError::Unavailable(reason) => SyncError::RemoteUnavailable(reason),
            StoreError::Malformed { path, reason } => {
                SyncError::RemoteUnavailable(format!("malformed record at {path}: {reason}"))
            }
        }
    }
}
