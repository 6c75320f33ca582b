use std::fmt;

use thiserror::Error;

use crate::backend::BackendError;
use crate::storage::StorageError;

/// The mutually-exclusive operations a session can have outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Chat,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Upload => f.write_str("upload"),
            Operation::Chat => f.write_str("chat query"),
        }
    }
}

/// Session-level error type returned by every controller.
///
/// `UnsupportedType`, `Busy` and `NoDocument` are local rejections raised before
/// any network call. `Ingestion` and `Analysis` carry a message fit for display.
/// Chat failures never appear here: they are recorded as assistant turns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("Busy: {0} already in progress")]
    Busy(Operation),

    #[error("No resume has been uploaded yet")]
    NoDocument,

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SessionError {
    pub(crate) fn ingestion(err: &BackendError) -> Self {
        SessionError::Ingestion(format!(
            "Failed to upload resume ({}). Please check the backend connection.",
            err.user_message()
        ))
    }

    pub(crate) fn analysis(err: &BackendError) -> Self {
        SessionError::Analysis(err.user_message())
    }
}

impl From<StorageError> for SessionError {
    fn from(err: StorageError) -> Self {
        SessionError::Storage(err.to_string())
    }
}
