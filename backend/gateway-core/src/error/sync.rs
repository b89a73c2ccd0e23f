use crate::error::{GatewayError, ToolError};

use common::ErrorLocation;

use thiserror::Error as ThisError;

/// Errors returned by the reconciliation layer's consumer actions.
///
/// Poll and live-ingestion failures never become a `SyncError`; they are
/// swallowed, logged and counted in `SyncStats`.
#[derive(Debug, ThisError)]
pub enum SyncError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Builtin Data Error: {message} {location}")]
    Builtin {
        message: String,
        location: ErrorLocation,
    },
}

impl SyncError {
    #[track_caller]
    pub fn builtin(message: impl Into<String>) -> Self {
        SyncError::Builtin {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }
}
