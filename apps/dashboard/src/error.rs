use gateway_core::CoreError;
use gateway_core::error::SyncError;

use common::ErrorLocation;

use thiserror::Error;

/// Errors that stop the dashboard from starting.
///
/// Nothing after startup is fatal: transport and poll failures are handled
/// inside the core and only show up in logs and connection state.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// Logger setup failed
    #[error("Logger Error: {message} {location}")]
    Logger {
        message: String,
        location: ErrorLocation,
    },

    /// A directory the dashboard needs could not be resolved or created
    #[error("Path Error: {message} {location}")]
    Path {
        message: String,
        location: ErrorLocation,
    },

    /// Config, client construction, or builtin data
    #[error("Core Error: {message} {location}")]
    Core {
        message: String,
        location: ErrorLocation,
    },
}

impl DashboardError {
    #[track_caller]
    pub fn logger(message: impl Into<String>) -> Self {
        DashboardError::Logger {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn path(message: impl Into<String>) -> Self {
        DashboardError::Path {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }
}

impl From<CoreError> for DashboardError {
    #[track_caller]
    fn from(error: CoreError) -> Self {
        DashboardError::Core {
            message: error.to_string(),
            location: ErrorLocation::caller(),
        }
    }
}

impl From<SyncError> for DashboardError {
    #[track_caller]
    fn from(error: SyncError) -> Self {
        DashboardError::Core {
            message: error.to_string(),
            location: ErrorLocation::caller(),
        }
    }
}
