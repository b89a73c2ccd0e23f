//! Errors surfaced by the duplex RPC client to its callers.
//!
//! Transport failures (open failure, unexpected close, malformed frames) are
//! never returned from here; they only show up as connection-state changes.
//! What callers can see:
//! - precondition: [`GatewayError::NotConnected`], returned before anything is sent
//! - protocol: [`GatewayError::Protocol`], the server answered `ok: false`
//! - timeout: [`GatewayError::Timeout`], no answer within the deadline
//! - [`GatewayError::ConnectionClosed`], the connection went away mid-call

use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum GatewayError {
    #[error("Not Connected Error: gateway connection is not established {location}")]
    NotConnected { location: ErrorLocation },

    #[error("Request Timeout Error: '{method}' got no response within {timeout_ms}ms {location}")]
    Timeout {
        method: String,
        timeout_ms: u128,
        location: ErrorLocation,
    },

    #[error("Gateway Error: '{method}' failed: {message} ({code}) {location}")]
    Protocol {
        method: String,
        code: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Connection Closed Error: connection closed before '{method}' completed {location}")]
    ConnectionClosed {
        method: String,
        location: ErrorLocation,
    },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    #[error("Serialize Error: {message} {location}")]
    Serialize {
        message: String,
        location: ErrorLocation,
    },

    #[error("Gateway Client Stopped {location}")]
    ActorStopped { location: ErrorLocation },
}

impl GatewayError {
    #[track_caller]
    pub fn not_connected() -> Self {
        GatewayError::NotConnected {
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn timeout(method: impl Into<String>, timeout_ms: u128) -> Self {
        GatewayError::Timeout {
            method: method.into(),
            timeout_ms,
            location: ErrorLocation::caller(),
        }
    }

    /// Build from the error body of an `ok: false` response.
    #[track_caller]
    pub fn protocol(
        method: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        GatewayError::Protocol {
            method: method.into(),
            code: code.into(),
            message: if message.is_empty() {
                String::from("request failed")
            } else {
                message
            },
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn connection_closed(method: impl Into<String>) -> Self {
        GatewayError::ConnectionClosed {
            method: method.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn send(message: impl Into<String>) -> Self {
        GatewayError::Send {
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn actor_stopped() -> Self {
        GatewayError::ActorStopped {
            location: ErrorLocation::caller(),
        }
    }

    /// Category name for logs and counters.
    pub fn error_category(&self) -> &'static str {
        match self {
            GatewayError::NotConnected { .. } => "precondition",
            GatewayError::Timeout { .. } => "timeout",
            GatewayError::Protocol { .. } => "protocol",
            GatewayError::ConnectionClosed { .. } => "connection_closed",
            GatewayError::Send { .. } => "send",
            GatewayError::Serialize { .. } => "serialize",
            GatewayError::ActorStopped { .. } => "stopped",
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        GatewayError::Serialize {
            message: error.to_string(),
            location: ErrorLocation::caller(),
        }
    }
}
