//! Errors for one-shot tool invocations.
//!
//! Key design decisions:
//! - HTTP status codes stored directly (not parsed from strings)
//! - 401 / 404 / 429 get their own variants so callers can branch on them
//! - `is_retryable()` uses the category, never message content

use common::{ErrorLocation, HttpStatusCode};

use thiserror::Error as ThisError;

const UNKNOWN_RETRY_AFTER: &str = "unknown";

#[derive(Debug, ThisError)]
pub enum ToolError {
    #[error("Tool Unauthorized Error: '{tool}' rejected the gateway token {location}")]
    Unauthorized {
        tool: String,
        location: ErrorLocation,
    },

    #[error("Tool Not Found Error: '{tool}' is not available or not allowed {location}")]
    NotFound {
        tool: String,
        location: ErrorLocation,
    },

    #[error(
        "Tool Rate Limited Error: '{tool}' retry after {} {location}",
        retry_after_label(.retry_after)
    )]
    RateLimited {
        tool: String,
        retry_after: Option<String>,
        location: ErrorLocation,
    },

    #[error("Tool Failed Error: '{tool}': {message} {location}")]
    Failed {
        tool: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Tool HTTP Error: '{tool}': HTTP {status} - {body} {location}")]
    Http {
        tool: String,
        status: HttpStatusCode,
        body: String,
        location: ErrorLocation,
    },

    #[error("Tool Network Error: {message} {location}")]
    Network {
        message: String,
        is_timeout: bool,
        is_connection: bool,
        location: ErrorLocation,
    },

    #[error("Tool JSON Error: {message} {location}")]
    Json {
        message: String,
        location: ErrorLocation,
    },

    #[error("URL Parse Error: {message} {location}")]
    UrlParse {
        message: String,
        location: ErrorLocation,
    },
}

fn retry_after_label(retry_after: &Option<String>) -> String {
    match retry_after {
        Some(value) => format!("{value}s"),
        None => UNKNOWN_RETRY_AFTER.to_string(),
    }
}

impl ToolError {
    #[track_caller]
    pub fn unauthorized(tool: impl Into<String>) -> Self {
        ToolError::Unauthorized {
            tool: tool.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn not_found(tool: impl Into<String>) -> Self {
        ToolError::NotFound {
            tool: tool.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn rate_limited(tool: impl Into<String>, retry_after: Option<String>) -> Self {
        ToolError::RateLimited {
            tool: tool.into(),
            retry_after,
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        ToolError::Failed {
            tool: tool.into(),
            message: message.into(),
            location: ErrorLocation::caller(),
        }
    }

    #[track_caller]
    pub fn http(tool: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        ToolError::Http {
            tool: tool.into(),
            status: HttpStatusCode(status),
            body: body.into(),
            location: ErrorLocation::caller(),
        }
    }

    /// Create from a reqwest error, keeping timeout/connect distinctions.
    #[track_caller]
    pub fn from_reqwest(error: &reqwest::Error) -> Self {
        ToolError::Network {
            message: error.to_string(),
            is_timeout: error.is_timeout(),
            is_connection: error.is_connect(),
            location: ErrorLocation::caller(),
        }
    }

    /// Check if retrying later could succeed, based on category only.
    pub fn is_retryable(&self) -> bool {
        match self {
            ToolError::RateLimited { .. } => true,
            ToolError::Network {
                is_timeout,
                is_connection,
                ..
            } => *is_timeout || *is_connection,
            ToolError::Http { status, .. } => status.is_retryable(),
            ToolError::Unauthorized { .. }
            | ToolError::NotFound { .. }
            | ToolError::Failed { .. }
            | ToolError::Json { .. }
            | ToolError::UrlParse { .. } => false,
        }
    }

    /// Get error category for logs and counters.
    pub fn error_category(&self) -> &'static str {
        match self {
            ToolError::Unauthorized { .. } => "unauthorized",
            ToolError::NotFound { .. } => "not_found",
            ToolError::RateLimited { .. } => "rate_limited",
            ToolError::Failed { .. } => "failed",
            ToolError::Http { status, .. } if status.is_server_error() => "server_error",
            ToolError::Http { .. } => "client_error",
            ToolError::Network {
                is_timeout: true, ..
            } => "timeout",
            ToolError::Network {
                is_connection: true,
                ..
            } => "connection",
            ToolError::Network { .. } => "network",
            ToolError::Json { .. } => "json",
            ToolError::UrlParse { .. } => "url",
        }
    }

    /// HTTP status behind this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ToolError::Unauthorized { .. } => Some(HttpStatusCode::UNAUTHORIZED.0),
            ToolError::NotFound { .. } => Some(HttpStatusCode::NOT_FOUND.0),
            ToolError::RateLimited { .. } => Some(HttpStatusCode::TOO_MANY_REQUESTS.0),
            ToolError::Http { status, .. } => Some(status.0),
            _ => None,
        }
    }
}

impl From<url::ParseError> for ToolError {
    #[track_caller]
    fn from(error: url::ParseError) -> Self {
        ToolError::UrlParse {
            message: error.to_string(),
            location: ErrorLocation::caller(),
        }
    }
}

impl From<reqwest::Error> for ToolError {
    #[track_caller]
    fn from(error: reqwest::Error) -> Self {
        ToolError::from_reqwest(&error)
    }
}

impl From<serde_json::Error> for ToolError {
    #[track_caller]
    fn from(error: serde_json::Error) -> Self {
        ToolError::Json {
            message: error.to_string(),
            location: ErrorLocation::caller(),
        }
    }
}
