//! Shared primitives for the dashboard gateway workspace.
//!
//! Everything here is dependency-light and used by every other crate:
//!
//! - [`ErrorLocation`]: file/line/column captured with `#[track_caller]` and
//!   attached to every error variant in the workspace
//! - [`HttpStatusCode`]: status categorization for retry decisions
//! - [`RedactedToken`]: bearer credential that never shows up in logs
//!
//! ## Architecture
//!
//! - **common** (this crate): primitives
//! - **models**: wire frames and domain records
//! - **gateway-core**: RPC client, tool client, reconciliation layer
//! - **dashboard**: composition root

pub mod error;
pub mod http_status;
pub mod redacted_token;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use http_status::HttpStatusCode;
pub use redacted_token::RedactedToken;

#[cfg(test)]
mod tests;
