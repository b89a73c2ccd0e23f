//! Gateway client and state reconciliation.
//!
//! - [`gateway`]: duplex RPC client over one WebSocket connection
//! - [`tools`]: one-shot `POST /tools/invoke` client
//! - [`sync`]: merges live events, fallback polls and builtin data per domain
//! - [`config`]: `host`/`port`/`token`/`secure` settings

pub mod config;
pub mod error;
pub mod gateway;
pub mod sync;
pub mod tools;

#[cfg(test)]
mod tests;

pub use config::GatewayConfig;
pub use error::CoreError;
pub use gateway::{ConnectionState, GatewayClient, RpcTuning};
pub use sync::{BuiltinData, DashboardSync, SyncSettings};
pub use tools::ToolClient;

pub const GATEWAY_BASE_URL: &str = const_format::concatcp!(
    "http://",
    config::DEFAULT_HOST,
    ":",
    config::DEFAULT_PORT
);
