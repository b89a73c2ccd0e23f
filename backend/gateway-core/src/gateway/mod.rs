//! Duplex RPC client for the gateway.
//!
//! A [`GatewayClient`] multiplexes request/response calls and server-pushed
//! events over one WebSocket connection. The first request on every new
//! connection is the `connect` handshake; until it succeeds the connection
//! is not usable.
//!
//! # Architecture
//!
//! ```text
//! GatewayClient (clone) --Command--> ConnectionActor --frames--> gateway
//!        ^                                 |
//!        +---- watch<ConnectionState> -----+---- event / state handlers
//! ```

mod actor;
pub mod backoff;
pub mod client;
pub mod connection_state;
pub(crate) mod pending;
pub mod registry;
mod shared;

pub use backoff::ReconnectBackoff;
pub use client::GatewayClient;
pub use connection_state::ConnectionState;
pub use registry::Subscription;

use std::time::Duration;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_BACKOFF_INITIAL: Duration = Duration::from_secs(1);
pub const DEFAULT_BACKOFF_MAX: Duration = Duration::from_secs(30);

/// Timing knobs for one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcTuning {
    /// Per-request deadline. Also bounds the open and the handshake.
    pub request_timeout: Duration,
    /// First reconnect delay.
    pub backoff_initial: Duration,
    /// Reconnect delay cap.
    pub backoff_max: Duration,
}

impl Default for RpcTuning {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            backoff_initial: DEFAULT_BACKOFF_INITIAL,
            backoff_max: DEFAULT_BACKOFF_MAX,
        }
    }
}
