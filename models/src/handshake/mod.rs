//! Handshake parameters and result.
//!
//! The handshake is the first request on every new connection (method
//! [`crate::methods::CONNECT`]). The connection is not usable until it
//! succeeds.

pub mod builder;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role requested by this client.
pub const ROLE_CONTROL: &str = "control";

/// Params of the `connect` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectParams {
    pub protocol: u32,
    pub client: ClientInfo,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthParams>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

/// Bearer credential as it travels in the handshake.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthParams {
    pub token: String,
}

impl std::fmt::Debug for AuthParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthParams")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Successful handshake payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloOk {
    pub protocol: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<Value>,
}
