//! Connection lifecycle state.

use std::fmt;

/// Connection state of one [`GatewayClient`](crate::gateway::GatewayClient).
///
/// Exactly one value at a time. Transitions are driven only by the client's
/// connection actor:
///
/// ```text
/// Disconnected -> Connecting -> Connected
///       ^             |             |
///       |             v             |
///       +-------- (Error) <---------+
/// ```
///
/// `Error` is entered when the transport itself fails and is always followed
/// by `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == ConnectionState::Connected
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
