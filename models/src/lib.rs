//! Wire and domain models for the gateway client.
//!
//! This crate contains pure data structures: the three frame shapes spoken
//! over the duplex connection, the handshake parameters, the one-shot tool
//! envelopes, and the domain records the reconciliation layer merges. There
//! is no I/O and no behavior beyond (de)serialization and validation.
//!
//! ## Wire format
//!
//! Every duplex frame is one JSON text message discriminated by `type`:
//!
//! - `req`: `{id, method, params?}`
//! - `res`: `{id, ok, payload?, error?}`
//! - `event`: `{event, payload?, seq?, stateVersion?}`
//!
//! Responses pair with requests by `id` only. Events carry no id.

pub mod domain;
pub mod error;
pub mod frame;
pub mod handshake;
pub mod methods;
pub mod tool;

pub use domain::{
    AgentPresence, CronJob, ExecutionRun, HeartbeatSample, KanbanTask, Keyed, NewCronJob,
};
pub use error::model_error::ModelError;
pub use frame::{ErrorShape, EventFrame, Frame, GatewayEvent, RequestFrame, ResponseFrame};
pub use handshake::builder::ConnectParamsBuilder;
pub use handshake::{AuthParams, ClientInfo, ConnectParams, HelloOk};
pub use tool::{ToolErrorBody, ToolInvocation, ToolReply};

/// Protocol version this client speaks.
pub const PROTOCOL_VERSION: u32 = 3;

#[cfg(test)]
mod tests;
