//! In-flight request bookkeeping.

use crate::error::GatewayError;

use models::ResponseFrame;

use std::collections::HashMap;

use log::{debug, trace};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

pub(crate) type Reply = oneshot::Sender<Result<Value, GatewayError>>;

pub(crate) struct PendingCall {
    method: String,
    reply: Reply,
    deadline: Instant,
}

/// Pending calls keyed by request id. Owned by the connection actor only.
#[derive(Default)]
pub(crate) struct PendingCalls {
    calls: HashMap<String, PendingCall>,
}

impl PendingCalls {
    pub(crate) fn insert(&mut self, id: String, method: String, reply: Reply, deadline: Instant) {
        self.calls.insert(
            id,
            PendingCall {
                method,
                reply,
                deadline,
            },
        );
    }

    /// Earliest deadline among the calls still waiting.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.calls.values().map(|call| call.deadline).min()
    }

    /// Fail every call whose deadline is at or before `now` with a timeout.
    /// The entry goes whether or not its caller is still listening.
    pub(crate) fn expire(&mut self, now: Instant, timeout_ms: u128) -> usize {
        let expired: Vec<String> = self
            .calls
            .iter()
            .filter(|(_, call)| call.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            if let Some(call) = self.calls.remove(id) {
                debug!("Request {id} ('{}') timed out; late response will be dropped", call.method);
                let _ = call
                    .reply
                    .send(Err(GatewayError::timeout(&call.method, timeout_ms)));
            }
        }
        expired.len()
    }

    /// Complete the call matching `response.id`. Returns false if no call
    /// was waiting (already timed out, or never ours).
    pub(crate) fn resolve(&mut self, response: ResponseFrame) -> bool {
        let Some(call) = self.calls.remove(&response.id) else {
            return false;
        };

        let result = if response.ok {
            Ok(response.payload.unwrap_or(Value::Null))
        } else {
            let error = response.error.unwrap_or_default();
            Err(GatewayError::protocol(&call.method, error.code, error.message))
        };

        if call.reply.send(result).is_err() {
            trace!("Caller for '{}' went away before its response", call.method);
        }
        true
    }

    /// Fail one call without a response (e.g. the send itself failed).
    pub(crate) fn fail(&mut self, id: &str, error: GatewayError) {
        if let Some(call) = self.calls.remove(id) {
            let _ = call.reply.send(Err(error));
        }
    }

    /// Reject every pending call with a connection-closed error.
    pub(crate) fn reject_all(&mut self) -> usize {
        let count = self.calls.len();
        for (_, call) in self.calls.drain() {
            let _ = call
                .reply
                .send(Err(GatewayError::connection_closed(&call.method)));
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.calls.len()
    }
}
