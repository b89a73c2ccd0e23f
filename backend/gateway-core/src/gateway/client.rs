use crate::config::GatewayConfig;
use crate::error::{CoreError, GatewayError};
use crate::gateway::actor::{Command, ConnectionActor};
use crate::gateway::registry::{Subscription, lock};
use crate::gateway::shared::Shared;
use crate::gateway::{ConnectionState, RpcTuning};

use models::methods::{
    AGENT, AgentParams, CRON_LIST, CRON_RUNS, CRON_STATUS, CronRunsParams, HEALTH,
    SYSTEM_PRESENCE,
};
use models::{ConnectParamsBuilder, GatewayEvent, RequestFrame};

use std::sync::Arc;

use log::warn;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

const CLIENT_NAME: &str = env!("CARGO_PKG_NAME");
const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Handle to one duplex gateway connection.
///
/// Cheap to clone; every clone drives the same connection actor. The actor
/// stops once the last handle is dropped.
///
/// Transport problems never surface as errors here. They show up as state
/// changes (see [`GatewayClient::on_state_change`]) and, while reconnection
/// is enabled, are retried with exponential backoff.
#[derive(Clone)]
pub struct GatewayClient {
    command_tx: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
    tuning: RpcTuning,
}

impl GatewayClient {
    /// Create the client and spawn its connection actor. Does not connect.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: &GatewayConfig, tuning: RpcTuning) -> Result<Self, CoreError> {
        config.validate()?;

        let connect_params = ConnectParamsBuilder::default()
            .with_client(CLIENT_NAME, CLIENT_VERSION)
            .with_token(config.token_str())
            .build()?;

        let shared = Arc::new(Shared::new());
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (open_tx, open_rx) = mpsc::unbounded_channel();

        let actor = ConnectionActor::new(
            config.ws_url(),
            connect_params,
            tuning.clone(),
            Arc::clone(&shared),
            open_tx,
        );
        tokio::spawn(actor.run(command_rx, open_rx));

        Ok(Self {
            command_tx,
            shared,
            tuning,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Receiver that observes the latest state. Intermediate states may be
    /// coalesced; use [`GatewayClient::on_state_change`] to see every one.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.watch_state()
    }

    /// Start connecting and enable automatic reconnection.
    ///
    /// No-op while already connecting, connected, or waiting to reconnect.
    pub fn connect(&self) {
        if self.command_tx.send(Command::Connect).is_err() {
            warn!("connect() called after the gateway client stopped");
        }
    }

    /// Close the connection and stop reconnecting.
    ///
    /// When this returns the state is `Disconnected` and every pending call
    /// has been rejected.
    pub async fn disconnect(&self) {
        let (done, wait) = oneshot::channel();
        if self.command_tx.send(Command::Disconnect { done }).is_err() {
            return;
        }
        let _ = wait.await;
    }

    /// Send one request and wait for its response.
    ///
    /// Fails immediately with [`GatewayError::NotConnected`] unless the
    /// handshake has completed. A request that gets no response within the
    /// configured timeout fails with [`GatewayError::Timeout`] and is removed
    /// from the pending set, so a late response is dropped.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, GatewayError> {
        if !self.is_connected() {
            return Err(GatewayError::not_connected());
        }

        let id = self.shared.next_request_id();
        let (reply, response) = oneshot::channel();
        let frame = RequestFrame::new(id.clone(), method, params);

        self.command_tx
            .send(Command::Request { frame, reply })
            .map_err(|_| GatewayError::actor_stopped())?;

        // The actor owns the deadline and always answers: response, timeout
        // or close. A dropped sender means the actor itself is gone.
        match response.await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::connection_closed(method)),
        }
    }

    /// [`GatewayClient::request`] with typed params.
    pub async fn call<P: Serialize>(
        &self,
        method: &str,
        params: &P,
    ) -> Result<Value, GatewayError> {
        let params = serde_json::to_value(params)?;
        self.request(method, Some(params)).await
    }

    /// Number of requests still waiting for a response.
    pub async fn pending_calls(&self) -> usize {
        let (reply, count) = oneshot::channel();
        if self.command_tx.send(Command::PendingCount { reply }).is_err() {
            return 0;
        }
        count.await.unwrap_or(0)
    }

    /// Register a handler for one event name, or [`models::methods::WILDCARD`]
    /// for every event.
    ///
    /// Handlers run on the connection task in registration order; they must
    /// not block. The handle removes exactly this registration.
    pub fn on<F>(&self, name: &str, handler: F) -> Subscription
    where
        F: Fn(&GatewayEvent) + Send + Sync + 'static,
    {
        let id = lock(&self.shared.events).add(name, Arc::new(handler));
        let shared = Arc::downgrade(&self.shared);
        Subscription::new(move || {
            if let Some(shared) = shared.upgrade() {
                lock(&shared.events).remove(id);
            }
        })
    }

    /// Register a handler invoked on every actual state change.
    pub fn on_state_change<F>(&self, handler: F) -> Subscription
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        let id = self.shared.add_state_listener(Arc::new(handler));
        let shared = Arc::downgrade(&self.shared);
        Subscription::new(move || {
            if let Some(shared) = shared.upgrade() {
                lock(&shared.state_listeners).remove(id);
            }
        })
    }

    pub async fn presence(&self) -> Result<Value, GatewayError> {
        self.request(SYSTEM_PRESENCE, None).await
    }

    pub async fn agent(&self, params: &AgentParams) -> Result<Value, GatewayError> {
        self.call(AGENT, params).await
    }

    /// Deliver `message` to `agent_id` with a fresh idempotency key.
    pub async fn agent_send(&self, agent_id: &str, message: &str) -> Result<Value, GatewayError> {
        let params = AgentParams {
            agent_id: agent_id.to_string(),
            message: message.to_string(),
            idempotency_key: Uuid::new_v4().to_string(),
        };
        self.agent(&params).await
    }

    pub async fn cron_list(&self) -> Result<Value, GatewayError> {
        self.request(CRON_LIST, None).await
    }

    pub async fn cron_status(&self) -> Result<Value, GatewayError> {
        self.request(CRON_STATUS, None).await
    }

    pub async fn cron_runs(&self, id: &str, limit: Option<u32>) -> Result<Value, GatewayError> {
        let params = CronRunsParams {
            id: id.to_string(),
            limit,
        };
        self.call(CRON_RUNS, &params).await
    }

    pub async fn health(&self) -> Result<Value, GatewayError> {
        self.request(HEALTH, None).await
    }
}

impl std::fmt::Debug for GatewayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayClient")
            .field("state", &self.state())
            .field("tuning", &self.tuning)
            .finish()
    }
}
