//! The connection actor.
//!
//! One task per [`GatewayClient`](crate::gateway::GatewayClient) owns the
//! transport, the pending-call map, the reconnect timer and the handshake.
//! Every pending call carries its own deadline, enforced here, so a caller
//! that stops waiting never leaves an entry behind.
//! Handles talk to it through [`Command`]s; it publishes state through the
//! shared watch channel and runs event/state handlers itself, so handlers
//! always observe transitions in the order they happened.

use crate::error::GatewayError;
use crate::gateway::backoff::ReconnectBackoff;
use crate::gateway::pending::{PendingCalls, Reply};
use crate::gateway::shared::Shared;
use crate::gateway::{ConnectionState, RpcTuning};

use models::methods::CONNECT;
use models::{ConnectParams, Frame, GatewayEvent, HelloOk, RequestFrame, ResponseFrame};

use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info, trace, warn};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, sleep_until, timeout};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) enum Command {
    Connect,
    Disconnect {
        done: oneshot::Sender<()>,
    },
    Request {
        frame: RequestFrame,
        reply: Reply,
    },
    PendingCount {
        reply: oneshot::Sender<usize>,
    },
}

/// Result of a background open attempt, tagged with the attempt it belongs to.
pub(crate) struct OpenOutcome {
    epoch: u64,
    result: Result<WsStream, String>,
}

struct Transport {
    sink: SplitSink<WsStream, Message>,
    stream: SplitStream<WsStream>,
}

struct Handshake {
    id: String,
    deadline: Instant,
}

pub(crate) struct ConnectionActor {
    url: String,
    connect_params: ConnectParams,
    tuning: RpcTuning,
    shared: Arc<Shared>,
    pending: PendingCalls,
    transport: Option<Transport>,
    opening: bool,
    epoch: u64,
    should_reconnect: bool,
    backoff: ReconnectBackoff,
    reconnect_at: Option<Instant>,
    handshake: Option<Handshake>,
    open_tx: mpsc::UnboundedSender<OpenOutcome>,
}

impl ConnectionActor {
    pub(crate) fn new(
        url: String,
        connect_params: ConnectParams,
        tuning: RpcTuning,
        shared: Arc<Shared>,
        open_tx: mpsc::UnboundedSender<OpenOutcome>,
    ) -> Self {
        let backoff = ReconnectBackoff::new(tuning.backoff_initial, tuning.backoff_max);
        Self {
            url,
            connect_params,
            tuning,
            shared,
            pending: PendingCalls::default(),
            transport: None,
            opening: false,
            epoch: 0,
            should_reconnect: false,
            backoff,
            reconnect_at: None,
            handshake: None,
            open_tx,
        }
    }

    pub(crate) async fn run(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<Command>,
        mut open_rx: mpsc::UnboundedReceiver<OpenOutcome>,
    ) {
        debug!("Gateway connection actor started for {}", self.url);

        loop {
            let reconnect_at = self.reconnect_at;
            let handshake_deadline = self.handshake.as_ref().map(|h| h.deadline);
            let request_deadline = self.pending.next_deadline();

            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(outcome) = open_rx.recv() => self.handle_open(outcome).await,
                incoming = next_message(&mut self.transport) => self.handle_incoming(incoming).await,
                _ = sleep_until_deadline(reconnect_at) => {
                    self.reconnect_at = None;
                    self.open_transport();
                }
                _ = sleep_until_deadline(handshake_deadline) => {
                    warn!("Gateway handshake timed out after {:?}", self.tuning.request_timeout);
                    self.handle_close(true).await;
                }
                _ = sleep_until_deadline(request_deadline) => {
                    self.pending.expire(Instant::now(), self.tuning.request_timeout.as_millis());
                }
            }
        }

        // Every handle is gone; nobody can observe reconnects any more.
        self.should_reconnect = false;
        if let Some(transport) = self.transport.take() {
            close_quietly(transport).await;
        }
        self.pending.reject_all();
        debug!("Gateway connection actor stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.connect(),
            Command::Disconnect { done } => {
                self.disconnect().await;
                let _ = done.send(());
            }
            Command::Request { frame, reply } => self.send_request(frame, reply).await,
            Command::PendingCount { reply } => {
                let _ = reply.send(self.pending.len());
            }
        }
    }

    fn connect(&mut self) {
        if self.transport.is_some() || self.opening || self.reconnect_at.is_some() {
            debug!(
                "connect() ignored: already {} (reconnect pending: {})",
                self.shared.state(),
                self.reconnect_at.is_some()
            );
            return;
        }
        self.should_reconnect = true;
        self.open_transport();
    }

    async fn disconnect(&mut self) {
        self.should_reconnect = false;
        self.reconnect_at = None;
        self.handshake = None;
        // Outcomes of an open still in flight become stale.
        self.epoch += 1;
        self.opening = false;

        let rejected = self.pending.reject_all();
        if rejected > 0 {
            debug!("Rejected {rejected} pending call(s) on disconnect");
        }
        self.set_state(ConnectionState::Disconnected);

        if let Some(transport) = self.transport.take() {
            close_quietly(transport).await;
        }
        info!("Disconnected from gateway at {}", self.url);
    }

    fn open_transport(&mut self) {
        self.epoch += 1;
        self.opening = true;
        self.set_state(ConnectionState::Connecting);

        let epoch = self.epoch;
        let url = self.url.clone();
        let open_tx = self.open_tx.clone();
        let open_timeout = self.tuning.request_timeout;

        info!("Connecting to gateway at {url}");
        tokio::spawn(async move {
            let result = match timeout(open_timeout, connect_async(url.as_str())).await {
                Ok(Ok((ws, _response))) => Ok(ws),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("open timed out after {open_timeout:?}")),
            };
            let _ = open_tx.send(OpenOutcome { epoch, result });
        });
    }

    async fn handle_open(&mut self, outcome: OpenOutcome) {
        if outcome.epoch != self.epoch || !self.opening {
            trace!("Dropping stale open outcome (attempt {})", outcome.epoch);
            return;
        }
        self.opening = false;

        let ws = match outcome.result {
            Ok(ws) => ws,
            Err(e) => {
                warn!("Gateway connection to {} failed: {e}", self.url);
                self.handle_close(true).await;
                return;
            }
        };

        let (sink, stream) = ws.split();
        self.transport = Some(Transport { sink, stream });

        let id = self.shared.next_request_id();
        let params = match serde_json::to_value(&self.connect_params) {
            Ok(params) => params,
            Err(e) => {
                warn!("Failed to encode handshake params: {e}");
                self.handle_close(true).await;
                return;
            }
        };

        let frame = Frame::Request(RequestFrame::new(id.clone(), CONNECT, Some(params)));
        if let Err(e) = self.write_frame(&frame).await {
            warn!("Failed to send gateway handshake: {e}");
            self.handle_close(true).await;
            return;
        }

        debug!("Handshake {id} sent (protocol {})", self.connect_params.protocol);
        self.handshake = Some(Handshake {
            id,
            deadline: Instant::now() + self.tuning.request_timeout,
        });
    }

    async fn send_request(&mut self, frame: RequestFrame, reply: Reply) {
        if !self.shared.state().is_connected() || self.transport.is_none() {
            let _ = reply.send(Err(GatewayError::not_connected()));
            return;
        }

        let id = frame.id.clone();
        let method = frame.method.clone();
        let deadline = Instant::now() + self.tuning.request_timeout;
        self.pending.insert(id.clone(), method.clone(), reply, deadline);

        if let Err(e) = self.write_frame(&Frame::Request(frame)).await {
            warn!("Failed to send '{method}': {e}");
            self.pending.fail(&id, e);
            if self.transport.is_some() {
                self.handle_close(true).await;
            }
        }
    }

    async fn write_frame(&mut self, frame: &Frame) -> Result<(), GatewayError> {
        let text = serde_json::to_string(frame)?;
        let transport = self.transport.as_mut().ok_or_else(GatewayError::not_connected)?;
        transport
            .sink
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| GatewayError::send(e.to_string()))
    }

    async fn handle_incoming(&mut self, incoming: Option<Result<Message, WsError>>) {
        match incoming {
            Some(Ok(Message::Text(text))) => self.handle_text(text.as_str()).await,
            Some(Ok(Message::Close(frame))) => {
                info!("Gateway closed the connection: {frame:?}");
                self.handle_close(false).await;
            }
            Some(Ok(Message::Binary(bytes))) => {
                debug!("Dropping binary message ({} bytes)", bytes.len());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                warn!("Gateway transport error: {e}");
                self.handle_close(true).await;
            }
            None => {
                info!("Gateway connection ended");
                self.handle_close(false).await;
            }
        }
    }

    async fn handle_text(&mut self, text: &str) {
        let Some(frame) = Frame::parse(text) else {
            debug!("Dropping malformed frame ({} bytes)", text.len());
            return;
        };

        match frame {
            Frame::Response(response) => {
                let is_handshake = self
                    .handshake
                    .as_ref()
                    .is_some_and(|h| h.id == response.id);
                if is_handshake {
                    self.handle_handshake(response).await;
                } else {
                    let id = response.id.clone();
                    if !self.pending.resolve(response) {
                        trace!("Dropping response for unknown request {id}");
                    }
                }
            }
            Frame::Event(event) if self.shared.state().is_connected() => {
                self.shared.dispatch_event(&GatewayEvent::from(event));
            }
            Frame::Event(event) => {
                debug!("Dropping '{}' event received before the handshake completed", event.name);
            }
            Frame::Request(request) => {
                debug!("Ignoring server-initiated request '{}'", request.method);
            }
        }
    }

    async fn handle_handshake(&mut self, response: ResponseFrame) {
        self.handshake = None;

        if !response.ok {
            let error = response.error.unwrap_or_default();
            warn!(
                "Gateway rejected handshake: {} ({})",
                error.message, error.code
            );
            self.handle_close(false).await;
            return;
        }

        match response
            .payload
            .map(serde_json::from_value::<HelloOk>)
            .transpose()
        {
            Ok(Some(hello)) => debug!("Gateway accepted protocol {}", hello.protocol),
            Ok(None) => debug!("Gateway accepted handshake without a hello payload"),
            Err(e) => debug!("Unrecognised hello payload: {e}"),
        }

        self.backoff.reset();
        self.set_state(ConnectionState::Connected);
        info!("Connected to gateway at {}", self.url);
    }

    /// The single close path for every way a live or opening connection ends,
    /// other than an explicit disconnect.
    async fn handle_close(&mut self, had_error: bool) {
        self.handshake = None;
        self.opening = false;

        if let Some(transport) = self.transport.take() {
            close_quietly(transport).await;
        }

        let rejected = self.pending.reject_all();
        if rejected > 0 {
            debug!("Rejected {rejected} pending call(s) on close");
        }

        if had_error {
            self.set_state(ConnectionState::Error);
        }
        self.set_state(ConnectionState::Disconnected);

        if self.should_reconnect {
            let delay = self.backoff.next_delay();
            self.reconnect_at = Some(Instant::now() + delay);
            info!("Reconnecting to gateway in {delay:?}");
        }
    }

    fn set_state(&self, next: ConnectionState) {
        if self.shared.set_state(next) {
            debug!("Gateway connection state -> {next}");
        }
    }
}

async fn next_message(transport: &mut Option<Transport>) -> Option<Result<Message, WsError>> {
    match transport.as_mut() {
        Some(transport) => transport.stream.next().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn close_quietly(mut transport: Transport) {
    if timeout(CLOSE_TIMEOUT, transport.sink.close()).await.is_err() {
        trace!("Transport close timed out");
    }
}
