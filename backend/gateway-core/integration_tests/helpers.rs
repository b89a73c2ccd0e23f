//! Test helpers for integration tests.
//!
//! - An in-process mock gateway speaking the duplex frame protocol
//! - Client construction with fast timings
//! - Polling helpers for asynchronous conditions

use gateway_core::gateway::{ConnectionState, GatewayClient, RpcTuning};
use gateway_core::GatewayConfig;

use models::methods::CONNECT;
use models::{EventFrame, Frame, RequestFrame, ResponseFrame};

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Decides the reply to each request. `None` means never reply.
pub type Responder = Arc<dyn Fn(&RequestFrame) -> Option<ResponseFrame> + Send + Sync>;

#[derive(Debug, Clone)]
enum Outbound {
    Text(String),
    Close,
}

/// Mock gateway on an ephemeral localhost port.
pub struct MockGateway {
    pub port: u16,
    outbound: broadcast::Sender<Outbound>,
    requests: Arc<Mutex<Vec<RequestFrame>>>,
    connections: Arc<AtomicUsize>,
    accept_task: JoinHandle<()>,
}

impl MockGateway {
    /// Accepts the handshake and answers with [`default_responder`].
    pub async fn start() -> Self {
        Self::start_with(Arc::new(default_responder)).await
    }

    pub async fn start_with(responder: Responder) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock gateway");
        let port = listener.local_addr().expect("local addr").port();

        let (outbound, _) = broadcast::channel(64);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(AtomicUsize::new(0));

        let accept_task = tokio::spawn({
            let outbound = outbound.clone();
            let requests = Arc::clone(&requests);
            let connections = Arc::clone(&connections);
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve_connection(
                        stream,
                        Arc::clone(&responder),
                        outbound.subscribe(),
                        Arc::clone(&requests),
                    ));
                }
            }
        });

        Self {
            port,
            outbound,
            requests,
            connections,
            accept_task,
        }
    }

    pub fn config(&self) -> GatewayConfig {
        GatewayConfig::new("127.0.0.1", self.port)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Every request received so far, handshakes included.
    pub fn requests(&self) -> Vec<RequestFrame> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn requests_for(&self, method: &str) -> Vec<RequestFrame> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }

    pub fn push_event(&self, name: &str, payload: Value) {
        self.send_raw(&event_text(name, payload));
    }

    pub fn send_raw(&self, text: &str) {
        let _ = self.outbound.send(Outbound::Text(text.to_string()));
    }

    /// Close every open connection from the server side.
    pub fn drop_connections(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }
}

impl Drop for MockGateway {
    fn drop(&mut self) {
        self.accept_task.abort();
        let _ = self.outbound.send(Outbound::Close);
    }
}

async fn serve_connection(
    stream: TcpStream,
    responder: Responder,
    mut outbound: broadcast::Receiver<Outbound>,
    requests: Arc<Mutex<Vec<RequestFrame>>>,
) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut sink, mut source) = ws.split();

    loop {
        tokio::select! {
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    if let Some(Frame::Request(request)) = Frame::parse(text.as_str()) {
                        requests.lock().expect("requests lock").push(request.clone());
                        if let Some(response) = responder(&request) {
                            let text = serde_json::to_string(&Frame::Response(response))
                                .expect("encode response");
                            if sink.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            out = outbound.recv() => match out {
                Ok(Outbound::Text(text)) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Ok(Outbound::Close) | Err(broadcast::error::RecvError::Closed) => {
                    let _ = sink.close().await;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
            },
        }
    }
}

pub fn event_text(name: &str, payload: Value) -> String {
    serde_json::to_string(&Frame::Event(EventFrame {
        name: name.to_string(),
        payload,
        seq: None,
        state_version: None,
    }))
    .expect("encode event")
}

/// One-connection gateway that writes `before` ahead of its handshake reply
/// and `after` right behind it, then answers nothing else. Returns the port.
pub async fn scripted_gateway(before: Vec<String>, after: Vec<String>) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind scripted gateway");
    let port = listener.local_addr().expect("local addr").port();

    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else {
            return;
        };
        let Ok(ws) = accept_async(stream).await else {
            return;
        };
        let (mut sink, mut source) = ws.split();

        while let Some(Ok(message)) = source.next().await {
            let Message::Text(text) = message else {
                continue;
            };
            let Some(Frame::Request(request)) = Frame::parse(text.as_str()) else {
                continue;
            };
            if request.method != CONNECT {
                continue;
            }

            let hello = default_responder(&request).expect("handshake reply");
            let hello = serde_json::to_string(&Frame::Response(hello)).expect("encode hello");
            for text in before.iter().chain(std::iter::once(&hello)).chain(after.iter()) {
                if sink.send(Message::Text(text.clone().into())).await.is_err() {
                    return;
                }
            }
        }
    });

    port
}

/// Handshake ok; `health` and `agent` answered; `fail` rejected; `hang`
/// never answered; anything else echoes its params.
pub fn default_responder(request: &RequestFrame) -> Option<ResponseFrame> {
    match request.method.as_str() {
        CONNECT => Some(ResponseFrame::success(
            &request.id,
            json!({"protocol": 3, "policy": {"tickIntervalMs": 1000}}),
        )),
        "health" => Some(ResponseFrame::success(&request.id, json!({"status": "ok"}))),
        "agent" => Some(ResponseFrame::success(&request.id, json!({"runId": "run-1"}))),
        "fail" => Some(ResponseFrame::failure(
            &request.id,
            "INVALID_REQUEST",
            "method rejected",
        )),
        "hang" => None,
        _ => Some(ResponseFrame::success(
            &request.id,
            request.params.clone().unwrap_or(Value::Null),
        )),
    }
}

pub fn fast_tuning() -> RpcTuning {
    RpcTuning {
        request_timeout: Duration::from_millis(500),
        backoff_initial: Duration::from_millis(20),
        backoff_max: Duration::from_millis(100),
    }
}

pub fn client_for(mock: &MockGateway) -> GatewayClient {
    GatewayClient::new(&mock.config(), fast_tuning()).expect("Failed to build client")
}

/// Client whose port has nothing listening.
pub async fn client_for_closed_port() -> GatewayClient {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    GatewayClient::new(&GatewayConfig::new("127.0.0.1", port), fast_tuning())
        .expect("Failed to build client")
}

pub async fn wait_for_state(client: &GatewayClient, target: ConnectionState) {
    let mut state = client.watch_state();
    tokio::time::timeout(WAIT_TIMEOUT, state.wait_for(|s| *s == target))
        .await
        .unwrap_or_else(|_| panic!("Timed out waiting for state {target}"))
        .expect("state channel closed");
}

pub async fn connected_client(mock: &MockGateway) -> GatewayClient {
    let client = client_for(mock);
    client.connect();
    wait_for_state(&client, ConnectionState::Connected).await;
    client
}

/// Poll `condition` every 10ms until it holds or the wait times out.
pub async fn wait_until<F>(what: &str, mut condition: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting until {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Async variant of [`wait_until`].
pub async fn wait_until_async<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while !condition().await {
        if tokio::time::Instant::now() > deadline {
            panic!("Timed out waiting until {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
