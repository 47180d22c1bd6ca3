//! Persistent WebSocket transport with correlation-id demultiplexing.
//!
//! Grounded on the teacher's `cdp-adapter/src/transport.rs` (a control-message
//! channel feeding a single connection-owning loop task, responses matched
//! back via `oneshot` correlation) and the `remotemedia-sdk` signaling
//! client's split sender/receiver tasks over `tokio_tungstenite`. The
//! reconnect-with-exponential-backoff and heartbeat cadence follow
//! `websocket_provider.py`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use wf_core_types::WayfinderError;

use crate::types::{CompletionRequest, CompletionResponse, Role, Usage};
use crate::LlmTransport;

#[derive(Debug, Clone)]
pub struct PersistentConfig {
    pub ws_url: String,
    pub api_key: String,
    pub call_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub reconnect_base_delay: Duration,
    pub max_reconnect_attempts: u32,
}

impl PersistentConfig {
    pub fn new(ws_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            api_key: api_key.into(),
            call_timeout: Duration::from_secs(120),
            heartbeat_interval: Duration::from_secs(30),
            reconnect_base_delay: Duration::from_secs(1),
            max_reconnect_attempts: 5,
        }
    }
}

#[derive(Serialize)]
struct OutgoingFrame<'a> {
    call_id: &'a str,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Deserialize)]
struct IncomingFrame {
    call_id: String,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Result<serde_json::Value, String>>>>>;

/// Persistent connection. Owns a background task that holds the socket;
/// callers talk to it through an mpsc channel and get their own oneshot
/// reply, so many `complete()` calls can be in flight concurrently over one
/// connection (spec §4.1 "concurrent calls share one connection").
pub struct PersistentTransport {
    config: PersistentConfig,
    outbound: mpsc::Sender<(String, String, serde_json::Value, oneshot::Sender<Result<serde_json::Value, String>>)>,
    connected: Arc<AtomicBool>,
}

impl PersistentTransport {
    /// Spawns the connection loop immediately; `is_ready()` reflects whether
    /// the most recent connection attempt succeeded.
    pub fn spawn(config: PersistentConfig) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel(256);
        let connected = Arc::new(AtomicBool::new(false));
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(Self::connection_loop(config.clone(), outbound_rx, pending, connected.clone()));

        Self { config, outbound: outbound_tx, connected }
    }

    async fn connection_loop(
        config: PersistentConfig,
        mut outbound_rx: mpsc::Receiver<(String, String, serde_json::Value, oneshot::Sender<Result<serde_json::Value, String>>)>,
        pending: PendingMap,
        connected: Arc<AtomicBool>,
    ) {
        let mut attempt: u32 = 0;
        loop {
            match tokio_tungstenite::connect_async(&config.ws_url).await {
                Ok((stream, _response)) => {
                    attempt = 0;
                    connected.store(true, Ordering::Relaxed);
                    info!(url = %config.ws_url, "LLM websocket transport connected");

                    let (mut write, mut read) = stream.split();
                    let (frame_tx, mut frame_rx) = mpsc::channel::<WsMessage>(256);

                    let heartbeat_frame_tx = frame_tx.clone();
                    let heartbeat_connected = connected.clone();
                    let heartbeat_interval = config.heartbeat_interval;
                    let heartbeat_task = tokio::spawn(async move {
                        let mut ticker = tokio::time::interval(heartbeat_interval);
                        loop {
                            ticker.tick().await;
                            if !heartbeat_connected.load(Ordering::Relaxed) {
                                break;
                            }
                            if heartbeat_frame_tx.send(WsMessage::Ping(Vec::new())).await.is_err() {
                                break;
                            }
                        }
                    });

                    let sender_task = tokio::spawn(async move {
                        while let Some(frame) = frame_rx.recv().await {
                            if write.send(frame).await.is_err() {
                                break;
                            }
                        }
                    });

                    // Demux loop: drains both inbound frames from the socket
                    // and outbound call requests from API callers, until the
                    // socket closes.
                    loop {
                        tokio::select! {
                            incoming = read.next() => {
                                match incoming {
                                    Some(Ok(WsMessage::Text(text))) => {
                                        Self::dispatch_response(&text, &pending);
                                    }
                                    Some(Ok(WsMessage::Pong(_))) => {}
                                    Some(Ok(WsMessage::Close(_))) | None => {
                                        warn!("LLM websocket transport closed by peer");
                                        break;
                                    }
                                    Some(Ok(_)) => {}
                                    Some(Err(err)) => {
                                        warn!(?err, "LLM websocket transport read error");
                                        break;
                                    }
                                }
                            }
                            outgoing = outbound_rx.recv() => {
                                match outgoing {
                                    Some((call_id, method, params, responder)) => {
                                        pending.lock().insert(call_id.clone(), responder);
                                        let frame = OutgoingFrame { call_id: &call_id, method: &method, params };
                                        let text = serde_json::to_string(&frame).unwrap_or_default();
                                        if frame_tx.send(WsMessage::Text(text)).await.is_err() {
                                            break;
                                        }
                                    }
                                    None => break,
                                }
                            }
                        }
                    }

                    connected.store(false, Ordering::Relaxed);
                    heartbeat_task.abort();
                    sender_task.abort();
                    Self::fail_all_pending(&pending, "connection lost");
                }
                Err(err) => {
                    warn!(?err, attempt, "LLM websocket transport connect failed");
                }
            }

            attempt += 1;
            if attempt > config.max_reconnect_attempts {
                error!("LLM websocket transport exhausted reconnect attempts, giving up");
                return;
            }
            let backoff = config.reconnect_base_delay * 2u32.pow(attempt.saturating_sub(1).min(6));
            tokio::time::sleep(backoff).await;
        }
    }

    fn dispatch_response(text: &str, pending: &PendingMap) {
        let frame: IncomingFrame = match serde_json::from_str(text) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(?err, "ignoring malformed frame from LLM websocket transport");
                return;
            }
        };
        if let Some(responder) = pending.lock().remove(&frame.call_id) {
            let outcome = match (frame.result, frame.error) {
                (Some(value), _) => Ok(value),
                (None, Some(err)) => Err(err),
                (None, None) => Err("empty frame".to_string()),
            };
            let _ = responder.send(outcome);
        }
    }

    fn fail_all_pending(pending: &PendingMap, reason: &str) {
        let mut guard = pending.lock();
        for (_, responder) in guard.drain() {
            let _ = responder.send(Err(reason.to_string()));
        }
    }
}

#[async_trait]
impl LlmTransport for PersistentTransport {
    fn is_ready(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, WayfinderError> {
        let call_id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();

        let params = json!({
            "model": request.model,
            "temperature": request.temperature.unwrap_or(0.2),
            "messages": request.messages.iter().map(|m| json!({
                "role": match m.role { Role::System => "system", Role::User => "user", Role::Assistant => "assistant" },
                "content": m.content,
            })).collect::<Vec<_>>(),
            "api_key": self.config.api_key,
        });

        self.outbound
            .send((call_id, "complete".to_string(), params, tx))
            .await
            .map_err(|_| WayfinderError::TransportDisconnect("websocket transport not running".into()))?;

        let outcome = tokio::time::timeout(self.config.call_timeout, rx)
            .await
            .map_err(|_| WayfinderError::TransportTimeout(self.config.call_timeout.as_millis() as u64))?
            .map_err(|_| WayfinderError::TransportDisconnect("response channel closed".into()))?;

        let value = outcome.map_err(WayfinderError::TransportDisconnect)?;
        let content = value
            .get("content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| WayfinderError::TransportParseError("frame missing content field".into()))?
            .to_string();
        let usage: Usage = value
            .get("usage")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();

        Ok(CompletionResponse { content, usage, model: request.model })
    }
}
