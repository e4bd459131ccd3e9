//! In-process mock Phoenix server for integration tests.
//!
//! Accepts WebSocket connections on a loopback port, records every inbound
//! frame for assertions, answers request-style frames through a pluggable
//! responder, and can push server-initiated events or drop the current
//! connection to exercise the reconnect path.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

type Responder = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Reply `{"status":"ok","response":{}}` to every known request-style
/// event; stay silent on one-way events.
pub fn default_responder(frame: &Value) -> Option<Value> {
    match frame["event"].as_str().unwrap_or_default() {
        "phx_join" | "phx_leave" | "heartbeat" | "join_call" | "leave_call" | "toggle_audio"
        | "toggle_video" | "set_quality" | "get_participants" => {
            Some(json!({ "status": "ok", "response": {} }))
        }
        _ => None,
    }
}

pub struct MockServer {
    addr: SocketAddr,
    frames_rx: mpsc::UnboundedReceiver<Value>,
    push_tx: mpsc::UnboundedSender<String>,
    kill_tx: mpsc::UnboundedSender<()>,
    _task: JoinHandle<()>,
}

impl MockServer {
    /// Start a server with the [`default_responder`].
    pub async fn start() -> Self {
        Self::with_responder(default_responder).await
    }

    /// Start a server with a custom responder. The responder receives each
    /// inbound frame and returns the `phx_reply` payload to send back, or
    /// `None` to stay silent.
    pub async fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock server");
        let addr = listener.local_addr().expect("local addr");

        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(Self::run(
            listener,
            frames_tx,
            push_rx,
            kill_rx,
            Arc::new(responder),
        ));

        Self {
            addr,
            frames_rx,
            push_tx,
            kill_tx,
            _task: task,
        }
    }

    /// The `http://` URL to hand to `SensoctoConfig` (the client derives
    /// the `ws://` endpoint from it).
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Await the next inbound frame, failing after two seconds.
    pub async fn next_frame(&mut self) -> Value {
        self.next_frame_within(Duration::from_secs(2)).await
    }

    /// Await the next inbound frame under an explicit deadline.
    pub async fn next_frame_within(&mut self, deadline: Duration) -> Value {
        tokio::time::timeout(deadline, self.frames_rx.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("mock server task ended")
    }

    /// Assert that no frame arrives within the given window.
    pub async fn expect_no_frame(&mut self, window: Duration) {
        if let Ok(Some(frame)) = tokio::time::timeout(window, self.frames_rx.recv()).await {
            panic!("expected silence, got frame: {frame}");
        }
    }

    /// Push a server-initiated event to the connected client.
    pub fn push(&self, topic: &str, event: &str, payload: Value) {
        let frame = json!({
            "topic": topic,
            "event": event,
            "payload": payload,
            "ref": null,
        });
        self.push_tx.send(frame.to_string()).expect("mock server task ended");
    }

    /// Drop the current connection without a close handshake. The listener
    /// keeps accepting, so a reconnecting client lands on a fresh socket.
    pub fn drop_connection(&self) {
        self.kill_tx.send(()).expect("mock server task ended");
    }

    async fn run(
        listener: TcpListener,
        frames_tx: mpsc::UnboundedSender<Value>,
        mut push_rx: mpsc::UnboundedReceiver<String>,
        mut kill_rx: mpsc::UnboundedReceiver<()>,
        responder: Responder,
    ) {
        loop {
            let Ok((stream, _)) = listener.accept().await else { return };
            let Ok(mut ws) = accept_async(stream).await else { continue };

            loop {
                tokio::select! {
                    msg = ws.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                                continue;
                            };
                            let _ = frames_tx.send(frame.clone());
                            if let Some(reply_payload) = responder(&frame) {
                                let reply = json!({
                                    "topic": frame["topic"],
                                    "event": "phx_reply",
                                    "payload": reply_payload,
                                    "ref": frame["ref"],
                                });
                                let _ = ws.send(Message::Text(reply.to_string().into())).await;
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(_)) => break,
                    },
                    Some(text) = push_rx.recv() => {
                        let _ = ws.send(Message::Text(text.into())).await;
                    }
                    Some(()) = kill_rx.recv() => {
                        break;
                    }
                }
            }
        }
    }
}
