//! Phoenix channel socket.
//!
//! One [`PhoenixSocket`] owns a single WebSocket connection and multiplexes
//! any number of logical channels over it. It provides:
//!
//! - request/reply correlation by ref (`phx_join`, `heartbeat`, call
//!   operations), with per-call deadlines;
//! - one-way pushes (`measurement`, `media_event`, …);
//! - per-(topic, event) subscriber lists for server-initiated events;
//! - a heartbeat driver that treats a missed reply as transport loss;
//! - a reconnect supervisor that re-establishes the socket and re-issues
//!   joins for every remembered channel.
//!
//! # Architecture
//!
//! ```text
//!            ┌─────────────────────────────────┐
//!            │          PhoenixSocket           │
//!            │  (refs, channels, subscribers)   │
//!            └──────┬──────────────┬────────────┘
//!                   │              │
//!             dispatcher task   heartbeat task
//!             (sole reader,     (periodic probe,
//!              reconnects)       loss detection)
//!                   │              │
//!             writer half ── tokio::sync::Mutex ── all senders
//! ```
//!
//! The writer half is shared behind a mutex so outbound writes are totally
//! ordered; the dispatcher task is the only reader of the inbound stream.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use futures_util::{FutureExt, SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Notify, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::constants::{TOPIC_PHOENIX, events};
use crate::error::{Result, SensoctoError};
use crate::socket::frame::{Frame, Reply};
use crate::types::ConnectionState;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WriterHalf = futures_util::stream::SplitSink<WsStream, Message>;
type ReaderHalf = futures_util::stream::SplitStream<WsStream>;

/// Callback invoked with the payload of a matching inbound frame.
pub type EventHandler = Arc<dyn Fn(&Value) + Send + Sync>;

// ---------------------------------------------------------------------------
// Handler registration
// ---------------------------------------------------------------------------

/// Identifies a registered event handler for later removal with
/// [`PhoenixSocket::off`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerId(u64);

struct HandlerEntry {
    id: HandlerId,
    handler: EventHandler,
}

// ---------------------------------------------------------------------------
// Channel records
// ---------------------------------------------------------------------------

/// Lifecycle of one multiplexed channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    /// Recorded but not (or no longer) joined.
    Pending,
    /// Join acknowledged by the server.
    Joined,
    /// Leave in flight.
    Leaving,
    /// Left; the record is removed immediately after.
    Left,
}

struct ChannelRecord {
    join_params: Value,
    state: ChannelState,
    /// Whether the reconnect supervisor re-issues the join for this channel.
    /// Call channels opt out; media resumption is the user's responsibility.
    rejoin_on_reconnect: bool,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for a [`PhoenixSocket`], derived from
/// [`SensoctoConfig`](crate::config::SensoctoConfig) by the client facade.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// The derived `ws`/`wss` endpoint.
    pub url: String,
    /// Interval between heartbeat probes.
    pub heartbeat_interval: Duration,
    /// WebSocket handshake deadline.
    pub connection_timeout: Duration,
    /// Default request/reply deadline.
    pub request_timeout: Duration,
    /// Whether transport loss triggers the reconnect supervisor.
    pub auto_reconnect: bool,
    /// Consecutive reconnect attempts before the socket goes terminal.
    pub max_reconnect_attempts: u32,
    /// Delay before each reconnect attempt.
    pub reconnect_delay: Duration,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct SocketShared {
    config: SocketConfig,
    /// Write half of the WebSocket. Held across the underlying send so
    /// outbound frames are totally ordered.
    writer: Mutex<Option<WriterHalf>>,
    /// Monotonic ref counter, reset whenever a new transport is installed.
    ref_counter: AtomicU64,
    /// Awaiters keyed by ref. Dropping a sender fails its awaiter with
    /// `Disconnected`.
    pending: StdMutex<HashMap<String, oneshot::Sender<Reply>>>,
    /// Subscriber lists keyed by (topic, event), invoked in registration
    /// order.
    handlers: StdMutex<HashMap<(String, String), Vec<HandlerEntry>>>,
    /// Remembered channels, rejoined by the supervisor after reconnect.
    channels: StdMutex<HashMap<String, ChannelRecord>>,
    handler_seq: AtomicU64,
    /// Incremented on every successful (re)connect. Lets sessions detect
    /// that their channel predates the current transport.
    connection_epoch: AtomicU64,
    state_tx: watch::Sender<ConnectionState>,
    started: AtomicBool,
    shutdown: AtomicBool,
    /// Signals the dispatcher to treat the current transport as lost
    /// (heartbeat miss, explicit close).
    transport_lost: Notify,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl SocketShared {
    fn set_state(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }
}

impl Drop for SocketShared {
    fn drop(&mut self) {
        for task in self.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// PhoenixSocket
// ---------------------------------------------------------------------------

/// A channel-multiplexed Phoenix WebSocket client.
///
/// Cheap to clone; all clones share one connection. Background tasks hold
/// only weak references, so dropping the last clone tears everything down.
#[derive(Clone)]
pub struct PhoenixSocket {
    inner: Arc<SocketShared>,
}

impl PhoenixSocket {
    /// Create a socket for the given endpoint. No I/O happens until
    /// [`connect`](Self::connect).
    pub fn new(config: SocketConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(SocketShared {
                config,
                writer: Mutex::new(None),
                ref_counter: AtomicU64::new(0),
                pending: StdMutex::new(HashMap::new()),
                handlers: StdMutex::new(HashMap::new()),
                channels: StdMutex::new(HashMap::new()),
                handler_seq: AtomicU64::new(0),
                connection_epoch: AtomicU64::new(0),
                state_tx,
                started: AtomicBool::new(false),
                shutdown: AtomicBool::new(false),
                transport_lost: Notify::new(),
                tasks: StdMutex::new(Vec::new()),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Establish the WebSocket and start the dispatcher and heartbeat tasks.
    ///
    /// Fails with [`SensoctoError::Connect`] on handshake failure or
    /// timeout, leaving the socket in the `Error` state.
    pub async fn connect(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.started.swap(true, Ordering::SeqCst) {
            return Err(SensoctoError::InvalidState("socket already started".into()));
        }

        inner.set_state(ConnectionState::Connecting);
        tracing::info!(url = %inner.config.url, "Connecting");

        let handshake =
            tokio::time::timeout(inner.config.connection_timeout, connect_async(&inner.config.url))
                .await;
        let (ws, _resp) = match handshake {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => {
                inner.set_state(ConnectionState::Error);
                return Err(SensoctoError::Connect {
                    message: format!("failed to connect to {}", inner.config.url),
                    source: Some(e),
                });
            }
            Err(_) => {
                inner.set_state(ConnectionState::Error);
                return Err(SensoctoError::Connect {
                    message: format!(
                        "handshake with {} timed out after {:?}",
                        inner.config.url, inner.config.connection_timeout
                    ),
                    source: None,
                });
            }
        };

        let (write, read) = ws.split();
        *inner.writer.lock().await = Some(write);
        inner.ref_counter.store(0, Ordering::SeqCst);
        inner.connection_epoch.fetch_add(1, Ordering::SeqCst);
        inner.set_state(ConnectionState::Connected);

        let dispatcher = tokio::spawn(Self::dispatcher_task(Arc::downgrade(inner), read));
        let heartbeat = tokio::spawn(Self::heartbeat_task(Arc::downgrade(inner)));
        inner.tasks.lock().unwrap().extend([dispatcher, heartbeat]);

        tracing::info!("Connected");
        Ok(())
    }

    /// Close the socket: cancel background tasks, fail every outstanding
    /// awaiter, and send a close frame if the transport is still up.
    /// Idempotent.
    pub async fn close(&self) {
        let inner = &self.inner;
        if inner.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        inner.transport_lost.notify_one();

        {
            let mut guard = inner.writer.lock().await;
            if let Some(mut writer) = guard.take() {
                let _ = writer.send(Message::Close(None)).await;
            }
        }

        Self::fail_pending(inner);
        for task in inner.tasks.lock().unwrap().drain(..) {
            task.abort();
        }
        inner.set_state(ConnectionState::Disconnected);

        tracing::info!("Socket closed");
    }

    /// Whether the transport is currently up.
    pub fn is_connected(&self) -> bool {
        self.inner.state() == ConnectionState::Connected
    }

    /// The current connection state.
    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Subscribe to connection state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// The current connection epoch. Incremented on every successful
    /// (re)connect; a channel joined under an older epoch no longer exists
    /// server-side.
    pub fn connection_epoch(&self) -> u64 {
        self.inner.connection_epoch.load(Ordering::SeqCst)
    }

    /// The configured default request/reply deadline.
    pub fn request_timeout(&self) -> Duration {
        self.inner.config.request_timeout
    }

    // -----------------------------------------------------------------------
    // Requests & pushes
    // -----------------------------------------------------------------------

    /// Send a request-style frame and await its reply under the default
    /// deadline.
    pub async fn request(&self, topic: &str, event: &str, payload: Value) -> Result<Reply> {
        Self::request_on(&self.inner, topic, event, payload, self.inner.config.request_timeout)
            .await
    }

    /// Send a request-style frame and await its reply under an explicit
    /// deadline.
    pub async fn request_with_timeout(
        &self,
        topic: &str,
        event: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<Reply> {
        Self::request_on(&self.inner, topic, event, payload, timeout).await
    }

    /// Send a one-way frame. A throwaway ref is attached; no reply is
    /// awaited.
    pub async fn push(&self, topic: &str, event: &str, payload: Value) -> Result<()> {
        let reference = Self::next_ref(&self.inner);
        let frame = Frame::new(topic, event, payload, Some(reference));
        Self::write_frame(&self.inner, &frame).await
    }

    async fn request_on(
        inner: &Arc<SocketShared>,
        topic: &str,
        event: &str,
        payload: Value,
        timeout: Duration,
    ) -> Result<Reply> {
        let reference = Self::next_ref(inner);
        let (tx, rx) = oneshot::channel();
        inner.pending.lock().unwrap().insert(reference.clone(), tx);

        let frame = Frame::new(topic, event, payload, Some(reference.clone()));
        if let Err(e) = Self::write_frame(inner, &frame).await {
            inner.pending.lock().unwrap().remove(&reference);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => Ok(reply),
            // The sender was dropped: transport loss failed the awaiter.
            Ok(Err(_)) => Err(SensoctoError::Disconnected),
            Err(_) => {
                inner.pending.lock().unwrap().remove(&reference);
                Err(SensoctoError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    async fn write_frame(inner: &Arc<SocketShared>, frame: &Frame) -> Result<()> {
        let text = frame.encode()?;
        tracing::trace!(topic = %frame.topic, event = %frame.event, "Outbound frame");

        let mut guard = inner.writer.lock().await;
        match guard.as_mut() {
            Some(writer) => writer
                .send(Message::Text(text.into()))
                .await
                .map_err(SensoctoError::WebSocket),
            None => Err(SensoctoError::Disconnected),
        }
    }

    fn next_ref(inner: &Arc<SocketShared>) -> String {
        (inner.ref_counter.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    // -----------------------------------------------------------------------
    // Channel multiplexing
    // -----------------------------------------------------------------------

    /// Record a channel and its join parameters without sending anything.
    /// Idempotent on topic. The channel is rejoined automatically after a
    /// reconnect.
    pub fn subscribe(&self, topic: &str, join_params: Value) {
        self.subscribe_inner(topic, join_params, true);
    }

    /// Record a channel that is *not* rejoined after a reconnect. Used for
    /// call sessions, which fall back to `OutsideChannel` on transport loss.
    pub fn subscribe_transient(&self, topic: &str, join_params: Value) {
        self.subscribe_inner(topic, join_params, false);
    }

    fn subscribe_inner(&self, topic: &str, join_params: Value, rejoin: bool) {
        self.inner
            .channels
            .lock()
            .unwrap()
            .entry(topic.to_owned())
            .or_insert_with(|| ChannelRecord {
                join_params,
                state: ChannelState::Pending,
                rejoin_on_reconnect: rejoin,
            });
    }

    /// Send `phx_join` for a previously subscribed topic and await the
    /// reply. Returns the server's response body on success; fails with
    /// [`SensoctoError::ChannelJoin`] on an error reply.
    pub async fn join(&self, topic: &str) -> Result<Value> {
        let params = {
            let channels = self.inner.channels.lock().unwrap();
            channels.get(topic).map(|rec| rec.join_params.clone())
        };
        let Some(params) = params else {
            return Err(SensoctoError::InvalidState(format!(
                "channel '{topic}' is not subscribed"
            )));
        };

        let reply = self.request(topic, events::PHX_JOIN, params).await?;
        if reply.is_ok() {
            if let Some(rec) = self.inner.channels.lock().unwrap().get_mut(topic) {
                rec.state = ChannelState::Joined;
            }
            tracing::info!(topic, "Joined channel");
            Ok(reply.response)
        } else {
            Err(SensoctoError::ChannelJoin {
                topic: topic.to_owned(),
                reason: reply.error_reason(),
            })
        }
    }

    /// Send `phx_leave` and forget the channel. Idempotent: leaving an
    /// unknown or already-leaving topic is a no-op. Subscriber lists for
    /// the topic are removed either way.
    pub async fn leave(&self, topic: &str) -> Result<()> {
        let should_send = {
            let mut channels = self.inner.channels.lock().unwrap();
            match channels.get_mut(topic) {
                None => false,
                Some(rec) if matches!(rec.state, ChannelState::Leaving | ChannelState::Left) => {
                    false
                }
                Some(rec) => {
                    rec.state = ChannelState::Leaving;
                    true
                }
            }
        };

        if should_send {
            if let Err(e) = self.request(topic, events::PHX_LEAVE, json!({})).await {
                tracing::debug!(topic, error = %e, "Leave request failed");
            }
            tracing::info!(topic, "Left channel");
        }

        self.inner.channels.lock().unwrap().remove(topic);
        self.inner
            .handlers
            .lock()
            .unwrap()
            .retain(|(t, _), _| t != topic);
        Ok(())
    }

    /// The recorded state of a channel, if any.
    pub fn channel_state(&self, topic: &str) -> Option<ChannelState> {
        self.inner
            .channels
            .lock()
            .unwrap()
            .get(topic)
            .map(|rec| rec.state)
    }

    /// Register an event handler for `(topic, event)`. Handlers are invoked
    /// in registration order; a panicking handler is logged and does not
    /// affect its siblings or the connection.
    pub fn on<F>(&self, topic: &str, event: &str, handler: F) -> HandlerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = HandlerId(self.inner.handler_seq.fetch_add(1, Ordering::Relaxed) + 1);
        self.inner
            .handlers
            .lock()
            .unwrap()
            .entry((topic.to_owned(), event.to_owned()))
            .or_default()
            .push(HandlerEntry {
                id,
                handler: Arc::new(handler),
            });
        id
    }

    /// Remove a specific handler, or every handler for `(topic, event)`
    /// when `handler` is `None`.
    pub fn off(&self, topic: &str, event: &str, handler: Option<HandlerId>) {
        let key = (topic.to_owned(), event.to_owned());
        let mut map = self.inner.handlers.lock().unwrap();
        match handler {
            None => {
                map.remove(&key);
            }
            Some(id) => {
                let emptied = map.get_mut(&key).map(|list| {
                    list.retain(|entry| entry.id != id);
                    list.is_empty()
                });
                if emptied == Some(true) {
                    map.remove(&key);
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Inbound dispatch
    // -----------------------------------------------------------------------

    /// Route one inbound frame: resolve a registered awaiter if it is a
    /// reply, otherwise fan out to subscribers.
    fn dispatch(inner: &Arc<SocketShared>, frame: Frame) {
        tracing::trace!(topic = %frame.topic, event = %frame.event, "Inbound frame");

        if frame.event == events::PHX_REPLY {
            if let Some(reference) = frame.reference.as_deref() {
                let sender = inner.pending.lock().unwrap().remove(reference);
                if let Some(tx) = sender {
                    let _ = tx.send(Reply::from_payload(&frame.payload));
                    return;
                }
                // Late reply for an awaiter that timed out or was never
                // registered. Dropped unless someone subscribed to replies.
                tracing::trace!(reference, "Reply with no awaiter");
            }
        }

        let handlers: Vec<EventHandler> = {
            let map = inner.handlers.lock().unwrap();
            map.get(&(frame.topic.clone(), frame.event.clone()))
                .map(|list| list.iter().map(|entry| Arc::clone(&entry.handler)).collect())
                .unwrap_or_default()
        };
        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(&frame.payload))).is_err() {
                tracing::error!(
                    topic = %frame.topic,
                    event = %frame.event,
                    "Event handler panicked"
                );
            }
        }
    }

    fn fail_pending(inner: &SocketShared) {
        let mut pending = inner.pending.lock().unwrap();
        if !pending.is_empty() {
            tracing::debug!(count = pending.len(), "Failing outstanding awaiters");
        }
        // Dropping the senders fails every awaiter with `Disconnected`.
        pending.clear();
    }

    // -----------------------------------------------------------------------
    // Dispatcher task (sole inbound reader + reconnect supervisor)
    // -----------------------------------------------------------------------

    async fn dispatcher_task(weak: Weak<SocketShared>, mut read: ReaderHalf) {
        loop {
            Self::read_until_lost(&weak, &mut read).await;

            let Some(inner) = weak.upgrade() else { return };

            *inner.writer.lock().await = None;
            Self::fail_pending(&inner);

            if inner.shutdown.load(Ordering::SeqCst) {
                return;
            }
            if !inner.config.auto_reconnect {
                inner.set_state(ConnectionState::Disconnected);
                tracing::info!("Transport lost; auto-reconnect disabled");
                return;
            }

            inner.set_state(ConnectionState::Reconnecting);
            {
                let mut channels = inner.channels.lock().unwrap();
                channels.retain(|_, rec| rec.rejoin_on_reconnect);
                for rec in channels.values_mut() {
                    rec.state = ChannelState::Pending;
                }
            }

            match Self::reconnect(&inner).await {
                Some(new_read) => {
                    read = new_read;
                }
                None => {
                    if !inner.shutdown.load(Ordering::SeqCst) {
                        inner.set_state(ConnectionState::Error);
                    }
                    return;
                }
            }
        }
    }

    /// Read and dispatch inbound frames until the transport is lost.
    async fn read_until_lost(weak: &Weak<SocketShared>, read: &mut ReaderHalf) {
        // Drain any stale loss signal left over from a previous transport.
        if let Some(inner) = weak.upgrade() {
            let _ = inner.transport_lost.notified().now_or_never();
        }

        loop {
            let Some(inner) = weak.upgrade() else { return };
            if inner.shutdown.load(Ordering::SeqCst) {
                return;
            }

            tokio::select! {
                _ = inner.transport_lost.notified() => {
                    tracing::debug!("Transport marked lost");
                    return;
                }
                item = read.next() => match item {
                    Some(Ok(Message::Text(text))) => match Frame::decode(&text) {
                        Ok(frame) => Self::dispatch(&inner, frame),
                        Err(e) => tracing::warn!(error = %e, "Discarding malformed frame"),
                    },
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed by server");
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "WebSocket error");
                        return;
                    }
                    None => {
                        tracing::info!("WebSocket stream ended");
                        return;
                    }
                }
            }
        }
    }

    /// Attempt to re-establish the socket, up to the configured cap.
    ///
    /// On success the writer is replaced, the ref counter reset, and the
    /// remembered channels rejoined (in a separate task, so this reader can
    /// consume the join replies).
    async fn reconnect(inner: &Arc<SocketShared>) -> Option<ReaderHalf> {
        let max = inner.config.max_reconnect_attempts;
        for attempt in 1..=max {
            tokio::time::sleep(inner.config.reconnect_delay).await;
            if inner.shutdown.load(Ordering::SeqCst) {
                return None;
            }

            tracing::info!(attempt, max_attempts = max, "Attempting reconnect");
            let handshake = tokio::time::timeout(
                inner.config.connection_timeout,
                connect_async(&inner.config.url),
            )
            .await;

            match handshake {
                Ok(Ok((ws, _resp))) => {
                    let (write, new_read) = ws.split();
                    *inner.writer.lock().await = Some(write);
                    inner.ref_counter.store(0, Ordering::SeqCst);
                    inner.connection_epoch.fetch_add(1, Ordering::SeqCst);
                    inner.set_state(ConnectionState::Connected);
                    tracing::info!(attempt, "Reconnected");

                    let rejoin = Arc::clone(inner);
                    tokio::spawn(async move { Self::rejoin_all(&rejoin).await });
                    return Some(new_read);
                }
                Ok(Err(e)) => {
                    tracing::warn!(attempt, error = %e, "Reconnect attempt failed");
                }
                Err(_) => {
                    tracing::warn!(attempt, "Reconnect attempt timed out");
                }
            }
        }

        tracing::error!(max_attempts = max, "Reconnect attempts exhausted");
        None
    }

    /// Re-issue `phx_join` for every channel in the `Pending` state. A
    /// failed rejoin is logged and does not stop the rest.
    async fn rejoin_all(inner: &Arc<SocketShared>) {
        let pending: Vec<(String, Value)> = {
            let channels = inner.channels.lock().unwrap();
            channels
                .iter()
                .filter(|(_, rec)| rec.state == ChannelState::Pending)
                .map(|(topic, rec)| (topic.clone(), rec.join_params.clone()))
                .collect()
        };

        for (topic, params) in pending {
            let result = Self::request_on(
                inner,
                &topic,
                events::PHX_JOIN,
                params,
                inner.config.request_timeout,
            )
            .await;
            match result {
                Ok(reply) if reply.is_ok() => {
                    if let Some(rec) = inner.channels.lock().unwrap().get_mut(&topic) {
                        rec.state = ChannelState::Joined;
                    }
                    tracing::info!(topic = %topic, "Rejoined channel");
                }
                Ok(reply) => {
                    tracing::warn!(
                        topic = %topic,
                        reason = %reply.error_reason(),
                        "Channel rejoin rejected"
                    );
                }
                Err(e) => {
                    tracing::warn!(topic = %topic, error = %e, "Channel rejoin failed");
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Heartbeat task
    // -----------------------------------------------------------------------

    /// Emit a heartbeat on the reserved `phoenix` topic every interval and
    /// await its reply. A reply missing for twice the interval counts as
    /// transport loss.
    async fn heartbeat_task(weak: Weak<SocketShared>) {
        loop {
            let interval = {
                let Some(inner) = weak.upgrade() else { return };
                if inner.shutdown.load(Ordering::SeqCst) {
                    return;
                }
                inner.config.heartbeat_interval
            };
            tokio::time::sleep(interval).await;

            let Some(inner) = weak.upgrade() else { return };
            if inner.shutdown.load(Ordering::SeqCst) {
                return;
            }
            if inner.state() != ConnectionState::Connected {
                continue;
            }

            let result =
                Self::request_on(&inner, TOPIC_PHOENIX, events::HEARTBEAT, json!({}), interval * 2)
                    .await;
            match result {
                Ok(_) => tracing::trace!("Heartbeat acknowledged"),
                Err(SensoctoError::Timeout { timeout_ms }) => {
                    tracing::warn!(timeout_ms, "Heartbeat reply missed; dropping transport");
                    *inner.writer.lock().await = None;
                    inner.transport_lost.notify_one();
                }
                // Transport already down; the supervisor is on it.
                Err(_) => {}
            }
        }
    }
}
