//! Call sessions.
//!
//! A [`CallSession`] is the per-room facade over the shared socket: it joins
//! `call:<room_id>`, enters and leaves the call proper, passes WebRTC
//! signaling through as opaque `media_event` frames, and translates inbound
//! participant-state events into typed [`CallEvent`]s.
//!
//! The session walks `OutsideChannel → JoinedChannel → InCall` and back. A
//! server-side `call_ended` forces `InCall → JoinedChannel` and invalidates
//! the endpoint ID. If the transport is lost mid-call, the session falls
//! back to `OutsideChannel` on reconnect — media resumption is the user's
//! responsibility, so call channels are not rejoined automatically.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use serde_json::{Value, json};

use crate::constants::{CALL_TOPIC_PREFIX, events};
use crate::error::{Result, SensoctoError};
use crate::socket::phoenix::PhoenixSocket;
use crate::types::{CallEvent, CallParticipant, CallQuality, IceServer};

type CallObserver = Arc<dyn Fn(&CallEvent) + Send + Sync>;

struct CallShared {
    topic: String,
    joined: AtomicBool,
    in_call: AtomicBool,
    /// Connection epoch at join time; a reconnect invalidates the channel.
    joined_epoch: AtomicU64,
    endpoint_id: StdMutex<Option<String>>,
    ice_servers: StdMutex<Vec<IceServer>>,
    observers: StdMutex<Vec<CallObserver>>,
}

impl CallShared {
    /// Invoke every observer with the event, isolating panics per observer.
    fn dispatch(&self, event: &CallEvent) {
        let observers: Vec<CallObserver> = self.observers.lock().unwrap().clone();
        for observer in observers {
            if catch_unwind(AssertUnwindSafe(|| observer(event))).is_err() {
                tracing::error!(topic = %self.topic, "Call event observer panicked");
            }
        }
    }
}

/// Session for video/voice communication in one room.
///
/// Created by
/// [`SensoctoClient::join_call`](crate::client::SensoctoClient::join_call),
/// which performs the channel join. Closing the session leaves the client
/// intact.
pub struct CallSession {
    socket: PhoenixSocket,
    topic: String,
    room_id: String,
    user_id: String,
    shared: Arc<CallShared>,
}

impl CallSession {
    pub(crate) fn new(
        socket: PhoenixSocket,
        room_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        let room_id = room_id.into();
        let topic = format!("{CALL_TOPIC_PREFIX}{room_id}");
        let shared = Arc::new(CallShared {
            topic: topic.clone(),
            joined: AtomicBool::new(false),
            in_call: AtomicBool::new(false),
            joined_epoch: AtomicU64::new(0),
            endpoint_id: StdMutex::new(None),
            ice_servers: StdMutex::new(Vec::new()),
            observers: StdMutex::new(Vec::new()),
        });

        Self::register_event_handlers(&socket, &topic, &shared);

        Self {
            socket,
            topic,
            room_id,
            user_id: user_id.into(),
            shared,
        }
    }

    /// The room ID.
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    /// The local user ID.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The channel topic (`call:<room_id>`).
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether the room channel is joined on the current transport.
    pub fn is_joined(&self) -> bool {
        self.shared.joined.load(Ordering::SeqCst)
            && self.socket.is_connected()
            && self.shared.joined_epoch.load(Ordering::SeqCst) == self.socket.connection_epoch()
    }

    /// Whether the local user is in the call.
    pub fn in_call(&self) -> bool {
        self.shared.in_call.load(Ordering::SeqCst) && self.is_joined()
    }

    /// The server-assigned media endpoint ID, set while in the call.
    pub fn endpoint_id(&self) -> Option<String> {
        self.shared.endpoint_id.lock().unwrap().clone()
    }

    /// ICE servers handed back by the server on channel join.
    pub fn ice_servers(&self) -> Vec<IceServer> {
        self.shared.ice_servers.lock().unwrap().clone()
    }

    /// Register an observer for inbound call events. Observers are invoked
    /// in registration order; a panicking observer does not affect its
    /// siblings.
    pub fn on_event<F>(&self, handler: F)
    where
        F: Fn(&CallEvent) + Send + Sync + 'static,
    {
        self.shared.observers.lock().unwrap().push(Arc::new(handler));
    }

    // -----------------------------------------------------------------------
    // Channel & call lifecycle
    // -----------------------------------------------------------------------

    /// Join the room channel. On success, records any server-supplied ICE
    /// servers and returns the join response.
    pub async fn join_channel(&self, join_params: Value) -> Result<Value> {
        self.socket.subscribe_transient(&self.topic, join_params);
        let response = self.socket.join(&self.topic).await?;

        if let Some(servers) = response.get("ice_servers") {
            let parsed: Vec<IceServer> =
                serde_json::from_value(servers.clone()).unwrap_or_default();
            *self.shared.ice_servers.lock().unwrap() = parsed;
        }
        self.shared
            .joined_epoch
            .store(self.socket.connection_epoch(), Ordering::SeqCst);
        self.shared.joined.store(true, Ordering::SeqCst);
        Ok(response)
    }

    /// Leave the room channel, leaving the call first when necessary.
    /// Idempotent.
    pub async fn leave_channel(&self) -> Result<()> {
        if !self.shared.joined.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        if self.shared.in_call.load(Ordering::SeqCst) {
            if let Err(e) = self.send_leave_call().await {
                tracing::debug!(topic = %self.topic, error = %e, "Leave-call during teardown failed");
            }
        }

        self.socket.leave(&self.topic).await
    }

    /// Enter the call. Requires a joined channel; on success records the
    /// server-assigned endpoint ID and returns the response (which also
    /// carries the current participants).
    pub async fn join_call(&self) -> Result<Value> {
        if !self.is_joined() {
            return Err(SensoctoError::InvalidState("channel not joined".into()));
        }

        let reply = self.socket.request(&self.topic, events::JOIN_CALL, json!({})).await?;
        if reply.is_error() {
            return Err(SensoctoError::Call {
                operation: events::JOIN_CALL.to_owned(),
                reason: reply.error_reason(),
            });
        }

        let endpoint = reply
            .response
            .get("endpoint_id")
            .and_then(Value::as_str)
            .map(str::to_owned);
        *self.shared.endpoint_id.lock().unwrap() = endpoint;
        self.shared.in_call.store(true, Ordering::SeqCst);

        tracing::info!(topic = %self.topic, endpoint_id = ?self.endpoint_id(), "Joined call");
        Ok(reply.response)
    }

    /// Leave the call without leaving the room channel. Idempotent.
    pub async fn leave_call(&self) -> Result<()> {
        if !self.shared.in_call.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.send_leave_call().await
    }

    async fn send_leave_call(&self) -> Result<()> {
        let result = self.socket.request(&self.topic, events::LEAVE_CALL, json!({})).await;
        self.shared.in_call.store(false, Ordering::SeqCst);
        *self.shared.endpoint_id.lock().unwrap() = None;
        tracing::info!(topic = %self.topic, "Left call");
        result.map(|_| ())
    }

    /// Close the session. Alias for [`leave_channel`](Self::leave_channel).
    pub async fn close(&self) -> Result<()> {
        self.leave_channel().await
    }

    // -----------------------------------------------------------------------
    // In-call operations
    // -----------------------------------------------------------------------

    /// Pass a WebRTC signaling payload (SDP offer/answer, ICE candidate)
    /// through to the media server. One-way; arrival order is preserved.
    pub async fn send_media_event(&self, data: Value) -> Result<()> {
        self.ensure_in_call()?;
        self.socket
            .push(&self.topic, events::MEDIA_EVENT, json!({ "data": data }))
            .await
    }

    /// Toggle the local audio track.
    pub async fn toggle_audio(&self, enabled: bool) -> Result<()> {
        self.ensure_in_call()?;
        self.call_op(events::TOGGLE_AUDIO, json!({ "enabled": enabled })).await
    }

    /// Toggle the local video track.
    pub async fn toggle_video(&self, enabled: bool) -> Result<()> {
        self.ensure_in_call()?;
        self.call_op(events::TOGGLE_VIDEO, json!({ "enabled": enabled })).await
    }

    /// Request a video quality level.
    pub async fn set_quality(&self, quality: CallQuality) -> Result<()> {
        self.ensure_in_call()?;
        self.call_op(events::SET_QUALITY, json!({ "quality": quality })).await
    }

    /// Fetch the current participants, keyed by user ID.
    ///
    /// Returns an empty map on an error reply.
    pub async fn get_participants(&self) -> Result<HashMap<String, CallParticipant>> {
        let reply = self
            .socket
            .request(&self.topic, events::GET_PARTICIPANTS, json!({}))
            .await?;
        if reply.is_error() {
            return Ok(HashMap::new());
        }

        let mut participants = HashMap::new();
        if let Some(map) = reply.response.get("participants").and_then(Value::as_object) {
            for (user_id, data) in map {
                let mut participant: CallParticipant =
                    serde_json::from_value(data.clone()).unwrap_or_default();
                if participant.user_id.is_empty() {
                    participant.user_id = user_id.clone();
                }
                participants.insert(user_id.clone(), participant);
            }
        }
        Ok(participants)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn ensure_in_call(&self) -> Result<()> {
        if self.in_call() {
            Ok(())
        } else {
            Err(SensoctoError::InvalidState("not in call".into()))
        }
    }

    async fn call_op(&self, operation: &str, payload: Value) -> Result<()> {
        let reply = self.socket.request(&self.topic, operation, payload).await?;
        if reply.is_error() {
            return Err(SensoctoError::Call {
                operation: operation.to_owned(),
                reason: reply.error_reason(),
            });
        }
        Ok(())
    }

    fn register_event_handlers(socket: &PhoenixSocket, topic: &str, shared: &Arc<CallShared>) {
        let s = Arc::clone(shared);
        socket.on(topic, events::PARTICIPANT_JOINED, move |payload| {
            let participant: CallParticipant =
                serde_json::from_value(payload.clone()).unwrap_or_default();
            s.dispatch(&CallEvent::ParticipantJoined { participant });
        });

        let s = Arc::clone(shared);
        socket.on(topic, events::PARTICIPANT_LEFT, move |payload| {
            s.dispatch(&CallEvent::ParticipantLeft {
                user_id: str_field(payload, "user_id"),
                crashed: bool_field(payload, "crashed"),
            });
        });

        let s = Arc::clone(shared);
        socket.on(topic, events::MEDIA_EVENT, move |payload| {
            let data = payload.get("data").cloned().unwrap_or(Value::Null);
            s.dispatch(&CallEvent::MediaEvent { data });
        });

        let s = Arc::clone(shared);
        socket.on(topic, events::PARTICIPANT_AUDIO_CHANGED, move |payload| {
            s.dispatch(&CallEvent::ParticipantAudioChanged {
                user_id: str_field(payload, "user_id"),
                enabled: bool_field(payload, "audio_enabled"),
            });
        });

        let s = Arc::clone(shared);
        socket.on(topic, events::PARTICIPANT_VIDEO_CHANGED, move |payload| {
            s.dispatch(&CallEvent::ParticipantVideoChanged {
                user_id: str_field(payload, "user_id"),
                enabled: bool_field(payload, "video_enabled"),
            });
        });

        let s = Arc::clone(shared);
        socket.on(topic, events::QUALITY_CHANGED, move |payload| {
            s.dispatch(&CallEvent::QualityChanged {
                quality: str_field(payload, "quality"),
            });
        });

        let s = Arc::clone(shared);
        socket.on(topic, events::CALL_ENDED, move |_payload| {
            // Forced transition: InCall → JoinedChannel, endpoint invalid.
            s.in_call.store(false, Ordering::SeqCst);
            *s.endpoint_id.lock().unwrap() = None;
            s.dispatch(&CallEvent::CallEnded);
        });
    }
}

fn str_field(payload: &Value, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

fn bool_field(payload: &Value, key: &str) -> bool {
    payload.get(key).and_then(Value::as_bool).unwrap_or(false)
}
