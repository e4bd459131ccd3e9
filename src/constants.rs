//! Constants for the Sensocto wire protocol.
//!
//! Contains the WebSocket endpoint path, topic prefixes, reserved Phoenix
//! events, and the default tunables. These are used internally by
//! [`SensoctoClient`](crate::client::SensoctoClient) and the socket layer,
//! but are also exported for advanced usage.

// ---------------------------------------------------------------------------
// Endpoint
// ---------------------------------------------------------------------------

/// Path appended to the server host when deriving the WebSocket endpoint.
pub const WS_SOCKET_PATH: &str = "/socket/websocket";

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

/// Reserved topic for protocol-level traffic (heartbeats).
pub const TOPIC_PHOENIX: &str = "phoenix";

/// Prefix for connector presence channels (`sensocto:connector:<connector_id>`).
pub const CONNECTOR_TOPIC_PREFIX: &str = "sensocto:connector:";

/// Prefix for sensor stream channels (`sensocto:sensor:<sensor_id>`).
pub const SENSOR_TOPIC_PREFIX: &str = "sensocto:sensor:";

/// Prefix for call session channels (`call:<room_id>`).
pub const CALL_TOPIC_PREFIX: &str = "call:";

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Reserved and application-level event names on the wire.
pub mod events {
    /// Channel join request.
    pub const PHX_JOIN: &str = "phx_join";
    /// Channel leave request.
    pub const PHX_LEAVE: &str = "phx_leave";
    /// Reply to a ref-carrying request.
    pub const PHX_REPLY: &str = "phx_reply";
    /// Server-side channel error.
    pub const PHX_ERROR: &str = "phx_error";
    /// Server-side channel close.
    pub const PHX_CLOSE: &str = "phx_close";
    /// Liveness probe on the `phoenix` topic.
    pub const HEARTBEAT: &str = "heartbeat";

    /// A single sensor measurement (one-way).
    pub const MEASUREMENT: &str = "measurement";
    /// An ordered batch of sensor measurements (one-way).
    pub const MEASUREMENTS_BATCH: &str = "measurements_batch";
    /// Attribute registry update (one-way).
    pub const UPDATE_ATTRIBUTES: &str = "update_attributes";
    /// Server-advertised batching recommendation.
    pub const BACKPRESSURE_CONFIG: &str = "backpressure_config";

    /// Enter the call in a joined room channel.
    pub const JOIN_CALL: &str = "join_call";
    /// Leave the call without leaving the room channel.
    pub const LEAVE_CALL: &str = "leave_call";
    /// WebRTC signaling pass-through (SDP, ICE).
    pub const MEDIA_EVENT: &str = "media_event";
    /// Toggle the local audio track.
    pub const TOGGLE_AUDIO: &str = "toggle_audio";
    /// Toggle the local video track.
    pub const TOGGLE_VIDEO: &str = "toggle_video";
    /// Request a video quality level.
    pub const SET_QUALITY: &str = "set_quality";
    /// Request the current participant roster.
    pub const GET_PARTICIPANTS: &str = "get_participants";

    /// A participant entered the call.
    pub const PARTICIPANT_JOINED: &str = "participant_joined";
    /// A participant left the call.
    pub const PARTICIPANT_LEFT: &str = "participant_left";
    /// A participant's audio state changed.
    pub const PARTICIPANT_AUDIO_CHANGED: &str = "participant_audio_changed";
    /// A participant's video state changed.
    pub const PARTICIPANT_VIDEO_CHANGED: &str = "participant_video_changed";
    /// The call quality level changed.
    pub const QUALITY_CHANGED: &str = "quality_changed";
    /// The call was terminated server-side.
    pub const CALL_ENDED: &str = "call_ended";
}

// ---------------------------------------------------------------------------
// Defaults & limits
// ---------------------------------------------------------------------------

/// Default tunables and protocol limits.
pub mod defaults {
    /// Default heartbeat interval in seconds.
    pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;
    /// Minimum permitted heartbeat interval in seconds.
    pub const MIN_HEARTBEAT_INTERVAL_SECS: u64 = 1;
    /// Default WebSocket handshake timeout in seconds.
    pub const CONNECTION_TIMEOUT_SECS: u64 = 10;
    /// Default request/reply deadline in milliseconds.
    pub const REQUEST_TIMEOUT_MS: u64 = 10_000;
    /// Default delay between reconnect attempts in milliseconds.
    pub const RECONNECT_DELAY_MS: u64 = 2_000;
    /// Default cap on consecutive reconnect attempts.
    pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

    /// Default batch window when the server has not advertised one (ms).
    pub const BATCH_WINDOW_MS: u64 = 5_000;
    /// Default batch size when the server has not advertised one.
    pub const BATCH_SIZE: usize = 20;
    /// Largest batch window the client will honor (ms).
    pub const MAX_BATCH_WINDOW_MS: u64 = 60_000;
    /// Largest batch size the client will honor.
    pub const MAX_BATCH_SIZE: usize = 10_000;

    /// Maximum length of a measurement attribute ID.
    pub const MAX_ATTRIBUTE_ID_LEN: usize = 64;
}
