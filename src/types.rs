//! Data models for the Sensocto client.
//!
//! Wire-facing types ([`Measurement`], [`BackpressureConfig`],
//! [`CallParticipant`], [`IceServer`]) are serde-derived against the server's
//! JSON shapes. Client-facing types ([`ConnectionState`], [`CallEvent`]) are
//! plain enums dispatched to user callbacks.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::defaults;

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Connection state of the client.
///
/// `Disconnected → Connecting → Connected → (Reconnecting → Connected)* →
/// Disconnected`. `Error` is entered on a failed connect or once reconnect
/// attempts are exhausted, and persists until the user disconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport. Initial and post-disconnect state.
    Disconnected,
    /// WebSocket handshake in progress.
    Connecting,
    /// Transport up, heartbeats flowing.
    Connected,
    /// Transport lost; the reconnect supervisor is attempting a new socket.
    Reconnecting,
    /// Connect failed or reconnect attempts exhausted.
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Measurements
// ---------------------------------------------------------------------------

/// A single timestamped sensor measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    /// The attribute identifier. Validated against
    /// [`validate_attribute_id`](crate::sensor::validate_attribute_id)
    /// before entering any batch buffer.
    pub attribute_id: String,
    /// The measurement payload (object, number, or array).
    pub payload: Value,
    /// Unix timestamp in milliseconds.
    pub timestamp: i64,
}

impl Measurement {
    /// Create a measurement, filling the timestamp with the current time
    /// when not provided.
    pub fn new(attribute_id: impl Into<String>, payload: Value, timestamp: Option<i64>) -> Self {
        Self {
            attribute_id: attribute_id.into(),
            payload,
            timestamp: timestamp.unwrap_or_else(now_ms),
        }
    }
}

/// Current Unix time in milliseconds.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ---------------------------------------------------------------------------
// Backpressure
// ---------------------------------------------------------------------------

/// Server-reported load signal driving client-side batching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttentionLevel {
    /// Server is idle; large, slow batches.
    None,
    /// Light load.
    Low,
    /// Moderate load.
    Medium,
    /// Server wants measurements as fresh as possible.
    High,
}

impl AttentionLevel {
    /// Parse a wire value, mapping unknown levels to [`AttentionLevel::None`].
    pub fn parse(s: &str) -> Self {
        match s {
            "low" => Self::Low,
            "medium" => Self::Medium,
            "high" => Self::High,
            _ => Self::None,
        }
    }

    /// The canonical batch window for this level, in milliseconds.
    ///
    /// Applied when the server advertises a level without an explicit
    /// recommendation.
    pub fn recommended_batch_window_ms(self) -> u64 {
        match self {
            Self::High => 100,
            Self::Medium => 500,
            Self::Low => 2_000,
            Self::None => 5_000,
        }
    }

    /// The canonical batch size for this level.
    pub fn recommended_batch_size(self) -> usize {
        match self {
            Self::High => 1,
            Self::Medium => 5,
            Self::Low => 10,
            Self::None => 20,
        }
    }
}

impl fmt::Display for AttentionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        };
        f.write_str(s)
    }
}

/// Effective batching configuration for one sensor topic.
///
/// Starts at the defaults and is superseded by each server
/// `backpressure_config` push. Out-of-range recommendations are clamped to
/// `[1, 60000]` ms and `[1, 10000]` measurements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackpressureConfig {
    /// The server's advertised attention level.
    pub attention_level: AttentionLevel,
    /// Maximum time a measurement may wait in the batch buffer, in
    /// milliseconds.
    pub batch_window_ms: u64,
    /// Number of buffered measurements that triggers an immediate flush.
    pub batch_size: usize,
    /// Server timestamp of the advertisement, in milliseconds.
    pub as_of_ms: i64,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            attention_level: AttentionLevel::None,
            batch_window_ms: defaults::BATCH_WINDOW_MS,
            batch_size: defaults::BATCH_SIZE,
            as_of_ms: 0,
        }
    }
}

impl BackpressureConfig {
    /// Parse a server `backpressure_config` payload.
    ///
    /// Unknown attention levels map to `none`; missing recommendations fall
    /// back to the level's canonical mapping.
    pub fn from_payload(payload: &Value) -> Self {
        let attention_level = payload
            .get("attention_level")
            .and_then(Value::as_str)
            .map(AttentionLevel::parse)
            .unwrap_or(AttentionLevel::None);

        let batch_window_ms = payload
            .get("recommended_batch_window")
            .and_then(Value::as_u64)
            .unwrap_or_else(|| attention_level.recommended_batch_window_ms())
            .clamp(1, defaults::MAX_BATCH_WINDOW_MS);

        let batch_size = payload
            .get("recommended_batch_size")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or_else(|| attention_level.recommended_batch_size())
            .clamp(1, defaults::MAX_BATCH_SIZE);

        let as_of_ms = payload.get("timestamp").and_then(Value::as_i64).unwrap_or(0);

        Self {
            attention_level,
            batch_window_ms,
            batch_size,
            as_of_ms,
        }
    }
}

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

/// A participant in a call, as reported by the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallParticipant {
    /// The participant's user ID.
    #[serde(default)]
    pub user_id: String,
    /// The participant's media endpoint ID.
    #[serde(default)]
    pub endpoint_id: String,
    /// Opaque user metadata supplied at join time.
    #[serde(default)]
    pub user_info: Value,
    /// When the participant joined, as an ISO-8601 string.
    #[serde(default)]
    pub joined_at: Option<String>,
    /// Whether the participant's audio track is live.
    #[serde(default)]
    pub audio_enabled: bool,
    /// Whether the participant's video track is live.
    #[serde(default)]
    pub video_enabled: bool,
}

/// ICE server configuration for WebRTC, handed back on channel join.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServer {
    /// STUN/TURN URLs.
    pub urls: Vec<String>,
    /// Username for TURN authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Credential for TURN authentication.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// Requested video quality level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallQuality {
    /// Full resolution.
    High,
    /// Reduced resolution.
    Medium,
    /// Minimum resolution.
    Low,
    /// Let the server pick.
    Auto,
}

impl fmt::Display for CallQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Auto => "auto",
        };
        f.write_str(s)
    }
}

/// A typed inbound call event, dispatched to
/// [`CallSession::on_event`](crate::call::CallSession::on_event) observers.
#[derive(Debug, Clone)]
pub enum CallEvent {
    /// A participant entered the call.
    ParticipantJoined {
        /// The new participant.
        participant: CallParticipant,
    },
    /// A participant left the call.
    ParticipantLeft {
        /// The departing participant's user ID.
        user_id: String,
        /// Whether the participant's process crashed rather than left
        /// cleanly.
        crashed: bool,
    },
    /// A WebRTC signaling payload from another peer.
    MediaEvent {
        /// The signaling data (SDP or ICE).
        data: Value,
    },
    /// A participant's audio state changed.
    ParticipantAudioChanged {
        /// The participant's user ID.
        user_id: String,
        /// The new audio state.
        enabled: bool,
    },
    /// A participant's video state changed.
    ParticipantVideoChanged {
        /// The participant's user ID.
        user_id: String,
        /// The new video state.
        enabled: bool,
    },
    /// The call quality level changed.
    QualityChanged {
        /// The new quality level, as reported.
        quality: String,
    },
    /// The call was terminated server-side.
    CallEnded,
}

// ---------------------------------------------------------------------------
// Rooms & users
// ---------------------------------------------------------------------------

/// Room membership role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomRole {
    /// The room's creator.
    Owner,
    /// Elevated member.
    Admin,
    /// Regular member.
    Member,
}

/// A room on the Sensocto server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// The room ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Optional invite code.
    #[serde(default)]
    pub join_code: Option<String>,
    /// Whether the room is publicly listed.
    #[serde(default = "default_true")]
    pub is_public: bool,
    /// Whether calls may be started in this room.
    #[serde(default = "default_true")]
    pub calls_enabled: bool,
    /// The owner's user ID.
    pub owner_id: String,
    /// Server-side room configuration.
    #[serde(default)]
    pub configuration: Value,
}

/// A user on the Sensocto server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// The user ID.
    pub id: String,
    /// Email address, when disclosed.
    #[serde(default)]
    pub email: Option<String>,
}

fn default_true() -> bool {
    true
}
