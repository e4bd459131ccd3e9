//! Error types for the `sensocto-rs` crate.
//!
//! All fallible operations in this crate return [`Result<T>`], which is an
//! alias for `std::result::Result<T, SensoctoError>`.
//!
//! [`SensoctoError`] covers:
//! - **Connection errors** — WebSocket handshake failures and timeouts
//! - **Disconnected** — operations attempted while the transport is down
//! - **Channel errors** — server-rejected joins, invalid session state
//! - **Timeouts** — request/reply deadlines that elapsed without a reply
//! - **Validation errors** — invalid configuration or attribute IDs
//! - **Protocol errors** — malformed inbound frames (logged, not surfaced)
//! - **Transport errors** — WebSocket, JSON, and URL failures

/// All possible errors produced by the `sensocto-rs` client.
#[derive(Debug, thiserror::Error)]
pub enum SensoctoError {
    /// Establishing the WebSocket connection failed.
    #[error("Connection failed: {message}")]
    Connect {
        /// Description of the handshake failure.
        message: String,
        /// The underlying WebSocket error, if any.
        #[source]
        source: Option<tokio_tungstenite::tungstenite::Error>,
    },

    /// An operation was attempted while the transport is down.
    #[error("Client is disconnected")]
    Disconnected,

    /// The server rejected a channel join.
    #[error("Failed to join channel '{topic}': {reason}")]
    ChannelJoin {
        /// The topic of the rejected join.
        topic: String,
        /// The server-supplied rejection reason.
        reason: String,
    },

    /// A request/reply operation did not receive a reply before its deadline.
    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout {
        /// The timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// Pre-connect configuration validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A measurement attribute ID failed validation.
    #[error("Invalid attribute ID '{attribute_id}': {reason}")]
    InvalidAttributeId {
        /// The offending attribute ID.
        attribute_id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The server signaled an authentication failure.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// An operation requires a session state the caller is not in
    /// (e.g. sending a media event while outside the call).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The server rejected a call operation.
    #[error("Call operation '{operation}' failed: {reason}")]
    Call {
        /// The rejected operation (e.g. `toggle_audio`).
        operation: String,
        /// The server-supplied rejection reason.
        reason: String,
    },

    /// A malformed inbound frame. Logged and discarded by the dispatcher,
    /// never returned across the public API.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A WebSocket-level error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Failed to serialize or deserialize a JSON payload.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An error building or parsing a URL.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SensoctoError>;
