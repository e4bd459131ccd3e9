//! Main Sensocto client.
//!
//! [`SensoctoClient`] composes the socket layer with the connector identity:
//! it validates configuration, derives the WebSocket endpoint, auto-joins
//! the connector presence channel, and hands out
//! [`SensorStream`](crate::sensor::SensorStream)s and
//! [`CallSession`](crate::call::CallSession)s that share its connection.

use std::sync::Mutex as StdMutex;
use std::time::Duration;

use serde_json::{Value, json};

use crate::call::CallSession;
use crate::config::{SensoctoConfig, SensorConfig};
use crate::constants::CONNECTOR_TOPIC_PREFIX;
use crate::error::{Result, SensoctoError};
use crate::sensor::SensorStream;
use crate::socket::phoenix::{PhoenixSocket, SocketConfig};
use crate::types::ConnectionState;

/// Main client for connecting to Sensocto.
///
/// # Example
///
/// ```no_run
/// use sensocto_rs::{SensoctoClient, SensorConfig};
///
/// # #[tokio::main]
/// # async fn main() -> sensocto_rs::Result<()> {
/// let client = SensoctoClient::new("https://your-server.com")
///     .with_bearer_token("your-token");
/// client.connect().await?;
///
/// let sensor = client
///     .register_sensor(SensorConfig::new("My Sensor"))
///     .await?;
/// sensor
///     .send_measurement("temperature", serde_json::json!({ "value": 23.5 }), None)
///     .await?;
///
/// client.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct SensoctoClient {
    config: SensoctoConfig,
    socket: StdMutex<Option<PhoenixSocket>>,
}

impl SensoctoClient {
    /// Create a client for the given server URL with default configuration.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self::from_config(SensoctoConfig::new(server_url))
    }

    /// Create a client from an explicit configuration.
    pub fn from_config(config: SensoctoConfig) -> Self {
        Self {
            config,
            socket: StdMutex::new(None),
        }
    }

    /// Set the bearer token. Only meaningful before [`connect`](Self::connect).
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.config.bearer_token = Some(token.into());
        self
    }

    /// Set the connector name. Only meaningful before [`connect`](Self::connect).
    pub fn with_connector_name(mut self, name: impl Into<String>) -> Self {
        self.config.connector_name = name.into();
        self
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &SensoctoConfig {
        &self.config
    }

    /// The connector ID.
    pub fn connector_id(&self) -> &str {
        &self.config.connector_id
    }

    /// The connector name.
    pub fn connector_name(&self) -> &str {
        &self.config.connector_name
    }

    /// The current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.socket
            .lock()
            .unwrap()
            .as_ref()
            .map_or(ConnectionState::Disconnected, PhoenixSocket::state)
    }

    /// Whether the client is connected.
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Validate the configuration and connect to the Sensocto server.
    ///
    /// Fails with [`SensoctoError::InvalidConfig`] before any I/O, or
    /// [`SensoctoError::Connect`] on handshake failure — in which case the
    /// client reports the `Error` state until [`disconnect`](Self::disconnect).
    pub async fn connect(&self) -> Result<()> {
        self.config.validate()?;

        if self.is_connected() {
            return Err(SensoctoError::InvalidState("client already connected".into()));
        }

        let socket = PhoenixSocket::new(SocketConfig {
            url: self.config.websocket_url()?,
            heartbeat_interval: Duration::from_secs(self.config.heartbeat_interval_seconds),
            connection_timeout: Duration::from_secs(self.config.connection_timeout_seconds),
            request_timeout: Duration::from_millis(self.config.request_timeout_ms),
            auto_reconnect: self.config.auto_reconnect,
            max_reconnect_attempts: self.config.max_reconnect_attempts,
            reconnect_delay: Duration::from_millis(self.config.reconnect_delay_ms),
        });
        *self.socket.lock().unwrap() = Some(socket.clone());

        socket.connect().await?;

        if self.config.auto_join_connector {
            self.join_connector_channel(&socket).await;
        }

        Ok(())
    }

    /// Disconnect from the server. Every stream and session handed out by
    /// this client fails with [`SensoctoError::Disconnected`] afterwards.
    pub async fn disconnect(&self) -> Result<()> {
        let socket = self.socket.lock().unwrap().take();
        if let Some(socket) = socket {
            socket.close().await;
        }
        tracing::info!("Disconnected from Sensocto server");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Streams & sessions
    // -----------------------------------------------------------------------

    /// Register a sensor and return a stream for sending measurements.
    ///
    /// Joins `sensocto:sensor:<sensor_id>` with the sensor's advertised
    /// attributes and rates.
    pub async fn register_sensor(&self, config: SensorConfig) -> Result<SensorStream> {
        let socket = self.connected_socket()?;

        let join_params = json!({
            "connector_id": self.config.connector_id,
            "connector_name": self.config.connector_name,
            "sensor_id": config.sensor_id,
            "sensor_name": config.sensor_name,
            "sensor_type": config.sensor_type,
            "attributes": config.attributes,
            "sampling_rate": config.sampling_rate_hz,
            "batch_size": config.batch_size,
            "bearer_token": self.config.bearer_token.clone().unwrap_or_default(),
        });

        let stream = SensorStream::new(socket, config);
        stream.join(join_params).await?;
        tracing::info!(sensor_id = stream.sensor_id(), "Registered sensor");
        Ok(stream)
    }

    /// Join a video/voice call channel in a room and return the session.
    ///
    /// This joins the room channel only; call
    /// [`CallSession::join_call`](crate::call::CallSession::join_call) to
    /// enter the call proper.
    pub async fn join_call(
        &self,
        room_id: impl Into<String>,
        user_id: impl Into<String>,
        user_info: Option<Value>,
    ) -> Result<CallSession> {
        let socket = self.connected_socket()?;
        let user_id = user_id.into();

        let join_params = json!({
            "user_id": user_id,
            "user_info": user_info.unwrap_or_else(|| json!({})),
        });

        let session = CallSession::new(socket, room_id, user_id);
        session.join_channel(join_params).await?;
        tracing::info!(room_id = session.room_id(), "Joined call channel");
        Ok(session)
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn connected_socket(&self) -> Result<PhoenixSocket> {
        let guard = self.socket.lock().unwrap();
        match guard.as_ref() {
            Some(socket) if socket.is_connected() => Ok(socket.clone()),
            _ => Err(SensoctoError::Disconnected),
        }
    }

    /// Join the connector presence channel. Failure is logged, not fatal.
    async fn join_connector_channel(&self, socket: &PhoenixSocket) {
        let topic = format!("{CONNECTOR_TOPIC_PREFIX}{}", self.config.connector_id);
        let join_params = json!({
            "connector_id": self.config.connector_id,
            "connector_name": self.config.connector_name,
            "connector_type": self.config.connector_type,
            "features": self.config.features,
            "bearer_token": self.config.bearer_token.clone().unwrap_or_default(),
        });

        socket.subscribe(&topic, join_params);
        match socket.join(&topic).await {
            Ok(_) => tracing::info!("Joined connector channel"),
            Err(e) => tracing::warn!(error = %e, "Failed to join connector channel"),
        }
    }
}
