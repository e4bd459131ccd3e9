//! Configuration types for the Sensocto client.
//!
//! [`SensoctoConfig`] describes a connector-level connection; [`SensorConfig`]
//! describes one logical sensor registered on that connection. Both validate
//! eagerly: [`SensoctoConfig::validate`] runs before any socket is opened and
//! fails with [`SensoctoError::InvalidConfig`].

use url::Url;

use crate::constants::{WS_SOCKET_PATH, defaults};
use crate::error::{Result, SensoctoError};

// ---------------------------------------------------------------------------
// SensoctoConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`SensoctoClient`](crate::client::SensoctoClient).
///
/// # Example
///
/// ```
/// use sensocto_rs::SensoctoConfig;
///
/// let config = SensoctoConfig::new("https://host.example:8443")
///     .with_connector_name("Lab Gateway")
///     .with_bearer_token("secret");
/// assert_eq!(
///     config.websocket_url().unwrap(),
///     "wss://host.example:8443/socket/websocket"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct SensoctoConfig {
    /// The Sensocto server URL. Must use the `http` or `https` scheme.
    pub server_url: String,
    /// Unique identifier for this connector. Auto-generated (UUID v4) if not
    /// provided.
    pub connector_id: String,
    /// Human-readable name for this connector.
    pub connector_name: String,
    /// Type of connector (e.g. `"rust"`).
    pub connector_type: String,
    /// Bearer token for authentication.
    pub bearer_token: Option<String>,
    /// Automatically join the connector presence channel on connect.
    pub auto_join_connector: bool,
    /// Heartbeat interval in seconds. Must be ≥ 1.
    pub heartbeat_interval_seconds: u64,
    /// WebSocket handshake timeout in seconds.
    pub connection_timeout_seconds: u64,
    /// Whether to auto-reconnect on transport loss.
    pub auto_reconnect: bool,
    /// Maximum consecutive reconnection attempts before giving up.
    pub max_reconnect_attempts: u32,
    /// Delay between reconnection attempts, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Default request/reply deadline, in milliseconds.
    pub request_timeout_ms: u64,
    /// Features supported by this connector, advertised at join time.
    pub features: Vec<String>,
}

impl SensoctoConfig {
    /// Create a configuration for the given server URL with all other fields
    /// at their defaults.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            connector_id: uuid::Uuid::new_v4().to_string(),
            connector_name: "Rust Connector".to_owned(),
            connector_type: "rust".to_owned(),
            bearer_token: None,
            auto_join_connector: true,
            heartbeat_interval_seconds: defaults::HEARTBEAT_INTERVAL_SECS,
            connection_timeout_seconds: defaults::CONNECTION_TIMEOUT_SECS,
            auto_reconnect: true,
            max_reconnect_attempts: defaults::MAX_RECONNECT_ATTEMPTS,
            reconnect_delay_ms: defaults::RECONNECT_DELAY_MS,
            request_timeout_ms: defaults::REQUEST_TIMEOUT_MS,
            features: Vec::new(),
        }
    }

    /// Set the connector ID.
    pub fn with_connector_id(mut self, connector_id: impl Into<String>) -> Self {
        self.connector_id = connector_id.into();
        self
    }

    /// Set the connector name.
    pub fn with_connector_name(mut self, connector_name: impl Into<String>) -> Self {
        self.connector_name = connector_name.into();
        self
    }

    /// Set the connector type.
    pub fn with_connector_type(mut self, connector_type: impl Into<String>) -> Self {
        self.connector_type = connector_type.into();
        self
    }

    /// Set the bearer token.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Enable or disable auto-joining the connector channel. Default: true.
    pub fn with_auto_join_connector(mut self, enable: bool) -> Self {
        self.auto_join_connector = enable;
        self
    }

    /// Set the heartbeat interval in seconds. Default: 30.
    pub fn with_heartbeat_interval(mut self, seconds: u64) -> Self {
        self.heartbeat_interval_seconds = seconds;
        self
    }

    /// Enable or disable auto-reconnect. Default: true.
    pub fn with_auto_reconnect(mut self, enable: bool) -> Self {
        self.auto_reconnect = enable;
        self
    }

    /// Set the maximum reconnection attempts. Default: 5.
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the advertised feature list.
    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.features = features;
        self
    }

    /// Validate the configuration.
    ///
    /// Checks the server URL scheme and host and the heartbeat interval
    /// lower bound.
    pub fn validate(&self) -> Result<()> {
        if self.server_url.is_empty() {
            return Err(SensoctoError::InvalidConfig("Server URL is required".into()));
        }

        let parsed = Url::parse(&self.server_url)
            .map_err(|e| SensoctoError::InvalidConfig(format!("Invalid server URL: {e}")))?;

        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(SensoctoError::InvalidConfig(
                "Server URL must use http or https scheme".into(),
            ));
        }

        if parsed.host_str().is_none() {
            return Err(SensoctoError::InvalidConfig("Server URL must have a host".into()));
        }

        if self.heartbeat_interval_seconds < defaults::MIN_HEARTBEAT_INTERVAL_SECS {
            return Err(SensoctoError::InvalidConfig(
                "Heartbeat interval must be at least 1 second".into(),
            ));
        }

        Ok(())
    }

    /// Derive the WebSocket endpoint from the server URL.
    ///
    /// `http` maps to `ws`, `https` to `wss`; host and optional port are
    /// preserved and [`WS_SOCKET_PATH`] is appended.
    pub fn websocket_url(&self) -> Result<String> {
        let parsed = Url::parse(&self.server_url)?;

        let scheme = match parsed.scheme() {
            "https" => "wss",
            _ => "ws",
        };
        let host = parsed
            .host_str()
            .ok_or_else(|| SensoctoError::InvalidConfig("Server URL must have a host".into()))?;
        let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();

        Ok(format!("{scheme}://{host}{port}{WS_SOCKET_PATH}"))
    }
}

// ---------------------------------------------------------------------------
// SensorConfig
// ---------------------------------------------------------------------------

/// Configuration for a single registered sensor.
///
/// # Example
///
/// ```
/// use sensocto_rs::SensorConfig;
///
/// let config = SensorConfig::new("Chest Strap")
///     .with_sensor_type("heart_rate")
///     .with_attributes(vec!["bpm".into(), "rr_interval".into()])
///     .with_sampling_rate(25);
/// ```
#[derive(Debug, Clone)]
pub struct SensorConfig {
    /// Human-readable name for the sensor.
    pub sensor_name: String,
    /// Unique sensor identifier. Auto-generated (UUID v4) if not provided.
    pub sensor_id: String,
    /// Type of sensor (e.g. `"temperature"`, `"heart_rate"`).
    pub sensor_type: String,
    /// Attributes this sensor will report.
    pub attributes: Vec<String>,
    /// Sampling rate in Hz, advertised at join time.
    pub sampling_rate_hz: u32,
    /// Preferred batch size, advertised at join time.
    pub batch_size: u32,
}

impl SensorConfig {
    /// Create a sensor configuration with the given name and all other
    /// fields at their defaults.
    pub fn new(sensor_name: impl Into<String>) -> Self {
        Self {
            sensor_name: sensor_name.into(),
            sensor_id: uuid::Uuid::new_v4().to_string(),
            sensor_type: "generic".to_owned(),
            attributes: Vec::new(),
            sampling_rate_hz: 10,
            batch_size: 5,
        }
    }

    /// Set the sensor ID.
    pub fn with_sensor_id(mut self, sensor_id: impl Into<String>) -> Self {
        self.sensor_id = sensor_id.into();
        self
    }

    /// Set the sensor type. Default: `"generic"`.
    pub fn with_sensor_type(mut self, sensor_type: impl Into<String>) -> Self {
        self.sensor_type = sensor_type.into();
        self
    }

    /// Set the reported attribute list.
    pub fn with_attributes(mut self, attributes: Vec<String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set the sampling rate in Hz. Default: 10.
    pub fn with_sampling_rate(mut self, hz: u32) -> Self {
        self.sampling_rate_hz = hz;
        self
    }

    /// Set the preferred batch size. Default: 5.
    pub fn with_batch_size(mut self, size: u32) -> Self {
        self.batch_size = size;
        self
    }
}
