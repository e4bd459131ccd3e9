//! # sensocto-rs
//!
//! A Rust client library for the Sensocto sensor platform.
//!
//! Streams timestamped sensor measurements over a channel-multiplexed
//! Phoenix WebSocket, with server-driven adaptive batching, automatic
//! reconnection with channel rejoin, and room-scoped call signaling.
//!
//! ## Quick Start
//!
//! ```no_run
//! use sensocto_rs::{SensoctoClient, SensorConfig};
//!
//! #[tokio::main]
//! async fn main() -> sensocto_rs::Result<()> {
//!     let client = SensoctoClient::new("https://your-server.com")
//!         .with_bearer_token("your-token");
//!     client.connect().await?;
//!
//!     let sensor = client
//!         .register_sensor(SensorConfig::new("My Sensor").with_sensor_type("temperature"))
//!         .await?;
//!     sensor
//!         .send_measurement("celsius", serde_json::json!({ "value": 23.5 }), None)
//!         .await?;
//!
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod call;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod sensor;
pub mod socket;
pub mod types;

/// Re-export the main client type at crate root for convenience.
pub use client::SensoctoClient;
/// Re-export the error type and Result alias.
pub use error::{Result, SensoctoError};

pub use call::CallSession;
pub use config::{SensoctoConfig, SensorConfig};
pub use sensor::{AttributeAction, SensorStream, validate_attribute_id};
pub use types::{
    AttentionLevel, BackpressureConfig, CallEvent, CallParticipant, CallQuality, ConnectionState,
    IceServer, Measurement, Room, RoomRole, User,
};
