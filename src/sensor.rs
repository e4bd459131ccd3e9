//! Sensor streams.
//!
//! A [`SensorStream`] is the per-sensor facade over the shared socket: it
//! joins `sensocto:sensor:<sensor_id>`, emits single measurements, and runs
//! the adaptive batching pipeline driven by server `backpressure_config`
//! advertisements.
//!
//! # Batching
//!
//! Measurements enqueued with [`SensorStream::add_to_batch`] accumulate in a
//! per-stream buffer. The buffer flushes when it reaches the active batch
//! size, or when the flush timer — armed lazily on the first enqueue after a
//! flush, and deliberately *not* reset by later enqueues — expires. A flush
//! of a single measurement goes out as a `measurement` frame; two or more go
//! out as an ordered `measurements_batch`. An empty buffer flushes to
//! nothing.
//!
//! The server steers both knobs per topic through `backpressure_config`
//! events; see [`BackpressureConfig`] for the defaults and the canonical
//! per-level mapping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use serde::Serialize;
use serde_json::{Value, json};
use tokio::task::JoinHandle;

use crate::config::SensorConfig;
use crate::constants::{SENSOR_TOPIC_PREFIX, defaults, events};
use crate::error::{Result, SensoctoError};
use crate::socket::phoenix::PhoenixSocket;
use crate::types::{BackpressureConfig, ConnectionState, Measurement};

// ---------------------------------------------------------------------------
// Attribute validation
// ---------------------------------------------------------------------------

/// Validate a measurement attribute ID.
///
/// IDs must start with a letter and contain only letters, digits,
/// underscores, or hyphens, up to 64 characters.
pub fn validate_attribute_id(attribute_id: &str) -> Result<()> {
    let reject = |reason: &str| {
        Err(SensoctoError::InvalidAttributeId {
            attribute_id: attribute_id.to_owned(),
            reason: reason.to_owned(),
        })
    };

    if attribute_id.is_empty() {
        return reject("attribute ID cannot be empty");
    }
    if attribute_id.len() > defaults::MAX_ATTRIBUTE_ID_LEN {
        return reject("attribute ID cannot exceed 64 characters");
    }

    let mut chars = attribute_id.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !first_ok || !rest_ok {
        return reject(
            "attribute ID must start with a letter and contain only \
             alphanumeric characters, underscores, or hyphens",
        );
    }

    Ok(())
}

/// Action applied to the sensor's attribute registry by
/// [`SensorStream::update_attribute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeAction {
    /// Register a new attribute.
    Add,
    /// Remove an attribute.
    Remove,
    /// Replace an attribute's metadata.
    Update,
}

// ---------------------------------------------------------------------------
// Shared stream state
// ---------------------------------------------------------------------------

type BackpressureObserver = Arc<dyn Fn(&BackpressureConfig) + Send + Sync>;

struct BatchState {
    buffer: Vec<Measurement>,
    /// Handle of the armed flush timer, if any. At most one per stream.
    timer: Option<JoinHandle<()>>,
    backpressure: BackpressureConfig,
}

struct StreamShared {
    topic: String,
    batch: StdMutex<BatchState>,
    observer: StdMutex<Option<BackpressureObserver>>,
}

// ---------------------------------------------------------------------------
// SensorStream
// ---------------------------------------------------------------------------

/// Stream for sending sensor measurements to the server.
///
/// Created by
/// [`SensoctoClient::register_sensor`](crate::client::SensoctoClient::register_sensor).
/// Closing the stream leaves the client intact; closing the client makes
/// every subsequent stream operation fail with
/// [`SensoctoError::Disconnected`].
pub struct SensorStream {
    socket: PhoenixSocket,
    topic: String,
    config: SensorConfig,
    joined: AtomicBool,
    shared: Arc<StreamShared>,
}

impl std::fmt::Debug for SensorStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SensorStream")
            .field("topic", &self.topic)
            .field("joined", &self.joined.load(Ordering::Relaxed))
            .finish()
    }
}

impl SensorStream {
    pub(crate) fn new(socket: PhoenixSocket, config: SensorConfig) -> Self {
        let topic = format!("{SENSOR_TOPIC_PREFIX}{}", config.sensor_id);
        let shared = Arc::new(StreamShared {
            topic: topic.clone(),
            batch: StdMutex::new(BatchState {
                buffer: Vec::new(),
                timer: None,
                backpressure: BackpressureConfig::default(),
            }),
            observer: StdMutex::new(None),
        });

        // Internal subscription: the server steers this stream's batching
        // through backpressure_config events on its topic.
        let handler_shared = Arc::clone(&shared);
        socket.on(&topic, events::BACKPRESSURE_CONFIG, move |payload| {
            Self::apply_backpressure(&handler_shared, payload);
        });

        Self {
            socket,
            topic,
            config,
            joined: AtomicBool::new(false),
            shared,
        }
    }

    /// The sensor ID.
    pub fn sensor_id(&self) -> &str {
        &self.config.sensor_id
    }

    /// The channel topic (`sensocto:sensor:<sensor_id>`).
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// The sensor configuration.
    pub fn config(&self) -> &SensorConfig {
        &self.config
    }

    /// Whether the stream is joined and the transport is up.
    pub fn is_active(&self) -> bool {
        self.joined.load(Ordering::SeqCst) && self.socket.is_connected()
    }

    /// The effective batching configuration for this stream.
    pub fn backpressure_config(&self) -> BackpressureConfig {
        self.shared.batch.lock().unwrap().backpressure.clone()
    }

    /// Install an observer invoked after each backpressure change for this
    /// topic. Replaces any previous observer.
    pub fn on_backpressure<F>(&self, handler: F)
    where
        F: Fn(&BackpressureConfig) + Send + Sync + 'static,
    {
        *self.shared.observer.lock().unwrap() = Some(Arc::new(handler));
    }

    // -----------------------------------------------------------------------
    // Channel lifecycle
    // -----------------------------------------------------------------------

    /// Join the sensor channel with the given parameters.
    ///
    /// Returns the server's join response. Fails with
    /// [`SensoctoError::ChannelJoin`] on rejection or
    /// [`SensoctoError::Timeout`] when no reply arrives.
    pub async fn join(&self, join_params: Value) -> Result<Value> {
        self.socket.subscribe(&self.topic, join_params);
        let response = self.socket.join(&self.topic).await?;
        self.joined.store(true, Ordering::SeqCst);
        Ok(response)
    }

    /// Flush any buffered measurements, then leave the sensor channel.
    /// Idempotent.
    pub async fn leave(&self) -> Result<()> {
        if !self.joined.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        if let Err(e) = self.flush_batch().await {
            tracing::warn!(topic = %self.topic, error = %e, "Final flush failed");
        }
        if let Some(timer) = self.shared.batch.lock().unwrap().timer.take() {
            timer.abort();
        }

        self.socket.leave(&self.topic).await
    }

    /// Close the stream. Alias for [`leave`](Self::leave).
    pub async fn close(&self) -> Result<()> {
        self.leave().await
    }

    // -----------------------------------------------------------------------
    // Measurements
    // -----------------------------------------------------------------------

    /// Send a single measurement immediately, bypassing the batch buffer.
    ///
    /// The timestamp defaults to the current time. Fails with
    /// [`SensoctoError::InvalidAttributeId`] before anything is sent, or
    /// [`SensoctoError::Disconnected`] when the stream is inactive.
    pub async fn send_measurement(
        &self,
        attribute_id: &str,
        payload: Value,
        timestamp: Option<i64>,
    ) -> Result<()> {
        self.ensure_active()?;
        validate_attribute_id(attribute_id)?;

        let measurement = Measurement::new(attribute_id, payload, timestamp);
        self.socket
            .push(&self.topic, events::MEASUREMENT, serde_json::to_value(&measurement)?)
            .await
    }

    /// Enqueue a measurement into the batch buffer.
    ///
    /// If the buffer reaches the active batch size the flush happens
    /// immediately; otherwise a flush timer is armed for the active batch
    /// window (if one is not already running).
    pub async fn add_to_batch(
        &self,
        attribute_id: &str,
        payload: Value,
        timestamp: Option<i64>,
    ) -> Result<()> {
        self.ensure_active()?;
        validate_attribute_id(attribute_id)?;

        let measurement = Measurement::new(attribute_id, payload, timestamp);
        let to_send = {
            let mut state = self.shared.batch.lock().unwrap();
            state.buffer.push(measurement);

            if state.buffer.len() >= state.backpressure.batch_size {
                Some(std::mem::take(&mut state.buffer))
            } else {
                if state.timer.is_none() {
                    let window = Duration::from_millis(state.backpressure.batch_window_ms);
                    state.timer = Some(tokio::spawn(Self::flush_after(
                        self.socket.clone(),
                        Arc::clone(&self.shared),
                        window,
                    )));
                }
                None
            }
        };

        match to_send {
            Some(batch) => Self::send_batch(&self.socket, &self.shared.topic, batch).await,
            None => Ok(()),
        }
    }

    /// Drain the batch buffer and send its contents.
    ///
    /// A single buffered measurement goes out as `measurement`; two or more
    /// as `measurements_batch` in enqueue order. An empty buffer sends
    /// nothing.
    pub async fn flush_batch(&self) -> Result<()> {
        let batch = {
            let mut state = self.shared.batch.lock().unwrap();
            std::mem::take(&mut state.buffer)
        };
        Self::send_batch(&self.socket, &self.shared.topic, batch).await
    }

    /// Update the sensor's attribute registry.
    pub async fn update_attribute(
        &self,
        action: AttributeAction,
        attribute_id: &str,
        metadata: Option<Value>,
    ) -> Result<()> {
        self.ensure_active()?;
        validate_attribute_id(attribute_id)?;

        let payload = json!({
            "action": action,
            "attribute_id": attribute_id,
            "metadata": metadata.unwrap_or_else(|| json!({})),
        });
        self.socket
            .push(&self.topic, events::UPDATE_ATTRIBUTES, payload)
            .await
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn ensure_active(&self) -> Result<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(SensoctoError::Disconnected)
        }
    }

    fn apply_backpressure(shared: &Arc<StreamShared>, payload: &Value) {
        let config = BackpressureConfig::from_payload(payload);
        tracing::debug!(
            topic = %shared.topic,
            level = %config.attention_level,
            window_ms = config.batch_window_ms,
            batch_size = config.batch_size,
            "Backpressure config updated"
        );

        // The new config takes effect at the next flush; an armed timer is
        // left to run out its original window.
        shared.batch.lock().unwrap().backpressure = config.clone();

        let observer = shared.observer.lock().unwrap().clone();
        if let Some(observer) = observer {
            observer(&config);
        }
    }

    /// Timer body: wait out the batch window, then flush whatever is
    /// buffered. If the transport is down when the window expires, keep
    /// waiting — buffered measurements are delivered after the rejoin.
    async fn flush_after(socket: PhoenixSocket, shared: Arc<StreamShared>, window: Duration) {
        loop {
            tokio::time::sleep(window).await;
            match socket.state() {
                ConnectionState::Connected => break,
                ConnectionState::Connecting | ConnectionState::Reconnecting => {}
                ConnectionState::Disconnected | ConnectionState::Error => {
                    shared.batch.lock().unwrap().timer = None;
                    return;
                }
            }
        }

        let batch = {
            let mut state = shared.batch.lock().unwrap();
            state.timer = None;
            std::mem::take(&mut state.buffer)
        };
        if batch.is_empty() {
            return;
        }
        if let Err(e) = Self::send_batch(&socket, &shared.topic, batch).await {
            tracing::warn!(topic = %shared.topic, error = %e, "Timed batch flush failed");
        }
    }

    async fn send_batch(
        socket: &PhoenixSocket,
        topic: &str,
        batch: Vec<Measurement>,
    ) -> Result<()> {
        match batch.len() {
            0 => Ok(()),
            1 => {
                socket
                    .push(topic, events::MEASUREMENT, serde_json::to_value(&batch[0])?)
                    .await
            }
            count => {
                tracing::debug!(topic, count, "Flushing measurement batch");
                socket
                    .push(topic, events::MEASUREMENTS_BATCH, serde_json::to_value(&batch)?)
                    .await
            }
        }
    }
}

impl Drop for SensorStream {
    fn drop(&mut self) {
        if let Some(timer) = self.shared.batch.lock().unwrap().timer.take() {
            timer.abort();
        }
    }
}
