//! Integration tests for the channel-multiplexed socket substrate, driven
//! against an in-process mock Phoenix server (`tests/common`).
//!
//! # What is tested
//!
//! - **Frame codec** — round-trip law and default-filling decode
//! - **URL derivation** — `https://host:port` ⇒ `wss://host:port/socket/websocket`
//! - **Joins** — payload shape, ref allocation, server-rejected joins
//! - **Heartbeats** — periodic `heartbeat` frames on the `phoenix` topic
//! - **Reply correlation** — request timeouts when the server stays silent
//! - **Leave** — idempotence
//! - **Reconnect** — channel rejoin with freshly allocated refs
//! - **Shutdown** — operations fail with `Disconnected` after close

mod common;

use std::time::Duration;

use common::MockServer;
use sensocto_rs::socket::frame::Frame;
use sensocto_rs::{
    ConnectionState, SensoctoClient, SensoctoConfig, SensoctoError, SensorConfig,
};
use serde_json::json;

/// A config pointed at the mock server, tightened for test latencies.
fn test_config(server: &MockServer) -> SensoctoConfig {
    let mut config = SensoctoConfig::new(server.url()).with_auto_join_connector(false);
    config.reconnect_delay_ms = 100;
    config.request_timeout_ms = 2_000;
    config
}

// ---------------------------------------------------------------------------
// Codec & configuration
// ---------------------------------------------------------------------------

#[test]
fn frame_codec_round_trips() {
    let frame = Frame::new(
        "sensocto:sensor:s1",
        "measurement",
        json!({ "attribute_id": "bpm", "payload": 72, "timestamp": 1700000000000_i64 }),
        Some("42".to_owned()),
    );
    let decoded = Frame::decode(&frame.encode().unwrap()).unwrap();
    assert_eq!(decoded, frame);
}

#[test]
fn frame_decode_fills_absent_keys() {
    let frame = Frame::decode(r#"{"event":"phx_close"}"#).unwrap();
    assert_eq!(frame.topic, "");
    assert_eq!(frame.event, "phx_close");
    assert!(frame.payload.is_null());
    assert!(frame.reference.is_none());

    assert!(Frame::decode("not json at all").is_err());
}

#[test]
fn websocket_url_derivation() {
    let https = SensoctoConfig::new("https://host.example:8443");
    assert_eq!(
        https.websocket_url().unwrap(),
        "wss://host.example:8443/socket/websocket"
    );

    let http = SensoctoConfig::new("http://host.example");
    assert_eq!(http.websocket_url().unwrap(), "ws://host.example/socket/websocket");
}

#[test]
fn config_validation_rejects_bad_urls() {
    assert!(matches!(
        SensoctoConfig::new("").validate(),
        Err(SensoctoError::InvalidConfig(_))
    ));
    assert!(matches!(
        SensoctoConfig::new("ftp://host.example").validate(),
        Err(SensoctoError::InvalidConfig(_))
    ));

    let mut config = SensoctoConfig::new("https://host.example");
    config.heartbeat_interval_seconds = 0;
    assert!(matches!(config.validate(), Err(SensoctoError::InvalidConfig(_))));
}

// ---------------------------------------------------------------------------
// Joins & refs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn register_sensor_sends_join_with_full_payload() {
    let mut server = MockServer::start().await;
    let client = SensoctoClient::from_config(test_config(&server));
    client.connect().await.unwrap();

    let stream = client
        .register_sensor(
            SensorConfig::new("Chest Strap")
                .with_sensor_id("s1")
                .with_sensor_type("heart_rate")
                .with_attributes(vec!["bpm".into()]),
        )
        .await
        .unwrap();

    let join = server.next_frame().await;
    assert_eq!(join["event"], "phx_join");
    assert_eq!(join["topic"], "sensocto:sensor:s1");
    assert_eq!(join["ref"], "1");
    assert_eq!(join["payload"]["sensor_id"], "s1");
    assert_eq!(join["payload"]["sensor_name"], "Chest Strap");
    assert_eq!(join["payload"]["sensor_type"], "heart_rate");
    assert_eq!(join["payload"]["attributes"], json!(["bpm"]));
    assert_eq!(join["payload"]["sampling_rate"], 10);
    assert_eq!(join["payload"]["batch_size"], 5);
    assert!(join["payload"]["connector_id"].is_string());
    assert!(join["payload"]["bearer_token"].is_string());

    assert!(stream.is_active());
    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn rejected_join_surfaces_topic_and_reason() {
    let mut server = MockServer::with_responder(|frame| {
        if frame["event"] == "phx_join" && frame["topic"] == "sensocto:sensor:s1" {
            Some(json!({ "status": "error", "response": { "reason": "unauthorized" } }))
        } else {
            common::default_responder(frame)
        }
    })
    .await;

    let client = SensoctoClient::from_config(test_config(&server));
    client.connect().await.unwrap();

    let err = client
        .register_sensor(SensorConfig::new("Denied").with_sensor_id("s1"))
        .await
        .unwrap_err();
    match err {
        SensoctoError::ChannelJoin { topic, reason } => {
            assert_eq!(topic, "sensocto:sensor:s1");
            assert!(reason.contains("unauthorized"), "reason was: {reason}");
        }
        other => panic!("expected ChannelJoin, got {other:?}"),
    }

    // The join frame went out regardless.
    let join = server.next_frame().await;
    assert_eq!(join["event"], "phx_join");
    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn refs_increase_monotonically_within_a_connection() {
    let mut server = MockServer::start().await;
    let client = SensoctoClient::from_config(test_config(&server));
    client.connect().await.unwrap();

    client
        .register_sensor(SensorConfig::new("A").with_sensor_id("a"))
        .await
        .unwrap();
    client
        .register_sensor(SensorConfig::new("B").with_sensor_id("b"))
        .await
        .unwrap();

    assert_eq!(server.next_frame().await["ref"], "1");
    assert_eq!(server.next_frame().await["ref"], "2");
    client.disconnect().await.unwrap();
}

// ---------------------------------------------------------------------------
// Heartbeats & timeouts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn heartbeat_goes_out_on_the_phoenix_topic() {
    let mut server = MockServer::start().await;
    let mut config = test_config(&server);
    config.heartbeat_interval_seconds = 1;

    let client = SensoctoClient::from_config(config);
    client.connect().await.unwrap();

    let heartbeat = server.next_frame_within(Duration::from_secs(3)).await;
    assert_eq!(heartbeat["topic"], "phoenix");
    assert_eq!(heartbeat["event"], "heartbeat");
    assert_eq!(heartbeat["payload"], json!({}));
    assert!(heartbeat["ref"].is_string());

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn silent_server_times_out_the_request() {
    let server = MockServer::with_responder(|_| None).await;
    let mut config = test_config(&server);
    config.request_timeout_ms = 300;

    let client = SensoctoClient::from_config(config);
    client.connect().await.unwrap();

    let err = client
        .register_sensor(SensorConfig::new("Silent").with_sensor_id("s1"))
        .await
        .unwrap_err();
    assert!(matches!(err, SensoctoError::Timeout { timeout_ms: 300 }));

    client.disconnect().await.unwrap();
}

// ---------------------------------------------------------------------------
// Leave
// ---------------------------------------------------------------------------

#[tokio::test]
async fn leave_is_idempotent() {
    let mut server = MockServer::start().await;
    let client = SensoctoClient::from_config(test_config(&server));
    client.connect().await.unwrap();

    let stream = client
        .register_sensor(SensorConfig::new("Once").with_sensor_id("s1"))
        .await
        .unwrap();
    let join = server.next_frame().await;
    assert_eq!(join["event"], "phx_join");

    stream.leave().await.unwrap();
    stream.leave().await.unwrap();

    let leave = server.next_frame().await;
    assert_eq!(leave["event"], "phx_leave");
    assert_eq!(leave["topic"], "sensocto:sensor:s1");
    server.expect_no_frame(Duration::from_millis(300)).await;

    client.disconnect().await.unwrap();
}

// ---------------------------------------------------------------------------
// Reconnect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconnect_rejoins_channels_with_fresh_refs() {
    let mut server = MockServer::start().await;
    let client = SensoctoClient::from_config(test_config(&server));
    client.connect().await.unwrap();

    client
        .register_sensor(SensorConfig::new("A").with_sensor_id("a"))
        .await
        .unwrap();
    client
        .register_sensor(SensorConfig::new("B").with_sensor_id("b"))
        .await
        .unwrap();
    // Drain the original join frames.
    assert_eq!(server.next_frame().await["event"], "phx_join");
    assert_eq!(server.next_frame().await["event"], "phx_join");

    server.drop_connection();

    // Both channels rejoin on the fresh connection, with refs reset to 1.
    let first = server.next_frame_within(Duration::from_secs(5)).await;
    let second = server.next_frame_within(Duration::from_secs(5)).await;
    for frame in [&first, &second] {
        assert_eq!(frame["event"], "phx_join");
    }

    let mut topics = vec![
        first["topic"].as_str().unwrap().to_owned(),
        second["topic"].as_str().unwrap().to_owned(),
    ];
    topics.sort();
    assert_eq!(topics, vec!["sensocto:sensor:a", "sensocto:sensor:b"]);

    let mut refs = vec![
        first["ref"].as_str().unwrap().to_owned(),
        second["ref"].as_str().unwrap().to_owned(),
    ];
    refs.sort();
    assert_eq!(refs, vec!["1", "2"]);

    assert_eq!(client.connection_state(), ConnectionState::Connected);
    client.disconnect().await.unwrap();
}

// ---------------------------------------------------------------------------
// Shutdown & connect failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn operations_fail_disconnected_after_client_close() {
    let server = MockServer::start().await;
    let client = SensoctoClient::from_config(test_config(&server));
    client.connect().await.unwrap();

    let stream = client
        .register_sensor(SensorConfig::new("Doomed").with_sensor_id("s1"))
        .await
        .unwrap();

    client.disconnect().await.unwrap();
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);

    let err = stream
        .send_measurement("bpm", json!(72), None)
        .await
        .unwrap_err();
    assert!(matches!(err, SensoctoError::Disconnected));
}

#[tokio::test]
async fn failed_handshake_reports_error_state() {
    // Bind a port, then free it so the connect is refused.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let mut config = SensoctoConfig::new(format!("http://{addr}"));
    config.auto_join_connector = false;
    config.connection_timeout_seconds = 2;

    let client = SensoctoClient::from_config(config);
    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, SensoctoError::Connect { .. }));
    assert_eq!(client.connection_state(), ConnectionState::Error);
}
