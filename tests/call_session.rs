//! Integration tests for call sessions: channel/call lifecycle, typed event
//! dispatch, media pass-through, and server-rejected operations.

mod common;

use std::time::Duration;

use common::MockServer;
use sensocto_rs::{
    CallEvent, CallQuality, CallSession, SensoctoClient, SensoctoConfig, SensoctoError,
};
use serde_json::{Value, json};
use tokio::sync::mpsc;

const TOPIC: &str = "call:room1";

fn call_responder(frame: &Value) -> Option<Value> {
    match frame["event"].as_str().unwrap_or_default() {
        "phx_join" => Some(json!({
            "status": "ok",
            "response": { "ice_servers": [ { "urls": ["stun:example"] } ] },
        })),
        "join_call" => Some(json!({
            "status": "ok",
            "response": { "endpoint_id": "ep-7", "participants": {} },
        })),
        "get_participants" => Some(json!({
            "status": "ok",
            "response": { "participants": {
                "u2": { "user_id": "u2", "endpoint_id": "ep-2", "audio_enabled": true },
                "u3": { "endpoint_id": "ep-3" },
            } },
        })),
        _ => common::default_responder(frame),
    }
}

async fn setup() -> (MockServer, SensoctoClient, CallSession) {
    let mut server = MockServer::with_responder(call_responder).await;
    let mut config = SensoctoConfig::new(server.url()).with_auto_join_connector(false);
    config.request_timeout_ms = 2_000;

    let client = SensoctoClient::from_config(config);
    client.connect().await.unwrap();
    let session = client.join_call("room1", "u1", None).await.unwrap();

    let join = server.next_frame().await;
    assert_eq!(join["event"], "phx_join");
    assert_eq!(join["topic"], TOPIC);
    assert_eq!(join["payload"]["user_id"], "u1");

    (server, client, session)
}

/// Collect dispatched call events on a channel for assertions.
fn event_channel(session: &CallSession) -> mpsc::UnboundedReceiver<CallEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    session.on_event(move |event| {
        let _ = tx.send(event.clone());
    });
    rx
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<CallEvent>) -> CallEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a call event")
        .expect("event channel closed")
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn call_lifecycle_records_ice_endpoint_and_survives_call_ended() {
    let (mut server, client, session) = setup().await;
    let mut events = event_channel(&session);

    assert!(session.is_joined());
    assert!(!session.in_call());
    let ice = session.ice_servers();
    assert_eq!(ice.len(), 1);
    assert_eq!(ice[0].urls, vec!["stun:example"]);

    session.join_call().await.unwrap();
    assert!(session.in_call());
    assert_eq!(session.endpoint_id().as_deref(), Some("ep-7"));
    assert_eq!(server.next_frame().await["event"], "join_call");

    // Server terminates the call: forced InCall → JoinedChannel.
    server.push(TOPIC, "call_ended", json!({}));
    assert!(matches!(next_event(&mut events).await, CallEvent::CallEnded));
    assert!(!session.in_call());
    assert!(session.endpoint_id().is_none());
    assert!(session.is_joined());

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn leave_channel_while_in_call_leaves_the_call_first() {
    let (mut server, client, session) = setup().await;

    session.join_call().await.unwrap();
    assert_eq!(server.next_frame().await["event"], "join_call");

    session.leave_channel().await.unwrap();
    assert_eq!(server.next_frame().await["event"], "leave_call");
    assert_eq!(server.next_frame().await["event"], "phx_leave");
    assert!(!session.is_joined());

    // Idempotent.
    session.close().await.unwrap();
    server.expect_no_frame(Duration::from_millis(300)).await;

    client.disconnect().await.unwrap();
}

// ---------------------------------------------------------------------------
// In-call operations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn media_events_require_in_call_and_wrap_the_data() {
    let (mut server, client, session) = setup().await;

    let err = session
        .send_media_event(json!({ "type": "offer" }))
        .await
        .unwrap_err();
    assert!(matches!(err, SensoctoError::InvalidState(_)));

    session.join_call().await.unwrap();
    assert_eq!(server.next_frame().await["event"], "join_call");

    session
        .send_media_event(json!({ "type": "offer", "sdp": "v=0" }))
        .await
        .unwrap();

    let frame = server.next_frame().await;
    assert_eq!(frame["event"], "media_event");
    assert_eq!(frame["payload"]["data"]["type"], "offer");
    assert_eq!(frame["payload"]["data"]["sdp"], "v=0");

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn toggles_and_quality_round_trip() {
    let (mut server, client, session) = setup().await;
    session.join_call().await.unwrap();
    assert_eq!(server.next_frame().await["event"], "join_call");

    session.toggle_audio(false).await.unwrap();
    let frame = server.next_frame().await;
    assert_eq!(frame["event"], "toggle_audio");
    assert_eq!(frame["payload"]["enabled"], false);

    session.set_quality(CallQuality::Low).await.unwrap();
    let frame = server.next_frame().await;
    assert_eq!(frame["event"], "set_quality");
    assert_eq!(frame["payload"]["quality"], "low");

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn rejected_call_operation_surfaces_the_reason() {
    let mut server = MockServer::with_responder(|frame| {
        if frame["event"] == "toggle_audio" {
            Some(json!({ "status": "error", "response": { "reason": "muted by host" } }))
        } else {
            call_responder(frame)
        }
    })
    .await;
    let mut config = SensoctoConfig::new(server.url()).with_auto_join_connector(false);
    config.request_timeout_ms = 2_000;

    let client = SensoctoClient::from_config(config);
    client.connect().await.unwrap();
    let session = client.join_call("room1", "u1", None).await.unwrap();
    session.join_call().await.unwrap();
    assert_eq!(server.next_frame().await["event"], "phx_join");
    assert_eq!(server.next_frame().await["event"], "join_call");

    let err = session.toggle_audio(true).await.unwrap_err();
    match err {
        SensoctoError::Call { operation, reason } => {
            assert_eq!(operation, "toggle_audio");
            assert!(reason.contains("muted by host"));
        }
        other => panic!("expected Call error, got {other:?}"),
    }

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn get_participants_parses_the_roster() {
    let (mut server, client, session) = setup().await;
    session.join_call().await.unwrap();
    assert_eq!(server.next_frame().await["event"], "join_call");

    let participants = session.get_participants().await.unwrap();
    assert_eq!(participants.len(), 2);

    let u2 = &participants["u2"];
    assert_eq!(u2.user_id, "u2");
    assert_eq!(u2.endpoint_id, "ep-2");
    assert!(u2.audio_enabled);
    assert!(!u2.video_enabled);

    // Missing user_id falls back to the roster key.
    assert_eq!(participants["u3"].user_id, "u3");

    client.disconnect().await.unwrap();
}

// ---------------------------------------------------------------------------
// Typed event dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn participant_events_arrive_typed() {
    let (server, client, session) = setup().await;
    let mut events = event_channel(&session);

    server.push(
        TOPIC,
        "participant_joined",
        json!({ "user_id": "u2", "endpoint_id": "ep-2", "audio_enabled": true }),
    );
    match next_event(&mut events).await {
        CallEvent::ParticipantJoined { participant } => {
            assert_eq!(participant.user_id, "u2");
            assert_eq!(participant.endpoint_id, "ep-2");
            assert!(participant.audio_enabled);
        }
        other => panic!("expected ParticipantJoined, got {other:?}"),
    }

    server.push(TOPIC, "participant_left", json!({ "user_id": "u2", "crashed": true }));
    match next_event(&mut events).await {
        CallEvent::ParticipantLeft { user_id, crashed } => {
            assert_eq!(user_id, "u2");
            assert!(crashed);
        }
        other => panic!("expected ParticipantLeft, got {other:?}"),
    }

    server.push(
        TOPIC,
        "participant_video_changed",
        json!({ "user_id": "u2", "video_enabled": true }),
    );
    match next_event(&mut events).await {
        CallEvent::ParticipantVideoChanged { user_id, enabled } => {
            assert_eq!(user_id, "u2");
            assert!(enabled);
        }
        other => panic!("expected ParticipantVideoChanged, got {other:?}"),
    }

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn observer_panics_do_not_break_dispatch() {
    let (server, client, session) = setup().await;

    session.on_event(|_| panic!("misbehaving observer"));
    let mut events = event_channel(&session);

    server.push(TOPIC, "quality_changed", json!({ "quality": "medium" }));
    match next_event(&mut events).await {
        CallEvent::QualityChanged { quality } => assert_eq!(quality, "medium"),
        other => panic!("expected QualityChanged, got {other:?}"),
    }

    client.disconnect().await.unwrap();
}
