//! Push channel integration tests
//!
//! Drive the channel through scripted connections: reconnect bounds,
//! clean closes, frame ordering and outbound frames.

use std::sync::Arc;
use std::time::Duration;

use merge_sync::channel::StatusPayload;
use merge_sync::testing::{ConnectOutcome, MockTransport};
use merge_sync::{ChannelState, MessageKind, PushChannel, PushFrame, SyncConfig, SyncError};
use parking_lot::Mutex;
use serde_json::json;

fn config() -> SyncConfig {
    SyncConfig::new("https://merge.example.com")
        .with_reconnect_delay(Duration::from_millis(5))
        .with_max_reconnect_attempts(3)
}

async fn settle<F: Fn() -> bool>(check: F) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

fn status(progress: f64) -> PushFrame {
    PushFrame::new(
        MessageKind::Status,
        json!({"status": "running", "progress": progress}),
    )
}

#[tokio::test]
async fn test_reconnect_gives_up_after_bound() {
    let transport = MockTransport::with_script(vec![ConnectOutcome::Accept]);
    let channel = PushChannel::for_session(&config(), "merge-42", Arc::new(transport.clone()));

    channel.connect();
    channel.wait_for_state(ChannelState::Connected).await;

    let mut states = channel.state_changes();
    transport.peer(0).unwrap().close_abnormal("network reset");

    // First connect plus three refused retries
    settle(|| transport.attempt_count() == 4 && channel.state() == ChannelState::Disconnected)
        .await;
    assert!(states.has_changed().unwrap());
    assert_eq!(channel.reconnect_attempts(), 3);

    let error = channel.last_error().unwrap();
    assert!(error.contains("exhausted"), "unexpected error: {}", error);

    // No further attempts once exhausted
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(transport.attempt_count(), 4);
    assert!(transport
        .attempts()
        .iter()
        .all(|url| url == "wss://merge.example.com/ws/merge-42"));
}

#[tokio::test]
async fn test_initial_connect_failures_count_against_bound() {
    let transport = MockTransport::refusing();
    let channel = PushChannel::for_session(
        &config().with_max_reconnect_attempts(1),
        "s1",
        Arc::new(transport.clone()),
    );

    channel.connect();
    settle(|| transport.attempt_count() == 2 && channel.state() == ChannelState::Disconnected)
        .await;
    assert!(channel.last_error().unwrap().contains("exhausted"));
}

#[tokio::test]
async fn test_clean_close_does_not_reconnect() {
    let transport = MockTransport::accepting();
    let channel = PushChannel::for_session(&config(), "s1", Arc::new(transport.clone()));

    channel.connect();
    channel.wait_for_state(ChannelState::Connected).await;
    transport.peer(0).unwrap().close_normal();

    settle(|| channel.state() == ChannelState::Disconnected).await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(transport.attempt_count(), 1);
    assert_eq!(channel.reconnect_attempts(), 0);

    // A later connect starts a fresh cycle
    assert!(channel.connect());
    channel.wait_for_state(ChannelState::Connected).await;
    assert_eq!(transport.peer_count(), 2);
    channel.disconnect().await;
}

#[tokio::test]
async fn test_malformed_frames_dropped_in_order_delivery() {
    let transport = MockTransport::accepting();
    let channel = PushChannel::for_session(&config(), "s1", Arc::new(transport.clone()));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    channel.on(MessageKind::Status, move |frame| {
        if let Ok(status) = frame.payload_as::<StatusPayload>() {
            sink.lock().push(status.progress);
        }
    });

    channel.connect();
    channel.wait_for_state(ChannelState::Connected).await;
    let peer = transport.peer(0).unwrap();

    peer.push_frame(&status(0.1));
    peer.push_text("{not json");
    peer.push_text(r#"{"payload": {"status": "running"}}"#);
    peer.push_frame(&status(0.2));
    peer.push_frame(&status(0.3));

    settle(|| seen.lock().len() == 3).await;
    assert_eq!(*seen.lock(), vec![0.1, 0.2, 0.3]);
    assert_eq!(channel.state(), ChannelState::Connected);
    channel.disconnect().await;
}

#[tokio::test]
async fn test_handlers_run_in_registration_order() {
    let transport = MockTransport::accepting();
    let channel = PushChannel::for_session(&config(), "s1", Arc::new(transport.clone()));

    let calls = Arc::new(Mutex::new(Vec::new()));
    let first = calls.clone();
    let second = calls.clone();
    let removed = calls.clone();
    channel.on(MessageKind::Question, move |_| first.lock().push("first"));
    let id = channel.on(MessageKind::Question, move |_| removed.lock().push("removed"));
    channel.on("QUESTION", move |_| second.lock().push("second"));
    channel.off(MessageKind::Question, id);

    channel.connect();
    channel.wait_for_state(ChannelState::Connected).await;
    transport.peer(0).unwrap().push_frame(&PushFrame::new(
        MessageKind::Question,
        json!({"question_id": "q1", "text": "Keep staging value?"}),
    ));

    settle(|| calls.lock().len() == 2).await;
    assert_eq!(*calls.lock(), vec!["first", "second"]);
    channel.disconnect().await;
}

#[tokio::test]
async fn test_answer_frame_written_to_socket() {
    let transport = MockTransport::accepting();
    let channel = PushChannel::for_session(&config(), "s1", Arc::new(transport.clone()));

    assert!(matches!(
        channel.send_answer("q1", json!("yes")),
        Err(SyncError::NotConnected)
    ));

    channel.connect();
    channel.wait_for_state(ChannelState::Connected).await;
    channel.send_answer("q1", json!({"choice": "staging"})).unwrap();
    channel.pause().unwrap();

    let peer = transport.peer(0).unwrap();
    settle(|| peer.sent().len() == 2).await;

    let frames = peer.sent_frames();
    assert_eq!(frames[0].kind, MessageKind::Answer);
    assert_eq!(frames[0].payload["question_id"], "q1");
    assert_eq!(frames[0].payload["answer"]["choice"], "staging");
    assert_eq!(frames[1].kind, MessageKind::Pause);

    channel.disconnect().await;
    assert!(peer.is_closed());
    assert!(matches!(channel.resume(), Err(SyncError::NotConnected)));
}
