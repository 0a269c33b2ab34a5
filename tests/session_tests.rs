//! Merge session integration tests
//!
//! Full wiring over the in-memory transport and graph source: refetch on
//! push events, conflict annotation, operation log resets and teardown.

use std::sync::Arc;
use std::time::Duration;

use merge_sync::snapshot::FetchOutcome;
use merge_sync::testing::{ConnectOutcome, MockTransport, StaticGraphSource};
use merge_sync::{
    ChannelState, Conflict, GraphNode, GraphOperation, MergeSession, MessageKind, NodeStatus,
    PushFrame, ReconciledView, SnapshotStore, SyncConfig,
};
use serde_json::{json, Value};
use tokio::sync::broadcast;

fn config() -> SyncConfig {
    SyncConfig::new("http://merge.test")
        .with_reconnect_delay(Duration::from_millis(5))
        .with_max_reconnect_attempts(1)
}

fn graph(ids: &[&str]) -> Value {
    let nodes: Vec<Value> = ids
        .iter()
        .map(|id| json!({"id": id, "labels": ["Entity"], "status": "both"}))
        .collect();
    json!({"nodes": nodes, "edges": []})
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

async fn view_where<F: Fn(&ReconciledView) -> bool>(
    views: &mut broadcast::Receiver<ReconciledView>,
    check: F,
) -> ReconciledView {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match views.recv().await {
                Ok(view) if check(&view) => return view,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("view channel closed"),
            }
        }
    })
    .await
    .expect("view not published in time")
}

fn open(transport: &MockTransport, source: &StaticGraphSource) -> MergeSession {
    MergeSession::open(
        &config(),
        "merge-1",
        Arc::new(transport.clone()),
        Arc::new(source.clone()),
    )
}

#[tokio::test]
async fn test_connect_fetches_and_annotates() {
    let transport = MockTransport::accepting();
    let source = StaticGraphSource::new();
    source.push_visualization(graph(&["a", "b"]));
    source.set_conflicts(vec![Conflict::new("c1", "b")]);

    let session = open(&transport, &source);
    let mut views = session.subscribe();

    let view = view_where(&mut views, |v| !v.conflicts.is_empty()).await;
    assert_eq!(view.snapshot_version, 1);
    assert_eq!(view.snapshot.node("b").unwrap().conflicts, vec!["c1"]);
    assert!(view.snapshot.node("a").unwrap().conflicts.is_empty());
    settle(|| *session.snapshot() == *view.snapshot).await;

    session.close().await;
}

#[tokio::test]
async fn test_push_update_refetches_and_resets_local_edits() {
    let transport = MockTransport::accepting();
    let source = StaticGraphSource::new();
    source.push_visualization(graph(&["a"]));

    let session = open(&transport, &source);
    let mut views = session.subscribe();
    view_where(&mut views, |v| v.snapshot_version == 1).await;
    settle(|| session.snapshot().node("a").is_some()).await;

    session
        .apply(GraphOperation::CreateNode {
            node: GraphNode::new("draft", NodeStatus::Staging),
        })
        .unwrap();
    assert!(session.can_undo());

    source.push_visualization(graph(&["a", "b"]));
    transport.peer(0).unwrap().push_frame(&PushFrame::new(
        MessageKind::VisualizationUpdate,
        json!({}),
    ));

    let view = view_where(&mut views, |v| v.snapshot_version == 2).await;
    assert_eq!(view.snapshot.node_count(), 2);

    settle(|| !session.can_undo()).await;
    assert!(!session.can_redo());
    assert!(session.snapshot().node("draft").is_none());
    assert!(session.snapshot().node("b").is_some());

    session.close().await;
}

#[tokio::test]
async fn test_status_frame_refetches_graph() {
    let transport = MockTransport::accepting();
    let source = StaticGraphSource::new();
    source.push_visualization(graph(&["a"]));

    let session = open(&transport, &source);
    let mut views = session.subscribe();
    view_where(&mut views, |v| v.snapshot_version == 1).await;

    source.push_visualization(graph(&["a", "b", "c"]));
    transport.peer(0).unwrap().push_frame(&PushFrame::new(
        MessageKind::Status,
        json!({"status": "running", "progress": 0.4, "current_step": "matching"}),
    ));

    let view = view_where(&mut views, |v| v.snapshot_version == 2).await;
    assert_eq!(view.snapshot.node_count(), 3);
    session.close().await;
}

#[tokio::test]
async fn test_conflict_update_refetches_conflicts_only() {
    let transport = MockTransport::accepting();
    let source = StaticGraphSource::new();
    source.push_visualization(graph(&["a"]));

    let session = open(&transport, &source);
    let mut views = session.subscribe();
    view_where(&mut views, |v| v.snapshot_version == 1).await;
    settle(|| source.conflict_calls() == 1).await;
    let fetches = source.visualization_calls();

    source.set_conflicts(vec![Conflict::new("c9", "a")]);
    transport.peer(0).unwrap().push_frame(&PushFrame::new(
        MessageKind::ConflictUpdate,
        json!({"conflict_id": "c9"}),
    ));

    let view = view_where(&mut views, |v| !v.conflicts.is_empty()).await;
    assert_eq!(view.snapshot_version, 1);
    assert_eq!(view.snapshot.node("a").unwrap().conflicts, vec!["c9"]);
    assert_eq!(source.visualization_calls(), fetches);

    session.close().await;
}

#[tokio::test]
async fn test_disconnect_keeps_stale_view() {
    let transport = MockTransport::with_script(vec![ConnectOutcome::Accept]);
    let source = StaticGraphSource::new();
    source.push_visualization(graph(&["a", "b", "c"]));

    let session = open(&transport, &source);
    let mut views = session.subscribe();
    view_where(&mut views, |v| v.snapshot_version == 1).await;

    transport.peer(0).unwrap().close_abnormal("backend restarted");
    settle(|| {
        transport.attempt_count() == 2 && session.channel().state() == ChannelState::Disconnected
    })
    .await;

    assert_eq!(session.view().snapshot.node_count(), 3);
    assert_eq!(session.store().current().node_count(), 3);
    session.close().await;
}

#[tokio::test]
async fn test_close_cancels_in_flight_fetch() {
    let transport = MockTransport::accepting();
    let source = StaticGraphSource::new();
    source.push_delayed(graph(&["late"]), Duration::from_millis(200));

    let session = open(&transport, &source);
    settle(|| source.visualization_calls() == 1).await;
    session.close().await;

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(session.store().version(), 0);
    assert!(session.view().snapshot.is_empty());
    assert_eq!(session.channel().handler_count(), 0);
}

#[tokio::test]
async fn test_dropped_session_stops_reconnecting() {
    let transport = MockTransport::accepting();
    let source = StaticGraphSource::new();

    let session = open(&transport, &source);
    session.channel().wait_for_state(ChannelState::Connected).await;
    let peer = transport.peer(0).unwrap();

    drop(session);
    settle(|| peer.is_closed()).await;

    peer.close_abnormal("backend restarted");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.attempt_count(), 1);
}

#[tokio::test]
async fn test_concurrent_fetches_last_resolved_wins() {
    let source = StaticGraphSource::new();
    source.push_delayed(graph(&["older"]), Duration::from_millis(60));
    source.push_visualization(graph(&["newer"]));
    let store = SnapshotStore::new("merge-1", Arc::new(source));

    // The earlier call resolves last and overwrites the fresher payload
    let (first, second) = tokio::join!(store.fetch(), store.fetch());
    assert_eq!(second.unwrap(), FetchOutcome::Published(1));
    assert_eq!(first.unwrap(), FetchOutcome::Published(2));
    assert!(store.current().node("older").is_some());
}
