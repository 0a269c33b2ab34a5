//! HTTP graph source tests against a mocked merge backend

use std::sync::Arc;
use std::time::Duration;

use merge_sync::snapshot::FetchOutcome;
use merge_sync::types::{NodeStatus, Severity};
use merge_sync::{GraphSource, HttpGraphSource, SnapshotStore, SyncError};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn source_for(server: &MockServer) -> HttpGraphSource {
    HttpGraphSource::with_origin_and_timeout(server.uri(), Duration::from_secs(5))
        .expect("client builds")
}

fn visualization() -> serde_json::Value {
    json!({
        "status": "success",
        "data": {
            "nodes": [
                {"id": "p1", "labels": ["Person"], "properties": {"name": "Ada"}, "status": "staging"},
                {"id": 7, "label": "Company", "properties": {"name": "Acme"}, "status": "prod"}
            ],
            "edges": [
                {"source": "p1", "target": "7", "type": "WORKS_AT"}
            ]
        }
    })
}

#[tokio::test]
async fn test_visualization_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/merge/s1/visualization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(visualization()))
        .mount(&server)
        .await;

    let data = source_for(&server)
        .fetch_visualization("s1")
        .await
        .unwrap()
        .expect("data present");
    assert_eq!(data["nodes"][0]["id"], "p1");
    assert_eq!(data["edges"][0]["type"], "WORKS_AT");
}

#[tokio::test]
async fn test_visualization_not_found_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/merge/s1/visualization"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let data = source_for(&server).fetch_visualization("s1").await.unwrap();
    assert!(data.is_none());
}

#[tokio::test]
async fn test_visualization_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/merge/s1/visualization"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = source_for(&server).fetch_visualization("s1").await.unwrap_err();
    assert!(matches!(err, SyncError::FetchFailed { status: 503 }));
}

#[tokio::test]
async fn test_session_id_is_path_encoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/merge/team%2Fa/visualization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
        .expect(1)
        .mount(&server)
        .await;

    let data = source_for(&server).fetch_visualization("team/a").await.unwrap();
    assert_eq!(data, Some(serde_json::Value::Null));
}

#[tokio::test]
async fn test_conflicts_bare_and_wrapped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/merge/m1/conflicts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "c1", "entityId": "p1", "conflictType": "property", "severity": "HIGH"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/merge/m2/conflicts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "conflicts": [
                {"id": "c2", "entity_id": "7", "relatedEntities": ["p1"], "severity": "odd"}
            ]
        })))
        .mount(&server)
        .await;

    let source = source_for(&server);
    let bare = source.fetch_conflicts("m1").await.unwrap();
    assert_eq!(bare.len(), 1);
    assert_eq!(bare[0].severity, Severity::High);

    let wrapped = source.fetch_conflicts("m2").await.unwrap();
    assert_eq!(wrapped[0].entity_id, "7");
    assert_eq!(wrapped[0].related_entities, vec!["p1"]);
    assert_eq!(wrapped[0].severity, Severity::Unknown);
}

#[tokio::test]
async fn test_conflicts_not_found_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/merge/m1/conflicts"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(source_for(&server).fetch_conflicts("m1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_store_over_http_dedups_identical_payloads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/merge/s1/visualization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(visualization()))
        .expect(2)
        .mount(&server)
        .await;

    let store = SnapshotStore::new("s1", Arc::new(source_for(&server)));
    let mut updates = store.subscribe();

    assert_eq!(store.fetch().await.unwrap(), FetchOutcome::Published(1));
    assert_eq!(store.fetch().await.unwrap(), FetchOutcome::Unchanged);

    let update = updates.recv().await.unwrap();
    assert!(updates.try_recv().is_err());

    let snapshot = update.snapshot;
    assert_eq!(snapshot.node_count(), 2);
    assert_eq!(snapshot.node("7").unwrap().status, NodeStatus::Prod);
    assert_eq!(snapshot.edges_touching("p1").count(), 1);
}
