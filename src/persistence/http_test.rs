//! Tests for the REST workflow store against a mock backend.

use std::sync::atomic::{AtomicI64, Ordering};

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use super::http::HttpWorkflowStore;
use super::store::{RemoteRunState, WorkflowStore};
use crate::config::{SaveMode, StoreConfig};
use crate::error::StoreError;
use crate::types::{NodeKind, PipelineGraph, Position};

fn store(server: &MockServer, mode: SaveMode) -> HttpWorkflowStore {
  let config = StoreConfig::default()
    .with_base_url(server.uri())
    .with_save_mode(mode);
  HttpWorkflowStore::new(config).unwrap()
}

fn two_nodes() -> PipelineGraph {
  let mut g = PipelineGraph::new();
  g.add_node(NodeKind::DataCollection, Position::new(100.0, 100.0));
  g.add_node(NodeKind::DataValidation, Position::new(500.0, 100.0));
  g.connect("1", "2").unwrap();
  g
}

#[tokio::test]
async fn loads_nodes_and_edges() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/workflows"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!([
      { "id": "1", "type": "workflowNode", "position": { "x": 100, "y": 100 },
        "data": { "label": "Collect", "type": "data_collection", "status": "idle",
                  "progress": 0, "parameters": {}, "metrics": {} } },
      { "id": "2", "type": "workflowNode", "position": { "x": 500, "y": 100 },
        "data": { "label": "Validate", "type": "data_validation", "status": "idle",
                  "progress": 0, "parameters": {}, "metrics": {} } }
    ])))
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/api/workflows/connections"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!([
      { "id": "e1-2", "source": "1", "target": "2", "type": "bezier",
        "animated": true, "style": { "stroke": "#ED8936", "strokeWidth": 2, "opacity": 0.8 } }
    ])))
    .mount(&server)
    .await;

  let s = store(&server, SaveMode::Replace);
  let nodes = s.load_nodes().await.unwrap();
  let edges = s.load_edges().await.unwrap();
  let graph = PipelineGraph::from_parts(nodes, edges).unwrap();
  assert_eq!(graph.len(), 2);
  assert_eq!(graph.node("2").unwrap().data.label, "Validate");
  assert_eq!(graph.edges()[0].id, "e1-2");
}

#[tokio::test]
async fn replace_mode_puts_whole_graph() {
  let server = MockServer::start().await;
  Mock::given(method("PUT"))
    .and(path("/api/workflows"))
    .and(body_partial_json(json!({ "edges": [{ "id": "e1-2" }] })))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "ok" })))
    .expect(1)
    .mount(&server)
    .await;

  store(&server, SaveMode::Replace)
    .replace_graph(&two_nodes())
    .await
    .unwrap();
}

#[tokio::test]
async fn per_entity_mode_recreates_with_backend_ids() {
  let server = MockServer::start().await;
  for p in ["/api/workflows/delete_edge", "/api/workflows/delete_node"] {
    Mock::given(method("DELETE"))
      .and(path(p))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "deleted" })))
      .expect(1)
      .mount(&server)
      .await;
  }
  let next_id = AtomicI64::new(100);
  Mock::given(method("POST"))
    .and(path("/api/workflows/add_node"))
    .respond_with(move |_: &Request| {
      let id = next_id.fetch_add(1, Ordering::SeqCst) + 1;
      ResponseTemplate::new(200).set_body_json(json!({ "message": "Node added", "id": id }))
    })
    .expect(2)
    .mount(&server)
    .await;
  Mock::given(method("POST"))
    .and(path("/api/workflows/add_edge"))
    .and(body_partial_json(json!({
      "source": 101, "target": 102, "edge_type": "bezier", "animated": true
    })))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Edge added", "id": 7 })))
    .expect(1)
    .mount(&server)
    .await;

  store(&server, SaveMode::PerEntity)
    .replace_graph(&two_nodes())
    .await
    .unwrap();
}

#[tokio::test]
async fn default_config_saves_through_add_and_delete_routes() {
  let server = MockServer::start().await;
  for p in ["/api/workflows/delete_edge", "/api/workflows/delete_node"] {
    Mock::given(method("DELETE"))
      .and(path(p))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "deleted" })))
      .expect(1)
      .mount(&server)
      .await;
  }
  Mock::given(method("POST"))
    .and(path("/api/workflows/add_node"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "Node added", "id": 1 })))
    .expect(1)
    .mount(&server)
    .await;

  let mut graph = PipelineGraph::new();
  graph.add_node(NodeKind::Monitoring, Position::default());
  let s = HttpWorkflowStore::new(StoreConfig::default().with_base_url(server.uri())).unwrap();
  s.replace_graph(&graph).await.unwrap();
}

#[tokio::test]
async fn error_status_is_reported() {
  let server = MockServer::start().await;
  Mock::given(method("PUT"))
    .and(path("/api/workflows"))
    .respond_with(ResponseTemplate::new(500).set_body_string("database down"))
    .mount(&server)
    .await;

  let err = store(&server, SaveMode::Replace)
    .replace_graph(&two_nodes())
    .await
    .unwrap_err();
  match err {
    StoreError::Status { status, body, .. } => {
      assert_eq!(status, 500);
      assert_eq!(body, "database down");
    }
    other => panic!("unexpected {:?}", other),
  }
}

#[tokio::test]
async fn malformed_body_is_invalid_response() {
  let server = MockServer::start().await;
  Mock::given(method("GET"))
    .and(path("/api/workflows"))
    .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
    .mount(&server)
    .await;

  let err = store(&server, SaveMode::Replace)
    .load_nodes()
    .await
    .unwrap_err();
  assert!(matches!(err, StoreError::InvalidResponse { .. }));
}

#[tokio::test]
async fn run_notification_and_status_check() {
  let server = MockServer::start().await;
  Mock::given(method("POST"))
    .and(path("/api/workflows/run"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "status": "error",
      "message": "A flow is already running. Please wait until it completes."
    })))
    .mount(&server)
    .await;
  Mock::given(method("GET"))
    .and(path("/api/workflows/run_status_check"))
    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
      "status": "running", "message": "A flow is currently running."
    })))
    .mount(&server)
    .await;

  let s = store(&server, SaveMode::Replace);
  let ack = s.notify_run_started().await.unwrap();
  assert!(ack.is_rejected());
  assert!(ack.message.contains("already running"));
  let status = s.run_status().await.unwrap();
  assert_eq!(status.status, RemoteRunState::Running);
}

#[tokio::test]
async fn unreachable_backend_is_http_error() {
  let config = StoreConfig::default().with_base_url("http://127.0.0.1:9");
  let s = HttpWorkflowStore::new(config).unwrap();
  assert!(matches!(
    s.run_status().await,
    Err(StoreError::Http { .. })
  ));
}
