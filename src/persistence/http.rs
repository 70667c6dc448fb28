//! Workflow store backed by the MLOps backend's REST API.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument, warn};

use super::dto::{AddEdgeRequest, AddNodeRequest, Created, ReplaceGraphRequest, WireEdge, WireNode};
use super::store::{RunAck, RunStatus, WorkflowStore};
use crate::config::{SaveMode, StoreConfig};
use crate::error::StoreError;
use crate::types::{PipelineEdge, PipelineGraph, PipelineNode};

pub const NODES_PATH: &str = "/api/workflows";
pub const EDGES_PATH: &str = "/api/workflows/connections";
pub const REPLACE_PATH: &str = "/api/workflows";
pub const DELETE_EDGES_PATH: &str = "/api/workflows/delete_edge";
pub const DELETE_NODES_PATH: &str = "/api/workflows/delete_node";
pub const ADD_NODE_PATH: &str = "/api/workflows/add_node";
pub const ADD_EDGE_PATH: &str = "/api/workflows/add_edge";
pub const RUN_PATH: &str = "/api/workflows/run";
pub const RUN_STATUS_PATH: &str = "/api/workflows/run_status_check";

/// REST client for the workflow endpoints.
#[derive(Debug, Clone)]
pub struct HttpWorkflowStore {
  client: Client,
  config: StoreConfig,
}

impl HttpWorkflowStore {
  pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
    let client = Client::builder()
      .timeout(config.request_timeout)
      .build()
      .map_err(|source| StoreError::Http {
        endpoint: config.base_url.clone(),
        source,
      })?;
    Ok(Self { client, config })
  }

  pub fn config(&self) -> &StoreConfig {
    &self.config
  }

  async fn send(&self, endpoint: &str, req: RequestBuilder) -> Result<Response, StoreError> {
    let response = req.send().await.map_err(|source| StoreError::Http {
      endpoint: endpoint.to_string(),
      source,
    })?;
    let status = response.status();
    if status.is_success() {
      return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(endpoint, status = status.as_u16(), "workflow backend returned an error");
    Err(StoreError::Status {
      endpoint: endpoint.to_string(),
      status: status.as_u16(),
      body,
    })
  }

  async fn decode<T: DeserializeOwned>(endpoint: &str, response: Response) -> Result<T, StoreError> {
    let bytes = response.bytes().await.map_err(|source| StoreError::Http {
      endpoint: endpoint.to_string(),
      source,
    })?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::InvalidResponse {
      endpoint: endpoint.to_string(),
      reason: e.to_string(),
    })
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, StoreError> {
    let endpoint = self.config.endpoint(path);
    let response = self.send(&endpoint, self.client.get(&endpoint)).await?;
    Self::decode(&endpoint, response).await
  }

  async fn delete(&self, path: &str) -> Result<(), StoreError> {
    let endpoint = self.config.endpoint(path);
    self.send(&endpoint, self.client.delete(&endpoint)).await?;
    Ok(())
  }

  async fn create<B: serde::Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<i64, StoreError> {
    let endpoint = self.config.endpoint(path);
    let response = self
      .send(&endpoint, self.client.post(&endpoint).json(body))
      .await?;
    let created: Created = Self::decode(&endpoint, response).await?;
    Ok(created.id)
  }

  /// `PUT /api/workflows` with the whole graph.
  async fn replace_atomically(&self, graph: &PipelineGraph) -> Result<(), StoreError> {
    let endpoint = self.config.endpoint(REPLACE_PATH);
    let body = ReplaceGraphRequest::from(graph);
    self
      .send(&endpoint, self.client.put(&endpoint).json(&body))
      .await?;
    Ok(())
  }

  /// Deletes every stored edge and node, then re-creates them one by one.
  /// The backend assigns fresh node ids; edges are rewritten to use them.
  async fn replace_per_entity(&self, graph: &PipelineGraph) -> Result<(), StoreError> {
    self.delete(DELETE_EDGES_PATH).await?;
    self.delete(DELETE_NODES_PATH).await?;

    let mut remote_ids: HashMap<&str, i64> = HashMap::with_capacity(graph.len());
    for node in graph.nodes() {
      let id = self.create(ADD_NODE_PATH, &AddNodeRequest::from(node)).await?;
      debug!(local = %node.id, remote = id, "node created");
      remote_ids.insert(node.id.as_str(), id);
    }

    for edge in graph.edges() {
      let source = remote_id(&remote_ids, &edge.source)?;
      let target = remote_id(&remote_ids, &edge.target)?;
      let body = AddEdgeRequest {
        source,
        target,
        edge_type: &edge.edge_type,
        animated: edge.animated,
        style: &edge.style,
      };
      self.create(ADD_EDGE_PATH, &body).await?;
    }
    Ok(())
  }
}

fn remote_id(ids: &HashMap<&str, i64>, local: &str) -> Result<i64, StoreError> {
  ids
    .get(local)
    .copied()
    .ok_or_else(|| StoreError::InvalidResponse {
      endpoint: ADD_NODE_PATH.to_string(),
      reason: format!("no backend id was assigned to node {}", local),
    })
}

#[async_trait]
impl WorkflowStore for HttpWorkflowStore {
  #[instrument(level = "trace", skip(self))]
  async fn load_nodes(&self) -> Result<Vec<PipelineNode>, StoreError> {
    let nodes: Vec<WireNode> = self.get_json(NODES_PATH).await?;
    Ok(nodes.into_iter().map(PipelineNode::from).collect())
  }

  #[instrument(level = "trace", skip(self))]
  async fn load_edges(&self) -> Result<Vec<PipelineEdge>, StoreError> {
    let edges: Vec<WireEdge> = self.get_json(EDGES_PATH).await?;
    Ok(edges.into_iter().map(PipelineEdge::from).collect())
  }

  #[instrument(level = "trace", skip(self, graph), fields(nodes = graph.len()))]
  async fn replace_graph(&self, graph: &PipelineGraph) -> Result<(), StoreError> {
    match self.config.save_mode {
      SaveMode::Replace => self.replace_atomically(graph).await?,
      SaveMode::PerEntity => self.replace_per_entity(graph).await?,
    }
    info!(mode = %self.config.save_mode, nodes = graph.len(), edges = graph.edges().len(), "graph stored");
    Ok(())
  }

  #[instrument(level = "trace", skip(self))]
  async fn notify_run_started(&self) -> Result<RunAck, StoreError> {
    let endpoint = self.config.endpoint(RUN_PATH);
    let response = self.send(&endpoint, self.client.post(&endpoint)).await?;
    Self::decode(&endpoint, response).await
  }

  #[instrument(level = "trace", skip(self))]
  async fn run_status(&self) -> Result<RunStatus, StoreError> {
    self.get_json(RUN_STATUS_PATH).await
  }
}
