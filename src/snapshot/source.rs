//! Backend access for visualization and conflict data

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::{SessionEndpoints, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::types::Conflict;

/// Where snapshots and conflicts come from
#[async_trait]
pub trait GraphSource: Send + Sync + 'static {
    /// Raw `data` object of the visualization; `None` while the backend has nothing yet
    async fn fetch_visualization(&self, session_id: &str) -> SyncResult<Option<Value>>;

    /// Conflict list of a merge
    async fn fetch_conflicts(&self, merge_id: &str) -> SyncResult<Vec<Conflict>>;
}

/// `GET /merge/{id}/visualization` response wrapper
#[derive(Debug, Deserialize)]
struct VisualizationEnvelope {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Value,
}

/// The conflicts endpoint answers with a bare list or a wrapped one
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ConflictsBody {
    List(Vec<Conflict>),
    Wrapped {
        #[serde(alias = "data")]
        conflicts: Vec<Conflict>,
    },
}

/// HTTP graph source talking to the merge backend
#[derive(Debug, Clone)]
pub struct HttpGraphSource {
    origin: String,
    client: Client,
}

impl HttpGraphSource {
    /// Create a source for the configured origin
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SyncError::Request(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            origin: config.origin.clone(),
            client,
        })
    }

    /// Create a source with the provided origin and timeout
    pub fn with_origin_and_timeout(origin: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        Self::new(&SyncConfig::new(origin).with_request_timeout(timeout))
    }

    fn endpoints(&self, session_id: &str) -> SessionEndpoints {
        SessionEndpoints::new(&self.origin, session_id)
    }
}

#[async_trait]
impl GraphSource for HttpGraphSource {
    #[instrument(skip(self), fields(session = %session_id))]
    async fn fetch_visualization(&self, session_id: &str) -> SyncResult<Option<Value>> {
        let url = self.endpoints(session_id).visualization_url();
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!("visualization not ready yet");
                Ok(None)
            }
            status if status.is_success() => {
                let envelope: VisualizationEnvelope = response.json().await?;
                debug!(status = ?envelope.status, "visualization fetched");
                Ok(Some(envelope.data))
            }
            status => Err(SyncError::FetchFailed {
                status: status.as_u16(),
            }),
        }
    }

    #[instrument(skip(self), fields(merge = %merge_id))]
    async fn fetch_conflicts(&self, merge_id: &str) -> SyncResult<Vec<Conflict>> {
        let url = self.endpoints(merge_id).conflicts_url(merge_id);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            status if status.is_success() => {
                let conflicts = match response.json::<ConflictsBody>().await? {
                    ConflictsBody::List(list) => list,
                    ConflictsBody::Wrapped { conflicts } => conflicts,
                };
                debug!(count = conflicts.len(), "conflicts fetched");
                Ok(conflicts)
            }
            status => Err(SyncError::FetchFailed {
                status: status.as_u16(),
            }),
        }
    }
}
