//! HTTP client for the management API.
//!
//! Used by the CLI node commands and by a standby joining its primary at
//! startup.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use syncwarden_core::cluster::{Member, Node};
use syncwarden_core::error::{Result, WardenError};

use crate::cluster::NodeRegistry;
use crate::gateway::{ApiResponse, NodeRequest};

/// Client for a remote SyncWarden management API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the API at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| WardenError::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// URL for `segments` under the base URL, each one percent-encoded.
    fn segment_url(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| WardenError::Http(format!("Invalid API URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| WardenError::Http(format!("Invalid API URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn unwrap_envelope<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let envelope: ApiResponse = response
            .json()
            .await
            .map_err(|e| WardenError::Http(format!("Malformed response ({}): {}", status, e)))?;

        if let Some(error) = envelope.error {
            return Err(WardenError::Http(format!("{}: {}", error.code, error.message)));
        }
        let data = envelope.data.unwrap_or(serde_json::Value::Null);
        Ok(serde_json::from_value(data)?)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| WardenError::Http(e.to_string()))?;
        Self::unwrap_envelope(response).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send(self.http.post(self.url(path)).json(body)).await
    }

    /// `POST /nodes`
    pub async fn add_node(&self, name: &str, endpoint: &str) -> Result<bool> {
        self.post("/nodes", &NodeRequest::new(name, endpoint)).await
    }

    /// `DELETE /nodes/{name}`
    pub async fn delete_node(&self, name: &str) -> Result<bool> {
        let url = self.segment_url(&["nodes", name])?;
        self.send(self.http.delete(url)).await
    }

    /// `POST /join`
    pub async fn join(&self, name: &str, endpoint: &str) -> Result<Vec<Member>> {
        self.post("/join", &NodeRequest::new(name, endpoint)).await
    }

    /// `GET /nodes`
    pub async fn list_nodes(&self) -> Result<Vec<Node>> {
        self.send(self.http.get(self.url("/nodes"))).await
    }

    /// `GET /status`
    pub async fn status(&self) -> Result<serde_json::Value> {
        self.send(self.http.get(self.url("/status"))).await
    }
}

/// Join the cluster through `client` and copy the returned membership into
/// `registry`. Returns how many members were added locally.
pub async fn join_cluster(
    client: &ApiClient,
    registry: &NodeRegistry,
    name: &str,
    endpoint: &str,
) -> Result<usize> {
    let members = client.join(name, endpoint).await?;
    let mut added = 0;

    for member in members.iter().filter(|m| m.name != name) {
        match registry.add(&member.name, &member.endpoint, false, true) {
            Ok(_) => added += 1,
            Err(e) => {
                tracing::warn!(node = %member.name, error = %e, "Could not register cluster member");
            }
        }
    }

    tracing::info!(primary = client.base_url(), members = added, "Joined cluster");
    Ok(added)
}
