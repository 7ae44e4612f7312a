//! Async HTTP transport to a single storage node
//!
//! Transport and status errors are deliberately squashed to `bool` /
//! `Option` so the orchestrator sees one uniform partial-failure surface and
//! can treat any misbehaving node as simply unavailable.

use std::time::Duration;

use tracing::{debug, warn};

/// Timeout for shard transfers.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for health probes and rollback deletes.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for one storage node.
#[derive(Clone)]
pub struct NodeClient {
    http: reqwest::Client,
    base_url: String,
}

impl NodeClient {
    /// Wrap a shared HTTP client for the node at `base_url`.
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    /// The node's base URL.
    pub fn url(&self) -> &str {
        &self.base_url
    }

    /// `PUT` a shard. `true` iff the node answered 2xx.
    pub async fn upload(&self, shard_id: &str, bytes: Vec<u8>) -> bool {
        let url = format!("{}/store/{}", self.base_url, shard_id);
        match self
            .http
            .put(&url)
            .timeout(TRANSFER_TIMEOUT)
            .body(bytes)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                debug!(node = %self.base_url, shard_id, "shard uploaded");
                true
            }
            Ok(resp) => {
                warn!(node = %self.base_url, shard_id, status = %resp.status(), "shard upload refused");
                false
            }
            Err(e) => {
                warn!(node = %self.base_url, shard_id, error = %e, "shard upload failed");
                false
            }
        }
    }

    /// `GET` a shard. `None` on 404 or any transport failure.
    pub async fn download(&self, shard_id: &str) -> Option<Vec<u8>> {
        let url = format!("{}/retrieve/{}", self.base_url, shard_id);
        match self
            .http
            .get(&url)
            .timeout(TRANSFER_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => match resp.bytes().await {
                Ok(bytes) => {
                    debug!(node = %self.base_url, shard_id, size = bytes.len(), "shard downloaded");
                    Some(bytes.to_vec())
                }
                Err(e) => {
                    warn!(node = %self.base_url, shard_id, error = %e, "shard body read failed");
                    None
                }
            },
            Ok(resp) => {
                debug!(node = %self.base_url, shard_id, status = %resp.status(), "shard unavailable");
                None
            }
            Err(e) => {
                warn!(node = %self.base_url, shard_id, error = %e, "shard download failed");
                None
            }
        }
    }

    /// `DELETE` a shard. Best effort; 404 counts as success (the target
    /// state is "absent").
    pub async fn delete(&self, shard_id: &str) -> bool {
        let url = format!("{}/delete/{}", self.base_url, shard_id);
        match self
            .http
            .delete(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) => {
                let gone =
                    resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND;
                if !gone {
                    warn!(node = %self.base_url, shard_id, status = %resp.status(), "shard delete refused");
                }
                gone
            }
            Err(e) => {
                warn!(node = %self.base_url, shard_id, error = %e, "shard delete failed");
                false
            }
        }
    }

    /// Probe `/health`. `true` iff the node answered 2xx within the probe
    /// timeout.
    pub async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.http.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(node = %self.base_url, error = %e, "health probe failed");
                false
            }
        }
    }
}
