//! Storage orchestrator
//!
//! Binds the engine, vault, and node clients into distributed transactions:
//! atomic uploads with rollback, per-filename mutual exclusion, threshold
//! downloads with mandatory integrity verification, and health aggregation.
//!
//! The seal of the manifest is the single commit point of an upload. At no
//! observable moment is a partial shard set reachable through a sealed
//! manifest.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Config, ConfigError};
use crate::engine::{self, CodingParams, EngineError};
use crate::manifest::{shard_storage_id, FileSummary, Manifest};
use crate::node::NodeClient;
use crate::vault::{Vault, VaultError};

const MANIFEST_SUFFIX: &str = ".metadata.json";

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("invalid filename: {0:?}")]
    InvalidFilename(String),
    #[error("file not found: {0:?}")]
    UnknownFile(String),
    #[error("only {online} of {required} storage nodes online; uploads need every node")]
    NodeUnavailable { online: usize, required: usize },
    #[error("{count} shard upload(s) failed; rollback completed")]
    UploadFailed { count: usize },
    #[error("failed to persist sealed manifest; rollback completed")]
    ManifestPersistFailed(#[source] std::io::Error),
    #[error("only {have} of {need} required shards available")]
    Unavailable { have: usize, need: usize },
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Vault(#[from] VaultError),
    #[error("metadata I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Aggregated node availability.
#[derive(Clone, Debug, Serialize)]
pub struct SystemHealth {
    pub system_status: SystemStatus,
    pub nodes_online: usize,
    pub nodes_total: usize,
    pub nodes_required_for_upload: usize,
    pub nodes_required_for_download: usize,
    pub can_store: bool,
    pub can_retrieve: bool,
    pub nodes: Vec<NodeStatus>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemStatus {
    /// All `m` nodes online.
    Optimal,
    /// At least `k` but not all nodes online: downloads work, uploads refused.
    Degraded,
    /// Fewer than `k` nodes online.
    Critical,
}

#[derive(Clone, Debug, Serialize)]
pub struct NodeStatus {
    pub url: String,
    pub online: bool,
}

struct Inner {
    params: CodingParams,
    vault: Vault,
    http: reqwest::Client,
    clients: Vec<NodeClient>,
    metadata_dir: PathBuf,
    // entry insertion is the only racy part; the inner async mutex is held
    // across awaits by design
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Coordinates distributed storage across the configured nodes.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Build an orchestrator from a validated configuration.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let vault = Vault::new(&config.master_key).map_err(|_| ConfigError::MasterKey)?;
        std::fs::create_dir_all(&config.metadata_dir)?;

        let http = reqwest::Client::new();
        let clients = config
            .node_urls
            .iter()
            .map(|url| NodeClient::new(http.clone(), url.clone()))
            .collect();

        info!(
            nodes = config.node_urls.len(),
            k = config.params.k_required,
            m = config.params.m_total,
            "orchestrator initialised"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                params: config.params,
                vault,
                http,
                clients,
                metadata_dir: config.metadata_dir,
                locks: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// The coding parameters in effect for new uploads.
    pub fn params(&self) -> CodingParams {
        self.inner.params
    }

    /// Upload `data` under `filename`: encrypt, shard, fan out to every
    /// node, then seal and persist the manifest. All-or-nothing; any shard
    /// failure triggers rollback of the accepted shards.
    ///
    /// The fan-out and commit run in a spawned task, so cancelling the
    /// caller cannot strand accepted shards without their rollback.
    pub async fn upload(
        &self,
        filename: &str,
        data: Vec<u8>,
    ) -> Result<PathBuf, OrchestratorError> {
        validate_filename(filename)?;

        let this = self.clone();
        let filename = filename.to_string();
        let task = tokio::spawn(async move {
            let lock = this.filename_lock(&filename);
            let _guard = lock.lock().await;
            this.upload_locked(&filename, data).await
        });

        match task.await {
            Ok(result) => result,
            Err(join_err) => std::panic::resume_unwind(join_err.into_panic()),
        }
    }

    async fn upload_locked(
        &self,
        filename: &str,
        data: Vec<u8>,
    ) -> Result<PathBuf, OrchestratorError> {
        let params = self.inner.params;

        // Uploads need every node: shard i is position-locked to node i.
        let online = self.probe_nodes().await.iter().filter(|&&up| up).count();
        if online < params.m_total {
            return Err(OrchestratorError::NodeUnavailable {
                online,
                required: params.m_total,
            });
        }

        let encoded = engine::encrypt_and_shard(params, &data)?;
        info!(
            filename,
            size = data.len(),
            shards = params.m_total,
            "distributing shards"
        );

        let puts = encoded.shards.iter().enumerate().map(|(shard_id, shard)| {
            let client = self.inner.clients[shard_id].clone();
            let storage_id = shard_storage_id(filename, shard_id);
            let bytes = shard.clone();
            async move { client.upload(&storage_id, bytes).await }
        });
        let results = join_all(puts).await;

        let accepted: Vec<usize> = results
            .iter()
            .enumerate()
            .filter_map(|(i, &ok)| ok.then_some(i))
            .collect();
        let failed = params.m_total - accepted.len();
        if failed > 0 {
            warn!(filename, failed, "shard fan-out incomplete; rolling back");
            self.rollback(filename, &accepted).await;
            return Err(OrchestratorError::UploadFailed { count: failed });
        }

        let manifest = Manifest {
            filename: filename.to_string(),
            file_hash: encoded.file_hash,
            file_size: data.len(),
            encryption_key: encoded.file_key.expose().to_string(),
            k_required: params.k_required,
            m_total: params.m_total,
            shard_metadata: encoded.shard_hashes,
            upload_date: Utc::now(),
            shard_locations: self
                .inner
                .clients
                .iter()
                .enumerate()
                .map(|(i, c)| (i, c.url().to_string()))
                .collect(),
        };

        let all: Vec<usize> = (0..params.m_total).collect();
        let sealed = match self.inner.vault.seal(&manifest) {
            Ok(sealed) => sealed,
            Err(e) => {
                self.rollback(filename, &all).await;
                return Err(e.into());
            }
        };

        let path = self.manifest_path(filename);
        if let Err(e) = write_atomic(&path, &sealed) {
            warn!(filename, error = %e, "manifest persist failed; rolling back");
            self.rollback(filename, &all).await;
            return Err(OrchestratorError::ManifestPersistFailed(e));
        }

        info!(filename, path = %path.display(), "upload committed");
        Ok(path)
    }

    /// Compensating deletion of the accepted shards of a failed upload.
    /// Best effort; delete failures are logged and ignored.
    async fn rollback(&self, filename: &str, shard_ids: &[usize]) {
        let deletes = shard_ids.iter().map(|&shard_id| {
            let client = self.inner.clients[shard_id].clone();
            let storage_id = shard_storage_id(filename, shard_id);
            async move { client.delete(&storage_id).await }
        });
        let cleaned = join_all(deletes).await.into_iter().filter(|&ok| ok).count();
        info!(filename, cleaned, total = shard_ids.len(), "rollback finished");
    }

    /// Retrieve and reconstruct `filename`: unseal the manifest, fan out to
    /// every recorded shard location, verify, reconstruct, and decrypt.
    pub async fn download(&self, filename: &str) -> Result<Vec<u8>, OrchestratorError> {
        validate_filename(filename)?;
        let manifest = self.load_manifest(filename)?;
        let params = manifest.coding_params().map_err(EngineError::Code)?;

        // Fast failure below threshold; individual nodes may still answer
        // retrieve while failing health, so fan-out proceeds above it.
        let online = self.probe_nodes().await.iter().filter(|&&up| up).count();
        if online < params.k_required {
            return Err(OrchestratorError::Unavailable {
                have: online,
                need: params.k_required,
            });
        }

        let gets = manifest.shard_locations.iter().map(|(&shard_id, url)| {
            let client = self.client_for(url);
            let storage_id = shard_storage_id(&manifest.filename, shard_id);
            async move { (shard_id, client.download(&storage_id).await) }
        });
        let results = join_all(gets).await;

        let available: Vec<(usize, Vec<u8>)> = results
            .into_iter()
            .filter_map(|(shard_id, bytes)| bytes.map(|b| (shard_id, b)))
            .collect();
        info!(
            filename,
            available = available.len(),
            need = params.k_required,
            "shard fan-in complete"
        );
        if available.len() < params.k_required {
            return Err(OrchestratorError::Unavailable {
                have: available.len(),
                need: params.k_required,
            });
        }

        // All available shards go to the engine, not just the first k, so
        // tampering is detected on every retrieved shard.
        let plaintext = engine::recover_and_decrypt(
            params,
            available,
            &manifest.shard_metadata,
            &manifest.file_key(),
            &manifest.file_hash,
            manifest.file_size,
        )?;
        Ok(plaintext)
    }

    /// Redacted manifest for external rendering.
    pub async fn public_manifest(&self, filename: &str) -> Result<Manifest, OrchestratorError> {
        validate_filename(filename)?;
        Ok(self.load_manifest(filename)?.redacted())
    }

    /// Enumerate stored files, newest first. Manifests that fail to unseal
    /// are skipped with a warning.
    pub fn list(&self) -> Result<Vec<FileSummary>, OrchestratorError> {
        let mut summaries = Vec::new();
        for entry in std::fs::read_dir(&self.inner.metadata_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.ends_with(MANIFEST_SUFFIX) || !entry.path().is_file() {
                continue;
            }
            let sealed = std::fs::read(entry.path())?;
            match self.inner.vault.unseal(&sealed) {
                Ok(manifest) => summaries.push(manifest.summary()),
                Err(e) => warn!(file = name, error = %e, "skipping unreadable manifest"),
            }
        }
        summaries.sort_by(|a, b| b.upload_date.cmp(&a.upload_date));
        Ok(summaries)
    }

    /// Remove a stored file: the manifest first (the commit point in
    /// reverse), then best-effort deletion of its shards.
    pub async fn delete(&self, filename: &str) -> Result<(), OrchestratorError> {
        validate_filename(filename)?;
        let lock = self.filename_lock(filename);
        let _guard = lock.lock().await;

        let manifest = self.load_manifest(filename)?;
        std::fs::remove_file(self.manifest_path(filename))?;

        let deletes = manifest.shard_locations.iter().map(|(&shard_id, url)| {
            let client = self.client_for(url);
            let storage_id = shard_storage_id(&manifest.filename, shard_id);
            async move { client.delete(&storage_id).await }
        });
        let cleaned = join_all(deletes).await.into_iter().filter(|&ok| ok).count();
        info!(filename, cleaned, total = manifest.m_total, "file deleted");
        Ok(())
    }

    /// Probe every node and classify overall availability.
    pub async fn health(&self) -> SystemHealth {
        let params = self.inner.params;
        let up = self.probe_nodes().await;
        let nodes: Vec<NodeStatus> = self
            .inner
            .clients
            .iter()
            .zip(&up)
            .map(|(client, &online)| NodeStatus {
                url: client.url().to_string(),
                online,
            })
            .collect();
        let online = up.iter().filter(|&&ok| ok).count();

        let system_status = if online == params.m_total {
            SystemStatus::Optimal
        } else if online >= params.k_required {
            SystemStatus::Degraded
        } else {
            SystemStatus::Critical
        };

        SystemHealth {
            system_status,
            nodes_online: online,
            nodes_total: params.m_total,
            nodes_required_for_upload: params.m_total,
            nodes_required_for_download: params.k_required,
            can_store: online == params.m_total,
            can_retrieve: online >= params.k_required,
            nodes,
        }
    }

    async fn probe_nodes(&self) -> Vec<bool> {
        join_all(self.inner.clients.iter().map(|c| c.health())).await
    }

    fn filename_lock(&self, filename: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .inner
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(filename.to_string()).or_default().clone()
    }

    fn client_for(&self, url: &str) -> NodeClient {
        let url = url.trim_end_matches('/');
        self.inner
            .clients
            .iter()
            .find(|c| c.url() == url)
            .cloned()
            .unwrap_or_else(|| NodeClient::new(self.inner.http.clone(), url))
    }

    fn manifest_path(&self, filename: &str) -> PathBuf {
        self.inner
            .metadata_dir
            .join(format!("{filename}{MANIFEST_SUFFIX}"))
    }

    fn load_manifest(&self, filename: &str) -> Result<Manifest, OrchestratorError> {
        let sealed = match std::fs::read(self.manifest_path(filename)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(OrchestratorError::UnknownFile(filename.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(self.inner.vault.unseal(&sealed)?)
    }
}

fn validate_filename(filename: &str) -> Result<(), OrchestratorError> {
    let ok = !filename.is_empty()
        && filename.len() <= 255
        && filename != "."
        && filename != ".."
        && !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains('\0');
    if ok {
        Ok(())
    } else {
        Err(OrchestratorError::InvalidFilename(filename.to_string()))
    }
}

/// Write-to-temp, sync, rename. The rename is the atomic step; a reader
/// sees either the previous manifest or the new one, never a torn write.
fn write_atomic(path: &std::path::Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;

    let tmp = path.with_extension("tmp");
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_validation() {
        assert!(validate_filename("report.pdf").is_ok());
        assert!(validate_filename("with spaces and.dots").is_ok());

        for bad in ["", ".", "..", "a/b", "a\\b", "nul\0byte"] {
            assert!(
                matches!(
                    validate_filename(bad),
                    Err(OrchestratorError::InvalidFilename(_))
                ),
                "{bad:?} should be rejected"
            );
        }
        assert!(validate_filename(&"x".repeat(256)).is_err());
    }

    #[test]
    fn write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.metadata.json");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"second");
        assert!(!path.with_extension("tmp").exists());
    }

    #[tokio::test]
    async fn filename_lock_is_shared_per_name() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(
            (0..5)
                .map(|i| format!("http://127.0.0.1:90{:02}", i + 1))
                .collect(),
            CodingParams::default(),
            dir.path().join("metadata"),
            Vault::generate_master_key(),
        )
        .unwrap();
        let orchestrator = Orchestrator::new(config).unwrap();

        let a = orchestrator.filename_lock("same");
        let b = orchestrator.filename_lock("same");
        let c = orchestrator.filename_lock("other");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
