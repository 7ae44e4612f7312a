//! Start-up configuration
//!
//! One validated record, loaded from the environment exactly once and then
//! read-only. Tests construct it directly; there are no module-level
//! singletons.

use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::engine::{CodingParams, ErasureError};
use crate::vault::MASTER_KEY_ENV;

/// Comma-separated storage node URLs, ordered; shard `i` lives on node `i`.
pub const NODE_URLS_ENV: &str = "NODE_URLS";
/// Root directory for gateway state (sealed manifests live under
/// `{DATA_DIR}/metadata`).
pub const DATA_DIR_ENV: &str = "DATA_DIR";
/// Reconstruction threshold (k).
pub const SHARDS_REQUIRED_ENV: &str = "SHARDS_REQUIRED";
/// Total shard count (m).
pub const SHARDS_TOTAL_ENV: &str = "SHARDS_TOTAL";

const DEFAULT_NODE_URLS: [&str; 5] = [
    "http://127.0.0.1:8001",
    "http://127.0.0.1:8002",
    "http://127.0.0.1:8003",
    "http://127.0.0.1:8004",
    "http://127.0.0.1:8005",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{MASTER_KEY_ENV} is missing or not a valid Fernet key")]
    MasterKey,
    #[error("malformed node URL: {0:?}")]
    InvalidNodeUrl(String),
    #[error(transparent)]
    Params(#[from] ErasureError),
    #[error("{expected} nodes required for {expected}-way distribution, {actual} configured")]
    NodeCount { expected: usize, actual: usize },
    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Validated orchestrator configuration.
#[derive(Clone)]
pub struct Config {
    /// Ordered node URLs; length equals `params.m_total`.
    pub node_urls: Vec<String>,
    /// Erasure coding parameters.
    pub params: CodingParams,
    /// Directory holding sealed manifests.
    pub metadata_dir: PathBuf,
    /// Encoded master vault key.
    pub master_key: String,
}

impl Config {
    /// Validate and build a configuration record.
    pub fn new(
        node_urls: Vec<String>,
        params: CodingParams,
        metadata_dir: impl Into<PathBuf>,
        master_key: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let master_key = master_key.into();
        if fernet::Fernet::new(&master_key).is_none() {
            return Err(ConfigError::MasterKey);
        }

        let params = CodingParams::new(params.k_required, params.m_total)?;

        if node_urls.len() != params.m_total {
            return Err(ConfigError::NodeCount {
                expected: params.m_total,
                actual: node_urls.len(),
            });
        }
        for url in &node_urls {
            let well_formed = url.starts_with("http://") || url.starts_with("https://");
            if !well_formed {
                return Err(ConfigError::InvalidNodeUrl(url.clone()));
            }
        }

        Ok(Self {
            node_urls,
            params,
            metadata_dir: metadata_dir.into(),
            master_key,
        })
    }

    /// Load the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let master_key = env::var(MASTER_KEY_ENV).map_err(|_| ConfigError::MasterKey)?;

        let node_urls: Vec<String> = match env::var(NODE_URLS_ENV) {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => DEFAULT_NODE_URLS.iter().map(|s| s.to_string()).collect(),
        };

        let k_required = read_usize(SHARDS_REQUIRED_ENV, 3)?;
        let m_total = read_usize(SHARDS_TOTAL_ENV, 5)?;
        let params = CodingParams::new(k_required, m_total)?;

        let data_dir = env::var(DATA_DIR_ENV).unwrap_or_else(|_| ".".to_string());
        let metadata_dir = PathBuf::from(data_dir).join("metadata");

        Self::new(node_urls, params, metadata_dir, master_key)
    }
}

fn read_usize(var: &'static str, default: usize) -> Result<usize, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidEnv { var, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::Vault;

    fn urls(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!("http://127.0.0.1:80{:02}", i + 1))
            .collect()
    }

    #[test]
    fn valid_config_accepted() {
        let config = Config::new(
            urls(5),
            CodingParams::default(),
            "metadata",
            Vault::generate_master_key(),
        )
        .unwrap();
        assert_eq!(config.params.k_required, 3);
        assert_eq!(config.node_urls.len(), 5);
    }

    #[test]
    fn bad_master_key_rejected() {
        let err = Config::new(urls(5), CodingParams::default(), "metadata", "nonsense");
        assert!(matches!(err, Err(ConfigError::MasterKey)));
    }

    #[test]
    fn k_greater_than_m_rejected() {
        let err = Config::new(
            urls(5),
            CodingParams {
                k_required: 6,
                m_total: 5,
            },
            "metadata",
            Vault::generate_master_key(),
        );
        assert!(matches!(err, Err(ConfigError::Params(_))));
    }

    #[test]
    fn node_count_must_match_m() {
        let err = Config::new(
            urls(4),
            CodingParams::default(),
            "metadata",
            Vault::generate_master_key(),
        );
        assert!(matches!(
            err,
            Err(ConfigError::NodeCount {
                expected: 5,
                actual: 4
            })
        ));
    }

    #[test]
    fn malformed_url_rejected() {
        let mut bad = urls(5);
        bad[2] = "localhost:8003".to_string();
        let err = Config::new(
            bad,
            CodingParams::default(),
            "metadata",
            Vault::generate_master_key(),
        );
        assert!(matches!(err, Err(ConfigError::InvalidNodeUrl(_))));
    }
}
