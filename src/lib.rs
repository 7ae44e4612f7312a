//! shardvault - client-side-encrypted, erasure-coded distributed object store
//!
//! Files are encrypted before anything leaves the gateway, split into `m`
//! Reed-Solomon shards of which any `k` reconstruct, and fanned out across
//! `m` storage nodes. Nodes only ever see ciphertext shards. Per-file keys
//! are envelope-encrypted inside a sealed manifest under a process-wide
//! master key.
//!
//! - Uploads are atomic: every shard lands or the accepted ones are rolled
//!   back, and the sealed manifest write is the single commit point.
//! - Downloads verify every retrieved shard against its manifest tag before
//!   reconstruction, and the decrypted plaintext against the whole-file
//!   hash.

pub mod config;
pub mod crypto;
pub mod engine;
pub mod gateway;
pub mod manifest;
pub mod node;
pub mod orchestrator;
pub mod vault;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use engine::{CodingParams, EngineError};
pub use manifest::{FileSummary, Manifest, REDACTED_KEY};
pub use node::{NodeClient, ShardStore};
pub use orchestrator::{Orchestrator, OrchestratorError, SystemHealth, SystemStatus};
pub use vault::{Vault, VaultError, MASTER_KEY_ENV};
