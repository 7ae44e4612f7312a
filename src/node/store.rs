//! File-backed shard storage for a single node
//!
//! One raw file per shard under the node's data directory. The store is
//! opaque to file structure; it never interprets shard contents.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("shard not found: {0}")]
    NotFound(String),
    #[error("invalid shard id: {0:?}")]
    InvalidShardId(String),
}

/// Local storage for shards.
pub struct ShardStore {
    root: PathBuf,
}

impl ShardStore {
    /// Open or create a shard store rooted at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = path.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a shard id to its on-disk path, rejecting ids that would
    /// escape the store root.
    fn shard_path(&self, shard_id: &str) -> Result<PathBuf, StoreError> {
        let traversal = shard_id.is_empty()
            || shard_id == "."
            || shard_id == ".."
            || shard_id.contains('/')
            || shard_id.contains('\\');
        if traversal {
            return Err(StoreError::InvalidShardId(shard_id.to_string()));
        }
        Ok(self.root.join(shard_id))
    }

    /// Store a shard, overwriting any previous shard with the same id.
    pub fn put(&self, shard_id: &str, data: &[u8]) -> Result<(), StoreError> {
        let path = self.shard_path(shard_id)?;
        fs::write(&path, data)?;
        debug!(shard_id, size = data.len(), "shard stored");
        Ok(())
    }

    /// Retrieve a shard's bytes.
    pub fn get(&self, shard_id: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.shard_path(shard_id)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(shard_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a shard is present.
    pub fn exists(&self, shard_id: &str) -> bool {
        self.shard_path(shard_id)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    /// Delete a shard. Absent shards report [`StoreError::NotFound`].
    pub fn delete(&self, shard_id: &str) -> Result<(), StoreError> {
        let path = self.shard_path(shard_id)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!(shard_id, "shard deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(shard_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// List all stored shard ids.
    pub fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if entry.path().is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    ids.push(name.to_string());
                }
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn put_and_get() {
        let dir = tempdir().unwrap();
        let store = ShardStore::open(dir.path()).unwrap();

        store.put("report.pdf_shard_0", b"shard bytes").unwrap();
        assert_eq!(store.get("report.pdf_shard_0").unwrap(), b"shard bytes");
    }

    #[test]
    fn get_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let store = ShardStore::open(dir.path()).unwrap();

        assert!(matches!(
            store.get("absent_shard_0"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn put_overwrites() {
        let dir = tempdir().unwrap();
        let store = ShardStore::open(dir.path()).unwrap();

        store.put("f_shard_1", b"old").unwrap();
        store.put("f_shard_1", b"new").unwrap();
        assert_eq!(store.get("f_shard_1").unwrap(), b"new");
    }

    #[test]
    fn delete_then_delete_again() {
        let dir = tempdir().unwrap();
        let store = ShardStore::open(dir.path()).unwrap();

        store.put("f_shard_2", b"bytes").unwrap();
        store.delete("f_shard_2").unwrap();
        assert!(matches!(
            store.delete("f_shard_2"),
            Err(StoreError::NotFound(_))
        ));
        assert!(!store.exists("f_shard_2"));
    }

    #[test]
    fn traversal_ids_rejected() {
        let dir = tempdir().unwrap();
        let store = ShardStore::open(dir.path()).unwrap();

        for id in ["", ".", "..", "../escape", "a/b", "a\\b"] {
            assert!(
                matches!(store.put(id, b"x"), Err(StoreError::InvalidShardId(_))),
                "id {id:?} should be rejected"
            );
        }
    }

    #[test]
    fn list_returns_stored_ids() {
        let dir = tempdir().unwrap();
        let store = ShardStore::open(dir.path()).unwrap();

        store.put("a_shard_0", b"1").unwrap();
        store.put("b_shard_1", b"2").unwrap();

        let mut ids = store.list().unwrap();
        ids.sort();
        assert_eq!(ids, vec!["a_shard_0", "b_shard_1"]);
    }
}
