//! Metadata vault - envelope encryption for manifests
//!
//! Manifests carry per-file encryption keys, so they are never written to
//! disk in the clear. The vault seals the JSON encoding of a manifest under
//! the process-wide master key and reverses the operation on load. Legacy
//! plaintext manifests are not accepted.

use std::env;
use std::sync::Arc;

use thiserror::Error;

use crate::manifest::Manifest;

/// Environment variable holding the master key (32-byte urlsafe-base64
/// Fernet key). Absence is a fatal start-up error.
pub const MASTER_KEY_ENV: &str = "MASTER_VAULT_KEY";

#[derive(Error, Debug)]
pub enum VaultError {
    #[error("{MASTER_KEY_ENV} is missing or not a valid Fernet key")]
    NoMasterKey,
    #[error("sealed manifest failed authentication - wrong master key or corrupted file")]
    Tampered,
    #[error("unsealed manifest does not match the manifest schema: {0}")]
    Schema(#[from] serde_json::Error),
}

/// Seals and unseals manifests under the master key.
///
/// The master key is held in memory for the process lifetime and never
/// persisted or transmitted.
#[derive(Clone)]
pub struct Vault {
    cipher: Arc<fernet::Fernet>,
}

impl Vault {
    /// Build a vault from an encoded master key.
    pub fn new(master_key: &str) -> Result<Self, VaultError> {
        let cipher = fernet::Fernet::new(master_key).ok_or(VaultError::NoMasterKey)?;
        Ok(Self {
            cipher: Arc::new(cipher),
        })
    }

    /// Load the master key from [`MASTER_KEY_ENV`]. Fails fast when the
    /// variable is absent or malformed; there is no generated-key fallback.
    pub fn from_env() -> Result<Self, VaultError> {
        let key = env::var(MASTER_KEY_ENV).map_err(|_| VaultError::NoMasterKey)?;
        Self::new(&key)
    }

    /// Generate a fresh master key (operator bootstrap helper).
    pub fn generate_master_key() -> String {
        fernet::Fernet::generate_key()
    }

    /// JSON-encode and authenticated-encrypt a manifest.
    pub fn seal(&self, manifest: &Manifest) -> Result<Vec<u8>, VaultError> {
        let plaintext = manifest.to_bytes()?;
        Ok(self.cipher.encrypt(&plaintext).into_bytes())
    }

    /// Authenticated-decrypt and parse sealed manifest bytes.
    pub fn unseal(&self, sealed: &[u8]) -> Result<Manifest, VaultError> {
        let token = std::str::from_utf8(sealed).map_err(|_| VaultError::Tampered)?;
        let plaintext = self
            .cipher
            .decrypt(token)
            .map_err(|_| VaultError::Tampered)?;
        Ok(Manifest::from_bytes(&plaintext)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_manifest() -> Manifest {
        Manifest {
            filename: "notes.txt".to_string(),
            file_hash: "cd".repeat(32),
            file_size: 11,
            encryption_key: fernet::Fernet::generate_key(),
            k_required: 3,
            m_total: 5,
            shard_metadata: (0..5).map(|i| (i, format!("{i:064x}"))).collect(),
            upload_date: Utc::now(),
            shard_locations: (0..5)
                .map(|i| (i, format!("http://127.0.0.1:800{}", i + 1)))
                .collect(),
        }
    }

    #[test]
    fn seal_unseal_roundtrip() {
        let vault = Vault::new(&Vault::generate_master_key()).unwrap();
        let manifest = sample_manifest();

        let sealed = vault.seal(&manifest).unwrap();
        let unsealed = vault.unseal(&sealed).unwrap();
        assert_eq!(manifest, unsealed);
    }

    #[test]
    fn sealed_bytes_reveal_nothing() {
        let vault = Vault::new(&Vault::generate_master_key()).unwrap();
        let manifest = sample_manifest();
        let sealed = vault.seal(&manifest).unwrap();

        let sealed_text = String::from_utf8_lossy(&sealed);
        assert!(!sealed_text.contains(&manifest.encryption_key));
        assert!(!sealed_text.contains("notes.txt"));
        assert!(!sealed_text.contains("filename"));
    }

    #[test]
    fn wrong_master_key_is_tampered() {
        let sealing = Vault::new(&Vault::generate_master_key()).unwrap();
        let opening = Vault::new(&Vault::generate_master_key()).unwrap();

        let sealed = sealing.seal(&sample_manifest()).unwrap();
        assert!(matches!(opening.unseal(&sealed), Err(VaultError::Tampered)));
    }

    #[test]
    fn plaintext_manifest_is_rejected() {
        let vault = Vault::new(&Vault::generate_master_key()).unwrap();
        let plaintext = sample_manifest().to_bytes().unwrap();
        assert!(matches!(vault.unseal(&plaintext), Err(VaultError::Tampered)));
    }

    #[test]
    fn schema_mismatch_is_reported() {
        let vault = Vault::new(&Vault::generate_master_key()).unwrap();
        // authentic token, but the payload is not a manifest
        let sealed = vault.cipher.encrypt(b"{\"not\": \"a manifest\"}");
        assert!(matches!(
            vault.unseal(sealed.as_bytes()),
            Err(VaultError::Schema(_))
        ));
    }

    #[test]
    fn invalid_master_key_rejected() {
        assert!(matches!(
            Vault::new("definitely not base64!"),
            Err(VaultError::NoMasterKey)
        ));
    }
}
