//! Per-file encryption keys
//!
//! Each upload gets a freshly generated Fernet key (32 bytes, urlsafe
//! base64). The key lives in memory for the duration of the upload, is
//! persisted only inside the sealed manifest, and is zeroed on drop.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// A per-file Fernet key.
///
/// Never reused across uploads; the encoded form is what lands (sealed) in
/// the manifest.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FileKey(String);

impl FileKey {
    /// Generate a fresh key from the OS RNG.
    pub fn generate() -> Self {
        Self(fernet::Fernet::generate_key())
    }

    /// Wrap a key recovered from a manifest.
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// The urlsafe-base64 encoding stored in the manifest.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of logs and panic messages.
        f.write_str("FileKey(..)")
    }
}
