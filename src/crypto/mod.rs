//! Cryptography module
//!
//! Provides per-file key generation, authenticated encryption (Fernet), and
//! SHA-256 integrity tagging.

pub mod cipher;
pub mod hashing;
pub mod keys;

pub use cipher::{decrypt, encrypt, CipherError};
pub use hashing::{sha256_hex, verify_tag};
pub use keys::FileKey;
