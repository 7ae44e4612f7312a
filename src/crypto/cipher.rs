//! Authenticated encryption using the Fernet construction
//!
//! Token layout: version (0x80) || timestamp || IV || AES-128-CBC body ||
//! HMAC-SHA-256 tag, the whole envelope urlsafe-base64 encoded. Tokens are
//! therefore ASCII and never contain a zero byte, which the erasure layer
//! relies on when inverting its padding.

use thiserror::Error;

use super::keys::FileKey;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CipherError {
    #[error("invalid encryption key")]
    InvalidKey,
    #[error("decryption failed - ciphertext corrupted or key incorrect")]
    DecryptionFailed,
}

/// Encrypt `plaintext` under `key`, returning the token bytes.
pub fn encrypt(key: &FileKey, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
    let fernet = fernet::Fernet::new(key.expose()).ok_or(CipherError::InvalidKey)?;
    Ok(fernet.encrypt(plaintext).into_bytes())
}

/// Decrypt a token produced by [`encrypt`]. Authentication failure, token
/// corruption, and non-UTF-8 input all collapse to `DecryptionFailed`.
pub fn decrypt(key: &FileKey, token: &[u8]) -> Result<Vec<u8>, CipherError> {
    let fernet = fernet::Fernet::new(key.expose()).ok_or(CipherError::InvalidKey)?;
    let token = std::str::from_utf8(token).map_err(|_| CipherError::DecryptionFailed)?;
    fernet.decrypt(token).map_err(|_| CipherError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = FileKey::generate();
        let plaintext = b"Hello, World!";

        let token = encrypt(&key, plaintext).unwrap();
        let decrypted = decrypt(&key, &token).unwrap();

        assert_eq!(plaintext.as_slice(), decrypted.as_slice());
    }

    #[test]
    fn token_is_ascii_without_nul() {
        let key = FileKey::generate();
        let token = encrypt(&key, &[0u8; 64]).unwrap();
        assert!(token.is_ascii());
        assert!(!token.contains(&0));
    }

    #[test]
    fn wrong_key_fails() {
        let token = encrypt(&FileKey::generate(), b"secret").unwrap();
        let result = decrypt(&FileKey::generate(), &token);
        assert_eq!(result, Err(CipherError::DecryptionFailed));
    }

    #[test]
    fn corrupted_token_fails() {
        let key = FileKey::generate();
        let mut token = encrypt(&key, b"secret").unwrap();
        let last = token.len() - 1;
        token[last] ^= 0x01;
        assert_eq!(decrypt(&key, &token), Err(CipherError::DecryptionFailed));
    }

    #[test]
    fn ciphertext_differs_from_plaintext() {
        let key = FileKey::generate();
        let plaintext = b"ordering proof";
        let token = encrypt(&key, plaintext).unwrap();
        assert_ne!(
            crate::crypto::hashing::sha256_hex(&token),
            crate::crypto::hashing::sha256_hex(plaintext)
        );
    }
}
