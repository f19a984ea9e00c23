//! Backup encryption and content hashing.
//!
//! Backups are sealed with ChaCha20-Poly1305 under a 256-bit key derived from
//! an operator secret with PBKDF2-HMAC-SHA256. Each blob is self-contained:
//!
//! ```text
//! nonce (12 B) || ciphertext || tag (16 B)
//! ```
//!
//! A fresh random nonce is drawn for every encryption, so sealing the same
//! plaintext twice yields different blobs.

use std::fmt;

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{IntegrityFailure, SafekeepError};

/// Key size in bytes (256-bit).
pub const KEY_SIZE: usize = 32;
/// Nonce size in bytes (96-bit).
pub const NONCE_SIZE: usize = 12;
/// Poly1305 tag size in bytes.
pub const TAG_SIZE: usize = 16;
/// Lowest PBKDF2 iteration count accepted for key derivation.
pub const MIN_ITERATIONS: u32 = 100_000;
/// Salt used when the configuration does not name one.
pub const DEFAULT_SALT: &[u8] = b"safekeep-backup-salt";

/// A derived 256-bit encryption key. Debug output never shows the bytes.
#[derive(Clone)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl EncryptionKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        EncryptionKey(bytes)
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey([redacted])")
    }
}

/// Derive a key with PBKDF2-HMAC-SHA256 at [`MIN_ITERATIONS`].
///
/// Same secret and salt always give the same key.
pub fn derive_key(secret: &[u8], salt: &[u8]) -> EncryptionKey {
    derive_key_with_iterations(secret, salt, MIN_ITERATIONS)
}

/// Derive a key with an explicit iteration count. Counts below
/// [`MIN_ITERATIONS`] are raised to it.
pub fn derive_key_with_iterations(secret: &[u8], salt: &[u8], iterations: u32) -> EncryptionKey {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(secret, salt, iterations.max(MIN_ITERATIONS), &mut key);
    EncryptionKey(key)
}

/// Lowercase hex SHA-256 of `data`.
pub fn content_hash(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Seals and opens backup blobs under one key.
pub struct BackupCipher {
    cipher: ChaCha20Poly1305,
}

impl BackupCipher {
    pub fn new(key: &EncryptionKey) -> Self {
        BackupCipher {
            cipher: ChaCha20Poly1305::new((&key.0).into()),
        }
    }

    /// Derive a key from `secret` and `salt` and build a cipher over it.
    pub fn from_secret(secret: &[u8], salt: &[u8], iterations: u32) -> Self {
        BackupCipher::new(&derive_key_with_iterations(secret, salt, iterations))
    }

    /// Encrypt `plaintext` under a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, SafekeepError> {
        let mut nonce = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce);
        let ct = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| SafekeepError::Encryption)?;
        let mut out = Vec::with_capacity(NONCE_SIZE + ct.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ct);
        Ok(out)
    }

    /// Open a blob produced by [`BackupCipher::encrypt`].
    ///
    /// Fails with an integrity error when the blob is too short to hold a
    /// nonce and tag, or when authentication fails.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, SafekeepError> {
        let min = NONCE_SIZE + TAG_SIZE;
        if blob.len() < min {
            return Err(SafekeepError::integrity(
                "encrypted blob",
                IntegrityFailure::Truncated {
                    len: blob.len(),
                    min,
                },
            ));
        }
        let (nonce, ct) = blob.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ct)
            .map_err(|_| {
                SafekeepError::integrity("encrypted blob", IntegrityFailure::AuthenticationFailed)
            })
    }
}

impl fmt::Debug for BackupCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BackupCipher(ChaCha20-Poly1305)")
    }
}
