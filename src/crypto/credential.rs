use std::fmt;

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use md5::{Digest, Md5};
use subtle::ConstantTimeEq;
use tracing::debug;

use super::CipherError;

/// Pre-shared key length (AES-256).
pub const KEY_LENGTH: usize = 32;

/// GCM nonce length.
pub const NONCE_LENGTH: usize = 12;

/// Password hash length (MD5 digest).
pub const HASH_LENGTH: usize = 16;

/// Timestamp length (big-endian `i64` epoch millis).
const TIMESTAMP_LENGTH: usize = 8;

/// Plaintext length: hash followed by timestamp.
const PLAINTEXT_LENGTH: usize = HASH_LENGTH + TIMESTAMP_LENGTH;

/// GCM authentication tag length (128 bits).
const TAG_LENGTH: usize = 16;

/// Accepted clock skew between encryption and verification.
pub const FRESHNESS_WINDOW_MS: i64 = 5 * 60 * 1000;

/// Hash a password the way it is carried inside a credential blob.
pub fn password_hash(password: &str) -> [u8; HASH_LENGTH] {
    Md5::digest(password.as_bytes()).into()
}

/// Whether `timestamp` lies within the freshness window of `now` (both epoch millis).
pub fn is_fresh_at(timestamp: i64, now: i64) -> bool {
    now.abs_diff(timestamp) < FRESHNESS_WINDOW_MS.unsigned_abs()
}

/// Whether `timestamp` lies within the freshness window of the current time.
pub fn is_fresh(timestamp: i64) -> bool {
    is_fresh_at(timestamp, Utc::now().timestamp_millis())
}

/// Result of a successful decryption.
///
/// `fresh` is advisory. Replay-window enforcement is the caller's decision.
#[derive(Clone, PartialEq, Eq)]
pub struct DecryptedCredential {
    pub password_hash: [u8; HASH_LENGTH],
    pub timestamp: i64,
    pub fresh: bool,
}

impl DecryptedCredential {
    /// Constant-time check of the decrypted hash against a candidate password.
    pub fn matches_password(&self, password: &str) -> bool {
        self.password_hash.ct_eq(&password_hash(password)).into()
    }
}

impl fmt::Debug for DecryptedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecryptedCredential")
            .field("password_hash", &"<redacted>")
            .field("timestamp", &self.timestamp)
            .field("fresh", &self.fresh)
            .finish()
    }
}

/// AES-256-GCM cipher for credential blobs, keyed once at startup.
///
/// Stateless after construction and safe to share across tasks.
#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialCipher { .. }")
    }
}

impl CredentialCipher {
    /// Build a cipher from the raw pre-shared key.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::InvalidKey` unless `key` is exactly 32 bytes.
    pub fn new(key: &[u8]) -> Result<Self, CipherError> {
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CipherError::InvalidKey {
            expected: KEY_LENGTH,
            actual: key.len(),
        })?;
        Ok(Self { cipher })
    }

    /// Encrypt `password` with the client `timestamp` (epoch millis).
    ///
    /// A fresh random nonce is drawn from the OS on every call.
    pub fn encrypt(&self, password: &str, timestamp: i64) -> Result<String, CipherError> {
        let mut plaintext = [0u8; PLAINTEXT_LENGTH];
        let (hash, ts) = plaintext.split_at_mut(HASH_LENGTH);
        hash.copy_from_slice(&password_hash(password));
        ts.copy_from_slice(&timestamp.to_be_bytes());

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|_| CipherError::Encrypt)?;

        let mut blob = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(STANDARD.encode(blob))
    }

    /// Decrypt and authenticate a credential blob.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::Integrity` for any malformed, truncated,
    /// tampered or foreign-key blob.
    pub fn decrypt(&self, blob: &str) -> Result<DecryptedCredential, CipherError> {
        let bytes = STANDARD.decode(blob.trim()).map_err(|e| {
            debug!(error = %e, "Credential blob is not valid base64");
            CipherError::Integrity
        })?;

        if bytes.len() < NONCE_LENGTH + TAG_LENGTH {
            return Err(CipherError::Integrity);
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_LENGTH);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CipherError::Integrity)?;

        let plaintext: [u8; PLAINTEXT_LENGTH] =
            plaintext.try_into().map_err(|_| CipherError::Integrity)?;
        let (hash, ts) = plaintext.split_at(HASH_LENGTH);

        let password_hash: [u8; HASH_LENGTH] =
            hash.try_into().map_err(|_| CipherError::Integrity)?;
        let timestamp = i64::from_be_bytes(ts.try_into().map_err(|_| CipherError::Integrity)?);

        Ok(DecryptedCredential {
            password_hash,
            timestamp,
            fresh: is_fresh(timestamp),
        })
    }
}
