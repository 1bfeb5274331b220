//! Credential transport encryption.
//!
//! Clients submit passwords as an opaque base64 blob instead of plaintext:
//!
//! ```text
//! blob      = base64( nonce[12] ‖ AES-256-GCM( md5(password)[16] ‖ timestamp_be[8] ) ‖ tag[16] )
//! ```
//!
//! The verifier decrypts the blob with the pre-shared key and gets back the
//! password hash and the client timestamp, plus a freshness flag the caller
//! uses to reject replays outside the ±5 minute window.

mod credential;

pub use credential::{
    CredentialCipher, DecryptedCredential, FRESHNESS_WINDOW_MS, HASH_LENGTH, KEY_LENGTH,
    NONCE_LENGTH, is_fresh, is_fresh_at, password_hash,
};

use thiserror::Error;

/// Errors from the credential cipher.
///
/// Decryption failures are deliberately opaque: a bad encoding, a truncated
/// blob, a wrong key and a tampered ciphertext all produce [`CipherError::Integrity`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("Invalid credential key: expected {expected} bytes, got {actual}")]
    InvalidKey { expected: usize, actual: usize },

    #[error("Credential blob failed integrity verification")]
    Integrity,

    #[error("Credential encryption failed")]
    Encrypt,
}
