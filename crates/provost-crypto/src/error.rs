//! Crypto error types.

/// Errors from credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// The recoverable form could not be decrypted. Indicates a tampered
    /// value or a misconfigured vault key; fatal to the single operation.
    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}
