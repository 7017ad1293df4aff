//! Crypto error types.

/// Errors from key handling and token operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("Failed to decode stored key: {0}")]
    KeyDecode(String),

    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Invalid token: {0}")]
    TokenInvalid(String),
}
