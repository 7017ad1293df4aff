//! Error types for the Signpost core library.
//!
//! Caller-facing messages stay coarse; internal detail (store/codec error
//! text) is logged server-side at the point of failure.

use thiserror::Error;

use crate::store::StoreError;

/// Result type alias using the signup error taxonomy.
pub type Result<T> = std::result::Result<T, SignupError>;

/// Caller-facing errors from the signup workflow.
#[derive(Debug, Error)]
pub enum SignupError {
    /// Malformed input: empty/invalid email, empty activation code.
    #[error("bad request")]
    BadRequest,

    /// No registration exists for the presented activation code.
    #[error("activation code not found")]
    ActivationCodeNotFound,

    /// A token's activation id no longer resolves to a stored record.
    #[error("activation not found")]
    ActivationNotFound,

    /// Signature, structure, or expiry check failed.
    #[error("invalid token")]
    TokenInvalid,

    /// The backing store failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Catch-all for internal failures, including mail-send failure
    /// during registration.
    #[error("internal server error")]
    Internal,
}
