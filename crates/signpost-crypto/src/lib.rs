//! Signpost token cryptography.
//!
//! Provides the signing-key and token primitives for the signup service:
//!
//! - **Keypair**: one Ed25519 keypair per deployment, persisted
//!   base64url-encoded in the backing store
//! - **Codec**: compact JWT claims tokens (EdDSA) with a hard expiry
//!   window stamped into every token

pub mod error;
pub mod keypair;
pub mod token;

pub use error::CryptoError;
pub use keypair::{EncodedKeyPair, KEY_LENGTH, TokenKeyPair};
pub use token::{TOKEN_TTL_SECS, TokenClaims, TokenCodec};
