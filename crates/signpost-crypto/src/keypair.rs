//! Token signing keypair management.
//!
//! Each deployment has exactly one long-lived Ed25519 keypair used to sign
//! and verify activation tokens. The pair is persisted in the backing store
//! as base64url strings, so encoding/decoding lives here next to the key
//! material itself.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::error::CryptoError;

/// Length of an Ed25519 seed and of a compressed public key, in bytes.
pub const KEY_LENGTH: usize = 32;

/// An Ed25519 keypair used for token signing.
pub struct TokenKeyPair {
    signing: SigningKey,
}

impl std::fmt::Debug for TokenKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeyPair")
            .field("public", &URL_SAFE_NO_PAD.encode(self.public_bytes()))
            .field("private", &"[REDACTED]")
            .finish()
    }
}

/// A keypair encoded for persistence, both halves base64url (no padding).
///
/// This is the record written under the fixed key in the keys partition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncodedKeyPair {
    pub public: String,
    pub private: String,
}

impl TokenKeyPair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        Self { signing }
    }

    /// Reconstruct from raw 32-byte seed bytes.
    pub fn from_seed_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_LENGTH {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_LENGTH,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; KEY_LENGTH];
        arr.copy_from_slice(bytes);
        let signing = SigningKey::from_bytes(&arr);
        arr.zeroize();
        Ok(Self { signing })
    }

    /// Get the public key as raw bytes.
    pub fn public_bytes(&self) -> [u8; KEY_LENGTH] {
        self.signing.verifying_key().to_bytes()
    }

    /// Get the seed as raw bytes. Handle with care.
    pub fn seed_bytes(&self) -> [u8; KEY_LENGTH] {
        self.signing.to_bytes()
    }

    /// Get the verifying half.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing.verifying_key()
    }

    /// Encode both halves for persistence.
    pub fn to_encoded(&self) -> EncodedKeyPair {
        let mut seed = self.seed_bytes();
        let encoded = EncodedKeyPair {
            public: URL_SAFE_NO_PAD.encode(self.public_bytes()),
            private: URL_SAFE_NO_PAD.encode(seed),
        };
        seed.zeroize();
        encoded
    }

    /// Decode a persisted keypair.
    ///
    /// The public half must match the one derived from the seed; a mismatch
    /// means the stored record was corrupted or tampered with.
    pub fn from_encoded(encoded: &EncodedKeyPair) -> Result<Self, CryptoError> {
        let mut seed = URL_SAFE_NO_PAD
            .decode(&encoded.private)
            .map_err(|e| CryptoError::KeyDecode(format!("private half: {e}")))?;
        let pair = Self::from_seed_bytes(&seed);
        seed.zeroize();
        let pair = pair?;

        let public = URL_SAFE_NO_PAD
            .decode(&encoded.public)
            .map_err(|e| CryptoError::KeyDecode(format!("public half: {e}")))?;
        if public != pair.public_bytes() {
            return Err(CryptoError::KeyDecode(
                "public half does not match seed".to_string(),
            ));
        }
        Ok(pair)
    }

    /// Export the signing half as a PKCS#8 v2 DER document.
    ///
    /// `jsonwebtoken` expects this format for its EdDSA encoding key.
    pub fn to_pkcs8_der(&self) -> Result<Vec<u8>, CryptoError> {
        use ed25519_dalek::pkcs8::EncodePrivateKey;
        let doc = self
            .signing
            .to_pkcs8_der()
            .map_err(|e| CryptoError::Signing(format!("pkcs8 export: {e}")))?;
        Ok(doc.as_bytes().to_vec())
    }
}
