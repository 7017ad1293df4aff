//! Signed-claims token codec.
//!
//! Tokens are compact JWTs signed with the deployment's Ed25519 keypair
//! (EdDSA). Every token carries `iat`/`exp` and the verifier enforces the
//! expiry as a hard boundary. Verification here is purely cryptographic
//! plus time-window checking; record-existence checks are layered on top
//! by the signup workflow.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;
use crate::keypair::TokenKeyPair;

/// Default maximum token validity window: one year.
pub const TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Claims embedded in every issued token.
///
/// `activation_id` is the revocation handle: deleting the matching
/// activation record invalidates the token even before `exp` is reached.
/// Unknown fields are ignored on decode so older verifiers keep working
/// when new claims are added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenClaims {
    /// Activation code of the registration this token descends from.
    #[serde(rename = "activationCode")]
    pub activation_code: String,

    /// Identifier of the activation event that minted this token.
    #[serde(rename = "activationID")]
    pub activation_id: String,

    /// When the claims were built (Unix timestamp, milliseconds).
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

/// Wire shape of the signed payload: domain claims plus the registered
/// `iat`/`exp` claims the verifier checks.
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    #[serde(flatten)]
    claims: TokenClaims,
    iat: u64,
    exp: u64,
}

/// Signs and verifies claims tokens for one keypair.
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
}

impl TokenCodec {
    /// Build a codec over the given keypair.
    ///
    /// `ttl_secs` is stamped into every signed token as `exp - iat`.
    pub fn new(pair: &TokenKeyPair, ttl_secs: u64) -> Result<Self, CryptoError> {
        let der = pair.to_pkcs8_der()?;
        let mut validation = Validation::new(Algorithm::EdDSA);
        // Expiry is a hard boundary, no clock-skew grace.
        validation.leeway = 0;
        Ok(Self {
            encoding_key: EncodingKey::from_ed_der(&der),
            decoding_key: DecodingKey::from_ed_der(&pair.public_bytes()),
            validation,
            ttl_secs,
        })
    }

    /// Sign claims into a compact token string.
    pub fn sign(&self, claims: &TokenClaims) -> Result<String, CryptoError> {
        self.sign_with_issued_at(claims, unix_timestamp_secs())
    }

    fn sign_with_issued_at(&self, claims: &TokenClaims, iat: u64) -> Result<String, CryptoError> {
        let wire = WireClaims {
            claims: claims.clone(),
            iat,
            exp: iat.saturating_add(self.ttl_secs),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::EdDSA), &wire, &self.encoding_key)
            .map_err(|e| CryptoError::Signing(e.to_string()))
    }

    /// Verify a token string and return its embedded claims.
    ///
    /// Fails with [`CryptoError::TokenInvalid`] on malformed input, a bad
    /// signature, or an expired token.
    pub fn verify(&self, token: &str) -> Result<TokenClaims, CryptoError> {
        jsonwebtoken::decode::<WireClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims.claims)
            .map_err(|e| CryptoError::TokenInvalid(e.to_string()))
    }
}

fn unix_timestamp_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
