//! Domain records and request types for the signup workflow.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use signpost_crypto::TokenClaims;
use uuid::Uuid;

/// Current Unix timestamp in milliseconds.
pub fn unix_timestamp_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Per-request context supplied by the transport layer (out of scope here).
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Caller's remote IP, recorded into the registration and activation
    /// records. Empty when the transport provides none.
    pub remote_ip: String,
}

/// Inbound registration request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
}

impl RegisterRequest {
    /// Syntactic email check: non-empty, exactly one `@`, non-empty local
    /// and domain parts, no whitespace.
    pub fn is_valid(&self) -> bool {
        is_valid_email(&self.email)
    }

    /// Build the registration record, generating its activation code.
    pub fn into_record(self, remote_ip: &str) -> RegistrationRecord {
        RegistrationRecord {
            activation_code: Uuid::new_v4().to_string(),
            email: self.email,
            name: self.name,
            remote_ip: remote_ip.to_string(),
            created_at: unix_timestamp_millis(),
            activations: Vec::new(),
        }
    }
}

fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.contains(char::is_whitespace) {
        return false;
    }
    let mut parts = email.splitn(2, '@');
    match (parts.next(), parts.next()) {
        (Some(local), Some(domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        }
        _ => false,
    }
}

/// One registration, keyed by its activation code.
///
/// Mutated only by appending activation ids; never deleted. The activation
/// code is the credential mailed to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationRecord {
    pub activation_code: String,
    pub email: String,
    pub name: String,
    pub remote_ip: String,
    pub created_at: i64,
    /// Ordered ids of every activation minted from this registration.
    pub activations: Vec<String>,
}

/// Inbound activation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivateRequest {
    pub activation_code: String,
}

impl ActivateRequest {
    pub fn is_valid(&self) -> bool {
        !self.activation_code.is_empty()
    }

    /// Build the activation record, generating its id. The token is filled
    /// in after signing.
    pub fn to_record(&self, remote_ip: &str) -> ActivationRecord {
        ActivationRecord {
            id: Uuid::new_v4().to_string(),
            activation_code: self.activation_code.clone(),
            token: String::new(),
            remote_ip: remote_ip.to_string(),
            created_at: unix_timestamp_millis(),
        }
    }
}

/// One completed activation event, keyed by id. Immutable after creation;
/// deleting it revokes the token it carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRecord {
    pub id: String,
    pub activation_code: String,
    pub token: String,
    pub remote_ip: String,
    pub created_at: i64,
}

impl ActivationRecord {
    /// Claims to embed in this activation's token.
    pub fn to_claims(&self) -> TokenClaims {
        TokenClaims {
            activation_code: self.activation_code.clone(),
            activation_id: self.id.clone(),
            created_at: unix_timestamp_millis(),
        }
    }
}

/// Inbound verification request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifyRequest {
    pub token: String,
}
