//! Signpost Core Library
//!
//! Registration-activation-authentication workflow:
//! - Record types and the partitioned key-value store contract
//! - Signing-key provisioning over the store
//! - Mail contract and message templates
//! - The `Signup` workflow (register, activate, verify)
//! - Configuration and tracing setup

pub mod config;
pub mod error;
pub mod keys;
pub mod mail;
pub mod records;
pub mod signup;
pub mod store;
pub mod tracing_init;

pub use config::SignupConfig;
pub use error::{Result, SignupError};
pub use mail::{MailError, MailMessage, Mailer};
pub use records::{
    ActivateRequest, ActivationRecord, RegisterRequest, RegistrationRecord, RequestContext,
    VerifyRequest,
};
pub use signup::Signup;
pub use store::{KeyValueStore, MemoryStore, Partition, StoreError};
