//! Runtime configuration for the signup service.

use serde::{Deserialize, Serialize};
use signpost_crypto::TOKEN_TTL_SECS;

/// Signup service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignupConfig {
    /// Application name interpolated into mail bodies.
    pub app_name: String,
    /// Source address for outbound mail. Mail sending fails without it.
    pub source_mail: Option<String>,
    /// Token validity window in seconds.
    pub token_ttl_secs: u64,
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self {
            app_name: "Signpost".to_string(),
            source_mail: None,
            token_ttl_secs: TOKEN_TTL_SECS,
        }
    }
}

impl SignupConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(val) = std::env::var("SIGNPOST_APP_NAME") {
            config.app_name = val;
        }
        if let Ok(val) = std::env::var("SIGNPOST_SOURCE_MAIL") {
            config.source_mail = Some(val);
        }
        if let Ok(val) = std::env::var("SIGNPOST_TOKEN_TTL_SECS") {
            if let Ok(n) = val.parse() {
                config.token_ttl_secs = n;
            }
        }
        config
    }
}
