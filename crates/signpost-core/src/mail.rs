//! Outbound mail contract and message templates.
//!
//! Delivery itself is an external collaborator behind the [`Mailer`]
//! trait; this module only builds the two messages the workflow sends.

use async_trait::async_trait;
use thiserror::Error;

use crate::config::SignupConfig;

/// A fully rendered outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Errors from mail construction and delivery.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("no source mail address configured")]
    NoSourceAddress,

    #[error("mail send failed: {0}")]
    Send(String),
}

/// Contract for the outbound mail collaborator.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Build the activation mail carrying the user's activation code.
pub fn activation_mail(
    config: &SignupConfig,
    to: &str,
    name: &str,
    activation_code: &str,
) -> Result<MailMessage, MailError> {
    let from = source_mail(config)?;
    Ok(MailMessage {
        from,
        to: to.to_string(),
        subject: "Activation".to_string(),
        text_body: format!(
            "Hi {name},\n\nYour activation code is: {activation_code}.\n\nThe {} Team\n",
            config.app_name
        ),
        html_body: String::new(),
    })
}

/// Build the welcome mail sent after a successful activation.
pub fn welcome_mail(config: &SignupConfig, to: &str, name: &str) -> Result<MailMessage, MailError> {
    let from = source_mail(config)?;
    Ok(MailMessage {
        from,
        to: to.to_string(),
        subject: "Welcome".to_string(),
        text_body: format!(
            "Hi {name},\n\nWelcome to {app}, we are excited to have you in our early beta program!\n\nHave fun!\n{app} Team\n",
            app = config.app_name
        ),
        html_body: String::new(),
    })
}

fn source_mail(config: &SignupConfig) -> Result<String, MailError> {
    config
        .source_mail
        .clone()
        .filter(|s| !s.is_empty())
        .ok_or(MailError::NoSourceAddress)
}
