//! Registration, activation, and verification workflow.
//!
//! One registration can be activated many times (multi-device or repeat
//! activation from a single invite code); each activation mints an
//! independent record and token. Possession of the activation code is the
//! single authorization check.

use signpost_crypto::{TokenClaims, TokenCodec};
use tokio::sync::OnceCell;
use tracing::{error, info, warn};

use crate::config::SignupConfig;
use crate::error::SignupError;
use crate::keys;
use crate::mail::{self, Mailer};
use crate::records::{
    ActivateRequest, ActivationRecord, RegisterRequest, RegistrationRecord, RequestContext,
    VerifyRequest,
};
use crate::store::{KeyValueStore, Partition};

/// Attempts at the conditional activations append before falling back to a
/// plain overwrite.
const MAX_APPEND_RETRIES: usize = 5;

/// Signup workflow over a store and mailer collaborator.
pub struct Signup<S, M> {
    store: S,
    mailer: M,
    config: SignupConfig,
    codec: OnceCell<TokenCodec>,
}

impl<S: KeyValueStore, M: Mailer> Signup<S, M> {
    pub fn new(store: S, mailer: M, config: SignupConfig) -> Self {
        Self {
            store,
            mailer,
            config,
            codec: OnceCell::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn mailer(&self) -> &M {
        &self.mailer
    }

    /// Register a new user and mail them their activation code.
    ///
    /// The registration record is durable even when the mail fails; the
    /// user can be re-notified out of band.
    pub async fn register(
        &self,
        ctx: &RequestContext,
        request: RegisterRequest,
    ) -> Result<(), SignupError> {
        let record = self.register_record(ctx, request).await?;
        let message = mail::activation_mail(
            &self.config,
            &record.email,
            &record.name,
            &record.activation_code,
        )
        .map_err(|e| {
            error!(error = %e, "failed to build activation mail");
            SignupError::Internal
        })?;
        self.mailer.send(&message).await.map_err(|e| {
            error!(error = %e, "failed to send activation mail");
            SignupError::Internal
        })?;
        Ok(())
    }

    async fn register_record(
        &self,
        ctx: &RequestContext,
        request: RegisterRequest,
    ) -> Result<RegistrationRecord, SignupError> {
        if !request.is_valid() {
            return Err(SignupError::BadRequest);
        }
        let record = request.into_record(&ctx.remote_ip);
        self.store
            .put(Partition::Registrations, &record.activation_code, &record)
            .await?;
        info!(activation_code = %record.activation_code, "registration created");
        Ok(record)
    }

    /// Exchange an activation code for a signed bearer token.
    pub async fn activate(
        &self,
        ctx: &RequestContext,
        request: ActivateRequest,
    ) -> Result<String, SignupError> {
        let (activation, registration) = self.activate_record(ctx, &request).await?;

        // Best effort only; activation success must not depend on mail
        // deliverability.
        match mail::welcome_mail(&self.config, &registration.email, &registration.name) {
            Ok(message) => {
                if let Err(e) = self.mailer.send(&message).await {
                    warn!(error = %e, "failed to send welcome mail");
                }
            }
            Err(e) => warn!(error = %e, "failed to build welcome mail"),
        }
        Ok(activation.token)
    }

    async fn activate_record(
        &self,
        ctx: &RequestContext,
        request: &ActivateRequest,
    ) -> Result<(ActivationRecord, RegistrationRecord), SignupError> {
        if !request.is_valid() {
            return Err(SignupError::BadRequest);
        }

        let registration: RegistrationRecord = self
            .store
            .get(Partition::Registrations, &request.activation_code)
            .await?
            .ok_or_else(|| {
                warn!(activation_code = %request.activation_code, "activation code not found");
                SignupError::ActivationCodeNotFound
            })?;

        let mut activation = request.to_record(&ctx.remote_ip);
        let token = self
            .codec()
            .await?
            .sign(&activation.to_claims())
            .map_err(|e| {
                error!(error = %e, "failed to sign activation token");
                SignupError::Internal
            })?;
        activation.token = token;

        self.store
            .put(Partition::Activations, &activation.id, &activation)
            .await?;
        self.append_activation(registration.clone(), &activation.id)
            .await?;
        info!(activation_id = %activation.id, "activation created");
        Ok((activation, registration))
    }

    /// Append an activation id to the registration's list with a
    /// compare-and-swap retry loop, so concurrent activations of the same
    /// code do not clobber each other's appends.
    async fn append_activation(
        &self,
        registration: RegistrationRecord,
        activation_id: &str,
    ) -> Result<(), SignupError> {
        let code = registration.activation_code.clone();
        let mut current = registration;
        for _ in 0..MAX_APPEND_RETRIES {
            let mut updated = current.clone();
            updated.activations.push(activation_id.to_string());
            if self
                .store
                .compare_and_swap(Partition::Registrations, &code, Some(&current), &updated)
                .await?
            {
                return Ok(());
            }
            current = self.registration(&code).await?;
        }

        // Retries exhausted under heavy contention; keep the activation
        // durable with a last-writer-wins overwrite.
        warn!(activation_code = %code, "activations append fell back to unconditional put");
        let mut updated = current;
        updated.activations.push(activation_id.to_string());
        self.store
            .put(Partition::Registrations, &code, &updated)
            .await?;
        Ok(())
    }

    async fn registration(&self, code: &str) -> Result<RegistrationRecord, SignupError> {
        self.store
            .get(Partition::Registrations, code)
            .await?
            .ok_or(SignupError::ActivationCodeNotFound)
    }

    /// Verify a presented token and return its claims.
    ///
    /// Both validity conditions must pass independently: the signature and
    /// expiry window, and the existence of the activation record (deleting
    /// the record revokes the token).
    pub async fn verify(&self, request: VerifyRequest) -> Result<TokenClaims, SignupError> {
        let token = request.token.trim();
        let claims = self.codec().await?.verify(token).map_err(|e| {
            warn!(error = %e, "token verification failed");
            SignupError::TokenInvalid
        })?;

        let record: Option<ActivationRecord> = self
            .store
            .get(Partition::Activations, &claims.activation_id)
            .await?;
        if record.is_none() {
            warn!(activation_id = %claims.activation_id, "no activation record for token");
            return Err(SignupError::ActivationNotFound);
        }
        Ok(claims)
    }

    /// Codec over the deployment keypair, provisioned lazily on the first
    /// token operation and cached for the lifetime of this instance.
    async fn codec(&self) -> Result<&TokenCodec, SignupError> {
        self.codec
            .get_or_try_init(|| async {
                let pair = keys::get_or_create_key_pair(&self.store).await?;
                TokenCodec::new(&pair, self.config.token_ttl_secs).map_err(|e| {
                    error!(error = %e, "failed to build token codec");
                    SignupError::Internal
                })
            })
            .await
    }
}

#[cfg(test)]
#[allow(clippy::panic, clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::mail::{MailError, MailMessage};
    use crate::store::MemoryStore;

    /// Mailer double that records every message and can be told to fail
    /// for specific subjects.
    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<MailMessage>>,
        fail_subjects: Vec<&'static str>,
    }

    impl RecordingMailer {
        fn failing_on(subject: &'static str) -> Self {
            Self {
                fail_subjects: vec![subject],
                ..Self::default()
            }
        }

        fn sent(&self) -> Vec<MailMessage> {
            self.sent
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
            if self.fail_subjects.contains(&message.subject.as_str()) {
                return Err(MailError::Send("smtp unavailable".to_string()));
            }
            self.sent
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push(message.clone());
            Ok(())
        }
    }

    fn test_config() -> SignupConfig {
        SignupConfig {
            app_name: "Signpost".to_string(),
            source_mail: Some("noreply@signpost.dev".to_string()),
            ..SignupConfig::default()
        }
    }

    fn signup() -> Signup<MemoryStore, RecordingMailer> {
        Signup::new(MemoryStore::new(), RecordingMailer::default(), test_config())
    }

    fn ctx() -> RequestContext {
        RequestContext {
            remote_ip: "10.0.0.1".to_string(),
        }
    }

    fn register_request() -> RegisterRequest {
        RegisterRequest {
            email: "a@b.com".to_string(),
            name: "Ann".to_string(),
        }
    }

    async fn registered_code<M: Mailer>(signup: &Signup<MemoryStore, M>) -> String {
        signup
            .register_record(&ctx(), register_request())
            .await
            .unwrap()
            .activation_code
    }

    async fn activate<M: Mailer>(signup: &Signup<MemoryStore, M>, code: &str) -> String {
        signup
            .activate(
                &ctx(),
                ActivateRequest {
                    activation_code: code.to_string(),
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn register_persists_record_and_mails_code() {
        let signup = signup();
        signup.register(&ctx(), register_request()).await.unwrap();

        let sent = signup.mailer().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Activation");
        assert_eq!(sent[0].to, "a@b.com");

        // The mailed code resolves to the persisted registration.
        let code = sent[0]
            .text_body
            .split("code is: ")
            .nth(1)
            .and_then(|rest| rest.split('.').next())
            .unwrap()
            .to_string();
        let record: Option<RegistrationRecord> = signup
            .store()
            .get(Partition::Registrations, &code)
            .await
            .unwrap();
        let record = record.unwrap();
        assert_eq!(record.email, "a@b.com");
        assert_eq!(record.remote_ip, "10.0.0.1");
        assert!(record.activations.is_empty());
    }

    #[tokio::test]
    async fn register_invalid_email_writes_nothing() {
        let signup = signup();
        for email in ["", "not-an-email", "a@"] {
            let err = signup
                .register(
                    &ctx(),
                    RegisterRequest {
                        email: email.to_string(),
                        name: "Ann".to_string(),
                    },
                )
                .await
                .unwrap_err();
            assert!(matches!(err, SignupError::BadRequest), "email: {email:?}");
        }
        assert!(signup.store().is_empty());
        assert!(signup.mailer().sent().is_empty());
    }

    #[tokio::test]
    async fn register_mail_failure_is_internal_but_record_persists() {
        let signup = Signup::new(
            MemoryStore::new(),
            RecordingMailer::failing_on("Activation"),
            test_config(),
        );
        let err = signup
            .register(&ctx(), register_request())
            .await
            .unwrap_err();
        assert!(matches!(err, SignupError::Internal));
        // At-least-once durable registration: the record survives.
        assert_eq!(signup.store().len(), 1);
    }

    #[tokio::test]
    async fn register_without_source_mail_is_internal_but_record_persists() {
        let config = SignupConfig {
            source_mail: None,
            ..test_config()
        };
        let signup = Signup::new(MemoryStore::new(), RecordingMailer::default(), config);
        let err = signup
            .register(&ctx(), register_request())
            .await
            .unwrap_err();
        assert!(matches!(err, SignupError::Internal));
        assert_eq!(signup.store().len(), 1);
    }

    #[tokio::test]
    async fn activate_empty_code_is_bad_request() {
        let signup = signup();
        let err = signup
            .activate(&ctx(), ActivateRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SignupError::BadRequest));
        assert!(signup.store().is_empty());
    }

    #[tokio::test]
    async fn activate_unknown_code_is_not_found() {
        let signup = signup();
        let err = signup
            .activate(
                &ctx(),
                ActivateRequest {
                    activation_code: "nope".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SignupError::ActivationCodeNotFound));
        assert!(signup.store().is_empty());
    }

    #[tokio::test]
    async fn activate_then_verify_links_claims_to_registration() {
        let signup = signup();
        let code = registered_code(&signup).await;
        let token = activate(&signup, &code).await;

        let claims = signup
            .verify(VerifyRequest {
                token: token.clone(),
            })
            .await
            .unwrap();
        assert_eq!(claims.activation_code, code);

        // The activation record carries the issued token and back-reference.
        let record: Option<ActivationRecord> = signup
            .store()
            .get(Partition::Activations, &claims.activation_id)
            .await
            .unwrap();
        let record = record.unwrap();
        assert_eq!(record.token, token);
        assert_eq!(record.activation_code, code);

        // The registration lists exactly this activation.
        let registration: Option<RegistrationRecord> = signup
            .store()
            .get(Partition::Registrations, &code)
            .await
            .unwrap();
        assert_eq!(
            registration.unwrap().activations,
            vec![claims.activation_id]
        );
    }

    #[tokio::test]
    async fn repeated_activation_appends_each_id() {
        let signup = signup();
        let code = registered_code(&signup).await;

        let token1 = activate(&signup, &code).await;
        let token2 = activate(&signup, &code).await;
        assert_ne!(token1, token2);

        let claims1 = signup.verify(VerifyRequest { token: token1 }).await.unwrap();
        let claims2 = signup.verify(VerifyRequest { token: token2 }).await.unwrap();
        assert_ne!(claims1.activation_id, claims2.activation_id);

        let registration: Option<RegistrationRecord> = signup
            .store()
            .get(Partition::Registrations, &code)
            .await
            .unwrap();
        assert_eq!(
            registration.unwrap().activations,
            vec![claims1.activation_id, claims2.activation_id]
        );
    }

    #[tokio::test]
    async fn welcome_mail_failure_does_not_fail_activation() {
        let signup = Signup::new(
            MemoryStore::new(),
            RecordingMailer::failing_on("Welcome"),
            test_config(),
        );
        let code = registered_code(&signup).await;
        let token = activate(&signup, &code).await;
        assert!(signup.verify(VerifyRequest { token }).await.is_ok());
    }

    #[tokio::test]
    async fn activation_sends_welcome_mail() {
        let signup = signup();
        let code = registered_code(&signup).await;
        activate(&signup, &code).await;

        let subjects: Vec<String> = signup
            .mailer()
            .sent()
            .into_iter()
            .map(|m| m.subject)
            .collect();
        assert_eq!(subjects, vec!["Welcome".to_string()]);
    }

    #[tokio::test]
    async fn verify_trims_surrounding_whitespace() {
        let signup = signup();
        let code = registered_code(&signup).await;
        let token = activate(&signup, &code).await;

        let claims = signup
            .verify(VerifyRequest {
                token: format!("  {token}\n"),
            })
            .await
            .unwrap();
        assert_eq!(claims.activation_code, code);
    }

    #[tokio::test]
    async fn verify_tampered_token_is_invalid() {
        let signup = signup();
        let code = registered_code(&signup).await;
        let token = activate(&signup, &code).await;

        let tampered = format!("{token}x");
        let err = signup
            .verify(VerifyRequest { token: tampered })
            .await
            .unwrap_err();
        assert!(matches!(err, SignupError::TokenInvalid));
    }

    #[tokio::test]
    async fn verify_garbage_token_is_invalid() {
        let signup = signup();
        let err = signup
            .verify(VerifyRequest {
                token: "not.a.token".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SignupError::TokenInvalid));
    }

    #[tokio::test]
    async fn deleting_activation_record_revokes_token() {
        let signup = signup();
        let code = registered_code(&signup).await;
        let token = activate(&signup, &code).await;

        let claims = signup
            .verify(VerifyRequest {
                token: token.clone(),
            })
            .await
            .unwrap();
        assert!(
            signup
                .store()
                .remove(Partition::Activations, &claims.activation_id)
        );

        let err = signup.verify(VerifyRequest { token }).await.unwrap_err();
        assert!(matches!(err, SignupError::ActivationNotFound));
    }

    #[tokio::test]
    async fn tokens_verify_across_instances_sharing_a_store() {
        // Two stateless instances over the same store must agree on the
        // deployment keypair.
        let store = std::sync::Arc::new(MemoryStore::new());
        let first = Signup::new(store.clone(), RecordingMailer::default(), test_config());
        let second = Signup::new(store, RecordingMailer::default(), test_config());

        let code = first
            .register_record(&ctx(), register_request())
            .await
            .unwrap()
            .activation_code;
        let token = first
            .activate(
                &ctx(),
                ActivateRequest {
                    activation_code: code.clone(),
                },
            )
            .await
            .unwrap();

        let claims = second.verify(VerifyRequest { token }).await.unwrap();
        assert_eq!(claims.activation_code, code);
    }
}
