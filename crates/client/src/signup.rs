//! Email-verified account registration.
//!
//! Signup is a short state machine:
//!
//! ```text
//! EmailEntry --send_code--> CodeSent --verify--> Verified --register--> Registered
//! ```
//!
//! `send_code` may be repeated from `CodeSent` (resend, or a different
//! address). Local checks run before any request, and a step submitted while
//! the same step is still outstanding is rejected as busy.

use secrecy::{ExposeSecret, SecretString};
use shopfront_core::{Email, User};
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::api::{ApiClient, SignUpRequest, VerificationToken};
use crate::cancel::CancellationToken;
use crate::error::{ClientError, ValidationError};
use crate::inflight::{InFlight, Operation};

/// Where a signup currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignupStage {
    EmailEntry,
    CodeSent { email: Email },
    Verified { email: Email, token: VerificationToken },
    Registered { user: User },
}

impl SignupStage {
    const fn name(&self) -> &'static str {
        match self {
            Self::EmailEntry => "entering an email",
            Self::CodeSent { .. } => "sending a verification code",
            Self::Verified { .. } => "verifying the email",
            Self::Registered { .. } => "registering",
        }
    }
}

/// Drives one signup from email entry to a registered account.
pub struct SignupFlow {
    api: ApiClient,
    stage: Mutex<SignupStage>,
    inflight: InFlight,
}

impl SignupFlow {
    /// Start a fresh signup.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self::with_stage(api, SignupStage::EmailEntry)
    }

    /// Resume a signup at a known stage, e.g. a CLI run picking up the
    /// verification token an earlier run obtained.
    #[must_use]
    pub fn with_stage(api: ApiClient, stage: SignupStage) -> Self {
        Self {
            api,
            stage: Mutex::new(stage),
            inflight: InFlight::default(),
        }
    }

    /// Current stage.
    pub async fn stage(&self) -> SignupStage {
        self.stage.lock().await.clone()
    }

    /// Whether any step is outstanding.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        !self.inflight.is_idle()
    }

    /// Send a verification code to `email` and move to `CodeSent`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for a malformed email or once the
    /// email is verified, an API error if sending fails, or
    /// `ClientError::Cancelled`/`ClientError::Busy`.
    #[instrument(skip(self, cancel), fields(email = %email))]
    pub async fn send_code(&self, email: &str, cancel: &CancellationToken) -> Result<(), ClientError> {
        let email = Email::parse(email).map_err(ValidationError::from)?;
        match self.stage().await {
            SignupStage::EmailEntry | SignupStage::CodeSent { .. } => {}
            other => return Err(out_of_order("send a code", &other, "entering an email")),
        }
        let _guard = self.inflight.begin(Operation::SendVerification)?;

        self.api.send_verification_email(&email).await?;
        ensure_live(cancel)?;

        *self.stage.lock().await = SignupStage::CodeSent { email };
        Ok(())
    }

    /// Check the emailed code and move to `Verified`.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for an empty or refused code or when
    /// no code has been sent, a network/API error otherwise, or
    /// `ClientError::Cancelled`/`ClientError::Busy`.
    #[instrument(skip(self, code, cancel))]
    pub async fn verify(&self, code: &str, cancel: &CancellationToken) -> Result<(), ClientError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(ValidationError::EmptyVerificationCode.into());
        }
        let email = match self.stage().await {
            SignupStage::CodeSent { email } => email,
            other => {
                return Err(out_of_order(
                    "verify the email",
                    &other,
                    "sending a verification code",
                ));
            }
        };
        let _guard = self.inflight.begin(Operation::VerifyEmail)?;

        let token = self.api.verify_email(&email, code).await?;
        ensure_live(cancel)?;

        *self.stage.lock().await = SignupStage::Verified { email, token };
        Ok(())
    }

    /// Create the account for the verified email.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for an empty password, name or phone
    /// or when the email is not verified yet, an API error if the signup is
    /// refused, or `ClientError::Cancelled`/`ClientError::Busy`.
    #[instrument(skip(self, password, cancel))]
    pub async fn register(
        &self,
        password: SecretString,
        name: &str,
        phone: &str,
        cancel: &CancellationToken,
    ) -> Result<User, ClientError> {
        if password.expose_secret().is_empty() {
            return Err(ValidationError::EmptyPassword.into());
        }
        if name.trim().is_empty() {
            return Err(ValidationError::MissingField("name").into());
        }
        if phone.trim().is_empty() {
            return Err(ValidationError::MissingField("phone").into());
        }
        let (email, token) = match self.stage().await {
            SignupStage::Verified { email, token } => (email, token),
            other => return Err(out_of_order("register", &other, "verifying the email")),
        };
        let _guard = self.inflight.begin(Operation::SignUp)?;

        let request = SignUpRequest {
            email,
            password,
            name: name.trim().to_string(),
            phone: phone.trim().to_string(),
        };
        let user = self.api.sign_up(&token, &request).await?;
        ensure_live(cancel)?;

        info!(user_id = %user.id, "Account registered");
        *self.stage.lock().await = SignupStage::Registered { user: user.clone() };
        Ok(user)
    }
}

fn out_of_order(action: &'static str, stage: &SignupStage, requires: &'static str) -> ClientError {
    tracing::debug!(action, stage = stage.name(), "Signup step out of order");
    ValidationError::OutOfOrder { action, requires }.into()
}

fn ensure_live(cancel: &CancellationToken) -> Result<(), ClientError> {
    if cancel.is_cancelled() {
        return Err(ClientError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use url::Url;

    fn offline_flow(stage: SignupStage) -> SignupFlow {
        let config = ClientConfig::new(Url::parse("http://127.0.0.1:9").unwrap());
        SignupFlow::with_stage(ApiClient::new(&config).unwrap(), stage)
    }

    #[tokio::test]
    async fn test_send_code_rejects_bad_email() {
        let flow = offline_flow(SignupStage::EmailEntry);
        let err = flow
            .send_code("not-an-email", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::InvalidEmail(_))
        ));
        assert_eq!(flow.stage().await, SignupStage::EmailEntry);
    }

    #[tokio::test]
    async fn test_verify_requires_code_and_stage() {
        let flow = offline_flow(SignupStage::EmailEntry);
        let cancel = CancellationToken::new();

        let err = flow.verify("  ", &cancel).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::EmptyVerificationCode)
        ));

        let err = flow.verify("123456", &cancel).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::OutOfOrder { .. })
        ));
    }

    #[tokio::test]
    async fn test_register_checks_fields_first() {
        let flow = offline_flow(SignupStage::EmailEntry);
        let cancel = CancellationToken::new();

        let err = flow
            .register(SecretString::from(""), "Kim", "010", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::EmptyPassword)
        ));

        let err = flow
            .register(SecretString::from("pw"), "Kim", " ", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::MissingField("phone"))
        ));

        let err = flow
            .register(SecretString::from("pw"), "Kim", "010", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::OutOfOrder { action: "register", .. })
        ));
    }

    #[tokio::test]
    async fn test_failed_send_keeps_stage() {
        let flow = offline_flow(SignupStage::EmailEntry);
        let err = flow
            .send_code("new@shop.com", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
        assert_eq!(flow.stage().await, SignupStage::EmailEntry);
        assert!(!flow.is_busy());
    }
}
