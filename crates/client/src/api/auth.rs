//! Authentication, email verification and signup endpoints.

use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use shopfront_core::{Email, User};
use tracing::instrument;

use super::ApiClient;
use crate::error::{ClientError, ValidationError};

/// Tokens and account returned by `POST /auth/login`.
#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    pub user: User,
}

/// Result of `POST /auth/refresh`.
///
/// `refresh_token` is only present when the API rotates refresh tokens.
#[derive(Debug, Clone)]
pub struct RefreshResponse {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    pub user: User,
}

/// Proof of a verified email, required by `POST /auth/signup`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct VerificationToken(String);

impl VerificationToken {
    /// Wrap a token obtained out of band (e.g. in an earlier CLI run).
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The token text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Signup form fields.
pub struct SignUpRequest {
    pub email: Email,
    pub password: SecretString,
    pub name: String,
    pub phone: String,
}

impl std::fmt::Debug for SignUpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignUpRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("name", &self.name)
            .field("phone", &self.phone)
            .finish()
    }
}

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct EmailRequest<'a> {
    email: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VerifyRequest<'a> {
    email: &'a str,
    auth_num: &'a str,
}

#[derive(Serialize)]
struct SignUpBody<'a> {
    email: &'a str,
    password: &'a str,
    name: &'a str,
    phone: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPairBody {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: User,
}

#[derive(Deserialize)]
struct VerifyBody {
    token: VerificationToken,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityBody {
    is_available: bool,
}

impl ApiClient {
    /// Exchange credentials for a token pair.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Authentication` if the credentials are rejected,
    /// or a network/API error if the request fails.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<LoginResponse, ClientError> {
        let url = self.endpoint(&["auth", "login"])?;
        let builder = self.request(Method::POST, url).await.json(&Credentials {
            email: email.as_str(),
            password: password.expose_secret(),
        });

        let body: TokenPairBody = self
            .send_json(builder)
            .await
            .map_err(|e| credential_rejection(e, "invalid email or password"))?;

        let refresh_token = body.refresh_token.ok_or_else(|| {
            ClientError::Authentication("login response carried no refresh token".to_string())
        })?;

        Ok(LoginResponse {
            access_token: SecretString::from(body.access_token),
            refresh_token: SecretString::from(refresh_token),
            user: body.user,
        })
    }

    /// Exchange a refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Authentication` if the refresh token is invalid
    /// or expired, or a network/API error if the request fails.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(
        &self,
        refresh_token: &SecretString,
    ) -> Result<RefreshResponse, ClientError> {
        let url = self.endpoint(&["auth", "refresh"])?;
        let builder = self.request(Method::POST, url).await.json(&RefreshRequest {
            refresh_token: refresh_token.expose_secret(),
        });

        let body: TokenPairBody = self
            .send_json(builder)
            .await
            .map_err(|e| credential_rejection(e, "refresh token rejected"))?;

        Ok(RefreshResponse {
            access_token: SecretString::from(body.access_token),
            refresh_token: body.refresh_token.map(SecretString::from),
            user: body.user,
        })
    }

    /// Invalidate the current session server-side.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), ClientError> {
        let url = self.endpoint(&["auth", "logout"])?;
        let builder = self.request(Method::POST, url).await;
        self.send_empty(builder).await
    }

    /// Ask whether an email is free to register.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn check_email_availability(&self, email: &Email) -> Result<bool, ClientError> {
        let url = self.endpoint(&["auth", "check-email"])?;
        let builder = self.request(Method::POST, url).await.json(&EmailRequest {
            email: email.as_str(),
        });
        let body: AvailabilityBody = self.send_json(builder).await?;
        Ok(body.is_available)
    }

    /// Send a verification code to `email`.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(email = %email))]
    pub async fn send_verification_email(&self, email: &Email) -> Result<(), ClientError> {
        let url = self.endpoint(&["email-verifications", "send"])?;
        let builder = self.request(Method::POST, url).await.json(&EmailRequest {
            email: email.as_str(),
        });
        self.send_empty(builder).await
    }

    /// Check a verification code and obtain a signup token.
    ///
    /// A 4xx answer means the code itself was refused and maps to
    /// `ValidationError::InvalidVerificationCode`; transport failures and 5xx
    /// answers keep their network/API classification.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Validation` for a refused code, or a network/API
    /// error if the request fails.
    #[instrument(skip(self, code), fields(email = %email))]
    pub async fn verify_email(
        &self,
        email: &Email,
        code: &str,
    ) -> Result<VerificationToken, ClientError> {
        let url = self.endpoint(&["email-verifications", "verify"])?;
        let builder = self.request(Method::POST, url).await.json(&VerifyRequest {
            email: email.as_str(),
            auth_num: code,
        });

        let body: VerifyBody = self.send_json(builder).await.map_err(|e| match e {
            ClientError::Authentication(_) | ClientError::NotFound(_) => {
                ValidationError::InvalidVerificationCode.into()
            }
            ClientError::Api { status, .. } if status.is_client_error() => {
                ValidationError::InvalidVerificationCode.into()
            }
            other => other,
        })?;
        Ok(body.token)
    }

    /// Register an account with a verified email.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the signup or the request fails.
    #[instrument(skip(self, token, request), fields(email = %request.email))]
    pub async fn sign_up(
        &self,
        token: &VerificationToken,
        request: &SignUpRequest,
    ) -> Result<User, ClientError> {
        let mut url = self.endpoint(&["auth", "signup"])?;
        url.query_pairs_mut().append_pair("token", token.as_str());

        let builder = self.request(Method::POST, url).await.json(&SignUpBody {
            email: request.email.as_str(),
            password: request.password.expose_secret(),
            name: &request.name,
            phone: &request.phone,
        });
        self.send_json(builder).await
    }
}

/// Credential endpoints answer bad input with 400 as often as 401; both mean
/// the credential was refused.
fn credential_rejection(err: ClientError, reason: &str) -> ClientError {
    match err {
        ClientError::Api { status, message }
            if status == StatusCode::BAD_REQUEST || status == StatusCode::NOT_FOUND =>
        {
            tracing::debug!(%status, %message, "Credential refused");
            ClientError::Authentication(reason.to_string())
        }
        ClientError::NotFound(_) => ClientError::Authentication(reason.to_string()),
        other => other,
    }
}
