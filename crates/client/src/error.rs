//! Client error types.
//!
//! Every fallible operation in this crate returns [`ClientError`]. Callers
//! that only need to decide how to present a failure use
//! [`ClientError::kind`] and [`ClientError::user_message`].

use reqwest::StatusCode;
use shopfront_core::EmailError;
use thiserror::Error;

use crate::inflight::Operation;
use crate::store::StoreError;

/// Errors that can occur when talking to the commerce API or mutating
/// client-side state.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Bad credentials, or a refresh token the API no longer accepts.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A local precondition failed; nothing was sent.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Transport failure (connect, timeout, TLS, body read).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: StatusCode,
        /// Message extracted from the response body.
        message: String,
    },

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limited by the API.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Response body was not the JSON we expected.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Token or cart persistence failed.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// The configured base URL cannot be extended with a path.
    #[error("invalid API URL: {0}")]
    InvalidUrl(String),

    /// The same operation is already outstanding.
    #[error("{0} is already in progress")]
    Busy(Operation),

    /// The caller cancelled before the response was applied.
    #[error("operation cancelled")]
    Cancelled,

    /// The operation needs a signed-in session.
    #[error("not signed in")]
    NotAuthenticated,
}

/// Local precondition violations, rejected before any network call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// Email is empty or malformed.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Password is empty.
    #[error("password cannot be empty")]
    EmptyPassword,

    /// A required form field is blank.
    #[error("{0} cannot be empty")]
    MissingField(&'static str),

    /// Email verification code is empty.
    #[error("verification code cannot be empty")]
    EmptyVerificationCode,

    /// The API rejected the verification code.
    #[error("verification code is invalid or expired")]
    InvalidVerificationCode,

    /// Cart quantities start at 1.
    #[error("quantity must be at least 1, got {0}")]
    QuantityBelowOne(i64),

    /// Quantity does not fit a cart line.
    #[error("quantity {0} is too large")]
    QuantityTooLarge(i64),

    /// Checkout of an empty cart.
    #[error("cart is empty")]
    EmptyCart,

    /// Shipping info has blank fields.
    #[error("shipping info is missing: {}", .0.join(", "))]
    IncompleteShipping(Vec<&'static str>),

    /// Profile update with no fields set.
    #[error("profile update has no changes")]
    EmptyUpdate,

    /// A multi-step flow was driven out of order.
    #[error("cannot {action} before {requires}")]
    OutOfOrder {
        /// What the caller attempted.
        action: &'static str,
        /// The step that must come first.
        requires: &'static str,
    },
}

/// Coarse classification used to pick a user-facing response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Prompt the user to sign in again or re-enter credentials.
    Authentication,
    /// Show the validation message next to the offending input.
    Validation,
    /// Transport or API failure; offer a generic retry.
    Network,
    /// Local condition (busy, cancelled, storage, configuration).
    Local,
}

impl ClientError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication(_) | Self::NotAuthenticated => ErrorKind::Authentication,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Network(_)
            | Self::Api { .. }
            | Self::NotFound(_)
            | Self::RateLimited(_)
            | Self::Parse(_) => ErrorKind::Network,
            Self::Storage(_) | Self::InvalidUrl(_) | Self::Busy(_) | Self::Cancelled => {
                ErrorKind::Local
            }
        }
    }

    /// Message safe to show an end user. Internal details stay in logs.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Authentication(_) => {
                "Sign-in failed. Check your credentials and try again.".to_string()
            }
            Self::NotAuthenticated => "Please sign in to continue.".to_string(),
            Self::Validation(err) => err.to_string(),
            Self::NotFound(_) => "The requested item could not be found.".to_string(),
            Self::RateLimited(secs) => format!("Too many requests. Try again in {secs} seconds."),
            Self::Network(_) | Self::Api { .. } | Self::Parse(_) => {
                "Something went wrong talking to the store. Please try again.".to_string()
            }
            Self::Busy(op) => format!("Still working on the previous {op} request."),
            Self::Cancelled => "The request was cancelled.".to_string(),
            Self::Storage(_) | Self::InvalidUrl(_) => "Internal client error.".to_string(),
        }
    }
}

/// Result type alias for `ClientError`.
pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            ClientError::Authentication("bad password".into()).kind(),
            ErrorKind::Authentication
        );
        assert_eq!(
            ClientError::from(ValidationError::QuantityBelowOne(0)).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ClientError::Api {
                status: StatusCode::BAD_GATEWAY,
                message: "upstream".into()
            }
            .kind(),
            ErrorKind::Network
        );
        assert_eq!(ClientError::Cancelled.kind(), ErrorKind::Local);
    }

    #[test]
    fn test_user_message_hides_details() {
        let err = ClientError::Api {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "NullPointerException at OrderService.java:88".into(),
        };
        assert!(!err.user_message().contains("NullPointer"));
        assert!(err.to_string().contains("NullPointer"));
    }

    #[test]
    fn test_validation_display() {
        let err = ValidationError::IncompleteShipping(vec!["city", "country"]);
        assert_eq!(err.to_string(), "shipping info is missing: city, country");
        assert_eq!(
            ValidationError::EmptyVerificationCode.to_string(),
            "verification code cannot be empty"
        );
        assert_eq!(
            ValidationError::OutOfOrder {
                action: "register",
                requires: "email verification"
            }
            .to_string(),
            "cannot register before email verification"
        );
    }
}
