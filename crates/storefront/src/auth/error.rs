//! Authentication error types.

use thiserror::Error;

use crate::api::ApiError;
use crate::storage::StorageError;

/// Errors that can occur during authentication and access checks.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The API rejected the email/password pair.
    #[error("invalid credentials")]
    InvalidCredentials(Option<String>),

    /// The bearer token could not be decoded.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The token's `exp` claim is in the past.
    #[error("session expired")]
    SessionExpired,

    /// An operation needs a signed-in user and there is none.
    #[error("not signed in")]
    NotSignedIn,

    /// The signed-in user lacks the admin role.
    #[error("admin role required")]
    Forbidden,

    /// The login call failed for another reason.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Remembering or forgetting the session in storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Message suitable for showing to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredentials(Some(detail)) => detail.clone(),
            Self::InvalidCredentials(None) => "Incorrect email or password.".to_string(),
            Self::InvalidToken(_) => "Sign-in failed. Please try again.".to_string(),
            Self::SessionExpired => "Your session has expired. Please sign in again.".to_string(),
            Self::NotSignedIn => "Please sign in to continue.".to_string(),
            Self::Forbidden => "You do not have permission to do that.".to_string(),
            Self::Api(err) => err.user_message(),
            Self::Storage(_) => "Could not save your sign-in on this device.".to_string(),
        }
    }
}
