//! Authentication context.
//!
//! [`AuthContext`] holds the signed-in session for the application, shares
//! the bearer token with the [`ApiClient`], and answers access questions
//! ("is anyone signed in?", "is this an admin?") from the token claims.
//!
//! # Remember me
//!
//! When the shopper ticks "remember me" at login, the token is written to the
//! `auth_token` storage slot and [`AuthContext::restore`] brings the session
//! back on the next start. Otherwise the token lives only in memory. The flag
//! itself is kept in the `remember_me` slot so forms can pre-tick the box.

mod claims;
mod error;

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};

use market_core::{Email, Role, UserId};

use crate::api::{ApiClient, ApiError};
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::storage::{KeyValueStore, StorageError, StorageSlot, keys};

pub use claims::{Claims, decode_claims};
pub use error::AuthError;

/// Validated login input.
#[derive(Debug)]
pub struct Credentials {
    pub email: Email,
    pub password: SecretString,
}

/// Who is signed in, derived from the token claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Option<UserId>,
    pub email: Option<String>,
    pub role: Role,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Identity {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<&Claims> for Identity {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.user_id(),
            email: claims.email.clone(),
            role: claims.role,
            expires_at: claims.expires_at(),
        }
    }
}

#[derive(Debug)]
struct Session {
    token: SecretString,
    claims: Claims,
}

/// Shared handle to the session's authentication state.
#[derive(Clone)]
pub struct AuthContext {
    inner: Arc<AuthContextInner>,
}

struct AuthContextInner {
    api: ApiClient,
    session: RwLock<Option<Session>>,
    remember_me: StorageSlot<bool>,
    token: StorageSlot<Option<String>>,
}

impl std::fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthContext")
            .field("identity", &self.current())
            .finish_non_exhaustive()
    }
}

impl AuthContext {
    /// Create a signed-out context. Call [`restore`](Self::restore) to pick
    /// up a remembered session.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage slots cannot be bound.
    pub fn new(api: ApiClient, store: &Arc<dyn KeyValueStore>) -> Result<Self, StorageError> {
        Ok(Self {
            inner: Arc::new(AuthContextInner {
                api,
                session: RwLock::new(None),
                remember_me: StorageSlot::new(Arc::clone(store), keys::REMEMBER_ME)?,
                token: StorageSlot::new(Arc::clone(store), keys::AUTH_TOKEN)?,
            }),
        })
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// The persisted remember-me preference.
    #[must_use]
    pub fn remember_me(&self) -> bool {
        self.inner.remember_me.read()
    }

    fn install(&self, token: SecretString, claims: Claims) -> Identity {
        let identity = Identity::from(&claims);
        self.inner
            .api
            .set_bearer_token(Some(SecretString::from(token.expose_secret())));
        *self
            .inner
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Session { token, claims });

        if let Some(user_id) = identity.user_id {
            set_sentry_user(&user_id, identity.email.as_deref());
        }
        identity
    }

    fn forget_token(&self) {
        if let Err(e) = self.inner.token.clear() {
            tracing::warn!(error = %e, "Failed to clear remembered token");
        }
    }

    /// Bring back a remembered session from storage.
    ///
    /// Returns the restored identity, or `None` when remember-me is off or the
    /// stored token is missing, undecodable or expired (a bad token is
    /// removed from storage).
    pub fn restore(&self) -> Option<Identity> {
        if !self.remember_me() {
            return None;
        }
        let token = self.inner.token.read()?;

        match decode_claims(&token) {
            Ok(claims) if !claims.is_expired_at(Utc::now()) => {
                tracing::info!(role = %claims.role, "Restored remembered session");
                Some(self.install(SecretString::from(token), claims))
            }
            Ok(_) => {
                tracing::info!("Remembered session has expired");
                self.forget_token();
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Discarding undecodable remembered token");
                self.forget_token();
                None
            }
        }
    }

    /// Sign in and start a session.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] when the API rejects the
    /// credentials, [`AuthError::InvalidToken`] / [`AuthError::SessionExpired`]
    /// when the issued token is unusable, or a storage/API error.
    pub async fn login(
        &self,
        credentials: &Credentials,
        remember_me: bool,
    ) -> Result<Identity, AuthError> {
        let response = self
            .inner
            .api
            .login(&credentials.email, &credentials.password)
            .await
            .map_err(|e| match e {
                ApiError::Unauthorized(detail) => AuthError::InvalidCredentials(detail),
                other => AuthError::Api(other),
            })?;

        let claims = decode_claims(&response.access_token)?;
        if claims.is_expired_at(Utc::now()) {
            return Err(AuthError::SessionExpired);
        }

        // Token slot first: the preference must never claim a token that was
        // not stored.
        if remember_me {
            self.inner.token.write(&Some(response.access_token.clone()))?;
        } else {
            self.inner.token.clear()?;
        }
        if let Err(e) = self.inner.remember_me.write(&remember_me) {
            self.forget_token();
            return Err(e.into());
        }

        let identity = self.install(SecretString::from(response.access_token), claims);
        tracing::info!(role = %identity.role, remember_me, "Signed in");
        Ok(identity)
    }

    /// End the session and forget any remembered token. The remember-me
    /// preference itself is kept.
    pub fn logout(&self) {
        let had_session = self
            .inner
            .session
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some();
        self.inner.api.set_bearer_token(None);
        self.forget_token();
        clear_sentry_user();

        if had_session {
            tracing::info!("Signed out");
        }
    }

    /// The signed-in identity, if the session exists and has not expired.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        let guard = self
            .inner
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|session| !session.claims.is_expired_at(Utc::now()))
            .map(|session| Identity::from(&session.claims))
    }

    /// The current bearer token, if signed in.
    #[must_use]
    pub fn token(&self) -> Option<SecretString> {
        self.inner
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|session| SecretString::from(session.token.expose_secret()))
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.current().is_some_and(|identity| identity.is_admin())
    }

    /// The signed-in identity, or an error explaining why there is none.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotSignedIn`] without a session, or
    /// [`AuthError::SessionExpired`] when the token has expired.
    pub fn require_user(&self) -> Result<Identity, AuthError> {
        if let Some(identity) = self.current() {
            return Ok(identity);
        }
        let has_session = self
            .inner
            .session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some();
        if has_session {
            Err(AuthError::SessionExpired)
        } else {
            Err(AuthError::NotSignedIn)
        }
    }

    /// The signed-in identity if it has the admin role.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Forbidden`] for non-admin users, or the errors of
    /// [`require_user`](Self::require_user).
    pub fn require_admin(&self) -> Result<Identity, AuthError> {
        let identity = self.require_user()?;
        if identity.is_admin() {
            Ok(identity)
        } else {
            tracing::debug!(role = %identity.role, "Refused admin operation");
            Err(AuthError::Forbidden)
        }
    }
}
