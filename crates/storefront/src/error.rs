//! Unified error handling with Sentry integration.
//!
//! Every layer has its own error enum; [`AppError`] wraps them so a view can
//! show one message and report one event. Call [`AppError::report`] where the
//! error ends up being shown: it captures server-side failures to Sentry and
//! logs the rest at `debug`.

use thiserror::Error;

use crate::api::ApiError;
use crate::auth::AuthError;
use crate::checkout::CheckoutError;
use crate::config::ConfigError;
use crate::storage::StorageError;
use crate::validation::ValidationErrors;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// A call to the Market API failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// Sign-in or an access check failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// A form did not validate.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    /// Placing an order or paying for it failed.
    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    /// Reading or writing local storage failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The environment is misconfigured.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl AppError {
    /// Message suitable for showing to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(err) => err.user_message(),
            Self::Auth(err) => err.user_message(),
            Self::Validation(_) => "Please correct the highlighted fields.".to_string(),
            Self::Checkout(err) => err.user_message(),
            Self::Storage(_) => "Could not save your changes on this device.".to_string(),
            Self::Config(_) => "The store is not configured correctly.".to_string(),
        }
    }

    /// Whether this error points at a fault outside the shopper's control.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        match self {
            Self::Api(err) => err.is_server_error(),
            Self::Auth(AuthError::Api(err)) => err.is_server_error(),
            Self::Auth(AuthError::Storage(_)) | Self::Storage(_) | Self::Config(_) => true,
            Self::Checkout(err) => err.is_internal(),
            Self::Auth(_) | Self::Validation(_) => false,
        }
    }

    /// Capture internal errors to Sentry and log the rest.
    ///
    /// Returns the Sentry event ID when one was captured.
    pub fn report(&self) -> Option<sentry::types::Uuid> {
        if self.is_internal() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Storefront error"
            );
            Some(event_id)
        } else {
            tracing::debug!(error = %self, "Storefront error shown to user");
            None
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Called after sign-in to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on sign-out.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a shopper action.
///
/// Breadcrumbs show up in Sentry reports as the trail leading to an error.
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", Some(&[("product_id", "123")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use market_core::PaymentStatus;

    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::Auth(AuthError::NotSignedIn);
        assert_eq!(err.to_string(), "Auth error: not signed in");

        let err = AppError::Checkout(CheckoutError::EmptyCart);
        assert_eq!(err.to_string(), "Checkout error: cart is empty");
    }

    #[test]
    fn test_user_messages() {
        let err = AppError::Api(ApiError::NotFound(Some("Product not found".to_string())));
        assert_eq!(err.user_message(), "Product not found");

        let err = AppError::Validation(ValidationErrors::new());
        assert_eq!(err.user_message(), "Please correct the highlighted fields.");

        let err = AppError::Checkout(CheckoutError::Declined(PaymentStatus::Failed));
        assert!(err.user_message().contains("declined"));
    }

    #[test]
    fn test_internal_classification() {
        assert!(
            AppError::Api(ApiError::Status {
                status: 503,
                detail: None
            })
            .is_internal()
        );
        assert!(!AppError::Api(ApiError::NotFound(None)).is_internal());
        assert!(!AppError::Auth(AuthError::Forbidden).is_internal());
        assert!(AppError::Storage(StorageError::Poisoned).is_internal());
        assert!(!AppError::Checkout(CheckoutError::Timeout).is_internal());
    }

    #[test]
    fn test_report_skips_user_errors() {
        assert!(AppError::Auth(AuthError::NotSignedIn).report().is_none());
    }
}
