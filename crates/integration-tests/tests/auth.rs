//! Sign-in, remember-me and sign-out against the mock API.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use secrecy::SecretString;

use market_core::{Email, Role, UserId};
use market_integration_tests::{
    ADMIN_EMAIL, ADMIN_PASSWORD, CUSTOMER_EMAIL, CUSTOMER_PASSWORD, MockApi, sign_in, storefront,
    storefront_with_store,
};
use market_storefront::AppError;
use market_storefront::auth::{AuthError, Credentials};
use market_storefront::storage::{KeyValueStore, MemoryStore, StorageError, keys};

/// Memory storage that refuses writes to one slot.
struct ReadOnlySlot {
    inner: MemoryStore,
    key: &'static str,
}

impl KeyValueStore for ReadOnlySlot {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if key == self.key {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key)
    }
}

#[tokio::test]
async fn test_login_decodes_identity() {
    let api = MockApi::spawn().await.unwrap();
    let session = storefront(&api).unwrap();

    let identity = sign_in(&session, CUSTOMER_EMAIL, CUSTOMER_PASSWORD, false)
        .await
        .unwrap();
    assert_eq!(identity.user_id, Some(UserId::new(1)));
    assert_eq!(identity.email.as_deref(), Some(CUSTOMER_EMAIL));
    assert_eq!(identity.role, Role::Customer);
    assert!(identity.expires_at.is_some());
    assert!(session.auth().is_authenticated());
    assert!(!session.auth().is_admin());

    let admin = storefront(&api).unwrap();
    sign_in(&admin, ADMIN_EMAIL, ADMIN_PASSWORD, false)
        .await
        .unwrap();
    assert!(admin.auth().is_admin());
}

#[tokio::test]
async fn test_wrong_password_is_invalid_credentials() {
    let api = MockApi::spawn().await.unwrap();
    let session = storefront(&api).unwrap();

    let credentials = Credentials {
        email: Email::parse(CUSTOMER_EMAIL).unwrap(),
        password: SecretString::from("wrong"),
    };
    let err = session.auth().login(&credentials, true).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials(Some(_))));
    assert_eq!(err.user_message(), "Incorrect email or password");
    assert!(!session.auth().is_authenticated());
    assert_eq!(session.store().get(keys::AUTH_TOKEN).unwrap(), None);
}

#[tokio::test]
async fn test_invalid_form_never_calls_the_api() {
    let api = MockApi::spawn().await.unwrap();
    let session = storefront(&api).unwrap();

    let err = sign_in(&session, "not-an-email", "", false)
        .await
        .unwrap_err();
    let AppError::Validation(errors) = err else {
        panic!("expected validation errors");
    };
    assert!(errors.get("email").is_some());
    assert!(errors.get("password").is_some());
    assert_eq!(api.state().count("POST", "/api/auth/login"), 0);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let api = MockApi::spawn().await.unwrap();
    api.state().set_token_ttl_secs(-60);
    let session = storefront(&api).unwrap();

    let err = sign_in(&session, CUSTOMER_EMAIL, CUSTOMER_PASSWORD, true)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::SessionExpired)));
    assert!(!session.auth().is_authenticated());
}

#[tokio::test]
async fn test_remember_me_restores_session() {
    let api = MockApi::spawn().await.unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    let first = storefront_with_store(&api, Arc::clone(&store)).unwrap();
    sign_in(&first, CUSTOMER_EMAIL, CUSTOMER_PASSWORD, true)
        .await
        .unwrap();

    let second = storefront_with_store(&api, Arc::clone(&store)).unwrap();
    assert!(second.auth().is_authenticated());
    assert!(second.auth().remember_me());

    // The restored token works against authenticated endpoints.
    let addresses = second
        .addresses()
        .fetch(&market_core::PageParams::default())
        .await
        .unwrap();
    assert_eq!(addresses.total, 0);
    assert!(api.state().requests().last().unwrap().bearer);

    second.auth().logout();
    let third = storefront_with_store(&api, store).unwrap();
    assert!(!third.auth().is_authenticated());
    assert!(third.auth().remember_me());
}

#[tokio::test]
async fn test_without_remember_me_session_is_not_kept() {
    let api = MockApi::spawn().await.unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

    let first = storefront_with_store(&api, Arc::clone(&store)).unwrap();
    sign_in(&first, CUSTOMER_EMAIL, CUSTOMER_PASSWORD, false)
        .await
        .unwrap();
    assert!(first.auth().is_authenticated());
    assert_eq!(store.get(keys::AUTH_TOKEN).unwrap(), None);
    assert_eq!(store.get(keys::REMEMBER_ME).unwrap().as_deref(), Some("false"));

    let second = storefront_with_store(&api, store).unwrap();
    assert!(!second.auth().is_authenticated());
}

#[tokio::test]
async fn test_signed_out_calls_fail_locally() {
    let api = MockApi::spawn().await.unwrap();
    let session = storefront(&api).unwrap();

    let err = session
        .orders()
        .fetch_mine(&market_core::PageParams::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Api(market_storefront::api::ApiError::MissingToken)
    ));
    assert!(api.state().requests().is_empty());
}

#[tokio::test]
async fn test_failed_token_write_leaves_preference_unset() {
    let api = MockApi::spawn().await.unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(ReadOnlySlot {
        inner: MemoryStore::new(),
        key: keys::AUTH_TOKEN,
    });
    let session = storefront_with_store(&api, Arc::clone(&store)).unwrap();

    let err = sign_in(&session, CUSTOMER_EMAIL, CUSTOMER_PASSWORD, true)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::Storage(_))));
    assert!(!session.auth().is_authenticated());
    assert_eq!(store.get(keys::REMEMBER_ME).unwrap(), None);
    assert_eq!(store.get(keys::AUTH_TOKEN).unwrap(), None);
}

#[tokio::test]
async fn test_failed_preference_write_drops_stored_token() {
    let api = MockApi::spawn().await.unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(ReadOnlySlot {
        inner: MemoryStore::new(),
        key: keys::REMEMBER_ME,
    });
    let session = storefront_with_store(&api, Arc::clone(&store)).unwrap();

    let err = sign_in(&session, CUSTOMER_EMAIL, CUSTOMER_PASSWORD, true)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::Storage(_))));
    assert!(!session.auth().is_authenticated());
    assert_eq!(store.get(keys::AUTH_TOKEN).unwrap(), None);
}
