//! Login and address endpoints.

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::instrument;

use market_core::{AddressId, Email, Page, PageParams};

use super::{Access, Address, AddressInput, ApiClient, ApiError, TokenResponse};

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

impl ApiClient {
    /// Exchange credentials for a bearer token.
    ///
    /// Does not store the token; see [`crate::auth::AuthContext::login`].
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Unauthorized`] for wrong credentials.
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn login(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<TokenResponse, ApiError> {
        let request = self
            .request(Method::POST, "auth/login", Access::Public)?
            .json(&LoginBody {
                email: email.as_str(),
                password: password.expose_secret(),
            });
        self.send(request).await
    }

    /// List the signed-in user's addresses.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MissingToken`] when signed out, or an API error.
    #[instrument(skip(self))]
    pub async fn list_addresses(&self, params: &PageParams) -> Result<Page<Address>, ApiError> {
        let request = self
            .request(Method::GET, "addresses", Access::Authenticated)?
            .query(params);
        self.send(request).await
    }

    /// Save a new address.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MissingToken`] when signed out, or an API error.
    #[instrument(skip(self, input))]
    pub async fn create_address(&self, input: &AddressInput) -> Result<Address, ApiError> {
        let request = self
            .request(Method::POST, "addresses", Access::Authenticated)?
            .json(input);
        self.send(request).await
    }

    /// Replace an address.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MissingToken`] when signed out, or an API error.
    #[instrument(skip(self, input), fields(address_id = %id))]
    pub async fn update_address(
        &self,
        id: AddressId,
        input: &AddressInput,
    ) -> Result<Address, ApiError> {
        let request = self
            .request(Method::PUT, &format!("addresses/{id}"), Access::Authenticated)?
            .json(input);
        self.send(request).await
    }

    /// Delete an address.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MissingToken`] when signed out, or an API error.
    #[instrument(skip(self), fields(address_id = %id))]
    pub async fn delete_address(&self, id: AddressId) -> Result<(), ApiError> {
        let request =
            self.request(Method::DELETE, &format!("addresses/{id}"), Access::Authenticated)?;
        self.send_empty(request).await
    }
}
