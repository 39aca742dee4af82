//! Address book hook.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::instrument;

use market_core::{AddressId, Page, PageParams};

use super::Resource;
use crate::api::{Address, AddressInput, ApiClient};
use crate::error::Result;

/// The signed-in shopper's saved addresses.
///
/// Every successful create/update/delete re-fetches the last requested page
/// so defaults and ordering always come from the API.
#[derive(Debug, Clone)]
pub struct AddressesHook {
    api: ApiClient,
    list: Resource<Page<Address>>,
    mutation: Resource<()>,
    last_params: Arc<RwLock<PageParams>>,
}

impl AddressesHook {
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            list: Resource::new(),
            mutation: Resource::new(),
            last_params: Arc::new(RwLock::new(PageParams::default())),
        }
    }

    #[must_use]
    pub const fn list(&self) -> &Resource<Page<Address>> {
        &self.list
    }

    #[must_use]
    pub const fn mutation(&self) -> &Resource<()> {
        &self.mutation
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.list.is_loading() || self.mutation.is_loading()
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.mutation.error().or_else(|| self.list.error())
    }

    /// Fetch a page of addresses.
    ///
    /// # Errors
    ///
    /// Returns an error when signed out or the API call fails.
    #[instrument(skip(self))]
    pub async fn fetch(&self, params: &PageParams) -> Result<Page<Address>> {
        *self
            .last_params
            .write()
            .unwrap_or_else(PoisonError::into_inner) = params.clone();
        self.list
            .run(async { Ok(self.api.list_addresses(params).await?) })
            .await
    }

    /// Fetch the last requested page again.
    async fn refetch(&self) {
        let params = self
            .last_params
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Err(e) = self.fetch(&params).await {
            tracing::warn!(error = %e, "Failed to refresh addresses");
        }
    }

    /// Save a new address.
    ///
    /// # Errors
    ///
    /// Returns an error when signed out or the API rejects the address.
    #[instrument(skip(self, input))]
    pub async fn create(&self, input: &AddressInput) -> Result<Address> {
        let address = self
            .mutation
            .track(async { Ok(self.api.create_address(input).await?) })
            .await?;
        self.refetch().await;
        Ok(address)
    }

    /// Replace an address.
    ///
    /// # Errors
    ///
    /// Returns an error when signed out or the API rejects the address.
    #[instrument(skip(self, input), fields(address_id = %id))]
    pub async fn update(&self, id: AddressId, input: &AddressInput) -> Result<Address> {
        let address = self
            .mutation
            .track(async { Ok(self.api.update_address(id, input).await?) })
            .await?;
        self.refetch().await;
        Ok(address)
    }

    /// Delete an address.
    ///
    /// # Errors
    ///
    /// Returns an error when signed out or the API call fails.
    #[instrument(skip(self), fields(address_id = %id))]
    pub async fn delete(&self, id: AddressId) -> Result<()> {
        self.mutation
            .track(async { Ok(self.api.delete_address(id).await?) })
            .await?;
        self.refetch().await;
        Ok(())
    }
}
