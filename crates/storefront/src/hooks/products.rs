//! Product catalog hook.

use tracing::instrument;

use market_core::{CategoryId, Page, PageParams, ProductId};

use super::Resource;
use crate::api::{ApiClient, Product, ProductInput};
use crate::auth::AuthContext;
use crate::error::Result;

/// Product listing, product detail and (admin) product editing.
#[derive(Debug, Clone)]
pub struct ProductsHook {
    api: ApiClient,
    auth: AuthContext,
    list: Resource<Page<Product>>,
    detail: Resource<Product>,
    mutation: Resource<()>,
}

impl ProductsHook {
    #[must_use]
    pub fn new(api: ApiClient, auth: AuthContext) -> Self {
        Self {
            api,
            auth,
            list: Resource::new(),
            detail: Resource::new(),
            mutation: Resource::new(),
        }
    }

    /// The last product page.
    #[must_use]
    pub const fn list(&self) -> &Resource<Page<Product>> {
        &self.list
    }

    /// The last product fetched by id.
    #[must_use]
    pub const fn detail(&self) -> &Resource<Product> {
        &self.detail
    }

    /// The last admin create/update/delete.
    #[must_use]
    pub const fn mutation(&self) -> &Resource<()> {
        &self.mutation
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.list.is_loading() || self.detail.is_loading() || self.mutation.is_loading()
    }

    /// The most relevant error message: a failed edit, else a failed listing.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.mutation.error().or_else(|| self.list.error())
    }

    /// Fetch a page of products, optionally within one category.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    #[instrument(skip(self))]
    pub async fn fetch(
        &self,
        params: &PageParams,
        category: Option<CategoryId>,
    ) -> Result<Page<Product>> {
        self.list
            .run(async { Ok(self.api.list_products(params, category).await?) })
            .await
    }

    /// Fetch one product.
    ///
    /// # Errors
    ///
    /// Returns an error if the product does not exist or the call fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn fetch_one(&self, id: ProductId) -> Result<Product> {
        self.detail
            .run(async { Ok(self.api.get_product(id).await?) })
            .await
    }

    /// Create a product (admin).
    ///
    /// # Errors
    ///
    /// Returns an auth error without calling the API when the session is not
    /// an admin, or the API error.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: &ProductInput) -> Result<Product> {
        self.mutation
            .track(async {
                self.auth.require_admin()?;
                Ok(self.api.create_product(input).await?)
            })
            .await
    }

    /// Update a product (admin). A matching row in the current page and
    /// the detail view are replaced with the result.
    ///
    /// # Errors
    ///
    /// Returns an auth error without calling the API when the session is not
    /// an admin, or the API error.
    #[instrument(skip(self, input), fields(product_id = %id))]
    pub async fn update(&self, id: ProductId, input: &ProductInput) -> Result<Product> {
        let product = self
            .mutation
            .track(async {
                self.auth.require_admin()?;
                Ok(self.api.update_product(id, input).await?)
            })
            .await?;

        self.list.modify(|page| {
            if let Some(row) = page.items.iter_mut().find(|p| p.id == id) {
                *row = product.clone();
            }
        });
        self.detail.modify(|current| {
            if current.id == id {
                *current = product.clone();
            }
        });
        Ok(product)
    }

    /// Delete a product (admin) and drop it from the current page.
    ///
    /// # Errors
    ///
    /// Returns an auth error without calling the API when the session is not
    /// an admin, or the API error.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete(&self, id: ProductId) -> Result<()> {
        self.mutation
            .track(async {
                self.auth.require_admin()?;
                Ok(self.api.delete_product(id).await?)
            })
            .await?;

        self.list.modify(|page| {
            let before = page.items.len();
            page.items.retain(|p| p.id != id);
            if page.items.len() < before {
                page.total = page.total.saturating_sub(1);
            }
        });
        Ok(())
    }
}
