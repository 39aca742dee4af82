//! Product and category endpoints.

use reqwest::Method;
use tracing::instrument;

use market_core::{CategoryId, Page, PageParams, ProductId};

use super::{Access, ApiClient, ApiError, Category, CategoryInput, Product, ProductInput};

impl ApiClient {
    // =========================================================================
    // Products
    // =========================================================================

    /// List products, optionally restricted to a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        params: &PageParams,
        category: Option<CategoryId>,
    ) -> Result<Page<Product>, ApiError> {
        let mut request = self
            .request(Method::GET, "products", Access::Public)?
            .query(params);
        if let Some(category) = category {
            request = request.query(&[("category_id", category.as_i32())]);
        }
        self.send(request).await
    }

    /// Get a single product.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] if the product does not exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ApiError> {
        let request = self.request(Method::GET, &format!("products/{id}"), Access::Public)?;
        self.send(request).await
    }

    /// Create a product (admin).
    ///
    /// # Errors
    ///
    /// Returns an error if the request is rejected or fails.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: &ProductInput) -> Result<Product, ApiError> {
        let request = self
            .request(Method::POST, "products", Access::Authenticated)?
            .json(input);
        self.send(request).await
    }

    /// Replace a product's fields (admin).
    ///
    /// # Errors
    ///
    /// Returns an error if the request is rejected or fails.
    #[instrument(skip(self, input), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: ProductId,
        input: &ProductInput,
    ) -> Result<Product, ApiError> {
        let request = self
            .request(Method::PUT, &format!("products/{id}"), Access::Authenticated)?
            .json(input);
        self.send(request).await
    }

    /// Delete a product (admin).
    ///
    /// # Errors
    ///
    /// Returns an error if the request is rejected or fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), ApiError> {
        let request =
            self.request(Method::DELETE, &format!("products/{id}"), Access::Authenticated)?;
        self.send_empty(request).await
    }

    // =========================================================================
    // Categories
    // =========================================================================

    /// List categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self))]
    pub async fn list_categories(&self, params: &PageParams) -> Result<Page<Category>, ApiError> {
        let request = self
            .request(Method::GET, "categories", Access::Public)?
            .query(params);
        self.send(request).await
    }

    /// Create a category (admin).
    ///
    /// # Errors
    ///
    /// Returns an error if the request is rejected or fails.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_category(&self, input: &CategoryInput) -> Result<Category, ApiError> {
        let request = self
            .request(Method::POST, "categories", Access::Authenticated)?
            .json(input);
        self.send(request).await
    }

    /// Rename or redescribe a category (admin).
    ///
    /// # Errors
    ///
    /// Returns an error if the request is rejected or fails.
    #[instrument(skip(self, input), fields(category_id = %id))]
    pub async fn update_category(
        &self,
        id: CategoryId,
        input: &CategoryInput,
    ) -> Result<Category, ApiError> {
        let request = self
            .request(Method::PUT, &format!("categories/{id}"), Access::Authenticated)?
            .json(input);
        self.send(request).await
    }

    /// Delete a category (admin).
    ///
    /// # Errors
    ///
    /// Returns an error if the request is rejected or fails.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn delete_category(&self, id: CategoryId) -> Result<(), ApiError> {
        let request =
            self.request(Method::DELETE, &format!("categories/{id}"), Access::Authenticated)?;
        self.send_empty(request).await
    }
}
