//! Category hook.

use tracing::instrument;

use market_core::{CategoryId, Page, PageParams};

use super::Resource;
use crate::api::{ApiClient, Category, CategoryInput};
use crate::auth::AuthContext;
use crate::error::Result;

/// Category listing and (admin) category editing.
#[derive(Debug, Clone)]
pub struct CategoriesHook {
    api: ApiClient,
    auth: AuthContext,
    list: Resource<Page<Category>>,
    mutation: Resource<()>,
}

impl CategoriesHook {
    #[must_use]
    pub fn new(api: ApiClient, auth: AuthContext) -> Self {
        Self {
            api,
            auth,
            list: Resource::new(),
            mutation: Resource::new(),
        }
    }

    #[must_use]
    pub const fn list(&self) -> &Resource<Page<Category>> {
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

    /// Fetch a page of categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API call fails.
    #[instrument(skip(self))]
    pub async fn fetch(&self, params: &PageParams) -> Result<Page<Category>> {
        self.list
            .run(async { Ok(self.api.list_categories(params).await?) })
            .await
    }

    /// Create a category (admin) and append it to the current page.
    ///
    /// # Errors
    ///
    /// Returns an auth error without calling the API when the session is not
    /// an admin, or the API error.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: &CategoryInput) -> Result<Category> {
        let category = self
            .mutation
            .track(async {
                self.auth.require_admin()?;
                Ok(self.api.create_category(input).await?)
            })
            .await?;

        self.list.modify(|page| {
            page.items.push(category.clone());
            page.total += 1;
        });
        Ok(category)
    }

    /// Update a category (admin).
    ///
    /// # Errors
    ///
    /// Returns an auth error without calling the API when the session is not
    /// an admin, or the API error.
    #[instrument(skip(self, input), fields(category_id = %id))]
    pub async fn update(&self, id: CategoryId, input: &CategoryInput) -> Result<Category> {
        let category = self
            .mutation
            .track(async {
                self.auth.require_admin()?;
                Ok(self.api.update_category(id, input).await?)
            })
            .await?;

        self.list.modify(|page| {
            if let Some(row) = page.items.iter_mut().find(|c| c.id == id) {
                *row = category.clone();
            }
        });
        Ok(category)
    }

    /// Delete a category (admin).
    ///
    /// # Errors
    ///
    /// Returns an auth error without calling the API when the session is not
    /// an admin, or the API error.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn delete(&self, id: CategoryId) -> Result<()> {
        self.mutation
            .track(async {
                self.auth.require_admin()?;
                Ok(self.api.delete_category(id).await?)
            })
            .await?;

        self.list.modify(|page| {
            let before = page.items.len();
            page.items.retain(|c| c.id != id);
            if page.items.len() < before {
                page.total = page.total.saturating_sub(1);
            }
        });
        Ok(())
    }
}
