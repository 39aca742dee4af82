//! Order history and order management hook.

use tracing::instrument;

use market_core::{OrderId, OrderStatus, Page, PageParams};

use super::Resource;
use crate::api::{ApiClient, Order};
use crate::auth::AuthContext;
use crate::error::Result;

/// The shopper's own orders, and every order for admins.
#[derive(Debug, Clone)]
pub struct OrdersHook {
    api: ApiClient,
    auth: AuthContext,
    list: Resource<Page<Order>>,
    mutation: Resource<()>,
}

impl OrdersHook {
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
    pub const fn list(&self) -> &Resource<Page<Order>> {
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

    /// Fetch a page of the signed-in shopper's orders.
    ///
    /// # Errors
    ///
    /// Returns an error when signed out or the API call fails.
    #[instrument(skip(self))]
    pub async fn fetch_mine(&self, params: &PageParams) -> Result<Page<Order>> {
        self.list
            .run(async { Ok(self.api.list_orders(params).await?) })
            .await
    }

    /// Fetch a page of all orders (admin).
    ///
    /// # Errors
    ///
    /// Returns an auth error without calling the API when the session is not
    /// an admin, or the API error.
    #[instrument(skip(self))]
    pub async fn fetch_all(&self, params: &PageParams) -> Result<Page<Order>> {
        self.list
            .run(async {
                self.auth.require_admin()?;
                Ok(self.api.list_all_orders(params).await?)
            })
            .await
    }

    /// Move an order to `status` (admin). The order is replaced in the
    /// current page.
    ///
    /// # Errors
    ///
    /// Returns an auth error without calling the API when the session is not
    /// an admin, or the API error.
    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    pub async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let order = self
            .mutation
            .track(async {
                self.auth.require_admin()?;
                Ok(self.api.update_order_status(id, status).await?)
            })
            .await?;

        self.list.modify(|page| {
            if let Some(row) = page.items.iter_mut().find(|o| o.id == id) {
                *row = order.clone();
            }
        });
        tracing::info!(order_id = %id, status = %order.status, "Order status updated");
        Ok(order)
    }
}
