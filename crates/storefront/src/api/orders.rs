//! Order and payment endpoints.

use reqwest::Method;
use tracing::instrument;

use market_core::{OrderId, OrderStatus, Page, PageParams, PaymentId};

use super::{
    Access, ApiClient, ApiError, NewOrder, Order, OrderStatusUpdate, Payment, PaymentRequest,
};

impl ApiClient {
    /// Place an order.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MissingToken`] when signed out, or an API error
    /// (e.g., out of stock, unknown address).
    #[instrument(skip(self, order), fields(address_id = %order.address_id, lines = order.items.len()))]
    pub async fn create_order(&self, order: &NewOrder) -> Result<Order, ApiError> {
        let request = self
            .request(Method::POST, "orders", Access::Authenticated)?
            .json(order);
        self.send(request).await
    }

    /// List the signed-in user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::MissingToken`] when signed out, or an API error.
    #[instrument(skip(self))]
    pub async fn list_orders(&self, params: &PageParams) -> Result<Page<Order>, ApiError> {
        let request = self
            .request(Method::GET, "orders", Access::Authenticated)?
            .query(params);
        self.send(request).await
    }

    /// List every customer's orders (admin).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Forbidden`] for non-admin tokens, or an API error.
    #[instrument(skip(self))]
    pub async fn list_all_orders(&self, params: &PageParams) -> Result<Page<Order>, ApiError> {
        let request = self
            .request(Method::GET, "admin/orders", Access::Authenticated)?
            .query(params);
        self.send(request).await
    }

    /// Move an order to a new status (admin).
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the transition or the call fails.
    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    pub async fn update_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, ApiError> {
        let request = self
            .request(Method::PATCH, &format!("orders/{id}/status"), Access::Authenticated)?
            .json(&OrderStatusUpdate { status });
        self.send(request).await
    }

    /// Start an online payment for an order.
    ///
    /// # Errors
    ///
    /// Returns an error if the API refuses the payment or the call fails.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn initiate_payment(&self, order_id: OrderId) -> Result<Payment, ApiError> {
        let request = self
            .request(Method::POST, "payments", Access::Authenticated)?
            .json(&PaymentRequest { order_id });
        self.send(request).await
    }

    /// Fetch the current state of a payment.
    ///
    /// # Errors
    ///
    /// Returns an error if the payment is unknown or the call fails.
    #[instrument(skip(self), fields(payment_id = %id))]
    pub async fn get_payment(&self, id: PaymentId) -> Result<Payment, ApiError> {
        let request = self.request(Method::GET, &format!("payments/{id}"), Access::Authenticated)?;
        self.send(request).await
    }
}
