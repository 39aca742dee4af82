//! Checkout: turn the cart into an order and, for card payments, wait for
//! the payment to settle.
//!
//! The ordered lines leave the cart only once the order exists and (for card)
//! the payment completed. Anything added while the payment was pending stays.
//! Every failure path leaves the cart as it was so the shopper can try again.

use thiserror::Error;
use tokio::time::{self, MissedTickBehavior};
use tracing::instrument;

use market_core::{AddressId, PaymentMethod, PaymentStatus};

use crate::api::{ApiClient, ApiError, NewOrder, Order, Payment};
use crate::auth::{AuthContext, AuthError};
use crate::cart::CartStore;
use crate::config::PaymentPollConfig;
use crate::error::add_breadcrumb;

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// No usable session.
    #[error("auth error: {0}")]
    Auth(#[from] AuthError),

    /// Nothing to order.
    #[error("cart is empty")]
    EmptyCart,

    /// Creating the order or talking to the payment endpoints failed.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// The payment ended in a status other than completed.
    #[error("payment declined: {0:?}")]
    Declined(PaymentStatus),

    /// The payment was still pending when the poll cutoff passed.
    #[error("timed out waiting for payment")]
    Timeout,
}

impl CheckoutError {
    /// Message suitable for showing to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Auth(err) => err.user_message(),
            Self::EmptyCart => "Your cart is empty.".to_string(),
            Self::Api(err) => err.user_message(),
            Self::Declined(PaymentStatus::Cancelled) => {
                "The payment was cancelled. Your cart has been kept.".to_string()
            }
            Self::Declined(_) => {
                "Your payment was declined. Your cart has been kept.".to_string()
            }
            Self::Timeout => {
                "We could not confirm your payment in time. Check your orders before trying again."
                    .to_string()
            }
        }
    }

    #[must_use]
    pub const fn is_internal(&self) -> bool {
        match self {
            Self::Api(err) => err.is_server_error(),
            _ => false,
        }
    }
}

/// A placed order and, for card payments, its settled payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub order: Order,
    pub payment: Option<Payment>,
}

/// Places orders from the session's cart.
#[derive(Debug, Clone)]
pub struct Checkout {
    api: ApiClient,
    auth: AuthContext,
    cart: CartStore,
    poll: PaymentPollConfig,
}

impl Checkout {
    #[must_use]
    pub const fn new(
        api: ApiClient,
        auth: AuthContext,
        cart: CartStore,
        poll: PaymentPollConfig,
    ) -> Self {
        Self {
            api,
            auth,
            cart,
            poll,
        }
    }

    /// Order everything in the cart, shipped to `address_id`.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Auth`] without a session,
    /// [`CheckoutError::EmptyCart`] for an empty cart, an API error, or for
    /// card payments [`CheckoutError::Declined`] / [`CheckoutError::Timeout`].
    /// The cart is untouched on every error.
    #[instrument(skip(self), fields(address_id = %address_id))]
    pub async fn place_order(
        &self,
        address_id: AddressId,
        payment_method: PaymentMethod,
    ) -> Result<Receipt, CheckoutError> {
        self.auth.require_user()?;

        let cart = self.cart.snapshot();
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let order = self
            .api
            .create_order(&NewOrder::from_cart(&cart, address_id, payment_method))
            .await?;
        let order_id = order.id.to_string();
        add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_id.as_str())]));
        tracing::info!(order_id = %order.id, total = %order.total, "Order placed");

        let payment = if payment_method.requires_online_payment() {
            let payment = self.api.initiate_payment(order.id).await?;
            Some(self.await_payment(payment).await?)
        } else {
            None
        };

        self.cart.remove_ordered(&cart);
        Ok(Receipt { order, payment })
    }

    /// Poll a payment until it leaves `pending`, giving up after the
    /// configured timeout.
    ///
    /// # Errors
    ///
    /// Returns [`CheckoutError::Declined`] for a failed or cancelled payment,
    /// [`CheckoutError::Timeout`] at the cutoff, or an API error.
    #[instrument(skip(self, payment), fields(payment_id = %payment.id))]
    pub async fn await_payment(&self, payment: Payment) -> Result<Payment, CheckoutError> {
        let payment_id = payment.id;
        match time::timeout(self.poll.timeout, self.poll_until_settled(payment)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    payment_id = %payment_id,
                    timeout_secs = self.poll.timeout.as_secs(),
                    "Gave up waiting for payment"
                );
                Err(CheckoutError::Timeout)
            }
        }
    }

    async fn poll_until_settled(&self, mut payment: Payment) -> Result<Payment, CheckoutError> {
        let mut ticker = time::interval(self.poll.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            match payment.status {
                PaymentStatus::Completed => {
                    tracing::info!(payment_id = %payment.id, "Payment completed");
                    return Ok(payment);
                }
                PaymentStatus::Pending => {}
                status => {
                    tracing::info!(payment_id = %payment.id, ?status, "Payment declined");
                    return Err(CheckoutError::Declined(status));
                }
            }
            ticker.tick().await;
            payment = self.api.get_payment(payment.id).await?;
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use url::Url;

    use market_core::{Price, ProductId, ProductSnapshot};

    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore};

    fn checkout(cart: &CartStore) -> Checkout {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let api = ApiClient::new(&Url::parse("http://127.0.0.1:1/api").unwrap());
        let auth = AuthContext::new(api.clone(), &store).unwrap();
        Checkout::new(api, auth, cart.clone(), PaymentPollConfig::default())
    }

    #[tokio::test]
    async fn test_requires_session_and_keeps_cart() {
        let cart = CartStore::new();
        cart.add_to_cart(ProductSnapshot {
            id: ProductId::new(1),
            name: "Tea".to_string(),
            price: Price::from_cents(500),
            image_url: None,
        });

        let err = checkout(&cart)
            .place_order(AddressId::new(1), PaymentMethod::Card)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Auth(AuthError::NotSignedIn)));
        assert_eq!(cart.cart_quantity(), 1);
    }

    #[test]
    fn test_user_messages() {
        assert_eq!(CheckoutError::EmptyCart.user_message(), "Your cart is empty.");
        assert!(
            CheckoutError::Declined(PaymentStatus::Cancelled)
                .user_message()
                .contains("cancelled")
        );
        assert!(CheckoutError::Timeout.user_message().contains("in time"));
        assert!(!CheckoutError::Timeout.is_internal());
    }
}
