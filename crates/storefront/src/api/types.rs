//! Request and response bodies for the Market REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use market_core::{
    AddressId, Cart, CategoryId, OrderId, OrderStatus, PaymentId, PaymentMethod, PaymentStatus,
    Price, ProductId, ProductSnapshot,
};

// =============================================================================
// Catalog
// =============================================================================

/// A product as listed by the catalog endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Price,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

impl Product {
    /// The fields the cart snapshots when this product is added.
    #[must_use]
    pub fn snapshot(&self) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id,
            name: self.name.clone(),
            price: self.price,
            image_url: self.image_url.clone(),
        }
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Body for creating or updating a product (admin).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: Price,
    pub stock: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Body for creating or updating a category (admin).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryInput {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// =============================================================================
// Account
// =============================================================================

/// Successful login response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// A saved shipping address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub id: AddressId,
    pub recipient_name: String,
    pub street: String,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Body for creating or updating an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressInput {
    pub recipient_name: String,
    pub street: String,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
    pub phone: String,
    pub is_default: bool,
}

// =============================================================================
// Orders & Payments
// =============================================================================

/// One product line of an order request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Body for placing an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrder {
    pub address_id: AddressId,
    pub payment_method: PaymentMethod,
    pub items: Vec<OrderLine>,
}

impl NewOrder {
    /// Build an order request from the cart's current lines.
    ///
    /// Only ids and quantities are sent; the API prices the order from the
    /// catalog, not from the cart's snapshots.
    #[must_use]
    pub fn from_cart(cart: &Cart, address_id: AddressId, payment_method: PaymentMethod) -> Self {
        Self {
            address_id,
            payment_method,
            items: cart
                .items()
                .iter()
                .map(|item| OrderLine {
                    product_id: item.id,
                    quantity: item.quantity,
                })
                .collect(),
        }
    }
}

/// A line of a placed order, priced by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: ProductId,
    #[serde(default)]
    pub name: Option<String>,
    pub price: Price,
    pub quantity: u32,
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub total: Price,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub address_id: Option<AddressId>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body for an admin order status change.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OrderStatusUpdate {
    pub status: OrderStatus,
}

/// Body for initiating an online payment.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PaymentRequest {
    pub order_id: OrderId,
}

/// Payment state for an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub status: PaymentStatus,
    /// Hosted payment page the shopper completes the payment on, if any.
    #[serde(default)]
    pub checkout_url: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_product_snapshot() {
        let product: Product = serde_json::from_str(
            r#"{"id": 4, "name": "Tea", "price": 12.5, "stock": 0, "image_url": "/t.png"}"#,
        )
        .unwrap();

        assert!(!product.in_stock());
        let snapshot = product.snapshot();
        assert_eq!(snapshot.id, ProductId::new(4));
        assert_eq!(snapshot.price, Price::from_cents(1250));
        assert_eq!(snapshot.image_url.as_deref(), Some("/t.png"));
    }

    #[test]
    fn test_new_order_from_cart() {
        let mut cart = Cart::new();
        cart.add(ProductSnapshot {
            id: ProductId::new(1),
            name: "A".to_string(),
            price: Price::from_cents(100),
            image_url: None,
        });
        cart.increase(ProductId::new(1));

        let order = NewOrder::from_cart(&cart, AddressId::new(3), PaymentMethod::Card);
        assert_eq!(
            serde_json::to_value(&order).unwrap(),
            serde_json::json!({
                "address_id": 3,
                "payment_method": "card",
                "items": [{"product_id": 1, "quantity": 2}]
            })
        );
    }

    #[test]
    fn test_order_deserializes_minimal_body() {
        let order: Order = serde_json::from_str(
            r#"{"id": 9, "status": "paid", "total": 20, "payment_method": "cash_on_delivery"}"#,
        )
        .unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert!(order.items.is_empty());
        assert_eq!(order.created_at, None);
    }
}
