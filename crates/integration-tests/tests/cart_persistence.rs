//! Cart persistence through the file-backed store.

#![allow(clippy::unwrap_used)]

use std::path::PathBuf;

use market_core::{Price, ProductId, ProductSnapshot};
use market_integration_tests::MockApi;
use market_storefront::{Storefront, StorefrontConfig};

/// A scratch data directory removed on drop.
struct DataDir(PathBuf);

impl DataDir {
    fn new() -> Self {
        Self(std::env::temp_dir().join(format!("market-cart-{}", uuid::Uuid::new_v4())))
    }

    fn config(&self, api: &MockApi) -> StorefrontConfig {
        StorefrontConfig {
            data_dir: self.0.clone(),
            ..api.config()
        }
    }

    fn cart_file(&self) -> PathBuf {
        self.0.join("cart.json")
    }
}

impl Drop for DataDir {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.0).ok();
    }
}

fn mango() -> ProductSnapshot {
    ProductSnapshot {
        id: ProductId::new(1),
        name: "Dried Mango".to_string(),
        price: Price::from_cents(899),
        image_url: Some("/images/mango.png".to_string()),
    }
}

#[tokio::test]
async fn test_cart_survives_restart() {
    let api = MockApi::spawn().await.unwrap();
    let dir = DataDir::new();

    {
        let session = Storefront::new(dir.config(&api)).unwrap();
        session.cart().add_to_cart(mango());
        session.cart().increase_cart_quantity(ProductId::new(1));
        session.cart().add_to_cart(ProductSnapshot {
            id: ProductId::new(3),
            name: "Green Tea".to_string(),
            price: Price::from_cents(1200),
            image_url: None,
        });
        session.cart().remove_from_cart(ProductId::new(3));
    }

    let restarted = Storefront::new(dir.config(&api)).unwrap();
    let items = restarted.cart().items();
    assert_eq!(items.len(), 1);
    let line = items.first().unwrap();
    assert_eq!(line.id, ProductId::new(1));
    assert_eq!(line.quantity, 2);
    assert_eq!(line.price, Price::from_cents(899));
    assert_eq!(restarted.format_price(restarted.cart().subtotal()), "$17.98");
}

#[tokio::test]
async fn test_stored_layout_uses_camel_case_fields() {
    let api = MockApi::spawn().await.unwrap();
    let dir = DataDir::new();
    let session = Storefront::new(dir.config(&api)).unwrap();
    session.cart().add_to_cart(mango());

    let raw = std::fs::read_to_string(dir.cart_file()).unwrap();
    let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let line = stored.as_array().unwrap().first().unwrap();
    assert_eq!(line["id"], 1);
    assert_eq!(line["name"], "Dried Mango");
    assert_eq!(line["quantity"], 1);
    assert_eq!(line["imageUrl"], "/images/mango.png");
    assert!(line.get("image_url").is_none());
}

#[tokio::test]
async fn test_corrupt_cart_file_loads_empty() {
    let api = MockApi::spawn().await.unwrap();
    let dir = DataDir::new();
    std::fs::create_dir_all(&dir.0).unwrap();
    std::fs::write(dir.cart_file(), "{not json").unwrap();

    let session = Storefront::new(dir.config(&api)).unwrap();
    assert!(session.cart().is_empty());

    // The next change overwrites the bad payload.
    session.cart().add_to_cart(mango());
    let raw = std::fs::read_to_string(dir.cart_file()).unwrap();
    assert!(raw.starts_with('['));
}

#[tokio::test]
async fn test_hand_edited_cart_is_normalized() {
    let api = MockApi::spawn().await.unwrap();
    let dir = DataDir::new();
    std::fs::create_dir_all(&dir.0).unwrap();
    std::fs::write(
        dir.cart_file(),
        r#"[
            {"id": 1, "name": "Dried Mango", "price": 8.99, "quantity": 1},
            {"id": 4, "name": "Chai", "price": 9.25, "quantity": 0},
            {"id": 1, "name": "Dried Mango", "price": 8.99, "quantity": 2}
        ]"#,
    )
    .unwrap();

    let session = Storefront::new(dir.config(&api)).unwrap();
    assert_eq!(session.cart().items().len(), 1);
    assert_eq!(session.cart().get_item_quantity(ProductId::new(1)), 3);
    assert_eq!(session.cart().get_item_quantity(ProductId::new(4)), 0);
}
