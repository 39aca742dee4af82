//! Address book and order history against the mock API.

#![allow(clippy::unwrap_used)]

use market_core::{OrderStatus, PageParams, PaymentMethod, ProductId};
use market_integration_tests::{
    ADMIN_EMAIL, ADMIN_PASSWORD, CUSTOMER_EMAIL, CUSTOMER_PASSWORD, MockApi, sign_in, storefront,
};
use market_storefront::api::ApiError;
use market_storefront::auth::AuthError;
use market_storefront::validation::AddressForm;
use market_storefront::{AppError, Storefront};

fn home() -> AddressForm {
    AddressForm {
        recipient_name: "Grace Hopper".to_string(),
        street: "1 Harbor Road".to_string(),
        city: "Arlington".to_string(),
        state: Some("VA".to_string()),
        postal_code: "22201".to_string(),
        country: "US".to_string(),
        phone: "7035550100".to_string(),
        is_default: false,
    }
}

fn office() -> AddressForm {
    AddressForm {
        recipient_name: "Grace Hopper".to_string(),
        street: "200 Navy Yard".to_string(),
        city: "Washington".to_string(),
        state: Some("DC".to_string()),
        postal_code: "20374".to_string(),
        ..home()
    }
}

async fn customer(api: &MockApi) -> Storefront {
    let session = storefront(api).unwrap();
    sign_in(&session, CUSTOMER_EMAIL, CUSTOMER_PASSWORD, false)
        .await
        .unwrap();
    session
}

async fn admin(api: &MockApi) -> Storefront {
    let session = storefront(api).unwrap();
    sign_in(&session, ADMIN_EMAIL, ADMIN_PASSWORD, false)
        .await
        .unwrap();
    session
}

// =============================================================================
// Addresses
// =============================================================================

#[tokio::test]
async fn test_first_address_becomes_default_and_list_refreshes() {
    let api = MockApi::spawn().await.unwrap();
    let addresses = customer(&api).await.addresses();

    let first = addresses
        .create(&home().validate().unwrap())
        .await
        .unwrap();
    assert!(first.is_default);

    let page = addresses.list().data().unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items.first().unwrap().id, first.id);
    assert_eq!(api.state().count("GET", "/api/addresses"), 1);

    let second = addresses
        .create(&office().validate().unwrap())
        .await
        .unwrap();
    assert!(!second.is_default);
    assert_eq!(addresses.list().data().unwrap().total, 2);
    assert_eq!(addresses.error(), None);
}

#[tokio::test]
async fn test_update_and_delete_refetch_last_page() {
    let api = MockApi::spawn().await.unwrap();
    let addresses = customer(&api).await.addresses();
    let first = addresses
        .create(&home().validate().unwrap())
        .await
        .unwrap();
    let second = addresses
        .create(&office().validate().unwrap())
        .await
        .unwrap();

    let promoted = AddressForm {
        is_default: true,
        ..office()
    };
    addresses
        .update(second.id, &promoted.validate().unwrap())
        .await
        .unwrap();
    let page = addresses.list().data().unwrap();
    let defaults: Vec<_> = page.items.iter().filter(|a| a.is_default).collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults.first().unwrap().id, second.id);

    addresses.delete(first.id).await.unwrap();
    let page = addresses.list().data().unwrap();
    assert_eq!(page.total, 1);
    assert!(page.items.iter().all(|a| a.id != first.id));
}

#[tokio::test]
async fn test_failed_mutation_keeps_list() {
    let api = MockApi::spawn().await.unwrap();
    let addresses = customer(&api).await.addresses();
    let saved = addresses
        .create(&home().validate().unwrap())
        .await
        .unwrap();

    let err = addresses
        .delete(market_core::AddressId::new(9999))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Api(ApiError::NotFound(_))));
    assert_eq!(addresses.error().as_deref(), Some("Address not found"));

    let page = addresses.list().data().unwrap();
    assert_eq!(page.items.first().unwrap().id, saved.id);
}

// =============================================================================
// Orders
// =============================================================================

#[tokio::test]
async fn test_order_history_and_admin_status_update() {
    let api = MockApi::spawn().await.unwrap();
    let shopper = customer(&api).await;
    let address = shopper
        .addresses()
        .create(&home().validate().unwrap())
        .await
        .unwrap();
    let chai = shopper
        .products()
        .fetch_one(ProductId::new(4))
        .await
        .unwrap();
    shopper.cart().add_to_cart(chai.snapshot());
    let receipt = shopper
        .checkout()
        .place_order(address.id, PaymentMethod::CashOnDelivery)
        .await
        .unwrap();

    let mine = shopper
        .orders()
        .fetch_mine(&PageParams::default())
        .await
        .unwrap();
    assert_eq!(mine.total, 1);
    assert_eq!(mine.items.first().unwrap().id, receipt.order.id);

    let staff = admin(&api).await;
    let orders = staff.orders();
    let all = orders.fetch_all(&PageParams::default()).await.unwrap();
    assert_eq!(all.total, 1);

    let shipped = orders
        .update_status(receipt.order.id, OrderStatus::Shipped)
        .await
        .unwrap();
    assert_eq!(shipped.status, OrderStatus::Shipped);
    let row = orders.list().data().unwrap();
    assert_eq!(row.items.first().unwrap().status, OrderStatus::Shipped);

    orders
        .update_status(receipt.order.id, OrderStatus::Cancelled)
        .await
        .unwrap();
    let err = orders
        .update_status(receipt.order.id, OrderStatus::Processing)
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Order is already cancelled");
    assert_eq!(
        orders.list().data().unwrap().items.first().unwrap().status,
        OrderStatus::Cancelled
    );
}

#[tokio::test]
async fn test_customer_cannot_list_all_orders() {
    let api = MockApi::spawn().await.unwrap();
    let orders = customer(&api).await.orders();

    let err = orders.fetch_all(&PageParams::default()).await.unwrap_err();
    assert!(matches!(err, AppError::Auth(AuthError::Forbidden)));
    assert!(orders.list().error().is_some());
    assert_eq!(api.state().count("GET", "/api/admin/orders"), 0);
}
