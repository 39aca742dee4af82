//! Session state shared across the application.

use std::sync::Arc;

use market_core::{CurrencyCode, Price};

use crate::api::ApiClient;
use crate::auth::AuthContext;
use crate::cart::CartStore;
use crate::checkout::Checkout;
use crate::config::StorefrontConfig;
use crate::hooks::{AddressesHook, CategoriesHook, OrdersHook, ProductsHook};
use crate::storage::{FileStore, KeyValueStore, StorageError, StorageSlot, keys};

/// Everything one storefront session needs, wired together once.
///
/// This struct is cheaply cloneable via `Arc`; every clone shares the same
/// cart, session and API client.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    config: StorefrontConfig,
    api: ApiClient,
    store: Arc<dyn KeyValueStore>,
    cart: CartStore,
    auth: AuthContext,
}

impl std::fmt::Debug for Storefront {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storefront")
            .field("api", &self.inner.api)
            .field("cart", &self.inner.cart)
            .field("auth", &self.inner.auth)
            .finish_non_exhaustive()
    }
}

impl Storefront {
    /// Create a session backed by files under `config.data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created.
    pub fn new(config: StorefrontConfig) -> Result<Self, StorageError> {
        let store = FileStore::open(&config.data_dir)?;
        Self::with_store(config, Arc::new(store))
    }

    /// Create a session on top of any key-value store.
    ///
    /// Hydrates the cart and restores a remembered sign-in.
    ///
    /// # Errors
    ///
    /// Returns an error if a storage slot cannot be bound.
    pub fn with_store(
        config: StorefrontConfig,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, StorageError> {
        let api = ApiClient::new(&config.api_base_url);
        let cart = CartStore::hydrate(StorageSlot::new(Arc::clone(&store), keys::CART)?);
        let auth = AuthContext::new(api.clone(), &store)?;
        auth.restore();

        tracing::info!(
            api = %config.api_base_url,
            cart_lines = cart.items().len(),
            signed_in = auth.is_authenticated(),
            "Storefront session ready"
        );

        Ok(Self {
            inner: Arc::new(StorefrontInner {
                config,
                api,
                store,
                cart,
                auth,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    /// The key-value store backing the cart and remembered session.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.inner.store
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    #[must_use]
    pub fn auth(&self) -> &AuthContext {
        &self.inner.auth
    }

    #[must_use]
    pub fn currency(&self) -> CurrencyCode {
        self.inner.config.currency
    }

    /// Format `price` in the configured display currency.
    #[must_use]
    pub fn format_price(&self, price: Price) -> String {
        price.display(self.currency())
    }

    #[must_use]
    pub fn products(&self) -> ProductsHook {
        ProductsHook::new(self.inner.api.clone(), self.inner.auth.clone())
    }

    #[must_use]
    pub fn categories(&self) -> CategoriesHook {
        CategoriesHook::new(self.inner.api.clone(), self.inner.auth.clone())
    }

    #[must_use]
    pub fn addresses(&self) -> AddressesHook {
        AddressesHook::new(self.inner.api.clone())
    }

    #[must_use]
    pub fn orders(&self) -> OrdersHook {
        OrdersHook::new(self.inner.api.clone(), self.inner.auth.clone())
    }

    #[must_use]
    pub fn checkout(&self) -> Checkout {
        Checkout::new(
            self.inner.api.clone(),
            self.inner.auth.clone(),
            self.inner.cart.clone(),
            self.inner.config.payment_poll,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use url::Url;

    use market_core::{ProductId, ProductSnapshot};

    use super::*;
    use crate::storage::MemoryStore;

    fn config() -> StorefrontConfig {
        StorefrontConfig::for_api(Url::parse("http://localhost:8000/api").unwrap())
    }

    #[test]
    fn test_clones_share_the_cart() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let storefront = Storefront::with_store(config(), store).unwrap();
        let other = storefront.clone();

        storefront.cart().add_to_cart(ProductSnapshot {
            id: ProductId::new(3),
            name: "Tea".to_string(),
            price: Price::from_cents(1250),
            image_url: None,
        });
        assert_eq!(other.cart().get_item_quantity(ProductId::new(3)), 1);
        assert_eq!(other.format_price(other.cart().subtotal()), "$12.50");
    }

    #[test]
    fn test_session_survives_restart() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        {
            let storefront = Storefront::with_store(config(), Arc::clone(&store)).unwrap();
            storefront.cart().add_to_cart(ProductSnapshot {
                id: ProductId::new(8),
                name: "Mango".to_string(),
                price: Price::from_cents(899),
                image_url: Some("/m.png".to_string()),
            });
            storefront.cart().increase_cart_quantity(ProductId::new(8));
        }

        let restarted = Storefront::with_store(config(), store).unwrap();
        assert_eq!(restarted.cart().get_item_quantity(ProductId::new(8)), 2);
        assert!(!restarted.auth().is_authenticated());
    }

    #[test]
    fn test_file_backed_session() {
        let dir = std::env::temp_dir().join(format!("market-state-{}", uuid::Uuid::new_v4()));
        let config = StorefrontConfig {
            data_dir: dir.clone(),
            ..config()
        };

        let storefront = Storefront::new(config).unwrap();
        storefront.cart().add_to_cart(ProductSnapshot {
            id: ProductId::new(1),
            name: "Tea".to_string(),
            price: Price::from_cents(100),
            image_url: None,
        });
        assert!(dir.join("cart.json").exists());

        std::fs::remove_dir_all(dir).unwrap();
    }
}
