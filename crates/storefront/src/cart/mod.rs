//! Session-wide shopping cart store.
//!
//! [`CartStore`] owns the authoritative [`Cart`] for a session and is shared
//! by handle: every clone sees the same collection, so the navbar badge, the
//! cart dropdown and the cart page never disagree.
//!
//! Mutations emit a [`CartEvent`] to subscribed [`CartListener`]s once the
//! collection has changed. Persistence is one such listener
//! ([`CartPersistence`]), attached by [`CartStore::hydrate`]; the mutation
//! methods know nothing about storage.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use market_core::{Price, ProductId, ProductSnapshot};
//! use market_storefront::cart::CartStore;
//! use market_storefront::storage::{KeyValueStore, MemoryStore, StorageSlot, keys};
//!
//! let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
//! let slot = StorageSlot::new(store, keys::CART).unwrap();
//! let cart = CartStore::hydrate(slot);
//!
//! cart.add_to_cart(ProductSnapshot {
//!     id: ProductId::new(1),
//!     name: "Dried Mango".to_string(),
//!     price: Price::from_cents(899),
//!     image_url: None,
//! });
//! assert_eq!(cart.cart_quantity(), 1);
//! ```

mod persistence;

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use market_core::{Cart, CartLineItem, Price, ProductId, ProductSnapshot};

use crate::error::add_breadcrumb;
use crate::storage::StorageSlot;

pub use persistence::CartPersistence;

/// What changed in the cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartEvent {
    /// A product was added, either as a new line or by bumping an existing one.
    Added { id: ProductId, quantity: u32 },
    /// An existing line's quantity went up.
    Increased { id: ProductId, quantity: u32 },
    /// An existing line's quantity went down but stayed above zero.
    Decreased { id: ProductId, quantity: u32 },
    /// A line left the cart (explicit removal or decrease to zero).
    Removed { id: ProductId },
    /// The units of a placed order were taken out of the cart.
    Ordered { lines: usize },
    /// The cart was emptied.
    Cleared,
}

/// Receives cart changes after they are applied.
///
/// Listeners run synchronously on the mutating thread and may read the store,
/// but must not mutate it.
pub trait CartListener: Send + Sync {
    fn on_change(&self, event: &CartEvent, cart: &Cart);
}

impl<F> CartListener for F
where
    F: Fn(&CartEvent, &Cart) + Send + Sync,
{
    fn on_change(&self, event: &CartEvent, cart: &Cart) {
        self(event, cart);
    }
}

/// Shared handle to the session cart.
#[derive(Clone, Default)]
pub struct CartStore {
    inner: Arc<CartStoreInner>,
}

#[derive(Default)]
struct CartStoreInner {
    cart: RwLock<Cart>,
    listeners: RwLock<Vec<Arc<dyn CartListener>>>,
    // Serializes mutate-then-notify so listeners observe events in order.
    notify: Mutex<()>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("cart", &self.snapshot())
            .finish_non_exhaustive()
    }
}

impl CartStore {
    /// An empty cart with no persistence attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cart from `slot` (empty when the slot is missing or
    /// unreadable) and persist every later change back to it.
    #[must_use]
    pub fn hydrate(slot: StorageSlot<Cart>) -> Self {
        let cart = slot.read();
        tracing::debug!(
            key = slot.key(),
            lines = cart.len(),
            quantity = cart.total_quantity(),
            "Hydrated cart"
        );

        let store = Self {
            inner: Arc::new(CartStoreInner {
                cart: RwLock::new(cart),
                ..CartStoreInner::default()
            }),
        };
        store.subscribe(CartPersistence::new(slot));
        store
    }

    /// Register a listener for future changes.
    pub fn subscribe(&self, listener: impl CartListener + 'static) {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// Apply `mutation` and, if it produced an event, notify listeners.
    fn mutate<F>(&self, mutation: F) -> Option<CartEvent>
    where
        F: FnOnce(&mut Cart) -> Option<CartEvent>,
    {
        let _ordering = self
            .inner
            .notify
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let (event, snapshot) = {
            let mut cart = self
                .inner
                .cart
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let event = mutation(&mut cart)?;
            (event, cart.clone())
        };

        tracing::debug!(?event, quantity = snapshot.total_quantity(), "Cart changed");

        let listeners = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in &listeners {
            listener.on_change(&event, &snapshot);
        }

        Some(event)
    }

    fn read<R>(&self, f: impl FnOnce(&Cart) -> R) -> R {
        f(&self
            .inner
            .cart
            .read()
            .unwrap_or_else(PoisonError::into_inner))
    }

    /// Add one unit of a product, creating the line if needed.
    ///
    /// The name, price and image of an existing line are not refreshed.
    pub fn add_to_cart(&self, product: ProductSnapshot) {
        let id = product.id;
        add_breadcrumb(
            "cart",
            "Added to cart",
            Some(&[("product_id", id.to_string().as_str())]),
        );
        self.mutate(|cart| {
            let quantity = cart.add(product);
            Some(CartEvent::Added { id, quantity })
        });
    }

    /// Increment a line's quantity. No-op if the product is not in the cart.
    pub fn increase_cart_quantity(&self, id: ProductId) {
        self.mutate(|cart| {
            cart.increase(id)
                .map(|quantity| CartEvent::Increased { id, quantity })
        });
    }

    /// Decrement a line's quantity, removing the line at zero. No-op if the
    /// product is not in the cart.
    pub fn decrease_cart_quantity(&self, id: ProductId) {
        self.mutate(|cart| {
            cart.decrease(id).map(|quantity| match quantity {
                0 => CartEvent::Removed { id },
                quantity => CartEvent::Decreased { id, quantity },
            })
        });
    }

    /// Remove a line regardless of quantity. No-op if absent.
    pub fn remove_from_cart(&self, id: ProductId) {
        let removed = self.mutate(|cart| cart.remove(id).then_some(CartEvent::Removed { id }));
        if removed.is_some() {
            add_breadcrumb(
                "cart",
                "Removed from cart",
                Some(&[("product_id", id.to_string().as_str())]),
            );
        }
    }

    /// Take the lines of a placed order out of the cart.
    ///
    /// `ordered` is the snapshot the order was built from; anything added
    /// since then stays in the cart.
    pub fn remove_ordered(&self, ordered: &Cart) {
        let lines = ordered.len();
        let event = self.mutate(|cart| {
            cart.deduct(ordered)
                .then_some(CartEvent::Ordered { lines })
        });
        if event.is_some() {
            add_breadcrumb("cart", "Removed ordered items", None);
        }
    }

    /// Empty the cart. Always notifies, so the empty state is persisted even
    /// when the cart was already empty.
    pub fn clear_cart(&self) {
        add_breadcrumb("cart", "Cleared cart", None);
        self.mutate(|cart| {
            cart.clear();
            Some(CartEvent::Cleared)
        });
    }

    /// Quantity of a product in the cart, 0 if absent.
    #[must_use]
    pub fn get_item_quantity(&self, id: ProductId) -> u32 {
        self.read(|cart| cart.quantity_of(id))
    }

    /// Total units across all lines, recomputed on every call.
    #[must_use]
    pub fn cart_quantity(&self) -> u32 {
        self.read(Cart::total_quantity)
    }

    /// Sum of line totals at the snapshotted prices.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.read(Cart::subtotal)
    }

    /// Copy of the line items in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<CartLineItem> {
        self.read(|cart| cart.items().to_vec())
    }

    /// Copy of the whole cart.
    #[must_use]
    pub fn snapshot(&self) -> Cart {
        self.read(Cart::clone)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read(Cart::is_empty)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore, keys};

    fn product(id: i32, name: &str, cents: i64) -> ProductSnapshot {
        ProductSnapshot {
            id: ProductId::new(id),
            name: name.to_string(),
            price: Price::from_cents(cents),
            image_url: Some(format!("/images/{id}.png")),
        }
    }

    fn slot(store: &Arc<dyn KeyValueStore>) -> StorageSlot<Cart> {
        StorageSlot::new(Arc::clone(store), keys::CART).unwrap()
    }

    fn recording(store: &CartStore) -> Arc<Mutex<Vec<CartEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        store.subscribe(move |event: &CartEvent, _cart: &Cart| {
            sink.lock().unwrap().push(*event);
        });
        events
    }

    #[test]
    fn test_add_twice_yields_one_line() {
        let cart = CartStore::new();
        cart.add_to_cart(product(1, "A", 1000));
        cart.add_to_cart(product(1, "A", 1000));

        let items = cart.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
        assert_eq!(cart.cart_quantity(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let cart = CartStore::new();
        let badge = cart.clone();
        cart.add_to_cart(product(1, "A", 1000));
        assert_eq!(badge.cart_quantity(), 1);
    }

    #[test]
    fn test_events_emitted_only_on_change() {
        let cart = CartStore::new();
        let events = recording(&cart);

        cart.add_to_cart(product(5, "E", 100));
        cart.increase_cart_quantity(ProductId::new(5));
        cart.increase_cart_quantity(ProductId::new(6));
        cart.decrease_cart_quantity(ProductId::new(5));
        cart.decrease_cart_quantity(ProductId::new(5));
        cart.remove_from_cart(ProductId::new(5));
        cart.clear_cart();

        let id = ProductId::new(5);
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                CartEvent::Added { id, quantity: 1 },
                CartEvent::Increased { id, quantity: 2 },
                CartEvent::Decreased { id, quantity: 1 },
                CartEvent::Removed { id },
                CartEvent::Cleared,
            ]
        );
    }

    #[test]
    fn test_listener_sees_post_mutation_cart() {
        let cart = CartStore::new();
        let seen = Arc::new(Mutex::new(0_u32));
        let sink = Arc::clone(&seen);
        cart.subscribe(move |_: &CartEvent, snapshot: &Cart| {
            *sink.lock().unwrap() = snapshot.total_quantity();
        });

        cart.add_to_cart(product(1, "A", 100));
        cart.add_to_cart(product(2, "B", 100));
        assert_eq!(*seen.lock().unwrap(), 2);
    }

    #[test]
    fn test_listener_may_read_store() {
        let cart = CartStore::new();
        let reader = cart.clone();
        let seen = Arc::new(Mutex::new(0_u32));
        let sink = Arc::clone(&seen);
        cart.subscribe(move |_: &CartEvent, _: &Cart| {
            *sink.lock().unwrap() = reader.get_item_quantity(ProductId::new(1));
        });

        cart.add_to_cart(product(1, "A", 100));
        assert_eq!(*seen.lock().unwrap(), 1);
    }

    #[test]
    fn test_every_change_is_persisted() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let cart = CartStore::hydrate(slot(&store));

        cart.add_to_cart(product(1, "A", 1000));
        let persisted: Cart = serde_json::from_str(&store.get(keys::CART).unwrap().unwrap()).unwrap();
        assert_eq!(persisted.quantity_of(ProductId::new(1)), 1);

        cart.decrease_cart_quantity(ProductId::new(1));
        let persisted: Cart = serde_json::from_str(&store.get(keys::CART).unwrap().unwrap()).unwrap();
        assert!(persisted.is_empty());
    }

    #[test]
    fn test_round_trip_through_fresh_store() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let first = CartStore::hydrate(slot(&store));
        first.add_to_cart(product(1, "A", 1000));
        first.add_to_cart(product(2, "B", 250));
        first.add_to_cart(product(2, "B", 250));

        let second = CartStore::hydrate(slot(&store));
        assert_eq!(second.snapshot(), first.snapshot());
        assert_eq!(second.get_item_quantity(ProductId::new(2)), 2);
    }

    #[test]
    fn test_corrupt_storage_yields_empty_cart() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store.set(keys::CART, "]]not json[[").unwrap();

        let cart = CartStore::hydrate(slot(&store));
        assert!(cart.is_empty());
        assert_eq!(cart.cart_quantity(), 0);

        cart.add_to_cart(product(3, "C", 100));
        let repaired: Cart = serde_json::from_str(&store.get(keys::CART).unwrap().unwrap()).unwrap();
        assert_eq!(repaired.len(), 1);
    }

    #[test]
    fn test_clear_persists_empty_state() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let cart = CartStore::hydrate(slot(&store));
        cart.clear_cart();
        assert_eq!(store.get(keys::CART).unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn test_subtotal_uses_snapshotted_price() {
        let cart = CartStore::new();
        cart.add_to_cart(product(1, "A", 1000));
        cart.add_to_cart(product(1, "A", 1500));
        assert_eq!(cart.subtotal(), Price::from_cents(2000));
    }

    #[test]
    fn test_remove_ordered_keeps_later_additions() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let cart = CartStore::hydrate(slot(&store));
        cart.add_to_cart(product(1, "A", 1000));
        cart.add_to_cart(product(1, "A", 1000));
        let ordered = cart.snapshot();
        let events = recording(&cart);

        cart.add_to_cart(product(1, "A", 1000));
        cart.add_to_cart(product(2, "B", 250));
        cart.remove_ordered(&ordered);

        assert_eq!(cart.get_item_quantity(ProductId::new(1)), 1);
        assert_eq!(cart.get_item_quantity(ProductId::new(2)), 1);
        assert_eq!(
            events.lock().unwrap().last(),
            Some(&CartEvent::Ordered { lines: 1 })
        );
        let persisted: Cart = serde_json::from_str(&store.get(keys::CART).unwrap().unwrap()).unwrap();
        assert_eq!(persisted, cart.snapshot());
    }

    #[test]
    fn test_oversized_stored_line_does_not_panic() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        store
            .set(keys::CART, r#"[{"id":1,"name":"A","price":5e28,"quantity":2}]"#)
            .unwrap();

        let cart = CartStore::hydrate(slot(&store));
        assert_eq!(cart.cart_quantity(), 2);
        assert_eq!(cart.subtotal(), Price::new(rust_decimal::Decimal::MAX));
    }

    #[test]
    fn test_removing_absent_line_emits_nothing() {
        let cart = CartStore::new();
        let events = recording(&cart);
        cart.remove_from_cart(ProductId::new(4));
        cart.remove_ordered(&Cart::new());
        assert!(events.lock().unwrap().is_empty());
    }
}
