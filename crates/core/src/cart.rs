//! The shopping cart collection.
//!
//! A [`Cart`] is an ordered list of [`CartLineItem`]s keyed by product id.
//! Every operation is total: operating on an id that is not in the cart is a
//! no-op, never an error. The only invariant-preserving transitions are
//! upsert (add / increase) and delete-on-zero (decrease / remove), so no line
//! item with a quantity of zero can ever exist.
//!
//! Name, price and image are snapshots taken when the product is first added.
//! Adding the same product again only bumps the quantity; the original
//! snapshot is kept so the price shown in the cart does not move under the
//! shopper between adds.

use serde::{Deserialize, Serialize};

use crate::types::{Price, ProductId};

/// The catalog fields captured when a product is added to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// One product entry in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineItem {
    pub id: ProductId,
    pub name: String,
    pub price: Price,
    pub quantity: u32,
    #[serde(default)]
    pub image_url: Option<String>,
}

impl CartLineItem {
    fn from_snapshot(product: ProductSnapshot) -> Self {
        Self {
            id: product.id,
            name: product.name,
            price: product.price,
            quantity: 1,
            image_url: product.image_url,
        }
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.price * self.quantity
    }
}

/// Ordered, id-keyed collection of cart line items.
///
/// Serializes as a bare JSON array. Deserialization goes through
/// [`Cart::from_items`], so a stored payload with zero quantities or repeated
/// ids still loads into a cart that satisfies the invariants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<CartLineItem>", into = "Vec<CartLineItem>")]
pub struct Cart {
    items: Vec<CartLineItem>,
}

impl Cart {
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Build a cart from raw line items, dropping zero quantities and folding
    /// repeated ids into the first occurrence.
    #[must_use]
    pub fn from_items(items: Vec<CartLineItem>) -> Self {
        let mut cart = Self::new();
        for item in items {
            if item.quantity == 0 {
                continue;
            }
            match cart.position(item.id) {
                Some(index) => {
                    if let Some(existing) = cart.items.get_mut(index) {
                        existing.quantity = existing.quantity.saturating_add(item.quantity);
                    }
                }
                None => cart.items.push(item),
            }
        }
        cart
    }

    fn position(&self, id: ProductId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    fn find_mut(&mut self, id: ProductId) -> Option<&mut CartLineItem> {
        self.items.iter_mut().find(|item| item.id == id)
    }

    /// Upsert a product: append with quantity 1, or increment the existing
    /// line. Returns the line's new quantity.
    pub fn add(&mut self, product: ProductSnapshot) -> u32 {
        if let Some(existing) = self.find_mut(product.id) {
            existing.quantity = existing.quantity.saturating_add(1);
            return existing.quantity;
        }
        self.items.push(CartLineItem::from_snapshot(product));
        1
    }

    /// Increment the quantity of an existing line. Returns the new quantity,
    /// or `None` if the id is not in the cart.
    pub fn increase(&mut self, id: ProductId) -> Option<u32> {
        let item = self.find_mut(id)?;
        item.quantity = item.quantity.saturating_add(1);
        Some(item.quantity)
    }

    /// Decrement the quantity of an existing line, removing it when the
    /// quantity would reach zero. Returns the new quantity (`Some(0)` means
    /// the line was removed), or `None` if the id is not in the cart.
    pub fn decrease(&mut self, id: ProductId) -> Option<u32> {
        let index = self.position(id)?;
        let item = self.items.get_mut(index)?;
        if item.quantity <= 1 {
            self.items.remove(index);
            return Some(0);
        }
        item.quantity -= 1;
        Some(item.quantity)
    }

    /// Delete a line regardless of quantity. Returns whether anything was
    /// removed.
    pub fn remove(&mut self, id: ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id != id);
        self.items.len() != before
    }

    /// Take the quantities in `ordered` out of this cart, dropping lines that
    /// reach zero. Units added after `ordered` was captured stay. Returns
    /// whether anything changed.
    pub fn deduct(&mut self, ordered: &Self) -> bool {
        let mut changed = false;
        for line in &ordered.items {
            if let Some(item) = self.find_mut(line.id) {
                item.quantity = item.quantity.saturating_sub(line.quantity);
                changed = true;
            }
        }
        self.items.retain(|item| item.quantity > 0);
        changed
    }

    /// Empty the cart. Returns whether it held anything.
    pub fn clear(&mut self) -> bool {
        let had_items = !self.items.is_empty();
        self.items.clear();
        had_items
    }

    /// Quantity of a product in the cart, 0 if absent.
    #[must_use]
    pub fn quantity_of(&self, id: ProductId) -> u32 {
        self.items
            .iter()
            .find(|item| item.id == id)
            .map_or(0, |item| item.quantity)
    }

    /// Sum of all line quantities.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.items
            .iter()
            .fold(0_u32, |sum, item| sum.saturating_add(item.quantity))
    }

    /// Sum of all line totals.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.items.iter().map(CartLineItem::line_total).sum()
    }

    #[must_use]
    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    #[must_use]
    pub fn get(&self, id: ProductId) -> Option<&CartLineItem> {
        self.items.iter().find(|item| item.id == id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<Vec<CartLineItem>> for Cart {
    fn from(items: Vec<CartLineItem>) -> Self {
        Self::from_items(items)
    }
}

impl From<Cart> for Vec<CartLineItem> {
    fn from(cart: Cart) -> Self {
        cart.items
    }
}
