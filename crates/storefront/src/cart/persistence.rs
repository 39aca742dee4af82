//! Cart persistence listener.

use market_core::Cart;

use super::{CartEvent, CartListener};
use crate::storage::StorageSlot;

/// Writes the whole cart to its storage slot after every change.
///
/// A failed write is logged and dropped: the in-memory cart stays
/// authoritative and the next successful write catches storage up.
#[derive(Debug, Clone)]
pub struct CartPersistence {
    slot: StorageSlot<Cart>,
}

impl CartPersistence {
    #[must_use]
    pub const fn new(slot: StorageSlot<Cart>) -> Self {
        Self { slot }
    }
}

impl CartListener for CartPersistence {
    fn on_change(&self, event: &CartEvent, cart: &Cart) {
        if let Err(e) = self.slot.write(cart) {
            tracing::warn!(
                key = self.slot.key(),
                ?event,
                error = %e,
                "Failed to persist cart"
            );
        }
    }
}
