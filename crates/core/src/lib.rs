//! Market Core - Shared types library.
//!
//! This crate provides the types used across the Market storefront client:
//! - `storefront` - API client, cart store, auth context and checkout
//! - `integration-tests` - Mock API and end-to-end tests
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no storage,
//! no HTTP clients. The cart reducer lives here so its invariants can be
//! tested without any persistence attached.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, statuses and pagination
//! - [`cart`] - The shopping cart collection and its line items

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{Cart, CartLineItem, ProductSnapshot};
pub use types::*;
