//! Core types for the Market storefront.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod page;
pub mod price;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use page::{Page, PageParams};
pub use price::{CurrencyCode, Price};
pub use status::*;
