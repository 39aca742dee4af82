//! Market storefront client library.
//!
//! Everything a storefront front end needs besides the views themselves:
//!
//! - [`cart`] - the session cart, persisted after every change
//! - [`storage`] - typed slots over a local key-value store
//! - [`api`] - the Market REST API client
//! - [`hooks`] - request state for products, categories, addresses and orders
//! - [`auth`] - sign-in, remember-me and role checks from the bearer token
//! - [`checkout`] - placing orders and waiting for card payments
//! - [`validation`] - form validation with field-keyed errors
//!
//! [`Storefront`] wires one session together from a [`StorefrontConfig`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod hooks;
pub mod state;
pub mod storage;
pub mod telemetry;
pub mod validation;

pub use config::StorefrontConfig;
pub use error::AppError;
pub use state::Storefront;
