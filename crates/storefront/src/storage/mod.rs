//! Persistent key-value storage for client-local state.
//!
//! The storefront keeps a handful of small values across sessions: the cart,
//! the remember-me flag and (when remembered) the bearer token. Each value
//! lives in a named slot of a [`KeyValueStore`] as JSON text.
//!
//! # Backends
//!
//! - [`MemoryStore`] - process-local map, used for tests and sessions that
//!   should not outlive the process
//! - [`FileStore`] - one file per slot in a data directory
//!
//! # Typed access
//!
//! [`StorageSlot`] binds a key to a type. Reads never fail: a missing slot or
//! a payload that no longer deserializes (corrupt, or written by an older
//! schema) yields the caller's default and is overwritten on the next write.

mod file;
mod memory;

use std::marker::PhantomData;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Slot names used by the storefront.
pub mod keys {
    /// Cart line items.
    pub const CART: &str = "cart";

    /// Whether the shopper asked to stay signed in.
    pub const REMEMBER_ME: &str = "remember_me";

    /// Bearer token, only written when remember-me is set.
    pub const AUTH_TOKEN: &str = "auth_token";
}

/// Errors from the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Key contains characters outside `[A-Za-z0-9_-]`.
    #[error("invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Reading or writing the backing medium failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Value could not be serialized.
    #[error("storage serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A lock guarding the backend was poisoned by a panicking writer.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Raw text storage addressed by key.
///
/// Implementations must be safe to share between every handle of a session.
pub trait KeyValueStore: Send + Sync {
    /// Read the raw text stored at `key`, `None` if the slot is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` at `key`, replacing any prior content.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Empty the slot at `key`. Removing an empty slot succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is invalid or the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Check that a key is safe to use as a slot name (and a file name).
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] for empty keys or keys with characters
/// outside `[A-Za-z0-9_-]`.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

/// A typed view of one storage slot.
pub struct StorageSlot<T> {
    store: Arc<dyn KeyValueStore>,
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for StorageSlot<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> std::fmt::Debug for StorageSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSlot").field("key", &self.key).finish()
    }
}

impl<T> StorageSlot<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Bind `key` in `store`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKey`] if the key is not a valid slot name.
    pub fn new(store: Arc<dyn KeyValueStore>, key: &str) -> Result<Self, StorageError> {
        validate_key(key)?;
        Ok(Self {
            store,
            key: key.to_string(),
            _marker: PhantomData,
        })
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the slot, falling back to `default` when it is empty, unreadable
    /// or holds a payload that does not deserialize.
    pub fn read_or(&self, default: T) -> T {
        self.read_or_else(|| default)
    }

    /// Like [`read_or`](Self::read_or), building the default lazily.
    pub fn read_or_else(&self, default: impl FnOnce() -> T) -> T {
        let raw = match self.store.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return default(),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Failed to read storage slot");
                return default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    key = %self.key,
                    error = %e,
                    "Discarding unreadable storage payload"
                );
                default()
            }
        }
    }

    /// Serialize `value` into the slot.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the backend write fails.
    pub fn write(&self, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value)?;
        self.store.set(&self.key, &raw)
    }

    /// Empty the slot.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(&self.key)
    }
}

impl<T> StorageSlot<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Read the slot, falling back to `T::default()`.
    pub fn read(&self) -> T {
        self.read_or_else(T::default)
    }
}
