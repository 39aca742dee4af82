//! Data-access hooks.
//!
//! A hook wraps one group of API endpoints and keeps the result of the last
//! call so a view can render loading, error and data states without owning
//! any request logic. Every piece of request state is a [`Resource`].
//!
//! # Latest wins
//!
//! Each call to [`Resource::run`] takes a sequence number. When a response
//! arrives after a newer call has started, it is handed back to its caller
//! but never written to the resource, so a slow first page can't replace the
//! second page the shopper has already asked for.

mod addresses;
mod categories;
mod orders;
mod products;

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockWriteGuard};

use crate::error::AppError;

pub use addresses::AddressesHook;
pub use categories::CategoriesHook;
pub use orders::OrdersHook;
pub use products::ProductsHook;

/// State of one request slot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ResourceState<T> {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// A request is in flight.
    Loading,
    /// The last request succeeded.
    Ready(T),
    /// The last request failed with this user-facing message.
    Failed(String),
}

/// Shared, cloneable request-state cell.
pub struct Resource<T> {
    inner: Arc<ResourceInner<T>>,
}

struct ResourceInner<T> {
    state: RwLock<ResourceState<T>>,
    latest: AtomicU64,
}

impl<T> Clone for Resource<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Resource<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Resource").field("state", &*state).finish()
    }
}

impl<T> Default for Resource<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Resource<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ResourceInner {
                state: RwLock::new(ResourceState::Idle),
                latest: AtomicU64::new(0),
            }),
        }
    }

    // `latest` is only bumped or compared while this guard is held, so a
    // ticket check and the state write it guards cannot be split by `begin`.
    fn write(&self) -> RwLockWriteGuard<'_, ResourceState<T>> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(
            *self.inner.state.read().unwrap_or_else(PoisonError::into_inner),
            ResourceState::Loading
        )
    }

    /// The failure message of the last request, if it failed.
    #[must_use]
    pub fn error(&self) -> Option<String> {
        match &*self.inner.state.read().unwrap_or_else(PoisonError::into_inner) {
            ResourceState::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }

    /// Apply `f` to the data in place, if the resource holds any.
    pub fn modify(&self, f: impl FnOnce(&mut T)) {
        if let ResourceState::Ready(data) = &mut *self.write() {
            f(data);
        }
    }

    /// Forget the current state.
    pub fn reset(&self) {
        let mut state = self.write();
        self.inner.latest.fetch_add(1, Ordering::SeqCst);
        *state = ResourceState::Idle;
    }
}

impl<T: Clone> Resource<T> {
    #[must_use]
    pub fn state(&self) -> ResourceState<T> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The data of the last successful request.
    #[must_use]
    pub fn data(&self) -> Option<T> {
        match &*self.inner.state.read().unwrap_or_else(PoisonError::into_inner) {
            ResourceState::Ready(data) => Some(data.clone()),
            _ => None,
        }
    }

    /// Run `request`, tracking it in this resource.
    ///
    /// The resource is `Loading` while the request runs, then `Ready` or
    /// `Failed` unless a newer request started meanwhile.
    ///
    /// # Errors
    ///
    /// Returns the request's error unchanged.
    pub async fn run<F>(&self, request: F) -> Result<T, AppError>
    where
        F: Future<Output = Result<T, AppError>>,
    {
        let ticket = self.begin();
        let result = request.await;
        self.settle(ticket, result.as_ref().map(T::clone));
        result
    }
}

impl Resource<()> {
    /// Like [`run`](Resource::run) for requests whose output goes back to
    /// the caller only; the resource records success or failure.
    ///
    /// # Errors
    ///
    /// Returns the request's error unchanged.
    pub async fn track<U, F>(&self, request: F) -> Result<U, AppError>
    where
        F: Future<Output = Result<U, AppError>>,
    {
        let ticket = self.begin();
        let result = request.await;
        self.settle(ticket, result.as_ref().map(|_| ()));
        result
    }
}

impl<T> Resource<T> {
    fn begin(&self) -> u64 {
        let mut state = self.write();
        let ticket = self.inner.latest.fetch_add(1, Ordering::SeqCst) + 1;
        *state = ResourceState::Loading;
        ticket
    }

    fn settle(&self, ticket: u64, outcome: Result<T, &AppError>) {
        let failed = {
            let mut state = self.write();
            if self.inner.latest.load(Ordering::SeqCst) != ticket {
                tracing::debug!(ticket, "Discarding stale response");
                return;
            }
            match outcome {
                Ok(data) => {
                    *state = ResourceState::Ready(data);
                    None
                }
                Err(err) => {
                    *state = ResourceState::Failed(err.user_message());
                    Some(err)
                }
            }
        };
        if let Some(err) = failed {
            err.report();
        }
    }
}
