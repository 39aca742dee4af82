//! Client for the Market REST API.
//!
//! # Architecture
//!
//! - `reqwest` for HTTP, `serde_json` for bodies
//! - The API owns persistence, payments and order state; this client only
//!   shapes requests and decodes responses
//! - One HTTP call per method, no retries, no caching
//!
//! Endpoint groups live in their own modules, each adding methods to
//! [`ApiClient`]:
//!
//! - [`catalog`] - products and categories
//! - [`account`] - login and addresses
//! - [`orders`] - orders and payments
//!
//! # Errors
//!
//! Failed calls surface as [`ApiError`]. The API reports problems in a
//! `detail` field (a string, or a list of `{msg}` validation entries);
//! [`ApiError::user_message`] prefers that text and falls back to a generic
//! message for the error class.

pub mod account;
pub mod catalog;
pub mod orders;
pub mod types;

use std::sync::{Arc, PoisonError, RwLock};

use reqwest::{Method, RequestBuilder, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

pub use types::*;

/// The HTTP header carrying the per-request correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Errors that can occur when calling the API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request could not be sent or the response not read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint URL could not be built.
    #[error("invalid endpoint URL: {0}")]
    Url(#[from] url::ParseError),

    /// A success response did not match the expected shape.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// An authenticated endpoint was called without a bearer token.
    #[error("not signed in")]
    MissingToken,

    /// 401 from the API.
    #[error("unauthorized: {}", detail_or(.0, "no detail"))]
    Unauthorized(Option<String>),

    /// 403 from the API.
    #[error("forbidden: {}", detail_or(.0, "no detail"))]
    Forbidden(Option<String>),

    /// 404 from the API.
    #[error("not found: {}", detail_or(.0, "no detail"))]
    NotFound(Option<String>),

    /// Any other non-success status.
    #[error("API returned {status}: {}", detail_or(.detail, "no detail"))]
    Status {
        status: u16,
        detail: Option<String>,
    },
}

fn detail_or<'a>(detail: &'a Option<String>, fallback: &'a str) -> &'a str {
    detail.as_deref().unwrap_or(fallback)
}

impl ApiError {
    /// The server-supplied detail message, if any.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Unauthorized(detail) | Self::Forbidden(detail) | Self::NotFound(detail) => {
                detail.as_deref()
            }
            Self::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    /// Message suitable for showing to the shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        if let Some(detail) = self.detail() {
            return detail.to_string();
        }
        let message = match self {
            Self::Http(_) => "Could not reach the store. Check your connection and try again.",
            Self::Url(_) | Self::Parse(_) => "The store sent an unexpected response.",
            Self::MissingToken | Self::Unauthorized(_) => "Please sign in to continue.",
            Self::Forbidden(_) => "You do not have permission to do that.",
            Self::NotFound(_) => "The requested item could not be found.",
            Self::Status { status, .. } if *status >= 500 => {
                "The store is having trouble right now. Please try again later."
            }
            Self::Status { .. } => "The request could not be completed.",
        };
        message.to_string()
    }

    /// Whether the error originates from the API side (5xx) or transport,
    /// as opposed to a client mistake.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        match self {
            Self::Http(_) | Self::Parse(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    fn from_status(status: StatusCode, detail: Option<String>) -> Self {
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized(detail),
            StatusCode::FORBIDDEN => Self::Forbidden(detail),
            StatusCode::NOT_FOUND => Self::NotFound(detail),
            _ => Self::Status {
                status: status.as_u16(),
                detail,
            },
        }
    }
}

/// Error body shape: `{"detail": "..."}` or `{"detail": [{"msg": "..."}]}`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    detail: Option<ErrorDetail>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Message(String),
    Items(Vec<ErrorItem>),
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    msg: String,
}

/// Extract a human-readable detail from an error response body.
fn parse_error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let detail = match parsed.detail {
        Some(ErrorDetail::Message(message)) => Some(message),
        Some(ErrorDetail::Items(items)) => {
            let joined = items
                .into_iter()
                .map(|item| item.msg)
                .collect::<Vec<_>>()
                .join("; ");
            (!joined.is_empty()).then_some(joined)
        }
        None => None,
    };
    detail
        .or(parsed.message)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Whether a call must carry the bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Public,
    Authenticated,
}

// =============================================================================
// ApiClient
// =============================================================================

/// Client for the Market REST API.
///
/// Cheap to clone; all clones share the connection pool and bearer token.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    token: RwLock<Option<SecretString>>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("token", &self.has_bearer_token().then_some("[REDACTED]"))
            .finish()
    }
}

impl ApiClient {
    /// Create a client rooted at `base_url` (e.g., `https://shop.example/api`).
    #[must_use]
    pub fn new(base_url: &Url) -> Self {
        let mut base_url = base_url.clone();
        // Url::join replaces the last segment unless the path ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Self {
            inner: Arc::new(ApiClientInner {
                client: reqwest::Client::new(),
                base_url,
                token: RwLock::new(None),
            }),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Set or clear the bearer token sent with authenticated calls.
    pub fn set_bearer_token(&self, token: Option<SecretString>) {
        *self
            .inner
            .token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    #[must_use]
    pub fn has_bearer_token(&self) -> bool {
        self.inner
            .token
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.inner.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Start a request, attaching the request ID and, when required, the
    /// bearer token.
    fn request(&self, method: Method, path: &str, access: Access) -> Result<RequestBuilder, ApiError> {
        let url = self.endpoint(path)?;
        let mut builder = self
            .inner
            .client
            .request(method, url)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string());

        if access == Access::Authenticated {
            let guard = self
                .inner
                .token
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            let token = guard.as_ref().ok_or(ApiError::MissingToken)?;
            builder = builder.bearer_auth(token.expose_secret());
        }

        Ok(builder)
    }

    /// Send a request and return the raw body of a success response.
    async fn send_raw(&self, request: RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }

        let detail = parse_error_detail(&body);
        if status.is_server_error() {
            tracing::error!(
                status = %status,
                body = %body.chars().take(500).collect::<String>(),
                "API returned server error"
            );
        } else {
            tracing::debug!(status = %status, detail = ?detail, "API rejected request");
        }
        Err(ApiError::from_status(status, detail))
    }

    /// Send a request and decode the JSON body of a success response.
    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let body = self.send_raw(request).await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %body.chars().take(500).collect::<String>(),
                "Failed to parse API response"
            );
            ApiError::Parse(e)
        })
    }

    /// Send a request whose success body is ignored (e.g., `204 No Content`).
    async fn send_empty(&self, request: RequestBuilder) -> Result<(), ApiError> {
        self.send_raw(request).await.map(drop)
    }
}
