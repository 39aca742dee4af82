//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `MARKET_API_BASE_URL` - Market API root (default: `http://localhost:8000/api`)
//! - `MARKET_DATA_DIR` - Directory for the cart and remembered session (default: `.market`)
//! - `MARKET_CURRENCY` - Display currency code (default: `USD`)
//! - `MARKET_PAYMENT_POLL_INTERVAL_MS` - Delay between payment status checks (default: 2000)
//! - `MARKET_PAYMENT_POLL_TIMEOUT_SECS` - Give up on a payment after this long (default: 60)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use market_core::CurrencyCode;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
const DEFAULT_DATA_DIR: &str = ".market";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Root URL of the Market API
    pub api_base_url: Url,
    /// Directory backing the persistent key-value store
    pub data_dir: PathBuf,
    /// Currency prices are displayed in
    pub currency: CurrencyCode,
    /// Card payment polling
    pub payment_poll: PaymentPollConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., production, staging)
    pub sentry_environment: Option<String>,
}

/// How checkout waits for a card payment to settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentPollConfig {
    /// Delay between status checks
    pub interval: Duration,
    /// Wall-clock cutoff for the whole wait
    pub timeout: Duration,
}

impl Default for PaymentPollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            timeout: Duration::from_secs(60),
        }
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_base_url = parse_api_base_url(&get_env_or_default(
            "MARKET_API_BASE_URL",
            DEFAULT_API_BASE_URL,
        ))?;
        let data_dir = PathBuf::from(get_env_or_default("MARKET_DATA_DIR", DEFAULT_DATA_DIR));
        let currency = parse_env("MARKET_CURRENCY", "USD")?;
        let payment_poll = PaymentPollConfig::from_env()?;

        Ok(Self {
            api_base_url,
            data_dir,
            currency,
            payment_poll,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Configuration pointing at `api_base_url` with every other setting at
    /// its default.
    #[must_use]
    pub fn for_api(api_base_url: Url) -> Self {
        Self {
            api_base_url,
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            currency: CurrencyCode::default(),
            payment_poll: PaymentPollConfig::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

impl PaymentPollConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let interval_ms: u64 = parse_env("MARKET_PAYMENT_POLL_INTERVAL_MS", "2000")?;
        let timeout_secs: u64 = parse_env("MARKET_PAYMENT_POLL_TIMEOUT_SECS", "60")?;
        if interval_ms == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "MARKET_PAYMENT_POLL_INTERVAL_MS".to_string(),
                "must be greater than 0".to_string(),
            ));
        }
        Ok(Self {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Parse the API root, accepting only http and https.
fn parse_api_base_url(value: &str) -> Result<Url, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidEnvVar("MARKET_API_BASE_URL".to_string(), reason);

    let url = Url::parse(value.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(invalid(format!("unsupported scheme '{other}'"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_base_url() {
        let url = parse_api_base_url(" https://shop.example/api ").unwrap();
        assert_eq!(url.as_str(), "https://shop.example/api");

        let err = parse_api_base_url("ftp://shop.example").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref key, _) if key == "MARKET_API_BASE_URL"));
        assert!(err.to_string().contains("unsupported scheme 'ftp'"));

        assert!(parse_api_base_url("not a url").is_err());
    }

    #[test]
    fn test_parse_env_defaults_and_errors() {
        // Keys no test environment sets
        let currency: CurrencyCode = parse_env("MARKET_TEST_UNSET_CURRENCY", "EUR").unwrap();
        assert_eq!(currency, CurrencyCode::EUR);

        let err = parse_env::<u64>("MARKET_TEST_UNSET_NUMBER", "soon").unwrap_err();
        assert!(err.to_string().contains("MARKET_TEST_UNSET_NUMBER"));
    }

    #[test]
    fn test_for_api_defaults() {
        let config = StorefrontConfig::for_api(Url::parse(DEFAULT_API_BASE_URL).unwrap());
        assert_eq!(config.data_dir, PathBuf::from(".market"));
        assert_eq!(config.currency, CurrencyCode::USD);
        assert_eq!(config.payment_poll.interval, Duration::from_secs(2));
        assert_eq!(config.payment_poll.timeout, Duration::from_secs(60));
        assert!(config.sentry_dsn.is_none());
    }
}
