//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All optional:
//! - `SHOPFRONT_API_URL` - Commerce API base URL (default: `http://localhost:8080/api/v1`)
//! - `SHOPFRONT_HTTP_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `SHOPFRONT_CACHE_TTL_SECS` - Catalog cache lifetime (default: 300)
//! - `SHOPFRONT_DATA_DIR` - Where tokens and the cart are persisted (default: `.shopfront`)

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Default commerce API base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:8080/api/v1";

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_DATA_DIR: &str = ".shopfront";

const TOKEN_FILE: &str = "tokens.json";
const CART_FILE: &str = "cart.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Storefront client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL every endpoint path is appended to
    pub api_url: Url,
    /// Timeout applied to each HTTP request
    pub http_timeout: Duration,
    /// How long catalog responses stay cached
    pub cache_ttl: Duration,
    /// Directory holding `tokens.json` and `cart.json`
    pub data_dir: PathBuf,
}

impl ClientConfig {
    /// Configuration with defaults for everything except the API URL.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = lookup("SHOPFRONT_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = parse_api_url(&api_url)
            .map_err(|e| ConfigError::InvalidEnvVar("SHOPFRONT_API_URL".to_string(), e))?;

        let http_timeout = parse_secs(
            &lookup,
            "SHOPFRONT_HTTP_TIMEOUT_SECS",
            DEFAULT_HTTP_TIMEOUT_SECS,
        )?;
        if http_timeout.is_zero() {
            return Err(ConfigError::InvalidEnvVar(
                "SHOPFRONT_HTTP_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let cache_ttl = parse_secs(&lookup, "SHOPFRONT_CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)?;
        let data_dir = lookup("SHOPFRONT_DATA_DIR")
            .map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from);

        Ok(Self {
            api_url,
            http_timeout,
            cache_ttl,
            data_dir,
        })
    }

    /// Override the request timeout.
    #[must_use]
    pub const fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Override the catalog cache lifetime.
    #[must_use]
    pub const fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Override the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.data_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Path of the persisted token file.
    #[must_use]
    pub fn token_file(&self) -> PathBuf {
        self.data_dir.join(TOKEN_FILE)
    }

    /// Path of the persisted cart file.
    #[must_use]
    pub fn cart_file(&self) -> PathBuf {
        self.data_dir.join(CART_FILE)
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Parse an API base URL. Must be http(s) so paths can be appended.
fn parse_api_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.cannot_be_a_base() {
        return Err("URL cannot be a base".to_string());
    }
    Ok(url)
}

/// Parse a whole number of seconds with a default.
fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    lookup(key).map_or(Ok(Duration::from_secs(default)), |raw| {
        raw.trim()
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
    })
}
