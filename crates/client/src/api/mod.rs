//! Commerce REST API client.
//!
//! # Architecture
//!
//! - `reqwest` for HTTP, JSON bodies in both directions
//! - The remote API is source of truth - no local sync, direct calls
//! - Single products, product pages and the category list are cached via
//!   `moka` (TTL from [`ClientConfig::cache_ttl`])
//! - `Authorization: Bearer <token>` is attached to every request while an
//!   access token is set; the session manager keeps it in step with the
//!   signed-in state
//!
//! # Example
//!
//! ```rust,ignore
//! use shopfront_client::{ApiClient, ClientConfig, ProductQuery};
//!
//! let api = ApiClient::new(&ClientConfig::from_env()?)?;
//! let page = api.get_products(&ProductQuery::default().search("linen")).await?;
//! let product = api.get_product(&page[0].id).await?;
//! ```

mod admin;
mod auth;
mod cache;
mod catalog;
mod orders;
mod users;

pub use admin::{CategoryDraft, CategoryPatch, ProductDraft, ProductPatch};
pub use auth::{LoginResponse, RefreshResponse, SignUpRequest, VerificationToken};
pub use catalog::{DEFAULT_PAGE_SIZE, ProductQuery};

use std::sync::Arc;

use moka::future::Cache;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use url::Url;

use crate::config::ClientConfig;
use crate::error::ClientError;

use cache::{CacheKey, CacheValue};

/// Longest body excerpt kept in error messages and logs.
const BODY_EXCERPT_CHARS: usize = 200;

/// Client for the commerce REST API.
///
/// Cheap to clone; clones share the HTTP connection pool, the cache and the
/// bearer credential.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ApiClientInner>,
}

struct ApiClientInner {
    client: reqwest::Client,
    base_url: Url,
    /// Bearer credential attached to outgoing requests
    access_token: RwLock<Option<SecretString>>,
    cache: Cache<CacheKey, CacheValue>,
}

/// Error body shape used by the API. Either field may be present.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Network` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(config.cache_ttl)
            .build();

        Ok(Self {
            inner: Arc::new(ApiClientInner {
                client,
                base_url: config.api_url.clone(),
                access_token: RwLock::new(None),
                cache,
            }),
        })
    }

    /// The base URL endpoints are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // =========================================================================
    // Bearer credential
    // =========================================================================

    /// Attach `token` to subsequent requests.
    pub async fn set_access_token(&self, token: SecretString) {
        *self.inner.access_token.write().await = Some(token);
    }

    /// Stop attaching a bearer credential.
    pub async fn clear_access_token(&self) {
        *self.inner.access_token.write().await = None;
    }

    /// Whether a bearer credential is currently attached.
    pub async fn has_access_token(&self) -> bool {
        self.inner.access_token.read().await.is_some()
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    /// Resolve an endpoint from path segments. Segments are percent-encoded,
    /// so ids containing `/` stay a single segment.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.inner.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Start a request, attaching the bearer credential if one is set.
    pub(crate) async fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.inner.client.request(method, url);
        match self.inner.access_token.read().await.as_ref() {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    /// Send a request and map non-success statuses to errors.
    pub(crate) async fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(1);
            return Err(ClientError::RateLimited(retry_after));
        }

        let url = response.url().clone();
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body, status);

        tracing::warn!(
            status = %status,
            url = %url,
            body = %excerpt(&body),
            "API returned non-success status"
        );

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                ClientError::Authentication(message)
            }
            StatusCode::NOT_FOUND => ClientError::NotFound(format!("{}: {message}", url.path())),
            _ => ClientError::Api { status, message },
        })
    }

    /// Send a request and decode its JSON body.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(builder).await?;
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %excerpt(&text),
                "Failed to parse API response"
            );
            ClientError::Parse(e)
        })
    }

    /// Send a request whose response body is ignored (e.g. `204`).
    pub(crate) async fn send_empty(&self, builder: RequestBuilder) -> Result<(), ClientError> {
        self.send(builder).await.map(drop)
    }
}

/// Pull a human-readable message out of an error body.
fn error_message(body: &str, status: StatusCode) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body)
        && let Some(message) = parsed.message.or(parsed.error)
    {
        return message;
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        excerpt(trimmed)
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}
