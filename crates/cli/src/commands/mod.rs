//! Command implementations.
//!
//! Every command runs against a [`Context`] built from the environment.
//! Tokens persist in `<data dir>/tokens.json` and the cart in
//! `<data dir>/cart.json`, so state carries over between invocations.

use std::path::Path;
use std::sync::Arc;

use shopfront_client::{
    ApiClient, CancellationToken, CartManager, ClientConfig, ClientError, ConfigError,
    FileTokenStore, SessionManager, StoreError,
};
use thiserror::Error;

pub mod account;
pub mod cart;
pub mod catalog;
pub mod checkout;
pub mod signup;

/// Errors surfaced by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Environment configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// API or session failure.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Local cart file could not be read or written.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Reading from stdin failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The cart has no line for the product.
    #[error("Product {0} is not in the cart")]
    NotInCart(String),
}

impl CliError {
    /// Message for the terminal; details go to the log.
    pub fn user_message(&self) -> String {
        match self {
            Self::Client(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

/// Shared state for one CLI invocation.
pub struct Context {
    config: ClientConfig,
    session: SessionManager,
}

impl Context {
    /// Build the context from the environment, optionally overriding the
    /// data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn load(data_dir: Option<&Path>) -> Result<Self, CliError> {
        let mut config = ClientConfig::from_env()?;
        if let Some(dir) = data_dir {
            config = config.with_data_dir(dir);
        }
        tracing::debug!(
            api_url = %config.api_url,
            data_dir = %config.data_dir.display(),
            "Loaded configuration"
        );

        let api = ApiClient::new(&config)?;
        let store = Arc::new(FileTokenStore::new(config.token_file()));
        let session = SessionManager::new(api, store);

        Ok(Self { config, session })
    }

    /// The API client, without touching the stored session.
    pub const fn api(&self) -> &ApiClient {
        self.session.api()
    }

    /// The session, restored from the stored refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error only if the restore is cancelled.
    pub async fn session(&self) -> Result<&SessionManager, CliError> {
        if self.session.is_loading().await {
            self.session.restore(&self.cancel()).await?;
        }
        Ok(&self.session)
    }

    /// A cancellation token scoped to this invocation.
    pub fn cancel(&self) -> CancellationToken {
        self.session.lifecycle().child()
    }

    /// Load the persisted cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart file exists but cannot be read.
    pub async fn load_cart(&self) -> Result<CartManager, CliError> {
        Ok(CartManager::load(&self.config.cart_file()).await?)
    }

    /// Persist the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the cart file cannot be written.
    pub async fn save_cart(&self, cart: &CartManager) -> Result<(), CliError> {
        Ok(cart.save(&self.config.cart_file()).await?)
    }
}
