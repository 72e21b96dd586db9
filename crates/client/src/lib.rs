//! Shopfront client library.
//!
//! Client-side state for a storefront backed by a remote commerce API:
//!
//! - [`SessionManager`] restores, establishes, refreshes and ends the
//!   signed-in session and keeps the API bearer token in step with it.
//! - [`CartManager`] is the local, optimistic shopping cart.
//! - [`SignupFlow`] walks a new account through email verification.
//! - [`checkout()`] turns the cart into an order.
//! - [`ApiClient`] is the typed HTTP client underneath all of them.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use secrecy::SecretString;
//! use shopfront_client::{ApiClient, CancellationToken, ClientConfig, FileTokenStore, SessionManager};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let api = ApiClient::new(&config)?;
//! let session = SessionManager::new(api, Arc::new(FileTokenStore::new(config.token_file())));
//!
//! let cancel = session.lifecycle().child();
//! session.restore(&cancel).await?;
//! if !session.is_authenticated().await {
//!     session
//!         .login("kim@shop.com", &SecretString::from("hunter2"), &cancel)
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod cancel;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod error;
pub mod inflight;
pub mod session;
pub mod signup;
pub mod store;

pub use api::{ApiClient, ProductQuery};
pub use cancel::CancellationToken;
pub use cart::CartManager;
pub use checkout::checkout;
pub use config::{ClientConfig, ConfigError};
pub use error::{ClientError, ErrorKind, Result, ValidationError};
pub use inflight::Operation;
pub use session::{Authenticated, Session, SessionManager};
pub use signup::{SignupFlow, SignupStage};
pub use store::{FileTokenStore, MemoryTokenStore, StoreError, TokenStore};
