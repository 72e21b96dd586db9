//! Shopfront Core - Shared types library.
//!
//! This crate provides the value types exchanged with the commerce API and
//! held by the client-side state managers:
//! - `shopfront-client` - API client, session and cart managers
//! - `shopfront-cli` - Terminal front end
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no HTTP clients, no async.
//! Anything that needs a network round trip lives in `shopfront-client`.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails, prices, catalog, user, cart and order types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
