//! Core types for Shopfront.
//!
//! This module provides type-safe wrappers for the storefront domain.

pub mod cart;
pub mod catalog;
pub mod email;
pub mod id;
pub mod order;
pub mod price;
pub mod user;

pub use cart::CartItem;
pub use catalog::{Category, Product};
pub use email::{Email, EmailError};
pub use id::*;
pub use order::{OrderConfirmation, OrderData, OrderItem, ShippingInfo};
pub use price::{Price, PriceError, SalePercent};
pub use user::{Role, User, UserUpdate};
