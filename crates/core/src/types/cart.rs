//! Cart line items.

use serde::{Deserialize, Serialize};

use super::catalog::Product;
use super::id::ProductId;
use super::price::Price;

/// One product entry in the cart with its quantity.
///
/// Serialized flat: the product's fields plus `quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(flatten)]
    pub product: Product,
    /// Always at least 1; a line at zero is removed instead.
    pub quantity: u32,
}

impl CartItem {
    /// Start a line for `product` with quantity 1.
    #[must_use]
    pub const fn new(product: Product) -> Self {
        Self {
            product,
            quantity: 1,
        }
    }

    /// The product id keying this line.
    #[must_use]
    pub const fn id(&self) -> &ProductId {
        &self.product.id
    }

    /// Unit price after the product's sale.
    #[must_use]
    pub fn effective_price(&self) -> Price {
        self.product.effective_price()
    }

    /// Effective unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.effective_price() * self.quantity
    }
}
