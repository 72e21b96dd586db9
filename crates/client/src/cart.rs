//! Local shopping cart.
//!
//! The cart is purely client-side and optimistic: nothing here talks to the
//! API. Lines are keyed by product id and keep insertion order, so each
//! product appears at most once and every line has quantity at least 1.

use std::path::Path;

use indexmap::IndexMap;
use shopfront_core::{CartItem, OrderItem, Price, Product, ProductId};
use tracing::{debug, instrument};

use crate::error::ValidationError;
use crate::store::{StoreError, write_atomic};

/// In-memory cart with optional JSON persistence.
#[derive(Debug, Clone, Default)]
pub struct CartManager {
    lines: IndexMap<ProductId, CartItem>,
}

impl CartManager {
    /// An empty cart.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cart from arbitrary lines, merging duplicate products and
    /// dropping lines with quantity zero.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut lines: IndexMap<ProductId, CartItem> = IndexMap::new();
        for item in items {
            if item.quantity == 0 {
                continue;
            }
            match lines.get_mut(item.id()) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(item.quantity);
                }
                None => {
                    lines.insert(item.id().clone(), item);
                }
            }
        }
        Self { lines }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Add one unit of `product`: bumps an existing line or appends a new one.
    pub fn add_to_cart(&mut self, product: Product) {
        if let Some(line) = self.lines.get_mut(&product.id) {
            line.quantity = line.quantity.saturating_add(1);
            debug!(product_id = %product.id, quantity = line.quantity, "Cart line incremented");
            return;
        }
        debug!(product_id = %product.id, "Cart line added");
        self.lines.insert(product.id.clone(), CartItem::new(product));
    }

    /// Remove the line for `id`. Returns whether a line was removed.
    pub fn remove_from_cart(&mut self, id: &ProductId) -> bool {
        self.lines.shift_remove(id).is_some()
    }

    /// Set the quantity of the line for `id`.
    ///
    /// Returns `Ok(false)` if the cart has no such line.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::QuantityBelowOne` for a quantity under 1
    /// (use [`remove_from_cart`](Self::remove_from_cart) instead) and
    /// `ValidationError::QuantityTooLarge` if it does not fit a `u32`. The
    /// cart is unchanged on error.
    pub fn update_quantity(&mut self, id: &ProductId, quantity: i64) -> Result<bool, ValidationError> {
        if quantity < 1 {
            return Err(ValidationError::QuantityBelowOne(quantity));
        }
        let quantity =
            u32::try_from(quantity).map_err(|_| ValidationError::QuantityTooLarge(quantity))?;

        let Some(line) = self.lines.get_mut(id) else {
            return Ok(false);
        };
        line.quantity = quantity;
        Ok(true)
    }

    /// Empty the cart.
    pub fn clear_cart(&mut self) {
        self.lines.clear();
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Lines in the order they were first added.
    pub fn items(&self) -> impl ExactSizeIterator<Item = &CartItem> {
        self.lines.values()
    }

    /// The line for `id`, if present.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&CartItem> {
        self.lines.get(id)
    }

    /// Number of distinct products.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.lines.values().map(|line| u64::from(line.quantity)).sum()
    }

    /// Effective price times quantity for one line.
    #[must_use]
    pub fn line_total(item: &CartItem) -> Price {
        item.line_total()
    }

    /// Sum of all line totals, after each product's sale. Clamps at
    /// [`Price::MAX`] instead of overflowing.
    #[must_use]
    pub fn total(&self) -> Price {
        self.lines.values().map(CartItem::line_total).sum()
    }

    /// The `{productId, quantity}` list an order is placed with.
    #[must_use]
    pub fn order_items(&self) -> Vec<OrderItem> {
        self.lines
            .values()
            .map(|line| OrderItem {
                product_id: line.id().clone(),
                quantity: line.quantity,
            })
            .collect()
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Load a cart saved by [`save`](Self::save). A missing or empty file is
    /// an empty cart.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the file cannot be read and
    /// `StoreError::Corrupt` if it does not hold a cart.
    #[instrument(fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No saved cart");
                return Ok(Self::new());
            }
            Err(e) => return Err(StoreError::io(path, e)),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }

        let items: Vec<CartItem> =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::corrupt(path, e))?;
        let cart = Self::from_items(items);
        debug!(lines = cart.len(), "Cart loaded");
        Ok(cart)
    }

    /// Write the cart to `path` as a JSON array of lines.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the file cannot be written.
    #[instrument(skip(self), fields(path = %path.display(), lines = self.len()))]
    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        let items: Vec<&CartItem> = self.lines.values().collect();
        let bytes = serde_json::to_vec_pretty(&items).map_err(|e| StoreError::corrupt(path, e))?;
        write_atomic(path, &bytes).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use shopfront_core::SalePercent;

    fn product(id: &str, units: u32, sale: u8) -> Product {
        let mut product: Product =
            serde_json::from_value(serde_json::json!({"id": id, "name": id, "price": 0})).unwrap();
        product.price = Price::from_units(units);
        product.sale = SalePercent::from_percent(sale);
        product
    }

    #[test]
    fn test_add_increments_existing_line() {
        let mut cart = CartManager::new();
        cart.add_to_cart(product("p1", 100, 0));
        cart.add_to_cart(product("p2", 100, 0));
        cart.add_to_cart(product("p1", 100, 0));

        assert_eq!(cart.len(), 2);
        assert_eq!(cart.item_count(), 3);
        let ids: Vec<&str> = cart.items().map(|line| line.id().as_str()).collect();
        assert_eq!(ids, ["p1", "p2"]);
        assert_eq!(cart.get(&ProductId::new("p1")).unwrap().quantity, 2);
    }

    #[test]
    fn test_total_applies_sale() {
        let mut cart = CartManager::new();
        cart.add_to_cart(product("a", 10_000, 10));
        cart.add_to_cart(product("a", 10_000, 10));
        cart.add_to_cart(product("b", 5_000, 0));

        assert_eq!(cart.total(), Price::from_units(23_000));
        let a = cart.get(&ProductId::new("a")).unwrap();
        assert_eq!(CartManager::line_total(a), Price::from_units(18_000));
    }

    #[test]
    fn test_empty_cart_total_is_zero() {
        let cart = CartManager::new();
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Price::ZERO);
        assert!(cart.order_items().is_empty());
    }

    #[test]
    fn test_update_quantity_rejects_below_one() {
        let mut cart = CartManager::new();
        cart.add_to_cart(product("p1", 100, 0));
        let id = ProductId::new("p1");

        assert_eq!(
            cart.update_quantity(&id, 0),
            Err(ValidationError::QuantityBelowOne(0))
        );
        assert_eq!(
            cart.update_quantity(&id, -3),
            Err(ValidationError::QuantityBelowOne(-3))
        );
        assert_eq!(cart.get(&id).unwrap().quantity, 1);

        assert_eq!(cart.update_quantity(&id, 5), Ok(true));
        assert_eq!(cart.get(&id).unwrap().quantity, 5);
        assert_eq!(cart.update_quantity(&ProductId::new("nope"), 2), Ok(false));
        assert!(matches!(
            cart.update_quantity(&id, i64::from(u32::MAX) + 1),
            Err(ValidationError::QuantityTooLarge(_))
        ));
    }

    #[test]
    fn test_total_clamps_huge_lines() {
        let mut cart = CartManager::new();
        let huge: Product = serde_json::from_value(
            serde_json::json!({"id": "gold", "name": "Gold Bar", "price": 1e20}),
        )
        .unwrap();
        cart.add_to_cart(huge);
        cart.add_to_cart(product("p1", 100, 0));
        cart.update_quantity(&ProductId::new("gold"), 1_000_000_000).unwrap();

        assert_eq!(cart.total(), Price::MAX);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut cart = CartManager::new();
        cart.add_to_cart(product("p1", 100, 0));
        cart.add_to_cart(product("p2", 100, 0));

        assert!(cart.remove_from_cart(&ProductId::new("p1")));
        assert!(!cart.remove_from_cart(&ProductId::new("p1")));
        assert_eq!(cart.len(), 1);

        cart.clear_cart();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_from_items_normalizes() {
        let mut zero = CartItem::new(product("z", 100, 0));
        zero.quantity = 0;
        let mut twice = CartItem::new(product("p1", 100, 0));
        twice.quantity = 2;

        let cart = CartManager::from_items([CartItem::new(product("p1", 100, 0)), zero, twice]);
        assert_eq!(cart.len(), 1);
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn test_order_items_projection() {
        let mut cart = CartManager::new();
        cart.add_to_cart(product("p1", 100, 0));
        cart.add_to_cart(product("p1", 100, 0));

        let value = serde_json::to_value(cart.order_items()).unwrap();
        assert_eq!(value, serde_json::json!([{"productId": "p1", "quantity": 2}]));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cart.json");

        let mut cart = CartManager::new();
        cart.add_to_cart(product("p1", 12_000, 10));
        cart.add_to_cart(product("p2", 3_000, 0));
        cart.update_quantity(&ProductId::new("p2"), 4).unwrap();
        cart.save(&path).await.unwrap();

        let loaded = CartManager::load(&path).await.unwrap();
        let ids: Vec<&str> = loaded.items().map(|line| line.id().as_str()).collect();
        assert_eq!(ids, ["p1", "p2"]);
        assert_eq!(loaded.total(), cart.total());
        assert_eq!(loaded.get(&ProductId::new("p2")).unwrap().quantity, 4);
    }

    #[tokio::test]
    async fn test_load_missing_and_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cart.json");
        assert!(CartManager::load(&path).await.unwrap().is_empty());

        tokio::fs::write(&path, b"{not json").await.unwrap();
        assert!(matches!(
            CartManager::load(&path).await,
            Err(StoreError::Corrupt { .. })
        ));
    }
}
