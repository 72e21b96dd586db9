//! Catalog types returned by the commerce API.

use serde::{Deserialize, Serialize};

use super::id::{CategoryId, ProductId};
use super::price::{Price, SalePercent};

/// A product category. Categories nest through `parent_category`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_category: Option<Box<Category>>,
}

impl Category {
    /// Category names from the root down to this category, e.g.
    /// `["Clothing", "Shoes"]`.
    #[must_use]
    pub fn path(&self) -> Vec<&str> {
        let mut names = vec![self.name.as_str()];
        let mut parent = self.parent_category.as_deref();
        while let Some(category) = parent {
            names.push(category.name.as_str());
            parent = category.parent_category.as_deref();
        }
        names.reverse();
        names
    }
}

/// A product as listed by the catalog.
///
/// Read-only on the client. The cart copies the whole product into each line
/// so the line can be priced without another round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Catalog identifier; the cart keys lines by this.
    pub id: ProductId,
    /// Merchant-facing product code.
    #[serde(default)]
    pub product_id: String,
    pub name: String,
    /// List price before any sale.
    pub price: Price,
    /// Percentage discount in `0..=100`.
    #[serde(default)]
    pub sale: SalePercent,
    /// Long-form description.
    #[serde(default)]
    pub content: String,
    /// Units in stock.
    #[serde(default)]
    pub count: u32,
    /// Image URL; empty when the product has none.
    #[serde(default)]
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

impl Product {
    /// Unit price after the sale percentage is applied.
    #[must_use]
    pub fn effective_price(&self) -> Price {
        self.price.discounted(self.sale)
    }

    /// Whether the product is currently discounted.
    #[must_use]
    pub const fn is_on_sale(&self) -> bool {
        !self.sale.is_zero()
    }

    /// Whether any units are in stock.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.count > 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_api_product() {
        let json = r#"{
            "id": "p1",
            "productId": "SKU-001",
            "name": "Linen shirt",
            "price": 10000,
            "sale": 10,
            "content": "Breathable",
            "count": 3,
            "image": "https://cdn.example.com/p1.jpg",
            "category": {"id": "c2", "name": "Shirts", "parentCategory": {"id": "c1", "name": "Clothing"}}
        }"#;

        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id.as_str(), "p1");
        assert_eq!(product.effective_price(), Price::from_units(9_000));
        assert!(product.is_on_sale());
        assert!(product.in_stock());
        assert_eq!(
            product.category.as_ref().unwrap().path(),
            vec!["Clothing", "Shirts"]
        );
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let product: Product =
            serde_json::from_str(r#"{"id": "p2", "name": "Mug", "price": 5000}"#).unwrap();
        assert_eq!(product.effective_price(), Price::from_units(5_000));
        assert!(!product.is_on_sale());
        assert!(!product.in_stock());
        assert!(product.category.is_none());
    }
}
