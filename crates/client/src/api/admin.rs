//! Catalog management endpoints (admin accounts).
//!
//! The API enforces the role; the client only sends the bearer token. Every
//! successful mutation drops the catalog cache so later reads see it.

use reqwest::Method;
use serde::Serialize;
use shopfront_core::{Category, CategoryId, Price, Product, ProductId, SalePercent};
use tracing::instrument;

use super::ApiClient;
use crate::error::ClientError;

/// A new product. The API assigns `id` and `productId`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    pub name: String,
    pub price: Price,
    pub sale: SalePercent,
    pub content: String,
    pub count: u32,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

/// Partial product update. Unset fields are left as they are.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale: Option<SalePercent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

/// A new category.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_category: Option<Category>,
}

/// Partial category update.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_category: Option<Category>,
}

impl ApiClient {
    /// Create a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the product or the request fails.
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_product(&self, draft: &ProductDraft) -> Result<Product, ClientError> {
        let url = self.endpoint(&["products"])?;
        let builder = self.request(Method::POST, url).await.json(draft);
        let product = self.send_json(builder).await?;
        self.invalidate_catalog();
        Ok(product)
    }

    /// Update a product.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` for an unknown product, or another
    /// error if the request fails.
    #[instrument(skip(self, patch), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: &ProductId,
        patch: &ProductPatch,
    ) -> Result<Product, ClientError> {
        let url = self.endpoint(&["products", id.as_str()])?;
        let builder = self.request(Method::PUT, url).await.json(patch);
        let product = self.send_json(builder).await?;
        self.invalidate_catalog();
        Ok(product)
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: &ProductId) -> Result<(), ClientError> {
        let url = self.endpoint(&["products", id.as_str()])?;
        let builder = self.request(Method::DELETE, url).await;
        self.send_empty(builder).await?;
        self.invalidate_catalog();
        Ok(())
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the category or the request fails.
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create_category(&self, draft: &CategoryDraft) -> Result<Category, ClientError> {
        let url = self.endpoint(&["categories"])?;
        let builder = self.request(Method::POST, url).await.json(draft);
        let category = self.send_json(builder).await?;
        self.invalidate_catalog();
        Ok(category)
    }

    /// Update a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, patch), fields(category_id = %id))]
    pub async fn update_category(
        &self,
        id: &CategoryId,
        patch: &CategoryPatch,
    ) -> Result<Category, ClientError> {
        let url = self.endpoint(&["categories", id.as_str()])?;
        let builder = self.request(Method::PUT, url).await.json(patch);
        let category = self.send_json(builder).await?;
        self.invalidate_catalog();
        Ok(category)
    }

    /// Delete a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn delete_category(&self, id: &CategoryId) -> Result<(), ClientError> {
        let url = self.endpoint(&["categories", id.as_str()])?;
        let builder = self.request(Method::DELETE, url).await;
        self.send_empty(builder).await?;
        self.invalidate_catalog();
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_sends_only_set_fields() {
        let patch = ProductPatch {
            price: Some(Price::from_units(8_000)),
            sale: Some(SalePercent::from_percent(20)),
            ..Default::default()
        };
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, serde_json::json!({"price": 8000.0, "sale": 20.0}));
    }

    #[test]
    fn test_category_draft_with_parent() {
        let draft = CategoryDraft {
            name: "Sneakers".into(),
            parent_category: Some(Category {
                id: CategoryId::new("c1"),
                name: "Shoes".into(),
                parent_category: None,
            }),
        };
        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["parentCategory"]["id"], "c1");
    }
}
