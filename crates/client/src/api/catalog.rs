//! Product and category reads.

use reqwest::Method;
use shopfront_core::{Category, CategoryId, Product, ProductId};
use tracing::{debug, instrument};

use super::ApiClient;
use super::cache::{CacheKey, CacheValue};
use crate::error::ClientError;

/// Default page size for product listings.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Parameters of `GET /products`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductQuery {
    /// Zero-based page index.
    pub page: u32,
    /// Products per page.
    pub size: u32,
    /// Free-text search; blank searches are not sent.
    pub search: Option<String>,
    /// Restrict to one category.
    pub category: Option<CategoryId>,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
            search: None,
            category: None,
        }
    }
}

impl ProductQuery {
    /// Select a page.
    #[must_use]
    pub const fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Set the page size (at least 1).
    #[must_use]
    pub fn size(mut self, size: u32) -> Self {
        self.size = size.max(1);
        self
    }

    /// Search by free text.
    #[must_use]
    pub fn search(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.search = (!text.trim().is_empty()).then_some(text);
        self
    }

    /// Filter by category.
    #[must_use]
    pub fn category(mut self, category: impl Into<CategoryId>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Query-string pairs in the order the API documents them.
    fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("page", self.page.to_string()), ("size", self.size.to_string())];
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(category) = &self.category {
            pairs.push(("category", category.to_string()));
        }
        pairs
    }
}

impl ApiClient {
    /// List products.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(page = query.page, size = query.size))]
    pub async fn get_products(&self, query: &ProductQuery) -> Result<Vec<Product>, ClientError> {
        let cache_key = CacheKey::Products(query.clone());
        if let Some(CacheValue::Products(products)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product page");
            return Ok(products);
        }

        let mut url = self.endpoint(&["products"])?;
        url.query_pairs_mut().extend_pairs(query.pairs());

        let builder = self.request(Method::GET, url).await;
        let products: Vec<Product> = self.send_json(builder).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Products(products.clone()))
            .await;
        Ok(products)
    }

    /// Get a single product.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::NotFound` if the product does not exist, or
    /// another error if the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Product, ClientError> {
        let cache_key = CacheKey::Product(id.clone());
        if let Some(CacheValue::Product(product)) = self.inner.cache.get(&cache_key).await {
            debug!("Cache hit for product");
            return Ok(*product);
        }

        let url = self.endpoint(&["products", id.as_str()])?;
        let builder = self.request(Method::GET, url).await;
        let product: Product = self.send_json(builder).await?;

        self.inner
            .cache
            .insert(cache_key, CacheValue::Product(Box::new(product.clone())))
            .await;
        Ok(product)
    }

    /// List all categories.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_categories(&self) -> Result<Vec<Category>, ClientError> {
        if let Some(CacheValue::Categories(categories)) =
            self.inner.cache.get(&CacheKey::Categories).await
        {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let url = self.endpoint(&["categories"])?;
        let builder = self.request(Method::GET, url).await;
        let categories: Vec<Category> = self.send_json(builder).await?;

        self.inner
            .cache
            .insert(
                CacheKey::Categories,
                CacheValue::Categories(categories.clone()),
            )
            .await;
        Ok(categories)
    }

    /// Drop every cached catalog response.
    pub fn invalidate_catalog(&self) {
        self.inner.cache.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs_skip_unset_filters() {
        let query = ProductQuery::default().page(2).search("   ");
        assert_eq!(
            query.pairs(),
            vec![("page", "2".to_string()), ("size", "20".to_string())]
        );
    }

    #[test]
    fn test_query_pairs_with_filters() {
        let query = ProductQuery::default()
            .size(0)
            .search("linen shirt")
            .category("c1");
        assert_eq!(
            query.pairs(),
            vec![
                ("page", "0".to_string()),
                ("size", "1".to_string()),
                ("search", "linen shirt".to_string()),
                ("category", "c1".to_string()),
            ]
        );
    }
}
