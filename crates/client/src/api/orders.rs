//! Order submission.

use reqwest::Method;
use shopfront_core::{OrderConfirmation, OrderData};
use tracing::instrument;

use super::ApiClient;
use crate::error::ClientError;

impl ApiClient {
    /// Submit an order.
    ///
    /// An empty response body (e.g. `201` with no content) yields an empty
    /// [`OrderConfirmation`].
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the order or the request fails.
    #[instrument(skip(self, order), fields(lines = order.items.len(), total = %order.total))]
    pub async fn create_order(&self, order: &OrderData) -> Result<OrderConfirmation, ClientError> {
        let url = self.endpoint(&["orders"])?;
        let builder = self.request(Method::POST, url).await.json(order);

        let response = self.send(builder).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(OrderConfirmation::default());
        }
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse order confirmation");
            ClientError::Parse(e)
        })
    }
}
