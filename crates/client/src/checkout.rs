//! Order placement from the local cart.

use shopfront_core::{OrderConfirmation, OrderData, ShippingInfo};
use tracing::{info, instrument};

use crate::cancel::CancellationToken;
use crate::cart::CartManager;
use crate::error::{ClientError, ValidationError};
use crate::inflight::Operation;
use crate::session::SessionManager;

/// Place an order for everything in `cart`.
///
/// The cart is cleared only once the API has accepted the order; on any
/// failure it is left as it was so the user can retry.
///
/// # Errors
///
/// Returns `ClientError::Validation` for an empty cart or incomplete shipping
/// details, `ClientError::NotAuthenticated` when signed out, an API error if
/// the order is refused, or `ClientError::Cancelled`/`ClientError::Busy`.
#[instrument(skip_all, fields(lines = cart.len()))]
pub async fn checkout(
    session: &SessionManager,
    cart: &mut CartManager,
    shipping: &ShippingInfo,
    cancel: &CancellationToken,
) -> Result<OrderConfirmation, ClientError> {
    if cart.is_empty() {
        return Err(ValidationError::EmptyCart.into());
    }
    let missing = shipping.missing_fields();
    if !missing.is_empty() {
        return Err(ValidationError::IncompleteShipping(missing).into());
    }
    if !session.is_authenticated().await {
        return Err(ClientError::NotAuthenticated);
    }
    if cancel.is_cancelled() || session.is_disposed() {
        return Err(ClientError::Cancelled);
    }
    let _guard = session.inflight().begin(Operation::Checkout)?;

    let order = OrderData {
        items: cart.order_items(),
        shipping_info: shipping.clone(),
        total: cart.total(),
    };
    let confirmation = session.api().create_order(&order).await?;

    // Accepted server-side, but nobody is listening: leave the cart alone
    if cancel.is_cancelled() || session.is_disposed() {
        return Err(ClientError::Cancelled);
    }

    info!(order_id = ?confirmation.id, total = %order.total, "Order placed");
    cart.clear_cart();
    Ok(confirmation)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::api::ApiClient;
    use crate::config::ClientConfig;
    use crate::store::MemoryTokenStore;
    use shopfront_core::Product;
    use url::Url;

    fn offline_session() -> SessionManager {
        let config = ClientConfig::new(Url::parse("http://127.0.0.1:9").unwrap());
        SessionManager::new(
            ApiClient::new(&config).unwrap(),
            Arc::new(MemoryTokenStore::new()),
        )
    }

    fn shipping() -> ShippingInfo {
        ShippingInfo {
            name: "Kim".into(),
            address: "1 Main St".into(),
            city: "Seoul".into(),
            postal_code: "04524".into(),
            country: "KR".into(),
        }
    }

    fn one_item_cart() -> CartManager {
        let product: Product =
            serde_json::from_value(serde_json::json!({"id": "p1", "name": "Tee", "price": 100}))
                .unwrap();
        let mut cart = CartManager::new();
        cart.add_to_cart(product);
        cart
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let session = offline_session();
        let err = checkout(
            &session,
            &mut CartManager::new(),
            &shipping(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::EmptyCart)
        ));
    }

    #[tokio::test]
    async fn test_incomplete_shipping_names_fields() {
        let session = offline_session();
        let mut cart = one_item_cart();
        let info = ShippingInfo {
            city: String::new(),
            country: " ".into(),
            ..shipping()
        };

        let err = checkout(&session, &mut cart, &info, &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            ClientError::Validation(ValidationError::IncompleteShipping(fields)) => {
                assert_eq!(fields, ["city", "country"]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(cart.len(), 1);
    }

    #[tokio::test]
    async fn test_signed_out_rejected_and_cart_kept() {
        let session = offline_session();
        let mut cart = one_item_cart();
        let err = checkout(&session, &mut cart, &shipping(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotAuthenticated));
        assert_eq!(cart.len(), 1);
    }
}
