//! Cart checkout against the fake API.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use secrecy::SecretString;
use shopfront_client::{
    ApiClient, CancellationToken, CartManager, ClientError, MemoryTokenStore, SessionManager,
    ValidationError, checkout,
};
use shopfront_core::{ProductId, ShippingInfo};
use shopfront_integration_tests::FakeApi;

const EMAIL: &str = "kim@shop.com";
const PASSWORD: &str = "hunter2";

fn shipping() -> ShippingInfo {
    ShippingInfo {
        name: "Kim".into(),
        address: "1 Main St".into(),
        city: "Seoul".into(),
        postal_code: "04524".into(),
        country: "KR".into(),
    }
}

async fn session(fake: &FakeApi, sign_in: bool) -> SessionManager {
    fake.add_user(EMAIL, PASSWORD, "Kim");
    let session = SessionManager::new(
        ApiClient::new(&fake.config()).unwrap(),
        Arc::new(MemoryTokenStore::new()),
    );
    session.restore(&CancellationToken::new()).await.unwrap();
    if sign_in {
        session
            .login(EMAIL, &SecretString::from(PASSWORD), &CancellationToken::new())
            .await
            .unwrap();
    }
    session
}

async fn stocked_cart(fake: &FakeApi, api: &ApiClient) -> CartManager {
    fake.add_product("a", "Linen Shirt", 10_000, 0);
    fake.add_product("b", "Canvas Tote", 5_000, 40);

    let mut cart = CartManager::new();
    cart.add_to_cart(api.get_product(&ProductId::new("a")).await.unwrap());
    cart.add_to_cart(api.get_product(&ProductId::new("a")).await.unwrap());
    cart.add_to_cart(api.get_product(&ProductId::new("b")).await.unwrap());
    cart
}

#[tokio::test]
async fn checkout_submits_items_and_total_then_clears_cart() {
    let fake = FakeApi::start().await;
    let session = session(&fake, true).await;
    let mut cart = stocked_cart(&fake, session.api()).await;

    let confirmation = checkout(&session, &mut cart, &shipping(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(confirmation.id.is_some());
    assert_eq!(confirmation.status.as_deref(), Some("PLACED"));
    assert!(cart.is_empty());

    let orders = fake.orders();
    assert_eq!(orders.len(), 1);
    let order = orders.first().unwrap();
    assert_eq!(
        order["items"],
        serde_json::json!([
            {"productId": "a", "quantity": 2},
            {"productId": "b", "quantity": 1},
        ])
    );
    assert_eq!(order["total"].as_f64(), Some(23_000.0));
    assert_eq!(order["shippingInfo"]["postalCode"], "04524");
}

#[tokio::test]
async fn failed_order_keeps_cart() {
    let fake = FakeApi::start().await;
    let session = session(&fake, true).await;
    let mut cart = stocked_cart(&fake, session.api()).await;
    fake.set_fail_orders(true);

    let err = checkout(&session, &mut cart, &shipping(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Api { .. }));
    assert_eq!(cart.item_count(), 3);
    assert!(fake.orders().is_empty());
}

#[tokio::test]
async fn signed_out_checkout_never_reaches_orders() {
    let fake = FakeApi::start().await;
    let session = session(&fake, false).await;
    let mut cart = stocked_cart(&fake, session.api()).await;

    let err = checkout(&session, &mut cart, &shipping(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::NotAuthenticated));
    assert!(fake.requests_to("/orders").is_empty());
    assert_eq!(cart.len(), 2);
}

#[tokio::test]
async fn empty_cart_is_rejected_locally() {
    let fake = FakeApi::start().await;
    let session = session(&fake, true).await;

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
    assert!(fake.requests_to("/orders").is_empty());
}

#[tokio::test]
async fn cart_survives_restart_through_file() {
    let fake = FakeApi::start().await;
    let session = session(&fake, true).await;
    let cart = stocked_cart(&fake, session.api()).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cart.json");

    cart.save(&path).await.unwrap();
    let mut reloaded = CartManager::load(&path).await.unwrap();
    assert_eq!(reloaded.total(), cart.total());

    checkout(&session, &mut reloaded, &shipping(), &CancellationToken::new())
        .await
        .unwrap();
    reloaded.save(&path).await.unwrap();
    assert!(CartManager::load(&path).await.unwrap().is_empty());
}
