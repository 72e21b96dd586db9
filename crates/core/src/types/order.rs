//! Order submission payloads.

use serde::{Deserialize, Serialize};

use super::id::{OrderId, ProductId};
use super::price::Price;

/// One `{productId, quantity}` entry of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// Where the order ships to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub name: String,
    pub address: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingInfo {
    /// Names of the fields that are blank, in declaration order.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("address", &self.address),
            ("city", &self.city),
            ("postalCode", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }
}

/// Body of `POST /orders`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderData {
    pub items: Vec<OrderItem>,
    pub shipping_info: ShippingInfo,
    pub total: Price,
}

/// What the API answers to an order submission.
///
/// Only the id and status are interpreted; everything else is kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderConfirmation {
    #[serde(default, alias = "orderId", skip_serializing_if = "Option::is_none")]
    pub id: Option<OrderId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}
