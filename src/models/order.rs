use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::product::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ShippingAddress {
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

impl ShippingAddress {
    /// Single-line rendering for ERP free-text fields.
    pub fn one_line(&self) -> String {
        [&self.street, &self.city, &self.state, &self.postal_code, &self.country]
            .into_iter()
            .flatten()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub sku: String,
    #[serde(default)]
    pub name: Option<String>,
    pub quantity: u32,
    pub price: Decimal,
}

/// An order placed on one of the marketplaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub platform_order_id: String,
    pub platform: Platform,
    pub customer_name: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    #[serde(default)]
    pub status: OrderStatus,
    pub order_date: DateTime<Utc>,
    #[serde(default)]
    pub erp_sales_order: Option<String>,
    #[serde(default)]
    pub erp_synced: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shipping_address_one_line_skips_blanks() {
        let address = ShippingAddress {
            street: Some("12 Jalan Ampang".to_string()),
            city: Some("Kuala Lumpur".to_string()),
            state: Some("  ".to_string()),
            postal_code: None,
            country: Some("MY".to_string()),
        };
        assert_eq!(address.one_line(), "12 Jalan Ampang, Kuala Lumpur, MY");
    }

    #[test]
    fn test_order_deserializes_with_defaults() {
        let order: Order = serde_json::from_value(serde_json::json!({
            "platformOrderId": "SP-1001",
            "platform": "shopee",
            "customerName": "Ana",
            "items": [{ "sku": "SKU-A", "quantity": 2, "price": "9.90" }],
            "totalAmount": "19.80",
            "orderDate": "2026-10-01T08:00:00Z"
        }))
        .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert!(!order.erp_synced);
        assert_eq!(order.items[0].quantity, 2);
    }
}
