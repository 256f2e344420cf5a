// ERP Integration Module
// The ERP adapter seam, the ERPNext client, and the orchestrators that push
// stock and marketplace orders into the ERP.

pub mod erp_reconciliation_service;
pub mod erpnext_client;
pub mod order_sync_service;

#[cfg(test)]
pub(crate) mod mock_erp;

pub use erp_reconciliation_service::ErpReconciliationService;
pub use erpnext_client::{ErpNextClient, ErpNextConfig};
pub use order_sync_service::OrderSyncService;

use std::collections::BTreeMap;
use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::product::{Platform, Product};
use crate::services::sync_options::{Interrupted, SyncOptions};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErpError {
    #[error("Not found in ERP: {0}")]
    NotFound(String),

    /// A create raced with another writer; the record already exists.
    #[error("Already exists in ERP: {0}")]
    Conflict(String),

    #[error("ERP unavailable: {0}")]
    Transient(String),

    #[error("ERP rejected request: {0}")]
    Permanent(String),

    #[error("cancelled before the ERP responded")]
    Cancelled,

    #[error("no ERP response within {0:?}")]
    TimedOut(std::time::Duration),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl ErpError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ErpError::Transient(_) | ErpError::TimedOut(_))
    }
}

impl From<Interrupted> for ErpError {
    fn from(reason: Interrupted) -> Self {
        match reason {
            Interrupted::Cancelled => ErpError::Cancelled,
            Interrupted::TimedOut(limit) => ErpError::TimedOut(limit),
        }
    }
}

pub type Result<T> = std::result::Result<T, ErpError>;

/// Run one ERP call under the caller's deadline and cancellation signal.
pub(crate) async fn guarded<T, F>(options: &SyncOptions, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    options.guard(call).await.map_err(ErpError::from)?
}

// ============================================================================
// Data Models
// ============================================================================

/// Item master fields written to the ERP.
#[derive(Debug, Clone, PartialEq)]
pub struct ErpItemFields {
    pub item_code: String,
    pub item_name: String,
    pub description: String,
    pub item_group: String,
    /// Only honoured by the ERP when the item is created.
    pub opening_stock: u64,
    pub valuation_rate: Decimal,
    pub standard_rate: Decimal,
    pub platform_enabled: BTreeMap<Platform, bool>,
}

impl ErpItemFields {
    pub fn from_product(product: &Product) -> Self {
        Self {
            item_code: product.sku.clone(),
            item_name: product.name.clone(),
            description: product
                .description
                .clone()
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| product.name.clone()),
            item_group: product.category.clone(),
            opening_stock: product.total_stock(),
            valuation_rate: product.cost,
            standard_rate: product.price,
            platform_enabled: Platform::ALL
                .iter()
                .map(|platform| (*platform, product.is_active_on(*platform)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ErpItem {
    pub item_code: String,
    #[serde(default)]
    pub item_name: Option<String>,
    #[serde(default)]
    pub item_group: Option<String>,
    #[serde(default)]
    pub standard_rate: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEntryType {
    #[serde(rename = "Material Receipt")]
    MaterialReceipt,
    #[serde(rename = "Material Issue")]
    MaterialIssue,
}

impl StockEntryType {
    /// Receipt for a positive delta, issue for a negative one.
    pub fn for_delta(delta: i64) -> Self {
        if delta >= 0 {
            StockEntryType::MaterialReceipt
        } else {
            StockEntryType::MaterialIssue
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockEntryType::MaterialReceipt => "Material Receipt",
            StockEntryType::MaterialIssue => "Material Issue",
        }
    }
}

/// A submitted stock movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    pub entry_name: String,
    pub entry_type: StockEntryType,
    pub quantity: u64,
    pub warehouse: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ErpCustomer {
    pub name: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub email_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SalesOrderLine {
    pub sku: String,
    pub quantity: u32,
    pub rate: Decimal,
    pub warehouse: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SalesOrderRequest {
    pub customer: String,
    pub marketplace: Platform,
    pub marketplace_order_id: String,
    pub order_date: DateTime<Utc>,
    pub delivery_date: NaiveDate,
    pub shipping_address: Option<String>,
    pub lines: Vec<SalesOrderLine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesOrderConfirmation {
    pub name: String,
}

// ============================================================================
// Purchasing, Fulfilment and Reporting Models
// ============================================================================

/// Supplier used for restocking when the caller names none.
pub const DEFAULT_SUPPLIER: &str = "Default Supplier";

/// Days between raising a purchase order and the expected delivery.
pub const PURCHASE_LEAD_DAYS: i64 = 14;

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseOrderLine {
    pub sku: String,
    pub quantity: u32,
    /// Unit cost; zero when the cost is unknown.
    pub rate: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseOrderRequest {
    pub supplier: String,
    pub schedule_date: NaiveDate,
    pub warehouse: String,
    pub lines: Vec<PurchaseOrderLine>,
}

impl PurchaseOrderRequest {
    /// Restock from the default supplier, due [`PURCHASE_LEAD_DAYS`] after `today`.
    pub fn restock(warehouse: impl Into<String>, lines: Vec<PurchaseOrderLine>, today: NaiveDate) -> Self {
        Self {
            supplier: DEFAULT_SUPPLIER.to_string(),
            schedule_date: today + chrono::Duration::days(PURCHASE_LEAD_DAYS),
            warehouse: warehouse.into(),
            lines,
        }
    }
}

/// Stock of one item in one ERP warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErpBinLevel {
    pub item_code: String,
    pub warehouse: String,
    #[serde(default)]
    pub actual_qty: f64,
}

/// The listing fields of a submitted ERP sales order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SalesOrderSummary {
    pub name: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub transaction_date: Option<NaiveDate>,
    #[serde(default)]
    pub grand_total: Decimal,
    #[serde(default)]
    pub custom_marketplace: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarketplaceSales {
    pub orders: usize,
    pub revenue: Decimal,
}

/// Orders and revenue over a date range, split by the marketplace that sold them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesAnalytics {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub total_orders: usize,
    pub total_revenue: Decimal,
    pub average_order_value: Decimal,
    /// Orders without a marketplace tag are grouped under `Direct`.
    pub by_marketplace: BTreeMap<String, MarketplaceSales>,
}

impl SalesAnalytics {
    pub fn from_orders(from: NaiveDate, to: NaiveDate, orders: &[SalesOrderSummary]) -> Self {
        let mut by_marketplace: BTreeMap<String, MarketplaceSales> = BTreeMap::new();
        let mut total_revenue = Decimal::ZERO;

        for order in orders {
            let marketplace = order
                .custom_marketplace
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or("Direct");
            let entry = by_marketplace.entry(marketplace.to_string()).or_default();
            entry.orders += 1;
            entry.revenue += order.grand_total;
            total_revenue += order.grand_total;
        }

        let average_order_value = if orders.is_empty() {
            Decimal::ZERO
        } else {
            (total_revenue / Decimal::from(orders.len()))
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        };

        Self {
            from,
            to,
            total_orders: orders.len(),
            total_revenue,
            average_order_value,
            by_marketplace,
        }
    }
}

// ============================================================================
// ERP Adapter
// ============================================================================

/// Capabilities the orchestrators need from the back-office ERP.
#[async_trait]
pub trait ErpAdapter: Send + Sync {
    /// `None` when the ERP has no item with this code.
    async fn get_item(&self, sku: &str) -> Result<Option<ErpItem>>;

    /// Fails with [`ErpError::Conflict`] if the item already exists.
    async fn create_item(&self, fields: &ErpItemFields) -> Result<ErpItem>;

    async fn update_item(&self, sku: &str, fields: &ErpItemFields) -> Result<ErpItem>;

    /// Stock on hand summed over every warehouse.
    async fn get_total_stock(&self, sku: &str) -> Result<i64>;

    /// Move `quantity` units in (positive) or out (negative) of `warehouse`.
    /// The movement is submitted, not left as a draft, before this returns.
    async fn adjust_stock(&self, sku: &str, quantity: i64, warehouse: &str) -> Result<StockAdjustment>;

    async fn get_customer(&self, email: &str) -> Result<Option<ErpCustomer>>;

    /// Fails with [`ErpError::Conflict`] if the customer already exists.
    async fn create_customer(&self, customer: &NewCustomer) -> Result<ErpCustomer>;

    /// Create and submit a sales order.
    async fn create_sales_order(&self, order: &SalesOrderRequest) -> Result<SalesOrderConfirmation>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::ListingStatus;

    #[test]
    fn test_item_fields_from_product() {
        let mut product = Product::new("SKU-A", "Widget", Decimal::new(1999, 2));
        product.set_platform_stock(Platform::Shopee, 4);
        product.set_platform_status(Platform::TikTok, ListingStatus::Inactive);

        let fields = ErpItemFields::from_product(&product);

        assert_eq!(fields.item_code, "SKU-A");
        assert_eq!(fields.description, "Widget");
        assert_eq!(fields.item_group, "Products");
        assert_eq!(fields.opening_stock, 4);
        assert_eq!(fields.platform_enabled[&Platform::Shopee], true);
        assert_eq!(fields.platform_enabled[&Platform::TikTok], false);
    }

    #[test]
    fn test_entry_type_follows_sign() {
        assert_eq!(StockEntryType::for_delta(20), StockEntryType::MaterialReceipt);
        assert_eq!(StockEntryType::for_delta(-3), StockEntryType::MaterialIssue);
        assert_eq!(StockEntryType::MaterialIssue.as_str(), "Material Issue");
    }

    fn summary(name: &str, total: Decimal, marketplace: Option<&str>) -> SalesOrderSummary {
        SalesOrderSummary {
            name: name.to_string(),
            customer: None,
            transaction_date: None,
            grand_total: total,
            custom_marketplace: marketplace.map(str::to_string),
        }
    }

    #[test]
    fn test_sales_analytics_groups_untagged_orders_as_direct() {
        let day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let orders = [
            summary("SAL-ORD-1", Decimal::new(10000, 2), Some("Shopee")),
            summary("SAL-ORD-2", Decimal::new(5050, 2), Some("Shopee")),
            summary("SAL-ORD-3", Decimal::new(2000, 2), None),
            summary("SAL-ORD-4", Decimal::new(1000, 2), Some(" ")),
        ];

        let analytics = SalesAnalytics::from_orders(day, day, &orders);

        assert_eq!(analytics.total_orders, 4);
        assert_eq!(analytics.total_revenue, Decimal::new(18050, 2));
        assert_eq!(analytics.average_order_value, Decimal::new(4513, 2));
        assert_eq!(analytics.by_marketplace["Shopee"].orders, 2);
        assert_eq!(analytics.by_marketplace["Shopee"].revenue, Decimal::new(15050, 2));
        assert_eq!(analytics.by_marketplace["Direct"].orders, 2);
    }

    #[test]
    fn test_sales_analytics_of_no_orders() {
        let day = NaiveDate::from_ymd_opt(2026, 5, 1).unwrap();
        let analytics = SalesAnalytics::from_orders(day, day, &[]);

        assert_eq!(analytics.total_orders, 0);
        assert_eq!(analytics.average_order_value, Decimal::ZERO);
        assert!(analytics.by_marketplace.is_empty());
    }

    #[test]
    fn test_restock_is_due_after_lead_time() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        let request = PurchaseOrderRequest::restock("Stores - COMP", Vec::new(), today);

        assert_eq!(request.supplier, DEFAULT_SUPPLIER);
        assert_eq!(request.schedule_date, NaiveDate::from_ymd_opt(2026, 11, 2).unwrap());
    }

    #[tokio::test]
    async fn test_guarded_maps_interruption() {
        let options = SyncOptions::default();
        options.cancel.cancel();

        let outcome: Result<()> = guarded(&options, async { Ok(()) }).await;
        assert_eq!(outcome, Err(ErpError::Cancelled));
    }
}
