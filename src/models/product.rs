use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::sync::SyncResult;
use crate::services::stock_aggregator::compute_total_stock;

pub const DEFAULT_CATEGORY: &str = "Products";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Shopee,
    Lazada,
    #[serde(rename = "tiktok")]
    TikTok,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Shopee, Platform::Lazada, Platform::TikTok];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Shopee => "shopee",
            Platform::Lazada => "lazada",
            Platform::TikTok => "tiktok",
        }
    }

    /// Name used when tagging ERP documents with their originating marketplace.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Shopee => "Shopee",
            Platform::Lazada => "Lazada",
            Platform::TikTok => "TikTok",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPlatform(pub String);

impl fmt::Display for UnknownPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown platform: {}", self.0)
    }
}

impl std::error::Error for UnknownPlatform {}

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shopee" => Ok(Platform::Shopee),
            "lazada" => Ok(Platform::Lazada),
            "tiktok" => Ok(Platform::TikTok),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    #[default]
    Active,
    Inactive,
    Deleted,
}

/// A product's listing on one marketplace.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlatformListing {
    /// Identifier the marketplace assigned to the listing, if known.
    pub product_id: Option<String>,
    pub stock: u32,
    pub price: Decimal,
    pub status: ListingStatus,
}

impl PlatformListing {
    pub fn is_active(&self) -> bool {
        self.status == ListingStatus::Active
    }
}

/// Product as stored by the local persistence layer.
///
/// `total_stock` is private and recomputed on every platform stock change, so it
/// can never drift from the per-platform figures. Deserialization goes through
/// [`ProductRecord`] for the same reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ProductRecord")]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub price: Decimal,
    pub cost: Decimal,
    platforms: BTreeMap<Platform, PlatformListing>,
    total_stock: u64,
    pub images: Vec<String>,
    pub erp_synced: bool,
    pub erp_item_code: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductRecord {
    #[serde(default = "Uuid::new_v4")]
    id: Uuid,
    sku: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default = "default_category")]
    category: String,
    #[serde(default)]
    price: Decimal,
    #[serde(default)]
    cost: Decimal,
    #[serde(default)]
    platforms: BTreeMap<Platform, PlatformListing>,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default)]
    erp_synced: bool,
    #[serde(default)]
    erp_item_code: Option<String>,
    #[serde(default)]
    last_synced_at: Option<DateTime<Utc>>,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

impl From<ProductRecord> for Product {
    fn from(record: ProductRecord) -> Self {
        let mut product = Product {
            id: record.id,
            sku: record.sku.trim().to_string(),
            name: record.name.trim().to_string(),
            description: record.description,
            category: record.category,
            price: record.price,
            cost: record.cost,
            platforms: record.platforms,
            total_stock: 0,
            images: record.images,
            erp_synced: record.erp_synced,
            erp_item_code: record.erp_item_code,
            last_synced_at: record.last_synced_at,
        };
        product.recompute_total_stock();
        product
    }
}

impl Product {
    /// Register a new product listed as active with zero stock on every platform.
    pub fn new(sku: impl Into<String>, name: impl Into<String>, price: Decimal) -> Self {
        let platforms = Platform::ALL
            .iter()
            .map(|platform| (*platform, PlatformListing::default()))
            .collect();

        let mut product = Self {
            id: Uuid::new_v4(),
            sku: sku.into().trim().to_string(),
            name: name.into().trim().to_string(),
            description: None,
            category: default_category(),
            price,
            cost: Decimal::ZERO,
            platforms,
            total_stock: 0,
            images: Vec::new(),
            erp_synced: false,
            erp_item_code: None,
            last_synced_at: None,
        };
        product.recompute_total_stock();
        product
    }

    pub fn total_stock(&self) -> u64 {
        self.total_stock
    }

    pub fn platform(&self, platform: Platform) -> Option<&PlatformListing> {
        self.platforms.get(&platform)
    }

    pub fn platforms(&self) -> impl Iterator<Item = (Platform, &PlatformListing)> {
        self.platforms.iter().map(|(platform, listing)| (*platform, listing))
    }

    /// Stock held on `platform`; zero when the product has no listing there.
    pub fn platform_stock(&self, platform: Platform) -> u32 {
        self.platforms.get(&platform).map(|l| l.stock).unwrap_or(0)
    }

    pub fn platform_stocks(&self) -> BTreeMap<Platform, u32> {
        self.platforms
            .iter()
            .map(|(platform, listing)| (*platform, listing.stock))
            .collect()
    }

    pub fn is_active_on(&self, platform: Platform) -> bool {
        self.platforms.get(&platform).map(|l| l.is_active()).unwrap_or(false)
    }

    /// Reference a marketplace adapter should use for this product: the remote
    /// listing id when one is recorded, the SKU otherwise.
    pub fn item_ref(&self, platform: Platform) -> String {
        self.platforms
            .get(&platform)
            .and_then(|l| l.product_id.clone())
            .unwrap_or_else(|| self.sku.clone())
    }

    pub fn set_platform_stock(&mut self, platform: Platform, stock: u32) {
        self.platforms.entry(platform).or_default().stock = stock;
        self.recompute_total_stock();
    }

    pub fn set_platform_status(&mut self, platform: Platform, status: ListingStatus) {
        self.platforms.entry(platform).or_default().status = status;
    }

    pub fn set_platform_listing(&mut self, platform: Platform, listing: PlatformListing) {
        self.platforms.insert(platform, listing);
        self.recompute_total_stock();
    }

    /// Write `new_stock` to every platform the fan-out reports as succeeded.
    ///
    /// Platforms that failed keep their previous figure. Returns the platforms
    /// that were updated.
    pub fn apply_sync_result(&mut self, result: &SyncResult, new_stock: u32) -> Vec<Platform> {
        let updated: Vec<Platform> = result.platforms.keys().copied().collect();
        for platform in &updated {
            self.platforms.entry(*platform).or_default().stock = new_stock;
        }
        self.recompute_total_stock();
        updated
    }

    pub fn mark_erp_synced(&mut self, item_code: impl Into<String>, at: DateTime<Utc>) {
        self.erp_synced = true;
        self.erp_item_code = Some(item_code.into());
        self.last_synced_at = Some(at);
    }

    fn recompute_total_stock(&mut self) {
        self.total_stock = compute_total_stock(&self.platform_stocks());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sync::{PlatformFailure, PlatformOutcome};
    use rust_decimal_macros::dec;

    fn product_with_stock(shopee: u32, lazada: u32, tiktok: u32) -> Product {
        let mut product = Product::new("SKU-A", "Widget", dec!(19.99));
        product.set_platform_stock(Platform::Shopee, shopee);
        product.set_platform_stock(Platform::Lazada, lazada);
        product.set_platform_stock(Platform::TikTok, tiktok);
        product
    }

    #[test]
    fn test_new_product_has_zero_stock_and_active_listings() {
        let product = Product::new("  SKU-1 ", "Widget", dec!(5));
        assert_eq!(product.sku, "SKU-1");
        assert_eq!(product.total_stock(), 0);
        assert_eq!(product.category, "Products");
        for platform in Platform::ALL {
            assert!(product.is_active_on(platform));
        }
    }

    #[test]
    fn test_total_stock_follows_every_mutation() {
        let mut product = product_with_stock(50, 30, 20);
        assert_eq!(product.total_stock(), 100);

        product.set_platform_stock(Platform::Lazada, 0);
        assert_eq!(product.total_stock(), 70);

        product.set_platform_listing(
            Platform::TikTok,
            PlatformListing { stock: 5, ..Default::default() },
        );
        assert_eq!(product.total_stock(), 55);
    }

    #[test]
    fn test_status_change_keeps_stock() {
        let mut product = product_with_stock(1, 2, 3);
        product.set_platform_status(Platform::Shopee, ListingStatus::Deleted);
        assert!(!product.is_active_on(Platform::Shopee));
        assert_eq!(product.total_stock(), 6);
    }

    #[test]
    fn test_item_ref_prefers_remote_id() {
        let mut product = product_with_stock(0, 0, 0);
        product.set_platform_listing(
            Platform::Lazada,
            PlatformListing { product_id: Some("LZ-991".to_string()), ..Default::default() },
        );
        assert_eq!(product.item_ref(Platform::Lazada), "LZ-991");
        assert_eq!(product.item_ref(Platform::Shopee), "SKU-A");
    }

    #[test]
    fn test_apply_sync_result_only_touches_succeeded_platforms() {
        let mut product = product_with_stock(10, 10, 10);
        let mut result = SyncResult::default();
        for platform in [Platform::Shopee, Platform::TikTok] {
            result.platforms.insert(
                platform,
                PlatformOutcome {
                    item_ref: "SKU-A".to_string(),
                    quantity: 40,
                    response: serde_json::Value::Null,
                },
            );
        }
        result.errors.push(PlatformFailure {
            platform: Platform::Lazada,
            message: "API Error".to_string(),
        });
        result.success = false;

        let updated = product.apply_sync_result(&result, 40);

        assert_eq!(updated, vec![Platform::Shopee, Platform::TikTok]);
        assert_eq!(product.platform_stock(Platform::Lazada), 10);
        assert_eq!(product.total_stock(), 90);
    }

    #[test]
    fn test_deserialize_recomputes_stale_total() {
        let json = serde_json::json!({
            "sku": "SKU-B",
            "name": "Gadget",
            "price": "12.50",
            "totalStock": 999,
            "platforms": {
                "shopee": { "stock": 4 },
                "tiktok": { "stock": 6, "status": "inactive" }
            }
        });

        let product: Product = serde_json::from_value(json).unwrap();

        assert_eq!(product.total_stock(), 10);
        assert_eq!(product.platform_stock(Platform::Lazada), 0);
        assert!(!product.is_active_on(Platform::TikTok));
    }

    #[test]
    fn test_platform_from_str() {
        assert_eq!("TikTok".parse::<Platform>().unwrap(), Platform::TikTok);
        assert!("amazon".parse::<Platform>().is_err());
    }
}
