// Inventory Summary
// Read-only figures over a product list: totals per platform and low-stock items.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::product::{Platform, Product};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LowStockItem {
    pub sku: String,
    pub name: String,
    pub total_stock: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySummary {
    pub total_products: usize,
    pub total_stock: u64,
    pub platform_stock: BTreeMap<Platform, u64>,
    pub low_stock_items: usize,
}

/// Products whose total stock is strictly below `threshold`, lowest first.
pub fn low_stock(products: &[Product], threshold: u64) -> Vec<LowStockItem> {
    let mut items: Vec<LowStockItem> = products
        .iter()
        .filter(|p| p.total_stock() < threshold)
        .map(|p| LowStockItem {
            sku: p.sku.clone(),
            name: p.name.clone(),
            total_stock: p.total_stock(),
        })
        .collect();
    items.sort_by(|a, b| a.total_stock.cmp(&b.total_stock).then_with(|| a.sku.cmp(&b.sku)));
    items
}

pub fn summarize(products: &[Product], low_stock_threshold: u64) -> InventorySummary {
    let mut platform_stock: BTreeMap<Platform, u64> =
        Platform::ALL.iter().map(|platform| (*platform, 0)).collect();

    for product in products {
        for platform in Platform::ALL {
            *platform_stock.entry(platform).or_insert(0) += u64::from(product.platform_stock(platform));
        }
    }

    InventorySummary {
        total_products: products.len(),
        total_stock: products.iter().map(Product::total_stock).sum(),
        platform_stock,
        low_stock_items: products
            .iter()
            .filter(|p| p.total_stock() < low_stock_threshold)
            .count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn product(sku: &str, shopee: u32, tiktok: u32) -> Product {
        let mut product = Product::new(sku, format!("{} name", sku), Decimal::ONE);
        product.set_platform_stock(Platform::Shopee, shopee);
        product.set_platform_stock(Platform::TikTok, tiktok);
        product
    }

    #[test]
    fn test_summarize_totals() {
        let products = vec![product("A", 10, 5), product("B", 2, 0), product("C", 0, 0)];

        let summary = summarize(&products, 10);

        assert_eq!(summary.total_products, 3);
        assert_eq!(summary.total_stock, 17);
        assert_eq!(summary.platform_stock[&Platform::Shopee], 12);
        assert_eq!(summary.platform_stock[&Platform::Lazada], 0);
        assert_eq!(summary.platform_stock[&Platform::TikTok], 5);
        assert_eq!(summary.low_stock_items, 2);
    }

    #[test]
    fn test_low_stock_threshold_is_exclusive() {
        let products = vec![product("A", 10, 0), product("B", 9, 0), product("C", 0, 3)];

        let skus: Vec<String> = low_stock(&products, 10).into_iter().map(|i| i.sku).collect();

        assert_eq!(skus, vec!["C", "B"]);
    }

    #[test]
    fn test_empty_inventory() {
        let summary = summarize(&[], 10);
        assert_eq!(summary.total_products, 0);
        assert_eq!(summary.total_stock, 0);
        assert_eq!(summary.platform_stock.len(), 3);
    }
}
