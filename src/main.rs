use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use omnistock::config::AppConfig;
use omnistock::models::{Order, Product};
use omnistock::repositories::{InMemoryProductRepository, ProductRepository};
use omnistock::services::erp::{PurchaseOrderLine, PurchaseOrderRequest};
use omnistock::services::{
    summarize, ErpNextClient, ErpReconciliationService, InventorySyncService, OrderSyncService,
    PlatformRegistry, SyncOptions,
};

const USAGE: &str = "usage:
  omnistock reconcile <products.json>
  omnistock pull <products.json>
  omnistock orders <orders.json>
  omnistock sync <products.json> <sku> <stock>
  omnistock summary <products.json>
  omnistock restock <products.json> <sku> <quantity>
  omnistock deliver <sales-order>
  omnistock erp-low-stock [threshold]
  omnistock analytics <from YYYY-MM-DD> <to YYYY-MM-DD>
  omnistock delete-item <sku>
  omnistock version
  omnistock ping";

#[tokio::main]
async fn main() -> Result<()> {
    // Default to INFO; override with RUST_LOG.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "omnistock=info,reqwest=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        bail!("{}", USAGE);
    };

    let config = AppConfig::from_env()?;
    let options = SyncOptions::from_config(&config.sync);

    match (command.as_str(), &args[1..]) {
        ("summary", [products]) => {
            let products: Vec<Product> = read_json(products)?;
            print_json(&summarize(&products, config.sync.low_stock_threshold))
        }
        ("reconcile", [products]) => {
            let mut products: Vec<Product> = read_json(products)?;
            let service = ErpReconciliationService::new(erp_client(&config)?, &config.erpnext.warehouse);
            let report = service.reconcile_and_mark(&mut products, &options).await;

            if !report.is_complete_success() {
                tracing::warn!("{} product(s) were not reconciled", report.failed.len());
            }
            print_json(&serde_json::json!({ "report": report, "products": products }))
        }
        ("pull", [products]) => {
            let products: Vec<Product> = read_json(products)?;
            let skus: Vec<String> = products.into_iter().map(|p| p.sku).collect();
            let service = ErpReconciliationService::new(erp_client(&config)?, &config.erpnext.warehouse);
            print_json(&service.pull_from_erp(&skus, &options).await)
        }
        ("orders", [orders]) => {
            let mut orders: Vec<Order> = read_json(orders)?;
            let service = OrderSyncService::new(erp_client(&config)?, &config.erpnext.warehouse);
            let report = service.sync_and_mark(&mut orders, &options).await;
            print_json(&serde_json::json!({ "report": report, "orders": orders }))
        }
        ("sync", [products, sku, stock]) => {
            let stock: u32 = parse_arg("stock", stock)?;
            let products: Vec<Product> = read_json(products)?;
            let repository = Arc::new(InMemoryProductRepository::with_products(products));
            let product_id: Uuid = repository
                .find_by_sku(sku)
                .await?
                .with_context(|| format!("no product with SKU {}", sku))?
                .id;

            let registry = PlatformRegistry::from_configs(&config.marketplaces)?;
            if registry.is_empty() {
                tracing::warn!("No marketplace is configured; every platform will be reported as failed");
            }
            let service = InventorySyncService::new(repository, registry);
            let (result, product) = service.sync_and_apply(product_id, stock, &options).await?;

            if !result.success {
                tracing::warn!(
                    "Partial sync for {}: {} platform(s) failed",
                    product.sku,
                    result.errors.len()
                );
            }
            print_json(&serde_json::json!({ "result": result, "product": product }))
        }
        ("restock", [products, sku, quantity]) => {
            let quantity: u32 = parse_arg("quantity", quantity)?;
            let products: Vec<Product> = read_json(products)?;
            let product = products
                .iter()
                .find(|p| &p.sku == sku)
                .with_context(|| format!("no product with SKU {}", sku))?;

            let request = PurchaseOrderRequest::restock(
                &config.erpnext.warehouse,
                vec![PurchaseOrderLine {
                    sku: product.sku.clone(),
                    quantity,
                    rate: product.cost,
                }],
                Utc::now().date_naive(),
            );
            let name = erp_client(&config)?.create_purchase_order(&request).await?;
            println!("{}", name);
            Ok(())
        }
        ("deliver", [sales_order]) => {
            let name = erp_client(&config)?.create_delivery_note(sales_order).await?;
            println!("{}", name);
            Ok(())
        }
        ("erp-low-stock", rest) if rest.len() <= 1 => {
            let threshold = match rest.first() {
                Some(raw) => parse_arg("threshold", raw)?,
                None => config.sync.low_stock_threshold,
            };
            print_json(&erp_client(&config)?.low_stock_bins(threshold).await?)
        }
        ("analytics", [from, to]) => {
            let from: NaiveDate = parse_arg("from", from)?;
            let to: NaiveDate = parse_arg("to", to)?;
            print_json(&erp_client(&config)?.sales_analytics(from, to).await?)
        }
        ("delete-item", [sku]) => {
            if !erp_client(&config)?.delete_item(sku).await? {
                tracing::warn!("{} was not in the ERP", sku);
            }
            Ok(())
        }
        ("version", []) => {
            println!("{}", erp_client(&config)?.get_version().await?);
            Ok(())
        }
        ("ping", []) => {
            let client = ErpNextClient::new(config.erpnext.clone())?;
            if !client.test_connection().await? {
                bail!("ERPNext at {} is not reachable", config.erpnext.base_url);
            }
            println!("ok");
            Ok(())
        }
        _ => bail!("{}", USAGE),
    }
}

fn erp_client(config: &AppConfig) -> Result<Arc<ErpNextClient>> {
    Ok(Arc::new(ErpNextClient::new(config.erpnext.clone())?))
}

fn parse_arg<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.parse()
        .ok()
        .with_context(|| format!("invalid {}: {:?}", name, raw))
}

fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
