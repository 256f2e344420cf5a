// Inventory Sync Service
// Pushes one stock figure to every marketplace at once and reports
// per-platform outcomes. A failing marketplace never stops the others.

use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use uuid::Uuid;

use crate::models::product::{Platform, Product};
use crate::models::sync::{PlatformOutcome, SyncResult};
use crate::repositories::{ProductRepository, RepositoryError};
use crate::services::marketplace::{PlatformError, PlatformRegistry};
use crate::services::sync_options::SyncOptions;
use crate::utils::log_sanitizer::sanitize_for_log;

// ============================================================================
// Error Types
// ============================================================================

/// Failures that prevent a fan-out from starting. Per-platform failures are
/// reported inside [`SyncResult`] instead.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

pub type Result<T> = std::result::Result<T, SyncError>;

// ============================================================================
// Inventory Sync Service
// ============================================================================

pub struct InventorySyncService {
    products: Arc<dyn ProductRepository>,
    platforms: PlatformRegistry,
}

impl InventorySyncService {
    pub fn new(products: Arc<dyn ProductRepository>, platforms: PlatformRegistry) -> Self {
        Self { products, platforms }
    }

    /// Set `new_stock` on every marketplace for the product.
    ///
    /// Only an unknown `product_id` is an error. Marketplace failures, timeouts
    /// and cancellation land in `SyncResult::errors`, as does any marketplace
    /// without a registered adapter.
    pub async fn sync_inventory(
        &self,
        product_id: Uuid,
        new_stock: u32,
        options: &SyncOptions,
    ) -> Result<SyncResult> {
        let product = self
            .products
            .find_by_id(product_id)
            .await?
            .ok_or(SyncError::ProductNotFound(product_id))?;

        if self.platforms.len() < Platform::ALL.len() {
            tracing::warn!(
                "Only {} of {} marketplaces have an adapter; the rest are reported as failed for {}",
                self.platforms.len(),
                Platform::ALL.len(),
                sanitize_for_log(&product.sku)
            );
        }

        let result = self.fan_out(&product, new_stock, options).await;

        tracing::info!(
            "Stock sync for {} to {}: {} succeeded, {} failed",
            sanitize_for_log(&product.sku),
            new_stock,
            result.platforms.len(),
            result.errors.len()
        );

        Ok(result)
    }

    /// Fan out, then store `new_stock` locally for the platforms that accepted it.
    ///
    /// Platforms that failed keep their previous local figure so the next sync
    /// still sees the discrepancy.
    pub async fn sync_and_apply(
        &self,
        product_id: Uuid,
        new_stock: u32,
        options: &SyncOptions,
    ) -> Result<(SyncResult, Product)> {
        let result = self.sync_inventory(product_id, new_stock, options).await?;

        let mut product = self
            .products
            .find_by_id(product_id)
            .await?
            .ok_or(SyncError::ProductNotFound(product_id))?;

        let updated = product.apply_sync_result(&result, new_stock);
        if !updated.is_empty() {
            self.products.save(&product).await?;
        }

        Ok((result, product))
    }

    async fn fan_out(&self, product: &Product, new_stock: u32, options: &SyncOptions) -> SyncResult {
        let calls = Platform::ALL.into_iter().map(|platform| {
            let adapter = self.platforms.get(platform);
            let item_ref = product.item_ref(platform);
            async move {
                let Some(adapter) = adapter else {
                    return (platform, Err(PlatformError::NotConfigured));
                };
                let outcome = match options.guard(adapter.update_stock(&item_ref, new_stock)).await {
                    Ok(outcome) => outcome,
                    Err(interrupted) => Err(PlatformError::from(interrupted)),
                };
                (platform, outcome)
            }
        });

        // Every call resolves before the result is assembled; each writes its own slot.
        let outcomes: Vec<(Platform, std::result::Result<PlatformOutcome, PlatformError>)> =
            join_all(calls).await;

        let mut result = SyncResult::default();
        for (platform, outcome) in outcomes {
            match outcome {
                Ok(outcome) => result.record_success(platform, outcome),
                Err(e) => {
                    let message = sanitize_for_log(&e.to_string());
                    tracing::warn!(
                        "Stock update for {} on {} failed: {}",
                        sanitize_for_log(&product.sku),
                        platform,
                        message
                    );
                    result.record_failure(platform, message);
                }
            }
        }

        result
    }
}

// ============================================================================
// Tests
// ============================================================================
