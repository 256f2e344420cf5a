// ERP Reconciliation Service
// Brings the ERP's recorded stock in line with local totals, one product at a
// time. A product that fails is reported and the batch moves on.

use std::sync::Arc;

use chrono::Utc;

use super::{guarded, ErpAdapter, ErpError, ErpItemFields, Result};
use crate::models::product::Product;
use crate::models::sync::{ErpStockLevel, FailedItem, PullReport, ReconciledItem, ReconciliationReport};
use crate::services::sync_options::SyncOptions;
use crate::utils::log_sanitizer::sanitize_for_log;

pub struct ErpReconciliationService {
    erp: Arc<dyn ErpAdapter>,
    warehouse: String,
}

impl ErpReconciliationService {
    pub fn new(erp: Arc<dyn ErpAdapter>, warehouse: impl Into<String>) -> Self {
        Self {
            erp,
            warehouse: warehouse.into(),
        }
    }

    // ========================================================================
    // Local -> ERP
    // ========================================================================

    /// Push local total stock for each product into the ERP.
    ///
    /// Products are handled in order. Every product ends up in exactly one of
    /// `succeeded` or `failed`, including those skipped after cancellation.
    pub async fn reconcile_to_erp(
        &self,
        products: &[Product],
        options: &SyncOptions,
    ) -> ReconciliationReport {
        let mut report = ReconciliationReport::default();

        for product in products {
            if options.cancel.is_cancelled() {
                report.failed.push(FailedItem {
                    sku: product.sku.clone(),
                    error_message: ErpError::Cancelled.to_string(),
                });
                continue;
            }

            match self.reconcile_item(product, options).await {
                Ok(item) => report.succeeded.push(item),
                Err(e) => {
                    let message = sanitize_for_log(&e.to_string());
                    tracing::warn!(
                        "Reconciliation failed for {}: {}",
                        sanitize_for_log(&product.sku),
                        message
                    );
                    report.failed.push(FailedItem {
                        sku: product.sku.clone(),
                        error_message: message,
                    });
                }
            }
        }

        tracing::info!(
            "ERP reconciliation finished: {} reconciled ({} adjusted), {} failed",
            report.succeeded.len(),
            report.adjusted_count(),
            report.failed.len()
        );

        report
    }

    /// Reconcile, then stamp every product the ERP now agrees with as synced.
    ///
    /// Products that failed keep their previous sync markers.
    pub async fn reconcile_and_mark(
        &self,
        products: &mut [Product],
        options: &SyncOptions,
    ) -> ReconciliationReport {
        let report = self.reconcile_to_erp(products, options).await;

        let now = Utc::now();
        for item in &report.succeeded {
            if let Some(product) = products.iter_mut().find(|p| p.sku == item.sku) {
                product.mark_erp_synced(item.sku.clone(), now);
            }
        }

        report
    }

    async fn reconcile_item(&self, product: &Product, options: &SyncOptions) -> Result<ReconciledItem> {
        self.ensure_item(product, options).await?;

        let remote_stock = guarded(options, self.erp.get_total_stock(&product.sku)).await?;
        let target_stock = product.total_stock();
        let delta = i64::try_from(target_stock)
            .ok()
            .and_then(|target| target.checked_sub(remote_stock))
            .ok_or_else(|| {
                ErpError::Permanent(format!(
                    "stock delta out of range (local {}, ERP {})",
                    target_stock, remote_stock
                ))
            })?;

        if delta == 0 {
            tracing::debug!("{} already matches ERP at {}", sanitize_for_log(&product.sku), remote_stock);
        } else {
            let adjustment = guarded(
                options,
                self.erp.adjust_stock(&product.sku, delta, &self.warehouse),
            )
            .await?;

            tracing::info!(
                "{} adjusted by {:+} in ERP ({} -> {}) via {}",
                sanitize_for_log(&product.sku),
                delta,
                remote_stock,
                target_stock,
                sanitize_for_log(&adjustment.entry_name)
            );
        }

        Ok(ReconciledItem {
            sku: product.sku.clone(),
            previous_erp_stock: remote_stock,
            target_stock,
            delta,
        })
    }

    /// Make sure the ERP knows the item: refresh it if present, create it if not.
    async fn ensure_item(&self, product: &Product, options: &SyncOptions) -> Result<()> {
        let fields = ErpItemFields::from_product(product);

        if guarded(options, self.erp.get_item(&product.sku)).await?.is_some() {
            guarded(options, self.erp.update_item(&product.sku, &fields)).await?;
            return Ok(());
        }

        match guarded(options, self.erp.create_item(&fields)).await {
            Ok(_) => Ok(()),
            Err(ErpError::Conflict(_)) => {
                // Created concurrently; the item exists either way.
                tracing::debug!("{} appeared in ERP during create", sanitize_for_log(&product.sku));
                if let Err(e) = guarded(options, self.erp.update_item(&product.sku, &fields)).await {
                    if matches!(e, ErpError::Cancelled | ErpError::TimedOut(_)) {
                        return Err(e);
                    }
                    tracing::warn!(
                        "Could not refresh {} after create conflict: {}",
                        sanitize_for_log(&product.sku),
                        e
                    );
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // ERP -> Local
    // ========================================================================

    /// Read the ERP's total stock for each SKU. Nothing is written locally.
    pub async fn pull_from_erp(&self, skus: &[String], options: &SyncOptions) -> PullReport {
        let mut report = PullReport::default();

        for sku in skus {
            if options.cancel.is_cancelled() {
                report.failed.push(FailedItem {
                    sku: sku.clone(),
                    error_message: ErpError::Cancelled.to_string(),
                });
                continue;
            }

            match guarded(options, self.erp.get_total_stock(sku)).await {
                Ok(stock) => report.levels.push(ErpStockLevel {
                    sku: sku.clone(),
                    stock,
                }),
                Err(e) => {
                    let message = sanitize_for_log(&e.to_string());
                    tracing::warn!("Could not read ERP stock for {}: {}", sanitize_for_log(sku), message);
                    report.failed.push(FailedItem {
                        sku: sku.clone(),
                        error_message: message,
                    });
                }
            }
        }

        tracing::info!(
            "ERP pull finished: {} read, {} failed",
            report.levels.len(),
            report.failed.len()
        );

        report
    }
}
