// Order Sync Service
// Turns marketplace orders into submitted ERP sales orders, creating the ERP
// customer on first sight. Orders are isolated from each other.

use std::sync::Arc;

use chrono::Duration;

use super::{
    guarded, ErpAdapter, ErpCustomer, ErpError, NewCustomer, Result, SalesOrderLine,
    SalesOrderRequest,
};
use crate::models::order::Order;
use crate::models::sync::{FailedOrder, OrderSyncReport, SyncedOrder};
use crate::services::sync_options::SyncOptions;
use crate::utils::log_sanitizer::sanitize_for_log;

/// Days between the marketplace order date and the ERP delivery date.
pub const DELIVERY_LEAD_DAYS: i64 = 7;

pub struct OrderSyncService {
    erp: Arc<dyn ErpAdapter>,
    warehouse: String,
}

impl OrderSyncService {
    pub fn new(erp: Arc<dyn ErpAdapter>, warehouse: impl Into<String>) -> Self {
        Self {
            erp,
            warehouse: warehouse.into(),
        }
    }

    pub async fn sync_orders_to_erp(&self, orders: &[Order], options: &SyncOptions) -> OrderSyncReport {
        let mut report = OrderSyncReport::default();

        for order in orders {
            if options.cancel.is_cancelled() {
                report.failed.push(FailedOrder {
                    platform_order_id: order.platform_order_id.clone(),
                    error_message: ErpError::Cancelled.to_string(),
                });
                continue;
            }

            // Already booked in the ERP under this sales order.
            if let (true, Some(existing)) = (order.erp_synced, order.erp_sales_order.as_ref()) {
                report.succeeded.push(SyncedOrder {
                    platform_order_id: order.platform_order_id.clone(),
                    sales_order: existing.clone(),
                });
                continue;
            }

            match self.sync_order(order, options).await {
                Ok(sales_order) => report.succeeded.push(SyncedOrder {
                    platform_order_id: order.platform_order_id.clone(),
                    sales_order,
                }),
                Err(e) => {
                    let message = sanitize_for_log(&e.to_string());
                    tracing::warn!(
                        "Order {} from {} not synced: {}",
                        sanitize_for_log(&order.platform_order_id),
                        order.platform,
                        message
                    );
                    report.failed.push(FailedOrder {
                        platform_order_id: order.platform_order_id.clone(),
                        error_message: message,
                    });
                }
            }
        }

        tracing::info!(
            "Order sync finished: {} synced, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );

        report
    }

    /// Sync, then record the ERP sales order on each order that made it.
    pub async fn sync_and_mark(&self, orders: &mut [Order], options: &SyncOptions) -> OrderSyncReport {
        let report = self.sync_orders_to_erp(orders, options).await;

        for synced in &report.succeeded {
            if let Some(order) = orders
                .iter_mut()
                .find(|o| o.platform_order_id == synced.platform_order_id)
            {
                order.erp_sales_order = Some(synced.sales_order.clone());
                order.erp_synced = true;
            }
        }

        report
    }

    async fn sync_order(&self, order: &Order, options: &SyncOptions) -> Result<String> {
        if order.items.is_empty() {
            return Err(ErpError::Permanent("order has no items".to_string()));
        }

        let customer = self.ensure_customer(order, options).await?;
        let request = self.sales_order_request(order, customer.name);
        let confirmation = guarded(options, self.erp.create_sales_order(&request)).await?;

        tracing::info!(
            "Order {} synced as {}",
            sanitize_for_log(&order.platform_order_id),
            sanitize_for_log(&confirmation.name)
        );

        Ok(confirmation.name)
    }

    async fn ensure_customer(&self, order: &Order, options: &SyncOptions) -> Result<ErpCustomer> {
        let email = order
            .customer_email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty());

        if let Some(email) = email {
            if let Some(existing) = guarded(options, self.erp.get_customer(email)).await? {
                return Ok(existing);
            }
        }

        let new_customer = NewCustomer {
            name: order.customer_name.clone(),
            email: email.map(str::to_string),
            phone: order.customer_phone.clone(),
        };

        match guarded(options, self.erp.create_customer(&new_customer)).await {
            Ok(created) => Ok(created),
            Err(ErpError::Conflict(message)) => {
                let email = email.ok_or_else(|| ErpError::Conflict(message.clone()))?;
                guarded(options, self.erp.get_customer(email))
                    .await?
                    .ok_or(ErpError::Conflict(message))
            }
            Err(e) => Err(e),
        }
    }

    fn sales_order_request(&self, order: &Order, customer: String) -> SalesOrderRequest {
        SalesOrderRequest {
            customer,
            marketplace: order.platform,
            marketplace_order_id: order.platform_order_id.clone(),
            order_date: order.order_date,
            delivery_date: (order.order_date + Duration::days(DELIVERY_LEAD_DAYS)).date_naive(),
            shipping_address: order
                .shipping_address
                .as_ref()
                .map(|address| address.one_line())
                .filter(|line| !line.is_empty()),
            lines: order
                .items
                .iter()
                .map(|item| SalesOrderLine {
                    sku: item.sku.clone(),
                    quantity: item.quantity,
                    rate: item.price,
                    warehouse: self.warehouse.clone(),
                })
                .collect(),
        }
    }
}
