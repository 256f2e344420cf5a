// In-memory ERP used by the orchestrator tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{
    ErpAdapter, ErpCustomer, ErpError, ErpItem, ErpItemFields, NewCustomer, Result,
    SalesOrderConfirmation, SalesOrderRequest, StockAdjustment, StockEntryType,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedAdjustment {
    pub sku: String,
    pub quantity: i64,
    pub warehouse: String,
}

#[derive(Default)]
struct State {
    items: HashMap<String, ErpItem>,
    stock: HashMap<String, i64>,
    customers: Vec<ErpCustomer>,

    failing_skus: HashSet<String>,
    failing_orders: HashSet<String>,
    create_conflicts: HashSet<String>,
    customer_conflict: Option<ErpCustomer>,

    created_items: Vec<String>,
    updated_items: Vec<String>,
    adjustments: Vec<RecordedAdjustment>,
    created_customers: Vec<NewCustomer>,
    sales_orders: Vec<SalesOrderRequest>,
}

#[derive(Default)]
pub struct MockErp {
    state: Mutex<State>,
    delay: Option<Duration>,
}

impl MockErp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    /// Register an existing item holding `stock` units.
    pub fn with_item(self, sku: &str, stock: i64) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.items.insert(sku.to_string(), item(sku));
            state.stock.insert(sku.to_string(), stock);
        }
        self
    }

    /// Every call touching `sku` fails with a transient error.
    pub fn failing_for(self, sku: &str) -> Self {
        self.state.lock().unwrap().failing_skus.insert(sku.to_string());
        self
    }

    /// `create_item` for `sku` reports a conflict although `get_item` saw nothing.
    pub fn conflicting_create(self, sku: &str) -> Self {
        self.state.lock().unwrap().create_conflicts.insert(sku.to_string());
        self
    }

    pub fn with_customer(self, customer: ErpCustomer) -> Self {
        self.state.lock().unwrap().customers.push(customer);
        self
    }

    /// `create_customer` reports a conflict; the customer becomes visible to
    /// lookups only afterwards.
    pub fn conflicting_customer(self, customer: ErpCustomer) -> Self {
        self.state.lock().unwrap().customer_conflict = Some(customer);
        self
    }

    pub fn failing_order(self, marketplace_order_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_orders
            .insert(marketplace_order_id.to_string());
        self
    }

    pub fn adjustments(&self) -> Vec<RecordedAdjustment> {
        self.state.lock().unwrap().adjustments.clone()
    }

    pub fn created_items(&self) -> Vec<String> {
        self.state.lock().unwrap().created_items.clone()
    }

    pub fn updated_items(&self) -> Vec<String> {
        self.state.lock().unwrap().updated_items.clone()
    }

    pub fn created_customers(&self) -> Vec<NewCustomer> {
        self.state.lock().unwrap().created_customers.clone()
    }

    pub fn sales_orders(&self) -> Vec<SalesOrderRequest> {
        self.state.lock().unwrap().sales_orders.clone()
    }

    pub fn stock_of(&self, sku: &str) -> i64 {
        self.state.lock().unwrap().stock.get(sku).copied().unwrap_or(0)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_sku(&self, sku: &str) -> Result<()> {
        if self.state.lock().unwrap().failing_skus.contains(sku) {
            return Err(ErpError::Transient(format!("ERP unreachable for {}", sku)));
        }
        Ok(())
    }
}

fn item(sku: &str) -> ErpItem {
    ErpItem {
        item_code: sku.to_string(),
        item_name: Some(sku.to_string()),
        item_group: Some("Products".to_string()),
        standard_rate: None,
    }
}

#[async_trait]
impl ErpAdapter for MockErp {
    async fn get_item(&self, sku: &str) -> Result<Option<ErpItem>> {
        self.pause().await;
        self.check_sku(sku)?;
        Ok(self.state.lock().unwrap().items.get(sku).cloned())
    }

    async fn create_item(&self, fields: &ErpItemFields) -> Result<ErpItem> {
        self.pause().await;
        self.check_sku(&fields.item_code)?;

        let mut state = self.state.lock().unwrap();
        if state.create_conflicts.contains(&fields.item_code)
            || state.items.contains_key(&fields.item_code)
        {
            return Err(ErpError::Conflict(fields.item_code.clone()));
        }

        let created = item(&fields.item_code);
        state.items.insert(fields.item_code.clone(), created.clone());
        state
            .stock
            .insert(fields.item_code.clone(), fields.opening_stock as i64);
        state.created_items.push(fields.item_code.clone());
        Ok(created)
    }

    async fn update_item(&self, sku: &str, _fields: &ErpItemFields) -> Result<ErpItem> {
        self.pause().await;
        self.check_sku(sku)?;

        let mut state = self.state.lock().unwrap();
        let existing = state
            .items
            .get(sku)
            .cloned()
            .ok_or_else(|| ErpError::NotFound(sku.to_string()))?;
        state.updated_items.push(sku.to_string());
        Ok(existing)
    }

    async fn get_total_stock(&self, sku: &str) -> Result<i64> {
        self.pause().await;
        self.check_sku(sku)?;
        Ok(self.stock_of(sku))
    }

    async fn adjust_stock(&self, sku: &str, quantity: i64, warehouse: &str) -> Result<StockAdjustment> {
        self.pause().await;
        self.check_sku(sku)?;

        let mut state = self.state.lock().unwrap();
        *state.stock.entry(sku.to_string()).or_insert(0) += quantity;
        state.adjustments.push(RecordedAdjustment {
            sku: sku.to_string(),
            quantity,
            warehouse: warehouse.to_string(),
        });

        Ok(StockAdjustment {
            entry_name: format!("MAT-STE-{:05}", state.adjustments.len()),
            entry_type: StockEntryType::for_delta(quantity),
            quantity: quantity.unsigned_abs(),
            warehouse: warehouse.to_string(),
        })
    }

    async fn get_customer(&self, email: &str) -> Result<Option<ErpCustomer>> {
        self.pause().await;
        Ok(self
            .state
            .lock()
            .unwrap()
            .customers
            .iter()
            .find(|c| c.email_id.as_deref() == Some(email))
            .cloned())
    }

    async fn create_customer(&self, customer: &NewCustomer) -> Result<ErpCustomer> {
        self.pause().await;

        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state.customer_conflict.take() {
            state.customers.push(existing);
            return Err(ErpError::Conflict(customer.name.clone()));
        }

        let created = ErpCustomer {
            name: format!("CUST-{:05}", state.created_customers.len() + 1),
            customer_name: Some(customer.name.clone()),
            email_id: customer.email.clone(),
        };
        state.created_customers.push(customer.clone());
        state.customers.push(created.clone());
        Ok(created)
    }

    async fn create_sales_order(&self, order: &SalesOrderRequest) -> Result<SalesOrderConfirmation> {
        self.pause().await;

        let mut state = self.state.lock().unwrap();
        if state.failing_orders.contains(&order.marketplace_order_id) {
            return Err(ErpError::Permanent(format!(
                "item missing for order {}",
                order.marketplace_order_id
            )));
        }

        state.sales_orders.push(order.clone());
        Ok(SalesOrderConfirmation {
            name: format!("SAL-ORD-{:05}", state.sales_orders.len()),
        })
    }
}
