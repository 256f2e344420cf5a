// ERPNext REST Client
// Talks to the Frappe resource API (/api/resource/<DocType>) with token auth.
// Documents that need finalizing (stock entries, sales, purchase and delivery
// documents) are created and then submitted; a draft whose submit fails is
// deleted again.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, Response, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{
    ErpAdapter, ErpBinLevel, ErpCustomer, ErpError, ErpItem, ErpItemFields, NewCustomer,
    PurchaseOrderRequest, Result, SalesAnalytics, SalesOrderConfirmation, SalesOrderRequest,
    SalesOrderSummary, StockAdjustment, StockEntryType,
};
use crate::utils::log_sanitizer::{redact_sensitive, sanitize_for_log};

/// Characters escaped inside one URL path segment. DocType names contain spaces
/// and item codes may contain slashes.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

// ============================================================================
// Configuration
// ============================================================================

#[derive(Clone, PartialEq, Eq)]
pub struct ErpNextConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: String,
    pub company: String,
    /// Warehouse stock adjustments and sales order lines are booked against.
    pub warehouse: String,
    pub timeout_secs: u64,
}

impl ErpNextConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ErpError::Config("base_url must be an http(s) URL".to_string()));
        }
        if self.api_key.is_empty() {
            return Err(ErpError::Config("api_key is required".to_string()));
        }
        if self.api_secret.is_empty() {
            return Err(ErpError::Config("api_secret is required".to_string()));
        }
        if self.warehouse.trim().is_empty() {
            return Err(ErpError::Config("warehouse is required".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(ErpError::Config("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for ErpNextConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErpNextConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact_sensitive(&self.api_key))
            .field("api_secret", &redact_sensitive(&self.api_secret))
            .field("company", &self.company)
            .field("warehouse", &self.warehouse)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ============================================================================
// Response Models
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct NamedDoc {
    name: String,
}

#[derive(Debug, Deserialize)]
struct BinRow {
    #[serde(default)]
    actual_qty: Option<f64>,
}

/// Reply shape of whitelisted `/api/method/...` calls.
#[derive(Debug, Deserialize)]
struct MethodReply<T> {
    message: T,
}

#[derive(Debug, Deserialize)]
struct SalesOrderDoc {
    customer: String,
    #[serde(default)]
    docstatus: i64,
    #[serde(default)]
    items: Vec<SalesOrderDocLine>,
}

#[derive(Debug, Deserialize)]
struct SalesOrderDocLine {
    item_code: String,
    qty: f64,
    #[serde(default)]
    rate: f64,
    #[serde(default)]
    warehouse: Option<String>,
}

// ============================================================================
// ERPNext Client
// ============================================================================

#[derive(Clone)]
pub struct ErpNextClient {
    config: ErpNextConfig,
    http_client: Client,
}

impl ErpNextClient {
    pub fn new(config: ErpNextConfig) -> Result<Self> {
        config.validate()?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ErpError::Config(e.to_string()))?;

        Ok(Self { config, http_client })
    }

    pub fn config(&self) -> &ErpNextConfig {
        &self.config
    }

    /// Check that the ERPNext instance answers and accepts our token.
    pub async fn test_connection(&self) -> Result<bool> {
        let url = format!("{}/api/method/ping", self.config.base_url);
        match self.send(self.http_client.get(url)).await {
            Ok(_) => {
                tracing::info!("ERPNext connection successful");
                Ok(true)
            }
            Err(e) => {
                tracing::error!("ERPNext connection failed: {}", e);
                Ok(false)
            }
        }
    }

    // ========================================================================
    // HTTP Helpers
    // ========================================================================

    fn resource_url(&self, doctype: &str, name: Option<&str>) -> String {
        let mut url = format!(
            "{}/api/resource/{}",
            self.config.base_url,
            utf8_percent_encode(doctype, PATH_SEGMENT)
        );
        if let Some(name) = name {
            url.push('/');
            url.push_str(&utf8_percent_encode(name, PATH_SEGMENT).to_string());
        }
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .header(
                AUTHORIZATION,
                format!("token {}:{}", self.config.api_key, self.config.api_secret),
            )
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }

    async fn read_data<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| ErpError::Permanent(format!("unexpected ERPNext response: {}", e)))?;
        Ok(envelope.data)
    }

    /// Create a document, then submit it (`docstatus: 1`).
    ///
    /// The create/submit/cleanup sequence runs on its own task, so a caller that
    /// stops waiting (deadline, cancellation) never strands a draft: the task
    /// still either submits the document or deletes it.
    pub(crate) async fn create_and_submit(&self, doctype: &str, payload: &Value) -> Result<String> {
        let client = self.clone();
        let doctype = doctype.to_string();
        let payload = payload.clone();

        tokio::spawn(async move { client.finalize_document(&doctype, &payload).await })
            .await
            .map_err(|e| ErpError::Permanent(format!("document task aborted: {}", e)))?
    }

    async fn finalize_document(&self, doctype: &str, payload: &Value) -> Result<String> {
        let response = self
            .send(self.http_client.post(self.resource_url(doctype, None)).json(payload))
            .await?;
        let created: NamedDoc = self.read_data(response).await?;

        let submit = self
            .send(
                self.http_client
                    .put(self.resource_url(doctype, Some(&created.name)))
                    .json(&json!({ "docstatus": 1 })),
            )
            .await;

        if let Err(e) = submit {
            tracing::warn!(
                "Submitting {} {} failed, removing draft: {}",
                doctype,
                sanitize_for_log(&created.name),
                e
            );
            let cleanup = self
                .send(self.http_client.delete(self.resource_url(doctype, Some(&created.name))))
                .await;
            if let Err(cleanup_err) = cleanup {
                tracing::error!(
                    "Draft {} {} could not be removed: {}",
                    doctype,
                    sanitize_for_log(&created.name),
                    cleanup_err
                );
            }
            return Err(e);
        }

        Ok(created.name)
    }
}

// ============================================================================
// Purchasing, Fulfilment and Reporting
// ============================================================================

impl ErpNextClient {
    pub async fn get_version(&self) -> Result<String> {
        let url = format!("{}/api/method/version", self.config.base_url);
        let response = self.send(self.http_client.get(url)).await?;
        let reply: MethodReply<String> = response
            .json()
            .await
            .map_err(|e| ErpError::Permanent(format!("unexpected ERPNext response: {}", e)))?;
        Ok(reply.message)
    }

    /// Remove an item from the ERP. `false` when there was nothing to remove.
    pub async fn delete_item(&self, sku: &str) -> Result<bool> {
        match self
            .send(self.http_client.delete(self.resource_url("Item", Some(sku))))
            .await
        {
            Ok(_) => {
                tracing::info!("Item deleted from ERPNext: {}", sanitize_for_log(sku));
                Ok(true)
            }
            Err(ErpError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create and submit a purchase order; returns its ERP name.
    pub async fn create_purchase_order(&self, request: &PurchaseOrderRequest) -> Result<String> {
        if request.lines.is_empty() {
            return Err(ErpError::Permanent("purchase order has no lines".to_string()));
        }

        let name = self
            .create_and_submit(
                "Purchase Order",
                &purchase_order_payload(request, &self.config.company),
            )
            .await?;

        tracing::info!(
            "Purchase Order {} submitted in ERPNext for supplier {}",
            sanitize_for_log(&name),
            sanitize_for_log(&request.supplier)
        );
        Ok(name)
    }

    /// Ship a submitted sales order in full; returns the delivery note name.
    pub async fn create_delivery_note(&self, sales_order: &str) -> Result<String> {
        let response = self
            .send(self.http_client.get(self.resource_url("Sales Order", Some(sales_order))))
            .await?;
        let order: SalesOrderDoc = self.read_data(response).await?;

        if order.docstatus != 1 {
            return Err(ErpError::Permanent(format!(
                "sales order {} is not submitted",
                sanitize_for_log(sales_order)
            )));
        }
        if order.items.is_empty() {
            return Err(ErpError::Permanent(format!(
                "sales order {} has no items",
                sanitize_for_log(sales_order)
            )));
        }

        let payload = delivery_note_payload(sales_order, &order, &self.config.warehouse);
        let name = self.create_and_submit("Delivery Note", &payload).await?;

        tracing::info!(
            "Delivery Note {} submitted in ERPNext against {}",
            sanitize_for_log(&name),
            sanitize_for_log(sales_order)
        );
        Ok(name)
    }

    /// Every warehouse bin holding fewer than `threshold` units.
    pub async fn low_stock_bins(&self, threshold: u64) -> Result<Vec<ErpBinLevel>> {
        let filters = json!([["actual_qty", "<", threshold]]).to_string();
        let fields = json!(["item_code", "warehouse", "actual_qty"]).to_string();

        let response = self
            .send(self.http_client.get(self.resource_url("Bin", None)).query(&[
                ("filters", filters.as_str()),
                ("fields", fields.as_str()),
                ("limit_page_length", "0"),
            ]))
            .await?;

        self.read_data(response).await
    }

    /// Submitted sales orders dated within `from..=to`, totalled per marketplace.
    pub async fn sales_analytics(&self, from: NaiveDate, to: NaiveDate) -> Result<SalesAnalytics> {
        if from > to {
            return Err(ErpError::Permanent(format!(
                "analytics range starts after it ends ({} > {})",
                from, to
            )));
        }

        let filters = json!([
            ["transaction_date", ">=", from.format("%Y-%m-%d").to_string()],
            ["transaction_date", "<=", to.format("%Y-%m-%d").to_string()],
            ["docstatus", "=", 1]
        ])
        .to_string();
        let fields = json!([
            "name",
            "customer",
            "transaction_date",
            "grand_total",
            "custom_marketplace"
        ])
        .to_string();

        let response = self
            .send(self.http_client.get(self.resource_url("Sales Order", None)).query(&[
                ("filters", filters.as_str()),
                ("fields", fields.as_str()),
                ("limit_page_length", "0"),
            ]))
            .await?;

        let orders: Vec<SalesOrderSummary> = self.read_data(response).await?;
        Ok(SalesAnalytics::from_orders(from, to, &orders))
    }
}

#[async_trait::async_trait]
impl ErpAdapter for ErpNextClient {
    async fn get_item(&self, sku: &str) -> Result<Option<ErpItem>> {
        match self
            .send(self.http_client.get(self.resource_url("Item", Some(sku))))
            .await
        {
            Ok(response) => Ok(Some(self.read_data(response).await?)),
            Err(ErpError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_item(&self, fields: &ErpItemFields) -> Result<ErpItem> {
        let response = self
            .send(
                self.http_client
                    .post(self.resource_url("Item", None))
                    .json(&create_item_payload(fields)),
            )
            .await?;

        tracing::info!("Item created in ERPNext: {}", sanitize_for_log(&fields.item_code));
        self.read_data(response).await
    }

    async fn update_item(&self, sku: &str, fields: &ErpItemFields) -> Result<ErpItem> {
        let response = self
            .send(
                self.http_client
                    .put(self.resource_url("Item", Some(sku)))
                    .json(&update_item_payload(fields)),
            )
            .await?;

        tracing::debug!("Item updated in ERPNext: {}", sanitize_for_log(sku));
        self.read_data(response).await
    }

    async fn get_total_stock(&self, sku: &str) -> Result<i64> {
        let filters = json!([["item_code", "=", sku]]).to_string();
        let fields = json!(["warehouse", "actual_qty"]).to_string();

        let response = self
            .send(self.http_client.get(self.resource_url("Bin", None)).query(&[
                ("filters", filters.as_str()),
                ("fields", fields.as_str()),
                ("limit_page_length", "0"),
            ]))
            .await?;

        let bins: Vec<BinRow> = self.read_data(response).await?;
        let total: f64 = bins.iter().map(|bin| bin.actual_qty.unwrap_or(0.0)).sum();
        Ok(whole_units(sku, total))
    }

    async fn adjust_stock(&self, sku: &str, quantity: i64, warehouse: &str) -> Result<StockAdjustment> {
        if quantity == 0 {
            return Err(ErpError::Permanent(format!(
                "refusing zero-quantity stock entry for {}",
                sku
            )));
        }

        let entry_type = StockEntryType::for_delta(quantity);
        let payload = stock_entry_payload(
            sku,
            quantity.unsigned_abs(),
            entry_type,
            warehouse,
            &self.config.company,
        );
        let entry_name = self.create_and_submit("Stock Entry", &payload).await?;

        tracing::info!(
            "Stock entry {} submitted in ERPNext: {} {} x{}",
            sanitize_for_log(&entry_name),
            entry_type.as_str(),
            sanitize_for_log(sku),
            quantity.unsigned_abs()
        );

        Ok(StockAdjustment {
            entry_name,
            entry_type,
            quantity: quantity.unsigned_abs(),
            warehouse: warehouse.to_string(),
        })
    }

    async fn get_customer(&self, email: &str) -> Result<Option<ErpCustomer>> {
        let filters = json!([["email_id", "=", email]]).to_string();
        let fields = json!(["name", "customer_name", "customer_group", "email_id"]).to_string();

        let response = match self
            .send(self.http_client.get(self.resource_url("Customer", None)).query(&[
                ("filters", filters.as_str()),
                ("fields", fields.as_str()),
            ]))
            .await
        {
            Ok(response) => response,
            Err(ErpError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        let customers: Vec<ErpCustomer> = self.read_data(response).await?;
        Ok(customers.into_iter().next())
    }

    async fn create_customer(&self, customer: &NewCustomer) -> Result<ErpCustomer> {
        let response = self
            .send(
                self.http_client
                    .post(self.resource_url("Customer", None))
                    .json(&customer_payload(customer)),
            )
            .await?;

        let created: ErpCustomer = self.read_data(response).await?;
        tracing::info!("Customer created in ERPNext: {}", sanitize_for_log(&created.name));
        Ok(created)
    }

    async fn create_sales_order(&self, order: &SalesOrderRequest) -> Result<SalesOrderConfirmation> {
        let name = self
            .create_and_submit("Sales Order", &sales_order_payload(order))
            .await?;

        tracing::info!("Sales Order created in ERPNext: {}", sanitize_for_log(&name));
        Ok(SalesOrderConfirmation { name })
    }
}

// ============================================================================
// Payload Builders
// ============================================================================

/// Local stock is counted in whole units; ERPNext may hold fractional UOM figures.
fn whole_units(sku: &str, total: f64) -> i64 {
    let rounded = total.round();
    if rounded != total {
        tracing::warn!(
            "ERP stock for {} is fractional ({}); reconciling against {}",
            sanitize_for_log(sku),
            total,
            rounded
        );
    }
    rounded as i64
}

fn money(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

fn platform_flags(fields: &ErpItemFields, payload: &mut serde_json::Map<String, Value>) {
    for (platform, enabled) in &fields.platform_enabled {
        payload.insert(
            format!("custom_{}_enabled", platform.as_str()),
            json!(if *enabled { 1 } else { 0 }),
        );
    }
}

fn create_item_payload(fields: &ErpItemFields) -> Value {
    let mut payload = serde_json::Map::new();
    payload.insert("doctype".into(), json!("Item"));
    payload.insert("item_code".into(), json!(fields.item_code));
    payload.insert("item_name".into(), json!(fields.item_name));
    payload.insert("description".into(), json!(fields.description));
    payload.insert("item_group".into(), json!(fields.item_group));
    payload.insert("stock_uom".into(), json!("Nos"));
    payload.insert("is_stock_item".into(), json!(1));
    payload.insert("is_sales_item".into(), json!(1));
    payload.insert("is_purchase_item".into(), json!(1));
    payload.insert("opening_stock".into(), json!(fields.opening_stock));
    payload.insert("valuation_rate".into(), json!(money(fields.valuation_rate)));
    payload.insert("standard_rate".into(), json!(money(fields.standard_rate)));
    payload.insert("has_variants".into(), json!(0));
    platform_flags(fields, &mut payload);
    Value::Object(payload)
}

fn update_item_payload(fields: &ErpItemFields) -> Value {
    let mut payload = serde_json::Map::new();
    payload.insert("item_name".into(), json!(fields.item_name));
    payload.insert("description".into(), json!(fields.description));
    payload.insert("standard_rate".into(), json!(money(fields.standard_rate)));
    platform_flags(fields, &mut payload);
    Value::Object(payload)
}

fn stock_entry_payload(
    sku: &str,
    quantity: u64,
    entry_type: StockEntryType,
    warehouse: &str,
    company: &str,
) -> Value {
    let now = Utc::now();
    let (target, source) = match entry_type {
        StockEntryType::MaterialReceipt => (Some(warehouse), None),
        StockEntryType::MaterialIssue => (None, Some(warehouse)),
    };

    json!({
        "doctype": "Stock Entry",
        "stock_entry_type": entry_type.as_str(),
        "company": company,
        "posting_date": now.format("%Y-%m-%d").to_string(),
        "posting_time": now.format("%H:%M:%S").to_string(),
        "items": [{
            "item_code": sku,
            "qty": quantity,
            "basic_rate": 0,
            "t_warehouse": target,
            "s_warehouse": source,
        }]
    })
}

fn customer_payload(customer: &NewCustomer) -> Value {
    let name = if customer.name.trim().is_empty() {
        "Walk-In Customer"
    } else {
        customer.name.trim()
    };

    json!({
        "doctype": "Customer",
        "customer_name": name,
        "customer_type": "Individual",
        "customer_group": "Individual",
        "territory": "All Territories",
        "email_id": customer.email,
        "mobile_no": customer.phone,
    })
}

fn sales_order_payload(order: &SalesOrderRequest) -> Value {
    let items: Vec<Value> = order
        .lines
        .iter()
        .map(|line| {
            json!({
                "item_code": line.sku,
                "qty": line.quantity,
                "rate": money(line.rate),
                "warehouse": line.warehouse,
            })
        })
        .collect();

    json!({
        "doctype": "Sales Order",
        "customer": order.customer,
        "order_type": "Sales",
        "transaction_date": order.order_date.format("%Y-%m-%d").to_string(),
        "delivery_date": order.delivery_date.format("%Y-%m-%d").to_string(),
        "items": items,
        "custom_marketplace": order.marketplace.display_name(),
        "custom_marketplace_order_id": order.marketplace_order_id,
        "custom_marketplace_order_date": order.order_date.to_rfc3339(),
        "custom_shipping_address": order.shipping_address,
    })
}

fn purchase_order_payload(request: &PurchaseOrderRequest, company: &str) -> Value {
    let items: Vec<Value> = request
        .lines
        .iter()
        .map(|line| {
            json!({
                "item_code": line.sku,
                "qty": line.quantity,
                "rate": money(line.rate),
                "warehouse": request.warehouse,
                "schedule_date": request.schedule_date.format("%Y-%m-%d").to_string(),
            })
        })
        .collect();

    json!({
        "doctype": "Purchase Order",
        "supplier": request.supplier,
        "company": company,
        "schedule_date": request.schedule_date.format("%Y-%m-%d").to_string(),
        "items": items,
    })
}

fn delivery_note_payload(sales_order: &str, order: &SalesOrderDoc, default_warehouse: &str) -> Value {
    let items: Vec<Value> = order
        .items
        .iter()
        .map(|line| {
            json!({
                "item_code": line.item_code,
                "qty": line.qty,
                "rate": line.rate,
                "warehouse": line.warehouse.as_deref().unwrap_or(default_warehouse),
                "against_sales_order": sales_order,
            })
        })
        .collect();

    json!({
        "doctype": "Delivery Note",
        "customer": order.customer,
        "posting_date": Utc::now().format("%Y-%m-%d").to_string(),
        "items": items,
    })
}

// ============================================================================
// Error Classification
// ============================================================================

fn classify_status(status: StatusCode, body: &str) -> ErpError {
    let message = format!("HTTP {}: {}", status.as_u16(), sanitize_for_log(body));
    match status {
        StatusCode::NOT_FOUND => ErpError::NotFound(message),
        StatusCode::CONFLICT => ErpError::Conflict(message),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => ErpError::Transient(message),
        s if s.is_server_error() => ErpError::Transient(message),
        _ => ErpError::Permanent(message),
    }
}

fn classify_transport_error(err: reqwest::Error) -> ErpError {
    if err.is_builder() || err.is_decode() {
        ErpError::Permanent(err.to_string())
    } else {
        ErpError::Transient(err.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
