use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::product::Platform;

/// Payload a marketplace returned for an accepted stock update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformOutcome {
    pub item_ref: String,
    pub quantity: u32,
    pub response: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFailure {
    pub platform: Platform,
    pub message: String,
}

/// Result of pushing one stock figure to every marketplace.
///
/// Each platform appears in exactly one of `platforms` (accepted) or `errors`
/// (rejected, timed out or cancelled). `success` is true iff `errors` is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: bool,
    pub platforms: BTreeMap<Platform, PlatformOutcome>,
    pub errors: Vec<PlatformFailure>,
}

impl Default for SyncResult {
    fn default() -> Self {
        Self {
            success: true,
            platforms: BTreeMap::new(),
            errors: Vec::new(),
        }
    }
}

impl SyncResult {
    pub fn record_success(&mut self, platform: Platform, outcome: PlatformOutcome) {
        self.platforms.insert(platform, outcome);
    }

    pub fn record_failure(&mut self, platform: Platform, message: impl Into<String>) {
        self.errors.push(PlatformFailure {
            platform,
            message: message.into(),
        });
        self.success = false;
    }

    pub fn is_partial(&self) -> bool {
        !self.platforms.is_empty() && !self.errors.is_empty()
    }

    pub fn failed_platforms(&self) -> impl Iterator<Item = Platform> + '_ {
        self.errors.iter().map(|e| e.platform)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciledItem {
    pub sku: String,
    pub previous_erp_stock: i64,
    pub target_stock: u64,
    pub delta: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedItem {
    pub sku: String,
    pub error_message: String,
}

/// Outcome of pushing local totals into the ERP, one entry per product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub succeeded: Vec<ReconciledItem>,
    pub failed: Vec<FailedItem>,
}

impl ReconciliationReport {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn adjusted_count(&self) -> usize {
        self.succeeded.iter().filter(|item| item.delta != 0).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErpStockLevel {
    pub sku: String,
    pub stock: i64,
}

/// Stock figures read back from the ERP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullReport {
    pub levels: Vec<ErpStockLevel>,
    pub failed: Vec<FailedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncedOrder {
    pub platform_order_id: String,
    pub sales_order: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedOrder {
    pub platform_order_id: String,
    pub error_message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSyncReport {
    pub succeeded: Vec<SyncedOrder>,
    pub failed: Vec<FailedOrder>,
}
