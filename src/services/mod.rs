pub mod erp;
pub mod inventory_service;
pub mod inventory_sync_service;
pub mod marketplace;
pub mod stock_aggregator;
pub mod sync_options;

pub use erp::{ErpAdapter, ErpError, ErpNextClient, ErpReconciliationService, OrderSyncService};
pub use inventory_service::{low_stock, summarize, InventorySummary, LowStockItem};
pub use inventory_sync_service::{InventorySyncService, SyncError};
pub use marketplace::{MarketplaceClient, PlatformAdapter, PlatformError, PlatformRegistry};
pub use stock_aggregator::compute_total_stock;
pub use sync_options::{CancelSignal, SyncOptions};
