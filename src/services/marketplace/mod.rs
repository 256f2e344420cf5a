// Marketplace Integration Module
// The platform adapter seam plus a signed HTTP client usable for any marketplace.

pub mod marketplace_client;

pub use marketplace_client::{MarketplaceClient, MarketplaceConfig};

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::product::Platform;
use crate::models::sync::PlatformOutcome;
use crate::services::sync_options::Interrupted;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    /// Network failure, rate limiting or a 5xx; a later attempt may succeed.
    #[error("transient error: {0}")]
    Transient(String),

    /// The marketplace rejected the update.
    #[error("rejected: {0}")]
    Permanent(String),

    #[error("cancelled before the marketplace responded")]
    Cancelled,

    #[error("no response within {0:?}")]
    TimedOut(std::time::Duration),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no adapter configured")]
    NotConfigured,
}

impl PlatformError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PlatformError::Transient(_) | PlatformError::TimedOut(_))
    }
}

impl From<Interrupted> for PlatformError {
    fn from(reason: Interrupted) -> Self {
        match reason {
            Interrupted::Cancelled => PlatformError::Cancelled,
            Interrupted::TimedOut(limit) => PlatformError::TimedOut(limit),
        }
    }
}

pub type Result<T> = std::result::Result<T, PlatformError>;

/// One marketplace's stock API.
#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn platform(&self) -> Platform;

    /// Set the marketplace's stock for `item_ref` to `quantity`.
    async fn update_stock(&self, item_ref: &str, quantity: u32) -> Result<PlatformOutcome>;
}

/// Adapters keyed by the marketplace they serve.
#[derive(Clone, Default)]
pub struct PlatformRegistry {
    adapters: BTreeMap<Platform, Arc<dyn PlatformAdapter>>,
}

impl PlatformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one [`MarketplaceClient`] per configured marketplace.
    pub fn from_configs(configs: &[MarketplaceConfig]) -> Result<Self> {
        let mut registry = Self::new();
        for config in configs {
            registry.register(Arc::new(MarketplaceClient::new(config.clone())?));
        }
        Ok(registry)
    }

    /// Add an adapter, replacing any previous one for the same platform.
    pub fn register(&mut self, adapter: Arc<dyn PlatformAdapter>) -> &mut Self {
        self.adapters.insert(adapter.platform(), adapter);
        self
    }

    pub fn get(&self, platform: Platform) -> Option<&Arc<dyn PlatformAdapter>> {
        self.adapters.get(&platform)
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.adapters.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl std::fmt::Debug for PlatformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformRegistry")
            .field("platforms", &self.platforms())
            .finish()
    }
}
