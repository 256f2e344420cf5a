use std::collections::HashMap;
use std::env;

use anyhow::{Context, Result};

use crate::models::product::Platform;
use crate::services::erp::ErpNextConfig;
use crate::services::marketplace::MarketplaceConfig;

pub const DEFAULT_WAREHOUSE: &str = "Stores - COMP";
pub const DEFAULT_COMPANY: &str = "Your Company";

/// Orchestrator-wide knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Deadline applied to every adapter call the orchestrators issue.
    pub timeout_secs: u64,
    pub low_stock_threshold: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            low_stock_threshold: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub erpnext: ErpNextConfig,
    /// Marketplaces with an API URL configured. Unconfigured ones are left out
    /// of the adapter registry.
    pub marketplaces: Vec<MarketplaceConfig>,
    pub sync: SyncConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .with_context(|| format!("{} must be set", key))
        };

        let erpnext = ErpNextConfig {
            base_url: required("ERPNEXT_URL")?.trim_end_matches('/').to_string(),
            api_key: required("ERPNEXT_API_KEY")?,
            api_secret: required("ERPNEXT_API_SECRET")?,
            company: lookup("ERPNEXT_COMPANY").unwrap_or_else(|| DEFAULT_COMPANY.to_string()),
            warehouse: lookup("ERPNEXT_WAREHOUSE").unwrap_or_else(|| DEFAULT_WAREHOUSE.to_string()),
            timeout_secs: parse_or(&lookup, "ERPNEXT_TIMEOUT_SECS", 30)?,
        };
        erpnext.validate().context("invalid ERPNext configuration")?;

        let mut marketplaces = Vec::new();
        for platform in Platform::ALL {
            let prefix = platform.as_str().to_ascii_uppercase();
            let Some(base_url) = lookup(&format!("{}_API_URL", prefix)) else {
                tracing::info!("No API URL configured for {}, skipping adapter", platform);
                continue;
            };

            let config = MarketplaceConfig {
                platform,
                base_url: base_url.trim_end_matches('/').to_string(),
                partner_id: required(&format!("{}_PARTNER_ID", prefix))?,
                partner_key: required(&format!("{}_PARTNER_KEY", prefix))?,
                timeout_secs: parse_or(&lookup, &format!("{}_TIMEOUT_SECS", prefix), 30)?,
            };
            config
                .validate()
                .with_context(|| format!("invalid {} configuration", platform))?;
            marketplaces.push(config);
        }

        let defaults = SyncConfig::default();
        let sync = SyncConfig {
            timeout_secs: parse_or(&lookup, "SYNC_TIMEOUT_SECS", defaults.timeout_secs)?,
            low_stock_threshold: parse_or(
                &lookup,
                "LOW_STOCK_THRESHOLD",
                defaults.low_stock_threshold,
            )?,
        };

        Ok(Self {
            erpnext,
            marketplaces,
            sync,
        })
    }

    /// Convenience for tests and tooling that hold settings in a map.
    pub fn from_map(values: &HashMap<String, String>) -> Result<Self> {
        Self::from_lookup(|key| values.get(key).cloned())
    }
}

fn parse_or<F>(lookup: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} must be a non-negative integer, got {:?}", key, raw)),
        None => Ok(default),
    }
}
