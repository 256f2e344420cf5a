// Marketplace Open API Client
// Pushes stock figures to a marketplace partner API.
// Requests are signed with HMAC-SHA256 over partner id, path and timestamp.

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use sha2::Sha256;

use super::{PlatformAdapter, PlatformError, Result};
use crate::models::product::Platform;
use crate::models::sync::PlatformOutcome;
use crate::utils::log_sanitizer::{redact_sensitive, sanitize_for_log};

type HmacSha256 = Hmac<Sha256>;

pub const UPDATE_STOCK_PATH: &str = "/api/v2/product/update_stock";

// ============================================================================
// Configuration
// ============================================================================

#[derive(Clone, PartialEq, Eq)]
pub struct MarketplaceConfig {
    pub platform: Platform,
    pub base_url: String,
    pub partner_id: String,
    pub partner_key: String,
    pub timeout_secs: u64,
}

impl MarketplaceConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(PlatformError::Config(format!(
                "{} base_url must be an http(s) URL",
                self.platform
            )));
        }
        if self.partner_id.is_empty() {
            return Err(PlatformError::Config("partner_id is required".to_string()));
        }
        if self.partner_key.is_empty() {
            return Err(PlatformError::Config("partner_key is required".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(PlatformError::Config("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for MarketplaceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketplaceConfig")
            .field("platform", &self.platform)
            .field("base_url", &self.base_url)
            .field("partner_id", &self.partner_id)
            .field("partner_key", &redact_sensitive(&self.partner_key))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// ============================================================================
// Marketplace Client
// ============================================================================

pub struct MarketplaceClient {
    config: MarketplaceConfig,
    http_client: Client,
}

impl MarketplaceClient {
    pub fn new(config: MarketplaceConfig) -> Result<Self> {
        config.validate()?;

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PlatformError::Config(e.to_string()))?;

        Ok(Self { config, http_client })
    }

    /// Hex HMAC-SHA256 of `partner_id + path + timestamp` keyed by the partner key.
    fn sign(&self, path: &str, timestamp: i64) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.config.partner_key.as_bytes())
            .map_err(|_| PlatformError::Config("partner_key cannot key HMAC".to_string()))?;
        mac.update(format!("{}{}{}", self.config.partner_id, path, timestamp).as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn signed_query(&self, path: &str) -> Result<Vec<(&'static str, String)>> {
        let timestamp = Utc::now().timestamp();
        let sign = self.sign(path, timestamp)?;
        Ok(vec![
            ("partner_id", self.config.partner_id.clone()),
            ("timestamp", timestamp.to_string()),
            ("sign", sign),
        ])
    }
}

#[async_trait::async_trait]
impl PlatformAdapter for MarketplaceClient {
    fn platform(&self) -> Platform {
        self.config.platform
    }

    async fn update_stock(&self, item_ref: &str, quantity: u32) -> Result<PlatformOutcome> {
        let url = format!("{}{}", self.config.base_url, UPDATE_STOCK_PATH);
        let body = serde_json::json!({
            "item_id": item_ref,
            "stock": quantity,
        });

        let response = self
            .http_client
            .post(&url)
            .query(&self.signed_query(UPDATE_STOCK_PATH)?)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(classify_transport_error)?;

        if !status.is_success() {
            return Err(classify_status(status, &text));
        }

        let payload: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| {
                PlatformError::Permanent(format!("unreadable response: {}", e))
            })?
        };

        // Partner APIs report business errors inside a 200 body.
        if let Some(code) = payload
            .get("error")
            .and_then(Value::as_str)
            .filter(|code| !code.is_empty())
        {
            let message = payload
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            return Err(PlatformError::Permanent(sanitize_for_log(&format!(
                "{}: {}",
                code, message
            ))));
        }

        tracing::debug!(
            "{} accepted stock {} for {}",
            self.config.platform,
            quantity,
            sanitize_for_log(item_ref)
        );

        Ok(PlatformOutcome {
            item_ref: item_ref.to_string(),
            quantity,
            response: payload,
        })
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn classify_status(status: StatusCode, body: &str) -> PlatformError {
    let message = format!("HTTP {}: {}", status.as_u16(), sanitize_for_log(body));
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
    {
        PlatformError::Transient(message)
    } else {
        PlatformError::Permanent(message)
    }
}

fn classify_transport_error(err: reqwest::Error) -> PlatformError {
    if err.is_decode() || err.is_builder() {
        PlatformError::Permanent(err.to_string())
    } else {
        PlatformError::Transient(err.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MarketplaceConfig {
        MarketplaceConfig {
            platform: Platform::Shopee,
            base_url: "https://partner.shopee.test".to_string(),
            partner_id: "2001".to_string(),
            partner_key: "shopee-key".to_string(),
            timeout_secs: 10,
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(config().validate().is_ok());

        let mut bad = config();
        bad.partner_key.clear();
        assert!(bad.validate().is_err());

        let mut bad = config();
        bad.base_url = "partner.shopee.test".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_partner_key() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("shopee-key"));
        assert!(rendered.contains("[REDACTED-10]"));
    }

    #[test]
    fn test_signature_is_stable_hex() {
        let client = MarketplaceClient::new(config()).unwrap();

        let first = client.sign(UPDATE_STOCK_PATH, 1_700_000_000).unwrap();
        let again = client.sign(UPDATE_STOCK_PATH, 1_700_000_000).unwrap();
        let later = client.sign(UPDATE_STOCK_PATH, 1_700_000_001).unwrap();

        assert_eq!(first, again);
        assert_ne!(first, later);
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_transient());
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST, "invalid\nstock"),
            PlatformError::Permanent("HTTP 400: invalid stock".to_string())
        );
    }
}
