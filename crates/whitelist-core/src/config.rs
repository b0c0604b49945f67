//! ============================================================================
//! Verifier Configuration
//! ============================================================================
//! Service location, timeouts, retry limits and the local fallback list.
//! The core never reads the environment; shells build this value and pass it in.
//! ============================================================================

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::types::WhitelistError;

/// Default whitelist service
pub const DEFAULT_BASE_URL: &str = "https://xdcheck.okart.fun";

/// Health probe timeout (5 seconds)
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;

/// Whitelist query timeout (10 seconds)
pub const DEFAULT_QUERY_TIMEOUT_MS: u64 = 10_000;

/// Retries after the initial attempt
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Fixed pause between attempts
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;

/// Addresses known to be whitelisted, mirrored from the service database
pub const DEFAULT_FALLBACK_ADDRESSES: [&str; 4] = [
    "0x49afe40999fe9551be999ae4205e4dddded493a7",
    "0x55a48983f5c070d4ad6ae259399071b25e698fc8",
    "0xe8affb540377301efc5622435ff35d49996c3e1a",
    "0x8da7584bf0d0977f1f7a57905cfbd0c1cc95571b",
];

/// Configuration for a verification orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Base URL of the whitelist service, without trailing path
    pub base_url: String,
    pub probe_timeout_ms: u64,
    pub query_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Local whitelist consulted when the service cannot answer
    pub fallback_addresses: Vec<String>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            query_timeout_ms: DEFAULT_QUERY_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            fallback_addresses: DEFAULT_FALLBACK_ADDRESSES
                .iter()
                .map(|a| a.to_string())
                .collect(),
        }
    }
}

impl VerifierConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the verifier cannot work with
    pub fn validate(&self) -> Result<(), WhitelistError> {
        self.parsed_base_url()?;

        if self.probe_timeout_ms == 0 {
            return Err(WhitelistError::InvalidConfig(
                "probe_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.query_timeout_ms == 0 {
            return Err(WhitelistError::InvalidConfig(
                "query_timeout_ms must be greater than zero".into(),
            ));
        }
        if let Some(idx) = self
            .fallback_addresses
            .iter()
            .position(|a| a.trim().is_empty())
        {
            return Err(WhitelistError::InvalidConfig(format!(
                "fallback_addresses[{}] is empty",
                idx
            )));
        }

        Ok(())
    }

    /// Full URL of an endpoint below the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url, WhitelistError> {
        let base = self.parsed_base_url()?;
        let joined = format!(
            "{}/{}",
            base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| WhitelistError::InvalidBaseUrl {
            url: joined.clone(),
            reason: e.to_string(),
        })
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    fn parsed_base_url(&self) -> Result<Url, WhitelistError> {
        let url = Url::parse(self.base_url.trim()).map_err(|e| WhitelistError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(WhitelistError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: format!("unsupported scheme '{}'", other),
            }),
        }
    }
}
