//! ============================================================================
//! Connectivity Probe - Pre-flight health check of the whitelist service
//! ============================================================================
//! One bounded GET against the health endpoint. No retries; the answer is
//! authoritative for the verification session that asked for it.
//! ============================================================================

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::VerifierConfig;
use crate::types::WhitelistError;

/// Health endpoint, relative to the service base URL
pub const HEALTH_PATH: &str = "/api/test";

/// Result of a connectivity probe
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    /// Service answered with 2xx; body kept for diagnostics when it is JSON
    Healthy { body: Option<Value> },
    /// Service could not be reached or answered with a failure
    Unhealthy(String),
}

impl ProbeOutcome {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ProbeOutcome::Healthy { .. })
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ProbeOutcome::Healthy { .. } => None,
            ProbeOutcome::Unhealthy(reason) => Some(reason),
        }
    }
}

/// Anything that can report whether the whitelist service is up
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Never fails; problems are reported as `Unhealthy`
    async fn probe(&self) -> ProbeOutcome;
}

/// HTTP implementation against `GET {base}/api/test`
pub struct ConnectivityProbe {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl ConnectivityProbe {
    pub fn new(client: Client, url: Url, timeout: Duration) -> Self {
        Self {
            client,
            url,
            timeout,
        }
    }

    pub fn from_config(config: &VerifierConfig, client: Client) -> Result<Self, WhitelistError> {
        Ok(Self::new(
            client,
            config.endpoint(HEALTH_PATH)?,
            config.probe_timeout(),
        ))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn check(&self) -> Result<Option<Value>, String> {
        let response = self
            .client
            .get(self.url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    format!("timed out after {} ms", self.timeout.as_millis())
                } else {
                    e.to_string()
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            ));
        }

        // Body is optional; a health endpoint answering plain text is still healthy
        Ok(response.json::<Value>().await.ok())
    }
}

#[async_trait]
impl HealthProbe for ConnectivityProbe {
    async fn probe(&self) -> ProbeOutcome {
        debug!("Testing API connection at {}", self.url);

        match tokio::time::timeout(self.timeout, self.check()).await {
            Ok(Ok(body)) => {
                debug!("API test successful: {:?}", body);
                ProbeOutcome::Healthy { body }
            }
            Ok(Err(reason)) => {
                warn!("API connection test failed: {}", reason);
                ProbeOutcome::Unhealthy(reason)
            }
            Err(_) => {
                let reason = format!("timed out after {} ms", self.timeout.as_millis());
                warn!("API connection test failed: {}", reason);
                ProbeOutcome::Unhealthy(reason)
            }
        }
    }
}
