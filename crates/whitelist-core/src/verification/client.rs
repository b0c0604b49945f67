//! ============================================================================
//! Whitelist Client - Remote whitelist query for one address
//! ============================================================================
//! `POST {base}/api/signature/is-white-address-xdcheck` with `{ "address" }`.
//! Only 2xx answers are accepted. A missing or malformed `isWhitelisted`
//! field counts as not whitelisted.
//! ============================================================================

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use super::classifier::{ClassifiedError, ClientFailure, StatusCategory};
use crate::config::VerifierConfig;
use crate::types::{Address, WhitelistError};

/// Whitelist query endpoint, relative to the service base URL
pub const WHITELIST_PATH: &str = "/api/signature/is-white-address-xdcheck";

/// Successful answer from the whitelist service
#[derive(Debug, Clone, PartialEq)]
pub struct WhitelistResponse {
    pub is_whitelisted: bool,
    /// Parsed body, when it was valid JSON
    pub raw: Option<Value>,
}

/// Anything that can ask the remote authority about one address
#[async_trait]
pub trait WhitelistQuery: Send + Sync {
    async fn query(&self, address: &Address) -> Result<WhitelistResponse, ClassifiedError>;
}

#[derive(Debug, Serialize)]
struct WhitelistRequest<'a> {
    address: &'a str,
}

/// HTTP implementation of the whitelist query
pub struct WhitelistClient {
    client: Client,
    url: Url,
    timeout: Duration,
}

impl WhitelistClient {
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
            config.endpoint(WHITELIST_PATH)?,
            config.query_timeout(),
        ))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn send(&self, address: &Address) -> Result<WhitelistResponse, ClientFailure> {
        let request = WhitelistRequest {
            address: address.as_str(),
        };
        debug!("Sending whitelist request for {}", address.short());

        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientFailure::from_reqwest(&e, self.timeout))?;

        let status = response.status();
        debug!("Whitelist response status: {}", status);

        if !status.is_success() {
            return Err(ClientFailure::Status(StatusCategory::from_code(
                status.as_u16(),
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ClientFailure::from_reqwest(&e, self.timeout))?;

        Ok(parse_whitelist_body(&body))
    }
}

#[async_trait]
impl WhitelistQuery for WhitelistClient {
    async fn query(&self, address: &Address) -> Result<WhitelistResponse, ClassifiedError> {
        // Transports may ignore their own timeout option; race against a timer
        match tokio::time::timeout(self.timeout, self.send(address)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(failure)) => Err(failure.into()),
            Err(_) => Err(ClientFailure::TimedOut(self.timeout).into()),
        }
    }
}

/// Extract the verdict from a 2xx body. Never assumes success.
pub fn parse_whitelist_body(body: &str) -> WhitelistResponse {
    match serde_json::from_str::<Value>(body) {
        Ok(raw) => {
            let is_whitelisted = match raw.get("isWhitelisted") {
                Some(Value::Bool(flag)) => *flag,
                Some(other) => {
                    warn!("Malformed isWhitelisted field: {} - assuming false", other);
                    false
                }
                None => {
                    warn!("Response has no isWhitelisted field - assuming false");
                    false
                }
            };
            WhitelistResponse {
                is_whitelisted,
                raw: Some(raw),
            }
        }
        Err(e) => {
            warn!("Whitelist response is not JSON: {} - assuming false", e);
            WhitelistResponse {
                is_whitelisted: false,
                raw: None,
            }
        }
    }
}
