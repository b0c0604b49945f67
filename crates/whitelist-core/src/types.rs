//! ============================================================================
//! Core Types for Whitelist Verification
//! ============================================================================
//! Addresses, error kinds and the single result handed back per verification.
//! These types are serialized to JSON for the CLI `--json` output.
//! ============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Blockchain address, compared case-insensitively (not checksum-aware)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wrap a raw address string as-is
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Parse user input, trimming whitespace and rejecting empty strings
    pub fn parse(raw: &str) -> Result<Self, WhitelistError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(WhitelistError::InvalidAddress(
                "address must not be empty".into(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The address exactly as supplied
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lower-cased form used for every comparison
    pub fn normalized(&self) -> String {
        self.0.to_lowercase()
    }

    /// Shortened form for logs and messages: `0x49af...93a7`
    pub fn short(&self) -> String {
        let chars: Vec<char> = self.0.chars().collect();
        if chars.len() <= 10 {
            return self.0.clone();
        }
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized().hash(state);
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Address {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

/// One request to verify an address; immutable once created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRequest {
    address: Address,
}

impl VerificationRequest {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }
}

/// Why a remote call failed. Drives retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "code", rename_all = "snake_case")]
pub enum ErrorKind {
    /// Request could not be dispatched (DNS, refused connection, ...)
    Network,
    /// Cross-origin block reported by the transport
    Cors,
    /// Bounded request time elapsed
    Timeout,
    /// Service answered with a non-success status
    HttpStatus(u16),
    /// Connectivity probe reported the service as down
    ServiceUnavailable,
    /// Anything else
    Unknown,
}

impl ErrorKind {
    /// Presentation-neutral sentence a shell can show to the user
    pub fn user_message(&self) -> String {
        match self {
            ErrorKind::Network => {
                "Network connection failed, please check your connection".to_string()
            }
            ErrorKind::Cors => "Cross-origin request was blocked".to_string(),
            ErrorKind::Timeout => "Request timed out, please try again later".to_string(),
            ErrorKind::HttpStatus(code) => format!("Whitelist service returned HTTP {}", code),
            ErrorKind::ServiceUnavailable => {
                "Whitelist service is unavailable, local whitelist was used".to_string()
            }
            ErrorKind::Unknown => "Unexpected error while checking the whitelist".to_string(),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Network => f.write_str("network error"),
            ErrorKind::Cors => f.write_str("CORS error"),
            ErrorKind::Timeout => f.write_str("timeout"),
            ErrorKind::HttpStatus(code) => write!(f, "HTTP {}", code),
            ErrorKind::ServiceUnavailable => f.write_str("service unavailable"),
            ErrorKind::Unknown => f.write_str("unknown error"),
        }
    }
}

/// Where a verdict came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Remote,
    Fallback,
}

/// Verdict plus provenance, for choosing a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Whitelisted,
    NotWhitelisted,
    FallbackWhitelisted,
    FallbackNotWhitelisted,
}

impl Verdict {
    pub fn display_name(&self) -> &'static str {
        match self {
            Verdict::Whitelisted => "Whitelisted",
            Verdict::NotWhitelisted => "Not whitelisted",
            Verdict::FallbackWhitelisted => "Whitelisted (local list)",
            Verdict::FallbackNotWhitelisted => "Not whitelisted (local list)",
        }
    }
}

/// Outcome of one `verify` call. Created once, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub address: Address,
    pub is_whitelisted: bool,
    /// Always true once a result reaches the caller; fallback cannot fail
    pub success: bool,
    /// Last error kind encountered during this verification, if any
    pub error_kind: Option<ErrorKind>,
    /// Detail of the last failure (status category, probe reason, ...)
    pub error_message: Option<String>,
    pub source: Source,
    /// Zero-based index of the final query attempt
    pub attempt: u32,
    /// JSON body returned by the service for remote verdicts
    pub raw_response: Option<serde_json::Value>,
    pub checked_at: DateTime<Utc>,
}

impl VerificationResult {
    /// Verdict returned by the remote service
    pub fn remote(address: Address, is_whitelisted: bool, attempt: u32) -> Self {
        Self::build(address, is_whitelisted, Source::Remote, attempt)
    }

    /// Verdict taken from the local fallback set
    pub fn fallback(address: Address, is_whitelisted: bool, attempt: u32) -> Self {
        Self::build(address, is_whitelisted, Source::Fallback, attempt)
    }

    fn build(address: Address, is_whitelisted: bool, source: Source, attempt: u32) -> Self {
        Self {
            address,
            is_whitelisted,
            success: true,
            error_kind: None,
            error_message: None,
            source,
            attempt,
            raw_response: None,
            checked_at: Utc::now(),
        }
    }

    /// Attach the last failure seen before this verdict
    pub fn with_failure(mut self, kind: Option<ErrorKind>, message: Option<String>) -> Self {
        self.error_kind = kind;
        self.error_message = message;
        self
    }

    pub fn with_raw_response(mut self, raw: Option<serde_json::Value>) -> Self {
        self.raw_response = raw;
        self
    }

    pub fn verdict(&self) -> Verdict {
        match (self.source, self.is_whitelisted) {
            (Source::Remote, true) => Verdict::Whitelisted,
            (Source::Remote, false) => Verdict::NotWhitelisted,
            (Source::Fallback, true) => Verdict::FallbackWhitelisted,
            (Source::Fallback, false) => Verdict::FallbackNotWhitelisted,
        }
    }

    /// Structural comparison ignoring the wall-clock `checked_at`
    pub fn same_outcome(&self, other: &Self) -> bool {
        self.address == other.address
            && self.is_whitelisted == other.is_whitelisted
            && self.success == other.success
            && self.error_kind == other.error_kind
            && self.error_message == other.error_message
            && self.source == other.source
            && self.attempt == other.attempt
            && self.raw_response == other.raw_response
    }
}

/// Construction and configuration errors. `verify` itself never fails.
#[derive(Debug, thiserror::Error)]
pub enum WhitelistError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}
