//! ============================================================================
//! Error Classifier - Raw transport failures to ErrorKind
//! ============================================================================
//! Rules, checked in order:
//! - request could not be dispatched -> Network
//! - message mentions a cross-origin block -> Cors
//! - bounded time elapsed -> Timeout
//! - non-success status -> HttpStatus(code)
//! - anything else -> Unknown
//!
//! ServiceUnavailable is never produced here; only the probe step reports it.
//! ============================================================================

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::ErrorKind;

/// Human-readable category of a non-success status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCategory {
    NotFound,
    MethodNotAllowed,
    InternalError,
    Other(u16),
}

impl StatusCategory {
    pub fn from_code(code: u16) -> Self {
        match code {
            404 => StatusCategory::NotFound,
            405 => StatusCategory::MethodNotAllowed,
            500 => StatusCategory::InternalError,
            other => StatusCategory::Other(other),
        }
    }

    pub fn code(&self) -> u16 {
        match self {
            StatusCategory::NotFound => 404,
            StatusCategory::MethodNotAllowed => 405,
            StatusCategory::InternalError => 500,
            StatusCategory::Other(code) => *code,
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCategory::NotFound => f.write_str("API endpoint not found (404)"),
            StatusCategory::MethodNotAllowed => f.write_str(
                "API method not supported (405), the endpoint route is likely misconfigured",
            ),
            StatusCategory::InternalError => f.write_str("Upstream internal server error (500)"),
            StatusCategory::Other(code) => write!(f, "HTTP error {}", code),
        }
    }
}

/// Raw failure of one remote call, before classification
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientFailure {
    #[error("Request could not be dispatched: {0}")]
    Dispatch(String),

    #[error("Request timed out after {} ms", .0.as_millis())]
    TimedOut(Duration),

    #[error("{0}")]
    Status(StatusCategory),

    #[error("{0}")]
    Other(String),
}

impl ClientFailure {
    /// Map a reqwest error; `timeout` is the bound that was in force
    pub fn from_reqwest(err: &reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ClientFailure::TimedOut(timeout)
        } else if err.is_connect() || err.is_request() || err.is_builder() {
            ClientFailure::Dispatch(err.to_string())
        } else {
            ClientFailure::Other(err.to_string())
        }
    }
}

/// A failure together with its classification
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<ClientFailure> for ClassifiedError {
    fn from(failure: ClientFailure) -> Self {
        Self {
            kind: classify(&failure),
            message: failure.to_string(),
        }
    }
}

/// Classify a raw failure
pub fn classify(failure: &ClientFailure) -> ErrorKind {
    match failure {
        ClientFailure::Dispatch(_) => ErrorKind::Network,
        ClientFailure::TimedOut(_) => ErrorKind::Timeout,
        ClientFailure::Status(category) => ErrorKind::HttpStatus(category.code()),
        ClientFailure::Other(message) => classify_message(message),
    }
}

/// Classify a free-form transport message
pub fn classify_message(message: &str) -> ErrorKind {
    let lower = message.to_lowercase();

    if lower.contains("cors") || lower.contains("cross-origin") {
        return ErrorKind::Cors;
    }

    if lower.contains("timeout") || lower.contains("timed out") {
        return ErrorKind::Timeout;
    }

    ErrorKind::Unknown
}
