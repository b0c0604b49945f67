//! ============================================================================
//! Retry Policy - Bounded, fixed-delay retries of the whitelist query
//! ============================================================================
//! At most `max_retries` retries after the initial attempt (two by default),
//! a fixed pause between attempts, and never a retry for ServiceUnavailable.
//! No jitter, no exponential growth: every attempt is already time-bounded.
//! ============================================================================

use std::time::Duration;

use super::classifier::ClassifiedError;
use crate::config::{VerifierConfig, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS};
use crate::types::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    pub fn from_config(config: &VerifierConfig) -> Self {
        Self::new(config.max_retries, config.retry_delay())
    }

    /// Whether a failed attempt number `attempt` (zero-based) may be retried
    pub fn should_retry(&self, kind: ErrorKind, attempt: u32) -> bool {
        kind != ErrorKind::ServiceUnavailable && attempt < self.max_retries
    }

    /// Pause before the attempt following `attempt`
    pub fn delay_for(&self, _attempt: u32) -> Duration {
        self.delay
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

/// Progress of one verification; local to a single `verify` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    pub attempt: u32,
    pub last_error_kind: Option<ErrorKind>,
    pub last_error_message: Option<String>,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_failure(&mut self, error: &ClassifiedError) {
        self.last_error_kind = Some(error.kind);
        self.last_error_message = Some(error.message.clone());
    }

    /// Move on to the next attempt
    pub fn advance(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
    }
}
