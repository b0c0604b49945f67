//! ============================================================================
//! Verification Module - Whitelist checks with graceful degradation
//! ============================================================================
//! Decides whether an address may use the gated feature by asking the remote
//! whitelist service, and falls back to a local address set when it cannot.
//!
//! ## Components
//! - **ConnectivityProbe**: one bounded health check per session
//! - **WhitelistClient**: the actual whitelist query
//! - **Classifier**: raw failure -> ErrorKind
//! - **RetryPolicy**: at most two retries, fixed 1s delay
//! - **FallbackVerifier**: case-insensitive local lookup, never fails
//! - **VerificationOrchestrator**: composes all of the above
//!
//! ## Usage
//! ```rust,ignore
//! use whitelist_core::{VerificationOrchestrator, VerifierConfig};
//!
//! let orchestrator = VerificationOrchestrator::from_config(&VerifierConfig::default())?;
//! let result = orchestrator.verify("0x49afe40999fe9551be999ae4205e4dddded493a7").await;
//! println!("{} via {:?}", result.is_whitelisted, result.source);
//! ```
//! ============================================================================

mod classifier;
mod client;
mod fallback;
mod orchestrator;
mod probe;
mod retry;
mod session;

// Re-export public types
pub use classifier::{classify, classify_message, ClassifiedError, ClientFailure, StatusCategory};
pub use client::{
    parse_whitelist_body, WhitelistClient, WhitelistQuery, WhitelistResponse, WHITELIST_PATH,
};
pub use fallback::{FallbackVerdict, FallbackVerifier};
pub use orchestrator::VerificationOrchestrator;
pub use probe::{ConnectivityProbe, HealthProbe, ProbeOutcome, HEALTH_PATH};
pub use retry::{RetryPolicy, RetryState};
pub use session::{SessionToken, VerificationSession, VerificationTracker};
