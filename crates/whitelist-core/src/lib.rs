//! ============================================================================
//! WHITELIST-CORE: Address whitelist verification
//! ============================================================================
//! This crate handles the verification workflow behind the gated feature:
//! - Connectivity probe against the whitelist service
//! - Whitelist query with classified, bounded retries
//! - Deterministic fallback to a locally configured address set
//! - Last-write-wins tracking of the most recent verification
//! ============================================================================

pub mod config;
pub mod types;
pub mod verification;

// Re-export main types for convenience
pub use config::VerifierConfig;
pub use types::*;
pub use verification::{ProbeOutcome, VerificationOrchestrator};
