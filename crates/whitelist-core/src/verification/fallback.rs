//! Local fallback whitelist.
//!
//! Exact, case-insensitive membership against a fixed address set supplied
//! at construction. Read-only afterwards and never fails.

use std::collections::HashSet;

use crate::config::VerifierConfig;
use crate::types::{Address, Source};

/// Verdict from the local set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackVerdict {
    pub is_whitelisted: bool,
    pub source: Source,
}

#[derive(Debug, Clone, Default)]
pub struct FallbackVerifier {
    addresses: HashSet<String>,
}

impl FallbackVerifier {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let addresses = addresses
            .into_iter()
            .map(|a| a.as_ref().trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .collect();
        Self { addresses }
    }

    pub fn from_config(config: &VerifierConfig) -> Self {
        Self::new(&config.fallback_addresses)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.addresses.contains(&address.normalized())
    }

    pub fn verify(&self, address: &Address) -> FallbackVerdict {
        FallbackVerdict {
            is_whitelisted: self.contains(address),
            source: Source::Fallback,
        }
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}
