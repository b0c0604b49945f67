//! ============================================================================
//! Verification Sessions - Last-write-wins tracking of verify calls
//! ============================================================================
//! Each `begin` supersedes every earlier session. Superseded sessions keep
//! running to a result, but the tracker refuses to publish it.
//! ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::types::{Address, VerificationRequest, VerificationResult};

/// Marks a session stale once a newer one has begun
#[derive(Debug, Clone)]
pub struct SessionToken {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl SessionToken {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_superseded(&self) -> bool {
        self.current.load(Ordering::SeqCst) != self.generation
    }
}

/// Lifetime of one `verify(address)` call
#[derive(Debug, Clone)]
pub struct VerificationSession {
    id: Uuid,
    request: VerificationRequest,
    token: SessionToken,
}

impl VerificationSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn request(&self) -> &VerificationRequest {
        &self.request
    }

    pub fn address(&self) -> &Address {
        self.request.address()
    }

    pub fn token(&self) -> &SessionToken {
        &self.token
    }
}

/// Hands out sessions and keeps the latest accepted result in memory
#[derive(Debug, Default)]
pub struct VerificationTracker {
    generation: Arc<AtomicU64>,
    latest: RwLock<Option<VerificationResult>>,
}

impl VerificationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session for `address`, superseding all earlier ones
    pub fn begin(&self, address: Address) -> VerificationSession {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let session = VerificationSession {
            id: Uuid::new_v4(),
            request: VerificationRequest::new(address),
            token: SessionToken {
                generation,
                current: Arc::clone(&self.generation),
            },
        };
        debug!(
            "Began verification session {} (generation {}) for {}",
            session.id,
            generation,
            session.address().short()
        );
        session
    }

    /// Publish a session's result. Returns false if the session went stale.
    pub async fn complete(&self, session: &VerificationSession, result: VerificationResult) -> bool {
        let mut latest = self.latest.write().await;
        // Checked under the lock so a newer session cannot be overwritten
        if session.token.is_superseded() {
            debug!(
                "Discarding result of superseded session {} for {}",
                session.id,
                session.address().short()
            );
            return false;
        }
        *latest = Some(result);
        true
    }

    pub async fn latest(&self) -> Option<VerificationResult> {
        self.latest.read().await.clone()
    }

    /// Forget the current result and mark all in-flight sessions stale
    pub async fn reset(&self) {
        let mut latest = self.latest.write().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        *latest = None;
        debug!("Verification tracker reset");
    }
}
