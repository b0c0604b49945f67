//! ============================================================================
//! Verification Orchestrator - Probe, query, retry, fall back
//! ============================================================================
//! ```text
//! Idle -> ProbingConnectivity -> Unhealthy -> FallingBack -> Done
//!                             -> Healthy   -> Querying -> Success -> Done
//!                                              ^     |
//!                                              |     v Failure
//!                                            Retrying (bounded)
//!                                                    | exhausted
//!                                                    v
//!                                               FallingBack -> Done
//! ```
//! The probe runs once per session, strictly before the first query. Every
//! call ends in exactly one VerificationResult; fallback cannot fail.
//! ============================================================================

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::classifier::ClassifiedError;
use super::client::{WhitelistClient, WhitelistQuery};
use super::fallback::FallbackVerifier;
use super::probe::{ConnectivityProbe, HealthProbe, ProbeOutcome};
use super::retry::{RetryPolicy, RetryState};
use super::session::{VerificationSession, VerificationTracker};
use crate::config::VerifierConfig;
use crate::types::{Address, ErrorKind, VerificationResult, WhitelistError};

/// Steps of one verification, traced at debug level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerificationState {
    Idle,
    ProbingConnectivity,
    Querying,
    Retrying,
    FallingBack,
    Done,
}

pub struct VerificationOrchestrator {
    probe: Arc<dyn HealthProbe>,
    client: Arc<dyn WhitelistQuery>,
    policy: RetryPolicy,
    fallback: FallbackVerifier,
    tracker: VerificationTracker,
}

impl VerificationOrchestrator {
    pub fn new(
        probe: Arc<dyn HealthProbe>,
        client: Arc<dyn WhitelistQuery>,
        policy: RetryPolicy,
        fallback: FallbackVerifier,
    ) -> Self {
        Self {
            probe,
            client,
            policy,
            fallback,
            tracker: VerificationTracker::new(),
        }
    }

    /// Build the HTTP-backed orchestrator described by `config`
    pub fn from_config(config: &VerifierConfig) -> Result<Self, WhitelistError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("xdcheck/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| WhitelistError::HttpClient(e.to_string()))?;

        let probe = ConnectivityProbe::from_config(config, http.clone())?;
        let client = WhitelistClient::from_config(config, http)?;

        info!(
            "Whitelist verifier ready: {} ({} fallback addresses, {} retries)",
            config.base_url,
            config.fallback_addresses.len(),
            config.max_retries
        );

        Ok(Self::new(
            Arc::new(probe),
            Arc::new(client),
            RetryPolicy::from_config(config),
            FallbackVerifier::from_config(config),
        ))
    }

    /// Start a session, superseding any verification still in flight
    pub fn begin(&self, address: Address) -> VerificationSession {
        self.tracker.begin(address)
    }

    /// Verify an address and publish the result as the latest one
    pub async fn verify(&self, address: impl Into<Address>) -> VerificationResult {
        let session = self.begin(address.into());
        let result = self.run(&session).await;
        self.tracker.complete(&session, result.clone()).await;
        result
    }

    /// Consult only the local whitelist (manual fallback)
    pub async fn verify_fallback(&self, address: impl Into<Address>) -> VerificationResult {
        let session = self.begin(address.into());
        let verdict = self.fallback.verify(session.address());
        info!(
            "Manual fallback for {}: whitelisted={}",
            session.address().short(),
            verdict.is_whitelisted
        );
        let result =
            VerificationResult::fallback(session.address().clone(), verdict.is_whitelisted, 0);
        self.tracker.complete(&session, result.clone()).await;
        result
    }

    /// Run the pipeline for an already started session
    pub async fn run(&self, session: &VerificationSession) -> VerificationResult {
        let address = session.address();
        let mut state = VerificationState::Idle;
        let mut retry = RetryState::new();

        transition(&mut state, VerificationState::ProbingConnectivity, address);
        if let ProbeOutcome::Unhealthy(reason) = self.probe.probe().await {
            warn!(
                "Whitelist service unavailable for {}: {}",
                address.short(),
                reason
            );
            retry.record_failure(&ClassifiedError::new(
                ErrorKind::ServiceUnavailable,
                format!("API service unavailable: {}", reason),
            ));
            transition(&mut state, VerificationState::FallingBack, address);
            return self.fall_back(address, &retry, &mut state);
        }

        transition(&mut state, VerificationState::Querying, address);
        loop {
            match self.client.query(address).await {
                Ok(response) => {
                    transition(&mut state, VerificationState::Done, address);
                    info!(
                        "Remote verdict for {}: whitelisted={} (attempt {})",
                        address.short(),
                        response.is_whitelisted,
                        retry.attempt + 1
                    );
                    return VerificationResult::remote(
                        address.clone(),
                        response.is_whitelisted,
                        retry.attempt,
                    )
                    .with_failure(retry.last_error_kind, retry.last_error_message.clone())
                    .with_raw_response(response.raw);
                }
                Err(err) => {
                    warn!(
                        "Whitelist query attempt {} failed ({:?}): {}",
                        retry.attempt + 1,
                        err.kind,
                        err.message
                    );
                    retry.record_failure(&err);

                    if !self.policy.should_retry(err.kind, retry.attempt) {
                        break;
                    }

                    transition(&mut state, VerificationState::Retrying, address);
                    let delay = self.policy.delay_for(retry.attempt);
                    debug!(
                        "Retrying in {:?} ({}/{})",
                        delay,
                        retry.attempt + 1,
                        self.policy.max_retries()
                    );
                    tokio::time::sleep(delay).await;
                    retry.advance();
                    transition(&mut state, VerificationState::Querying, address);
                }
            }
        }

        transition(&mut state, VerificationState::FallingBack, address);
        self.fall_back(address, &retry, &mut state)
    }

    fn fall_back(
        &self,
        address: &Address,
        retry: &RetryState,
        state: &mut VerificationState,
    ) -> VerificationResult {
        let verdict = self.fallback.verify(address);
        transition(state, VerificationState::Done, address);
        info!(
            "Fallback verdict for {}: whitelisted={} (last error: {:?})",
            address.short(),
            verdict.is_whitelisted,
            retry.last_error_kind
        );
        VerificationResult::fallback(address.clone(), verdict.is_whitelisted, retry.attempt)
            .with_failure(retry.last_error_kind, retry.last_error_message.clone())
    }

    /// Run the connectivity probe on its own
    pub async fn probe(&self) -> ProbeOutcome {
        self.probe.probe().await
    }

    /// Most recent result of a session that was not superseded
    pub async fn latest(&self) -> Option<VerificationResult> {
        self.tracker.latest().await
    }

    pub fn tracker(&self) -> &VerificationTracker {
        &self.tracker
    }

    pub fn fallback(&self) -> &FallbackVerifier {
        &self.fallback
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

fn transition(state: &mut VerificationState, next: VerificationState, address: &Address) {
    debug!("Verification {}: {:?} -> {:?}", address.short(), state, next);
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_FALLBACK_ADDRESSES;
    use crate::types::Source;
    use crate::verification::client::WhitelistResponse;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    const LISTED: &str = "0x49afe40999fe9551be999ae4205e4dddded493a7";
    const UNLISTED: &str = "0x1111111111111111111111111111111111111111";

    struct ScriptedProbe {
        healthy: bool,
        calls: AtomicUsize,
    }

    impl ScriptedProbe {
        fn new(healthy: bool) -> Arc<Self> {
            Arc::new(Self {
                healthy,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl HealthProbe for ScriptedProbe {
        async fn probe(&self) -> ProbeOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.healthy {
                ProbeOutcome::Healthy { body: None }
            } else {
                ProbeOutcome::Unhealthy("HTTP 503: Service Unavailable".into())
            }
        }
    }

    type Reply = Result<WhitelistResponse, ClassifiedError>;

    /// Replays scripted replies in order, repeating the last one
    struct ScriptedQuery {
        script: Mutex<VecDeque<Reply>>,
        last: Mutex<Option<Reply>>,
        calls: AtomicUsize,
        called_at: Mutex<Vec<Instant>>,
        latency: Duration,
    }

    impl ScriptedQuery {
        fn new(script: Vec<Reply>) -> Arc<Self> {
            Self::with_latency(script, Duration::ZERO)
        }

        fn with_latency(script: Vec<Reply>, latency: Duration) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
                called_at: Mutex::new(Vec::new()),
                latency,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn call_times(&self) -> Vec<Instant> {
            self.called_at.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl WhitelistQuery for ScriptedQuery {
        async fn query(&self, _address: &Address) -> Reply {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.called_at.lock().unwrap().push(Instant::now());
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            let next = self.script.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(reply) = next {
                *last = Some(reply);
            }
            last.clone().expect("scripted query has no replies")
        }
    }

    fn ok(is_whitelisted: bool) -> Reply {
        Ok(WhitelistResponse {
            is_whitelisted,
            raw: Some(serde_json::json!({ "isWhitelisted": is_whitelisted })),
        })
    }

    fn fail(kind: ErrorKind) -> Reply {
        Err(ClassifiedError::new(kind, format!("{} failure", kind)))
    }

    fn orchestrator(
        probe: Arc<ScriptedProbe>,
        query: Arc<ScriptedQuery>,
    ) -> VerificationOrchestrator {
        VerificationOrchestrator::new(
            probe,
            query,
            RetryPolicy::new(2, Duration::from_millis(1)),
            FallbackVerifier::new(DEFAULT_FALLBACK_ADDRESSES),
        )
    }

    #[tokio::test]
    async fn test_remote_whitelisted_first_try() {
        let probe = ScriptedProbe::new(true);
        let query = ScriptedQuery::new(vec![ok(true)]);
        let orch = orchestrator(probe.clone(), query.clone());

        let result = orch.verify(UNLISTED).await;

        assert!(result.is_whitelisted);
        assert!(result.success);
        assert_eq!(result.source, Source::Remote);
        assert_eq!(result.attempt, 0);
        assert_eq!(result.error_kind, None);
        assert_eq!(result.raw_response, Some(serde_json::json!({ "isWhitelisted": true })));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
        assert_eq!(query.calls(), 1);
    }

    #[tokio::test]
    async fn test_timeouts_then_remote_answer() {
        let probe = ScriptedProbe::new(true);
        let query = ScriptedQuery::new(vec![
            fail(ErrorKind::Timeout),
            fail(ErrorKind::Timeout),
            ok(false),
        ]);
        let orch = orchestrator(probe.clone(), query.clone());

        let result = orch.verify(LISTED).await;

        assert!(!result.is_whitelisted);
        assert!(result.success);
        assert_eq!(result.source, Source::Remote);
        assert_eq!(result.attempt, 2);
        assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
        assert_eq!(query.calls(), 3);
        // Probe runs once per session, not per attempt
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unhealthy_probe_skips_query() {
        let probe = ScriptedProbe::new(false);
        let query = ScriptedQuery::new(vec![ok(false)]);
        let orch = orchestrator(probe, query.clone());

        let result = orch.verify("0x49AFE40999FE9551BE999AE4205E4DDDDED493A7").await;

        assert_eq!(query.calls(), 0);
        assert!(result.is_whitelisted);
        assert!(result.success);
        assert_eq!(result.source, Source::Fallback);
        assert_eq!(result.attempt, 0);
        assert_eq!(result.error_kind, Some(ErrorKind::ServiceUnavailable));
        assert!(result
            .error_message
            .as_deref()
            .unwrap()
            .contains("HTTP 503"));

        let result = orch.verify(UNLISTED).await;
        assert!(!result.is_whitelisted);
        assert_eq!(result.source, Source::Fallback);
        assert_eq!(query.calls(), 0);
    }

    #[tokio::test]
    async fn test_network_failures_exhaust_retries() {
        let probe = ScriptedProbe::new(true);
        let query = ScriptedQuery::new(vec![fail(ErrorKind::Network)]);
        let orch = orchestrator(probe, query.clone());

        let result = orch.verify(LISTED).await;

        assert_eq!(query.calls(), 3);
        assert_eq!(result.source, Source::Fallback);
        assert!(result.is_whitelisted);
        assert!(result.success);
        assert_eq!(result.attempt, 2);
        assert_eq!(result.error_kind, Some(ErrorKind::Network));
    }

    #[tokio::test]
    async fn test_last_error_kind_is_kept() {
        let probe = ScriptedProbe::new(true);
        let query = ScriptedQuery::new(vec![
            fail(ErrorKind::Timeout),
            fail(ErrorKind::HttpStatus(500)),
            fail(ErrorKind::Cors),
        ]);
        let orch = orchestrator(probe, query);

        let result = orch.verify(UNLISTED).await;
        assert_eq!(result.source, Source::Fallback);
        assert!(!result.is_whitelisted);
        assert_eq!(result.error_kind, Some(ErrorKind::Cors));
    }

    #[tokio::test]
    async fn test_service_unavailable_from_query_is_not_retried() {
        let probe = ScriptedProbe::new(true);
        let query = ScriptedQuery::new(vec![fail(ErrorKind::ServiceUnavailable), ok(true)]);
        let orch = orchestrator(probe, query.clone());

        let result = orch.verify(UNLISTED).await;
        assert_eq!(query.calls(), 1);
        assert_eq!(result.source, Source::Fallback);
        assert_eq!(result.attempt, 0);
    }

    #[tokio::test]
    async fn test_verify_is_idempotent() {
        let probe = ScriptedProbe::new(true);
        let query = ScriptedQuery::new(vec![ok(true)]);
        let orch = orchestrator(probe, query);

        let first = orch.verify(UNLISTED).await;
        let second = orch.verify(UNLISTED).await;
        assert!(first.same_outcome(&second));

        let down = orchestrator(ScriptedProbe::new(false), ScriptedQuery::new(vec![ok(true)]));
        let first = down.verify(LISTED).await;
        let second = down.verify(LISTED).await;
        assert!(first.same_outcome(&second));
    }

    #[tokio::test]
    async fn test_attempt_resets_per_call() {
        let probe = ScriptedProbe::new(true);
        let query = ScriptedQuery::new(vec![fail(ErrorKind::Timeout), ok(true)]);
        let orch = orchestrator(probe, query);

        assert_eq!(orch.verify(UNLISTED).await.attempt, 1);
        // Script now repeats ok(true)
        assert_eq!(orch.verify(UNLISTED).await.attempt, 0);
    }

    #[tokio::test]
    async fn test_superseded_session_still_runs_all_retries() {
        let probe = ScriptedProbe::new(true);
        let query = ScriptedQuery::new(vec![fail(ErrorKind::Network)]);
        let orch = orchestrator(probe, query.clone());

        let stale = orch.begin(Address::new(UNLISTED));
        let _newer = orch.begin(Address::new(LISTED));

        let result = orch.run(&stale).await;
        assert_eq!(query.calls(), 3);
        assert_eq!(result.source, Source::Fallback);
        assert_eq!(result.attempt, 2);
        assert_eq!(result.error_kind, Some(ErrorKind::Network));
        // Only publication is refused
        assert!(!orch.tracker().complete(&stale, result).await);
        assert!(orch.latest().await.is_none());
    }

    #[tokio::test]
    async fn test_overlapping_verify_keeps_own_verdict() {
        let probe = ScriptedProbe::new(true);
        let query = ScriptedQuery::with_latency(
            vec![fail(ErrorKind::Timeout), ok(true)],
            Duration::from_millis(30),
        );
        let orch = orchestrator(probe, query.clone());

        let (first, second) = tokio::join!(orch.verify(UNLISTED), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            orch.verify(LISTED).await
        });

        // The earlier call retried past its timeout instead of degrading
        assert_eq!(first.source, Source::Remote);
        assert!(first.is_whitelisted);
        assert_eq!(first.attempt, 1);
        assert_eq!(first.error_kind, Some(ErrorKind::Timeout));
        assert_eq!(second.source, Source::Remote);
        assert!(second.is_whitelisted);
        assert_eq!(query.calls(), 3);

        let latest = orch.latest().await.unwrap();
        assert_eq!(latest.address, Address::new(LISTED));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_delay_elapses_between_attempts() {
        let query = ScriptedQuery::new(vec![
            fail(ErrorKind::Timeout),
            fail(ErrorKind::Timeout),
            ok(false),
        ]);
        let orch = VerificationOrchestrator::new(
            ScriptedProbe::new(true),
            query.clone(),
            RetryPolicy::default(),
            FallbackVerifier::new(DEFAULT_FALLBACK_ADDRESSES),
        );

        let result = orch.verify(UNLISTED).await;
        assert_eq!(result.source, Source::Remote);
        assert_eq!(result.attempt, 2);

        let times = query.call_times();
        assert_eq!(times.len(), 3);
        for pair in times.windows(2) {
            assert!(
                pair[1] - pair[0] >= Duration::from_secs(1),
                "attempts only {:?} apart",
                pair[1] - pair[0]
            );
        }
    }

    #[tokio::test]
    async fn test_latest_tracks_most_recent_call() {
        let orch = orchestrator(ScriptedProbe::new(true), ScriptedQuery::new(vec![ok(false)]));
        assert!(orch.latest().await.is_none());

        orch.verify(UNLISTED).await;
        orch.verify(LISTED).await;
        let latest = orch.latest().await.unwrap();
        assert_eq!(latest.address, Address::new(LISTED));
    }

    #[tokio::test]
    async fn test_manual_fallback() {
        let query = ScriptedQuery::new(vec![ok(false)]);
        let orch = orchestrator(ScriptedProbe::new(true), query.clone());

        let result = orch.verify_fallback(LISTED.to_uppercase()).await;
        assert!(result.is_whitelisted);
        assert_eq!(result.source, Source::Fallback);
        assert_eq!(result.attempt, 0);
        assert_eq!(result.error_kind, None);
        assert_eq!(query.calls(), 0);
        assert!(orch.latest().await.unwrap().same_outcome(&result));
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let config = VerifierConfig {
            base_url: "nope".into(),
            ..Default::default()
        };
        assert!(VerificationOrchestrator::from_config(&config).is_err());
    }

    #[test]
    fn test_from_config_defaults() {
        let orch = VerificationOrchestrator::from_config(&VerifierConfig::default()).unwrap();
        assert_eq!(orch.fallback().len(), 4);
        assert_eq!(orch.policy(), &RetryPolicy::default());
    }
}
