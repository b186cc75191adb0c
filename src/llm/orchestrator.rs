//! AI Orchestrator - resilient multi-tier analysis
//!
//! Drives the [`state`](super::state) machine: proxy tier, then direct
//! provider, retried after a fixed backoff, and finally the deterministic
//! [`fallback`](super::fallback). [`AiOrchestrator::analyze`] never fails;
//! the returned [`AnalysisProvenance`] says how the result was obtained.

use super::cache::{cache_key, LruResponseCache, ResponseCache};
use super::fallback;
use super::state::{transition, Event, OrchestratorState, RetryPolicy};
use super::tiers::{AnalysisTier, AttemptError, DirectTier, ProxyTier};
use super::validation::ResponseSchema;
use crate::analysis::map_result;
use crate::config::{defaults, AppConfig};
use crate::types::{
    AnalysisOutcome, AnalysisPayload, AnalysisProvenance, AnalysisResult, AttemptRecord, Tier,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Running counters across `analyze` calls
#[derive(Debug, Default)]
struct Counters {
    requests: u64,
    cache_hits: u64,
    proxy_successes: u64,
    direct_successes: u64,
    fallbacks: u64,
    failed_attempts: u64,
    total_latency_ms: u64,
}

/// Multi-tier analysis orchestrator.
pub struct AiOrchestrator {
    proxy: Option<Arc<dyn AnalysisTier>>,
    direct: Option<Arc<dyn AnalysisTier>>,
    cache: Arc<dyn ResponseCache>,
    max_retries: u32,
    backoff: Duration,
    stats: Mutex<Counters>,
}

impl AiOrchestrator {
    /// Orchestrator with no live tier and the default retry policy.
    ///
    /// Add tiers with [`with_proxy`](Self::with_proxy) and
    /// [`with_direct`](Self::with_direct).
    pub fn new(cache: Arc<dyn ResponseCache>) -> Self {
        Self {
            proxy: None,
            direct: None,
            cache,
            max_retries: defaults::MAX_RETRIES,
            backoff: Duration::from_millis(defaults::RETRY_BACKOFF_MS),
            stats: Mutex::new(Counters::default()),
        }
    }

    /// Build tiers from configuration.
    ///
    /// The proxy tier follows [`AppConfig::proxy_enabled`]; the direct tier
    /// exists only when a provider credential is present.
    pub fn from_config(config: &AppConfig) -> Result<Self, AttemptError> {
        let mut orchestrator = Self::new(Arc::new(LruResponseCache::new(config.ai.cache_capacity)))
            .with_retry(
                config.ai.max_retries,
                Duration::from_millis(config.ai.retry_backoff_ms),
            );

        if config.proxy_enabled() {
            orchestrator = orchestrator.with_proxy(Arc::new(ProxyTier::new(
                &config.proxy.url,
                Duration::from_secs(config.ai.proxy_timeout_secs),
            )?));
        }

        if let Some(key) = config.credentials.gemini_api_key.as_deref() {
            orchestrator = orchestrator.with_direct(Arc::new(DirectTier::new(&config.ai, key)?));
        }

        tracing::info!(
            proxy = orchestrator.proxy.is_some(),
            direct = orchestrator.direct.is_some(),
            max_retries = orchestrator.max_retries,
            cache_capacity = config.ai.cache_capacity,
            "AI orchestrator initialized"
        );

        Ok(orchestrator)
    }

    pub fn with_proxy(mut self, tier: Arc<dyn AnalysisTier>) -> Self {
        self.proxy = Some(tier);
        self
    }

    pub fn with_direct(mut self, tier: Arc<dyn AnalysisTier>) -> Self {
        self.direct = Some(tier);
        self
    }

    pub fn with_retry(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    /// Drop the proxy tier. Used when this process is itself the proxy.
    pub fn without_proxy(mut self) -> Self {
        self.proxy = None;
        self
    }

    pub fn proxy_enabled(&self) -> bool {
        self.proxy.is_some()
    }

    /// Whether any tier could produce a live answer.
    pub fn has_live_tier(&self) -> bool {
        self.policy().has_live_tier()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            proxy_enabled: self.proxy.is_some(),
            direct_available: self.direct.is_some(),
            max_retries: self.max_retries,
        }
    }

    /// Analyze a payload, serving from the cache when possible.
    pub async fn analyze(&self, payload: &AnalysisPayload) -> AnalysisOutcome {
        self.run(payload, true).await
    }

    /// Analyze a payload without reading or writing the cache.
    pub async fn analyze_uncached(&self, payload: &AnalysisPayload) -> AnalysisOutcome {
        self.run(payload, false).await
    }

    async fn run(&self, payload: &AnalysisPayload, use_cache: bool) -> AnalysisOutcome {
        let started = Instant::now();
        let key = if use_cache { cache_key(payload) } else { None };

        if let Some(result) = key.as_deref().and_then(|k| self.cache.get(k)) {
            tracing::debug!(mode = %payload.mode, "Analysis served from cache");
            let mut stats = self.stats.lock().await;
            stats.requests += 1;
            stats.cache_hits += 1;
            return AnalysisOutcome {
                result,
                provenance: AnalysisProvenance {
                    tier: Tier::Cache,
                    fallback: false,
                    attempts: Vec::new(),
                    total_duration_ms: elapsed_ms(started),
                    error: None,
                },
            };
        }

        let outcome = self.drive(payload, started).await;

        if !outcome.provenance.fallback {
            if let Some(key) = key {
                self.cache.set(key, outcome.result.clone());
            }
        }

        let mut stats = self.stats.lock().await;
        stats.requests += 1;
        stats.total_latency_ms += outcome.provenance.total_duration_ms;
        stats.failed_attempts += outcome.provenance.attempts.iter().filter(|a| !a.success).count() as u64;
        match outcome.provenance.tier {
            Tier::Proxy => stats.proxy_successes += 1,
            Tier::Direct => stats.direct_successes += 1,
            Tier::Fallback => stats.fallbacks += 1,
            Tier::Cache => {}
        }

        outcome
    }

    /// Run the state machine to completion.
    async fn drive(&self, payload: &AnalysisPayload, started: Instant) -> AnalysisOutcome {
        let policy = self.policy();
        let schema = ResponseSchema::for_features(payload.features);
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut last_error: Option<String> = None;
        let mut answer: Option<(AnalysisResult, Tier)> = None;

        let mut state = transition(OrchestratorState::Idle, Event::Start, &policy);

        while state != OrchestratorState::Done {
            let event = match state {
                OrchestratorState::ProxyAttempt(n) | OrchestratorState::DirectAttempt(n) => {
                    let (kind, tier) = match state {
                        OrchestratorState::ProxyAttempt(_) => (Tier::Proxy, self.proxy.as_deref()),
                        _ => (Tier::Direct, self.direct.as_deref()),
                    };
                    let attempt_started = Instant::now();
                    let result = self.attempt(tier, payload, &schema).await;
                    let duration_ms = elapsed_ms(attempt_started);

                    match result {
                        Ok(result) => {
                            tracing::info!(
                                tier = %kind,
                                attempt = n,
                                duration_ms,
                                mode = %payload.mode,
                                "AI attempt succeeded"
                            );
                            attempts.push(AttemptRecord {
                                tier: kind,
                                attempt: n,
                                duration_ms,
                                success: true,
                                error: None,
                            });
                            answer = Some((result, kind));
                            Event::Success
                        }
                        Err(e) => {
                            tracing::warn!(
                                tier = %kind,
                                attempt = n,
                                duration_ms,
                                error = %e,
                                "AI attempt failed"
                            );
                            let message = e.to_string();
                            attempts.push(AttemptRecord {
                                tier: kind,
                                attempt: n,
                                duration_ms,
                                success: false,
                                error: Some(message.clone()),
                            });
                            last_error = Some(message);
                            Event::Failure
                        }
                    }
                }
                OrchestratorState::Retry(n) => {
                    tracing::debug!(
                        attempt = n,
                        backoff_ms = self.backoff.as_millis() as u64,
                        "Retrying analysis after backoff"
                    );
                    tokio::time::sleep(self.backoff).await;
                    Event::BackoffElapsed
                }
                OrchestratorState::Fallback => {
                    tracing::warn!(
                        mode = %payload.mode,
                        attempts = attempts.len(),
                        "All AI tiers failed, using offline analysis"
                    );
                    answer = Some((fallback::synthesize(payload), Tier::Fallback));
                    Event::Synthesized
                }
                OrchestratorState::Idle => Event::Start,
                OrchestratorState::Done => break,
            };
            state = transition(state, event, &policy);
        }

        let (result, tier) = answer.unwrap_or_else(|| (fallback::synthesize(payload), Tier::Fallback));
        let fallback = tier == Tier::Fallback;

        AnalysisOutcome {
            result,
            provenance: AnalysisProvenance {
                tier,
                fallback,
                attempts,
                total_duration_ms: elapsed_ms(started),
                error: if fallback { last_error } else { None },
            },
        }
    }

    /// One tier attempt under its hard timeout, validated and mapped.
    async fn attempt(
        &self,
        tier: Option<&dyn AnalysisTier>,
        payload: &AnalysisPayload,
        schema: &ResponseSchema,
    ) -> Result<AnalysisResult, AttemptError> {
        let tier = tier.ok_or(AttemptError::Unavailable("no provider credential configured"))?;
        let limit = tier.timeout();

        let value = tokio::time::timeout(limit, tier.attempt(payload))
            .await
            .map_err(|_| AttemptError::Timeout(limit))??;

        schema.validate(&value)?;
        Ok(map_result(&value, payload.features))
    }

    /// Snapshot of the running counters
    pub async fn stats(&self) -> OrchestratorStats {
        let stats = self.stats.lock().await;
        let live = stats.requests - stats.cache_hits;
        OrchestratorStats {
            requests: stats.requests,
            cache_hits: stats.cache_hits,
            proxy_successes: stats.proxy_successes,
            direct_successes: stats.direct_successes,
            fallbacks: stats.fallbacks,
            failed_attempts: stats.failed_attempts,
            avg_latency_ms: if live > 0 {
                stats.total_latency_ms as f64 / live as f64
            } else {
                0.0
            },
            cache_entries: self.cache.len(),
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}

/// Statistics from the orchestrator
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct OrchestratorStats {
    pub requests: u64,
    pub cache_hits: u64,
    pub proxy_successes: u64,
    pub direct_successes: u64,
    pub fallbacks: u64,
    pub failed_attempts: u64,
    pub avg_latency_ms: f64,
    pub cache_entries: usize,
}

impl std::fmt::Display for OrchestratorStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "AiOrchestrator: {} requests ({:.1}ms avg) - {} cache hits, {} proxy, {} direct, {} fallback, {} failed attempts, {} cached",
            self.requests,
            self.avg_latency_ms,
            self.cache_hits,
            self.proxy_successes,
            self.direct_successes,
            self.fallbacks,
            self.failed_attempts,
            self.cache_entries
        )
    }
}
