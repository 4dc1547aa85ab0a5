// governor.rs — Token bucket, circuit breaker, and concurrency gate.
//
// All three checks are keyed by fingerprint except the concurrency cap,
// which is global. Check order: circuit first (a failing operation class
// should not drain its own tokens), then the bucket, then the cap.
//
// State is process-local and advisory. The durable trust state (suspension,
// probation) lives in gov-trust; this governor only smooths operational load.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Governor tuning. Loadable from `gov.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GovernorConfig {
    /// Master switch — when false every check answers Allow.
    pub enabled: bool,
    /// Maximum burst size of each per-fingerprint token bucket.
    pub bucket_burst: u32,
    /// Tokens refilled per second per bucket.
    pub bucket_refill_per_sec: f64,
    /// Consecutive failures before a fingerprint's circuit opens.
    pub failure_threshold: u32,
    /// How long an open circuit stays open before allowing a probe.
    pub circuit_open_secs: u64,
    /// Maximum executions in flight at once across all fingerprints.
    pub max_concurrent: usize,
    /// The retry hint handed out when the concurrency cap is hit.
    pub concurrency_retry_secs: u64,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bucket_burst: 10,
            bucket_refill_per_sec: 1.0,
            failure_threshold: 5,
            circuit_open_secs: 60,
            max_concurrent: 4,
            concurrency_retry_secs: 5,
        }
    }
}

/// The governor's answer for one check.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    Deny,
    Delay,
}

/// Why the governor did not answer Allow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleReason {
    TokenExhausted,
    CircuitOpen,
    MaxConcurrent,
}

impl std::fmt::Display for ThrottleReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThrottleReason::TokenExhausted => write!(f, "token_exhausted"),
            ThrottleReason::CircuitOpen => write!(f, "circuit_open"),
            ThrottleReason::MaxConcurrent => write!(f, "max_concurrent"),
        }
    }
}

/// One governor decision. Independent of any policy decision.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GovernorDecision {
    pub decision: Verdict,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<ThrottleReason>,
    /// Advisory backoff in seconds. The caller honors this; nothing blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

impl GovernorDecision {
    pub fn allow() -> Self {
        Self {
            decision: Verdict::Allow,
            reason: None,
            retry_after_secs: None,
        }
    }

    pub fn is_allow(&self) -> bool {
        self.decision == Verdict::Allow
    }
}

// ── Token Bucket ──

/// A token bucket for a single fingerprint.
#[derive(Debug, Clone)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(burst: u32) -> Self {
        Self {
            tokens: burst as f64,
            last_refill: Instant::now(),
        }
    }

    /// Refill tokens based on elapsed time, then try to consume one.
    fn try_consume(&mut self, burst: u32, refill_per_sec: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(burst as f64);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Seconds until the next token is available.
    fn retry_after(&self, refill_per_sec: f64) -> u64 {
        if refill_per_sec <= 0.0 {
            return 60;
        }
        let needed = 1.0 - self.tokens;
        (needed / refill_per_sec).ceil().max(1.0) as u64
    }
}

// ── Circuit Breaker ──

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CircuitState {
    /// Normal operation — requests flow through.
    Closed,
    /// Fingerprint is failing — reject immediately.
    Open { since: Instant },
    /// Allow a single probe to test recovery.
    HalfOpen,
}

#[derive(Debug)]
struct CircuitBreaker {
    state: CircuitState,
    consecutive_failures: u32,
}

impl CircuitBreaker {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
        }
    }

    fn allow_request(&mut self, open_for: Duration) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open { since } => {
                if since.elapsed() >= open_for {
                    self.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
            // Already probing — block additional requests until the probe
            // reports back.
            CircuitState::HalfOpen => false,
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.state = CircuitState::Closed;
    }

    fn record_failure(&mut self, threshold: u32) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= threshold {
            self.state = CircuitState::Open {
                since: Instant::now(),
            };
        }
    }
}

// ── Governor ──

/// Decrements the in-flight execution count when dropped.
pub struct ExecutionPermit {
    active: Arc<AtomicUsize>,
}

impl Drop for ExecutionPermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The run governor — stateful counters keyed by fingerprint.
pub struct RunGovernor {
    config: GovernorConfig,
    buckets: DashMap<String, Bucket>,
    breakers: Mutex<HashMap<String, CircuitBreaker>>,
    active: Arc<AtomicUsize>,
}

impl RunGovernor {
    pub fn new(config: GovernorConfig) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
            breakers: Mutex::new(HashMap::new()),
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A governor that always answers Allow.
    pub fn disabled() -> Self {
        Self::new(GovernorConfig {
            enabled: false,
            ..GovernorConfig::default()
        })
    }

    pub fn config(&self) -> &GovernorConfig {
        &self.config
    }

    /// Can this fingerprint run right now?
    pub fn check(&self, fingerprint: &str) -> GovernorDecision {
        if !self.config.enabled {
            return GovernorDecision::allow();
        }

        // Circuit first: a failing operation class should not consume tokens.
        {
            let mut breakers = self.breakers.lock();
            let breaker = breakers
                .entry(fingerprint.to_string())
                .or_insert_with(CircuitBreaker::new);
            if !breaker.allow_request(Duration::from_secs(self.config.circuit_open_secs)) {
                warn!(fingerprint, "circuit open, denying run");
                return GovernorDecision {
                    decision: Verdict::Deny,
                    reason: Some(ThrottleReason::CircuitOpen),
                    retry_after_secs: Some(self.config.circuit_open_secs),
                };
            }
        }

        // Token bucket per fingerprint.
        {
            let mut entry = self
                .buckets
                .entry(fingerprint.to_string())
                .or_insert_with(|| Bucket::new(self.config.bucket_burst));
            if !entry.try_consume(self.config.bucket_burst, self.config.bucket_refill_per_sec) {
                let retry = entry.retry_after(self.config.bucket_refill_per_sec);
                debug!(fingerprint, retry, "token bucket exhausted");
                return GovernorDecision {
                    decision: Verdict::Deny,
                    reason: Some(ThrottleReason::TokenExhausted),
                    retry_after_secs: Some(retry),
                };
            }
        }

        // Global concurrency cap.
        if self.active.load(Ordering::SeqCst) >= self.config.max_concurrent {
            return GovernorDecision {
                decision: Verdict::Delay,
                reason: Some(ThrottleReason::MaxConcurrent),
                retry_after_secs: Some(self.config.concurrency_retry_secs),
            };
        }

        GovernorDecision::allow()
    }

    /// Claim an execution slot. The permit releases it on drop.
    pub fn begin_execution(&self) -> ExecutionPermit {
        self.active.fetch_add(1, Ordering::SeqCst);
        ExecutionPermit {
            active: Arc::clone(&self.active),
        }
    }

    /// Executions currently in flight.
    pub fn in_flight(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Record a successful execution for a fingerprint — closes its circuit.
    pub fn record_success(&self, fingerprint: &str) {
        let mut breakers = self.breakers.lock();
        breakers
            .entry(fingerprint.to_string())
            .or_insert_with(CircuitBreaker::new)
            .record_success();
    }

    /// Record a failed execution for a fingerprint — may open its circuit.
    pub fn record_failure(&self, fingerprint: &str) {
        let mut breakers = self.breakers.lock();
        breakers
            .entry(fingerprint.to_string())
            .or_insert_with(CircuitBreaker::new)
            .record_failure(self.config.failure_threshold);
    }
}
