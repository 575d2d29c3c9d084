//! Circuit breaker - isolates failing tokenizer backends
//!
//! States:
//!   Closed   - calls pass through, consecutive failures are counted
//!   Open     - calls are rejected until the cooldown has elapsed
//!   HalfOpen - cooldown expired, exactly one probe call is let through
//!
//! One breaker exists per provider; [`BreakerRegistry`] creates them lazily.

use modelgate_foundation::BreakerSettings;
use parking_lot::{Mutex, RwLock, RwLockUpgradableReadGuard};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

// ============================================================================
// Clock
// ============================================================================

/// Time source for breaker transitions
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock (monotonic)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for deterministic tests
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

// ============================================================================
// State
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u32,
    last_failure_time: Option<Instant>,
    next_retry_time: Option<Instant>,
    probe_in_flight: bool,
}

impl BreakerInner {
    fn closed() -> Self {
        Self {
            state: BreakerState::Closed,
            failure_count: 0,
            last_failure_time: None,
            next_retry_time: None,
            probe_in_flight: false,
        }
    }
}

/// Point-in-time view of a breaker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerStats {
    pub provider: String,
    pub state: BreakerState,
    pub failure_count: u32,
    pub failure_threshold: u32,
    pub cooldown: Duration,
    pub last_failure_time: Option<Instant>,
    /// Time left before a probe is allowed (only while Open)
    pub retry_in: Option<Duration>,
}

// ============================================================================
// Circuit Breaker
// ============================================================================

pub struct CircuitBreaker {
    provider: String,
    failure_threshold: u32,
    cooldown: Duration,
    clock: Arc<dyn Clock>,
    inner: RwLock<BreakerInner>,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("provider", &self.provider)
            .field("failure_threshold", &self.failure_threshold)
            .field("cooldown", &self.cooldown)
            .field("inner", &*self.inner.read())
            .finish()
    }
}

impl CircuitBreaker {
    /// `failure_threshold` is clamped to at least 1
    pub fn new(provider: impl Into<String>, failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            provider: provider.into(),
            failure_threshold: failure_threshold.max(1),
            cooldown,
            clock: Arc::new(SystemClock),
            inner: RwLock::new(BreakerInner::closed()),
        }
    }

    pub fn from_settings(provider: impl Into<String>, settings: &BreakerSettings) -> Self {
        Self::new(provider, settings.failure_threshold, settings.cooldown())
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn state(&self) -> BreakerState {
        self.inner.read().state
    }

    pub fn failure_count(&self) -> u32 {
        self.inner.read().failure_count
    }

    /// Whether a call may proceed right now.
    ///
    /// Moves Open to HalfOpen once the cooldown has passed; the caller that
    /// observes that transition is the single probe.
    pub fn can_execute(&self) -> bool {
        if self.inner.read().state == BreakerState::Closed {
            return true;
        }

        let inner = self.inner.upgradable_read();
        match inner.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let now = self.clock.now();
                let ready = inner.next_retry_time.map_or(true, |at| now > at);
                if !ready {
                    return false;
                }
                let mut inner = RwLockUpgradableReadGuard::upgrade(inner);
                inner.state = BreakerState::HalfOpen;
                inner.probe_in_flight = true;
                info!(provider = %self.provider, "circuit breaker half-open, probing");
                true
            }
            BreakerState::HalfOpen => {
                if inner.probe_in_flight {
                    return false;
                }
                let mut inner = RwLockUpgradableReadGuard::upgrade(inner);
                inner.probe_in_flight = true;
                true
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.write();
        match inner.state {
            // a call admitted before the breaker opened; the cooldown stands
            BreakerState::Open => {
                debug!(provider = %self.provider, "success while open ignored");
            }
            BreakerState::HalfOpen => {
                *inner = BreakerInner::closed();
                info!(provider = %self.provider, "circuit breaker closed");
            }
            BreakerState::Closed => {
                inner.failure_count = 0;
            }
        }
    }

    pub fn record_failure(&self) {
        let now = self.clock.now();
        let mut inner = self.inner.write();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_time = Some(now);
        inner.probe_in_flight = false;

        if inner.failure_count >= self.failure_threshold {
            if inner.state != BreakerState::Open {
                warn!(
                    provider = %self.provider,
                    failures = inner.failure_count,
                    cooldown_ms = self.cooldown.as_millis() as u64,
                    "circuit breaker opened"
                );
            }
            inner.state = BreakerState::Open;
            inner.next_retry_time = Some(now + self.cooldown);
        }
    }

    /// Settle a call that says nothing about backend health.
    ///
    /// Frees the HalfOpen probe slot without closing the breaker; the
    /// failure count is left untouched.
    pub fn release(&self) {
        let mut inner = self.inner.write();
        if inner.probe_in_flight {
            inner.probe_in_flight = false;
            debug!(provider = %self.provider, "probe released without verdict");
        }
    }

    /// Admit one call, or `None` while the breaker rejects calls.
    ///
    /// The returned [`BreakerCall`] records a failure if it is dropped
    /// without being settled, so a panicking call still frees the probe.
    pub fn try_call(&self) -> Option<BreakerCall<'_>> {
        self.can_execute().then(|| BreakerCall {
            breaker: self,
            settled: false,
        })
    }

    /// Force back to Closed with no recorded failures
    pub fn reset(&self) {
        *self.inner.write() = BreakerInner::closed();
        info!(provider = %self.provider, "circuit breaker reset");
    }

    pub fn stats(&self) -> BreakerStats {
        let inner = self.inner.read();
        let retry_in = match (inner.state, inner.next_retry_time) {
            (BreakerState::Open, Some(at)) => Some(at.saturating_duration_since(self.clock.now())),
            _ => None,
        };
        BreakerStats {
            provider: self.provider.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            failure_threshold: self.failure_threshold,
            cooldown: self.cooldown,
            last_failure_time: inner.last_failure_time,
            retry_in,
        }
    }
}

/// An admitted call that has not reported its outcome yet
#[must_use = "an unsettled call is recorded as a failure"]
pub struct BreakerCall<'a> {
    breaker: &'a CircuitBreaker,
    settled: bool,
}

impl BreakerCall<'_> {
    pub fn success(mut self) {
        self.settled = true;
        self.breaker.record_success();
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.record_failure();
    }

    /// Outcome unrelated to backend health, see [`CircuitBreaker::release`]
    pub fn neutral(mut self) {
        self.settled = true;
        self.breaker.release();
    }
}

impl Drop for BreakerCall<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(provider = %self.breaker.provider, "call dropped without outcome");
            self.breaker.record_failure();
        }
    }
}

// ============================================================================
// Breaker Registry
// ============================================================================

/// Lazily created breakers, one per provider
pub struct BreakerRegistry {
    settings: BreakerSettings,
    clock: Arc<dyn Clock>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerSettings::default())
    }
}

impl BreakerRegistry {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            clock: Arc::new(SystemClock),
            breakers: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn get(&self, provider: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(provider) {
            return Arc::clone(breaker);
        }

        let mut breakers = self.breakers.write();
        let breaker = breakers.entry(provider.to_string()).or_insert_with(|| {
            debug!(provider, "creating circuit breaker");
            Arc::new(
                CircuitBreaker::from_settings(provider, &self.settings)
                    .with_clock(Arc::clone(&self.clock)),
            )
        });
        Arc::clone(breaker)
    }

    pub fn stats(&self, provider: &str) -> Option<BreakerStats> {
        self.breakers.read().get(provider).map(|b| b.stats())
    }

    pub fn all_stats(&self) -> Vec<BreakerStats> {
        let mut stats: Vec<_> = self.breakers.read().values().map(|b| b.stats()).collect();
        stats.sort_by(|a, b| a.provider.cmp(&b.provider));
        stats
    }

    pub fn reset_all(&self) {
        for breaker in self.breakers.read().values() {
            breaker.reset();
        }
    }
}
