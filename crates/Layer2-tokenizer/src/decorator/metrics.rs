//! Performance metrics decorator

use crate::counter::AccurateCounter;
use crate::error::Result;
use crate::manager::TokenizerManager;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Accumulated per-provider metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceMetrics {
    pub request_count: u64,
    pub success_count: u64,
    pub failure_count: u64,
    /// Running mean over every recorded call
    pub avg_latency: Duration,
    /// successes / requests * 100
    pub success_rate: f64,
}

#[derive(Debug, Default)]
struct RecorderState {
    request_count: u64,
    success_count: u64,
    failure_count: u64,
    avg_latency_secs: f64,
}

/// Thread-safe accumulator for one provider
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    state: Mutex<RecorderState>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, latency: Duration, success: bool) {
        let mut state = self.state.lock();
        state.request_count += 1;
        if success {
            state.success_count += 1;
        } else {
            state.failure_count += 1;
        }
        let n = state.request_count as f64;
        state.avg_latency_secs += (latency.as_secs_f64() - state.avg_latency_secs) / n;
    }

    pub fn snapshot(&self) -> PerformanceMetrics {
        let state = self.state.lock();
        let success_rate = if state.request_count == 0 {
            0.0
        } else {
            state.success_count as f64 / state.request_count as f64 * 100.0
        };
        PerformanceMetrics {
            request_count: state.request_count,
            success_count: state.success_count,
            failure_count: state.failure_count,
            avg_latency: Duration::from_secs_f64(state.avg_latency_secs.max(0.0)),
            success_rate,
        }
    }
}

/// Per-provider recorders, created on first use
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    recorders: DashMap<String, Arc<MetricsRecorder>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorder(&self, provider: &str) -> Arc<MetricsRecorder> {
        if let Some(recorder) = self.recorders.get(provider) {
            return Arc::clone(recorder.value());
        }
        Arc::clone(
            self.recorders
                .entry(provider.to_string())
                .or_insert_with(|| Arc::new(MetricsRecorder::new()))
                .value(),
        )
    }

    pub fn metrics(&self, provider: &str) -> Option<PerformanceMetrics> {
        self.recorders.get(provider).map(|r| r.snapshot())
    }

    pub fn all_metrics(&self) -> Vec<(String, PerformanceMetrics)> {
        let mut all: Vec<_> = self
            .recorders
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

/// Records latency and outcome of every call
pub struct MonitoredCounter {
    inner: Arc<dyn AccurateCounter>,
    provider: String,
    recorder: Arc<MetricsRecorder>,
}

impl MonitoredCounter {
    pub fn new(
        inner: Arc<dyn AccurateCounter>,
        provider: impl Into<String>,
        recorder: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            inner,
            provider: provider.into(),
            recorder,
        }
    }
}

impl AccurateCounter for MonitoredCounter {
    fn count_tokens(&self, text: &str, model: &str) -> Result<usize> {
        let start = Instant::now();
        let result = self.inner.count_tokens(text, model);
        let latency = start.elapsed();
        self.recorder.record(latency, result.is_ok());
        debug!(
            provider = %self.provider,
            model,
            latency_us = latency.as_micros() as u64,
            ok = result.is_ok(),
            "token count recorded"
        );
        result.map_err(|e| e.with_context(&self.provider, model))
    }

    fn supports_model(&self, model: &str) -> bool {
        self.inner.supports_model(model)
    }

    fn get_encoding(&self, model: &str) -> Result<String> {
        self.inner.get_encoding(model)
    }
}

/// Wraps counters in [`MonitoredCounter`] and owns their recorders
pub struct MonitoredManager {
    inner: Arc<dyn TokenizerManager>,
    registry: MetricsRegistry,
}

impl MonitoredManager {
    pub fn new(inner: Arc<dyn TokenizerManager>) -> Self {
        Self {
            inner,
            registry: MetricsRegistry::new(),
        }
    }

    pub fn metrics(&self, provider: &str) -> Option<PerformanceMetrics> {
        self.registry.metrics(provider)
    }

    pub fn all_metrics(&self) -> Vec<(String, PerformanceMetrics)> {
        self.registry.all_metrics()
    }
}

impl TokenizerManager for MonitoredManager {
    fn get_tokenizer(&self, provider: &str) -> Result<Arc<dyn AccurateCounter>> {
        let inner = self.inner.get_tokenizer(provider)?;
        let recorder = self.registry.recorder(provider);
        let counter: Arc<dyn AccurateCounter> =
            Arc::new(MonitoredCounter::new(inner, provider, recorder));
        Ok(counter)
    }

    fn supports_provider(&self, provider: &str) -> bool {
        self.inner.supports_provider(provider)
    }

    fn clear_cache(&self) {
        self.inner.clear_cache();
    }
}
