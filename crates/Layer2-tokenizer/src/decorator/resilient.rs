//! Combined decorator: breaker + deadline + metrics in one layer

use super::metrics::{MetricsRecorder, MetricsRegistry, PerformanceMetrics};
use super::timeout::DeadlineRunner;
use super::{breaker_open_error, settle};
use crate::breaker::{BreakerRegistry, BreakerStats, CircuitBreaker};
use crate::counter::AccurateCounter;
use crate::error::Result;
use crate::manager::TokenizerManager;
use modelgate_foundation::TokenizerConfig;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

pub struct ResilientCounter {
    inner: Arc<dyn AccurateCounter>,
    provider: String,
    runner: DeadlineRunner,
    breaker: Arc<CircuitBreaker>,
    recorder: Option<Arc<MetricsRecorder>>,
}

impl ResilientCounter {
    pub fn new(
        inner: Arc<dyn AccurateCounter>,
        provider: impl Into<String>,
        runner: DeadlineRunner,
        breaker: Arc<CircuitBreaker>,
        recorder: Option<Arc<MetricsRecorder>>,
    ) -> Self {
        Self {
            inner,
            provider: provider.into(),
            runner,
            breaker,
            recorder,
        }
    }

    fn record(&self, start: Instant, success: bool) {
        if let Some(recorder) = &self.recorder {
            recorder.record(start.elapsed(), success);
        }
    }
}

impl AccurateCounter for ResilientCounter {
    fn count_tokens(&self, text: &str, model: &str) -> Result<usize> {
        let start = Instant::now();

        let Some(call) = self.breaker.try_call() else {
            self.record(start, false);
            return Err(breaker_open_error(
                &self.provider,
                model,
                self.breaker.failure_count(),
            ));
        };

        // deadline expiry settles as a failure, even though the worker may still run
        let result = self.runner.run(&self.inner, &self.provider, text, model);
        settle(call, &result);
        self.record(start, result.is_ok());

        if let Err(err) = &result {
            debug!(
                provider = %self.provider,
                model,
                category = %err.category(),
                breaker = %self.breaker.state(),
                "resilient count failed"
            );
        }
        result
    }

    fn supports_model(&self, model: &str) -> bool {
        self.inner.supports_model(model)
    }

    fn get_encoding(&self, model: &str) -> Result<String> {
        self.inner.get_encoding(model)
    }
}

/// Manager that owns breakers and metrics for every provider it serves
pub struct ResilientManager {
    inner: Arc<dyn TokenizerManager>,
    runner: DeadlineRunner,
    breakers: BreakerRegistry,
    metrics: Option<MetricsRegistry>,
}

impl ResilientManager {
    pub fn new(inner: Arc<dyn TokenizerManager>, timeout: Duration, breakers: BreakerRegistry) -> Self {
        Self {
            inner,
            runner: DeadlineRunner::new(timeout),
            breakers,
            metrics: Some(MetricsRegistry::new()),
        }
    }

    pub fn from_config(inner: Arc<dyn TokenizerManager>, config: &TokenizerConfig) -> Self {
        let mut manager = Self::new(
            inner,
            config.timeout(),
            BreakerRegistry::new(config.breaker.clone()),
        );
        if !config.metrics_enabled {
            manager.metrics = None;
        }
        manager
    }

    pub fn without_metrics(mut self) -> Self {
        self.metrics = None;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.runner.timeout()
    }

    pub fn breaker(&self, provider: &str) -> Arc<CircuitBreaker> {
        self.breakers.get(provider)
    }

    pub fn breaker_stats(&self) -> Vec<BreakerStats> {
        self.breakers.all_stats()
    }

    pub fn metrics(&self, provider: &str) -> Option<PerformanceMetrics> {
        self.metrics.as_ref().and_then(|m| m.metrics(provider))
    }

    pub fn all_metrics(&self) -> Vec<(String, PerformanceMetrics)> {
        self.metrics
            .as_ref()
            .map(MetricsRegistry::all_metrics)
            .unwrap_or_default()
    }
}

impl TokenizerManager for ResilientManager {
    fn get_tokenizer(&self, provider: &str) -> Result<Arc<dyn AccurateCounter>> {
        let inner = self.inner.get_tokenizer(provider)?;
        let recorder = self.metrics.as_ref().map(|m| m.recorder(provider));
        let counter: Arc<dyn AccurateCounter> = Arc::new(ResilientCounter::new(
            inner,
            provider,
            self.runner.clone(),
            self.breakers.get(provider),
            recorder,
        ));
        Ok(counter)
    }

    fn supports_provider(&self, provider: &str) -> bool {
        self.inner.supports_provider(provider)
    }

    fn clear_cache(&self) {
        self.inner.clear_cache();
    }
}
