//! Circuit breaker decorator

use super::{breaker_open_error, settle};
use crate::breaker::{BreakerRegistry, BreakerStats, CircuitBreaker};
use crate::counter::AccurateCounter;
use crate::error::Result;
use crate::manager::TokenizerManager;
use modelgate_foundation::BreakerSettings;
use std::sync::Arc;

/// Rejects calls while the provider's breaker is Open
pub struct BreakerCounter {
    inner: Arc<dyn AccurateCounter>,
    provider: String,
    breaker: Arc<CircuitBreaker>,
}

impl BreakerCounter {
    pub fn new(
        inner: Arc<dyn AccurateCounter>,
        provider: impl Into<String>,
        breaker: Arc<CircuitBreaker>,
    ) -> Self {
        Self {
            inner,
            provider: provider.into(),
            breaker,
        }
    }
}

impl AccurateCounter for BreakerCounter {
    fn count_tokens(&self, text: &str, model: &str) -> Result<usize> {
        let Some(call) = self.breaker.try_call() else {
            return Err(breaker_open_error(
                &self.provider,
                model,
                self.breaker.failure_count(),
            ));
        };

        let result = self
            .inner
            .count_tokens(text, model)
            .map_err(|e| e.with_context(&self.provider, model));
        settle(call, &result);
        result
    }

    fn supports_model(&self, model: &str) -> bool {
        self.inner.supports_model(model)
    }

    fn get_encoding(&self, model: &str) -> Result<String> {
        self.inner.get_encoding(model)
    }
}

/// Wraps counters in [`BreakerCounter`], one breaker per provider
pub struct CircuitBreakerManager {
    inner: Arc<dyn TokenizerManager>,
    breakers: BreakerRegistry,
}

impl CircuitBreakerManager {
    pub fn new(inner: Arc<dyn TokenizerManager>, settings: BreakerSettings) -> Self {
        Self::with_registry(inner, BreakerRegistry::new(settings))
    }

    pub fn with_registry(inner: Arc<dyn TokenizerManager>, breakers: BreakerRegistry) -> Self {
        Self { inner, breakers }
    }

    pub fn breaker(&self, provider: &str) -> Arc<CircuitBreaker> {
        self.breakers.get(provider)
    }

    pub fn breaker_stats(&self) -> Vec<BreakerStats> {
        self.breakers.all_stats()
    }
}

impl TokenizerManager for CircuitBreakerManager {
    fn get_tokenizer(&self, provider: &str) -> Result<Arc<dyn AccurateCounter>> {
        let inner = self.inner.get_tokenizer(provider)?;
        let counter: Arc<dyn AccurateCounter> =
            Arc::new(BreakerCounter::new(inner, provider, self.breakers.get(provider)));
        Ok(counter)
    }

    fn supports_provider(&self, provider: &str) -> bool {
        self.inner.supports_provider(provider)
    }

    fn clear_cache(&self) {
        self.inner.clear_cache();
    }
}
