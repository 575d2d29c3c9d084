//! Tokenizer manager - lazily built, cached per-provider counters

use crate::counter::{AccurateCounter, NormalizingCounter, SubwordCounter, TiktokenCounter};
use crate::error::{Result, TokenizerError};
use dashmap::DashMap;
use modelgate_foundation::strings::{PROVIDER_GEMINI, PROVIDER_OPENAI, PROVIDER_OPENROUTER};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Providers with an accurate counter
pub const SUPPORTED_PROVIDERS: &[&str] = &[PROVIDER_OPENAI, PROVIDER_GEMINI, PROVIDER_OPENROUTER];

/// Hands out one counter per provider
pub trait TokenizerManager: Send + Sync {
    /// Counter for `provider`; unknown providers fail with NotFound
    fn get_tokenizer(&self, provider: &str) -> Result<Arc<dyn AccurateCounter>>;

    fn supports_provider(&self, provider: &str) -> bool;

    /// Evict cached counters. Holders of an old `Arc` keep using it.
    fn clear_cache(&self);
}

fn normalize(provider: &str) -> String {
    provider.trim().to_lowercase()
}

/// Default manager
///
/// Lookups hit the concurrent map without locking; construction is
/// serialized by a single init lock and re-checked under it, so concurrent
/// first access yields one instance.
#[derive(Default)]
pub struct DefaultTokenizerManager {
    counters: DashMap<String, Arc<dyn AccurateCounter>>,
    init_lock: Mutex<()>,
}

impl DefaultTokenizerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of providers with a constructed counter
    pub fn cached_providers(&self) -> usize {
        self.counters.len()
    }

    fn build(provider: &str) -> Option<Arc<dyn AccurateCounter>> {
        let counter: Arc<dyn AccurateCounter> = match provider {
            PROVIDER_OPENAI => Arc::new(TiktokenCounter::new()),
            PROVIDER_GEMINI => Arc::new(SubwordCounter::new()),
            PROVIDER_OPENROUTER => Arc::new(NormalizingCounter::default()),
            _ => return None,
        };
        Some(counter)
    }
}

impl TokenizerManager for DefaultTokenizerManager {
    fn get_tokenizer(&self, provider: &str) -> Result<Arc<dyn AccurateCounter>> {
        let key = normalize(provider);
        if let Some(counter) = self.counters.get(&key) {
            return Ok(Arc::clone(counter.value()));
        }

        let _guard = self.init_lock.lock();
        if let Some(counter) = self.counters.get(&key) {
            return Ok(Arc::clone(counter.value()));
        }

        let counter = Self::build(&key).ok_or_else(|| {
            TokenizerError::new(provider, "", format!("unsupported provider: {}", provider))
        })?;
        debug!(provider = %key, "tokenizer constructed");
        self.counters.insert(key, Arc::clone(&counter));
        Ok(counter)
    }

    fn supports_provider(&self, provider: &str) -> bool {
        SUPPORTED_PROVIDERS.contains(&normalize(provider).as_str())
    }

    fn clear_cache(&self) {
        let _guard = self.init_lock.lock();
        let evicted = self.counters.len();
        self.counters.clear();
        debug!(evicted, "tokenizer cache cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn test_known_providers() {
        let manager = DefaultTokenizerManager::new();

        let openai = manager.get_tokenizer("openai").unwrap();
        assert_eq!(openai.get_encoding("gpt-4o").unwrap(), "o200k_base");

        let gemini = manager.get_tokenizer("gemini").unwrap();
        assert!(gemini.supports_model("gemini-2.0-flash"));

        let openrouter = manager.get_tokenizer(" OpenRouter ").unwrap();
        assert!(openrouter.supports_model("anything/at-all"));

        assert_eq!(manager.cached_providers(), 3);
    }

    #[test]
    fn test_unknown_provider() {
        let manager = DefaultTokenizerManager::new();
        assert!(!manager.supports_provider("anthropic"));

        let Err(err) = manager.get_tokenizer("anthropic") else {
            panic!("expected unsupported provider error");
        };
        assert!(err.message().contains("unsupported provider"));
        assert_eq!(err.category(), ErrorCategory::NotFound);
        assert_eq!(manager.cached_providers(), 0);
    }

    #[test]
    fn test_cache_identity() {
        let manager = DefaultTokenizerManager::new();
        let first = manager.get_tokenizer("openai").unwrap();
        let second = manager.get_tokenizer("openai").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        manager.clear_cache();
        assert_eq!(manager.cached_providers(), 0);

        let third = manager.get_tokenizer("openai").unwrap();
        assert!(!Arc::ptr_eq(&first, &third));

        // the evicted counter still works
        assert_eq!(first.count_tokens("", "gpt-4o").unwrap(), 0);
    }

    #[test]
    fn test_concurrent_first_access() {
        let manager = Arc::new(DefaultTokenizerManager::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || manager.get_tokenizer("gemini").unwrap())
            })
            .collect();

        let counters: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        for counter in &counters[1..] {
            assert!(Arc::ptr_eq(&counters[0], counter));
        }
        assert_eq!(manager.cached_providers(), 1);
    }
}
