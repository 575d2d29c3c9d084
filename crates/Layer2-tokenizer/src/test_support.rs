//! Scripted counters and managers for unit tests

use crate::counter::AccurateCounter;
use crate::error::{Result, TokenizerError};
use crate::manager::TokenizerManager;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Returns a fixed count (or a scripted failure) after an optional delay
pub(crate) struct ScriptedCounter {
    tokens: usize,
    delay: Duration,
    failure: Mutex<Option<String>>,
    panics: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedCounter {
    pub(crate) fn new(tokens: usize) -> Arc<Self> {
        Self::slow(tokens, Duration::ZERO)
    }

    pub(crate) fn slow(tokens: usize, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            tokens,
            delay,
            failure: Mutex::new(None),
            panics: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn fail_with(&self, message: Option<&str>) {
        *self.failure.lock() = message.map(str::to_string);
    }

    pub(crate) fn panic_on_call(&self, panics: bool) {
        self.panics.store(panics, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl AccurateCounter for ScriptedCounter {
    fn count_tokens(&self, _text: &str, model: &str) -> Result<usize> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.panics.load(Ordering::SeqCst) {
            panic!("scripted counter panic");
        }
        match self.failure.lock().clone() {
            Some(message) => Err(TokenizerError::new("", model, message)),
            None => Ok(self.tokens),
        }
    }

    fn supports_model(&self, _model: &str) -> bool {
        true
    }

    fn get_encoding(&self, _model: &str) -> Result<String> {
        Ok("scripted".to_string())
    }
}

/// Hands out the same scripted counter for every provider
pub(crate) struct ScriptedManager {
    counter: Arc<ScriptedCounter>,
}

impl ScriptedManager {
    pub(crate) fn new(counter: Arc<ScriptedCounter>) -> Arc<Self> {
        Arc::new(Self { counter })
    }
}

impl TokenizerManager for ScriptedManager {
    fn get_tokenizer(&self, _provider: &str) -> Result<Arc<dyn AccurateCounter>> {
        let counter: Arc<dyn AccurateCounter> = self.counter.clone();
        Ok(counter)
    }

    fn supports_provider(&self, _provider: &str) -> bool {
        true
    }

    fn clear_cache(&self) {}
}
