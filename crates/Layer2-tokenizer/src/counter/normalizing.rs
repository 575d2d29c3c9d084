//! Normalizing counter for aggregator providers
//!
//! Aggregators route one identifier to many upstream vendors, so every model
//! is counted under a single reference model.

use super::{AccurateCounter, TiktokenCounter};
use crate::error::Result;
use modelgate_foundation::strings::PROVIDER_OPENROUTER;
use std::sync::Arc;

/// Reference model used for every identifier
pub const REFERENCE_MODEL: &str = "gpt-4o";

/// Counts any model as if it were [`REFERENCE_MODEL`]
pub struct NormalizingCounter {
    inner: Arc<TiktokenCounter>,
    reference_model: String,
}

impl Default for NormalizingCounter {
    fn default() -> Self {
        Self::new(Arc::new(TiktokenCounter::new()))
    }
}

impl NormalizingCounter {
    pub fn new(inner: Arc<TiktokenCounter>) -> Self {
        Self {
            inner,
            reference_model: REFERENCE_MODEL.to_string(),
        }
    }

    pub fn reference_model(&self) -> &str {
        &self.reference_model
    }
}

impl AccurateCounter for NormalizingCounter {
    fn count_tokens(&self, text: &str, model: &str) -> Result<usize> {
        self.inner
            .count_tokens(text, &self.reference_model)
            .map_err(|e| {
                e.with_detail("requested_model", model)
                    .with_context(PROVIDER_OPENROUTER, model)
            })
    }

    fn supports_model(&self, _model: &str) -> bool {
        true
    }

    fn get_encoding(&self, _model: &str) -> Result<String> {
        self.inner.get_encoding(&self.reference_model)
    }
}
