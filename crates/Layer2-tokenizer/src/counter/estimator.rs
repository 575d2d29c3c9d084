//! Character estimator - universal fallback

use super::AccurateCounter;
use crate::error::Result;
use modelgate_foundation::strings::ENCODING_ESTIMATE;

/// Tokens per byte used when nothing better is known
pub const DEFAULT_ESTIMATOR_RATIO: f64 = 0.75;

/// `floor(len_bytes(text) * ratio)` for every model; never fails
#[derive(Debug, Clone, Copy)]
pub struct CharacterEstimator {
    ratio: f64,
}

impl Default for CharacterEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_ESTIMATOR_RATIO)
    }
}

impl CharacterEstimator {
    pub fn new(ratio: f64) -> Self {
        Self { ratio }
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Estimate from a byte length (used for streams that were never decoded)
    pub fn estimate_len(&self, len_bytes: usize) -> usize {
        (len_bytes as f64 * self.ratio).floor() as usize
    }

    pub fn estimate(&self, text: &str) -> usize {
        self.estimate_len(text.len())
    }
}

impl AccurateCounter for CharacterEstimator {
    fn count_tokens(&self, text: &str, _model: &str) -> Result<usize> {
        Ok(self.estimate(text))
    }

    fn supports_model(&self, _model: &str) -> bool {
        true
    }

    fn get_encoding(&self, _model: &str) -> Result<String> {
        Ok(ENCODING_ESTIMATE.to_string())
    }
}
