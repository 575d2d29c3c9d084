//! Accurate counters
//!
//! | Counter | Provider | Algorithm |
//! |---------|----------|-----------|
//! | [`TiktokenCounter`] | openai | byte-pair (tiktoken-rs) |
//! | [`SubwordCounter`] | gemini | deterministic subword approximation |
//! | [`NormalizingCounter`] | openrouter | byte-pair under a reference model |
//! | [`CharacterEstimator`] | any | `floor(bytes * ratio)` fallback |

mod estimator;
mod normalizing;
mod subword;
mod tiktoken;

pub use estimator::{CharacterEstimator, DEFAULT_ESTIMATOR_RATIO};
pub use normalizing::{NormalizingCounter, REFERENCE_MODEL};
pub use subword::SubwordCounter;
pub use tiktoken::TiktokenCounter;

use crate::error::Result;

/// Model-specific token counter
///
/// Implementations are stateless with respect to call history. They may hold
/// lazily built per-encoding caches. For a given `(text, model)` the result is
/// a pure function of the algorithm.
pub trait AccurateCounter: Send + Sync {
    /// Count the tokens `text` consumes under `model`
    fn count_tokens(&self, text: &str, model: &str) -> Result<usize>;

    /// Whether this counter knows how to count for `model`
    fn supports_model(&self, model: &str) -> bool;

    /// Name of the encoding used for `model`
    fn get_encoding(&self, model: &str) -> Result<String>;
}
