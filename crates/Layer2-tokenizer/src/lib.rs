//! # modelgate-tokenizer
//!
//! Token counting that stays accurate, fast and available when tokenizer
//! backends misbehave.
//!
//! - Counter: byte-pair (tiktoken), subword approximation, normalization,
//!   character estimator
//! - Manager: lazily built per-provider counters
//! - Breaker: per-provider circuit breaker
//! - Decorator: timeout, metrics, breaker and combined wrappers
//! - Streaming: chunked counting with cancellation
//! - Router: model → provider → counter, with estimator fallback
//!
//! ## Layers
//!
//! ```text
//! TokenRouter ──▶ ModelCatalog (model → provider)
//!     │
//!     ▼
//! ResilientManager ──▶ BreakerRegistry / MetricsRegistry
//!     │
//!     ▼
//! DefaultTokenizerManager ──▶ TiktokenCounter | SubwordCounter | NormalizingCounter
//!     │
//!     └─ on any failure: CharacterEstimator (floor(bytes * 0.75))
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use modelgate_foundation::{ModelRegistry, TokenizerConfig};
//! use modelgate_tokenizer::{CancellationToken, TokenRouter};
//!
//! let config = TokenizerConfig::load()?;
//! let router = TokenRouter::from_config(&config, Arc::new(ModelRegistry::with_defaults()));
//!
//! let cancel = CancellationToken::new();
//! let tokens = router.count_tokens(&cancel, "Hello, world!", "gpt-4o").await?;
//! ```

pub mod breaker;
pub mod counter;
pub mod decorator;
pub mod error;
pub mod manager;
pub mod router;
pub mod streaming;

#[cfg(test)]
mod test_support;

// ============================================================================
// Error
// ============================================================================
pub use error::{CountError, ErrorCategory, Interrupt, Result, TokenizerError};

// ============================================================================
// Counters
// ============================================================================
pub use counter::{
    AccurateCounter, CharacterEstimator, NormalizingCounter, SubwordCounter, TiktokenCounter,
    DEFAULT_ESTIMATOR_RATIO, REFERENCE_MODEL,
};

// ============================================================================
// Breaker
// ============================================================================
pub use breaker::{
    BreakerCall, BreakerRegistry, BreakerState, BreakerStats, CircuitBreaker, Clock, ManualClock,
    SystemClock,
};

// ============================================================================
// Manager & Decorators
// ============================================================================
pub use decorator::{
    BreakerCounter, CircuitBreakerManager, DeadlineRunner, MetricsRecorder, MetricsRegistry,
    MonitoredCounter, MonitoredManager, PerformanceMetrics, ResilientCounter, ResilientManager,
    TimeoutCounter, TimeoutManager, MAX_COUNT_WORKERS,
};
pub use manager::{DefaultTokenizerManager, TokenizerManager, SUPPORTED_PROVIDERS};

// ============================================================================
// Streaming & Facade
// ============================================================================
pub use router::TokenRouter;
pub use streaming::{ChunkPolicy, StreamingCounter};

pub use tokio_util::sync::CancellationToken;
