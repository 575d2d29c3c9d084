//! Resilience decorators
//!
//! Each decorator is itself an [`AccurateCounter`](crate::AccurateCounter)
//! wrapping another one, and each has a [`TokenizerManager`](crate::TokenizerManager)
//! counterpart that wraps whatever the inner manager hands out and owns the
//! per-provider state (breakers, metrics).
//!
//! ```text
//! ResilientManager
//!   └─ ResilientCounter ── breaker ─▶ blocking pool + deadline ─▶ inner counter
//!                                         │
//!                                   metrics recorder
//! ```

mod breaker;
mod metrics;
mod resilient;
mod timeout;

pub use breaker::{BreakerCounter, CircuitBreakerManager};
pub use metrics::{MetricsRecorder, MetricsRegistry, MonitoredCounter, MonitoredManager, PerformanceMetrics};
pub use resilient::{ResilientCounter, ResilientManager};
pub use timeout::{DeadlineRunner, TimeoutCounter, TimeoutManager, MAX_COUNT_WORKERS};

use crate::breaker::BreakerCall;
use crate::error::{ErrorCategory, Result, TokenizerError};

/// Whether an error reflects the backend's health.
///
/// Requests for unknown models or malformed input say nothing about the
/// backend, so they neither count toward opening the breaker nor reset it.
pub(crate) fn is_backend_failure(err: &TokenizerError) -> bool {
    !matches!(
        err.category(),
        ErrorCategory::NotFound | ErrorCategory::InvalidRequest
    )
}

/// Report a finished call to its breaker
pub(crate) fn settle(call: BreakerCall<'_>, result: &Result<usize>) {
    match result {
        Ok(_) => call.success(),
        Err(err) if is_backend_failure(err) => call.failure(),
        Err(_) => call.neutral(),
    }
}

pub(crate) fn breaker_open_error(provider: &str, model: &str, failures: u32) -> TokenizerError {
    TokenizerError::new(provider, model, "circuit breaker open: call rejected")
        .with_detail("failure_count", failures)
}
