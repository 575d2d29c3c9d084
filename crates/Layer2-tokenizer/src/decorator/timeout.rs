//! Deadline decorator
//!
//! The inner count runs on tokio's blocking pool and the caller waits on
//! `tokio::time::timeout`. A late result is dropped with the join handle.
//! Abandoned workers keep their pool slot until they finish, and at most
//! [`MAX_COUNT_WORKERS`] of them may be alive per [`DeadlineRunner`].

use crate::counter::AccurateCounter;
use crate::error::{Result, TokenizerError};
use crate::manager::TokenizerManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::warn;

/// Concurrent counting workers per runner, abandoned ones included
pub const MAX_COUNT_WORKERS: usize = 32;

/// Runs counts under a deadline on the tokio blocking pool
#[derive(Clone)]
pub struct DeadlineRunner {
    timeout: Duration,
    workers: Arc<Semaphore>,
}

impl DeadlineRunner {
    pub fn new(timeout: Duration) -> Self {
        Self::with_capacity(timeout, MAX_COUNT_WORKERS)
    }

    pub fn with_capacity(timeout: Duration, workers: usize) -> Self {
        Self {
            timeout,
            workers: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Workers that may start right now
    pub fn available_workers(&self) -> usize {
        self.workers.available_permits()
    }

    /// Run `inner.count_tokens` with the deadline.
    ///
    /// Waiting for a free worker counts against the deadline. Expiry yields a
    /// Cancelled error whose source is tokio's `Elapsed`; the worker is
    /// abandoned, not interrupted.
    ///
    /// # Panics
    ///
    /// Blocks the calling thread, so it panics when called from an async
    /// task on a current-thread runtime.
    pub fn run(
        &self,
        inner: &Arc<dyn AccurateCounter>,
        provider: &str,
        text: &str,
        model: &str,
    ) -> Result<usize> {
        let handle = Handle::try_current().map_err(|e| {
            TokenizerError::new(provider, model, "deadline enforcement requires a tokio runtime")
                .with_source(e)
        })?;

        let work = count_on_pool(
            Arc::clone(&self.workers),
            Arc::clone(inner),
            provider,
            text,
            model,
        );
        let outcome =
            tokio::task::block_in_place(|| handle.block_on(tokio::time::timeout(self.timeout, work)));

        match outcome {
            Ok(result) => result.map_err(|e| e.with_context(provider, model)),
            Err(elapsed) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                warn!(provider, model, timeout_ms, "token counting deadline exceeded");
                Err(
                    TokenizerError::new(provider, model, format!("token counting exceeded {}ms", timeout_ms))
                        .with_source(elapsed)
                        .with_detail("timeout_ms", timeout_ms),
                )
            }
        }
    }
}

async fn count_on_pool(
    workers: Arc<Semaphore>,
    counter: Arc<dyn AccurateCounter>,
    provider: &str,
    text: &str,
    model: &str,
) -> Result<usize> {
    let permit = workers.acquire_owned().await.map_err(|e| {
        TokenizerError::new(provider, model, "counting worker pool closed").with_source(e)
    })?;

    let worker_text = text.to_owned();
    let worker_model = model.to_owned();
    tokio::task::spawn_blocking(move || {
        let _permit = permit;
        counter.count_tokens(&worker_text, &worker_model)
    })
    .await
    .map_err(|e| TokenizerError::new(provider, model, "counting worker failed").with_source(e))?
}

/// Counter with a per-call deadline
pub struct TimeoutCounter {
    inner: Arc<dyn AccurateCounter>,
    provider: String,
    runner: DeadlineRunner,
}

impl TimeoutCounter {
    pub fn new(inner: Arc<dyn AccurateCounter>, provider: impl Into<String>, timeout: Duration) -> Self {
        Self::with_runner(inner, provider, DeadlineRunner::new(timeout))
    }

    pub fn with_runner(
        inner: Arc<dyn AccurateCounter>,
        provider: impl Into<String>,
        runner: DeadlineRunner,
    ) -> Self {
        Self {
            inner,
            provider: provider.into(),
            runner,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.runner.timeout()
    }
}

impl AccurateCounter for TimeoutCounter {
    fn count_tokens(&self, text: &str, model: &str) -> Result<usize> {
        self.runner.run(&self.inner, &self.provider, text, model)
    }

    fn supports_model(&self, model: &str) -> bool {
        self.inner.supports_model(model)
    }

    fn get_encoding(&self, model: &str) -> Result<String> {
        self.inner.get_encoding(model)
    }
}

/// Wraps every counter from the inner manager in a [`TimeoutCounter`]
///
/// All counters handed out share one [`DeadlineRunner`].
pub struct TimeoutManager {
    inner: Arc<dyn TokenizerManager>,
    runner: DeadlineRunner,
}

impl TimeoutManager {
    pub fn new(inner: Arc<dyn TokenizerManager>, timeout: Duration) -> Self {
        Self {
            inner,
            runner: DeadlineRunner::new(timeout),
        }
    }
}

impl TokenizerManager for TimeoutManager {
    fn get_tokenizer(&self, provider: &str) -> Result<Arc<dyn AccurateCounter>> {
        let inner = self.inner.get_tokenizer(provider)?;
        let counter: Arc<dyn AccurateCounter> =
            Arc::new(TimeoutCounter::with_runner(inner, provider, self.runner.clone()));
        Ok(counter)
    }

    fn supports_provider(&self, provider: &str) -> bool {
        self.inner.supports_provider(provider)
    }

    fn clear_cache(&self) {
        self.inner.clear_cache();
    }
}
