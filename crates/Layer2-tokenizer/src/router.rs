//! Provider-routing facade
//!
//! Resolves the model's provider through the catalog, asks the manager for
//! that provider's counter and counts. Anything short of caller
//! cancellation degrades to the character estimator, so callers always get
//! a number.

use crate::breaker::BreakerStats;
use crate::counter::{AccurateCounter, CharacterEstimator};
use crate::decorator::{PerformanceMetrics, ResilientManager};
use crate::error::{CountError, Interrupt, TokenizerError};
use crate::manager::{DefaultTokenizerManager, TokenizerManager};
use crate::streaming::{ChunkPolicy, StreamingCounter};
use modelgate_foundation::strings::ENCODING_ESTIMATE;
use modelgate_foundation::{ModelCatalog, TokenizerConfig};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct TokenRouter {
    manager: Arc<dyn TokenizerManager>,
    catalog: Arc<dyn ModelCatalog>,
    estimator: CharacterEstimator,
    chunk_policy: ChunkPolicy,
    resilient: Option<Arc<ResilientManager>>,
}

impl TokenRouter {
    pub fn new(manager: Arc<dyn TokenizerManager>, catalog: Arc<dyn ModelCatalog>) -> Self {
        Self {
            manager,
            catalog,
            estimator: CharacterEstimator::default(),
            chunk_policy: ChunkPolicy::default(),
            resilient: None,
        }
    }

    /// Default manager wrapped in the resilient decorator, tuned by `config`
    pub fn from_config(config: &TokenizerConfig, catalog: Arc<dyn ModelCatalog>) -> Self {
        let resilient = Arc::new(ResilientManager::from_config(
            Arc::new(DefaultTokenizerManager::new()),
            config,
        ));
        let manager: Arc<dyn TokenizerManager> = resilient.clone();
        Self {
            manager,
            catalog,
            estimator: CharacterEstimator::new(config.estimator_ratio),
            chunk_policy: ChunkPolicy::from_settings(&config.streaming),
            resilient: Some(resilient),
        }
    }

    pub fn with_estimator(mut self, estimator: CharacterEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_chunk_policy(mut self, policy: ChunkPolicy) -> Self {
        self.chunk_policy = policy;
        self
    }

    pub fn manager(&self) -> &Arc<dyn TokenizerManager> {
        &self.manager
    }

    // ========================================================================
    // Counting
    // ========================================================================

    /// Count tokens for `model`.
    ///
    /// The only error is cancellation; every other failure falls back to the
    /// estimator.
    pub async fn count_tokens(
        &self,
        cancel: &CancellationToken,
        text: &str,
        model: &str,
    ) -> Result<usize, Interrupt> {
        if cancel.is_cancelled() {
            return Err(Interrupt::Cancelled);
        }

        let (provider, counter) = match self.resolve(model) {
            Ok(resolved) => resolved,
            Err(err) => return Ok(self.fallback(text, &err)),
        };

        let worker_text = text.to_owned();
        let worker_model = model.to_owned();
        let handle =
            tokio::task::spawn_blocking(move || counter.count_tokens(&worker_text, &worker_model));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Interrupt::Cancelled),
            joined = handle => {
                let result = match joined {
                    Ok(result) => result,
                    Err(join) => Err(TokenizerError::new(provider.as_str(), model, "counting task failed").with_source(join)),
                };
                match result {
                    Ok(count) => Ok(count),
                    Err(err) => Ok(self.fallback(text, &err.with_context(&provider, model))),
                }
            }
        }
    }

    /// Count a stream for `model`, picking the chunk size from `total_size`.
    ///
    /// If no counter can be resolved the stream is measured and estimated.
    pub async fn count_tokens_streaming<R>(
        &self,
        cancel: &CancellationToken,
        reader: R,
        model: &str,
        total_size: Option<u64>,
    ) -> Result<usize, CountError>
    where
        R: AsyncRead + Unpin,
    {
        if cancel.is_cancelled() {
            return Err(Interrupt::Cancelled.into());
        }

        let (provider, counter) = match self.resolve(model) {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!(
                    model,
                    category = %err.category(),
                    error = %err,
                    "streaming counter unavailable, estimating from stream length"
                );
                return self.estimate_stream(cancel, reader, model, total_size).await;
            }
        };

        let streaming = StreamingCounter::new(counter)
            .with_provider(provider)
            .with_policy(self.chunk_policy.clone());
        match total_size {
            Some(size) => {
                streaming
                    .count_tokens_streaming_adaptive(cancel, reader, model, size)
                    .await
            }
            None => streaming.count_tokens_streaming(cancel, reader, model).await,
        }
    }

    async fn estimate_stream<R>(
        &self,
        cancel: &CancellationToken,
        mut reader: R,
        model: &str,
        total_size: Option<u64>,
    ) -> Result<usize, CountError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; self.chunk_policy.chunk_size_for(total_size)];
        let mut len_bytes = 0usize;
        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Interrupt::Cancelled.into()),
                read = reader.read(&mut buf) => read,
            };
            let n = read.map_err(|e| {
                TokenizerError::new("", model, "streaming read failed").with_source(e)
            })?;
            if n == 0 {
                break;
            }
            len_bytes += n;
        }
        Ok(self.estimator.estimate_len(len_bytes))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Whether `model` gets an accurate (non-estimated) count
    pub fn supports_model(&self, model: &str) -> bool {
        self.resolve(model)
            .map(|(_, counter)| counter.supports_model(model))
            .unwrap_or(false)
    }

    /// Encoding used for `model`, `"estimate"` when it would fall back
    pub fn get_encoding(&self, model: &str) -> String {
        match self
            .resolve(model)
            .and_then(|(_, counter)| counter.get_encoding(model))
        {
            Ok(encoding) => encoding,
            Err(err) => {
                debug!(model, error = %err, "no accurate encoding");
                ENCODING_ESTIMATE.to_string()
            }
        }
    }

    pub fn clear_cache(&self) {
        self.manager.clear_cache();
    }

    /// Breaker snapshots (only when built with [`TokenRouter::from_config`])
    pub fn breaker_stats(&self) -> Vec<BreakerStats> {
        self.resilient
            .as_ref()
            .map(|m| m.breaker_stats())
            .unwrap_or_default()
    }

    /// Metrics snapshots (only when built with [`TokenRouter::from_config`])
    pub fn all_metrics(&self) -> Vec<(String, PerformanceMetrics)> {
        self.resilient
            .as_ref()
            .map(|m| m.all_metrics())
            .unwrap_or_default()
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn resolve(&self, model: &str) -> Result<(String, Arc<dyn AccurateCounter>), TokenizerError> {
        let info = self.catalog.model_info(model).map_err(|e| {
            TokenizerError::new("", model, "unknown model: catalog lookup failed").with_source(e)
        })?;
        let provider = info.provider.id();
        let counter = self
            .manager
            .get_tokenizer(provider)
            .map_err(|e| e.with_context(provider, model))?;
        Ok((provider.to_string(), counter))
    }

    fn fallback(&self, text: &str, err: &TokenizerError) -> usize {
        let estimate = self.estimator.estimate(text);
        warn!(
            provider = err.provider(),
            model = err.model(),
            category = %err.category(),
            error = %err,
            estimate,
            "accurate count unavailable, using estimator"
        );
        estimate
    }
}
