//! Streaming token counter
//!
//! Counts arbitrarily large inputs with bounded memory: the reader is
//! consumed in fixed-size chunks, each chunk is counted on the blocking pool,
//! and every await point is raced against the caller's cancellation token.
//!
//! Chunk boundaries may split a token, so a streamed count can differ from
//! the in-memory count by at most one token per boundary. It is exact when
//! the chunk is larger than the input.

use crate::counter::AccurateCounter;
use crate::error::{CountError, Interrupt, TokenizerError};
use modelgate_foundation::StreamingSettings;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

// ============================================================================
// Chunk Policy
// ============================================================================

/// Chunk size as a function of the expected input size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPolicy {
    pub small_chunk: usize,
    pub medium_chunk: usize,
    pub large_chunk: usize,
    /// Inputs at or above this size use `medium_chunk`
    pub medium_threshold: u64,
    /// Inputs at or above this size use `large_chunk`
    pub large_threshold: u64,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self::from_settings(&StreamingSettings::default())
    }
}

impl ChunkPolicy {
    pub fn from_settings(settings: &StreamingSettings) -> Self {
        Self {
            small_chunk: settings.small_chunk_bytes,
            medium_chunk: settings.medium_chunk_bytes,
            large_chunk: settings.large_chunk_bytes,
            medium_threshold: settings.medium_threshold_bytes,
            large_threshold: settings.large_threshold_bytes,
        }
    }

    /// Unknown size falls back to the smallest chunk
    pub fn chunk_size_for(&self, total_size: Option<u64>) -> usize {
        let size = match total_size {
            Some(size) if size >= self.large_threshold => self.large_chunk,
            Some(size) if size >= self.medium_threshold => self.medium_chunk,
            _ => self.small_chunk,
        };
        size.max(1)
    }
}

// ============================================================================
// Streaming Counter
// ============================================================================

pub struct StreamingCounter {
    counter: Arc<dyn AccurateCounter>,
    provider: String,
    policy: ChunkPolicy,
}

impl StreamingCounter {
    pub fn new(counter: Arc<dyn AccurateCounter>) -> Self {
        Self {
            counter,
            provider: String::new(),
            policy: ChunkPolicy::default(),
        }
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    pub fn with_policy(mut self, policy: ChunkPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &ChunkPolicy {
        &self.policy
    }

    /// Count with the smallest chunk size
    pub async fn count_tokens_streaming<R>(
        &self,
        cancel: &CancellationToken,
        reader: R,
        model: &str,
    ) -> Result<usize, CountError>
    where
        R: AsyncRead + Unpin,
    {
        let chunk_size = self.policy.chunk_size_for(None);
        self.count_chunked(cancel, reader, model, chunk_size).await
    }

    /// Count with a chunk size picked from the expected input size
    pub async fn count_tokens_streaming_adaptive<R>(
        &self,
        cancel: &CancellationToken,
        reader: R,
        model: &str,
        total_size: u64,
    ) -> Result<usize, CountError>
    where
        R: AsyncRead + Unpin,
    {
        let chunk_size = self.policy.chunk_size_for(Some(total_size));
        self.count_chunked(cancel, reader, model, chunk_size).await
    }

    /// Count with an explicit chunk size
    pub async fn count_chunked<R>(
        &self,
        cancel: &CancellationToken,
        mut reader: R,
        model: &str,
        chunk_size: usize,
    ) -> Result<usize, CountError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; chunk_size.max(1)];
        let mut pending: Vec<u8> = Vec::new();
        let mut total = 0usize;
        let mut chunks = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Err(Interrupt::Cancelled.into());
            }

            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Interrupt::Cancelled.into()),
                read = reader.read(&mut buf) => read,
            };
            let n = read.map_err(|e| self.failure(model, "streaming read failed").with_source(e))?;
            if n == 0 {
                break;
            }

            pending.extend_from_slice(&buf[..n]);
            let text = take_complete_utf8(&mut pending)
                .map_err(|offset| {
                    self.failure(model, "streaming input is not valid UTF-8")
                        .with_detail("offset", offset)
                })?;
            if text.is_empty() {
                continue;
            }

            if cancel.is_cancelled() {
                return Err(Interrupt::Cancelled.into());
            }
            total += self.count_chunk(cancel, text, model).await?;
            chunks += 1;
        }

        if !pending.is_empty() {
            return Err(self
                .failure(model, "streaming input is not valid UTF-8: truncated sequence at end")
                .with_detail("trailing_bytes", pending.len())
                .into());
        }

        debug!(provider = %self.provider, model, chunks, chunk_size, total, "streamed count complete");
        Ok(total)
    }

    async fn count_chunk(
        &self,
        cancel: &CancellationToken,
        text: String,
        model: &str,
    ) -> Result<usize, CountError> {
        let counter = Arc::clone(&self.counter);
        let worker_model = model.to_owned();
        let handle = tokio::task::spawn_blocking(move || counter.count_tokens(&text, &worker_model));

        tokio::select! {
            biased;
            // the blocking task is detached and left to finish
            _ = cancel.cancelled() => Err(Interrupt::Cancelled.into()),
            joined = handle => match joined {
                Ok(Ok(count)) => Ok(count),
                Ok(Err(err)) => Err(self.failure(model, "streaming chunk count failed").with_source(err).into()),
                Err(join) => Err(self.failure(model, "streaming worker failed").with_source(join).into()),
            },
        }
    }

    fn failure(&self, model: &str, message: &str) -> TokenizerError {
        TokenizerError::new(self.provider.as_str(), model, message)
    }
}

/// Split off the longest valid UTF-8 prefix of `pending`.
///
/// An incomplete sequence at the end stays in `pending` for the next chunk.
/// Returns the byte offset of an invalid sequence as the error.
fn take_complete_utf8(pending: &mut Vec<u8>) -> Result<String, usize> {
    let valid = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(e) => return Err(e.valid_up_to()),
    };
    let rest = pending.split_off(valid);
    let complete = std::mem::replace(pending, rest);
    String::from_utf8(complete).map_err(|e| e.utf8_error().valid_up_to())
}
