//! Tokenizer error taxonomy
//!
//! Every failure produced by a counter, the manager or a decorator is a
//! [`TokenizerError`]. Its [`ErrorCategory`] is derived from the source chain
//! and the message with a fixed, ordered rule set, so the same failure always
//! lands in the same bucket.
//!
//! Cancellation is carried as an [`Interrupt`] so that it can be surfaced
//! unchanged through [`CountError::Interrupted`].

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use thiserror::Error;

/// Result alias for counter operations
pub type Result<T> = std::result::Result<T, TokenizerError>;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

// ============================================================================
// Interrupt
// ============================================================================

/// Why an operation stopped before producing a result
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interrupt {
    /// The caller's cancellation token fired
    #[error("operation cancelled")]
    Cancelled,

    /// The configured deadline elapsed
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

// ============================================================================
// Error Category
// ============================================================================

/// Advisory classification used for logging and fallback decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Cancelled,
    RateLimit,
    Auth,
    Network,
    InvalidRequest,
    NotFound,
    Server,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Network => "network",
            ErrorCategory::InvalidRequest => "invalid_request",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Server => "server",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Transient failures may succeed if attempted again later
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ErrorCategory::RateLimit | ErrorCategory::Network | ErrorCategory::Server
        )
    }

    /// Classify a failure from its source chain and message.
    ///
    /// Rules are applied in order and the first match wins.
    pub fn classify(source: Option<&(dyn StdError + 'static)>, message: &str) -> Self {
        if find_interrupt(source).is_some() {
            return ErrorCategory::Cancelled;
        }

        let mut text = message.to_lowercase();
        let mut current = source;
        while let Some(err) = current {
            text.push(' ');
            text.push_str(&err.to_string().to_lowercase());
            current = err.source();
        }

        let has = |needles: &[&str]| needles.iter().any(|n| text.contains(n));

        if has(&["circuit breaker"]) {
            ErrorCategory::RateLimit
        } else if has(&["initializ", "auth", "credential"]) {
            ErrorCategory::Auth
        } else if has(&["network", "connection", "dial", "timeout", "unreachable"]) {
            ErrorCategory::Network
        } else if has(&["invalid", "malformed", "encoding failed"]) {
            ErrorCategory::InvalidRequest
        } else if has(&["not found", "unsupported", "unknown model", "encoding"]) {
            ErrorCategory::NotFound
        } else if !text.trim().is_empty() {
            ErrorCategory::Server
        } else {
            ErrorCategory::Unknown
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First interrupt in the chain; a tokio `Elapsed` counts as an expired deadline
fn find_interrupt(source: Option<&(dyn StdError + 'static)>) -> Option<Interrupt> {
    let mut current = source;
    while let Some(err) = current {
        if let Some(interrupt) = err.downcast_ref::<Interrupt>() {
            return Some(*interrupt);
        }
        if err.is::<tokio::time::error::Elapsed>() {
            return Some(Interrupt::DeadlineExceeded);
        }
        current = err.source();
    }
    None
}

// ============================================================================
// TokenizerError
// ============================================================================

/// Structured tokenizer failure
///
/// Built with [`TokenizerError::new`] and enriched builder-style before it is
/// returned. The category is recomputed whenever the source changes.
pub struct TokenizerError {
    provider: String,
    model: String,
    message: String,
    source: Option<BoxError>,
    category: ErrorCategory,
    details: HashMap<String, String>,
}

impl TokenizerError {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        let category = ErrorCategory::classify(None, &message);
        Self {
            provider: provider.into(),
            model: model.into(),
            message,
            source: None,
            category,
            details: HashMap::new(),
        }
    }

    /// Error for an interrupted operation (category is always Cancelled)
    pub fn interrupted(
        provider: impl Into<String>,
        model: impl Into<String>,
        interrupt: Interrupt,
    ) -> Self {
        Self::new(provider, model, "token counting interrupted").with_source(interrupt)
    }

    /// Attach the underlying cause and reclassify
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        let source = source.into();
        self.category = ErrorCategory::classify(Some(&*source as &(dyn StdError + 'static)), &self.message);
        self.source = Some(source);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.details.insert(key.into(), value.to_string());
        self
    }

    /// Fill in provider/model when the originating layer did not know them
    pub fn with_context(mut self, provider: &str, model: &str) -> Self {
        if self.provider.is_empty() {
            self.provider = provider.to_string();
        }
        if self.model.is_empty() {
            self.model = model.to_string();
        }
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn details(&self) -> &HashMap<String, String> {
        &self.details
    }

    pub fn detail(&self, key: &str) -> Option<&str> {
        self.details.get(key).map(String::as_str)
    }

    /// The interrupt in the source chain, if any
    pub fn interrupt(&self) -> Option<Interrupt> {
        find_interrupt(self.source_ref())
    }

    pub fn is_cancelled(&self) -> bool {
        self.category == ErrorCategory::Cancelled
    }

    pub fn is_transient(&self) -> bool {
        self.category.is_transient()
    }

    fn source_ref(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

impl fmt::Debug for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenizerError")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("message", &self.message)
            .field("category", &self.category)
            .field("source", &self.source.as_ref().map(|s| s.to_string()))
            .field("details", &self.details)
            .finish()
    }
}

impl fmt::Display for TokenizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tokenizer error")?;
        match (self.provider.is_empty(), self.model.is_empty()) {
            (false, false) => write!(f, " [{}/{}]", self.provider, self.model)?,
            (false, true) => write!(f, " [{}]", self.provider)?,
            (true, false) => write!(f, " [{}]", self.model)?,
            (true, true) => {}
        }
        write!(f, ": {}", self.message)?;
        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl StdError for TokenizerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source_ref()
    }
}

// ============================================================================
// CountError
// ============================================================================

/// Error returned by cancellable operations
///
/// Cancellation is never rewrapped into a [`TokenizerError`].
#[derive(Error, Debug)]
pub enum CountError {
    #[error(transparent)]
    Interrupted(#[from] Interrupt),

    #[error(transparent)]
    Failed(#[from] TokenizerError),
}

impl CountError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            CountError::Interrupted(_) => true,
            CountError::Failed(err) => err.is_cancelled(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            CountError::Interrupted(_) => ErrorCategory::Cancelled,
            CountError::Failed(err) => err.category(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_rules() {
        let cases = [
            ("circuit breaker is open", ErrorCategory::RateLimit),
            ("failed to initialize encoder", ErrorCategory::Auth),
            ("missing credentials", ErrorCategory::Auth),
            ("connection reset", ErrorCategory::Network),
            ("request timeout", ErrorCategory::Network),
            ("malformed input", ErrorCategory::InvalidRequest),
            ("encoding failed for chunk", ErrorCategory::InvalidRequest),
            ("model not found", ErrorCategory::NotFound),
            ("unsupported provider: foo", ErrorCategory::NotFound),
            ("no encoding for model", ErrorCategory::NotFound),
            ("something exploded", ErrorCategory::Server),
            ("", ErrorCategory::Unknown),
        ];

        for (message, expected) in cases {
            assert_eq!(
                ErrorCategory::classify(None, message),
                expected,
                "message: {:?}",
                message
            );
        }
    }

    #[test]
    fn test_rule_order_is_tie_break() {
        // breaker wins over network
        assert_eq!(
            ErrorCategory::classify(None, "circuit breaker open after connection errors"),
            ErrorCategory::RateLimit
        );
        // invalid wins over not found
        assert_eq!(
            ErrorCategory::classify(None, "invalid model, not found"),
            ErrorCategory::InvalidRequest
        );
    }

    #[test]
    fn test_interrupt_source_is_cancelled() {
        let err = TokenizerError::new("openai", "gpt-4o", "request timeout")
            .with_source(Interrupt::DeadlineExceeded);

        assert_eq!(err.category(), ErrorCategory::Cancelled);
        assert_eq!(err.interrupt(), Some(Interrupt::DeadlineExceeded));
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_nested_interrupt_is_found() {
        let inner = TokenizerError::interrupted("gemini", "gemini-2.0-flash", Interrupt::Cancelled);
        let outer = TokenizerError::new("gemini", "gemini-2.0-flash", "wrapped").with_source(inner);

        assert_eq!(outer.category(), ErrorCategory::Cancelled);
        assert_eq!(outer.interrupt(), Some(Interrupt::Cancelled));
    }

    #[test]
    fn test_source_text_participates() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "network unreachable");
        let err = TokenizerError::new("", "", "read failed").with_source(io);
        assert_eq!(err.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_context_and_details() {
        let err = TokenizerError::new("", "", "boom")
            .with_context("openai", "gpt-4o")
            .with_context("ignored", "ignored")
            .with_detail("chunk", 3);

        assert_eq!(err.provider(), "openai");
        assert_eq!(err.model(), "gpt-4o");
        assert_eq!(err.detail("chunk"), Some("3"));
        assert_eq!(err.to_string(), "tokenizer error [openai/gpt-4o]: boom");
    }

    #[test]
    fn test_count_error() {
        let err = CountError::from(Interrupt::Cancelled);
        assert!(err.is_cancelled());
        assert_eq!(err.to_string(), "operation cancelled");

        let err = CountError::from(TokenizerError::new("openai", "x", "model not found"));
        assert!(!err.is_cancelled());
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_transient() {
        assert!(ErrorCategory::Network.is_transient());
        assert!(ErrorCategory::RateLimit.is_transient());
        assert!(!ErrorCategory::NotFound.is_transient());
        assert!(!ErrorCategory::Cancelled.is_transient());
    }

    #[tokio::test]
    async fn test_elapsed_source_is_deadline() {
        let elapsed = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            std::future::pending::<()>(),
        )
        .await
        .unwrap_err();

        let err = TokenizerError::new("openai", "gpt-4o", "count took too long").with_source(elapsed);
        assert_eq!(err.category(), ErrorCategory::Cancelled);
        assert_eq!(err.interrupt(), Some(Interrupt::DeadlineExceeded));
    }
}
