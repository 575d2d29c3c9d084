//! Static string constants
//!
//! Provider ids, encoding names and environment variable names shared by
//! every crate in the workspace. Using constants keeps the lookup tables in
//! the tokenizer layer and the catalog in sync.

// ============================================================================
// Provider Constants
// ============================================================================

/// OpenAI provider ID (byte-pair tokenizer)
pub const PROVIDER_OPENAI: &str = "openai";
/// Gemini provider ID (subword approximation)
pub const PROVIDER_GEMINI: &str = "gemini";
/// OpenRouter provider ID (normalizes every model onto one encoding)
pub const PROVIDER_OPENROUTER: &str = "openrouter";
/// Anthropic provider ID
pub const PROVIDER_ANTHROPIC: &str = "anthropic";
/// Ollama provider ID
pub const PROVIDER_OLLAMA: &str = "ollama";
/// Groq provider ID
pub const PROVIDER_GROQ: &str = "groq";

/// Display name for OpenAI
pub const DISPLAY_OPENAI: &str = "OpenAI";
/// Display name for Gemini
pub const DISPLAY_GEMINI: &str = "Google Gemini";
/// Display name for OpenRouter
pub const DISPLAY_OPENROUTER: &str = "OpenRouter";
/// Display name for Anthropic
pub const DISPLAY_ANTHROPIC: &str = "Anthropic";
/// Display name for Ollama
pub const DISPLAY_OLLAMA: &str = "Ollama";
/// Display name for Groq
pub const DISPLAY_GROQ: &str = "Groq";

// ============================================================================
// Encoding Constants
// ============================================================================

/// tiktoken encoding used by GPT-4o, o-series and newer
pub const ENCODING_O200K: &str = "o200k_base";
/// tiktoken encoding used by GPT-4, GPT-3.5 and embeddings v3
pub const ENCODING_CL100K: &str = "cl100k_base";
/// Pseudo encoding name reported by the subword approximation
pub const ENCODING_SUBWORD: &str = "sentencepiece-approx";
/// Pseudo encoding name reported by the character estimator
pub const ENCODING_ESTIMATE: &str = "estimate";

// ============================================================================
// Environment Variables
// ============================================================================

/// Overrides the breaker failure threshold
pub const ENV_BREAKER_THRESHOLD: &str = "MODELGATE_BREAKER_THRESHOLD";
/// Overrides the breaker cooldown (milliseconds)
pub const ENV_BREAKER_COOLDOWN_MS: &str = "MODELGATE_BREAKER_COOLDOWN_MS";
/// Overrides the per-call counting timeout (milliseconds)
pub const ENV_COUNT_TIMEOUT_MS: &str = "MODELGATE_COUNT_TIMEOUT_MS";
