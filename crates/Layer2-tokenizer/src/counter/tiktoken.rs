//! Byte-pair counter for the OpenAI model family (tiktoken-rs)

use super::AccurateCounter;
use crate::error::{Result, TokenizerError};
use modelgate_foundation::strings::{ENCODING_CL100K, ENCODING_O200K, PROVIDER_OPENAI};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;
use tracing::debug;

/// Model prefixes encoded with `o200k_base`. Checked before the cl100k table
/// because `gpt-4o` would otherwise match `gpt-4`.
const O200K_PREFIXES: &[&str] = &["gpt-4o", "gpt-4.1", "gpt-5", "o1", "o3", "o4"];

/// Model prefixes encoded with `cl100k_base`
const CL100K_PREFIXES: &[&str] = &[
    "gpt-4",
    "gpt-3.5",
    "text-embedding-3",
    "text-embedding-ada-002",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Encoding {
    O200k,
    Cl100k,
}

impl Encoding {
    fn for_model(model: &str) -> Option<Self> {
        let model = model.trim().to_lowercase();
        if O200K_PREFIXES.iter().any(|p| model.starts_with(p)) {
            Some(Encoding::O200k)
        } else if CL100K_PREFIXES.iter().any(|p| model.starts_with(p)) {
            Some(Encoding::Cl100k)
        } else {
            None
        }
    }

    fn name(self) -> &'static str {
        match self {
            Encoding::O200k => ENCODING_O200K,
            Encoding::Cl100k => ENCODING_CL100K,
        }
    }

    fn load(self) -> std::result::Result<CoreBPE, String> {
        let loaded = match self {
            Encoding::O200k => tiktoken_rs::o200k_base(),
            Encoding::Cl100k => tiktoken_rs::cl100k_base(),
        };
        loaded.map_err(|e| e.to_string())
    }
}

/// Exact byte-pair token counter
///
/// Encoders are built lazily, once per encoding, and shared behind `Arc`.
#[derive(Default)]
pub struct TiktokenCounter {
    encoders: RwLock<HashMap<Encoding, Arc<CoreBPE>>>,
}

impl TiktokenCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every cached encoder; the next count rebuilds it
    pub fn clear_cache(&self) {
        self.encoders.write().clear();
    }

    /// Number of encoders currently built
    pub fn cached_encodings(&self) -> usize {
        self.encoders.read().len()
    }

    fn encoding_for(&self, model: &str) -> Result<Encoding> {
        Encoding::for_model(model).ok_or_else(|| {
            TokenizerError::new(
                PROVIDER_OPENAI,
                model,
                "unsupported model: no byte-pair encoding registered",
            )
        })
    }

    fn encoder(&self, encoding: Encoding, model: &str) -> Result<Arc<CoreBPE>> {
        if let Some(bpe) = self.encoders.read().get(&encoding) {
            return Ok(Arc::clone(bpe));
        }

        let mut encoders = self.encoders.write();
        // another caller may have built it while we waited
        if let Some(bpe) = encoders.get(&encoding) {
            return Ok(Arc::clone(bpe));
        }

        debug!(encoding = encoding.name(), "building byte-pair encoder");
        let bpe = encoding.load().map_err(|e| {
            TokenizerError::new(PROVIDER_OPENAI, model, "failed to initialize encoder")
                .with_source(e)
                .with_detail("encoding", encoding.name())
        })?;
        let bpe = Arc::new(bpe);
        encoders.insert(encoding, Arc::clone(&bpe));
        Ok(bpe)
    }
}

impl AccurateCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str, model: &str) -> Result<usize> {
        if text.is_empty() {
            return Ok(0);
        }
        let encoding = self.encoding_for(model)?;
        let bpe = self.encoder(encoding, model)?;
        Ok(bpe.encode_ordinary(text).len())
    }

    fn supports_model(&self, model: &str) -> bool {
        Encoding::for_model(model).is_some()
    }

    fn get_encoding(&self, model: &str) -> Result<String> {
        self.encoding_for(model).map(|e| e.name().to_string())
    }
}
