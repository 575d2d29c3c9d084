//! Subword approximation for the Gemini/Gemma families
//!
//! No vocabulary is shipped, so counts are a deterministic approximation of a
//! SentencePiece-style tokenizer:
//!
//! - pure ASCII: per whitespace-separated word, letters/digits cost 1 token up
//!   to 3 bytes, 2 up to 6, then `n / 4 + 1`; every punctuation mark costs 1.
//! - anything else: per character weights (CJK 1.0, Arabic 2.0, other
//!   non-ASCII 1.5, ASCII punctuation 1.0, other ASCII 0.25, whitespace 0),
//!   summed and rounded up.

use super::AccurateCounter;
use crate::error::{Result, TokenizerError};
use modelgate_foundation::strings::{ENCODING_SUBWORD, PROVIDER_GEMINI};

const SUPPORTED_PREFIXES: &[&str] = &["gemini", "gemma"];

const CJK_WEIGHT: f64 = 1.0;
const ARABIC_WEIGHT: f64 = 2.0;
const OTHER_UNICODE_WEIGHT: f64 = 1.5;
const PUNCTUATION_WEIGHT: f64 = 1.0;
const ASCII_WEIGHT: f64 = 0.25;

/// Deterministic subword token estimate
#[derive(Debug, Default, Clone, Copy)]
pub struct SubwordCounter;

impl SubwordCounter {
    pub fn new() -> Self {
        Self
    }

    /// Approximate token count; independent of the model
    pub fn approximate(text: &str) -> usize {
        if text.is_ascii() {
            ascii_tokens(text)
        } else {
            weighted_tokens(text)
        }
    }

    fn check_model(&self, model: &str) -> Result<()> {
        if self.supports_model(model) {
            Ok(())
        } else {
            Err(TokenizerError::new(
                PROVIDER_GEMINI,
                model,
                "model not found for subword approximation",
            ))
        }
    }
}

fn ascii_tokens(text: &str) -> usize {
    text.split_whitespace()
        .map(|word| {
            let punctuation = word.bytes().filter(u8::is_ascii_punctuation).count();
            punctuation + word_cost(word.len() - punctuation)
        })
        .sum()
}

fn word_cost(len: usize) -> usize {
    match len {
        0 => 0,
        1..=3 => 1,
        4..=6 => 2,
        n => n / 4 + 1,
    }
}

fn weighted_tokens(text: &str) -> usize {
    let total: f64 = text.chars().map(char_weight).sum();
    total.ceil() as usize
}

fn char_weight(c: char) -> f64 {
    if c.is_whitespace() {
        0.0
    } else if c.is_ascii_punctuation() {
        PUNCTUATION_WEIGHT
    } else if c.is_ascii() {
        ASCII_WEIGHT
    } else if is_cjk(c) {
        CJK_WEIGHT
    } else if is_arabic(c) {
        ARABIC_WEIGHT
    } else {
        OTHER_UNICODE_WEIGHT
    }
}

/// Hangul, CJK ideographs (incl. extension A), kana
fn is_cjk(c: char) -> bool {
    let code = c as u32;
    (0xAC00..=0xD7AF).contains(&code)
        || (0x1100..=0x11FF).contains(&code)
        || (0x3130..=0x318F).contains(&code)
        || (0x3400..=0x4DBF).contains(&code)
        || (0x4E00..=0x9FFF).contains(&code)
        || (0x3040..=0x309F).contains(&code)
        || (0x30A0..=0x30FF).contains(&code)
}

fn is_arabic(c: char) -> bool {
    let code = c as u32;
    (0x0600..=0x06FF).contains(&code)
        || (0x0750..=0x077F).contains(&code)
        || (0x08A0..=0x08FF).contains(&code)
        || (0xFB50..=0xFDFF).contains(&code)
        || (0xFE70..=0xFEFF).contains(&code)
}

impl AccurateCounter for SubwordCounter {
    fn count_tokens(&self, text: &str, model: &str) -> Result<usize> {
        if text.is_empty() {
            return Ok(0);
        }
        self.check_model(model)?;
        Ok(Self::approximate(text))
    }

    fn supports_model(&self, model: &str) -> bool {
        let model = model.trim().to_lowercase();
        SUPPORTED_PREFIXES.iter().any(|p| model.starts_with(p))
    }

    fn get_encoding(&self, model: &str) -> Result<String> {
        self.check_model(model)?;
        Ok(ENCODING_SUBWORD.to_string())
    }
}
