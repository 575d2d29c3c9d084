use crate::strings::{
    DISPLAY_ANTHROPIC, DISPLAY_GEMINI, DISPLAY_GROQ, DISPLAY_OLLAMA, DISPLAY_OPENAI,
    DISPLAY_OPENROUTER, PROVIDER_ANTHROPIC, PROVIDER_GEMINI, PROVIDER_GROQ, PROVIDER_OLLAMA,
    PROVIDER_OPENAI, PROVIDER_OPENROUTER,
};
use crate::Error;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 프로바이더 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    Openai,
    Gemini,
    Openrouter,
    Anthropic,
    Ollama,
    Groq,
}

impl ProviderType {
    /// 모든 프로바이더
    pub const ALL: [ProviderType; 6] = [
        Self::Openai,
        Self::Gemini,
        Self::Openrouter,
        Self::Anthropic,
        Self::Ollama,
        Self::Groq,
    ];

    /// 프로바이더 ID (토크나이저 매니저 키)
    pub fn id(&self) -> &'static str {
        match self {
            Self::Openai => PROVIDER_OPENAI,
            Self::Gemini => PROVIDER_GEMINI,
            Self::Openrouter => PROVIDER_OPENROUTER,
            Self::Anthropic => PROVIDER_ANTHROPIC,
            Self::Ollama => PROVIDER_OLLAMA,
            Self::Groq => PROVIDER_GROQ,
        }
    }

    /// 표시 이름
    pub fn name(&self) -> &'static str {
        match self {
            Self::Openai => DISPLAY_OPENAI,
            Self::Gemini => DISPLAY_GEMINI,
            Self::Openrouter => DISPLAY_OPENROUTER,
            Self::Anthropic => DISPLAY_ANTHROPIC,
            Self::Ollama => DISPLAY_OLLAMA,
            Self::Groq => DISPLAY_GROQ,
        }
    }

    /// 로컬 서비스 여부
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Ollama)
    }

    /// 기본 모델
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Openai => "gpt-4o",
            Self::Gemini => "gemini-2.0-flash",
            Self::Openrouter => "openrouter/auto",
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::Groq => "llama-3.3-70b-versatile",
            Self::Ollama => "llama3",
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for ProviderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.id() == needle)
            .ok_or_else(|| Error::ProviderNotFound(s.to_string()))
    }
}
