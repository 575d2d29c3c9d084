//! Model Catalog - LLM 모델 메타데이터 조회
//!
//! 토큰 계산 계층은 카탈로그를 "모델 이름 → 프로바이더" 조회에만 사용합니다.
//! - 컨텍스트 윈도우 크기
//! - 최대 출력 토큰
//! - 소속 프로바이더
//!
//! 카탈로그 자체는 읽기 전용이며, 외부 구현은 [`ModelCatalog`] 트레이트로 주입합니다.

use crate::registry::ProviderType;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// 전역 기본 카탈로그
static MODEL_REGISTRY: OnceLock<ModelRegistry> = OnceLock::new();

/// 기본 카탈로그 접근
pub fn registry() -> &'static ModelRegistry {
    MODEL_REGISTRY.get_or_init(ModelRegistry::with_defaults)
}

/// 모델 카탈로그 (외부 협력자)
///
/// 조회 실패는 `Error::ModelNotFound`로 돌려주며, 호출 측은 이를
/// "알 수 없는 프로바이더"로 취급합니다.
pub trait ModelCatalog: Send + Sync {
    /// 모델 메타데이터 조회
    fn model_info(&self, name: &str) -> Result<ModelInfo>;

    /// 모델이 속한 프로바이더 조회
    fn provider_of(&self, name: &str) -> Result<ProviderType> {
        self.model_info(name).map(|info| info.provider)
    }
}

/// 모델 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelInfo {
    /// 모델 ID (API에서 사용하는 ID)
    pub id: String,
    /// 표시 이름
    pub display_name: String,
    /// Provider 타입
    pub provider: ProviderType,
    /// 컨텍스트 윈도우 크기 (토큰)
    pub context_window: u32,
    /// 최대 출력 토큰
    pub max_output_tokens: u32,
    /// Deprecated 여부
    pub deprecated: bool,
}

impl ModelInfo {
    pub fn new(id: impl Into<String>, provider: ProviderType) -> Self {
        Self {
            id: id.into(),
            display_name: String::new(),
            provider,
            context_window: 128_000,
            max_output_tokens: 4_096,
            deprecated: false,
        }
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn context_window(mut self, tokens: u32) -> Self {
        self.context_window = tokens;
        self
    }

    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = tokens;
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// 출력 예약분을 제외한 입력 가능 토큰 수
    pub fn input_budget(&self) -> u32 {
        self.context_window.saturating_sub(self.max_output_tokens)
    }
}

/// 모델 레지스트리 (정적 카탈로그)
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: HashMap<String, ModelInfo>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self {
            models: HashMap::new(),
        }
    }

    /// 기본 모델이 등록된 레지스트리
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_defaults();
        registry
    }

    /// 모델 등록
    pub fn register(&mut self, model: ModelInfo) {
        self.models.insert(model.id.clone(), model);
    }

    /// 모델 조회
    pub fn get(&self, model_id: &str) -> Option<&ModelInfo> {
        self.models.get(model_id)
    }

    /// Provider별 모델 목록
    pub fn by_provider(&self, provider: ProviderType) -> Vec<&ModelInfo> {
        self.models
            .values()
            .filter(|m| m.provider == provider && !m.deprecated)
            .collect()
    }

    /// 모든 모델 ID 목록
    pub fn model_ids(&self) -> Vec<&str> {
        self.models.keys().map(|s| s.as_str()).collect()
    }

    /// 기본 모델 등록 (주요 Provider들의 모델)
    pub fn register_defaults(&mut self) {
        // ================================================================
        // OpenAI Models (byte-pair)
        // ================================================================
        self.register(
            ModelInfo::new("gpt-4o", ProviderType::Openai)
                .display_name("GPT-4o")
                .context_window(128_000)
                .max_output_tokens(16_384),
        );
        self.register(
            ModelInfo::new("gpt-4o-mini", ProviderType::Openai)
                .display_name("GPT-4o Mini")
                .context_window(128_000)
                .max_output_tokens(16_384),
        );
        self.register(
            ModelInfo::new("gpt-4.1", ProviderType::Openai)
                .display_name("GPT-4.1")
                .context_window(1_047_576)
                .max_output_tokens(32_768),
        );
        self.register(
            ModelInfo::new("o1", ProviderType::Openai)
                .display_name("o1")
                .context_window(200_000)
                .max_output_tokens(100_000),
        );
        self.register(
            ModelInfo::new("o3-mini", ProviderType::Openai)
                .display_name("o3-mini")
                .context_window(200_000)
                .max_output_tokens(100_000),
        );
        self.register(
            ModelInfo::new("gpt-4-turbo", ProviderType::Openai)
                .display_name("GPT-4 Turbo")
                .context_window(128_000)
                .max_output_tokens(4_096),
        );
        self.register(
            ModelInfo::new("gpt-3.5-turbo", ProviderType::Openai)
                .display_name("GPT-3.5 Turbo")
                .context_window(16_385)
                .max_output_tokens(4_096)
                .deprecated(),
        );

        // ================================================================
        // Google Models (subword)
        // ================================================================
        self.register(
            ModelInfo::new("gemini-2.0-flash", ProviderType::Gemini)
                .display_name("Gemini 2.0 Flash")
                .context_window(1_000_000)
                .max_output_tokens(8_192),
        );
        self.register(
            ModelInfo::new("gemini-1.5-pro", ProviderType::Gemini)
                .display_name("Gemini 1.5 Pro")
                .context_window(2_000_000)
                .max_output_tokens(8_192),
        );
        self.register(
            ModelInfo::new("gemini-2.5-pro", ProviderType::Gemini)
                .display_name("Gemini 2.5 Pro")
                .context_window(1_048_576)
                .max_output_tokens(65_536),
        );
        self.register(
            ModelInfo::new("gemma-3-27b-it", ProviderType::Gemini)
                .display_name("Gemma 3 27B")
                .context_window(128_000)
                .max_output_tokens(8_192),
        );

        // ================================================================
        // OpenRouter Models (normalized)
        // ================================================================
        self.register(
            ModelInfo::new("openrouter/auto", ProviderType::Openrouter)
                .display_name("OpenRouter Auto")
                .context_window(200_000)
                .max_output_tokens(16_384),
        );
        self.register(
            ModelInfo::new("anthropic/claude-sonnet-4", ProviderType::Openrouter)
                .display_name("Claude Sonnet 4 (OpenRouter)")
                .context_window(200_000)
                .max_output_tokens(16_000),
        );
        self.register(
            ModelInfo::new("meta-llama/llama-3.3-70b-instruct", ProviderType::Openrouter)
                .display_name("Llama 3.3 70B (OpenRouter)")
                .context_window(131_072)
                .max_output_tokens(16_384),
        );

        // ================================================================
        // 토크나이저 미지원 (추정 폴백)
        // ================================================================
        self.register(
            ModelInfo::new("claude-sonnet-4-20250514", ProviderType::Anthropic)
                .display_name("Claude Sonnet 4")
                .context_window(200_000)
                .max_output_tokens(16_000),
        );
        self.register(
            ModelInfo::new("claude-3-5-haiku-20241022", ProviderType::Anthropic)
                .display_name("Claude 3.5 Haiku")
                .context_window(200_000)
                .max_output_tokens(8_192),
        );
        self.register(
            ModelInfo::new("llama-3.3-70b-versatile", ProviderType::Groq)
                .display_name("Llama 3.3 70B (Groq)")
                .context_window(128_000)
                .max_output_tokens(32_768),
        );
        self.register(
            ModelInfo::new("llama3", ProviderType::Ollama)
                .display_name("Llama 3 (Local)")
                .context_window(8_192)
                .max_output_tokens(4_096),
        );
    }
}

impl ModelCatalog for ModelRegistry {
    fn model_info(&self, name: &str) -> Result<ModelInfo> {
        self.get(name)
            .cloned()
            .ok_or_else(|| Error::ModelNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_registry() {
        let registry = registry();

        let gpt = registry.get("gpt-4o").unwrap();
        assert_eq!(gpt.provider, ProviderType::Openai);
        assert_eq!(gpt.context_window, 128_000);
    }

    #[test]
    fn test_catalog_lookup() {
        let registry = ModelRegistry::with_defaults();

        assert_eq!(
            registry.provider_of("gemma-3-27b-it").unwrap(),
            ProviderType::Gemini
        );
        assert_eq!(
            registry.provider_of("anthropic/claude-sonnet-4").unwrap(),
            ProviderType::Openrouter
        );

        let err = registry.model_info("does-not-exist").unwrap_err();
        assert!(err.is_lookup_failure());
    }

    #[test]
    fn test_filter_by_provider() {
        let registry = registry();

        let openai = registry.by_provider(ProviderType::Openai);
        assert!(!openai.is_empty());
        for model in openai {
            assert_eq!(model.provider, ProviderType::Openai);
            assert!(!model.deprecated);
        }
    }

    #[test]
    fn test_input_budget() {
        let info = ModelInfo::new("x", ProviderType::Openai)
            .context_window(1_000)
            .max_output_tokens(1_500);
        assert_eq!(info.input_budget(), 0);
    }
}
