//! Registry - 프로바이더/모델 조회
//!
//! - `provider/` - LLM Provider 식별자
//! - `model/` - 모델 메타데이터 카탈로그

pub mod model;
pub mod provider;

// Provider
pub use provider::ProviderType;

// Model
pub use model::{registry as model_registry, ModelCatalog, ModelInfo, ModelRegistry};
