//! # modelgate-foundation
//!
//! Foundation layer for ModelGate:
//! - Error: 공통 에러 타입
//! - Registry: Provider 식별자, Model 카탈로그
//! - Storage: JsonStore (글로벌/프로젝트 설정)
//! - Config: 토큰 계산 계층 설정 (TokenizerConfig)
//!
//! ## 아키텍처
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  modelgate-tokenizer (Layer2)               │
//! │        │                  │                 │
//! │        ▼                  ▼                 │
//! │  ModelCatalog       TokenizerConfig         │
//! │  (model → provider) (breaker/timeout/chunk) │
//! │                           │                 │
//! │                           ▼                 │
//! │                       JsonStore             │
//! │              (~/.config/modelgate,          │
//! │               ./.modelgate)                 │
//! └─────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod registry;
pub mod storage;
pub mod strings;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Registry
// ============================================================================
pub use registry::{model_registry, ModelCatalog, ModelInfo, ModelRegistry, ProviderType};

// ============================================================================
// Storage
// ============================================================================
pub use storage::JsonStore;

// ============================================================================
// Config
// ============================================================================
pub use config::{BreakerSettings, StreamingSettings, TokenizerConfig, TOKENIZER_CONFIG_FILE};
