//! Config - 통합 설정 관리
//!
//! - `tokenizer.rs` - 토큰 계산 계층 설정 (브레이커, 타임아웃, 스트리밍)

mod tokenizer;

pub use tokenizer::{BreakerSettings, StreamingSettings, TokenizerConfig, TOKENIZER_CONFIG_FILE};
