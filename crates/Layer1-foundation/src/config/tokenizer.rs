//! Tokenizer Config - 토큰 계산 계층 설정
//!
//! 서킷 브레이커, 타임아웃, 추정 비율, 스트리밍 청크 정책을 관리합니다.
//! 로드 순서: 기본값 → 글로벌 → 프로젝트 → 환경변수

use crate::storage::JsonStore;
use crate::strings::{ENV_BREAKER_COOLDOWN_MS, ENV_BREAKER_THRESHOLD, ENV_COUNT_TIMEOUT_MS};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// 설정 파일명
pub const TOKENIZER_CONFIG_FILE: &str = "tokenizer.json";

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

// ============================================================================
// Tokenizer Config (통합)
// ============================================================================

/// 토큰 계산 계층 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenizerConfig {
    /// 서킷 브레이커 설정
    #[serde(default)]
    pub breaker: BreakerSettings,

    /// 호출당 토큰 계산 제한 시간 (밀리초)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// 추정 폴백 비율 (바이트당 토큰)
    #[serde(default = "default_estimator_ratio")]
    pub estimator_ratio: f64,

    /// 스트리밍 청크 정책
    #[serde(default)]
    pub streaming: StreamingSettings,

    /// 성능 메트릭 수집 여부
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            breaker: BreakerSettings::default(),
            timeout_ms: default_timeout_ms(),
            estimator_ratio: default_estimator_ratio(),
            streaming: StreamingSettings::default(),
            metrics_enabled: true,
        }
    }
}

impl TokenizerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load / Save
    // ========================================================================

    /// 글로벌 + 프로젝트 + 환경변수 병합 로드
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        // 1. 글로벌 설정
        if let Ok(global) = JsonStore::global() {
            if let Some(global_config) = global.load_optional::<Self>(TOKENIZER_CONFIG_FILE)? {
                config.merge(global_config);
            }
        }

        // 2. 프로젝트 설정
        if let Ok(project) = JsonStore::current_project() {
            if let Some(project_config) = project.load_optional::<Self>(TOKENIZER_CONFIG_FILE)? {
                config.merge(project_config);
            }
        }

        // 3. 환경변수
        config.apply_env()?;
        config.validate()?;

        debug!(
            threshold = config.breaker.failure_threshold,
            cooldown_ms = config.breaker.cooldown_ms,
            timeout_ms = config.timeout_ms,
            "tokenizer config loaded"
        );
        Ok(config)
    }

    /// 지정한 저장소에서만 로드 (테스트/임베딩용)
    pub fn load_from(store: &JsonStore) -> Result<Self> {
        let mut config = Self::new();
        if let Some(stored) = store.load_optional::<Self>(TOKENIZER_CONFIG_FILE)? {
            config.merge(stored);
        }
        config.validate()?;
        Ok(config)
    }

    /// 저장소에 저장
    pub fn save_to(&self, store: &JsonStore) -> Result<()> {
        store.save(TOKENIZER_CONFIG_FILE, self)
    }

    /// 기본값과 다른 값만 덮어쓰기
    pub fn merge(&mut self, other: TokenizerConfig) {
        if other.timeout_ms != default_timeout_ms() {
            self.timeout_ms = other.timeout_ms;
        }
        if other.estimator_ratio != default_estimator_ratio() {
            self.estimator_ratio = other.estimator_ratio;
        }
        if !other.metrics_enabled {
            self.metrics_enabled = false;
        }
        self.breaker.merge(other.breaker);
        self.streaming.merge(other.streaming);
    }

    /// 프로세스 환경변수 적용
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// 조회 함수로 환경변수 적용
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_BREAKER_THRESHOLD) {
            self.breaker.failure_threshold = parse_env(ENV_BREAKER_THRESHOLD, &value)?;
        }
        if let Some(value) = lookup(ENV_BREAKER_COOLDOWN_MS) {
            self.breaker.cooldown_ms = parse_env(ENV_BREAKER_COOLDOWN_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_COUNT_TIMEOUT_MS) {
            self.timeout_ms = parse_env(ENV_COUNT_TIMEOUT_MS, &value)?;
        }
        Ok(())
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        if self.breaker.failure_threshold == 0 {
            return Err(Error::Validation(
                "breaker.failureThreshold must be at least 1".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(Error::Validation("timeoutMs must be positive".to_string()));
        }
        if !(self.estimator_ratio.is_finite() && self.estimator_ratio > 0.0) {
            return Err(Error::Validation(format!(
                "estimatorRatio must be positive, got {}",
                self.estimator_ratio
            )));
        }
        self.streaming.validate()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    // ========================================================================
    // Builder
    // ========================================================================

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_breaker(mut self, failure_threshold: u32, cooldown: Duration) -> Self {
        self.breaker = BreakerSettings {
            failure_threshold,
            cooldown_ms: cooldown.as_millis() as u64,
        };
        self
    }

    pub fn with_estimator_ratio(mut self, ratio: f64) -> Self {
        self.estimator_ratio = ratio;
        self
    }

    pub fn without_metrics(mut self) -> Self {
        self.metrics_enabled = false;
        self
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} has invalid value: {:?}", key, value)))
}

// ============================================================================
// Breaker Settings
// ============================================================================

/// 서킷 브레이커 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSettings {
    /// Open 전환까지의 연속 실패 횟수
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Open 상태 유지 시간 (밀리초)
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

impl BreakerSettings {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    fn merge(&mut self, other: BreakerSettings) {
        if other.failure_threshold != default_failure_threshold() {
            self.failure_threshold = other.failure_threshold;
        }
        if other.cooldown_ms != default_cooldown_ms() {
            self.cooldown_ms = other.cooldown_ms;
        }
    }
}

// ============================================================================
// Streaming Settings
// ============================================================================

/// 스트리밍 청크 크기 정책
///
/// 입력 크기 < `medium_threshold_bytes` → `small_chunk_bytes`,
/// < `large_threshold_bytes` → `medium_chunk_bytes`, 그 외 `large_chunk_bytes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamingSettings {
    #[serde(default = "default_small_chunk")]
    pub small_chunk_bytes: usize,
    #[serde(default = "default_medium_chunk")]
    pub medium_chunk_bytes: usize,
    #[serde(default = "default_large_chunk")]
    pub large_chunk_bytes: usize,
    #[serde(default = "default_medium_threshold")]
    pub medium_threshold_bytes: u64,
    #[serde(default = "default_large_threshold")]
    pub large_threshold_bytes: u64,
}

impl Default for StreamingSettings {
    fn default() -> Self {
        Self {
            small_chunk_bytes: default_small_chunk(),
            medium_chunk_bytes: default_medium_chunk(),
            large_chunk_bytes: default_large_chunk(),
            medium_threshold_bytes: default_medium_threshold(),
            large_threshold_bytes: default_large_threshold(),
        }
    }
}

impl StreamingSettings {
    fn merge(&mut self, other: StreamingSettings) {
        let defaults = StreamingSettings::default();
        if other.small_chunk_bytes != defaults.small_chunk_bytes {
            self.small_chunk_bytes = other.small_chunk_bytes;
        }
        if other.medium_chunk_bytes != defaults.medium_chunk_bytes {
            self.medium_chunk_bytes = other.medium_chunk_bytes;
        }
        if other.large_chunk_bytes != defaults.large_chunk_bytes {
            self.large_chunk_bytes = other.large_chunk_bytes;
        }
        if other.medium_threshold_bytes != defaults.medium_threshold_bytes {
            self.medium_threshold_bytes = other.medium_threshold_bytes;
        }
        if other.large_threshold_bytes != defaults.large_threshold_bytes {
            self.large_threshold_bytes = other.large_threshold_bytes;
        }
    }

    fn validate(&self) -> Result<()> {
        if self.small_chunk_bytes == 0 || self.medium_chunk_bytes == 0 || self.large_chunk_bytes == 0
        {
            return Err(Error::Validation(
                "streaming chunk sizes must be positive".to_string(),
            ));
        }
        if self.medium_threshold_bytes >= self.large_threshold_bytes {
            return Err(Error::Validation(format!(
                "streaming thresholds must increase: {} >= {}",
                self.medium_threshold_bytes, self.large_threshold_bytes
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Defaults
// ============================================================================

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_estimator_ratio() -> f64 {
    0.75
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_cooldown_ms() -> u64 {
    30_000
}

fn default_small_chunk() -> usize {
    8 * KIB as usize
}

fn default_medium_chunk() -> usize {
    32 * KIB as usize
}

fn default_large_chunk() -> usize {
    64 * KIB as usize
}

fn default_medium_threshold() -> u64 {
    5 * MIB
}

fn default_large_threshold() -> u64 {
    20 * MIB
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = TokenizerConfig::new();
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.cooldown(), Duration::from_secs(30));
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.estimator_ratio, 0.75);
        assert_eq!(config.streaming.small_chunk_bytes, 8 * 1024);
        assert_eq!(config.streaming.large_threshold_bytes, 20 * 1024 * 1024);
        assert!(config.metrics_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TokenizerConfig =
            serde_json::from_str(r#"{ "breaker": { "failureThreshold": 3 } }"#).unwrap();
        assert_eq!(config.breaker.failure_threshold, 3);
        assert_eq!(config.breaker.cooldown_ms, 30_000);
        assert_eq!(config.timeout_ms, 10_000);
    }

    #[test]
    fn test_config_merge() {
        let mut base = TokenizerConfig::new().with_timeout(Duration::from_millis(500));

        let overlay = TokenizerConfig::new()
            .with_breaker(2, Duration::from_secs(5))
            .without_metrics();

        base.merge(overlay);

        assert_eq!(base.timeout_ms, 500);
        assert_eq!(base.breaker.failure_threshold, 2);
        assert_eq!(base.breaker.cooldown_ms, 5_000);
        assert!(!base.metrics_enabled);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_BREAKER_THRESHOLD, "7"),
            (ENV_COUNT_TIMEOUT_MS, " 250 "),
        ]
        .into_iter()
        .collect();

        let mut config = TokenizerConfig::new();
        config
            .apply_env_with(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.breaker.failure_threshold, 7);
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.breaker.cooldown_ms, 30_000);
    }

    #[test]
    fn test_env_invalid_value() {
        let mut config = TokenizerConfig::new();
        let err = config
            .apply_env_with(|key| (key == ENV_BREAKER_COOLDOWN_MS).then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validation() {
        assert!(TokenizerConfig::new()
            .with_breaker(0, Duration::from_secs(1))
            .validate()
            .is_err());
        assert!(TokenizerConfig::new()
            .with_estimator_ratio(0.0)
            .validate()
            .is_err());

        let mut config = TokenizerConfig::new();
        config.streaming.medium_threshold_bytes = config.streaming.large_threshold_bytes;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_from_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::project(dir.path());

        let config = TokenizerConfig::new().with_breaker(3, Duration::from_millis(1_500));
        config.save_to(&store).unwrap();

        let loaded = TokenizerConfig::load_from(&store).unwrap();
        assert_eq!(loaded, config);
    }
}
