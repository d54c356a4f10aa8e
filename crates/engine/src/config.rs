//! 엔진 설정
//!
//! [`EngineConfig`]는 core의 [`DownvoterConfig`]에서 엔진이 쓰는 값만 모은 설정입니다.
//!
//! # 사용 예시
//! ```ignore
//! use downvoter_core::config::DownvoterConfig;
//! use downvoter_engine::config::EngineConfig;
//!
//! let core_config = DownvoterConfig::default();
//! let config = EngineConfig::from_core(&core_config);
//! ```

use serde::{Deserialize, Serialize};

use downvoter_core::config::{DEFAULT_LEDGER_CAPACITY, DownvoterConfig};
use downvoter_core::event::DEFAULT_NAMESPACE;

use crate::error::EngineError;

/// 원장 용량 상한
const MAX_LEDGER_CAPACITY: usize = 1_000_000;
/// 채널 용량 상한
const MAX_CHANNEL_CAPACITY: usize = 100_000;

/// 엔진 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 변경 알림 중 반영할 네임스페이스
    pub namespace: String,
    /// 중복 제거 원장 용량
    pub ledger_capacity: usize,
    /// 발견 배치 채널 용량
    pub discovery_channel_capacity: usize,
    /// 액션 이벤트 채널 용량
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            ledger_capacity: DEFAULT_LEDGER_CAPACITY,
            discovery_channel_capacity: 256,
            event_channel_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// core 설정에서 엔진 설정을 생성합니다.
    pub fn from_core(core: &DownvoterConfig) -> Self {
        Self {
            namespace: core.storage.namespace.clone(),
            ledger_capacity: core.engine.ledger_capacity,
            discovery_channel_capacity: core.engine.discovery_channel_capacity,
            event_channel_capacity: core.engine.event_channel_capacity,
        }
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.namespace.trim().is_empty() {
            return Err(EngineError::Config {
                field: "namespace".to_owned(),
                reason: "must not be empty".to_owned(),
            });
        }

        if self.ledger_capacity == 0 || self.ledger_capacity > MAX_LEDGER_CAPACITY {
            return Err(EngineError::Config {
                field: "ledger_capacity".to_owned(),
                reason: format!("must be 1-{MAX_LEDGER_CAPACITY}"),
            });
        }

        for (field, value) in [
            ("discovery_channel_capacity", self.discovery_channel_capacity),
            ("event_channel_capacity", self.event_channel_capacity),
        ] {
            if value == 0 || value > MAX_CHANNEL_CAPACITY {
                return Err(EngineError::Config {
                    field: field.to_owned(),
                    reason: format!("must be 1-{MAX_CHANNEL_CAPACITY}"),
                });
            }
        }

        Ok(())
    }
}

/// 엔진 설정 빌더
#[derive(Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 네임스페이스를 설정합니다.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    /// 원장 용량을 설정합니다.
    pub fn ledger_capacity(mut self, capacity: usize) -> Self {
        self.config.ledger_capacity = capacity;
        self
    }

    /// 발견 배치 채널 용량을 설정합니다.
    pub fn discovery_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.discovery_channel_capacity = capacity;
        self
    }

    /// 액션 이벤트 채널 용량을 설정합니다.
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.config.event_channel_capacity = capacity;
        self
    }

    /// 설정을 검증하고 `EngineConfig`를 생성합니다.
    pub fn build(self) -> Result<EngineConfig, EngineError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
