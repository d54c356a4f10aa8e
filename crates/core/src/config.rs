//! 설정 관리 — downvoter.toml 파싱 및 런타임 설정
//!
//! [`DownvoterConfig`]는 모든 모듈의 설정을 담는 최상위 구조체입니다.
//!
//! # 설정 로딩 우선순위
//! 1. CLI 인자 (최고 우선)
//! 2. 환경변수 (`DOWNVOTER_ENGINE_LEDGER_CAPACITY=1000` 형식)
//! 3. 설정 파일 (`downvoter.toml`)
//! 4. 기본값 (`Default` 구현)
//!
//! # 사용 예시
//! ```no_run
//! # async fn example() -> Result<(), downvoter_core::error::DownvoterError> {
//! use downvoter_core::config::DownvoterConfig;
//!
//! // 파일에서 로드 + 환경변수 오버라이드
//! let config = DownvoterConfig::load("downvoter.toml").await?;
//!
//! // TOML 문자열에서 직접 파싱
//! let config = DownvoterConfig::parse("[general]\nlog_level = \"debug\"")?;
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{ConfigError, DownvoterError};
use crate::event::DEFAULT_NAMESPACE;

/// 기본 원장 용량
pub const DEFAULT_LEDGER_CAPACITY: usize = 5000;

/// 상태 파일 이름 (`data_dir` 기준)
pub const STATE_FILE_NAME: &str = "state.json";

/// Downvoter 통합 설정
///
/// `downvoter.toml` 파일의 최상위 구조를 나타냅니다.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DownvoterConfig {
    /// 일반 설정
    #[serde(default)]
    pub general: GeneralConfig,
    /// 영속 저장소 설정
    #[serde(default)]
    pub storage: StorageConfig,
    /// 엔진 설정
    #[serde(default)]
    pub engine: EngineSection,
}

impl DownvoterConfig {
    /// TOML 파일에서 설정을 로드하고 환경변수 오버라이드를 적용합니다.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, DownvoterError> {
        let mut config = Self::from_file(path).await?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// TOML 파일에서 설정을 로드합니다 (환경변수 오버라이드 없음).
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, DownvoterError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                DownvoterError::Config(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })
            } else {
                DownvoterError::Io(e)
            }
        })?;
        let config = Self::parse(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// TOML 문자열에서 설정을 파싱합니다.
    pub fn parse(toml_str: &str) -> Result<Self, DownvoterError> {
        toml::from_str(toml_str).map_err(|e| {
            DownvoterError::Config(ConfigError::ParseFailed {
                reason: e.to_string(),
            })
        })
    }

    /// 환경변수로 설정값을 오버라이드합니다.
    ///
    /// 환경변수 네이밍 규칙: `DOWNVOTER_{SECTION}_{FIELD}`
    pub fn apply_env_overrides(&mut self) {
        // General
        override_string(&mut self.general.log_level, "DOWNVOTER_GENERAL_LOG_LEVEL");
        override_string(&mut self.general.log_format, "DOWNVOTER_GENERAL_LOG_FORMAT");
        override_string(&mut self.general.data_dir, "DOWNVOTER_GENERAL_DATA_DIR");

        // Storage
        override_string(&mut self.storage.backend, "DOWNVOTER_STORAGE_BACKEND");
        override_string(&mut self.storage.path, "DOWNVOTER_STORAGE_PATH");
        override_string(&mut self.storage.namespace, "DOWNVOTER_STORAGE_NAMESPACE");

        // Engine
        override_usize(
            &mut self.engine.ledger_capacity,
            "DOWNVOTER_ENGINE_LEDGER_CAPACITY",
        );
        override_usize(
            &mut self.engine.discovery_channel_capacity,
            "DOWNVOTER_ENGINE_DISCOVERY_CHANNEL_CAPACITY",
        );
        override_usize(
            &mut self.engine.event_channel_capacity,
            "DOWNVOTER_ENGINE_EVENT_CHANNEL_CAPACITY",
        );
    }

    /// 설정값의 유효성을 검증합니다.
    pub fn validate(&self) -> Result<(), DownvoterError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.general.log_level.as_str()) {
            return Err(invalid(
                "general.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.general.log_format.as_str()) {
            return Err(invalid(
                "general.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        let valid_backends = ["file", "memory"];
        if !valid_backends.contains(&self.storage.backend.as_str()) {
            return Err(invalid(
                "storage.backend",
                format!("must be one of: {}", valid_backends.join(", ")),
            ));
        }

        if self.storage.backend == "file"
            && self.storage.path.trim().is_empty()
            && self.general.data_dir.trim().is_empty()
        {
            return Err(invalid(
                "storage.path",
                "file backend needs storage.path or general.data_dir".to_owned(),
            ));
        }

        if self.storage.namespace.trim().is_empty() {
            return Err(invalid("storage.namespace", "must not be empty".to_owned()));
        }

        if self.engine.ledger_capacity == 0 {
            return Err(invalid(
                "engine.ledger_capacity",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.engine.discovery_channel_capacity == 0 {
            return Err(invalid(
                "engine.discovery_channel_capacity",
                "must be greater than 0".to_owned(),
            ));
        }

        if self.engine.event_channel_capacity == 0 {
            return Err(invalid(
                "engine.event_channel_capacity",
                "must be greater than 0".to_owned(),
            ));
        }

        Ok(())
    }

    /// 파일 백엔드가 사용할 상태 파일 경로
    ///
    /// `storage.path`가 비어 있으면 `<data_dir>/state.json`입니다.
    pub fn state_path(&self) -> PathBuf {
        if self.storage.path.trim().is_empty() {
            Path::new(&self.general.data_dir).join(STATE_FILE_NAME)
        } else {
            PathBuf::from(&self.storage.path)
        }
    }
}

fn invalid(field: &str, reason: String) -> DownvoterError {
    ConfigError::InvalidValue {
        field: field.to_owned(),
        reason,
    }
    .into()
}

/// 일반 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// 로그 레벨 (trace, debug, info, warn, error)
    pub log_level: String,
    /// 로그 형식 (json, pretty)
    pub log_format: String,
    /// 데이터 디렉토리
    pub data_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_owned(),
            log_format: "pretty".to_owned(),
            data_dir: ".downvoter".to_owned(),
        }
    }
}

/// 영속 저장소 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 백엔드 (file, memory)
    pub backend: String,
    /// 상태 파일 경로 (비어 있으면 `<data_dir>/state.json`)
    pub path: String,
    /// 변경 알림 네임스페이스
    pub namespace: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "file".to_owned(),
            path: String::new(),
            namespace: DEFAULT_NAMESPACE.to_owned(),
        }
    }
}

/// 엔진 설정 섹션
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// 중복 제거 원장 용량 (초과 시 오래된 ID부터 제거)
    pub ledger_capacity: usize,
    /// 발견 배치 채널 용량
    pub discovery_channel_capacity: usize,
    /// 액션 이벤트 채널 용량
    pub event_channel_capacity: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            ledger_capacity: DEFAULT_LEDGER_CAPACITY,
            discovery_channel_capacity: 256,
            event_channel_capacity: 256,
        }
    }
}

// --- 환경변수 오버라이드 헬퍼 ---

fn override_string(target: &mut String, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        *target = val;
    }
}

fn override_usize(target: &mut usize, env_key: &str) {
    if let Ok(val) = std::env::var(env_key) {
        match val.parse::<usize>() {
            Ok(parsed) => *target = parsed,
            Err(_) => warn!(
                env_key,
                value = val.as_str(),
                "failed to parse usize from env var, ignoring"
            ),
        }
    }
}
