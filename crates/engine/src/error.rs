//! 엔진 에러 타입
//!
//! [`EngineError`]는 엔진 내부에서 발생하는 에러를 표현합니다.
//! `From<EngineError> for DownvoterError` 변환이 구현되어 있어
//! 상위 레이어에서 `?` 연산자로 자연스럽게 전파할 수 있습니다.
//!
//! 댓글 단위 처리 경로는 이 타입을 반환하지 않습니다.
//! 디스패처는 실패를 로그로 남기고 다음 댓글로 넘어갑니다.

use downvoter_core::error::{ConfigError, DownvoterError, PipelineError, RuleError, StorageError};

/// 엔진 도메인 에러
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// username이 없는 규칙
    #[error("malformed rule: {0}")]
    MalformedRule(String),

    /// 같은 username의 규칙이 이미 존재함
    #[error("rule for '{username}' already exists")]
    RuleConflict {
        /// 충돌한 username
        username: String,
    },

    /// 규칙 파일 로딩 실패
    #[error("rule load error: {path}: {reason}")]
    RuleLoad {
        /// 규칙 파일 경로
        path: String,
        /// 로딩 실패 사유
        reason: String,
    },

    /// 저장된 값을 해석할 수 없음
    #[error("decode error for key '{key}': {reason}")]
    Decode {
        /// 저장소 키
        key: String,
        /// 실패 사유
        reason: String,
    },

    /// 설정 에러
    #[error("config error: {field}: {reason}")]
    Config {
        /// 설정 필드명
        field: String,
        /// 에러 사유
        reason: String,
    },

    /// 발견 소스 에러
    #[error("discovery error: {0}")]
    Discovery(String),

    /// 채널 통신 에러
    #[error("channel error: {0}")]
    Channel(String),

    /// 저장소 에러
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// 정규식 컴파일 에러
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl From<EngineError> for DownvoterError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::MalformedRule(reason) => RuleError::Malformed(reason).into(),
            EngineError::RuleConflict { username } => RuleError::Conflict { username }.into(),
            EngineError::Config { field, reason } => {
                ConfigError::InvalidValue { field, reason }.into()
            }
            EngineError::Storage(e) => e.into(),
            EngineError::Io(e) => e.into(),
            EngineError::Channel(reason) => PipelineError::Channel(reason).into(),
            other => PipelineError::InitFailed(other.to_string()).into(),
        }
    }
}
