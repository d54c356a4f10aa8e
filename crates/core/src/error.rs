//! 에러 타입 — 도메인별 에러 정의
//!
//! 댓글 단위 처리 경로에서 발생하는 에러는 호출자에게 전파되지 않고
//! 로그로만 남습니다. 이 타입들은 설정 로딩, 저장소 접근, 규칙 편집처럼
//! 호출자가 결과를 받아야 하는 경계에서 사용합니다.

/// Downvoter 최상위 에러 타입
#[derive(Debug, thiserror::Error)]
pub enum DownvoterError {
    /// 설정 관련 에러
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// 저장소 에러
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// 규칙 에러
    #[error("rule error: {0}")]
    Rule(#[from] RuleError),

    /// 파이프라인 처리 에러
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// I/O 에러
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 설정 관련 에러
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 설정 파일을 찾을 수 없음
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// 설정 파싱 실패
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// 유효하지 않은 설정 값
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 저장소 에러
///
/// 읽기/쓰기 실패는 모두 PersistenceUnavailable 범주입니다.
/// 호출 측은 마지막으로 알려진 캐시 값으로 계속 동작합니다.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// 저장소에 접근할 수 없음
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// 저장된 값의 직렬화/역직렬화 실패
    #[error("serialization failed for key '{key}': {reason}")]
    Serialization { key: String, reason: String },
}

/// 규칙 에러
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// username이 없거나 비어 있는 규칙
    #[error("malformed rule: {0}")]
    Malformed(String),

    /// 같은 username의 규칙이 이미 존재하며 덮어쓰기가 허용되지 않음
    #[error("rule for '{username}' already exists")]
    Conflict { username: String },
}

/// 파이프라인 처리 에러
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// 이미 실행 중
    #[error("pipeline already running")]
    AlreadyRunning,

    /// 실행 중이 아님
    #[error("pipeline not running")]
    NotRunning,

    /// 파이프라인 초기화 실패
    #[error("pipeline init failed: {0}")]
    InitFailed(String),

    /// 채널 통신 실패
    #[error("channel error: {0}")]
    Channel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_converts_to_top_level() {
        let err: DownvoterError = ConfigError::FileNotFound {
            path: "downvoter.toml".to_owned(),
        }
        .into();
        assert!(matches!(err, DownvoterError::Config(_)));
        assert!(err.to_string().contains("downvoter.toml"));
    }

    #[test]
    fn storage_error_display() {
        let err = StorageError::Serialization {
            key: "stats".to_owned(),
            reason: "expected object".to_owned(),
        };
        let msg = err.to_string();
        assert!(msg.contains("stats"));
        assert!(msg.contains("expected object"));
    }

    #[test]
    fn rule_conflict_names_username() {
        let err: DownvoterError = RuleError::Conflict {
            username: "bob".to_owned(),
        }
        .into();
        assert!(err.to_string().contains("'bob'"));
    }
}
