//! 이벤트 시스템 — 모듈 간 통신의 기본 단위
//!
//! [`EventMetadata`]는 모든 이벤트에 공통으로 포함되는 메타데이터이며,
//! [`Event`] trait은 모든 이벤트 타입이 구현해야 하는 인터페이스입니다.
//!
//! - [`StorageChange`]: 영속 저장소의 외부 변경 알림
//! - [`ActionEvent`]: 디스패처가 댓글 하나에 대해 내린 결정

use std::fmt;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::types::{ElementId, StorageKey};

// --- 모듈명 상수 ---

/// 디스패처 모듈명
pub const MODULE_DISPATCHER: &str = "dispatcher";
/// 저장소 모듈명
pub const MODULE_STORE: &str = "store";

// --- 이벤트 타입 상수 ---

/// 저장소 변경 이벤트 타입
pub const EVENT_TYPE_STORAGE_CHANGE: &str = "storage_change";
/// 액션 이벤트 타입
pub const EVENT_TYPE_ACTION: &str = "action";

/// 기본 저장소 네임스페이스
pub const DEFAULT_NAMESPACE: &str = "local";

/// 이벤트 메타데이터 — 모든 이벤트에 공통으로 포함되는 추적 정보
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// 이벤트 발생 시각
    pub timestamp: SystemTime,
    /// 이벤트를 생성한 모듈명 (예: "dispatcher", "store")
    pub source_module: String,
    /// 분산 추적 ID — 같은 흐름의 이벤트를 연결합니다
    pub trace_id: String,
}

impl EventMetadata {
    /// 기존 trace_id를 사용하여 새 메타데이터를 생성합니다.
    pub fn new(source_module: impl Into<String>, trace_id: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: trace_id.into(),
        }
    }

    /// 새로운 UUID v4 trace_id를 생성하여 메타데이터를 만듭니다.
    pub fn with_new_trace(source_module: impl Into<String>) -> Self {
        Self {
            timestamp: SystemTime::now(),
            source_module: source_module.into(),
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] source={} trace={}",
            unix_timestamp_str(self.timestamp),
            self.source_module,
            self.trace_id,
        )
    }
}

/// 모든 이벤트가 구현해야 하는 기본 trait
///
/// `Send + Sync + 'static` 바운드로 `tokio` 채널을 통한 전송을 보장합니다.
pub trait Event: Send + Sync + 'static {
    /// 이벤트 고유 ID (UUID v4)
    fn event_id(&self) -> &str;

    /// 이벤트 메타데이터 (timestamp, source_module, trace_id)
    fn metadata(&self) -> &EventMetadata;

    /// 이벤트 타입명 (로깅 및 라우팅에 사용)
    fn event_type(&self) -> &str;
}

/// 저장소 변경 알림
///
/// 설정 화면 등 외부에서 키가 바뀌었을 때 전달됩니다.
/// 값이 `None`이면 키가 삭제된 것입니다.
#[derive(Debug, Clone)]
pub struct StorageChange {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터
    pub metadata: EventMetadata,
    /// 저장소 네임스페이스 (예: "local")
    pub namespace: String,
    /// 변경된 키
    pub key: StorageKey,
    /// 이전 값
    pub old_value: Option<serde_json::Value>,
    /// 새 값
    pub new_value: Option<serde_json::Value>,
}

impl StorageChange {
    /// 새 변경 알림을 생성합니다.
    pub fn new(
        namespace: impl Into<String>,
        key: StorageKey,
        old_value: Option<serde_json::Value>,
        new_value: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_STORE),
            namespace: namespace.into(),
            key,
            old_value,
            new_value,
        }
    }
}

impl Event for StorageChange {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        EVENT_TYPE_STORAGE_CHANGE
    }
}

impl fmt::Display for StorageChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StorageChange[{}] namespace={} key={} deleted={}",
            &self.id[..8.min(self.id.len())],
            self.namespace,
            self.key,
            self.new_value.is_none(),
        )
    }
}

/// 댓글 하나에 대한 디스패처의 최종 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// 이번 세션에서 이미 방문한 요소
    AlreadyVisited,
    /// 원장에 이미 기록된 댓글
    SkippedAlreadyProcessed,
    /// 매칭되는 규칙 없음
    SkippedNoMatch,
    /// 매칭되었으나 액션 컨트롤을 찾지 못함
    EffectorMissing,
    /// 매칭되었으나 액션이 이미 적용되어 있음
    ActionAlreadyTaken,
    /// 액션을 실행함
    ActionConfirmed {
        /// 통계에 기록된 작성자 레이블
        label: String,
    },
}

impl ActionOutcome {
    /// 로그/메트릭용 짧은 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AlreadyVisited => "already_visited",
            Self::SkippedAlreadyProcessed => "skipped_already_processed",
            Self::SkippedNoMatch => "skipped_no_match",
            Self::EffectorMissing => "effector_missing",
            Self::ActionAlreadyTaken => "action_already_taken",
            Self::ActionConfirmed { .. } => "action_confirmed",
        }
    }

    /// 이번 처리에서 실제로 액션이 실행되었는지
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::ActionConfirmed { .. })
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 디스패처 결정 이벤트
///
/// 감사 로그 용도로 선택적 채널에 전송됩니다.
#[derive(Debug, Clone, Serialize)]
pub struct ActionEvent {
    /// 이벤트 고유 ID
    pub id: String,
    /// 이벤트 메타데이터
    #[serde(skip)]
    pub metadata: EventMetadata,
    /// 발견된 요소
    pub element: ElementId,
    /// 외부 댓글 ID
    pub external_id: Option<String>,
    /// 결정 결과
    #[serde(flatten)]
    pub outcome: ActionOutcome,
    /// 매칭된 규칙의 username (매칭이 없으면 None)
    pub rule: Option<String>,
}

impl ActionEvent {
    /// 새로운 trace를 시작하는 액션 이벤트를 생성합니다.
    pub fn new(
        element: ElementId,
        external_id: Option<String>,
        outcome: ActionOutcome,
        rule: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            metadata: EventMetadata::with_new_trace(MODULE_DISPATCHER),
            element,
            external_id,
            outcome,
            rule,
        }
    }
}

impl Event for ActionEvent {
    fn event_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn event_type(&self) -> &str {
        EVENT_TYPE_ACTION
    }
}

impl fmt::Display for ActionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ActionEvent[{}] element={} id={} outcome={}",
            &self.id[..8.min(self.id.len())],
            self.element,
            self.external_id.as_deref().unwrap_or("-"),
            self.outcome,
        )
    }
}

/// SystemTime을 사람이 읽을 수 있는 형태로 변환합니다.
fn unix_timestamp_str(time: SystemTime) -> String {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(duration) => {
            let secs = duration.as_secs();
            format!("{secs}")
        }
        Err(_) => "unknown".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_new_trace_is_uuid() {
        let meta = EventMetadata::with_new_trace(MODULE_DISPATCHER);
        assert_eq!(meta.source_module, "dispatcher");
        assert_eq!(meta.trace_id.len(), 36);
    }

    #[test]
    fn metadata_display_contains_source() {
        let meta = EventMetadata::new(MODULE_STORE, "trace-1");
        let display = meta.to_string();
        assert!(display.contains("source=store"));
        assert!(display.contains("trace=trace-1"));
    }

    #[test]
    fn storage_change_reports_deletion() {
        let change = StorageChange::new(DEFAULT_NAMESPACE, StorageKey::Rules, None, None);
        assert_eq!(change.event_type(), EVENT_TYPE_STORAGE_CHANGE);
        assert!(change.to_string().contains("deleted=true"));
    }

    #[test]
    fn action_event_serializes_flat_outcome() {
        let event = ActionEvent::new(
            ElementId(3),
            Some("42".to_owned()),
            ActionOutcome::ActionConfirmed {
                label: "Bob".to_owned(),
            },
            Some("bob".to_owned()),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["outcome"], "action_confirmed");
        assert_eq!(json["label"], "Bob");
        assert_eq!(json["external_id"], "42");
        assert_eq!(json["element"], 3);
    }

    #[test]
    fn outcome_names_are_snake_case() {
        assert_eq!(ActionOutcome::SkippedNoMatch.as_str(), "skipped_no_match");
        assert!(
            ActionOutcome::ActionConfirmed {
                label: "x".to_owned()
            }
            .is_confirmed()
        );
        assert!(!ActionOutcome::ActionAlreadyTaken.is_confirmed());
    }
}
