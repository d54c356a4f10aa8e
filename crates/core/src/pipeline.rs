//! 파이프라인 trait — 모듈 확장 포인트 정의
//!
//! 엔진은 외부 협력자를 다음 trait으로만 다룹니다.
//!
//! - [`CommentView`]: 댓글 레코드의 형태 (식별자 추출 전략의 입력)
//! - [`Effector`]: 실제 액션을 수행하는 외부 장치
//! - [`StateStore`]: 변경 알림을 제공하는 비동기 키-값 저장소
//! - [`Pipeline`]: 시작/정지/헬스 체크 생명주기

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use tokio::sync::broadcast;

use crate::error::{DownvoterError, StorageError};
use crate::event::StorageChange;
use crate::types::{ElementId, StorageKey};

/// 저장소 키별 값 묶음 (부분 읽기/쓰기 단위)
pub type StateSnapshot = BTreeMap<StorageKey, serde_json::Value>;

/// 모듈 헬스 상태
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// 정상
    Healthy,
    /// 동작하지만 일부 기능 저하
    Degraded(String),
    /// 비정상
    Unhealthy(String),
}

impl HealthStatus {
    /// 정상 여부
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy)
    }

    /// 비정상 여부
    pub fn is_unhealthy(&self) -> bool {
        matches!(self, Self::Unhealthy(_))
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Healthy => write!(f, "healthy"),
            Self::Degraded(reason) => write!(f, "degraded: {reason}"),
            Self::Unhealthy(reason) => write!(f, "unhealthy: {reason}"),
        }
    }
}

/// 시작/정지 생명주기를 가진 모듈
pub trait Pipeline: Send {
    /// 모듈을 시작합니다.
    fn start(&mut self) -> impl Future<Output = Result<(), DownvoterError>> + Send;

    /// 모듈을 정지합니다.
    fn stop(&mut self) -> impl Future<Output = Result<(), DownvoterError>> + Send;

    /// 현재 헬스 상태를 반환합니다.
    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send;
}

/// 댓글 레코드의 형태
///
/// 식별자 추출기는 렌더링 기술과 무관하게 이 trait만 봅니다.
/// 값을 얻을 수 없는 필드는 `None` 또는 빈 문자열을 반환합니다.
pub trait CommentView {
    /// 컨테이너 요소의 식별자 (예: `post-123`)
    fn container_id(&self) -> Option<&str>;

    /// 중첩된 메시지 요소의 식별자들 (예: `post-message-123`), 문서 순서
    fn message_element_ids(&self) -> Vec<&str>;

    /// 작성자 표시 이름 (앞뒤 공백 포함 가능)
    fn display_name(&self) -> &str;

    /// 프로필 링크의 명시적 username 속성
    fn profile_username_attr(&self) -> Option<&str>;

    /// 프로필 링크 경로 (예: `/by/bobby/`)
    fn profile_link_href(&self) -> Option<&str>;

    /// 본문 텍스트
    fn body_text(&self) -> &str;
}

/// 실제 액션(비추천)을 수행하는 외부 장치
///
/// `C`는 발견된 댓글의 형태입니다. 호출은 한 번 실행하고 결과를 기다리지 않습니다.
pub trait Effector<C: ?Sized>: Send + Sync {
    /// 요소에서 찾은 액션 컨트롤 핸들
    type Handle;

    /// 요소에서 액션 컨트롤을 찾습니다.
    fn locate(&self, element: ElementId, comment: &C) -> Option<Self::Handle>;

    /// 액션이 이미 적용되어 있는지 확인합니다.
    fn is_already_applied(&self, handle: &Self::Handle) -> bool;

    /// 액션을 실행합니다.
    fn invoke(&self, handle: &Self::Handle);
}

/// 변경 알림을 제공하는 비동기 키-값 저장소
///
/// 개별 호출은 저장소가 직렬화하지만, 여러 호출에 걸친 순서는 보장하지 않습니다.
pub trait StateStore: Send + Sync + 'static {
    /// 알림에 포함되는 네임스페이스
    fn namespace(&self) -> &str;

    /// 주어진 키들의 값을 읽습니다. 저장되지 않은 키는 결과에 없습니다.
    fn get(
        &self,
        keys: &[StorageKey],
    ) -> impl Future<Output = Result<StateSnapshot, StorageError>> + Send;

    /// 주어진 키들의 값을 한 번에 기록합니다.
    fn set(&self, values: StateSnapshot) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// 변경 알림 스트림을 구독합니다.
    fn subscribe(&self) -> broadcast::Receiver<StorageChange>;
}
