//! 식별자 추출기 -- 댓글 형태에서 안정적인 ID와 작성자/본문 서명을 도출합니다.
//!
//! 입력은 [`CommentView`] trait만 보므로 렌더링 기술과 무관합니다.
//!
//! # 외부 ID 우선순위
//! 1. 컨테이너 ID가 `post-<digits>` 형태이면 `<digits>`
//! 2. 메시지 요소 ID가 `post-message-<digits>` 형태이면 `<digits>`
//! 3. 둘 다 없으면 `None` (중복 제거 불가, 에러 아님)
//!
//! # 프로필 핸들 우선순위
//! 1. 비어 있지 않은 명시적 username 속성
//! 2. 프로필 링크 경로 `/by/<handle>/`

use regex::Regex;

use downvoter_core::pipeline::CommentView;
use downvoter_core::types::{CommentRecord, Signature};

use crate::error::EngineError;

/// 메시지 요소 ID 접두어
const MESSAGE_ID_PREFIX: &str = "post-message-";

/// 식별자 추출기
///
/// 생성 시 패턴을 한 번 컴파일하고, 이후 추출은 순수 함수로 동작합니다.
#[derive(Debug, Clone)]
pub struct IdentityExtractor {
    container_pattern: Regex,
    message_pattern: Regex,
    profile_path_pattern: Regex,
}

impl IdentityExtractor {
    /// 새 추출기를 생성합니다.
    pub fn new() -> Result<Self, EngineError> {
        Ok(Self {
            container_pattern: Regex::new(r"^post-(\d+)$")?,
            message_pattern: Regex::new(r"post-message-(\d+)")?,
            profile_path_pattern: Regex::new(r"/by/([^/]+)/?")?,
        })
    }

    /// 댓글에서 [`CommentRecord`]를 추출합니다.
    pub fn extract(&self, view: &impl CommentView) -> CommentRecord {
        CommentRecord {
            external_id: self.external_id(view),
            display_name: view.display_name().trim().to_owned(),
            profile_handle: self.profile_handle(view),
            body_text: view.body_text().to_owned(),
        }
    }

    /// 댓글에서 비교용 서명을 바로 계산합니다.
    pub fn signature(&self, view: &impl CommentView) -> Signature {
        Signature::from_record(&self.extract(view))
    }

    /// 외부 댓글 ID를 추출합니다.
    pub fn external_id(&self, view: &impl CommentView) -> Option<String> {
        if let Some(id) = view
            .container_id()
            .and_then(|id| self.container_pattern.captures(id))
            .and_then(|caps| caps.get(1))
        {
            return Some(id.as_str().to_owned());
        }

        // 첫 번째 메시지 요소만 확인
        let message_id = view
            .message_element_ids()
            .into_iter()
            .find(|id| id.starts_with(MESSAGE_ID_PREFIX))?;

        self.message_pattern
            .captures(message_id)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_owned())
    }

    /// 작성자 프로필 핸들을 추출합니다. 찾지 못하면 빈 문자열입니다.
    pub fn profile_handle(&self, view: &impl CommentView) -> String {
        if let Some(attr) = view.profile_username_attr().filter(|a| !a.is_empty()) {
            return attr.to_owned();
        }

        view.profile_link_href()
            .and_then(|href| self.profile_path_pattern.captures(href))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_owned())
            .unwrap_or_default()
    }
}
