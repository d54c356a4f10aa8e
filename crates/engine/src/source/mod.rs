//! 발견 소스 -- 새로 나타난 댓글을 배치 단위로 전달합니다.
//!
//! 소스는 같은 요소를 두 번 내보내지 않아야 합니다. 요소 단위 중복 제거는
//! 소스의 책임이고, ID 단위 중복 제거는 디스패처의 책임입니다.
//!
//! - [`ChannelSource`]: `tokio::mpsc` 채널로 배치를 받음
//! - [`JsonLinesSource`]: JSON 줄 스트림을 배치로 변환

pub mod channel;
pub mod jsonl;

pub use channel::ChannelSource;
pub use jsonl::JsonLinesSource;

use std::future::Future;

use serde::{Deserialize, Serialize};

use downvoter_core::pipeline::CommentView;
use downvoter_core::types::ElementId;

/// 배치 단위 발견 소스
pub trait DiscoverySource: Send {
    /// 다음 배치를 기다립니다. 소스가 끝나면 `None`입니다.
    fn next_batch(&mut self) -> impl Future<Output = Option<Vec<DiscoveredComment>>> + Send;
}

/// 발견된 댓글 요소
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredComment {
    /// 세션 내 요소 식별자
    pub element: ElementId,
    /// 렌더링된 댓글
    pub comment: RawComment,
}

impl DiscoveredComment {
    /// 새 발견 항목을 생성합니다.
    pub fn new(element: ElementId, comment: RawComment) -> Self {
        Self { element, comment }
    }
}

/// 직렬화 가능한 댓글 레코드
///
/// 렌더링된 댓글 요소의 속성을 그대로 옮긴 형태입니다.
///
/// ```json
/// {"id": "post-42", "author": "Bob", "profileHref": "/by/bobby/",
///  "body": "check this out", "vote": {"pressed": false, "classes": []}}
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawComment {
    /// 컨테이너 요소 ID (예: `post-42`)
    #[serde(default)]
    pub id: Option<String>,
    /// 중첩 메시지 요소 ID (예: `post-message-42`)
    #[serde(default)]
    pub message_ids: Vec<String>,
    /// 작성자 표시 이름
    #[serde(default)]
    pub author: String,
    /// 프로필 링크의 username 속성
    #[serde(default)]
    pub username: Option<String>,
    /// 프로필 링크 경로
    #[serde(default)]
    pub profile_href: Option<String>,
    /// 본문 텍스트
    #[serde(default)]
    pub body: String,
    /// 비추천 컨트롤 상태 (없으면 컨트롤을 찾지 못한 것)
    #[serde(default)]
    pub vote: Option<VoteControl>,
}

/// 비추천 컨트롤의 관측 상태
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteControl {
    /// 컨트롤이 렌더링되어 있는지
    #[serde(default = "default_present")]
    pub present: bool,
    /// `aria-pressed` 상태
    #[serde(default)]
    pub pressed: bool,
    /// CSS 클래스 목록
    #[serde(default)]
    pub classes: Vec<String>,
}

fn default_present() -> bool {
    true
}

impl Default for VoteControl {
    fn default() -> Self {
        Self {
            present: true,
            pressed: false,
            classes: Vec::new(),
        }
    }
}

impl CommentView for RawComment {
    fn container_id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn message_element_ids(&self) -> Vec<&str> {
        self.message_ids.iter().map(String::as_str).collect()
    }

    fn display_name(&self) -> &str {
        &self.author
    }

    fn profile_username_attr(&self) -> Option<&str> {
        self.username.as_deref()
    }

    fn profile_link_href(&self) -> Option<&str> {
        self.profile_href.as_deref()
    }

    fn body_text(&self) -> &str {
        &self.body
    }
}
