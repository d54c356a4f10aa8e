//! 검토 규칙 -- 매칭, 저장소 편집, 파일 가져오기
//!
//! # 규칙 형식
//! ```json
//! {"username": "bob", "keywords": ["spam", "buy now"]}
//! ```
//!
//! - `username`: 표시 이름 또는 프로필 핸들과 대소문자 무시 비교
//! - `keywords`: 비어 있으면 해당 사용자의 모든 댓글, 아니면 하나라도 본문에 포함될 때
//!
//! 규칙 목록은 순서가 있으며 첫 번째 신원 일치 규칙이 결과를 결정합니다.
//!
//! # 아키텍처
//! - [`matcher`]: 정규화된 규칙으로 서명을 평가
//! - [`store`]: 영속 규칙 목록의 추가/교체/삭제
//! - [`loader`]: YAML/JSON 파일 로딩

pub mod loader;
pub mod matcher;
pub mod store;

pub use loader::{RuleFormat, RuleLoader};
pub use matcher::{MatchResult, RuleMatcher};
pub use store::{MergeReport, RuleStore, UpsertOutcome, parse_keywords};
