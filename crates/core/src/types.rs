//! 도메인 타입 — 시스템 전역에서 사용되는 공통 타입
//!
//! 엔진과 CLI가 공유하는 데이터 구조를 정의합니다.
//! 영속 저장소에 기록되는 타입(`Rule`, `StatsState`)은 설정 화면과
//! 같은 JSON 형태를 유지해야 하므로 serde 필드명을 고정합니다.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// 검토 규칙
///
/// 대상 사용자(`username`)와 선택적 키워드 필터의 쌍입니다.
/// `keywords`가 비어 있으면 해당 사용자의 모든 댓글이 대상입니다.
///
/// 저장 형식:
/// ```json
/// {"username": "bob", "keywords": ["spam", "buy now"]}
/// ```
///
/// 없는 필드와 `null` 필드는 기본값으로 해석합니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// 대상 사용자 (표시 이름 또는 프로필 핸들, 대소문자 무시)
    #[serde(default, deserialize_with = "null_as_default")]
    pub username: String,
    /// 본문에 포함되어야 하는 키워드 (하나라도 포함되면 매칭)
    #[serde(default, deserialize_with = "null_as_default")]
    pub keywords: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Rule {
    /// 새 규칙을 생성합니다.
    pub fn new(username: impl Into<String>, keywords: Vec<String>) -> Self {
        Self {
            username: username.into(),
            keywords,
        }
    }

    /// username이 비어 있지 않은지 확인합니다.
    ///
    /// username이 없는 규칙은 매칭에서 항상 건너뜁니다.
    pub fn is_well_formed(&self) -> bool {
        !self.username.trim().is_empty()
    }

    /// 비교용으로 정규화된 username (trim + 소문자)
    pub fn normalized_username(&self) -> String {
        self.username.trim().to_lowercase()
    }

    /// 비교용으로 정규화된 키워드 목록
    ///
    /// 공백뿐인 키워드는 빈 문자열이 되며 모든 본문에 포함된 것으로 취급됩니다.
    /// 설정 화면은 저장 전에 빈 키워드를 걸러냅니다.
    pub fn normalized_keywords(&self) -> Vec<String> {
        self.keywords
            .iter()
            .map(|k| k.trim().to_lowercase())
            .collect()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.keywords.is_empty() {
            write!(f, "{} (all comments)", self.username)
        } else {
            write!(f, "{} [{}]", self.username, self.keywords.join(", "))
        }
    }
}

/// 댓글 레코드
///
/// 렌더링된 댓글에서 추출한 필드입니다.
/// 원본에서 얻을 수 없는 필드는 빈 문자열입니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentRecord {
    /// 외부 댓글 ID (안정적인 식별자를 찾지 못하면 None)
    pub external_id: Option<String>,
    /// 작성자 표시 이름
    pub display_name: String,
    /// 작성자 프로필 핸들
    pub profile_handle: String,
    /// 본문 텍스트
    pub body_text: String,
}

/// 비교용으로 정규화된 댓글 서명
///
/// [`CommentRecord`]의 순수 함수입니다.
/// 매칭 결과의 레이블을 위해 원래 표기도 함께 보관합니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// 외부 댓글 ID
    pub external_id: Option<String>,
    /// 원래 표기의 표시 이름
    pub display_name: String,
    /// 원래 표기의 프로필 핸들
    pub profile_handle: String,
    /// 소문자 표시 이름
    pub display_name_lower: String,
    /// 소문자 프로필 핸들
    pub profile_handle_lower: String,
    /// 소문자 본문
    pub body_lower: String,
}

impl Signature {
    /// 댓글 레코드에서 서명을 계산합니다.
    pub fn from_record(record: &CommentRecord) -> Self {
        Self {
            external_id: record.external_id.clone(),
            display_name: record.display_name.clone(),
            profile_handle: record.profile_handle.clone(),
            display_name_lower: record.display_name.to_lowercase(),
            profile_handle_lower: record.profile_handle.to_lowercase(),
            body_lower: record.body_text.to_lowercase(),
        }
    }
}

impl From<&CommentRecord> for Signature {
    fn from(record: &CommentRecord) -> Self {
        Self::from_record(record)
    }
}

/// 누적 액션 통계
///
/// 저장 형식은 `{"total": 3, "byUser": {"Bob": 2, "eve": 1}}` 입니다.
/// 명시적인 초기화 외에는 감소하지 않습니다.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsState {
    /// 전체 액션 수
    #[serde(default)]
    pub total: u64,
    /// 작성자 레이블별 액션 수
    #[serde(default)]
    pub by_user: BTreeMap<String, u64>,
}

impl StatsState {
    /// 모든 값이 0인 통계
    pub fn zero() -> Self {
        Self::default()
    }

    /// `total`과 `by_user[label]`을 1씩 증가시킵니다.
    pub fn increment(&mut self, label: &str) {
        self.total = self.total.saturating_add(1);
        let count = self.by_user.entry(label.to_owned()).or_insert(0);
        *count = count.saturating_add(1);
    }

    /// 레이블의 현재 카운트
    pub fn count_for(&self, label: &str) -> u64 {
        self.by_user.get(label).copied().unwrap_or(0)
    }

    /// 카운트 내림차순(동률이면 이름순)으로 정렬된 사용자별 항목
    pub fn ranked(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<(&str, u64)> = self
            .by_user
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}

/// 발견된 요소의 세션 내 식별자
///
/// 렌더링 트리의 요소 하나에 대응하며 세션이 끝나면 의미가 없습니다.
/// 영속 중복 제거에는 사용하지 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "el-{}", self.0)
    }
}

/// 영속 저장소의 키
///
/// 설정 화면과 공유하는 저장소 키 이름을 고정합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StorageKey {
    /// 순서 있는 규칙 목록 (`"rules"`)
    #[serde(rename = "rules")]
    Rules,
    /// 누적 통계 (`"stats"`)
    #[serde(rename = "stats")]
    Stats,
    /// 처리 완료된 댓글 ID 목록 (`"processedIds"`)
    #[serde(rename = "processedIds")]
    ProcessedIds,
}

impl StorageKey {
    /// 모든 키 (초기 로딩 순서)
    pub const ALL: [StorageKey; 3] = [Self::Rules, Self::Stats, Self::ProcessedIds];

    /// 저장소에 기록되는 키 문자열
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rules => "rules",
            Self::Stats => "stats",
            Self::ProcessedIds => "processedIds",
        }
    }

    /// 키 문자열에서 변환합니다. 알 수 없는 키는 None.
    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
