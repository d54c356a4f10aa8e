//! 규칙 매칭 로직 -- 신원 비교 및 키워드 평가
//!
//! [`RuleMatcher`]는 규칙 목록을 한 번 정규화(trim + 소문자)해 두고
//! 서명마다 저장 순서대로 평가합니다.
//!
//! 신원이 일치한 첫 규칙에서 평가가 끝납니다. 그 규칙의 키워드 조건이
//! 실패해도 뒤의 규칙은 시도하지 않습니다.

use downvoter_core::types::{Rule, Signature};

/// 매칭 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    /// 매칭된 규칙 (저장된 원본)
    pub rule: Rule,
    /// 규칙 목록에서의 위치
    pub index: usize,
    /// 통계에 기록할 작성자 레이블
    ///
    /// 표시 이름 비교로 일치했으면 표시 이름, 아니면 프로필 핸들입니다.
    pub matched_label: String,
}

/// 정규화된 규칙
#[derive(Debug, Clone)]
struct CompiledRule {
    index: usize,
    username: String,
    keywords: Vec<String>,
}

/// 규칙 매처
#[derive(Debug, Clone, Default)]
pub struct RuleMatcher {
    rules: Vec<Rule>,
    compiled: Vec<CompiledRule>,
}

impl RuleMatcher {
    /// 규칙 목록으로 매처를 생성합니다.
    ///
    /// username이 없는 규칙은 경고를 남기고 매칭에서 제외합니다.
    pub fn new(rules: Vec<Rule>) -> Self {
        let mut compiled = Vec::with_capacity(rules.len());
        for (index, rule) in rules.iter().enumerate() {
            if !rule.is_well_formed() {
                tracing::warn!(
                    index,
                    keywords = rule.keywords.len(),
                    "rule without username, skipping"
                );
                continue;
            }
            compiled.push(CompiledRule {
                index,
                username: rule.normalized_username(),
                keywords: rule.normalized_keywords(),
            });
        }
        Self { rules, compiled }
    }

    /// 저장 순서 그대로의 규칙 목록
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// 전체 규칙 수 (잘못된 규칙 포함)
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// 매칭에 참여하는 규칙 수
    pub fn active_rule_count(&self) -> usize {
        self.compiled.len()
    }

    /// 서명에 대해 첫 번째 신원 일치 규칙을 평가합니다.
    ///
    /// 신원이 일치한 규칙의 키워드 조건이 실패하면 `None`입니다.
    pub fn find_match(&self, signature: &Signature) -> Option<MatchResult> {
        for compiled in &self.compiled {
            let Some(via_display) = identity_hit(&compiled.username, signature) else {
                continue;
            };

            if !keywords_satisfied(&compiled.keywords, &signature.body_lower) {
                tracing::debug!(
                    rule = %compiled.username,
                    "identity matched but no keyword present"
                );
                return None;
            }

            let rule = self.rules.get(compiled.index)?.clone();
            let matched_label = if via_display {
                signature.display_name.clone()
            } else {
                signature.profile_handle.clone()
            };
            return Some(MatchResult {
                rule,
                index: compiled.index,
                matched_label,
            });
        }
        None
    }
}

/// 신원 비교. 일치하면 표시 이름으로 일치했는지 여부를 반환합니다.
///
/// 빈 문자열은 어떤 규칙과도 일치하지 않습니다.
fn identity_hit(username: &str, signature: &Signature) -> Option<bool> {
    let display = signature.display_name_lower.as_str();
    let handle = signature.profile_handle_lower.as_str();

    if !display.is_empty() && display == username {
        Some(true)
    } else if !handle.is_empty() && handle == username {
        Some(false)
    } else {
        None
    }
}

/// 키워드가 없거나, 하나라도 본문에 포함되면 true
fn keywords_satisfied(keywords: &[String], body_lower: &str) -> bool {
    keywords.is_empty() || keywords.iter().any(|k| body_lower.contains(k.as_str()))
}
