//! 규칙 저장소 -- 설정 화면이 쓰는 규칙/통계 편집 연산
//!
//! 모든 쓰기는 전체 문서 교체입니다. 부분 패치를 쓰지 않으므로
//! 디스패처의 캐시는 같은 변경 알림 채널로 일관되게 갱신됩니다.

use std::sync::Arc;

use serde::Serialize;

use downvoter_core::pipeline::StateStore;
use downvoter_core::types::{Rule, StatsState, StorageKey};

use crate::error::EngineError;
use crate::stats::StatsAggregator;
use crate::store::{read_value, write_value};

/// 규칙 추가 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// 새 규칙을 끝에 추가함
    Added,
    /// 같은 username의 규칙을 제자리에서 교체함
    Replaced,
}

/// 여러 규칙 병합 결과
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// 끝에 추가된 규칙 수
    pub added: usize,
    /// 제자리에서 교체된 규칙 수
    pub replaced: usize,
    /// 이미 있어서 건너뛴 규칙 수
    pub skipped: usize,
}

/// 규칙 저장소
#[derive(Debug)]
pub struct RuleStore<S> {
    store: Arc<S>,
}

impl<S: StateStore> RuleStore<S> {
    /// 저장소 위에 규칙 저장소를 생성합니다.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// 저장 순서대로의 규칙 목록
    pub async fn list(&self) -> Result<Vec<Rule>, EngineError> {
        Ok(read_value(self.store.as_ref(), StorageKey::Rules)
            .await?
            .unwrap_or_default())
    }

    /// 규칙을 추가하거나 교체합니다.
    ///
    /// username은 trim 후 비어 있으면 안 됩니다. 키워드는 trim 후 빈 값을 제거합니다.
    /// 같은 username(정확히 일치)의 규칙이 있으면 `overwrite`일 때만 교체하고,
    /// 아니면 [`EngineError::RuleConflict`]를 반환합니다.
    pub async fn upsert(&self, rule: Rule, overwrite: bool) -> Result<UpsertOutcome, EngineError> {
        let rule = sanitize(rule)?;
        let mut rules = self.list().await?;

        let outcome = match rules.iter().position(|r| r.username == rule.username) {
            Some(_) if !overwrite => {
                return Err(EngineError::RuleConflict {
                    username: rule.username,
                });
            }
            Some(index) => {
                rules[index] = rule;
                UpsertOutcome::Replaced
            }
            None => {
                rules.push(rule);
                UpsertOutcome::Added
            }
        };

        write_value(self.store.as_ref(), StorageKey::Rules, &rules).await?;
        tracing::info!(outcome = ?outcome, count = rules.len(), "rule saved");
        Ok(outcome)
    }

    /// 해당 username(정확히 일치)의 규칙을 모두 제거합니다.
    ///
    /// 제거된 규칙 수를 반환합니다.
    pub async fn remove(&self, username: &str) -> Result<usize, EngineError> {
        let mut rules = self.list().await?;
        let before = rules.len();
        rules.retain(|r| r.username != username);
        let removed = before - rules.len();

        if removed > 0 {
            write_value(self.store.as_ref(), StorageKey::Rules, &rules).await?;
            tracing::info!(username, removed, "rule removed");
        }
        Ok(removed)
    }

    /// 규칙 여러 개를 한 번의 쓰기로 병합합니다.
    ///
    /// 같은 username의 규칙은 `overwrite`이면 교체하고 아니면 건너뜁니다.
    pub async fn merge(&self, incoming: Vec<Rule>, overwrite: bool) -> Result<MergeReport, EngineError> {
        let mut rules = self.list().await?;
        let mut report = MergeReport::default();

        for rule in incoming {
            let rule = sanitize(rule)?;
            match rules.iter().position(|r| r.username == rule.username) {
                Some(index) if overwrite => {
                    rules[index] = rule;
                    report.replaced += 1;
                }
                Some(_) => {
                    tracing::debug!(username = %rule.username, "rule exists, skipping");
                    report.skipped += 1;
                }
                None => {
                    rules.push(rule);
                    report.added += 1;
                }
            }
        }

        if report.added + report.replaced > 0 {
            write_value(self.store.as_ref(), StorageKey::Rules, &rules).await?;
        }
        tracing::info!(
            added = report.added,
            replaced = report.replaced,
            skipped = report.skipped,
            "rules merged"
        );
        Ok(report)
    }

    /// 규칙 목록 전체를 교체합니다.
    pub async fn replace_all(&self, rules: Vec<Rule>) -> Result<(), EngineError> {
        write_value(self.store.as_ref(), StorageKey::Rules, &rules).await?;
        tracing::info!(count = rules.len(), "rules replaced");
        Ok(())
    }

    /// 현재 통계
    pub async fn stats(&self) -> Result<StatsState, EngineError> {
        StatsAggregator::new(Arc::clone(&self.store)).current().await
    }

    /// 통계를 0으로 초기화합니다.
    pub async fn reset_stats(&self) -> Result<(), EngineError> {
        StatsAggregator::new(Arc::clone(&self.store)).reset().await
    }

    /// 처리 완료된 댓글 ID (오래된 순)
    pub async fn processed_ids(&self) -> Result<Vec<String>, EngineError> {
        Ok(read_value(self.store.as_ref(), StorageKey::ProcessedIds)
            .await?
            .unwrap_or_default())
    }
}

/// 쉼표로 구분된 입력을 키워드 목록으로 변환합니다.
pub fn parse_keywords(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_owned)
        .collect()
}

/// 저장 전 규칙 정리
pub(crate) fn sanitize(rule: Rule) -> Result<Rule, EngineError> {
    let username = rule.username.trim().to_owned();
    if username.is_empty() {
        return Err(EngineError::MalformedRule(
            "username is required".to_owned(),
        ));
    }
    let keywords = rule
        .keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(str::to_owned)
        .collect();
    Ok(Rule { username, keywords })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store() -> RuleStore<MemoryStore> {
        RuleStore::new(Arc::new(MemoryStore::new("local")))
    }

    fn rule(username: &str, keywords: &[&str]) -> Rule {
        Rule::new(username, keywords.iter().map(|k| (*k).to_owned()).collect())
    }

    #[tokio::test]
    async fn list_empty_store() {
        assert!(store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_appends_in_order() {
        let rules = store();
        rules.upsert(rule("bob", &[]), false).await.unwrap();
        rules.upsert(rule("eve", &["spam"]), false).await.unwrap();
        let list = rules.list().await.unwrap();
        assert_eq!(list, vec![rule("bob", &[]), rule("eve", &["spam"])]);
    }

    #[tokio::test]
    async fn upsert_sanitizes_input() {
        let rules = store();
        rules
            .upsert(rule("  bob ", &[" spam ", "", "  "]), false)
            .await
            .unwrap();
        assert_eq!(rules.list().await.unwrap(), vec![rule("bob", &["spam"])]);
    }

    #[tokio::test]
    async fn upsert_rejects_blank_username() {
        let err = store().upsert(rule("   ", &[]), false).await.unwrap_err();
        assert!(matches!(err, EngineError::MalformedRule(_)));
    }

    #[tokio::test]
    async fn duplicate_without_overwrite_conflicts() {
        let rules = store();
        rules.upsert(rule("bob", &[]), false).await.unwrap();
        let err = rules.upsert(rule("bob", &["x"]), false).await.unwrap_err();
        assert!(matches!(err, EngineError::RuleConflict { .. }));
        assert_eq!(rules.list().await.unwrap(), vec![rule("bob", &[])]);
    }

    #[tokio::test]
    async fn overwrite_replaces_in_place() {
        let rules = store();
        rules.upsert(rule("bob", &[]), false).await.unwrap();
        rules.upsert(rule("eve", &[]), false).await.unwrap();
        let outcome = rules.upsert(rule("bob", &["x"]), true).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Replaced);
        assert_eq!(
            rules.list().await.unwrap(),
            vec![rule("bob", &["x"]), rule("eve", &[])]
        );
    }

    #[tokio::test]
    async fn username_comparison_is_exact() {
        let rules = store();
        rules.upsert(rule("bob", &[]), false).await.unwrap();
        let outcome = rules.upsert(rule("Bob", &[]), false).await.unwrap();
        assert_eq!(outcome, UpsertOutcome::Added);
        assert_eq!(rules.remove("BOB").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn remove_deletes_every_duplicate() {
        let rules = store();
        rules
            .replace_all(vec![rule("bob", &[]), rule("eve", &[]), rule("bob", &["x"])])
            .await
            .unwrap();
        assert_eq!(rules.remove("bob").await.unwrap(), 2);
        assert_eq!(rules.list().await.unwrap(), vec![rule("eve", &[])]);
    }

    #[tokio::test]
    async fn merge_skips_or_replaces_existing() {
        let rules = store();
        rules.upsert(rule("bob", &[]), false).await.unwrap();

        let report = rules
            .merge(vec![rule("bob", &["x"]), rule("eve", &[])], false)
            .await
            .unwrap();
        assert_eq!(
            report,
            MergeReport {
                added: 1,
                replaced: 0,
                skipped: 1
            }
        );
        assert_eq!(
            rules.list().await.unwrap(),
            vec![rule("bob", &[]), rule("eve", &[])]
        );

        let report = rules.merge(vec![rule("bob", &["x"])], true).await.unwrap();
        assert_eq!(report.replaced, 1);
        assert_eq!(rules.list().await.unwrap()[0], rule("bob", &["x"]));
    }

    #[tokio::test]
    async fn reset_stats_zeroes_everything() {
        let rules = store();
        StatsAggregator::new(Arc::clone(&rules.store))
            .increment("bob")
            .await
            .unwrap();
        rules.reset_stats().await.unwrap();
        assert_eq!(rules.stats().await.unwrap(), StatsState::zero());
    }

    #[test]
    fn parse_keywords_trims_and_drops_empty() {
        assert_eq!(parse_keywords(" spam, buy now ,, "), vec!["spam", "buy now"]);
        assert!(parse_keywords("").is_empty());
    }
}
