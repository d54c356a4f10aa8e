//! 액션 디스패처 -- 발견된 댓글 하나를 상태 머신으로 처리합니다.
//!
//! ```text
//! Discovered -> Identified -> SkippedAlreadyProcessed
//!                          -> SkippedNoMatch
//!                          -> ActionPending -> EffectorMissing
//!                                           -> ActionAlreadyTaken
//!                                           -> ActionConfirmed
//! ```
//!
//! 매칭 판단은 항상 인메모리 캐시(규칙, 원장)를 읽습니다. 영속 쓰기는
//! [`JoinSet`]에 띄우고 기다리지 않으며, 실패는 로그만 남깁니다.
//! [`Dispatcher::flush`]로 남은 쓰기를 기다릴 수 있습니다.
//!
//! 원장 쓰기는 한 번에 하나만 예약되며, 실행 시점의 원장 전체를 기록합니다.
//! 통계 쓰기는 저장소를 다시 읽은 뒤 증가시킵니다.
//!
//! 캐시는 변경 알림과 [`Dispatcher::refresh`]로 갱신됩니다. 파이프라인은 배치마다
//! `refresh`를 호출하므로 알림을 보내지 않는 다른 프로세스의 쓰기도 반영됩니다.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

use downvoter_core::event::{ActionEvent, ActionOutcome, Event, StorageChange};
use downvoter_core::metrics as m;
use downvoter_core::pipeline::{Effector, StateStore};
use downvoter_core::types::{Rule, Signature, StatsState, StorageKey};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::extract::IdentityExtractor;
use crate::ledger::DedupLedger;
use crate::rule::RuleMatcher;
use crate::seen::SeenSet;
use crate::source::{DiscoveredComment, RawComment};
use crate::stats::StatsAggregator;
use crate::store::{decode_value, write_value};

/// 결과별 처리 카운터
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// 처리 요청된 요소 수
    pub processed: u64,
    /// 이미 방문한 요소
    pub already_visited: u64,
    /// 원장에 이미 있는 댓글
    pub skipped_already_processed: u64,
    /// 매칭 규칙 없음
    pub skipped_no_match: u64,
    /// 액션 컨트롤 없음
    pub effector_missing: u64,
    /// 이미 적용된 액션
    pub action_already_taken: u64,
    /// 실행한 액션
    pub action_confirmed: u64,
    /// 실패한 영속 쓰기
    pub write_failures: u64,
}

impl DispatchStats {
    fn record(&mut self, outcome: &ActionOutcome) {
        self.processed += 1;
        let slot = match outcome {
            ActionOutcome::AlreadyVisited => &mut self.already_visited,
            ActionOutcome::SkippedAlreadyProcessed => &mut self.skipped_already_processed,
            ActionOutcome::SkippedNoMatch => &mut self.skipped_no_match,
            ActionOutcome::EffectorMissing => &mut self.effector_missing,
            ActionOutcome::ActionAlreadyTaken => &mut self.action_already_taken,
            ActionOutcome::ActionConfirmed { .. } => &mut self.action_confirmed,
        };
        *slot += 1;
    }
}

/// 영속 쓰기 태스크와 공유하는 상태
#[derive(Debug)]
struct WriteState {
    ledger: std::sync::Mutex<DedupLedger>,
    /// 원장 쓰기가 예약되어 있는지
    ledger_scheduled: AtomicBool,
    ledger_gate: Mutex<()>,
    /// 통계 읽기-수정-쓰기 직렬화
    stats_gate: Mutex<()>,
    failures: AtomicU64,
}

impl WriteState {
    fn new(ledger: DedupLedger) -> Self {
        Self {
            ledger: std::sync::Mutex::new(ledger),
            ledger_scheduled: AtomicBool::new(false),
            ledger_gate: Mutex::new(()),
            stats_gate: Mutex::new(()),
            failures: AtomicU64::new(0),
        }
    }

    fn ledger(&self) -> MutexGuard<'_, DedupLedger> {
        self.ledger.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// 액션 디스패처
pub struct Dispatcher<S: StateStore, E> {
    store: Arc<S>,
    effector: E,
    namespace: String,
    extractor: IdentityExtractor,
    matcher: RuleMatcher,
    /// 이번 세션에서 기록한 ID
    session_ids: HashSet<String>,
    stats_cache: StatsState,
    aggregator: StatsAggregator<S>,
    seen: SeenSet,
    writes: JoinSet<()>,
    write_state: Arc<WriteState>,
    counters: DispatchStats,
    events: Option<mpsc::Sender<ActionEvent>>,
}

impl<S, E> Dispatcher<S, E>
where
    S: StateStore,
    E: Effector<RawComment>,
{
    /// 저장소에서 규칙, 통계, 처리 ID를 한 번에 읽어 디스패처를 준비합니다.
    ///
    /// 저장소를 읽을 수 없거나 값을 해석할 수 없으면 경고를 남기고
    /// 빈 기본값으로 시작합니다.
    ///
    /// # Errors
    /// 설정이 유효하지 않거나 추출 패턴을 컴파일할 수 없는 경우
    pub async fn bootstrap(
        store: Arc<S>,
        effector: E,
        config: &EngineConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let extractor = IdentityExtractor::new()?;

        let snapshot = match store.get(&StorageKey::ALL).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(error = %e, "persistence unavailable, starting from empty state");
                Default::default()
            }
        };

        let rules = decode_rules(snapshot.get(&StorageKey::Rules)).unwrap_or_default();
        let stats_cache: StatsState =
            decode_or_default(StorageKey::Stats, snapshot.get(&StorageKey::Stats));
        let ids: Vec<String> = decode_or_default(
            StorageKey::ProcessedIds,
            snapshot.get(&StorageKey::ProcessedIds),
        );

        let matcher = RuleMatcher::new(rules);
        let ledger = DedupLedger::from_ids(config.ledger_capacity, ids);

        tracing::info!(
            namespace = %config.namespace,
            rules = matcher.rule_count(),
            active_rules = matcher.active_rule_count(),
            processed_ids = ledger.len(),
            total_actions = stats_cache.total,
            "dispatcher bootstrapped"
        );
        metrics::gauge!(m::DISPATCHER_RULES_LOADED).set(matcher.rule_count() as f64);
        metrics::gauge!(m::DISPATCHER_LEDGER_SIZE).set(ledger.len() as f64);

        Ok(Self {
            aggregator: StatsAggregator::new(Arc::clone(&store)),
            store,
            effector,
            namespace: config.namespace.clone(),
            extractor,
            matcher,
            session_ids: HashSet::new(),
            stats_cache,
            seen: SeenSet::new(),
            writes: JoinSet::new(),
            write_state: Arc::new(WriteState::new(ledger)),
            counters: DispatchStats::default(),
            events: None,
        })
    }

    /// 결정마다 [`ActionEvent`]를 보낼 채널을 설정합니다.
    ///
    /// 채널이 가득 차면 이벤트는 버려집니다.
    pub fn with_events(mut self, tx: mpsc::Sender<ActionEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// 발견된 댓글 하나를 처리합니다.
    ///
    /// 요소는 결과와 상관없이 정확히 한 번 방문 처리됩니다.
    pub fn process(&mut self, discovered: &DiscoveredComment) -> ActionOutcome {
        let element = discovered.element;

        if !self.seen.mark(element) {
            let outcome = ActionOutcome::AlreadyVisited;
            self.finish(discovered, None, outcome.clone(), None);
            return outcome;
        }

        let record = self.extractor.extract(&discovered.comment);
        let external_id = record.external_id.clone();

        let processed = external_id
            .as_deref()
            .is_some_and(|id| self.write_state.ledger().has(id));
        if processed {
            tracing::debug!(element = %element, id = ?external_id, "already processed, skipping");
            let outcome = ActionOutcome::SkippedAlreadyProcessed;
            self.finish(discovered, external_id, outcome.clone(), None);
            return outcome;
        }

        let signature = Signature::from_record(&record);
        let Some(found) = self.matcher.find_match(&signature) else {
            tracing::debug!(element = %element, author = %record.display_name, "no rule match");
            let outcome = ActionOutcome::SkippedNoMatch;
            self.finish(discovered, external_id, outcome.clone(), None);
            return outcome;
        };
        let rule = Some(found.rule.username.clone());

        let Some(handle) = self.effector.locate(element, &discovered.comment) else {
            tracing::warn!(
                element = %element,
                id = external_id.as_deref().unwrap_or("-"),
                rule = %found.rule.username,
                "matched comment has no action control"
            );
            let outcome = ActionOutcome::EffectorMissing;
            self.finish(discovered, external_id, outcome.clone(), rule);
            return outcome;
        };

        let outcome = if self.effector.is_already_applied(&handle) {
            tracing::debug!(element = %element, label = %found.matched_label, "action already applied");
            self.record_processed(external_id.as_deref());
            ActionOutcome::ActionAlreadyTaken
        } else {
            self.effector.invoke(&handle);
            tracing::info!(
                element = %element,
                id = external_id.as_deref().unwrap_or("-"),
                label = %found.matched_label,
                rule = %found.rule.username,
                "action confirmed"
            );
            self.record_processed(external_id.as_deref());
            self.record_stats(found.matched_label.clone());
            metrics::counter!(m::DISPATCHER_ACTIONS_TOTAL).increment(1);
            ActionOutcome::ActionConfirmed {
                label: found.matched_label,
            }
        };

        self.finish(discovered, external_id, outcome.clone(), rule);
        outcome
    }

    /// 배치를 순서대로 처리합니다.
    pub fn process_batch(&mut self, batch: &[DiscoveredComment]) -> Vec<ActionOutcome> {
        metrics::counter!(m::DISPATCHER_BATCHES_TOTAL).increment(1);
        let outcomes = batch.iter().map(|d| self.process(d)).collect();
        self.reap_writes();
        outcomes
    }

    /// 외부 변경 알림을 캐시에 반영합니다.
    ///
    /// 다른 네임스페이스의 변경과 해석할 수 없는 값은 무시합니다.
    /// 처리 ID 변경은 이번 세션에서 기록한 ID를 잃지 않도록 병합합니다.
    pub fn apply_change(&mut self, change: &StorageChange) {
        if change.namespace != self.namespace {
            tracing::debug!(namespace = %change.namespace, key = %change.key, "ignoring change in other namespace");
            return;
        }
        tracing::trace!(event = change.event_id(), key = %change.key, "applying storage change");

        if self.apply_value(change.key, change.new_value.as_ref()) {
            metrics::counter!(m::STORE_CHANGES_APPLIED_TOTAL, m::LABEL_STORAGE_KEY => change.key.as_str())
                .increment(1);
        }
    }

    /// 규칙, 통계, 처리 ID를 한 번에 다시 읽어 캐시를 갱신합니다.
    ///
    /// 알림 없이 바뀐 값(다른 프로세스의 쓰기, 놓친 알림)을 반영합니다.
    /// 처리 ID는 [`apply_change`](Self::apply_change)와 같은 방식으로 병합합니다.
    /// 저장소를 읽을 수 없으면 경고를 남기고 기존 캐시를 유지합니다.
    ///
    /// 갱신했으면 `true`를 반환합니다.
    pub async fn refresh(&mut self) -> bool {
        let snapshot = match self.store.get(&StorageKey::ALL).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                metrics::counter!(m::STORE_REFRESH_FAILURES_TOTAL).increment(1);
                tracing::warn!(error = %e, "store refresh failed, keeping cached state");
                return false;
            }
        };
        metrics::counter!(m::STORE_REFRESHES_TOTAL).increment(1);

        for key in StorageKey::ALL {
            self.apply_value(key, snapshot.get(&key));
        }
        true
    }

    /// 키 하나의 새 값을 캐시에 반영합니다. 해석할 수 없으면 `false`입니다.
    fn apply_value(&mut self, key: StorageKey, value: Option<&serde_json::Value>) -> bool {
        match key {
            StorageKey::Rules => {
                let Some(rules) = decode_rules(value) else {
                    return false;
                };
                self.replace_rules(rules);
            }
            StorageKey::Stats => {
                let Some(stats) = decode_update::<StatsState>(key, value) else {
                    return false;
                };
                self.stats_cache = stats;
            }
            StorageKey::ProcessedIds => {
                let Some(ids) = decode_update::<Vec<String>>(key, value) else {
                    return false;
                };
                self.merge_processed_ids(ids);
            }
        }
        true
    }

    fn replace_rules(&mut self, rules: Vec<Rule>) {
        if self.matcher.rules() == rules.as_slice() {
            return;
        }
        self.matcher = RuleMatcher::new(rules);
        metrics::gauge!(m::DISPATCHER_RULES_LOADED).set(self.matcher.rule_count() as f64);
        tracing::info!(rules = self.matcher.rule_count(), "rules updated");
    }

    /// 진행 중인 영속 쓰기를 모두 기다립니다.
    pub async fn flush(&mut self) {
        while let Some(result) = self.writes.join_next().await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "persistence task failed");
            }
        }
    }

    /// 처리 카운터
    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            write_failures: self.write_state.failures.load(Ordering::Relaxed),
            ..self.counters
        }
    }

    /// 현재 캐시된 규칙 매처
    pub fn matcher(&self) -> &RuleMatcher {
        &self.matcher
    }

    /// 현재 원장의 복사본
    pub fn ledger(&self) -> DedupLedger {
        self.write_state.ledger().clone()
    }

    /// 마지막으로 알려진 통계
    pub fn cached_stats(&self) -> &StatsState {
        &self.stats_cache
    }

    /// 이펙터
    pub fn effector(&self) -> &E {
        &self.effector
    }

    /// 진행 중인 영속 쓰기 수
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    fn finish(
        &mut self,
        discovered: &DiscoveredComment,
        external_id: Option<String>,
        outcome: ActionOutcome,
        rule: Option<String>,
    ) {
        self.counters.record(&outcome);
        metrics::counter!(m::DISPATCHER_COMMENTS_PROCESSED_TOTAL, m::LABEL_OUTCOME => outcome.as_str())
            .increment(1);

        let Some(tx) = &self.events else {
            return;
        };
        let event = ActionEvent::new(discovered.element, external_id, outcome, rule);
        match tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(element = %event.element, "action event channel full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("action event receiver closed");
                self.events = None;
            }
        }
    }

    /// 원장에 기록하고 새로 추가되었으면 전체 목록의 저장을 예약합니다.
    fn record_processed(&mut self, id: Option<&str>) {
        let Some(id) = id else {
            return;
        };
        let size = {
            let mut ledger = self.write_state.ledger();
            if !ledger.record(id) {
                return;
            }
            ledger.len()
        };
        self.session_ids.insert(id.to_owned());
        metrics::gauge!(m::DISPATCHER_LEDGER_SIZE).set(size as f64);
        self.schedule_ledger_write();
    }

    fn schedule_ledger_write(&mut self) {
        if self.write_state.ledger_scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        let store = Arc::clone(&self.store);
        let state = Arc::clone(&self.write_state);
        self.writes.spawn(async move {
            let _gate = state.ledger_gate.lock().await;
            state.ledger_scheduled.store(false, Ordering::Release);
            let ids = state.ledger().to_vec();
            if let Err(e) = write_value(store.as_ref(), StorageKey::ProcessedIds, &ids).await {
                report_write_failure(&state, StorageKey::ProcessedIds, &e);
            }
        });
    }

    fn record_stats(&mut self, label: String) {
        self.stats_cache.increment(&label);

        let aggregator = self.aggregator.clone();
        let state = Arc::clone(&self.write_state);
        self.writes.spawn(async move {
            let _gate = state.stats_gate.lock().await;
            if let Err(e) = aggregator.increment(&label).await {
                report_write_failure(&state, StorageKey::Stats, &e);
            }
        });
    }

    fn merge_processed_ids(&mut self, ids: Vec<String>) {
        let mut ledger = self.write_state.ledger();
        let incoming: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let local: Vec<String> = ledger
            .iter()
            .filter(|id| self.session_ids.contains(*id) && !incoming.contains(id))
            .map(str::to_owned)
            .collect();

        ledger.replace(ids.into_iter().chain(local));
        self.session_ids.retain(|id| ledger.has(id));
        metrics::gauge!(m::DISPATCHER_LEDGER_SIZE).set(ledger.len() as f64);
    }

    fn reap_writes(&mut self) {
        while let Some(result) = self.writes.try_join_next() {
            if let Err(e) = result {
                tracing::warn!(error = %e, "persistence task failed");
            }
        }
    }
}

fn report_write_failure(state: &WriteState, key: StorageKey, error: &EngineError) {
    state.failures.fetch_add(1, Ordering::Relaxed);
    metrics::counter!(m::STORE_WRITE_FAILURES_TOTAL, m::LABEL_STORAGE_KEY => key.as_str())
        .increment(1);
    tracing::warn!(key = %key, error = %error, "persistence write failed");
}

/// 부트스트랩 값 해석. 없거나 해석할 수 없으면 기본값입니다.
fn decode_or_default<T>(key: StorageKey, value: Option<&serde_json::Value>) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    match value {
        None | Some(serde_json::Value::Null) => T::default(),
        Some(value) => decode_value(key, value).unwrap_or_else(|e| {
            tracing::warn!(key = %key, error = %e, "stored value is malformed, using default");
            T::default()
        }),
    }
}

/// 갱신 값 해석. 삭제된 키는 기본값, 해석할 수 없으면 `None`입니다.
fn decode_update<T>(key: StorageKey, value: Option<&serde_json::Value>) -> Option<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    match value {
        None | Some(serde_json::Value::Null) => Some(T::default()),
        Some(value) => match decode_value(key, value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "ignoring malformed stored value");
                None
            }
        },
    }
}

/// 규칙 목록을 항목별로 해석합니다.
///
/// 해석할 수 없는 항목은 경고 후 건너뛰고 나머지는 유지합니다.
/// 목록이 아니면 `None`입니다.
fn decode_rules(value: Option<&serde_json::Value>) -> Option<Vec<Rule>> {
    let entries = match value {
        None | Some(serde_json::Value::Null) => return Some(Vec::new()),
        Some(serde_json::Value::Array(entries)) => entries,
        Some(_) => {
            tracing::warn!(key = %StorageKey::Rules, "stored rules are not a list, ignoring");
            return None;
        }
    };

    let rules = entries
        .iter()
        .enumerate()
        .filter_map(|(index, entry)| match Rule::deserialize(entry) {
            Ok(rule) => Some(rule),
            Err(e) => {
                tracing::warn!(index, error = %e, "skipping malformed rule entry");
                None
            }
        })
        .collect();
    Some(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effector::VoteControlEffector;
    use crate::source::VoteControl;
    use crate::store::{MemoryStore, read_value};
    use downvoter_core::pipeline::StateSnapshot;
    use downvoter_core::types::ElementId;

    fn comment(element: u64, post: u64, author: &str, body: &str) -> DiscoveredComment {
        DiscoveredComment::new(
            ElementId(element),
            RawComment {
                id: Some(format!("post-{post}")),
                author: author.to_owned(),
                body: body.to_owned(),
                vote: Some(VoteControl::default()),
                ..RawComment::default()
            },
        )
    }

    async fn seeded_store(rules: serde_json::Value) -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new("local"));
        store
            .set(StateSnapshot::from([(StorageKey::Rules, rules)]))
            .await
            .unwrap();
        store
    }

    async fn dispatcher(
        store: &Arc<MemoryStore>,
    ) -> Dispatcher<MemoryStore, VoteControlEffector> {
        Dispatcher::bootstrap(
            Arc::clone(store),
            VoteControlEffector::new(),
            &EngineConfig::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn confirmed_action_updates_ledger_and_stats() {
        let store = seeded_store(serde_json::json!([{"username": "bob"}])).await;
        let mut dispatcher = dispatcher(&store).await;

        let outcome = dispatcher.process(&comment(1, 42, "Bob", "hello"));
        assert_eq!(
            outcome,
            ActionOutcome::ActionConfirmed {
                label: "Bob".to_owned()
            }
        );
        dispatcher.flush().await;

        assert_eq!(dispatcher.effector().press_count(), 1);
        let ids: Vec<String> = read_value(store.as_ref(), StorageKey::ProcessedIds)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ids, vec!["42"]);
        let stats: StatsState = read_value(store.as_ref(), StorageKey::Stats)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.count_for("Bob"), 1);
    }

    #[tokio::test]
    async fn element_is_visited_once() {
        let store = seeded_store(serde_json::json!([{"username": "bob"}])).await;
        let mut dispatcher = dispatcher(&store).await;

        let first = comment(1, 42, "Bob", "hello");
        dispatcher.process(&first);
        assert_eq!(dispatcher.process(&first), ActionOutcome::AlreadyVisited);
        assert_eq!(dispatcher.effector().press_count(), 1);
    }

    #[tokio::test]
    async fn processed_id_on_new_element_is_skipped() {
        let store = seeded_store(serde_json::json!([{"username": "bob"}])).await;
        let mut dispatcher = dispatcher(&store).await;

        dispatcher.process(&comment(1, 42, "Bob", "hello"));
        let outcome = dispatcher.process(&comment(2, 42, "Bob", "hello"));
        assert_eq!(outcome, ActionOutcome::SkippedAlreadyProcessed);
        assert_eq!(dispatcher.effector().press_count(), 1);
    }

    #[tokio::test]
    async fn no_match_is_not_recorded() {
        let store = seeded_store(serde_json::json!([{"username": "bob"}])).await;
        let mut dispatcher = dispatcher(&store).await;

        assert_eq!(
            dispatcher.process(&comment(1, 7, "alice", "hi")),
            ActionOutcome::SkippedNoMatch
        );
        dispatcher.flush().await;
        assert!(dispatcher.ledger().is_empty());
        assert!(store.snapshot().await.get(&StorageKey::ProcessedIds).is_none());
    }

    #[tokio::test]
    async fn missing_control_is_not_recorded() {
        let store = seeded_store(serde_json::json!([{"username": "bob"}])).await;
        let mut dispatcher = dispatcher(&store).await;

        let mut discovered = comment(1, 42, "Bob", "hello");
        discovered.comment.vote = None;
        assert_eq!(dispatcher.process(&discovered), ActionOutcome::EffectorMissing);
        assert!(!dispatcher.ledger().has("42"));
        assert_eq!(dispatcher.stats().effector_missing, 1);
    }

    #[tokio::test]
    async fn already_applied_records_id_without_stats() {
        let store = seeded_store(serde_json::json!([{"username": "bob"}])).await;
        let mut dispatcher = dispatcher(&store).await;

        let mut discovered = comment(1, 42, "Bob", "hello");
        discovered.comment.vote = Some(VoteControl {
            pressed: true,
            ..VoteControl::default()
        });
        assert_eq!(
            dispatcher.process(&discovered),
            ActionOutcome::ActionAlreadyTaken
        );
        dispatcher.flush().await;

        assert!(dispatcher.ledger().has("42"));
        assert_eq!(dispatcher.effector().press_count(), 0);
        assert!(store.snapshot().await.get(&StorageKey::Stats).is_none());
    }

    #[tokio::test]
    async fn comment_without_id_acts_but_is_not_recorded() {
        let store = seeded_store(serde_json::json!([{"username": "bob"}])).await;
        let mut dispatcher = dispatcher(&store).await;

        let mut discovered = comment(1, 0, "Bob", "hello");
        discovered.comment.id = None;
        assert!(dispatcher.process(&discovered).is_confirmed());
        assert!(dispatcher.ledger().is_empty());
    }

    #[tokio::test]
    async fn bootstrap_survives_unavailable_store() {
        let store = seeded_store(serde_json::json!([{"username": "bob"}])).await;
        store.set_failing(true);
        let dispatcher = dispatcher(&store).await;
        assert_eq!(dispatcher.matcher().rule_count(), 0);
        assert!(dispatcher.ledger().is_empty());
    }

    #[tokio::test]
    async fn bootstrap_ignores_malformed_values() {
        let store = seeded_store(serde_json::json!("not a list")).await;
        store
            .set(StateSnapshot::from([(
                StorageKey::ProcessedIds,
                serde_json::json!(["1", "2"]),
            )]))
            .await
            .unwrap();
        let dispatcher = dispatcher(&store).await;
        assert_eq!(dispatcher.matcher().rule_count(), 0);
        assert_eq!(dispatcher.ledger().len(), 2);
    }

    #[tokio::test]
    async fn write_failure_is_counted_not_fatal() {
        let store = seeded_store(serde_json::json!([{"username": "bob"}])).await;
        let mut dispatcher = dispatcher(&store).await;
        store.set_failing(true);

        assert!(dispatcher.process(&comment(1, 42, "Bob", "x")).is_confirmed());
        dispatcher.flush().await;
        assert_eq!(dispatcher.stats().write_failures, 2);
        assert!(dispatcher.ledger().has("42"));
    }

    #[tokio::test]
    async fn rule_change_applies_to_next_comment() {
        let store = seeded_store(serde_json::json!([])).await;
        let mut dispatcher = dispatcher(&store).await;

        assert_eq!(
            dispatcher.process(&comment(1, 1, "eve", "spam")),
            ActionOutcome::SkippedNoMatch
        );
        dispatcher.apply_change(&StorageChange::new(
            "local",
            StorageKey::Rules,
            None,
            Some(serde_json::json!([{"username": "eve", "keywords": ["spam"]}])),
        ));
        assert!(dispatcher.process(&comment(2, 2, "eve", "more spam")).is_confirmed());
    }

    #[tokio::test]
    async fn change_in_other_namespace_is_ignored() {
        let store = seeded_store(serde_json::json!([])).await;
        let mut dispatcher = dispatcher(&store).await;

        dispatcher.apply_change(&StorageChange::new(
            "sync",
            StorageKey::Rules,
            None,
            Some(serde_json::json!([{"username": "eve"}])),
        ));
        assert_eq!(dispatcher.matcher().rule_count(), 0);
    }

    #[tokio::test]
    async fn malformed_change_keeps_cache() {
        let store = seeded_store(serde_json::json!([{"username": "bob"}])).await;
        let mut dispatcher = dispatcher(&store).await;

        dispatcher.apply_change(&StorageChange::new(
            "local",
            StorageKey::Rules,
            None,
            Some(serde_json::json!({"username": 3})),
        ));
        assert_eq!(dispatcher.matcher().rule_count(), 1);
    }

    #[tokio::test]
    async fn null_rule_fields_keep_other_rules() {
        let store = seeded_store(serde_json::json!([
            {"username": "bob"},
            {"username": "eve", "keywords": null}
        ]))
        .await;
        let mut dispatcher = dispatcher(&store).await;

        assert_eq!(dispatcher.matcher().rule_count(), 2);
        assert_eq!(
            dispatcher.process(&comment(1, 1, "Bob", "hello")),
            ActionOutcome::ActionConfirmed {
                label: "Bob".to_owned()
            }
        );
    }

    #[tokio::test]
    async fn malformed_rule_entry_is_skipped() {
        let store = seeded_store(serde_json::json!([
            {"username": "bob"},
            {"username": 3},
            "eve"
        ]))
        .await;
        let mut dispatcher = dispatcher(&store).await;
        assert_eq!(dispatcher.matcher().rule_count(), 1);
        assert!(dispatcher.process(&comment(1, 1, "Bob", "x")).is_confirmed());

        dispatcher.apply_change(&StorageChange::new(
            "local",
            StorageKey::Rules,
            None,
            Some(serde_json::json!([{"keywords": ["a"], "username": "eve"}, {"keywords": 7}])),
        ));
        assert_eq!(dispatcher.matcher().rule_count(), 1);
        assert!(dispatcher.process(&comment(2, 2, "eve", "a b")).is_confirmed());
    }

    #[tokio::test]
    async fn refresh_reads_values_written_without_notification() {
        let store = seeded_store(serde_json::json!([])).await;
        let mut dispatcher = dispatcher(&store).await;
        dispatcher.process(&comment(1, 1, "eve", "x"));

        // the dispatcher never sees these notifications
        store
            .set(StateSnapshot::from([
                (StorageKey::Rules, serde_json::json!([{"username": "eve"}])),
                (StorageKey::Stats, serde_json::json!({"total": 4, "byUser": {"eve": 4}})),
                (StorageKey::ProcessedIds, serde_json::json!(["9"])),
            ]))
            .await
            .unwrap();
        assert!(dispatcher.refresh().await);

        assert_eq!(dispatcher.matcher().rule_count(), 1);
        assert_eq!(dispatcher.cached_stats().total, 4);
        assert!(dispatcher.ledger().has("9"));
        assert!(dispatcher.process(&comment(2, 2, "eve", "y")).is_confirmed());
        assert!(dispatcher.ledger().has("2"));
    }

    #[tokio::test]
    async fn refresh_keeps_session_ids_missing_from_store() {
        let store = seeded_store(serde_json::json!([{"username": "bob"}])).await;
        let mut dispatcher = dispatcher(&store).await;

        dispatcher.process(&comment(1, 1, "Bob", "a"));
        dispatcher.flush().await;
        store
            .set(StateSnapshot::from([(
                StorageKey::ProcessedIds,
                serde_json::json!(["7"]),
            )]))
            .await
            .unwrap();
        assert!(dispatcher.refresh().await);
        assert_eq!(dispatcher.ledger().to_vec(), vec!["7", "1"]);
    }

    #[tokio::test]
    async fn failed_refresh_keeps_cache() {
        let store = seeded_store(serde_json::json!([{"username": "bob"}])).await;
        let mut dispatcher = dispatcher(&store).await;
        store.set_failing(true);

        assert!(!dispatcher.refresh().await);
        assert_eq!(dispatcher.matcher().rule_count(), 1);
    }

    #[tokio::test]
    async fn stale_ledger_notification_keeps_session_ids() {
        let store = seeded_store(serde_json::json!([{"username": "bob"}])).await;
        let mut dispatcher = dispatcher(&store).await;

        dispatcher.process(&comment(1, 1, "Bob", "a"));
        dispatcher.process(&comment(2, 2, "Bob", "b"));
        dispatcher.apply_change(&StorageChange::new(
            "local",
            StorageKey::ProcessedIds,
            None,
            Some(serde_json::json!(["1"])),
        ));
        assert_eq!(dispatcher.ledger().to_vec(), vec!["1", "2"]);
    }

    #[tokio::test]
    async fn events_are_emitted_per_decision() {
        let store = seeded_store(serde_json::json!([{"username": "bob"}])).await;
        let (tx, mut rx) = mpsc::channel(8);
        let mut dispatcher = dispatcher(&store).await.with_events(tx);

        dispatcher.process_batch(&[comment(1, 1, "Bob", "a"), comment(2, 2, "alice", "b")]);

        let first = rx.recv().await.unwrap();
        assert!(first.outcome.is_confirmed());
        assert_eq!(first.rule.as_deref(), Some("bob"));
        let second = rx.recv().await.unwrap();
        assert_eq!(second.outcome, ActionOutcome::SkippedNoMatch);
        assert!(second.rule.is_none());
    }

    #[test]
    fn dispatch_stats_count_each_outcome() {
        let mut stats = DispatchStats::default();
        stats.record(&ActionOutcome::SkippedNoMatch);
        stats.record(&ActionOutcome::ActionConfirmed {
            label: "x".to_owned(),
        });
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.skipped_no_match, 1);
        assert_eq!(stats.action_confirmed, 1);
    }
}
