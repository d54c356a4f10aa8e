//! 메트릭 상수 및 설명 등록
//!
//! 모든 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! 엔진은 이 상수를 사용하여 `metrics::counter!()`, `metrics::gauge!()`
//! 매크로를 호출합니다. 레코더가 설치되지 않으면 호출은 아무 일도 하지 않습니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `downvoter_`
//! - 접미어: `_total` (counter), 없음 (gauge)
//!
//! # 사용 예시
//!
//! ```ignore
//! use metrics::counter;
//!
//! counter!(downvoter_core::metrics::DISPATCHER_COMMENTS_PROCESSED_TOTAL).increment(1);
//! ```

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 결정 결과 레이블 키 (action_confirmed, skipped_no_match, ...)
pub const LABEL_OUTCOME: &str = "outcome";

/// 저장소 키 레이블 키 (rules, stats, processedIds)
pub const LABEL_STORAGE_KEY: &str = "key";

// ─── Dispatcher 메트릭 ──────────────────────────────────────────────

/// Dispatcher: 처리된 댓글 수 (counter, label: outcome)
pub const DISPATCHER_COMMENTS_PROCESSED_TOTAL: &str = "downvoter_dispatcher_comments_processed_total";

/// Dispatcher: 실행된 액션 수 (counter)
pub const DISPATCHER_ACTIONS_TOTAL: &str = "downvoter_dispatcher_actions_total";

/// Dispatcher: 처리된 발견 배치 수 (counter)
pub const DISPATCHER_BATCHES_TOTAL: &str = "downvoter_dispatcher_batches_total";

/// Dispatcher: 원장 항목 수 (gauge)
pub const DISPATCHER_LEDGER_SIZE: &str = "downvoter_dispatcher_ledger_size";

/// Dispatcher: 캐시된 규칙 수 (gauge)
pub const DISPATCHER_RULES_LOADED: &str = "downvoter_dispatcher_rules_loaded";

// ─── Store 메트릭 ───────────────────────────────────────────────────

/// Store: 실패한 쓰기 수 (counter, label: key)
pub const STORE_WRITE_FAILURES_TOTAL: &str = "downvoter_store_write_failures_total";

/// Store: 반영된 외부 변경 알림 수 (counter, label: key)
pub const STORE_CHANGES_APPLIED_TOTAL: &str = "downvoter_store_changes_applied_total";

/// Store: 캐시 갱신을 위한 재읽기 수 (counter)
pub const STORE_REFRESHES_TOTAL: &str = "downvoter_store_refreshes_total";

/// Store: 실패한 재읽기 수 (counter)
pub const STORE_REFRESH_FAILURES_TOTAL: &str = "downvoter_store_refresh_failures_total";

/// 모든 메트릭의 설명(description)을 등록합니다.
///
/// 전역 레코더 설치 후 한 번만 호출합니다.
pub fn describe_all() {
    use metrics::{describe_counter, describe_gauge};

    describe_counter!(
        DISPATCHER_COMMENTS_PROCESSED_TOTAL,
        "Total number of discovered comments evaluated, by outcome"
    );
    describe_counter!(
        DISPATCHER_ACTIONS_TOTAL,
        "Total number of effector invocations"
    );
    describe_counter!(
        DISPATCHER_BATCHES_TOTAL,
        "Total number of discovery batches processed"
    );
    describe_gauge!(
        DISPATCHER_LEDGER_SIZE,
        "Number of comment ids currently held in the dedup ledger"
    );
    describe_gauge!(
        DISPATCHER_RULES_LOADED,
        "Number of rules in the dispatcher cache"
    );
    describe_counter!(
        STORE_WRITE_FAILURES_TOTAL,
        "Total number of dropped persistence writes"
    );
    describe_counter!(
        STORE_CHANGES_APPLIED_TOTAL,
        "Total number of external change notifications applied to the cache"
    );
    describe_counter!(
        STORE_REFRESHES_TOTAL,
        "Total number of full store reads used to refresh the dispatcher cache"
    );
    describe_counter!(
        STORE_REFRESH_FAILURES_TOTAL,
        "Total number of cache refreshes that kept stale state because the store was unreadable"
    );
}
