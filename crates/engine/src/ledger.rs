//! 중복 제거 원장 -- 이미 처리한 댓글 ID의 용량 제한 FIFO 집합
//!
//! 세션을 넘어서는 멱등성의 기준입니다. 용량을 넘으면 가장 오래된 ID부터
//! 제거하여 최근 `capacity`개만 유지합니다.
//!
//! 원장은 인메모리 캐시이며, 기록 후 저장할 값은 [`DedupLedger::to_vec`]으로 얻습니다.
//! 저장 전에 영속 값을 다시 읽지 않습니다.

use std::collections::{HashSet, VecDeque};

use downvoter_core::config::DEFAULT_LEDGER_CAPACITY;

/// 중복 제거 원장
#[derive(Debug, Clone)]
pub struct DedupLedger {
    capacity: usize,
    order: VecDeque<String>,
    members: HashSet<String>,
}

impl DedupLedger {
    /// 빈 원장을 생성합니다. 용량 0은 1로 취급합니다.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            members: HashSet::new(),
        }
    }

    /// 저장된 ID 목록(오래된 순)으로 원장을 만듭니다.
    ///
    /// 중복은 첫 등장만 남기고, 용량을 넘으면 가장 최근 항목만 유지합니다.
    pub fn from_ids(capacity: usize, ids: impl IntoIterator<Item = String>) -> Self {
        let mut ledger = Self::new(capacity);
        ledger.replace(ids);
        ledger
    }

    /// 이미 기록된 ID인지 확인합니다.
    pub fn has(&self, id: &str) -> bool {
        self.members.contains(id)
    }

    /// ID를 기록합니다.
    ///
    /// 새로 추가되었으면 true, 이미 있었으면 false입니다.
    pub fn record(&mut self, id: &str) -> bool {
        if self.members.contains(id) {
            return false;
        }
        self.order.push_back(id.to_owned());
        self.members.insert(id.to_owned());
        self.evict_overflow();
        true
    }

    /// 선택적 ID를 기록합니다. `None`은 아무 일도 하지 않습니다.
    pub fn record_opt(&mut self, id: Option<&str>) -> bool {
        id.is_some_and(|id| self.record(id))
    }

    /// 전체 내용을 교체합니다 (외부 변경 알림 반영).
    pub fn replace(&mut self, ids: impl IntoIterator<Item = String>) {
        self.order.clear();
        self.members.clear();
        for id in ids {
            if self.members.insert(id.clone()) {
                self.order.push_back(id);
            }
        }
        self.evict_overflow();
    }

    /// 저장용 ID 목록 (오래된 순)
    pub fn to_vec(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }

    /// 오래된 순 반복자
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// 기록된 ID 수
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// 최대 용량
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn evict_overflow(&mut self) {
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
    }
}

impl Default for DedupLedger {
    fn default() -> Self {
        Self::new(DEFAULT_LEDGER_CAPACITY)
    }
}
