//! 프로세스 내부 저장소

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, broadcast};

use downvoter_core::error::StorageError;
use downvoter_core::event::StorageChange;
use downvoter_core::pipeline::{StateSnapshot, StateStore};
use downvoter_core::types::StorageKey;

use super::{CHANGE_CHANNEL_CAPACITY, diff_changes};

/// 메모리 저장소
///
/// 복제본은 같은 상태와 알림 채널을 공유합니다.
/// `set_failing(true)`이면 모든 읽기/쓰기가 [`StorageError::Unavailable`]로 실패합니다.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Debug)]
struct MemoryInner {
    namespace: String,
    values: Mutex<StateSnapshot>,
    failing: AtomicBool,
    changes: broadcast::Sender<StorageChange>,
}

impl MemoryStore {
    /// 빈 저장소를 생성합니다.
    pub fn new(namespace: impl Into<String>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(MemoryInner {
                namespace: namespace.into(),
                values: Mutex::new(StateSnapshot::new()),
                failing: AtomicBool::new(false),
                changes,
            }),
        }
    }

    /// 실패 모드를 켜거나 끕니다.
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    /// 현재 저장된 전체 값 (알림 없이 읽기)
    pub async fn snapshot(&self) -> StateSnapshot {
        self.inner.values.lock().await.clone()
    }

    /// 외부 편집기가 보낸 것 같은 변경 알림을 직접 발행합니다.
    ///
    /// 저장된 값은 바꾸지 않습니다.
    pub fn notify(&self, change: StorageChange) {
        // 구독자가 없으면 버려집니다
        let _ = self.inner.changes.send(change);
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.inner.failing.load(Ordering::SeqCst) {
            Err(StorageError::Unavailable(
                "memory store is in failing mode".to_owned(),
            ))
        } else {
            Ok(())
        }
    }
}

impl StateStore for MemoryStore {
    fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    async fn get(&self, keys: &[StorageKey]) -> Result<StateSnapshot, StorageError> {
        self.check_available()?;
        let values = self.inner.values.lock().await;
        Ok(keys
            .iter()
            .filter_map(|key| values.get(key).map(|v| (*key, v.clone())))
            .collect())
    }

    async fn set(&self, updates: StateSnapshot) -> Result<(), StorageError> {
        self.check_available()?;
        let changes = {
            let mut values = self.inner.values.lock().await;
            diff_changes(&self.inner.namespace, &mut values, updates)
        };
        for change in changes {
            let _ = self.inner.changes.send(change);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.inner.changes.subscribe()
    }
}
