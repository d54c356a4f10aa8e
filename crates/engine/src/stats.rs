//! 통계 집계기 -- 영속 통계의 읽기-수정-쓰기
//!
//! `increment`는 쓰기 직전에 저장소의 통계를 다시 읽습니다.
//! 동시 쓰기 경합은 마지막 쓰기가 이깁니다.

use std::sync::Arc;

use downvoter_core::pipeline::StateStore;
use downvoter_core::types::{StatsState, StorageKey};

use crate::error::EngineError;
use crate::store::{read_value, write_value};

/// 통계 집계기
#[derive(Debug)]
pub struct StatsAggregator<S> {
    store: Arc<S>,
}

impl<S> Clone for StatsAggregator<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: StateStore> StatsAggregator<S> {
    /// 저장소 위에 집계기를 생성합니다.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// 현재 저장된 통계. 저장되지 않았으면 0입니다.
    pub async fn current(&self) -> Result<StatsState, EngineError> {
        Ok(read_value(self.store.as_ref(), StorageKey::Stats)
            .await?
            .unwrap_or_default())
    }

    /// `total`과 `by_user[label]`을 1씩 증가시키고 기록합니다.
    ///
    /// 기록된 새 통계를 반환합니다.
    pub async fn increment(&self, label: &str) -> Result<StatsState, EngineError> {
        let mut stats = self.current().await?;
        stats.increment(label);
        write_value(self.store.as_ref(), StorageKey::Stats, &stats).await?;
        Ok(stats)
    }

    /// 통계를 0으로 초기화합니다 (단일 쓰기).
    pub async fn reset(&self) -> Result<(), EngineError> {
        write_value(self.store.as_ref(), StorageKey::Stats, &StatsState::zero()).await?;
        tracing::info!("stats reset");
        Ok(())
    }
}
