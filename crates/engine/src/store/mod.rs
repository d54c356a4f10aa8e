//! 영속 저장소 -- [`StateStore`] 구현과 값 인코딩 헬퍼
//!
//! - [`MemoryStore`]: 프로세스 내부 맵 (테스트, `memory` 백엔드)
//! - [`FileStore`]: 디스크의 JSON 문서 하나 (`file` 백엔드)
//! - [`StoreBackend`]: 설정으로 선택되는 백엔드
//!
//! 두 구현 모두 값이 실제로 바뀐 키마다 [`StorageChange`]를 발행합니다.

pub mod file;
pub mod memory;

pub use downvoter_core::types::StorageKey;
pub use file::FileStore;
pub use memory::MemoryStore;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;

use downvoter_core::config::DownvoterConfig;
use downvoter_core::error::StorageError;
use downvoter_core::event::StorageChange;
use downvoter_core::pipeline::{StateSnapshot, StateStore};

use crate::error::EngineError;

/// 변경 알림 채널 용량
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// 설정으로 선택되는 저장소 백엔드
#[derive(Debug, Clone)]
pub enum StoreBackend {
    /// 프로세스 내부 저장소
    Memory(MemoryStore),
    /// 파일 저장소
    File(FileStore),
}

impl StoreBackend {
    /// `[storage]` 설정에 맞는 백엔드를 엽니다.
    pub fn from_config(config: &DownvoterConfig) -> Result<Self, EngineError> {
        let namespace = config.storage.namespace.clone();
        match config.storage.backend.as_str() {
            "memory" => Ok(Self::Memory(MemoryStore::new(namespace))),
            "file" => Ok(Self::File(FileStore::new(config.state_path(), namespace))),
            other => Err(EngineError::Config {
                field: "storage.backend".to_owned(),
                reason: format!("unknown backend '{other}'"),
            }),
        }
    }

    /// 백엔드 이름
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            Self::File(_) => "file",
        }
    }
}

impl StateStore for StoreBackend {
    fn namespace(&self) -> &str {
        match self {
            Self::Memory(store) => store.namespace(),
            Self::File(store) => store.namespace(),
        }
    }

    async fn get(&self, keys: &[StorageKey]) -> Result<StateSnapshot, StorageError> {
        match self {
            Self::Memory(store) => store.get(keys).await,
            Self::File(store) => store.get(keys).await,
        }
    }

    async fn set(&self, values: StateSnapshot) -> Result<(), StorageError> {
        match self {
            Self::Memory(store) => store.set(values).await,
            Self::File(store) => store.set(values).await,
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        match self {
            Self::Memory(store) => store.subscribe(),
            Self::File(store) => store.subscribe(),
        }
    }
}

/// 저장된 JSON 값을 타입으로 해석합니다.
pub fn decode_value<T: DeserializeOwned>(
    key: StorageKey,
    value: &serde_json::Value,
) -> Result<T, EngineError> {
    T::deserialize(value).map_err(|e| EngineError::Decode {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// 값을 저장용 JSON으로 변환합니다.
pub fn encode_value<T: Serialize>(key: StorageKey, value: &T) -> Result<serde_json::Value, EngineError> {
    serde_json::to_value(value).map_err(|e| {
        EngineError::Storage(StorageError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })
    })
}

/// 키 하나를 읽어 해석합니다. 저장되지 않은 키는 `None`입니다.
pub async fn read_value<S, T>(store: &S, key: StorageKey) -> Result<Option<T>, EngineError>
where
    S: StateStore,
    T: DeserializeOwned,
{
    let snapshot = store.get(&[key]).await?;
    match snapshot.get(&key) {
        Some(serde_json::Value::Null) | None => Ok(None),
        Some(value) => decode_value(key, value).map(Some),
    }
}

/// 키 하나를 기록합니다.
pub async fn write_value<S, T>(store: &S, key: StorageKey, value: &T) -> Result<(), EngineError>
where
    S: StateStore,
    T: Serialize,
{
    let encoded = encode_value(key, value)?;
    store.set(StateSnapshot::from([(key, encoded)])).await?;
    Ok(())
}

/// 기존 스냅샷과 새 값을 비교해 바뀐 키의 변경 알림을 만듭니다.
pub(crate) fn diff_changes(
    namespace: &str,
    current: &mut StateSnapshot,
    updates: StateSnapshot,
) -> Vec<StorageChange> {
    let mut changes = Vec::new();
    for (key, new_value) in updates {
        let old_value = current.insert(key, new_value.clone());
        if old_value.as_ref() != Some(&new_value) {
            changes.push(StorageChange::new(
                namespace,
                key,
                old_value,
                Some(new_value),
            ));
        }
    }
    changes
}
