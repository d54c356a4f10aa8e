//! 파일 저장소 -- JSON 문서 하나에 모든 키를 보관합니다.
//!
//! 문서 형식:
//! ```json
//! {"rules": [...], "stats": {"total": 0, "byUser": {}}, "processedIds": ["42"]}
//! ```
//!
//! 쓰기는 문서를 읽고 갱신한 뒤 임시 파일에 기록하고 rename으로 교체합니다.
//! 알 수 없는 최상위 키는 그대로 보존합니다.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};

use downvoter_core::error::StorageError;
use downvoter_core::event::StorageChange;
use downvoter_core::pipeline::{StateSnapshot, StateStore};
use downvoter_core::types::StorageKey;

use super::{CHANGE_CHANNEL_CAPACITY, diff_changes};

/// 상태 파일 최대 크기
const MAX_STATE_FILE_SIZE: u64 = 64 * 1024 * 1024; // 64MB

type Document = serde_json::Map<String, serde_json::Value>;

/// 파일 저장소
///
/// 복제본은 같은 쓰기 잠금과 알림 채널을 공유합니다.
#[derive(Debug, Clone)]
pub struct FileStore {
    inner: Arc<FileInner>,
}

#[derive(Debug)]
struct FileInner {
    path: PathBuf,
    namespace: String,
    write_lock: Mutex<()>,
    changes: broadcast::Sender<StorageChange>,
}

impl FileStore {
    /// 파일 저장소를 생성합니다. 파일은 첫 쓰기 때 만들어집니다.
    pub fn new(path: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(FileInner {
                path: path.into(),
                namespace: namespace.into(),
                write_lock: Mutex::new(()),
                changes,
            }),
        }
    }

    /// 상태 파일 경로
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    async fn read_document(&self) -> Result<Document, StorageError> {
        let path = &self.inner.path;
        let metadata = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => return Err(unavailable(path, &e)),
        };

        if metadata.len() > MAX_STATE_FILE_SIZE {
            return Err(StorageError::Unavailable(format!(
                "{}: file too large: {} bytes (max: {MAX_STATE_FILE_SIZE})",
                path.display(),
                metadata.len()
            )));
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| unavailable(path, &e))?;
        if content.trim().is_empty() {
            return Ok(Document::new());
        }

        serde_json::from_str(&content).map_err(|e| StorageError::Serialization {
            key: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    async fn write_document(&self, document: &Document) -> Result<(), StorageError> {
        let path = &self.inner.path;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| unavailable(parent, &e))?;
        }

        let body = serde_json::to_vec_pretty(document).map_err(|e| {
            StorageError::Serialization {
                key: path.display().to_string(),
                reason: e.to_string(),
            }
        })?;

        let tmp = temp_path(path);
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| unavailable(&tmp, &e))?;
        if let Err(e) = tokio::fs::rename(&tmp, path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(unavailable(path, &e));
        }
        Ok(())
    }
}

impl StateStore for FileStore {
    fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    async fn get(&self, keys: &[StorageKey]) -> Result<StateSnapshot, StorageError> {
        let document = self.read_document().await?;
        Ok(keys
            .iter()
            .filter_map(|key| document.get(key.as_str()).map(|v| (*key, v.clone())))
            .collect())
    }

    async fn set(&self, updates: StateSnapshot) -> Result<(), StorageError> {
        let _guard = self.inner.write_lock.lock().await;

        let mut document = self.read_document().await?;
        let mut current: StateSnapshot = StorageKey::ALL
            .iter()
            .filter_map(|key| document.get(key.as_str()).map(|v| (*key, v.clone())))
            .collect();

        let changes = diff_changes(&self.inner.namespace, &mut current, updates);
        if changes.is_empty() {
            return Ok(());
        }

        for change in &changes {
            if let Some(value) = &change.new_value {
                document.insert(change.key.as_str().to_owned(), value.clone());
            }
        }
        self.write_document(&document).await?;

        tracing::debug!(
            path = %self.inner.path.display(),
            changed = changes.len(),
            "state file updated"
        );
        for change in changes {
            let _ = self.inner.changes.send(change);
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StorageChange> {
        self.inner.changes.subscribe()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state.json".to_owned());
    path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()))
}

fn unavailable(path: &Path, err: &std::io::Error) -> StorageError {
    StorageError::Unavailable(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state.json"), "local");
        let snapshot = store.get(&StorageKey::ALL).await.unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn set_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = FileStore::new(&path, "local");
        store
            .set(StateSnapshot::from([
                (StorageKey::Rules, json!([{"username": "bob", "keywords": []}])),
                (StorageKey::ProcessedIds, json!(["42"])),
            ]))
            .await
            .unwrap();

        let reopened = FileStore::new(&path, "local");
        let snapshot = reopened
            .get(&[StorageKey::ProcessedIds, StorageKey::Stats])
            .await
            .unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[&StorageKey::ProcessedIds], json!(["42"]));
    }

    #[tokio::test]
    async fn partial_set_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state.json"), "local");
        store
            .set(StateSnapshot::from([(StorageKey::Rules, json!([]))]))
            .await
            .unwrap();
        store
            .set(StateSnapshot::from([(StorageKey::Stats, json!({"total": 2}))]))
            .await
            .unwrap();

        let snapshot = store.get(&StorageKey::ALL).await.unwrap();
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn unknown_keys_are_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, r#"{"theme": "dark"}"#).await.unwrap();

        let store = FileStore::new(&path, "local");
        store
            .set(StateSnapshot::from([(StorageKey::Rules, json!([]))]))
            .await
            .unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&tokio::fs::read_to_string(&path).await.unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw["rules"], json!([]));
    }

    #[tokio::test]
    async fn corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, "{not json").await.unwrap();

        let store = FileStore::new(&path, "local");
        assert!(matches!(
            store.get(&[StorageKey::Rules]).await,
            Err(StorageError::Serialization { .. })
        ));
    }

    #[tokio::test]
    async fn writes_notify_subscribers_of_clones() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state.json"), "sync");
        let mut rx = store.subscribe();

        store
            .clone()
            .set(StateSnapshot::from([(StorageKey::Stats, json!({"total": 1}))]))
            .await
            .unwrap();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.namespace, "sync");
        assert_eq!(change.key, StorageKey::Stats);
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state.json"), "local");
        store
            .set(StateSnapshot::from([(StorageKey::Rules, json!([]))]))
            .await
            .unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["state.json"]);
    }
}
