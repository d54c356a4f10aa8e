//! 검토 파이프라인 -- 발견 소스, 변경 알림, 디스패처를 하나의 루프로 묶습니다.
//!
//! [`ModerationPipeline`]은 core의 [`Pipeline`] trait을 구현합니다.
//!
//! # 내부 아키텍처
//! ```text
//! DiscoverySource --batch--> +------------+ --> Effector
//!                            | Dispatcher |
//! StateStore --changes-----> +------------+ --> ActionEvent mpsc
//!                                  |
//!                                  +--> JoinSet (영속 쓰기)
//! ```
//!
//! 루프는 `tokio::select!`로 취소 토큰, 변경 알림, 발견 배치를 기다립니다.
//! 변경 알림을 배치보다 먼저 확인합니다. 배치를 처리하기 전과 알림이 밀렸을 때는
//! 저장소를 다시 읽습니다. 소스가 끝나거나 취소되면 남은 쓰기를 기다린 뒤 종료합니다.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use downvoter_core::error::{DownvoterError, PipelineError};
use downvoter_core::event::{ActionEvent, StorageChange};
use downvoter_core::pipeline::{Effector, HealthStatus, Pipeline, StateStore};

use crate::config::EngineConfig;
use crate::dispatcher::{DispatchStats, Dispatcher};
use crate::error::EngineError;
use crate::source::{DiscoverySource, RawComment};

/// 파이프라인 실행 상태
#[derive(Debug, Clone, PartialEq, Eq)]
enum PipelineState {
    /// 초기화됨, 아직 시작하지 않음
    Initialized,
    /// 실행 중
    Running,
    /// 정지됨
    Stopped,
}

/// 처리 루프와 공유하는 상태
#[derive(Debug, Default)]
struct SharedState {
    stats: Mutex<DispatchStats>,
    lagged: AtomicU64,
    source_exhausted: AtomicBool,
}

impl SharedState {
    fn publish(&self, stats: DispatchStats) {
        *self.stats.lock().unwrap_or_else(|p| p.into_inner()) = stats;
    }

    fn snapshot(&self) -> DispatchStats {
        *self.stats.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// 검토 파이프라인
///
/// # 사용 예시
/// ```ignore
/// let (mut pipeline, event_rx) = ModerationPipelineBuilder::new()
///     .store(store)
///     .effector(VoteControlEffector::new())
///     .source(JsonLinesSource::new(reader))
///     .build()?;
///
/// pipeline.start().await?;
/// pipeline.wait().await;
/// pipeline.stop().await?;
/// ```
pub struct ModerationPipeline<S, E, D> {
    config: EngineConfig,
    state: PipelineState,
    store: Arc<S>,
    /// 시작 시 처리 루프로 이동
    effector: Option<E>,
    source: Option<D>,
    event_tx: Option<mpsc::Sender<ActionEvent>>,
    cancel: CancellationToken,
    shared: Arc<SharedState>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl<S, E, D> ModerationPipeline<S, E, D>
where
    S: StateStore,
    E: Effector<RawComment> + 'static,
    D: DiscoverySource + 'static,
{
    /// 현재 상태 이름
    pub fn state_name(&self) -> &str {
        match self.state {
            PipelineState::Initialized => "initialized",
            PipelineState::Running => "running",
            PipelineState::Stopped => "stopped",
        }
    }

    /// 지금까지의 처리 카운터
    pub fn dispatch_stats(&self) -> DispatchStats {
        self.shared.snapshot()
    }

    /// 놓친 변경 알림 수
    pub fn lagged_changes(&self) -> u64 {
        self.shared.lagged.load(Ordering::Relaxed)
    }

    /// 파이프라인 설정
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 처리 루프를 외부에서 취소할 토큰
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// 발견 소스가 끝나 처리 루프가 종료될 때까지 기다립니다.
    pub async fn wait(&mut self) {
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "moderation loop task failed");
            }
        }
    }
}

impl<S, E, D> Pipeline for ModerationPipeline<S, E, D>
where
    S: StateStore,
    E: Effector<RawComment> + 'static,
    D: DiscoverySource + 'static,
{
    async fn start(&mut self) -> Result<(), DownvoterError> {
        if self.state == PipelineState::Running {
            return Err(PipelineError::AlreadyRunning.into());
        }

        let (Some(effector), Some(source)) = (self.effector.take(), self.source.take()) else {
            return Err(PipelineError::InitFailed("discovery source already consumed".to_owned()).into());
        };

        tracing::info!(namespace = %self.config.namespace, "starting moderation pipeline");

        // 부트스트랩 읽기 이후의 변경을 놓치지 않도록 먼저 구독
        let changes = self.store.subscribe();

        let mut dispatcher =
            Dispatcher::bootstrap(Arc::clone(&self.store), effector, &self.config).await?;
        if let Some(tx) = self.event_tx.take() {
            dispatcher = dispatcher.with_events(tx);
        }

        let task = tokio::spawn(run_loop(
            dispatcher,
            source,
            changes,
            self.cancel.clone(),
            Arc::clone(&self.shared),
        ));
        self.tasks.push(task);

        self.state = PipelineState::Running;
        tracing::info!("moderation pipeline started");
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), DownvoterError> {
        if self.state != PipelineState::Running {
            return Err(PipelineError::NotRunning.into());
        }

        tracing::info!("stopping moderation pipeline");
        self.cancel.cancel();
        self.wait().await;

        self.state = PipelineState::Stopped;
        let stats = self.shared.snapshot();
        tracing::info!(
            processed = stats.processed,
            confirmed = stats.action_confirmed,
            write_failures = stats.write_failures,
            "moderation pipeline stopped"
        );
        Ok(())
    }

    fn health_check(&self) -> impl Future<Output = HealthStatus> + Send {
        std::future::ready(self.current_health())
    }
}

impl<S, E, D> ModerationPipeline<S, E, D> {
    fn current_health(&self) -> HealthStatus {
        match self.state {
            PipelineState::Running => {
                let lagged = self.shared.lagged.load(Ordering::Relaxed);
                if lagged > 0 {
                    HealthStatus::Degraded(format!(
                        "change stream lagged: {lagged} notifications skipped"
                    ))
                } else if self.shared.source_exhausted.load(Ordering::Relaxed) {
                    HealthStatus::Degraded("discovery source exhausted".to_owned())
                } else {
                    HealthStatus::Healthy
                }
            }
            PipelineState::Initialized => HealthStatus::Unhealthy("not started".to_owned()),
            PipelineState::Stopped => HealthStatus::Unhealthy("stopped".to_owned()),
        }
    }
}

async fn run_loop<S, E, D>(
    mut dispatcher: Dispatcher<S, E>,
    mut source: D,
    mut changes: broadcast::Receiver<StorageChange>,
    cancel: CancellationToken,
    shared: Arc<SharedState>,
) where
    S: StateStore,
    E: Effector<RawComment>,
    D: DiscoverySource,
{
    let mut changes_open = true;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                tracing::debug!("moderation loop cancelled");
                break;
            }

            change = changes.recv(), if changes_open => match change {
                Ok(change) => dispatcher.apply_change(&change),
                Err(RecvError::Lagged(skipped)) => {
                    shared.lagged.fetch_add(skipped, Ordering::Relaxed);
                    tracing::warn!(skipped, "change stream lagged, re-reading store");
                    dispatcher.refresh().await;
                }
                Err(RecvError::Closed) => {
                    tracing::debug!("change stream closed");
                    changes_open = false;
                }
            },

            batch = source.next_batch() => match batch {
                Some(batch) => {
                    tracing::debug!(size = batch.len(), "discovery batch received");
                    dispatcher.refresh().await;
                    dispatcher.process_batch(&batch);
                    shared.publish(dispatcher.stats());
                }
                None => {
                    tracing::info!("discovery source exhausted");
                    shared.source_exhausted.store(true, Ordering::Relaxed);
                    break;
                }
            },
        }
    }

    dispatcher.flush().await;
    shared.publish(dispatcher.stats());
}

/// 검토 파이프라인 빌더
pub struct ModerationPipelineBuilder<S, E, D> {
    config: EngineConfig,
    store: Option<Arc<S>>,
    effector: Option<E>,
    source: Option<D>,
    event_tx: Option<mpsc::Sender<ActionEvent>>,
}

impl<S, E, D> ModerationPipelineBuilder<S, E, D>
where
    S: StateStore,
    E: Effector<RawComment> + 'static,
    D: DiscoverySource + 'static,
{
    /// 새 빌더를 생성합니다.
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            store: None,
            effector: None,
            source: None,
            event_tx: None,
        }
    }

    /// 엔진 설정을 지정합니다.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// 영속 저장소를 지정합니다.
    pub fn store(mut self, store: Arc<S>) -> Self {
        self.store = Some(store);
        self
    }

    /// 이펙터를 지정합니다.
    pub fn effector(mut self, effector: E) -> Self {
        self.effector = Some(effector);
        self
    }

    /// 발견 소스를 지정합니다.
    pub fn source(mut self, source: D) -> Self {
        self.source = Some(source);
        self
    }

    /// 외부 액션 이벤트 전송 채널을 설정합니다.
    ///
    /// 설정하지 않으면 빌더가 새 채널을 생성합니다.
    pub fn event_sender(mut self, tx: mpsc::Sender<ActionEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 파이프라인을 빌드합니다.
    ///
    /// # Returns
    /// - `ModerationPipeline`: 파이프라인 인스턴스
    /// - `Option<mpsc::Receiver<ActionEvent>>`: 액션 이벤트 수신 채널
    ///   (외부 event_sender를 설정한 경우 None)
    pub fn build(
        self,
    ) -> Result<(ModerationPipeline<S, E, D>, Option<mpsc::Receiver<ActionEvent>>), EngineError>
    {
        self.config.validate()?;

        let store = self.store.ok_or_else(|| missing("store"))?;
        let effector = self.effector.ok_or_else(|| missing("effector"))?;
        let source = self.source.ok_or_else(|| missing("source"))?;

        let (event_tx, event_rx) = match self.event_tx {
            Some(tx) => (tx, None),
            None => {
                let (tx, rx) = mpsc::channel(self.config.event_channel_capacity);
                (tx, Some(rx))
            }
        };

        let pipeline = ModerationPipeline {
            config: self.config,
            state: PipelineState::Initialized,
            store,
            effector: Some(effector),
            source: Some(source),
            event_tx: Some(event_tx),
            cancel: CancellationToken::new(),
            shared: Arc::new(SharedState::default()),
            tasks: Vec::new(),
        };

        Ok((pipeline, event_rx))
    }
}

impl<S, E, D> Default for ModerationPipelineBuilder<S, E, D>
where
    S: StateStore,
    E: Effector<RawComment> + 'static,
    D: DiscoverySource + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

fn missing(field: &str) -> EngineError {
    EngineError::Config {
        field: field.to_owned(),
        reason: "required".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effector::VoteControlEffector;
    use crate::source::{ChannelSource, DiscoveredComment, VoteControl};
    use crate::store::MemoryStore;
    use downvoter_core::event::ActionOutcome;
    use downvoter_core::pipeline::StateSnapshot;
    use downvoter_core::types::{ElementId, StorageKey};

    type TestPipeline = ModerationPipeline<MemoryStore, VoteControlEffector, ChannelSource>;

    fn bob_comment(element: u64, post: u64) -> DiscoveredComment {
        DiscoveredComment::new(
            ElementId(element),
            RawComment {
                id: Some(format!("post-{post}")),
                author: "Bob".to_owned(),
                vote: Some(VoteControl::default()),
                ..RawComment::default()
            },
        )
    }

    fn build(
        store: Arc<MemoryStore>,
    ) -> (
        TestPipeline,
        mpsc::Receiver<ActionEvent>,
        mpsc::Sender<Vec<DiscoveredComment>>,
    ) {
        let (batch_tx, source) = ChannelSource::channel(8);
        let (pipeline, event_rx) = ModerationPipelineBuilder::new()
            .store(store)
            .effector(VoteControlEffector::new())
            .source(source)
            .build()
            .unwrap();
        (pipeline, event_rx.unwrap(), batch_tx)
    }

    #[test]
    fn builder_requires_source() {
        let result: Result<(TestPipeline, _), _> = ModerationPipelineBuilder::new()
            .store(Arc::new(MemoryStore::new("local")))
            .effector(VoteControlEffector::new())
            .build();
        assert!(matches!(result, Err(EngineError::Config { .. })));
    }

    #[test]
    fn builder_with_external_event_sender() {
        let (tx, _rx) = mpsc::channel(4);
        let (_batch_tx, source) = ChannelSource::channel(4);
        let (pipeline, rx): (TestPipeline, _) = ModerationPipelineBuilder::new()
            .store(Arc::new(MemoryStore::new("local")))
            .effector(VoteControlEffector::new())
            .source(source)
            .event_sender(tx)
            .build()
            .unwrap();
        assert!(rx.is_none());
        assert_eq!(pipeline.state_name(), "initialized");
    }

    #[tokio::test]
    async fn lifecycle() {
        let (mut pipeline, _events, _batches) = build(Arc::new(MemoryStore::new("local")));

        assert!(pipeline.health_check().await.is_unhealthy());
        assert!(pipeline.stop().await.is_err());

        pipeline.start().await.unwrap();
        assert!(pipeline.start().await.is_err());
        assert!(pipeline.health_check().await.is_healthy());

        pipeline.stop().await.unwrap();
        assert_eq!(pipeline.state_name(), "stopped");
        assert!(pipeline.start().await.is_err());
    }

    #[tokio::test]
    async fn lagged_change_stream_still_sees_latest_rules() {
        let store = Arc::new(MemoryStore::new("local"));
        let (mut pipeline, mut events, batches) = build(Arc::clone(&store));
        pipeline.start().await.unwrap();

        store
            .set(StateSnapshot::from([(
                StorageKey::Rules,
                serde_json::json!([{"username": "bob"}]),
            )]))
            .await
            .unwrap();
        // push the rule notification out of the receiver's window
        for _ in 0..300 {
            store.notify(StorageChange::new("sync", StorageKey::Stats, None, None));
        }

        batches.send(vec![bob_comment(1, 1)]).await.unwrap();
        assert!(events.recv().await.unwrap().outcome.is_confirmed());
        assert!(pipeline.lagged_changes() > 0);
        assert!(!pipeline.health_check().await.is_healthy());

        drop(batches);
        pipeline.wait().await;
        pipeline.stop().await.unwrap();
    }

    #[tokio::test]
    async fn processes_batches_until_source_ends() {
        let store = Arc::new(MemoryStore::new("local"));
        store
            .set(StateSnapshot::from([(
                StorageKey::Rules,
                serde_json::json!([{"username": "bob"}]),
            )]))
            .await
            .unwrap();
        let (mut pipeline, mut events, batches) = build(Arc::clone(&store));

        pipeline.start().await.unwrap();
        batches
            .send(vec![bob_comment(1, 1), bob_comment(2, 1)])
            .await
            .unwrap();
        drop(batches);
        pipeline.wait().await;

        let first = events.recv().await.unwrap();
        assert!(first.outcome.is_confirmed());
        let second = events.recv().await.unwrap();
        assert_eq!(second.outcome, ActionOutcome::SkippedAlreadyProcessed);

        let stats = pipeline.dispatch_stats();
        assert_eq!(stats.processed, 2);
        assert_eq!(stats.action_confirmed, 1);
        assert!(!pipeline.health_check().await.is_healthy());
        pipeline.stop().await.unwrap();
    }
}
