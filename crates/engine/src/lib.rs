#![doc = include_str!("../README.md")]
//!
//! # 모듈 구성
//!
//! - [`extract`]: 댓글 형태에서 외부 ID와 작성자 서명 추출
//! - [`rule`]: 규칙 매칭, 규칙 저장소 편집, YAML/JSON 가져오기
//! - [`ledger`]: 용량 제한 FIFO 중복 제거 원장
//! - [`stats`]: 영속 통계 읽기-수정-쓰기
//! - [`seen`]: 세션 내 요소 방문 집합
//! - [`store`]: `StateStore` 구현 (메모리, 파일)
//! - [`source`]: 발견 소스 (채널, JSON 줄)
//! - [`effector`]: 비추천 컨트롤 이펙터
//! - [`dispatcher`]: 댓글 단위 상태 머신
//! - [`pipeline`]: 처리 루프 (Pipeline trait 구현)
//! - [`config`]: 엔진 설정
//! - [`error`]: 도메인 에러 타입
//!
//! # 아키텍처
//!
//! ```text
//! Source -> Dispatcher -> IdentityExtractor -> DedupLedger -> RuleMatcher -> Effector
//!              ^                                    |                          |
//!         StorageChange <------ StateStore <--------+------ StatsAggregator <--+
//! ```

pub mod config;
pub mod dispatcher;
pub mod effector;
pub mod error;
pub mod extract;
pub mod ledger;
pub mod pipeline;
pub mod rule;
pub mod seen;
pub mod source;
pub mod stats;
pub mod store;

// --- 주요 타입 re-export ---

// 파이프라인
pub use dispatcher::{DispatchStats, Dispatcher};
pub use pipeline::{ModerationPipeline, ModerationPipelineBuilder};

// 설정
pub use config::{EngineConfig, EngineConfigBuilder};

// 에러
pub use error::EngineError;

// 추출/매칭
pub use extract::IdentityExtractor;
pub use rule::{
    MatchResult, MergeReport, RuleFormat, RuleLoader, RuleMatcher, RuleStore, UpsertOutcome,
};

// 상태
pub use ledger::DedupLedger;
pub use seen::SeenSet;
pub use stats::StatsAggregator;

// 저장소
pub use store::{FileStore, MemoryStore, StoreBackend};

// 소스/이펙터
pub use effector::{VoteControlEffector, VoteHandle};
pub use source::{
    ChannelSource, DiscoveredComment, DiscoverySource, JsonLinesSource, RawComment, VoteControl,
};
