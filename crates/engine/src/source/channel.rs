//! 채널 기반 발견 소스
//!
//! 외부 관찰자가 만든 `tokio::mpsc` 채널에서 배치를 받습니다.
//! 송신 측이 모두 닫히면 소스가 끝납니다.

use tokio::sync::mpsc;

use super::{DiscoveredComment, DiscoverySource};

/// 채널 발견 소스
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Vec<DiscoveredComment>>,
}

impl ChannelSource {
    /// 수신 채널로 소스를 생성합니다.
    pub fn new(rx: mpsc::Receiver<Vec<DiscoveredComment>>) -> Self {
        Self { rx }
    }

    /// 채널과 송신 측을 함께 생성합니다.
    pub fn channel(capacity: usize) -> (mpsc::Sender<Vec<DiscoveredComment>>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }
}

impl DiscoverySource for ChannelSource {
    async fn next_batch(&mut self) -> Option<Vec<DiscoveredComment>> {
        self.rx.recv().await
    }
}
