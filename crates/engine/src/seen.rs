//! 세션 내 방문 집합
//!
//! 렌더링된 요소 단위의 일회성 가드입니다. 영속 원장과 독립적이며
//! 세션이 끝나면 사라집니다.

use std::collections::HashSet;

use downvoter_core::types::ElementId;

/// 방문한 요소 집합
#[derive(Debug, Clone, Default)]
pub struct SeenSet {
    elements: HashSet<ElementId>,
}

impl SeenSet {
    /// 빈 집합을 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 요소를 방문 처리합니다. 처음 방문이면 true입니다.
    pub fn mark(&mut self, element: ElementId) -> bool {
        self.elements.insert(element)
    }

    /// 이미 방문한 요소인지 확인합니다.
    pub fn contains(&self, element: ElementId) -> bool {
        self.elements.contains(&element)
    }

    /// 방문한 요소 수
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// 비어 있는지 여부
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
