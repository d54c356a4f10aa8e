//! 비추천 컨트롤 이펙터
//!
//! [`RawComment::vote`]에 기록된 컨트롤 상태를 보고 액션 적용 여부를 판단합니다.
//! `invoke`는 복제본끼리 공유하는 카운터를 증가시킵니다. CLI는 실행 요약에
//! 이 값을 출력하고, 테스트는 실제로 눌린 횟수를 검증합니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use downvoter_core::pipeline::Effector;
use downvoter_core::types::ElementId;

use crate::source::RawComment;

/// 이미 적용된 상태를 나타내는 CSS 클래스
const APPLIED_CLASSES: [&str; 3] = ["voted", "active", "downvoted"];

/// 찾은 비추천 컨트롤
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteHandle {
    /// 컨트롤이 속한 요소
    pub element: ElementId,
    /// `aria-pressed` 상태
    pub pressed: bool,
    /// CSS 클래스 목록
    pub classes: Vec<String>,
}

/// 비추천 컨트롤 이펙터
#[derive(Debug, Clone, Default)]
pub struct VoteControlEffector {
    presses: Arc<AtomicU64>,
}

impl VoteControlEffector {
    /// 카운터 0으로 이펙터를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 누른 횟수
    pub fn press_count(&self) -> u64 {
        self.presses.load(Ordering::Relaxed)
    }

    /// 카운터를 0으로 되돌리고 이전 값을 반환합니다.
    pub fn take_press_count(&self) -> u64 {
        self.presses.swap(0, Ordering::Relaxed)
    }
}

impl Effector<RawComment> for VoteControlEffector {
    type Handle = VoteHandle;

    fn locate(&self, element: ElementId, comment: &RawComment) -> Option<VoteHandle> {
        comment
            .vote
            .as_ref()
            .filter(|vote| vote.present)
            .map(|vote| VoteHandle {
                element,
                pressed: vote.pressed,
                classes: vote.classes.clone(),
            })
    }

    fn is_already_applied(&self, handle: &VoteHandle) -> bool {
        handle.pressed
            || handle
                .classes
                .iter()
                .any(|class| APPLIED_CLASSES.contains(&class.as_str()))
    }

    fn invoke(&self, handle: &VoteHandle) {
        tracing::debug!(element = %handle.element, "pressing downvote control");
        self.presses.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::VoteControl;

    fn comment(vote: Option<VoteControl>) -> RawComment {
        RawComment {
            vote,
            ..RawComment::default()
        }
    }

    #[test]
    fn locate_requires_present_control() {
        let effector = VoteControlEffector::new();
        assert!(effector.locate(ElementId(1), &comment(None)).is_none());

        let hidden = VoteControl {
            present: false,
            ..VoteControl::default()
        };
        assert!(effector.locate(ElementId(1), &comment(Some(hidden))).is_none());

        let handle = effector
            .locate(ElementId(1), &comment(Some(VoteControl::default())))
            .unwrap();
        assert_eq!(handle.element, ElementId(1));
    }

    #[test]
    fn applied_state_from_pressed_or_classes() {
        let effector = VoteControlEffector::new();
        let handle = |pressed: bool, classes: &[&str]| VoteHandle {
            element: ElementId(1),
            pressed,
            classes: classes.iter().map(|c| (*c).to_owned()).collect(),
        };

        assert!(!effector.is_already_applied(&handle(false, &[])));
        assert!(!effector.is_already_applied(&handle(false, &["vote-down", "voted-up"])));
        assert!(effector.is_already_applied(&handle(true, &[])));
        assert!(effector.is_already_applied(&handle(false, &["vote-down", "downvoted"])));
        assert!(effector.is_already_applied(&handle(false, &["active"])));
    }

    #[test]
    fn invoke_counts_presses_across_clones() {
        let effector = VoteControlEffector::new();
        let observer = effector.clone();
        let handle = effector
            .locate(ElementId(7), &comment(Some(VoteControl::default())))
            .unwrap();

        effector.invoke(&handle);
        effector.invoke(&handle);
        assert_eq!(observer.press_count(), 2);
        assert_eq!(observer.take_press_count(), 2);
        assert_eq!(effector.press_count(), 0);
    }

    #[test]
    fn many_presses_keep_constant_size() {
        let effector = VoteControlEffector::new();
        let handle = VoteHandle {
            element: ElementId(1),
            pressed: false,
            classes: Vec::new(),
        };
        for _ in 0..10_000 {
            effector.invoke(&handle);
        }
        assert_eq!(effector.press_count(), 10_000);
        assert_eq!(
            std::mem::size_of_val(&effector),
            std::mem::size_of::<Arc<AtomicU64>>()
        );
    }
}
