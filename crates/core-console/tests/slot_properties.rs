//! Property tests for slot table placement under arbitrary operation mixes.

use core_console::LineId;
use core_console::slots::{LinePosition, SlotTable};
use proptest::prelude::*;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
enum Op {
    Acquire(u64),
    Release(u64),
    Update(u64, u8),
    Resize(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u64..12).prop_map(Op::Acquire),
        3 => (0u64..12).prop_map(Op::Release),
        3 => (0u64..12, any::<u8>()).prop_map(|(id, v)| Op::Update(id, v)),
        1 => (0usize..6).prop_map(Op::Resize),
    ]
}

fn check_layout(t: &SlotTable) -> Result<(), TestCaseError> {
    let bound: Vec<LineId> = t.slots().iter().filter_map(|s| s.owner()).collect();
    let queued: Vec<LineId> = t.queued().collect();
    let mut all = bound.clone();
    all.extend(queued.iter().copied());
    let total = all.len();
    all.sort_unstable();
    all.dedup();
    prop_assert_eq!(all.len(), total, "a line is placed twice");
    if !queued.is_empty() {
        prop_assert!(t.slots().iter().all(|s| !s.is_free()), "free slot while lines wait");
    }
    for (q, id) in queued.iter().enumerate() {
        prop_assert_eq!(t.position(*id), LinePosition::Queued(q));
    }
    Ok(())
}

proptest! {
    #[test]
    fn placement_invariants_hold(initial in 0usize..5, ops in prop::collection::vec(op(), 1..80)) {
        let mut t = SlotTable::new(initial);
        // Expected overflow order; resynced after resizes, which may evict.
        let mut queue: VecDeque<LineId> = VecDeque::new();

        for op in ops {
            match op {
                Op::Acquire(raw) => {
                    let id = LineId::from_raw(raw);
                    let known = t.position(id) != LinePosition::Absent;
                    let had_free = t.slots().iter().any(|s| s.is_free());
                    t.acquire(id);
                    if !known && !had_free {
                        queue.push_back(id);
                    }
                }
                Op::Release(raw) => {
                    let id = LineId::from_raw(raw);
                    match t.position(id) {
                        LinePosition::Slot(_) => {
                            prop_assert!(t.release(id));
                            if let Some(next) = queue.pop_front() {
                                prop_assert_eq!(t.slot_of(next), Some(t.len() - 1));
                            }
                        }
                        LinePosition::Queued(q) => {
                            prop_assert!(!t.release(id));
                            queue.remove(q);
                        }
                        LinePosition::Absent => prop_assert!(!t.release(id)),
                    }
                }
                Op::Update(raw, v) => {
                    let id = LineId::from_raw(raw);
                    let text = format!("step {v}");
                    let visible = t.update(id, text.clone());
                    prop_assert_eq!(visible, t.slot_of(id).is_some());
                    if t.position(id) != LinePosition::Absent {
                        prop_assert_eq!(t.text_of(id), Some(text.as_str()));
                    }
                }
                Op::Resize(n) => {
                    let before = t.bound_count() + t.queued_len();
                    t.resize(n);
                    prop_assert_eq!(t.len(), n);
                    prop_assert_eq!(t.bound_count() + t.queued_len(), before, "resize lost a line");
                    queue = t.queued().collect();
                }
            }
            check_layout(&t)?;
            prop_assert_eq!(t.queued().collect::<Vec<_>>(), Vec::from(queue.clone()));
        }
    }

    #[test]
    fn every_change_is_reported_once(n in 1usize..6, lines in 1u64..10) {
        let mut t = SlotTable::new(n);
        for raw in 0..lines {
            let id = LineId::from_raw(raw);
            t.acquire(id);
            t.update(id, format!("line {raw}"));
        }
        let first = t.take_changes();
        prop_assert_eq!(first.len(), n);
        prop_assert!(first.iter().all(Option::is_some));
        prop_assert!(t.take_changes().iter().all(Option::is_none));
        t.invalidate_all();
        prop_assert!(t.take_changes().iter().all(Option::is_some));
    }
}
