//! # Fetch Target Queue Tests
//!
//! Supply and demand hand-off, exhausted-target skipping, squash, and the
//! contiguity of the targets the BPU produces.

use frontsim_core::DecoupledBpu;
use frontsim_core::bpu::{FetchTargetQueue, FtqEntry, RESET_PC};
use frontsim_core::config::BpuConfig;
use proptest::collection::vec;
use proptest::prelude::*;

fn target(start_pc: u64, end_pc: u64, fsq_id: u64) -> FtqEntry {
    FtqEntry {
        start_pc,
        end_pc,
        taken_pc: 0,
        taken: false,
        target: end_pc,
        fsq_id,
    }
}

#[test]
fn test_new_queue_starts_at_reset_pc() {
    let ftq = FetchTargetQueue::new(4);
    assert!(ftq.is_empty());
    assert_eq!(ftq.enq_state().pc, RESET_PC);
    assert_eq!(ftq.enq_state().stream_id, 1);
    assert_eq!(ftq.demand_target_id(), 0);
    assert!(!ftq.fetch_target_available());
}

#[test]
fn test_supply_hands_out_demanded_target() {
    let mut ftq = FetchTargetQueue::new(4);
    assert!(!ftq.try_supply_fetch_with_target(0x1000));

    ftq.enqueue(target(0x1000, 0x1040, 1));
    assert!(ftq.try_supply_fetch_with_target(0x1000));
    assert!(ftq.fetch_target_available());
    assert_eq!(ftq.supplying_target().map(|e| e.start_pc), Some(0x1000));
    assert_eq!(ftq.supplying_target_id(), 0);
}

#[test]
fn test_finish_advances_demand() {
    let mut ftq = FetchTargetQueue::new(4);
    ftq.enqueue(target(0x1000, 0x1040, 1));
    ftq.enqueue(target(0x1040, 0x1080, 2));
    assert!(ftq.try_supply_fetch_with_target(0x1000));

    ftq.finish_current_fetch_target();
    assert_eq!(ftq.demand_target_id(), 1);
    assert!(!ftq.fetch_target_available());
    assert_eq!(ftq.len(), 1);

    assert!(ftq.try_supply_fetch_with_target(0x1040));
    assert_eq!(ftq.supplying_target().map(|e| e.fsq_id), Some(2));
}

#[test]
fn test_exhausted_target_is_skipped() {
    let mut ftq = FetchTargetQueue::new(4);
    ftq.enqueue(target(0x1000, 0x1040, 1));
    ftq.enqueue(target(0x1040, 0x1080, 2));

    assert!(ftq.try_supply_fetch_with_target(0x1040));
    assert_eq!(ftq.supplying_target_id(), 1);
    assert!(ftq.get(0).is_none());
}

#[test]
fn test_skip_without_successor_reports_unavailable() {
    let mut ftq = FetchTargetQueue::new(4);
    ftq.enqueue(target(0x1000, 0x1040, 1));
    assert!(!ftq.try_supply_fetch_with_target(0x1040));
    assert_eq!(ftq.demand_target_id(), 1);
}

#[test]
fn test_full_queue() {
    let mut ftq = FetchTargetQueue::new(2);
    ftq.enqueue(target(0x1000, 0x1040, 1));
    assert!(!ftq.full());
    ftq.enqueue(target(0x1040, 0x1080, 2));
    assert!(ftq.full());
}

#[test]
fn test_squash_restarts_both_cursors() {
    let mut ftq = FetchTargetQueue::new(4);
    ftq.enqueue(target(0x1000, 0x1040, 1));
    ftq.enqueue(target(0x1040, 0x1080, 2));
    assert!(ftq.try_supply_fetch_with_target(0x1000));

    ftq.squash(7, 5, 0x2000);
    assert!(ftq.is_empty());
    assert!(!ftq.fetch_target_available());
    assert_eq!(ftq.demand_target_id(), 7);
    assert_eq!(ftq.enq_state().next_target_id, 7);
    assert_eq!(ftq.enq_state().stream_id, 5);
    assert_eq!(ftq.enq_state().pc, 0x2000);

    ftq.enqueue(target(0x2000, 0x2040, 5));
    assert!(ftq.try_supply_fetch_with_target(0x2000));
    assert_eq!(ftq.supplying_target_id(), 7);
}

#[test]
fn test_next_pc_follows_taken_branch() {
    let taken = FtqEntry {
        start_pc: 0x1000,
        end_pc: 0x1014,
        taken_pc: 0x1010,
        taken: true,
        target: 0x4000,
        fsq_id: 1,
    };
    assert_eq!(taken.next_pc(), 0x4000);
    assert_eq!(target(0x1000, 0x1040, 1).next_pc(), 0x1040);
}

// ──────────────────────────────────────────────────────────
// Contiguity under random traffic
// ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Op {
    Tick,
    Consume,
    Squash(u16),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Tick),
        2 => Just(Op::Consume),
        1 => (0u16..64).prop_map(Op::Squash),
    ]
}

fn assert_contiguous(bpu: &DecoupledBpu) -> Result<(), TestCaseError> {
    let entries: Vec<(u64, FtqEntry)> = bpu.ftq().iter().map(|(&id, e)| (id, *e)).collect();
    for pair in entries.windows(2) {
        let ((id_a, a), (id_b, b)) = (pair[0], pair[1]);
        prop_assert_eq!(id_b, id_a + 1);
        prop_assert_eq!(b.start_pc, a.next_pc(), "target {} does not start where {} ends", id_b, id_a);
        prop_assert!(b.fsq_id > a.fsq_id);
    }
    if let Some((_, first)) = entries.first() {
        prop_assert!(first.start_pc < first.end_pc);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_targets_stay_contiguous(ops in vec(op(), 1..80)) {
        let mut bpu = DecoupledBpu::new(&BpuConfig::default()).unwrap();
        bpu.reset_pc(0x1000);
        let mut fetch_pc = 0x1000;

        for op in ops {
            match op {
                Op::Tick => {
                    bpu.tick().unwrap();
                    let _ = bpu.try_supply_fetch_with_target(fetch_pc);
                }
                Op::Consume => {
                    if let Some(entry) = bpu.supplying_fetch_target().copied() {
                        let (taken, run_out, next) = bpu
                            .decoupled_predict(entry.start_pc, entry.end_pc - entry.start_pc)
                            .unwrap();
                        prop_assert!(!taken);
                        prop_assert!(run_out);
                        prop_assert_eq!(next, entry.end_pc);
                        fetch_pc = next;
                    }
                }
                Op::Squash(k) => {
                    let ids: Vec<u64> = bpu.streams().map(|(&id, _)| id).collect();
                    if !ids.is_empty() {
                        let sid = ids[usize::from(k) % ids.len()];
                        let inst_pc = bpu.stream(sid).unwrap().start_pc;
                        let redirect = 0x4000 + 2 * u64::from(k);
                        let target_id = bpu.supplying_target_id();
                        let pc = bpu.non_control_squash(target_id, sid, inst_pc, redirect).unwrap();
                        prop_assert_eq!(pc, redirect);
                        prop_assert!(bpu.ftq().is_empty());
                        fetch_pc = redirect;
                    }
                }
            }
            assert_contiguous(&bpu)?;
        }
    }
}
