//! # History Tests
//!
//! Shift register semantics, the history ledger, and exact rollback of the
//! live global history across squashes.

use frontsim_core::DecoupledBpu;
use frontsim_core::bpu::{BranchInfo, HistoryManager, HistoryRegister};
use frontsim_core::config::BpuConfig;
use proptest::collection::vec;
use proptest::prelude::*;

use crate::common::builder::cond;

// ──────────────────────────────────────────────────────────
// HistoryRegister
// ──────────────────────────────────────────────────────────

#[test]
fn test_shift_in_writes_newest_bit() {
    let mut h = HistoryRegister::new(8);
    h.shift_in(1, true);
    h.shift_in(1, false);
    h.shift_in(1, true);
    assert_eq!(h.low_bits(3), 0b101);
    assert!(h.bit(0));
    assert!(!h.bit(1));
    assert!(h.bit(2));
}

#[test]
fn test_multi_bit_shift_pads_with_not_taken() {
    let mut h = HistoryRegister::new(8);
    h.shift_in(1, true);
    h.shift_in(3, true);
    assert_eq!(h.low_bits(4), 0b1001);
}

#[test]
fn test_zero_shift_is_noop() {
    let mut h = HistoryRegister::new(8);
    h.shift_in(1, true);
    let before = h.clone();
    h.shift_in(0, false);
    assert_eq!(h, before);
}

#[test]
fn test_old_bits_fall_off() {
    let mut h = HistoryRegister::new(4);
    h.shift_in(1, true);
    h.shift_in(4, false);
    assert_eq!(h.low_bits(4), 0);
    h.shift_in(1, true);
    h.shift_in(9, true);
    assert_eq!(h.low_bits(4), 0b0001);
}

#[test]
fn test_bits_past_end_read_zero() {
    let mut h = HistoryRegister::new(2);
    h.shift_in(1, true);
    assert!(!h.bit(5));
}

#[test]
fn test_path_history_ignores_not_taken() {
    let mut h = HistoryRegister::new(16);
    h.path_shift_in(1, false, 0x1234);
    assert_eq!(h.low_bits(16), 0);
    h.path_shift_in(1, true, 0x1234);
    let hash = (0x1234u64 >> 1) ^ (0x1234 >> 3) ^ (0x1234 >> 5) ^ (0x1234 >> 7);
    assert_eq!(h.low_bits(2), hash & 0b11);
}

#[test]
fn test_fold_xors_chunks() {
    let mut h = HistoryRegister::new(16);
    for taken in [true, false, true, true, false, false, true, false] {
        h.shift_in(1, taken);
    }
    let low8 = h.low_bits(8);
    assert_eq!(h.fold(8, 4), (low8 & 0xF) ^ (low8 >> 4));
    assert_eq!(h.fold(8, 8), low8);
}

// ──────────────────────────────────────────────────────────
// HistoryManager
// ──────────────────────────────────────────────────────────

fn ledger(records: &[(u64, usize, bool)]) -> HistoryManager {
    let mut m = HistoryManager::new(8);
    for &(stream_id, shamt, taken) in records {
        m.add_speculative_hist(0x1000 * stream_id, shamt, taken, &BranchInfo::default(), stream_id);
    }
    m
}

#[test]
fn test_ideal_history_replays_records() {
    let m = ledger(&[(1, 1, true), (2, 0, false), (3, 2, true)]);
    let (ideal, size) = m.ideal_history(16);
    assert_eq!(size, 3);
    assert_eq!(ideal.low_bits(3), 0b101);
}

#[test]
fn test_commit_trims_oldest_records() {
    let mut m = ledger(&[(1, 1, true), (2, 1, false), (3, 1, true)]);
    m.commit(2);
    assert_eq!(m.len(), 1);
    assert_eq!(m.entries().next().map(|e| e.stream_id), Some(3));
}

#[test]
fn test_squash_rewrites_and_truncates() {
    let mut m = ledger(&[(1, 1, true), (2, 2, true), (3, 1, true)]);
    let br = cond(0x2000, 0x3000);
    m.squash(2, 1, false, &br);

    let records: Vec<_> = m.entries().map(|e| (e.stream_id, e.shamt, e.cond_taken)).collect();
    assert_eq!(records, vec![(1, 1, true), (2, 1, false)]);
    assert_eq!(m.entries().last().map(|e| e.ret_addr), Some(0x2004));
}

#[test]
fn test_check_history_detects_divergence() {
    let m = ledger(&[(1, 1, true), (2, 1, false)]);
    let mut real = HistoryRegister::new(16);
    real.shift_in(1, true);
    real.shift_in(1, false);
    assert_eq!(m.check_history(&real), Ok(()));

    real.shift_in(1, true);
    assert_eq!(m.check_history(&real), Err(2));
}

#[test]
fn test_empty_ledger_checks_nothing() {
    let m = HistoryManager::new(8);
    let mut real = HistoryRegister::new(16);
    real.shift_in(1, true);
    assert_eq!(m.check_history(&real), Ok(()));
}

// ──────────────────────────────────────────────────────────
// Rollback through the BPU
// ──────────────────────────────────────────────────────────

fn tick_until(bpu: &mut DecoupledBpu, done: impl Fn(&DecoupledBpu) -> bool) {
    for _ in 0..16 {
        if done(bpu) {
            return;
        }
        bpu.tick().expect("bpu tick");
    }
    assert!(done(bpu), "condition not reached within 16 cycles");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Every squash resolves the youngest stream with one conditional. The
    /// global history afterwards must equal the outcomes replayed in order,
    /// whatever was speculated in between.
    #[test]
    fn test_squash_rollback_matches_resolved_outcomes(
        outcomes in vec((any::<bool>(), 0usize..4), 1..10)
    ) {
        let mut bpu = DecoupledBpu::new(&BpuConfig::default()).unwrap();
        bpu.reset_pc(0x1000);
        let mut expected = HistoryRegister::new(bpu.histories().global.len());

        for (taken, extra_ticks) in outcomes {
            let next = bpu.next_stream_id();
            tick_until(&mut bpu, |b| b.stream(next).is_some());
            for _ in 0..extra_ticks {
                bpu.tick().unwrap();
            }

            let youngest = bpu.next_stream_id() - 1;
            let start = bpu.stream(youngest).unwrap().start_pc;
            let br = cond(start, start + 0x100);
            let redirect = bpu.control_squash(0, youngest, &br, taken, true);
            prop_assert!(redirect.is_ok(), "history check failed: {redirect:?}");
            prop_assert_eq!(redirect.unwrap(), if taken { start + 0x100 } else { start + 4 });

            expected.shift_in(1, taken);
            prop_assert_eq!(&bpu.histories().global, &expected);
            prop_assert_eq!(bpu.next_stream_id(), youngest + 1);
        }
    }
}
