//! # Decoupled BPU Tests
//!
//! The prediction cycle, queue backpressure, consumption through
//! `decoupled_predict`, squash recovery and commit.

use std::collections::VecDeque;

use frontsim_core::bpu::{BpuState, OverrideReason, RESET_PC, SquashType};
use frontsim_core::config::BpuConfig;
use frontsim_core::{DecoupledBpu, FrontendError};
use pretty_assertions::assert_eq;

use crate::common::builder::{call, cond, ret};

fn bpu_at(pc: u64) -> DecoupledBpu {
    bpu_with(BpuConfig::default(), pc)
}

fn bpu_with(config: BpuConfig, pc: u64) -> DecoupledBpu {
    let mut bpu = DecoupledBpu::new(&config).expect("valid config");
    bpu.reset_pc(pc);
    bpu
}

fn tick_until(bpu: &mut DecoupledBpu, done: impl Fn(&DecoupledBpu) -> bool) {
    for _ in 0..16 {
        if done(bpu) {
            return;
        }
        bpu.tick().expect("bpu tick");
    }
    assert!(done(bpu), "condition not reached within 16 cycles");
}

// ──────────────────────────────────────────────────────────
// Prediction cycle
// ──────────────────────────────────────────────────────────

#[test]
fn test_new_bpu_is_idle() {
    let bpu = DecoupledBpu::new(&BpuConfig::default()).unwrap();
    assert_eq!(bpu.state(), BpuState::Idle);
    assert_eq!(bpu.s0_pc(), RESET_PC);
    assert_eq!(bpu.next_stream_id(), 1);
    assert_eq!(bpu.fsq_len(), 0);
    assert!(bpu.ftq().is_empty());
}

#[test]
fn test_new_rejects_invalid_config() {
    let config = BpuConfig {
        num_stages: 1,
        ..BpuConfig::default()
    };
    assert!(matches!(DecoupledBpu::new(&config), Err(FrontendError::InvalidConfig(_))));
}

#[test]
fn test_first_tick_creates_fall_through_stream() {
    let mut bpu = bpu_at(0x1000);
    bpu.tick().unwrap();

    let stream = bpu.stream(1).expect("stream 1");
    assert_eq!(stream.start_pc, 0x1000);
    assert_eq!(stream.pred_end_pc, 0x1040);
    assert!(!stream.pred_taken);
    assert!(!stream.is_hit);
    assert_eq!(bpu.s0_pc(), 0x1040);
    assert_eq!(bpu.state(), BpuState::Idle);
    assert!(bpu.ftq().is_empty(), "targets are cut one cycle after the stream exists");
    assert_eq!(bpu.stats.fsq_not_ready_cycles, 1);
}

#[test]
fn test_second_tick_cuts_first_target() {
    let mut bpu = bpu_at(0x1000);
    bpu.tick().unwrap();
    bpu.tick().unwrap();

    assert_eq!(bpu.fsq_len(), 2);
    let target = bpu.ftq().get(0).copied().expect("target 0");
    assert_eq!(target.start_pc, 0x1000);
    assert_eq!(target.end_pc, 0x1040);
    assert_eq!(target.fsq_id, 1);
    assert!(!target.taken);
    assert_eq!(bpu.ftq().enq_state().pc, 0x1040);
    assert_eq!(bpu.ftq().enq_state().stream_id, 2);
}

#[test]
fn test_fsq_full_stops_prediction() {
    let config = BpuConfig {
        fsq_size: 2,
        ..BpuConfig::default()
    };
    let mut bpu = bpu_with(config, 0x1000);
    for _ in 0..5 {
        bpu.tick().unwrap();
    }
    assert_eq!(bpu.fsq_len(), 2);
    assert_eq!(bpu.next_stream_id(), 3);
    assert_eq!(bpu.stats.fsq_full_cycles, 3);

    bpu.update(1);
    bpu.tick().unwrap();
    assert!(bpu.stream(3).is_some());
}

#[test]
fn test_ftq_full_stops_target_production() {
    let config = BpuConfig {
        ftq_size: 1,
        ..BpuConfig::default()
    };
    let mut bpu = bpu_with(config, 0x1000);
    for _ in 0..4 {
        bpu.tick().unwrap();
    }
    assert_eq!(bpu.ftq().len(), 1);
    assert_eq!(bpu.stats.ftq_full_cycles, 2);
}

// ──────────────────────────────────────────────────────────
// Consumption
// ──────────────────────────────────────────────────────────

#[test]
fn test_predict_without_target_runs_out() {
    let mut bpu = bpu_at(0x1000);
    assert_eq!(bpu.decoupled_predict(0x1000, 4).unwrap(), (false, true, 0x1004));
}

#[test]
fn test_predict_outside_target_is_fatal() {
    let mut bpu = bpu_at(0x1000);
    bpu.tick().unwrap();
    bpu.tick().unwrap();
    assert!(bpu.try_supply_fetch_with_target(0x1000));

    let err = bpu.decoupled_predict(0x2000, 4).unwrap_err();
    assert_eq!(
        err,
        FrontendError::PcOutsideTarget {
            pc: 0x2000,
            start: 0x1000,
            end: 0x1040,
        }
    );
}

#[test]
fn test_walking_a_target_exhausts_it() {
    let mut bpu = bpu_at(0x1000);
    bpu.tick().unwrap();
    bpu.tick().unwrap();
    assert!(bpu.try_supply_fetch_with_target(0x1000));
    assert_eq!(bpu.supplying_stream_id(), Some(1));

    let mut pc = 0x1000;
    for i in 0..16 {
        let (taken, run_out, next) = bpu.decoupled_predict(pc, 4).unwrap();
        assert!(!taken);
        assert_eq!(run_out, i == 15);
        pc = next;
    }
    assert_eq!(pc, 0x1040);
    assert_eq!(bpu.ftq().demand_target_id(), 1);
    assert!(!bpu.fetch_target_available());
    assert_eq!(bpu.stream(1).map(|s| s.fetch_inst_num), Some(16));
    assert_eq!(bpu.stats.fetched_insts, 16);
}

// ──────────────────────────────────────────────────────────
// Squash and commit
// ──────────────────────────────────────────────────────────

#[test]
fn test_learned_branch_then_mispredict_recovers() {
    let mut bpu = bpu_at(0x2000);
    tick_until(&mut bpu, |b| b.stream(1).is_some());

    // Execution finds a taken conditional at the block start.
    let br = cond(0x2000, 0x3000);
    assert_eq!(bpu.control_squash(0, 1, &br, true, true).unwrap(), 0x3000);
    bpu.update(1);

    // Redirect back so the block is predicted again.
    tick_until(&mut bpu, |b| b.stream(2).is_some());
    assert_eq!(bpu.non_control_squash(0, 2, 0x3000, 0x2000).unwrap(), 0x2000);

    bpu.tick().unwrap();
    assert_eq!(bpu.state(), BpuState::Idle);
    bpu.tick().unwrap();
    assert_eq!(bpu.state(), BpuState::PredictionOutstanding);
    assert!(bpu.stream(3).is_none(), "one override bubble");
    bpu.tick().unwrap();

    let stream = bpu.stream(3).expect("stream 3").clone();
    assert!(stream.pred_taken);
    assert!(stream.is_hit);
    assert_eq!(stream.pred_branch_info.pc, 0x2000);
    assert_eq!(stream.pred_branch_info.target, 0x3000);
    assert_eq!(stream.pred_end_pc, 0x2004);
    assert_eq!(stream.pred_source, 1);
    assert_eq!(stream.override_reason, OverrideReason::FallThru);
    assert_eq!(bpu.stats.override_count, 1);
    assert_eq!(bpu.stats.override_reasons.get(&OverrideReason::FallThru), Some(&1));
    assert_eq!(bpu.s0_pc(), 0x3000);

    // Run ahead, then resolve the branch not taken.
    tick_until(&mut bpu, |b| b.stream(5).is_some());
    let mut expected = stream.history.clone();
    expected.shift_in(1, false);
    assert_eq!(bpu.control_squash(1, 3, &br, false, true).unwrap(), 0x2004);

    assert_eq!(bpu.streams().map(|(&id, _)| id).max(), Some(3));
    assert_eq!(bpu.next_stream_id(), 4);
    assert_eq!(bpu.s0_pc(), 0x2004);
    assert_eq!(bpu.histories().global, expected);
    assert!(!bpu.histories().global.bit(0));
    assert!(bpu.histories().global.bit(1));
    assert!(bpu.ftq().is_empty());
    assert_eq!(bpu.ftq().enq_state().pc, 0x2004);
    assert_eq!(bpu.ftq().enq_state().stream_id, 4);
    assert_eq!(bpu.ftq().demand_target_id(), 2);

    let squashed = bpu.stream(3).unwrap();
    assert!(squashed.resolved);
    assert!(!squashed.exe_taken);
    assert_eq!(squashed.squash_type, SquashType::Ctrl);

    tick_until(&mut bpu, |b| b.ftq().iter().any(|(_, e)| e.fsq_id == 4));
    let target = bpu.ftq().get(2).copied().expect("target 2");
    assert_eq!(target.start_pc, 0x2004);
    assert_eq!(target.end_pc, 0x2040);
}

#[test]
fn test_decode_return_squash_uses_checkpointed_ras() {
    let mut bpu = bpu_at(0x1000);
    tick_until(&mut bpu, |b| b.stream(1).is_some());
    assert_eq!(bpu.control_squash(0, 1, &call(0x1010, 0x8000), true, true).unwrap(), 0x8000);

    tick_until(&mut bpu, |b| b.stream(2).is_some());
    assert_eq!(bpu.stream(2).map(|s| s.start_pc), Some(0x8000));
    let redirect = bpu.control_squash(0, 2, &ret(0x8010), true, false).unwrap();
    assert_eq!(redirect, 0x1014);
    assert_eq!(bpu.s0_pc(), 0x1014);
    assert_eq!(bpu.stream(2).map(|s| s.exe_branch_info.target), Some(0x1014));
}

#[test]
fn test_trap_squash_redirects() {
    let mut bpu = bpu_at(0x1000);
    tick_until(&mut bpu, |b| b.stream(2).is_some());
    assert_eq!(bpu.trap_squash(0, 1, 0x1008, 0x8000).unwrap(), 0x8000);
    assert_eq!(bpu.stats.trap_squash, 1);
    assert_eq!(bpu.stream(1).map(|s| s.squash_type), Some(SquashType::Trap));
    assert!(bpu.stream(2).is_none());
    assert_eq!(bpu.s0_pc(), 0x8000);

    bpu.tick().unwrap();
    assert_eq!(bpu.state(), BpuState::Idle);
    bpu.tick().unwrap();
    assert_eq!(bpu.stream(2).map(|s| s.start_pc), Some(0x8000));
}

#[test]
fn test_squash_on_unknown_stream_is_ignored() {
    let mut bpu = bpu_at(0x1000);
    tick_until(&mut bpu, |b| b.stream(2).is_some());
    let before = bpu.histories().clone();

    assert_eq!(bpu.non_control_squash(0, 99, 0x1000, 0x5000).unwrap(), 0x5000);
    assert_eq!(bpu.fsq_len(), 2);
    assert_eq!(bpu.next_stream_id(), 3);
    assert_eq!(bpu.histories(), &before);
}

#[test]
fn test_streams_carry_previous_starts_and_squash_restores_them() {
    let mut bpu = bpu_at(0x1000);
    for _ in 0..3 {
        bpu.tick().unwrap();
    }
    assert!(bpu.stream(1).unwrap().previous_pcs.is_empty());
    assert_eq!(bpu.stream(2).unwrap().previous_pcs, VecDeque::from([0x1000]));
    assert_eq!(bpu.stream(3).unwrap().previous_pcs, VecDeque::from([0x1040]));
    assert_eq!(bpu.previous_pcs(), &VecDeque::from([0x1080]));

    assert_eq!(bpu.trap_squash(0, 2, 0x1044, 0x8000).unwrap(), 0x8000);
    assert_eq!(bpu.previous_pcs(), &VecDeque::from([0x1040]));

    tick_until(&mut bpu, |b| b.stream(3).is_some());
    let redirected = bpu.stream(3).unwrap();
    assert_eq!(redirected.start_pc, 0x8000);
    assert_eq!(redirected.previous_pcs, VecDeque::from([0x1040]));
}

#[test]
fn test_zero_ahead_stages_keeps_no_previous_starts() {
    let mut config = BpuConfig::default();
    config.abtb.ahead_stages = 0;
    let mut bpu = bpu_with(config, 0x1000);
    for _ in 0..3 {
        bpu.tick().unwrap();
    }
    assert!(bpu.previous_pcs().is_empty());
    assert!(bpu.stream(3).unwrap().previous_pcs.is_empty());
}

#[test]
fn test_update_commits_streams_and_trims_ledger() {
    let mut bpu = bpu_at(0x1000);
    for _ in 0..3 {
        bpu.tick().unwrap();
    }
    assert_eq!(bpu.fsq_len(), 3);
    assert_eq!(bpu.history_manager().len(), 3);

    bpu.add_commit_insts(1, 16);
    bpu.update(2);
    assert_eq!(bpu.fsq_len(), 1);
    assert!(bpu.stream(3).is_some());
    assert_eq!(bpu.history_manager().len(), 1);
    assert_eq!(bpu.stats.committed_streams, 2);
    assert_eq!(bpu.stats.committed_taken, 0);
}
