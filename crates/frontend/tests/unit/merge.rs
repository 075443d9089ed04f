//! # Stage Merge Tests
//!
//! The slowest stage holding any entry decides the final prediction; the
//! first stage that already agrees with it decides the override bubbles.

use frontsim_core::DecoupledBpu;
use frontsim_core::bpu::{BranchInfo, FullBtbPrediction, OverrideReason};
use frontsim_core::config::BpuConfig;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rstest::rstest;

use crate::common::builder::{StagePredBuilder, empty, jump};

const START: u64 = 0x1000;
const W: u64 = 64;

fn bpu() -> DecoupledBpu {
    DecoupledBpu::new(&BpuConfig::default()).expect("default config")
}

fn jump_to(target: u64) -> FullBtbPrediction {
    StagePredBuilder::new(START).jump(0x1010, target).build()
}

#[test]
fn test_all_empty_falls_through_without_bubbles() {
    let mut bpu = bpu();
    let bubbles = bpu.merge_stage_predictions(vec![empty(START), empty(START), empty(START)]);
    assert_eq!(bubbles, 0);
    let final_pred = bpu.final_prediction();
    assert!(!final_pred.is_taken());
    assert_eq!(final_pred.target(W), 0x1040);
    assert_eq!(final_pred.pred_source, 0);
}

#[test]
fn test_all_agree_no_bubbles() {
    let mut bpu = bpu();
    let bubbles = bpu.merge_stage_predictions(vec![jump_to(0x4000), jump_to(0x4000), jump_to(0x4000)]);
    assert_eq!(bubbles, 0);
    assert_eq!(bpu.final_prediction().target(W), 0x4000);
    assert_eq!(bpu.stats.override_count, 0);
    assert_eq!(bpu.stats.preds_of_each_stage, vec![1, 0, 0]);
}

#[test]
fn test_only_last_stage_hits() {
    let mut bpu = bpu();
    let bubbles = bpu.merge_stage_predictions(vec![empty(START), empty(START), jump_to(0x4000)]);
    assert_eq!(bubbles, 2);
    let final_pred = bpu.final_prediction();
    assert_eq!(final_pred.target(W), 0x4000);
    assert_eq!(final_pred.end(W), 0x1014);
    assert_eq!(final_pred.pred_source, 2);
    assert_eq!(final_pred.override_reason, OverrideReason::FallThru);
    assert_eq!(bpu.stats.override_count, 1);
    assert_eq!(bpu.stats.override_reasons.get(&OverrideReason::FallThru), Some(&1));
}

#[test]
fn test_first_agreeing_stage_wins_even_after_disagreement() {
    let mut bpu = bpu();
    let bubbles = bpu.merge_stage_predictions(vec![jump_to(0x4000), jump_to(0x5000), jump_to(0x4000)]);
    assert_eq!(bubbles, 0, "stage 0 already agrees with the final answer");
    assert_eq!(bpu.final_prediction().target(W), 0x4000);
}

#[test]
fn test_trailing_empty_stage_does_not_override() {
    let mut bpu = bpu();
    let bubbles = bpu.merge_stage_predictions(vec![empty(START), jump_to(0x4000), empty(START)]);
    assert_eq!(bubbles, 1);
    assert_eq!(bpu.final_prediction().target(W), 0x4000);
}

#[test]
fn test_not_taken_conditionals_match_empty_stage() {
    let mut bpu = bpu();
    let nt = StagePredBuilder::new(START).cond(0x1008, 0x2000, false).build();
    let bubbles = bpu.merge_stage_predictions(vec![empty(START), empty(START), nt.clone()]);
    assert_eq!(bubbles, 0);
    let final_pred = bpu.final_prediction();
    assert_eq!(final_pred.btb_entries, nt.btb_entries);
    assert_eq!(final_pred.hist_info(), (1, false));
}

#[rstest]
#[case::fall_through(empty(START), jump_to(0x4000), OverrideReason::FallThru)]
#[case::control_addr(
    StagePredBuilder::new(START).jump(0x1008, 0x4000).build(),
    jump_to(0x4000),
    OverrideReason::ControlAddr
)]
#[case::target(jump_to(0x5000), jump_to(0x4000), OverrideReason::Target)]
#[case::hist_info(
    StagePredBuilder::new(START).cond(0x1004, 0x2000, false).jump(0x1010, 0x4000).build(),
    jump_to(0x4000),
    OverrideReason::HistInfo
)]
fn test_override_reason(
    #[case] fast: FullBtbPrediction,
    #[case] slow: FullBtbPrediction,
    #[case] reason: OverrideReason,
) {
    let mut bpu = bpu();
    let bubbles = bpu.merge_stage_predictions(vec![fast.clone(), fast, slow]);
    assert_eq!(bubbles, 2);
    assert_eq!(bpu.final_prediction().override_reason, reason);
}

#[test]
fn test_end_mismatch() {
    let short = StagePredBuilder::new(START)
        .branch(BranchInfo {
            size: 2,
            ..jump(0x1010, 0x4000)
        })
        .build();
    assert_eq!(short.mismatch(&jump_to(0x4000), W), Some(OverrideReason::End));
}

#[test]
fn test_merge_clears_stages() {
    let mut bpu = bpu();
    let _ = bpu.merge_stage_predictions(vec![jump_to(0x4000), jump_to(0x4000), jump_to(0x4000)]);
    assert!(bpu.stage_predictions().iter().all(|p| p.btb_entries.is_empty()));
}

// ──────────────────────────────────────────────────────────
// Random stage combinations
// ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Empty,
    NotTaken,
    JumpA,
    JumpB,
}

impl Kind {
    fn build(self) -> FullBtbPrediction {
        match self {
            Self::Empty => empty(START),
            Self::NotTaken => StagePredBuilder::new(START).cond(0x1008, 0x2000, false).build(),
            Self::JumpA => jump_to(0x4000),
            Self::JumpB => jump_to(0x5000),
        }
    }

    /// Where fetch goes next; empty and not-taken stages agree.
    const fn redirect(self) -> Option<u64> {
        match self {
            Self::Empty | Self::NotTaken => None,
            Self::JumpA => Some(0x4000),
            Self::JumpB => Some(0x5000),
        }
    }
}

fn kind() -> impl Strategy<Value = Kind> {
    prop_oneof![Just(Kind::Empty), Just(Kind::NotTaken), Just(Kind::JumpA), Just(Kind::JumpB)]
}

proptest! {
    #[test]
    fn test_merge_picks_slowest_hit_and_first_agreement(stages in prop::collection::vec(kind(), 3..6)) {
        let mut config = BpuConfig::default();
        config.num_stages = stages.len();
        let mut bpu = DecoupledBpu::new(&config).unwrap();

        let chosen = stages.iter().rposition(|k| *k != Kind::Empty).unwrap_or(0);
        let expected_bubbles = stages
            .iter()
            .position(|k| k.redirect() == stages[chosen].redirect())
            .unwrap_or(chosen)
            .min(chosen);
        let expected = stages[chosen].build();

        let bubbles = bpu.merge_stage_predictions(stages.iter().map(|k| k.build()).collect());
        prop_assert_eq!(bubbles, expected_bubbles);
        let final_pred = bpu.final_prediction();
        prop_assert_eq!(&final_pred.btb_entries, &expected.btb_entries);
        prop_assert_eq!(final_pred.target(W), expected.target(W));
        prop_assert_eq!(final_pred.pred_source, expected_bubbles);
        prop_assert_eq!(bpu.stats.preds_of_each_stage[expected_bubbles], 1);
    }
}
