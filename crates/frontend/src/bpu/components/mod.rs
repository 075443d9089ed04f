//! Prediction components of the decoupled BPU.
//!
//! Every table the BPU consults is a component with the same contract: it
//! contributes to one or more prediction stages, snapshots an opaque meta for
//! each stream, follows the speculative history, rolls back on squash and
//! trains at commit. Components run in a fixed order each cycle, so later
//! components can refine what earlier ones wrote into a stage (TAGE sets the
//! direction of the conditionals the BTB found, the corrector may flip it).
//! The ahead BTB runs after the main BTB so it only supplies blocks the main
//! BTB missed.

/// Ahead-pipelined BTB.
pub mod abtb;

/// Main set-associative BTB.
pub mod btb;

/// Indirect target predictor.
pub mod ittage;

/// Speculative return address stack.
pub mod ras;

/// Statistical corrector.
pub mod sc;

/// TAGE conditional direction predictor with loop predictor.
pub mod tage;

/// Micro BTB.
pub mod ubtb;

use std::collections::VecDeque;

use self::{
    abtb::{Abtb, AbtbMeta},
    btb::{Btb, BtbMeta},
    ittage::{Ittage, IttageMeta},
    ras::{Ras, RasMeta},
    sc::{ScMeta, StatisticalCorrector},
    tage::{Tage, TageMeta},
    ubtb::{Ubtb, UbtbMeta},
};
use super::branch::{BranchInfo, FullBtbPrediction};
use super::history::SpeculativeHistories;
use super::stream::FetchStream;
use crate::config::BpuConfig;

/// Per-stream snapshot taken from one component at prediction time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PredictionMeta {
    /// Component keeps no per-stream state.
    #[default]
    None,
    /// Micro BTB hit information.
    Ubtb(UbtbMeta),
    /// Main BTB hit entries.
    Btb(BtbMeta),
    /// Ahead BTB indexing address and hit entries.
    Abtb(AbtbMeta),
    /// TAGE provider information per conditional.
    Tage(TageMeta),
    /// ITTAGE provider information per indirect branch.
    Ittage(IttageMeta),
    /// Return stack checkpoint.
    Ras(RasMeta),
    /// Corrector sums per conditional.
    Sc(ScMeta),
}

/// Enum wrapper for static dispatch of prediction components.
/// This avoids vtable lookups in the per-cycle prediction loop.
#[derive(Debug)]
pub enum PredictorComponent {
    /// Micro BTB (stage 0).
    Ubtb(Ubtb),
    /// Main BTB.
    Btb(Btb),
    /// Ahead-pipelined BTB.
    Abtb(Abtb),
    /// TAGE direction predictor.
    Tage(Tage),
    /// Indirect target predictor.
    Ittage(Ittage),
    /// Return address stack.
    Ras(Ras),
    /// Statistical corrector.
    Sc(StatisticalCorrector),
}

/// Builds the component list in evaluation order.
pub fn build_components(config: &BpuConfig) -> Vec<PredictorComponent> {
    vec![
        PredictorComponent::Ubtb(Ubtb::new(&config.ubtb, config.predict_width)),
        PredictorComponent::Btb(Btb::new(&config.btb)),
        PredictorComponent::Abtb(Abtb::new(&config.abtb)),
        PredictorComponent::Tage(Tage::new(&config.tage)),
        PredictorComponent::Ittage(Ittage::new(&config.ittage)),
        PredictorComponent::Ras(Ras::new(&config.ras)),
        PredictorComponent::Sc(StatisticalCorrector::new(&config.sc)),
    ]
}

impl PredictorComponent {
    /// First prediction stage this component writes.
    #[inline(always)]
    pub const fn delay(&self) -> usize {
        match self {
            Self::Ubtb(_) => ubtb::DELAY,
            Self::Btb(_) => btb::DELAY,
            Self::Abtb(_) => abtb::DELAY,
            Self::Tage(_) => tage::DELAY,
            Self::Ittage(_) => ittage::DELAY,
            Self::Ras(_) => ras::DELAY,
            Self::Sc(_) => sc::DELAY,
        }
    }

    /// Contributes to every stage from `delay()` onwards for the block at `start_pc`.
    ///
    /// `previous_pcs` are the start addresses of the streams predicted
    /// before it, oldest first.
    #[inline(always)]
    pub fn put_pc_history(
        &mut self,
        start_pc: u64,
        previous_pcs: &VecDeque<u64>,
        hist: &SpeculativeHistories,
        stage_preds: &mut [FullBtbPrediction],
    ) {
        match self {
            Self::Ubtb(c) => c.put_pc_history(start_pc, stage_preds),
            Self::Btb(c) => c.put_pc_history(start_pc, stage_preds),
            Self::Abtb(c) => c.put_pc_history(start_pc, previous_pcs, stage_preds),
            Self::Tage(c) => c.put_pc_history(hist, stage_preds),
            Self::Ittage(c) => c.put_pc_history(hist, stage_preds),
            Self::Ras(c) => c.put_pc_history(stage_preds),
            Self::Sc(c) => c.put_pc_history(hist, stage_preds),
        }
    }

    /// Snapshot stored in the stream created from the current prediction.
    #[inline(always)]
    pub fn prediction_meta(&self) -> PredictionMeta {
        match self {
            Self::Ubtb(c) => PredictionMeta::Ubtb(c.meta().clone()),
            Self::Btb(c) => PredictionMeta::Btb(c.meta().clone()),
            Self::Abtb(c) => PredictionMeta::Abtb(c.meta().clone()),
            Self::Tage(c) => PredictionMeta::Tage(c.meta().clone()),
            Self::Ittage(c) => PredictionMeta::Ittage(c.meta().clone()),
            Self::Ras(c) => PredictionMeta::Ras(c.meta()),
            Self::Sc(c) => PredictionMeta::Sc(c.meta().clone()),
        }
    }

    /// Follows the speculative path once `final_pred` becomes a stream.
    #[inline(always)]
    pub fn spec_update_hist(&mut self, final_pred: &FullBtbPrediction) {
        if let Self::Ras(c) = self {
            c.spec_update_hist(final_pred);
        }
    }

    /// Rolls back to `stream`'s snapshot and re-applies its actual outcome.
    #[inline(always)]
    pub fn recover_hist(&mut self, stream: &FetchStream, meta: &PredictionMeta) {
        if let (Self::Ras(c), PredictionMeta::Ras(m)) = (self, meta) {
            c.recover_hist(stream, m);
        }
    }

    /// Trains on a committed stream.
    #[inline(always)]
    pub fn update(&mut self, stream: &FetchStream, meta: &PredictionMeta) {
        match (self, meta) {
            (Self::Ubtb(c), PredictionMeta::Ubtb(m)) => c.update(stream, m),
            (Self::Btb(c), PredictionMeta::Btb(m)) => c.update(stream, m),
            (Self::Abtb(c), PredictionMeta::Abtb(m)) => c.update(stream, m),
            (Self::Tage(c), PredictionMeta::Tage(m)) => c.update(stream, m),
            (Self::Ittage(c), PredictionMeta::Ittage(m)) => c.update(stream, m),
            (Self::Ras(c), _) => c.update(stream),
            (Self::Sc(c), PredictionMeta::Sc(m)) => c.update(stream, m),
            _ => {}
        }
    }

    /// Per-branch commit notification.
    #[inline(always)]
    pub fn commit_branch(&mut self, stream: &FetchStream, branch: &BranchInfo) {
        if let Self::Tage(c) = self {
            c.commit_branch(stream, branch);
        }
    }

    /// Short name used in diagnostics.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Ubtb(_) => "ubtb",
            Self::Btb(_) => "btb",
            Self::Abtb(_) => "abtb",
            Self::Tage(_) => "tage",
            Self::Ittage(_) => "ittage",
            Self::Ras(_) => "ras",
            Self::Sc(_) => "sc",
        }
    }
}
