//! Fetch streams: the entries of the fetch stream queue.
//!
//! A stream is one predicted basic-block-like segment. It is created from the
//! final prediction, carries snapshots of every speculative history so that a
//! squash can rebuild them exactly, and accumulates the execution outcome
//! until commit trains the predictors with it.

use std::collections::VecDeque;

use super::branch::{BranchInfo, BtbEntry, OverrideReason};
use super::components::PredictionMeta;
use super::history::HistoryRegister;

/// What caused a stream to be squashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SquashType {
    /// Never squashed.
    #[default]
    None,
    /// Exception or interrupt redirect.
    Trap,
    /// A resolved branch disagreed with its prediction.
    Ctrl,
    /// Redirect without a resolved branch (pipeline flush).
    Other,
}

/// One FSQ entry.
#[derive(Debug, Clone, Default)]
pub struct FetchStream {
    /// First instruction address of the block.
    pub start_pc: u64,

    /// Predicted to end in a taken branch.
    pub pred_taken: bool,
    /// Predicted fall-through address.
    pub pred_end_pc: u64,
    /// Predicted taken branch (meaningful when `pred_taken`).
    pub pred_branch_info: BranchInfo,
    /// BTB entries the final prediction was built from.
    pub pred_btb_entries: Vec<BtbEntry>,
    /// Any BTB entry was found for the block.
    pub is_hit: bool,
    /// A BTB entry was found but the branch did not exist.
    pub false_hit: bool,

    /// Stage that supplied the final prediction.
    pub pred_source: usize,
    /// Why faster stages were overridden.
    pub override_reason: OverrideReason,
    /// Opaque per-component state captured at prediction time.
    pub pred_metas: Vec<PredictionMeta>,
    /// Start addresses of the streams predicted just before this one,
    /// oldest first.
    pub previous_pcs: VecDeque<u64>,

    /// Global history before this stream's update.
    pub history: HistoryRegister,
    /// Path history before this stream's update.
    pub phistory: HistoryRegister,
    /// Backward history before this stream's update.
    pub bw_history: HistoryRegister,
    /// IMLI history before this stream's update.
    pub imli_history: HistoryRegister,
    /// Local history table before this stream's update.
    pub local_histories: Vec<HistoryRegister>,

    /// Outcome known from execution.
    pub resolved: bool,
    /// Actual direction.
    pub exe_taken: bool,
    /// Actual redirecting branch.
    pub exe_branch_info: BranchInfo,
    /// Kind of the last squash that hit this stream.
    pub squash_type: SquashType,
    /// Address of the squashing instruction.
    pub squash_pc: u64,

    /// New entry computed for BTB training at commit.
    pub update_new_btb_entry: BtbEntry,
    /// `update_new_btb_entry` already existed in the BTB.
    pub update_is_old_entry: bool,
    /// Last instruction address covered by training.
    pub update_end_inst_pc: u64,
    /// Predicted entries that lie in the trained range.
    pub update_btb_entries: Vec<BtbEntry>,

    /// Instructions fetched from this stream.
    pub fetch_inst_num: u32,
    /// Instructions committed from this stream.
    pub commit_inst_num: u32,
}

impl FetchStream {
    /// Resets the execution outcome to "as predicted".
    pub const fn set_default_resolve(&mut self) {
        self.resolved = false;
        self.exe_taken = self.pred_taken;
        self.exe_branch_info = self.pred_branch_info;
    }

    /// Redirecting branch, resolved if known, else predicted.
    pub const fn branch_info(&self) -> BranchInfo {
        if self.resolved {
            self.exe_branch_info
        } else {
            self.pred_branch_info
        }
    }

    /// Address of the redirecting branch.
    pub const fn control_pc(&self) -> u64 {
        self.branch_info().pc
    }

    /// Whether the stream ends in a taken branch.
    pub const fn taken(&self) -> bool {
        if self.resolved {
            self.exe_taken
        } else {
            self.pred_taken
        }
    }

    /// Target of the redirecting branch.
    pub const fn taken_target(&self) -> u64 {
        self.branch_info().target
    }

    /// History shift caused by this stream once it is known to end at `squash_pc`.
    ///
    /// Every predicted conditional strictly before the squash point shifts in
    /// a not-taken bit; a conditional squashing branch adds its own outcome.
    ///
    /// # Returns
    ///
    /// `(shift amount, taken bit)`.
    pub fn hist_info_during_squash(&self, squash_pc: u64, is_cond: bool, actually_taken: bool) -> (usize, bool) {
        self.shift_before(squash_pc, is_cond, actually_taken, |_| true)
    }

    /// Backward-branch variant of `hist_info_during_squash`.
    pub fn bw_hist_info_during_squash(
        &self,
        squash_pc: u64,
        branch: &BranchInfo,
        actually_taken: bool,
    ) -> (usize, bool) {
        self.shift_before(
            squash_pc,
            branch.is_cond && branch.is_backward(),
            actually_taken,
            BranchInfo::is_backward,
        )
    }

    fn shift_before(
        &self,
        squash_pc: u64,
        counts_self: bool,
        actually_taken: bool,
        counts: impl Fn(&BranchInfo) -> bool,
    ) -> (usize, bool) {
        let mut shamt = self
            .pred_btb_entries
            .iter()
            .filter(|e| {
                e.valid
                    && e.info.is_cond
                    && e.pc() >= self.start_pc
                    && e.pc() < squash_pc
                    && counts(&e.info)
            })
            .count();
        if counts_self {
            shamt += 1;
        }
        (shamt, counts_self && actually_taken)
    }

    /// Computes the last instruction address training should cover.
    ///
    /// Unsquashed streams cover their taken branch, or the whole block up to
    /// the next `predict_width` boundary when not taken.
    pub const fn set_update_inst_end_pc(&mut self, predict_width: u64) {
        self.update_end_inst_pc = if matches!(self.squash_type, SquashType::None) {
            if self.exe_taken {
                self.exe_branch_info.pc
            } else {
                (self.start_pc & !(predict_width - 1)) + predict_width
            }
        } else {
            self.squash_pc
        };
    }

    /// Keeps the predicted entries that lie in `[start_pc, update_end_inst_pc]`.
    pub fn set_update_btb_entries(&mut self) {
        let (start, end) = (self.start_pc, self.update_end_inst_pc);
        self.update_btb_entries = self
            .pred_btb_entries
            .iter()
            .filter(|e| e.valid && e.pc() >= start && e.pc() <= end)
            .copied()
            .collect();
    }
}
