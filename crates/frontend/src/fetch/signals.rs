//! Signals exchanged between fetch and the later pipeline stages.

use super::inst::DynInst;
use super::status::StallReason;
use crate::bpu::BranchInfo;
use crate::common::{FetchStreamId, FetchTargetId, InstSeqNum};

/// Per-thread signals from decode, read once per cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeSignals {
    /// Decode cannot accept instructions.
    pub block: bool,
    /// Decode can accept instructions again.
    pub unblock: bool,
    /// Decode found a misprediction.
    pub squash: bool,
    /// The branch decode resolved, with its actual target.
    pub branch: BranchInfo,
    /// Whether that branch is taken.
    pub branch_taken: bool,
    /// Stream holding the branch.
    pub squashed_stream_id: FetchStreamId,
    /// Target holding the branch.
    pub squashed_target_id: FetchTargetId,
    /// Youngest instruction that survives the squash.
    pub done_seq_num: InstSeqNum,
}

/// Per-thread signals from commit, read once per cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSignals {
    /// Commit squashes the thread.
    pub squash: bool,
    /// Where fetch restarts.
    pub redirect_pc: u64,
    /// The squash is a branch misprediction.
    pub mispredict: bool,
    /// The mispredicted branch, with its actual target.
    pub branch: BranchInfo,
    /// Whether that branch is taken.
    pub branch_taken: bool,
    /// The squash delivers a trap.
    pub is_trap_squash: bool,
    /// Instruction that caused a non-branch squash.
    pub squash_inst_pc: u64,
    /// Target holding the squashing instruction.
    pub squashed_target_id: FetchTargetId,
    /// Stream holding the squashing instruction; 0 when unknown.
    pub squashed_stream_id: FetchStreamId,
    /// Last committed instruction address.
    pub committed_pc: u64,
    /// Youngest instruction that survives the squash.
    pub done_seq_num: InstSeqNum,
    /// Every stream up to this one has committed.
    pub done_fsq_id: Option<FetchStreamId>,
    /// An interrupt is waiting to be taken.
    pub interrupt_pending: bool,
    /// The pending interrupt was taken or withdrawn.
    pub clear_interrupt: bool,
}

/// What fetch hands decode in one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchOutput {
    /// Instructions in program order.
    pub insts: Vec<DynInst>,
    /// One entry per decode-width slot.
    pub stall_reasons: Vec<StallReason>,
}
