//! Front-end statistics.
//!
//! This module tracks the counters kept by the two halves of the front end:
//! 1. **BPU:** Predictions, override bubbles and reasons, squashes by kind,
//!    queue backpressure and commit-side stream outcomes.
//! 2. **Fetch:** Cycles spent in each thread status, squash accounting, cache
//!    traffic, fetched instructions and bubbles handed to decode.
//!
//! Counters are plain public fields; the `Display` impls render them in
//! sections for a quick look at the end of a run.

use std::collections::BTreeMap;
use std::fmt;

use crate::bpu::branch::OverrideReason;

/// Counters kept by the decoupled BPU.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BpuStats {
    /// Streams created.
    pub predictions: u64,
    /// Cycles a prediction waited on an override bubble.
    pub override_bubble_num: u64,
    /// Final predictions not supplied by stage 0.
    pub override_count: u64,
    /// Overrides broken down by mismatch kind.
    pub override_reasons: BTreeMap<OverrideReason, u64>,
    /// Final predictions per supplying stage.
    pub preds_of_each_stage: Vec<u64>,

    /// Squashes caused by a resolved branch.
    pub control_squash: u64,
    /// Squashes without a resolved branch.
    pub non_control_squash: u64,
    /// Squashes caused by traps.
    pub trap_squash: u64,

    /// Cycles a new prediction was blocked by a full FSQ.
    pub fsq_full_cycles: u64,
    /// Cycles draining into the FTQ was blocked by a full FTQ.
    pub ftq_full_cycles: u64,
    /// Cycles the FTQ could not be fed because the next stream did not exist yet.
    pub fsq_not_ready_cycles: u64,

    /// Streams committed.
    pub committed_streams: u64,
    /// Committed streams that ended in a taken branch.
    pub committed_taken: u64,
    /// Committed streams that had a BTB hit.
    pub committed_btb_hits: u64,
    /// Committed streams whose predicted taken branch did not redirect.
    pub false_hits: u64,
    /// Instructions counted through `decoupled_predict`.
    pub fetched_insts: u64,
}

impl BpuStats {
    /// Zeroed counters for a predictor with `num_stages` stages.
    pub fn new(num_stages: usize) -> Self {
        Self {
            preds_of_each_stage: vec![0; num_stages],
            ..Self::default()
        }
    }
}

impl fmt::Display for BpuStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "BRANCH PREDICTION UNIT")?;
        writeln!(f, "  bpu.predictions        {}", self.predictions)?;
        writeln!(f, "  bpu.overrides          {}", self.override_count)?;
        writeln!(f, "  bpu.override_bubbles   {}", self.override_bubble_num)?;
        for (reason, count) in &self.override_reasons {
            writeln!(f, "  bpu.override.{reason:?} {count}")?;
        }
        for (stage, count) in self.preds_of_each_stage.iter().enumerate() {
            writeln!(f, "  bpu.stage{stage}.preds       {count}")?;
        }
        writeln!(f, "  bpu.squash.control     {}", self.control_squash)?;
        writeln!(f, "  bpu.squash.non_control {}", self.non_control_squash)?;
        writeln!(f, "  bpu.squash.trap        {}", self.trap_squash)?;
        writeln!(f, "  bpu.fsq_full_cycles    {}", self.fsq_full_cycles)?;
        writeln!(f, "  bpu.ftq_full_cycles    {}", self.ftq_full_cycles)?;
        writeln!(f, "  bpu.commit.streams     {}", self.committed_streams)?;
        writeln!(f, "  bpu.commit.taken       {}", self.committed_taken)?;
        writeln!(f, "  bpu.commit.btb_hits    {}", self.committed_btb_hits)?;
        writeln!(f, "  bpu.commit.false_hits  {}", self.false_hits)
    }
}

/// Counters kept by the fetch engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// Cycles the stage was ticked.
    pub cycles: u64,
    /// Cycles at least one thread fetched.
    pub running_cycles: u64,
    /// Cycles spent squashing.
    pub squash_cycles: u64,
    /// Cycles waiting on translation.
    pub tlb_cycles: u64,
    /// Cycles waiting on the instruction cache.
    pub icache_stall_cycles: u64,
    /// Cycles waiting for the cache port to accept a retry.
    pub icache_wait_retry_stall_cycles: u64,
    /// Cycles with no thread able to fetch.
    pub idle_cycles: u64,
    /// Cycles blocked by decode.
    pub blocked_cycles: u64,
    /// Cycles stalled for other reasons.
    pub misc_stall_cycles: u64,
    /// Cycles stalled behind a pending trap.
    pub pending_trap_stall_cycles: u64,
    /// Cycles stalled behind a pending quiesce.
    pub pending_quiesce_stall_cycles: u64,
    /// Cycles stalled on an address outside memory.
    pub no_good_addr_cycles: u64,

    /// Translations discarded as stale.
    pub tlb_squashes: u64,
    /// Cache responses discarded as stale.
    pub icache_squashes: u64,
    /// Cache line requests sent.
    pub cache_lines: u64,
    /// Instructions handed to decode.
    pub insts: u64,
    /// Control instructions fetched.
    pub branches: u64,
    /// Instructions predicted taken.
    pub predicted_branches: u64,
    /// Synthetic fault instructions created.
    pub fault_insts: u64,

    /// Decode-width slots left empty while decode could accept them.
    pub frontend_bubbles: u64,
    /// Cycles fetch had no FTQ target.
    pub ftq_empty_stalls: u64,
}

impl fmt::Display for FetchStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cyc = self.cycles.max(1) as f64;
        let pct = |n: u64| (n as f64 / cyc) * 100.0;
        writeln!(f, "FETCH")?;
        writeln!(f, "  fetch.cycles           {}", self.cycles)?;
        writeln!(f, "  fetch.running          {} ({:.2}%)", self.running_cycles, pct(self.running_cycles))?;
        writeln!(f, "  fetch.squash           {} ({:.2}%)", self.squash_cycles, pct(self.squash_cycles))?;
        writeln!(f, "  fetch.tlb              {} ({:.2}%)", self.tlb_cycles, pct(self.tlb_cycles))?;
        writeln!(f, "  fetch.icache           {} ({:.2}%)", self.icache_stall_cycles, pct(self.icache_stall_cycles))?;
        writeln!(f, "  fetch.idle             {} ({:.2}%)", self.idle_cycles, pct(self.idle_cycles))?;
        writeln!(f, "  fetch.blocked          {} ({:.2}%)", self.blocked_cycles, pct(self.blocked_cycles))?;
        writeln!(f, "  fetch.insts            {}", self.insts)?;
        writeln!(f, "  fetch.branches         {}", self.branches)?;
        writeln!(f, "  fetch.predicted        {}", self.predicted_branches)?;
        writeln!(f, "  fetch.cache_lines      {}", self.cache_lines)?;
        writeln!(f, "  fetch.tlb_squashes     {}", self.tlb_squashes)?;
        writeln!(f, "  fetch.icache_squashes  {}", self.icache_squashes)?;
        writeln!(f, "  fetch.bubbles          {}", self.frontend_bubbles)?;
        writeln!(f, "  fetch.ftq_empty        {}", self.ftq_empty_stalls)
    }
}
