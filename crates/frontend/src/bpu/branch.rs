//! Branch descriptors and per-stage block predictions.
//!
//! 1. **`BranchInfo`:** Static description of one control-transfer instruction.
//! 2. **`BtbEntry`:** A `BranchInfo` as stored in a BTB, with training state.
//! 3. **`FullBtbPrediction`:** Everything one prediction stage believes about a
//!    fetch block: the BTB entries it found, their directions and targets.
//!    All derived answers (taken branch, target, end, history shift) are
//!    computed from these fields so that two stages can be compared directly.

use std::collections::BTreeMap;

/// Static properties of one control-transfer instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BranchInfo {
    /// Instruction address.
    pub pc: u64,
    /// Direct or last-seen target.
    pub target: u64,
    /// Conditional branch.
    pub is_cond: bool,
    /// Target comes from a register.
    pub is_indirect: bool,
    /// Pushes a return address.
    pub is_call: bool,
    /// Pops a return address.
    pub is_return: bool,
    /// Instruction size in bytes.
    pub size: u8,
}

impl BranchInfo {
    /// Address of the byte after this instruction.
    #[inline(always)]
    pub const fn end(&self) -> u64 {
        self.pc + self.size as u64
    }

    /// Unconditional transfers always redirect when reached.
    #[inline(always)]
    pub const fn is_uncond(&self) -> bool {
        !self.is_cond
    }

    /// A branch jumping backwards, typically a loop latch.
    #[inline(always)]
    pub const fn is_backward(&self) -> bool {
        self.target < self.pc
    }
}

/// A branch as held in a BTB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BtbEntry {
    /// The described branch.
    pub info: BranchInfo,
    /// Entry holds data.
    pub valid: bool,
    /// Conditional that has never been seen not-taken.
    pub always_taken: bool,
    /// 2-bit signed direction counter for conditionals.
    pub ctr: i8,
    /// Tag of the owning set (meaning is table specific).
    pub tag: u64,
}

impl BtbEntry {
    /// Wraps a freshly discovered branch.
    ///
    /// New conditionals start as `always_taken` because they are only ever
    /// allocated after being observed taken.
    pub const fn new(info: BranchInfo) -> Self {
        Self {
            info,
            valid: true,
            always_taken: info.is_cond,
            ctr: if info.is_cond { 1 } else { 0 },
            tag: 0,
        }
    }

    /// Shorthand for the branch address.
    #[inline(always)]
    pub const fn pc(&self) -> u64 {
        self.info.pc
    }
}

/// Why a faster stage disagreed with the final prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, PartialOrd, Ord)]
pub enum OverrideReason {
    /// All stages agreed.
    #[default]
    NoOverride,
    /// One stage predicts a taken branch where the other falls through.
    FallThru,
    /// Both taken, at different branch addresses.
    ControlAddr,
    /// Same branch, different target.
    Target,
    /// Same branch and target, different block end.
    End,
    /// Same redirect but a different number of conditionals shifted in.
    HistInfo,
}

/// One stage's complete opinion on a fetch block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FullBtbPrediction {
    /// Block start address.
    pub bb_start: u64,
    /// BTB entries inside the block, sorted by PC.
    pub btb_entries: Vec<BtbEntry>,
    /// Direction for each conditional, keyed by PC.
    pub cond_takens: BTreeMap<u64, bool>,
    /// Predicted targets for indirect branches, keyed by PC.
    pub indirect_targets: BTreeMap<u64, u64>,
    /// Top of the return address stack at prediction time.
    pub return_target: u64,
    /// Stage that supplied the final answer.
    pub pred_source: usize,
    /// Mismatch kind recorded during the merge.
    pub override_reason: OverrideReason,
}

impl FullBtbPrediction {
    /// Forgets the per-block content, keeping nothing from the last block.
    pub fn clear(&mut self) {
        self.btb_entries.clear();
        self.cond_takens.clear();
        self.indirect_targets.clear();
        self.return_target = 0;
        self.pred_source = 0;
        self.override_reason = OverrideReason::NoOverride;
    }

    /// Whether a conditional entry is predicted taken.
    fn cond_taken(&self, pc: u64) -> bool {
        self.cond_takens.get(&pc).copied().unwrap_or(false)
    }

    /// First entry that redirects control, if any.
    pub fn taken_entry(&self) -> Option<&BtbEntry> {
        self.btb_entries
            .iter()
            .find(|e| e.valid && (e.info.is_uncond() || self.cond_taken(e.pc())))
    }

    /// Whether the block ends in a taken branch.
    pub fn is_taken(&self) -> bool {
        self.taken_entry().is_some()
    }

    /// Sequential successor when nothing is taken: the next `width` boundary.
    pub const fn fall_through(&self, width: u64) -> u64 {
        (self.bb_start + width) & !(width - 1)
    }

    /// Address of the taken branch, or the fall-through address.
    pub fn control_addr(&self, width: u64) -> u64 {
        self.taken_entry().map_or_else(|| self.fall_through(width), BtbEntry::pc)
    }

    /// Where fetch continues after this block.
    pub fn target(&self, width: u64) -> u64 {
        match self.taken_entry() {
            Some(e) if e.info.is_return => self.return_target,
            Some(e) if e.info.is_indirect => {
                self.indirect_targets.get(&e.pc()).copied().unwrap_or(e.info.target)
            }
            Some(e) => e.info.target,
            None => self.fall_through(width),
        }
    }

    /// Exclusive end of the fetched range.
    pub fn end(&self, width: u64) -> u64 {
        self.taken_entry().map_or_else(|| self.fall_through(width), |e| e.info.end())
    }

    /// Global history update implied by this block: (shift amount, taken bit).
    ///
    /// Every valid conditional up to and including the first taken one
    /// shifts in one bit; an unconditional transfer stops the scan.
    pub fn hist_info(&self) -> (usize, bool) {
        self.scan_conds(|_| true)
    }

    /// Same as `hist_info` but restricted to backward conditionals.
    pub fn bw_hist_info(&self) -> (usize, bool) {
        self.scan_conds(|e| e.info.is_backward())
    }

    /// Path history update: (taken branch address, taken).
    pub fn phist_info(&self) -> (u64, bool) {
        self.taken_entry().map_or((0, false), |e| (e.pc(), true))
    }

    fn scan_conds(&self, counts: impl Fn(&BtbEntry) -> bool) -> (usize, bool) {
        let mut shamt = 0;
        for e in self.btb_entries.iter().filter(|e| e.valid) {
            if e.info.is_uncond() {
                break;
            }
            let taken = self.cond_taken(e.pc());
            if counts(e) {
                shamt += 1;
                if taken {
                    return (shamt, true);
                }
            } else if taken {
                break;
            }
        }
        (shamt, false)
    }

    /// Compares this stage's view with `other`.
    ///
    /// Two not-taken blocks always match. Two taken blocks must agree on the
    /// branch, its target, the block end and the history shift.
    ///
    /// # Returns
    ///
    /// `None` on a match, otherwise the first disagreement found.
    pub fn mismatch(&self, other: &Self, width: u64) -> Option<OverrideReason> {
        match (self.is_taken(), other.is_taken()) {
            (false, false) => None,
            (true, true) => {
                if self.control_addr(width) != other.control_addr(width) {
                    Some(OverrideReason::ControlAddr)
                } else if self.target(width) != other.target(width) {
                    Some(OverrideReason::Target)
                } else if self.end(width) != other.end(width) {
                    Some(OverrideReason::End)
                } else if self.hist_info() != other.hist_info() {
                    Some(OverrideReason::HistInfo)
                } else {
                    None
                }
            }
            _ => Some(OverrideReason::FallThru),
        }
    }
}
