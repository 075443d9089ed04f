//! Micro BTB (uBTB).
//!
//! A small fully associative table answering in the first prediction stage.
//! Each entry remembers, for one block start, the branch that ended the block
//! and how many not-taken conditionals preceded it. It is trained from the
//! final prediction of the slower stages rather than from commit, so it
//! learns to reproduce their answer one stage earlier.

use tracing::trace;

use crate::bpu::branch::{BranchInfo, BtbEntry, FullBtbPrediction};
use crate::bpu::stream::FetchStream;
use crate::config::UbtbConfig;

/// The uBTB answers in stage 0.
pub const DELAY: usize = 0;

/// Placeholder address for the not-taken conditionals an entry stands for.
const DUMMY_COND_PC: u64 = 0xdead_beef;

/// Saturation value of the usefulness counter.
const UCTR_MAX: u8 = 3;

/// One uBTB entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UbtbEntry {
    /// Branch ending the block, with the block tag.
    pub entry: BtbEntry,
    /// Usefulness; the entry is dropped when it reaches zero.
    pub uctr: u8,
    /// Not-taken conditionals before the branch.
    pub num_nt_conds: usize,
    /// Last access time, for replacement.
    pub tick: u64,
}

/// Per-stream uBTB snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UbtbMeta {
    /// Entry that hit, if any.
    pub hit_entry: Option<UbtbEntry>,
}

/// Counters kept by the uBTB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UbtbStats {
    /// Lookups that hit.
    pub pred_hit: u64,
    /// Lookups that missed.
    pub pred_miss: u64,
    /// Committed taken streams the uBTB did not predict.
    pub update_miss: u64,
}

/// Micro BTB structure.
#[derive(Debug)]
pub struct Ubtb {
    entries: Vec<UbtbEntry>,
    tag_mask: u64,
    predict_width: u64,
    tick: u64,
    last_hit: Option<usize>,
    meta: UbtbMeta,
    /// Hit/miss counters.
    pub stats: UbtbStats,
}

impl Ubtb {
    /// Creates an empty uBTB.
    pub fn new(config: &UbtbConfig, predict_width: u64) -> Self {
        let tag_mask = if config.tag_bits >= 64 {
            u64::MAX
        } else {
            (1u64 << config.tag_bits) - 1
        };
        Self {
            entries: vec![UbtbEntry::default(); config.num_entries],
            tag_mask,
            predict_width,
            tick: 0,
            last_hit: None,
            meta: UbtbMeta::default(),
            stats: UbtbStats::default(),
        }
    }

    fn tag(&self, start_pc: u64) -> u64 {
        (start_pc >> 1) & self.tag_mask
    }

    /// Finds the entry for a block, refreshing its age.
    ///
    /// Odd start addresses never hit.
    fn lookup(&mut self, start_pc: u64) -> Option<usize> {
        if start_pc & 1 != 0 {
            return None;
        }
        let tag = self.tag(start_pc);
        let idx = self
            .entries
            .iter()
            .position(|e| e.entry.valid && e.entry.tag == tag)?;
        self.tick += 1;
        self.entries[idx].tick = self.tick;
        Some(idx)
    }

    /// Looks up `start_pc` and fills every stage.
    ///
    /// The stages are cleared first; the uBTB runs before every other component.
    pub fn put_pc_history(&mut self, start_pc: u64, stage_preds: &mut [FullBtbPrediction]) {
        let hit = self.lookup(start_pc);
        self.last_hit = hit;
        let hit_entry = hit.map(|i| self.entries[i]);
        self.meta = UbtbMeta { hit_entry };
        if hit_entry.is_some() {
            self.stats.pred_hit += 1;
        } else {
            self.stats.pred_miss += 1;
        }

        for pred in stage_preds.iter_mut().skip(DELAY) {
            pred.btb_entries.clear();
            pred.cond_takens.clear();
            pred.indirect_targets.clear();
            let Some(hit) = hit_entry else { continue };
            let dummy = BtbEntry {
                info: BranchInfo {
                    pc: DUMMY_COND_PC,
                    is_cond: true,
                    ..BranchInfo::default()
                },
                valid: true,
                ..BtbEntry::default()
            };
            pred.btb_entries
                .extend(std::iter::repeat_n(dummy, hit.num_nt_conds));
            pred.btb_entries.push(hit.entry);
            let info = hit.entry.info;
            if info.is_cond {
                let _ = pred.cond_takens.insert(info.pc, true);
            } else if info.is_indirect {
                let _ = pred.indirect_targets.insert(info.pc, info.target);
                if info.is_return {
                    pred.return_target = info.target;
                }
            }
        }
    }

    /// Snapshot of the last lookup.
    pub const fn meta(&self) -> &UbtbMeta {
        &self.meta
    }

    /// Trains the last looked-up block from the final prediction.
    ///
    /// A hit the final prediction disagrees with loses usefulness and is
    /// replaced once useless; a miss where the final prediction is taken
    /// allocates an invalid or the least recently used entry.
    pub fn update_using_final_pred(&mut self, final_pred: &FullBtbPrediction) {
        let taken = final_pred.taken_entry().is_some();
        match (self.last_hit, taken) {
            (Some(idx), false) => {
                let e = &mut self.entries[idx];
                e.uctr = e.uctr.saturating_sub(1);
                if e.uctr == 0 {
                    e.entry.valid = false;
                }
            }
            (None, true) => {
                let victim = self
                    .entries
                    .iter()
                    .position(|e| !e.entry.valid)
                    .or_else(|| {
                        self.entries
                            .iter()
                            .enumerate()
                            .min_by_key(|(_, e)| e.tick)
                            .map(|(i, _)| i)
                    });
                if let Some(idx) = victim {
                    self.replace(idx, final_pred);
                }
            }
            (Some(idx), true) => {
                let w = self.predict_width;
                let e = &mut self.entries[idx];
                if e.entry.pc() != final_pred.control_addr(w) || e.entry.info.target != final_pred.target(w) {
                    e.uctr = e.uctr.saturating_sub(1);
                    if e.uctr == 0 {
                        self.replace(idx, final_pred);
                    }
                } else if e.uctr < UCTR_MAX {
                    e.uctr += 1;
                }
            }
            (None, false) => {}
        }
    }

    fn replace(&mut self, idx: usize, final_pred: &FullBtbPrediction) {
        let Some(taken) = final_pred.taken_entry().copied() else {
            return;
        };
        let mut entry = taken;
        entry.info.target = final_pred.target(self.predict_width);
        entry.tag = self.tag(final_pred.bb_start);
        entry.valid = true;
        let (shamt, _) = final_pred.hist_info();
        let num_nt_conds = if taken.info.is_cond {
            shamt.saturating_sub(1)
        } else {
            shamt
        };
        self.tick += 1;
        trace!(
            target: "frontend::bpu",
            start = format_args!("{:#x}", final_pred.bb_start),
            pc = format_args!("{:#x}", entry.pc()),
            num_nt_conds,
            "ubtb allocate"
        );
        self.entries[idx] = UbtbEntry {
            entry,
            uctr: 1,
            num_nt_conds,
            tick: self.tick,
        };
    }

    /// Counts committed taken streams the uBTB did not foresee.
    pub fn update(&mut self, stream: &FetchStream, meta: &UbtbMeta) {
        if !stream.exe_taken {
            return;
        }
        if meta.hit_entry.is_none_or(|e| e.entry.pc() != stream.exe_branch_info.pc) {
            self.stats.update_miss += 1;
        }
    }
}
