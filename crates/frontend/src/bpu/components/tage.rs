//! TAGE (Tagged Geometric History Length) direction predictor.
//!
//! TAGE uses a base bimodal predictor and multiple tagged banks indexed with
//! geometrically increasing history lengths. In the block-based front end it
//! predicts every conditional the BTB found in the block, all with the global
//! history as it stood at the start of the block. A loop predictor sits in
//! front of the banks and overrides them for confidently counted loop exits.
//!
//! # Performance
//!
//! - **Time Complexity:**
//!   - `put_pc_history()`: O(C × B) for C conditionals and B banks
//!   - `update()`: O(C × B)
//! - **Space Complexity:** O(T × B) where T is table size per bank
//! - **Best Case:** History-correlated patterns with varying lengths
//! - **Worst Case:** Random or completely uncorrelated branches (~50% accuracy)

use tracing::trace;

use crate::bpu::branch::{BranchInfo, BtbEntry, FullBtbPrediction};
use crate::bpu::history::{HistoryRegister, SpeculativeHistories};
use crate::bpu::stream::FetchStream;
use crate::config::TageConfig;

/// TAGE answers in stage 1, together with the main BTB.
pub const DELAY: usize = 1;

/// An entry in a TAGE bank.
#[derive(Clone, Copy, Default, Debug)]
struct TageEntry {
    /// Tag for matching the history/PC hash.
    tag: u16,
    /// 3-bit saturating counter for prediction.
    ctr: i8,
    /// 2-bit useful counter for replacement policy.
    u: u8,
    /// Entry was ever allocated.
    valid: bool,
}

/// Loop Predictor Entry for handling loop exit branches.
#[derive(Clone, Copy, Default, Debug)]
struct LoopEntry {
    /// Tag for matching the branch PC.
    tag: u16,
    /// Confidence counter.
    conf: u8,
    /// Current iteration count.
    count: u16,
    /// Iteration limit detected.
    limit: u16,
    /// Age/Usefulness counter.
    age: u8,
    /// Predicted direction.
    dir: bool,
}

/// TAGE's answer for one conditional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TagePrediction {
    /// Branch address.
    pub pc: u64,
    /// Bank that provided the prediction; `None` means the base table.
    pub provider: Option<usize>,
    /// Direction of the alternate prediction.
    pub alt_taken: bool,
    /// Final direction.
    pub taken: bool,
    /// The loop predictor overrode the banks.
    pub loop_used: bool,
}

/// Per-stream TAGE snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TageMeta {
    /// One record per conditional predicted in the block.
    pub preds: Vec<TagePrediction>,
}

/// TAGE Predictor structure.
#[derive(Debug)]
pub struct Tage {
    /// Base bimodal predictor table.
    base: Vec<i8>,
    base_mask: usize,
    /// Tagged component banks.
    banks: Vec<Vec<TageEntry>>,
    /// Geometric history lengths for each bank.
    hist_lengths: Vec<usize>,
    /// Tag widths for each bank.
    tag_widths: Vec<u32>,
    /// Mask for indexing the tables.
    table_mask: usize,
    index_bits: u32,

    /// Loop predictor table.
    loops: Vec<LoopEntry>,
    /// Mask for indexing the loop table.
    loop_mask: usize,

    /// Counter for periodic reset of useful bits.
    clock_counter: u32,
    /// Interval for resetting useful bits.
    reset_interval: u32,

    meta: TageMeta,
}

impl Tage {
    /// Creates a new TAGE predictor from configuration.
    ///
    /// Table sizes are validated by `BpuConfig::validate`.
    pub fn new(config: &TageConfig) -> Self {
        let banks = config
            .history_lengths
            .iter()
            .map(|_| vec![TageEntry::default(); config.table_size])
            .collect();
        Self {
            base: vec![0; config.base_table_size],
            base_mask: config.base_table_size.saturating_sub(1),
            banks,
            hist_lengths: config.history_lengths.clone(),
            tag_widths: config.tag_widths.clone(),
            table_mask: config.table_size.saturating_sub(1),
            index_bits: config.table_size.trailing_zeros(),
            loops: vec![LoopEntry::default(); config.loop_table_size],
            loop_mask: config.loop_table_size.saturating_sub(1),
            clock_counter: 0,
            reset_interval: config.reset_interval.max(1),
            meta: TageMeta::default(),
        }
    }

    /// Calculates the index for a specific bank from the PC and folded history.
    fn index(&self, pc: u64, bank: usize, ghr: &HistoryRegister) -> usize {
        let folded = ghr.fold(self.hist_lengths[bank], self.index_bits);
        (((pc >> 1) ^ (pc >> (1 + self.index_bits)) ^ folded) as usize) & self.table_mask
    }

    /// Calculates the tag for a specific bank from the PC and folded history.
    fn tag(&self, pc: u64, bank: usize, ghr: &HistoryRegister) -> u16 {
        let len = self.hist_lengths[bank];
        let width = self.tag_widths[bank].clamp(2, 16);
        let h = ghr.fold(len, width) ^ (ghr.fold(len, width - 1) << 1);
        (((pc >> 1) ^ h) & ((1u64 << width) - 1)) as u16
    }

    fn base_index(&self, pc: u64) -> usize {
        ((pc >> 1) as usize) & self.base_mask
    }

    /// Longest and second-longest matching banks, longest first.
    fn providers(&self, pc: u64, ghr: &HistoryRegister) -> (Option<usize>, Option<usize>) {
        let mut hits = (0..self.banks.len()).rev().filter(|&b| {
            let e = &self.banks[b][self.index(pc, b, ghr)];
            e.valid && e.tag == self.tag(pc, b, ghr)
        });
        (hits.next(), hits.next())
    }

    fn bank_taken(&self, pc: u64, bank: Option<usize>, ghr: &HistoryRegister) -> bool {
        bank.map_or_else(
            || self.base[self.base_index(pc)] >= 0,
            |b| self.banks[b][self.index(pc, b, ghr)].ctr >= 0,
        )
    }

    /// Checks the loop predictor for a matching entry.
    fn loop_pred(&self, pc: u64) -> Option<bool> {
        let e = &self.loops[((pc >> 1) as usize) & self.loop_mask];
        let tag = ((pc >> 8) & 0xFFFF) as u16;
        if e.tag == tag && e.conf == 3 {
            Some(if e.count < e.limit { e.dir } else { !e.dir })
        } else {
            None
        }
    }

    /// Predicts one conditional.
    pub fn predict(&self, pc: u64, ghr: &HistoryRegister) -> TagePrediction {
        let (provider, alt) = self.providers(pc, ghr);
        let provider_taken = self.bank_taken(pc, provider, ghr);
        let alt_taken = self.bank_taken(pc, alt, ghr);
        let loop_dir = self.loop_pred(pc);
        TagePrediction {
            pc,
            provider,
            alt_taken,
            taken: loop_dir.unwrap_or(provider_taken),
            loop_used: loop_dir.is_some(),
        }
    }

    /// Bank, counter and useful bits of the entry providing for `pc`.
    pub fn provider_entry(&self, pc: u64, ghr: &HistoryRegister) -> Option<(usize, i8, u8)> {
        let (provider, _) = self.providers(pc, ghr);
        provider.map(|b| {
            let e = &self.banks[b][self.index(pc, b, ghr)];
            (b, e.ctr, e.u)
        })
    }

    /// Sets the direction of every conditional the BTB placed in stages `DELAY..`.
    ///
    /// Entries the BTB marks `always_taken` keep their taken direction.
    pub fn put_pc_history(&mut self, hist: &SpeculativeHistories, stage_preds: &mut [FullBtbPrediction]) {
        let Some(first) = stage_preds.get(DELAY) else {
            return;
        };
        let preds: Vec<TagePrediction> = first
            .btb_entries
            .iter()
            .filter(|e| e.valid && e.info.is_cond)
            .map(|e| {
                let mut p = self.predict(e.pc(), &hist.global);
                if e.always_taken {
                    p.taken = true;
                }
                p
            })
            .collect();
        for pred in stage_preds.iter_mut().skip(DELAY) {
            for p in &preds {
                let _ = pred.cond_takens.insert(p.pc, p.taken);
            }
        }
        self.meta = TageMeta { preds };
    }

    /// Snapshot of the last prediction.
    pub const fn meta(&self) -> &TageMeta {
        &self.meta
    }

    /// Trains every conditional covered by a committed stream.
    ///
    /// Indices are recomputed from the stream's global history snapshot, so
    /// training hits the same entries the prediction read.
    pub fn update(&mut self, stream: &FetchStream, meta: &TageMeta) {
        let ghr = &stream.history;
        let mut conds: Vec<BtbEntry> = stream
            .update_btb_entries
            .iter()
            .filter(|e| e.info.is_cond)
            .copied()
            .collect();
        let new_entry = stream.update_new_btb_entry;
        if !stream.update_is_old_entry && new_entry.valid && new_entry.info.is_cond {
            conds.push(new_entry);
        }
        for e in conds {
            let taken = stream.exe_taken && stream.exe_branch_info.pc == e.pc();
            let predicted = meta
                .preds
                .iter()
                .find(|p| p.pc == e.pc())
                .copied()
                .unwrap_or_else(|| self.predict(e.pc(), ghr));
            self.train(e.pc(), taken, &predicted, ghr);
        }
    }

    fn train(&mut self, pc: u64, taken: bool, predicted: &TagePrediction, ghr: &HistoryRegister) {
        self.clock_counter += 1;
        if self.clock_counter >= self.reset_interval {
            self.clock_counter = 0;
            for bank in &mut self.banks {
                for entry in bank {
                    entry.u >>= 1;
                }
            }
        }

        let (provider, _) = self.providers(pc, ghr);
        let provider_taken = self.bank_taken(pc, provider, ghr);
        let mispredicted = provider_taken != taken;

        if let Some(bank) = provider {
            let idx = self.index(pc, bank, ghr);
            let e = &mut self.banks[bank][idx];
            e.ctr = if taken { (e.ctr + 1).min(3) } else { (e.ctr - 1).max(-4) };
            if !mispredicted && predicted.alt_taken != taken && e.u < 3 {
                e.u += 1;
            }
        } else {
            let idx = self.base_index(pc);
            let b = &mut self.base[idx];
            *b = if taken { (*b + 1).min(1) } else { (*b - 1).max(-2) };
        }

        if mispredicted {
            let start_bank = provider.map_or(0, |b| b + 1);
            let mut allocated = false;
            for bank in start_bank..self.banks.len() {
                let idx = self.index(pc, bank, ghr);
                let tag = self.tag(pc, bank, ghr);
                let e = &mut self.banks[bank][idx];
                if e.u == 0 {
                    *e = TageEntry {
                        tag,
                        ctr: if taken { 0 } else { -1 },
                        u: 0,
                        valid: true,
                    };
                    allocated = true;
                    trace!(target: "frontend::bpu", pc = format_args!("{pc:#x}"), bank, "tage allocate");
                    break;
                }
            }
            if !allocated {
                for bank in start_bank..self.banks.len() {
                    let idx = self.index(pc, bank, ghr);
                    let e = &mut self.banks[bank][idx];
                    e.u = e.u.saturating_sub(1);
                }
            }
        }
    }

    /// Advances the loop predictor with one committed conditional.
    pub fn commit_branch(&mut self, stream: &FetchStream, branch: &BranchInfo) {
        if !branch.is_cond {
            return;
        }
        let taken = stream.exe_taken && stream.exe_branch_info.pc == branch.pc;
        let l_tag = ((branch.pc >> 8) & 0xFFFF) as u16;
        let loop_entry = &mut self.loops[((branch.pc >> 1) as usize) & self.loop_mask];

        if loop_entry.tag == l_tag {
            loop_entry.age = loop_entry.age.saturating_add(1);
            if taken == loop_entry.dir {
                loop_entry.count = loop_entry.count.saturating_add(1);
            } else {
                if loop_entry.count == loop_entry.limit {
                    if loop_entry.conf < 3 {
                        loop_entry.conf += 1;
                    }
                } else {
                    loop_entry.limit = loop_entry.count;
                    loop_entry.conf = 0;
                    loop_entry.age = 0;
                }
                loop_entry.count = 0;
            }
        } else if loop_entry.age == 0 {
            *loop_entry = LoopEntry {
                tag: l_tag,
                conf: 0,
                count: 0,
                limit: 0,
                age: 255,
                dir: taken,
            };
        } else {
            loop_entry.age -= 1;
        }
    }
}
