//! Indirect Target TAGE (ITTAGE).
//!
//! Predicts the targets of indirect jumps and calls (returns belong to the
//! RAS). Banks are tagged with the same geometric scheme as TAGE but hash
//! the path history in as well, since indirect targets correlate with the
//! route taken to reach the jump more than with conditional outcomes.

use tracing::trace;

use crate::bpu::branch::FullBtbPrediction;
use crate::bpu::history::{HistoryRegister, SpeculativeHistories};
use crate::bpu::stream::FetchStream;
use crate::config::IttageConfig;

/// ITTAGE answers in stage 2.
pub const DELAY: usize = 2;

/// Confidence saturation value.
const CTR_MAX: u8 = 3;

#[derive(Clone, Copy, Default, Debug)]
struct IttageEntry {
    tag: u16,
    target: u64,
    /// Target confidence; the target is replaced when it drops to zero.
    ctr: u8,
    u: u8,
    valid: bool,
}

/// ITTAGE's answer for one indirect branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IttagePrediction {
    /// Branch address.
    pub pc: u64,
    /// Providing bank, if any matched.
    pub provider: Option<usize>,
    /// Predicted target when a bank matched.
    pub target: Option<u64>,
}

/// Per-stream ITTAGE snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IttageMeta {
    /// One record per indirect branch in the block.
    pub preds: Vec<IttagePrediction>,
}

/// ITTAGE predictor.
#[derive(Debug)]
pub struct Ittage {
    banks: Vec<Vec<IttageEntry>>,
    hist_lengths: Vec<usize>,
    tag_widths: Vec<u32>,
    table_mask: usize,
    index_bits: u32,
    meta: IttageMeta,
}

impl Ittage {
    /// Creates an empty predictor.
    pub fn new(config: &IttageConfig) -> Self {
        Self {
            banks: config
                .history_lengths
                .iter()
                .map(|_| vec![IttageEntry::default(); config.table_size])
                .collect(),
            hist_lengths: config.history_lengths.clone(),
            tag_widths: config.tag_widths.clone(),
            table_mask: config.table_size.saturating_sub(1),
            index_bits: config.table_size.trailing_zeros(),
            meta: IttageMeta::default(),
        }
    }

    fn index(&self, pc: u64, bank: usize, ghr: &HistoryRegister, phr: &HistoryRegister) -> usize {
        let len = self.hist_lengths[bank];
        let h = ghr.fold(len, self.index_bits) ^ phr.fold(len, self.index_bits);
        (((pc >> 1) ^ h) as usize) & self.table_mask
    }

    fn tag(&self, pc: u64, bank: usize, ghr: &HistoryRegister, phr: &HistoryRegister) -> u16 {
        let len = self.hist_lengths[bank];
        let width = self.tag_widths[bank].clamp(2, 16);
        let h = ghr.fold(len, width) ^ (phr.fold(len, width - 1) << 1);
        (((pc >> 2) ^ h) & ((1u64 << width) - 1)) as u16
    }

    fn provider(&self, pc: u64, ghr: &HistoryRegister, phr: &HistoryRegister) -> Option<usize> {
        (0..self.banks.len()).rev().find(|&b| {
            let e = &self.banks[b][self.index(pc, b, ghr, phr)];
            e.valid && e.tag == self.tag(pc, b, ghr, phr)
        })
    }

    /// Predicts one indirect branch.
    pub fn predict(&self, pc: u64, ghr: &HistoryRegister, phr: &HistoryRegister) -> IttagePrediction {
        let provider = self.provider(pc, ghr, phr);
        let target = provider.map(|b| self.banks[b][self.index(pc, b, ghr, phr)].target);
        IttagePrediction { pc, provider, target }
    }

    /// Overrides BTB targets for indirect non-return branches in stages `DELAY..`.
    pub fn put_pc_history(&mut self, hist: &SpeculativeHistories, stage_preds: &mut [FullBtbPrediction]) {
        let Some(first) = stage_preds.get(DELAY) else {
            self.meta = IttageMeta::default();
            return;
        };
        let preds: Vec<IttagePrediction> = first
            .btb_entries
            .iter()
            .filter(|e| e.valid && e.info.is_indirect && !e.info.is_return)
            .map(|e| self.predict(e.pc(), &hist.global, &hist.path))
            .collect();
        for pred in stage_preds.iter_mut().skip(DELAY) {
            for p in &preds {
                if let Some(target) = p.target {
                    let _ = pred.indirect_targets.insert(p.pc, target);
                }
            }
        }
        self.meta = IttageMeta { preds };
    }

    /// Snapshot of the last prediction.
    pub const fn meta(&self) -> &IttageMeta {
        &self.meta
    }

    /// Trains on the stream's resolved indirect branch, if it had one.
    pub fn update(&mut self, stream: &FetchStream, meta: &IttageMeta) {
        let exe = stream.exe_branch_info;
        if !stream.exe_taken || !exe.is_indirect || exe.is_return {
            return;
        }
        let (ghr, phr) = (&stream.history, &stream.phistory);
        let pc = exe.pc;
        let provider = meta
            .preds
            .iter()
            .find(|p| p.pc == pc)
            .map_or_else(|| self.provider(pc, ghr, phr), |p| p.provider)
            .filter(|&b| {
                let e = &self.banks[b][self.index(pc, b, ghr, phr)];
                e.valid && e.tag == self.tag(pc, b, ghr, phr)
            });

        let correct = if let Some(bank) = provider {
            let idx = self.index(pc, bank, ghr, phr);
            let e = &mut self.banks[bank][idx];
            if e.target == exe.target {
                e.ctr = (e.ctr + 1).min(CTR_MAX);
                e.u = (e.u + 1).min(CTR_MAX);
                true
            } else {
                e.ctr = e.ctr.saturating_sub(1);
                if e.ctr == 0 {
                    e.target = exe.target;
                    e.ctr = 1;
                }
                false
            }
        } else {
            false
        };

        if !correct {
            self.allocate(pc, exe.target, provider.map_or(0, |b| b + 1), ghr, phr);
        }
    }

    fn allocate(&mut self, pc: u64, target: u64, start_bank: usize, ghr: &HistoryRegister, phr: &HistoryRegister) {
        for bank in start_bank..self.banks.len() {
            let idx = self.index(pc, bank, ghr, phr);
            let tag = self.tag(pc, bank, ghr, phr);
            let e = &mut self.banks[bank][idx];
            if e.u == 0 {
                *e = IttageEntry {
                    tag,
                    target,
                    ctr: 1,
                    u: 0,
                    valid: true,
                };
                trace!(
                    target: "frontend::bpu",
                    pc = format_args!("{pc:#x}"),
                    bank,
                    dest = format_args!("{target:#x}"),
                    "ittage allocate"
                );
                return;
            }
        }
        for bank in start_bank..self.banks.len() {
            let idx = self.index(pc, bank, ghr, phr);
            let e = &mut self.banks[bank][idx];
            e.u = e.u.saturating_sub(1);
        }
    }
}
