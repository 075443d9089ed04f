//! Statistical Corrector (SC).
//!
//! A perceptron that second-guesses TAGE. Rows are selected by the PC hashed
//! with the global, backward and IMLI histories. Each row holds a bias weight,
//! a weight on TAGE's own direction, and one weight per global and local
//! history bit. The dot product overrides TAGE only when its magnitude clears
//! the training threshold; otherwise TAGE's direction stands.

use tracing::trace;

use crate::bpu::branch::{BtbEntry, FullBtbPrediction};
use crate::bpu::history::{HistoryRegister, SpeculativeHistories, local_slot};
use crate::bpu::stream::FetchStream;
use crate::config::ScConfig;

/// The corrector answers in stage 2.
pub const DELAY: usize = 2;

/// Coefficient used to calculate the training threshold.
const THETA_COEFF: f64 = 1.93;
/// Bias used to calculate the training threshold.
const THETA_BIAS: f64 = 14.0;

/// Corrector verdict for one conditional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScPrediction {
    /// Branch address.
    pub pc: u64,
    /// Direction TAGE proposed.
    pub tage_taken: bool,
    /// Perceptron output.
    pub sum: i32,
    /// The corrector reversed TAGE.
    pub flipped: bool,
}

/// Per-stream corrector snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScMeta {
    /// One record per conditional in the block.
    pub preds: Vec<ScPrediction>,
}

/// Statistical corrector structure.
#[derive(Debug)]
pub struct StatisticalCorrector {
    /// Table of weights (flattened).
    table: Vec<i8>,
    table_mask: usize,
    global_bits: usize,
    local_bits: usize,
    /// Bias + TAGE direction + history weights.
    row_size: usize,
    threshold: i32,
    meta: ScMeta,
    /// Times the corrector reversed TAGE.
    pub flips: u64,
}

/// Clamps a weight value to the 8-bit signed integer range.
fn clamp_weight(v: i32) -> i8 {
    v.clamp(i32::from(i8::MIN), i32::from(i8::MAX)) as i8
}

/// Maps a history bit to a perceptron input.
const fn input(bit: bool) -> i32 {
    if bit { 1 } else { -1 }
}

impl StatisticalCorrector {
    /// Creates a corrector with zeroed weights.
    pub fn new(config: &ScConfig) -> Self {
        let entries = 1usize << config.table_bits;
        let row_size = 2 + config.global_bits + config.local_bits;
        let threshold =
            (THETA_COEFF * ((config.global_bits + config.local_bits) as f64) + THETA_BIAS) as i32;
        Self {
            table: vec![0; entries * row_size],
            table_mask: entries - 1,
            global_bits: config.global_bits,
            local_bits: config.local_bits,
            row_size,
            threshold,
            meta: ScMeta::default(),
            flips: 0,
        }
    }

    /// Row index from the branch PC and the newest global, backward and IMLI bits.
    fn index(&self, pc: u64, ghr: &HistoryRegister, bw: &HistoryRegister, imli: &HistoryRegister) -> usize {
        let bits = self.table_mask.count_ones();
        let pc_idx = (pc >> 1) as usize & self.table_mask;
        let len = bits as usize;
        let hist = ghr.fold(len, bits) ^ (bw.fold(len, bits) << 1) ^ imli.fold(len, bits);
        pc_idx ^ (hist as usize & self.table_mask)
    }

    /// Computes the perceptron output for one row.
    fn output(&self, row: usize, tage_taken: bool, ghr: &HistoryRegister, lhr: &HistoryRegister) -> i32 {
        let base = row * self.row_size;
        let w = &self.table[base..base + self.row_size];
        let mut y = i32::from(w[0]) + i32::from(w[1]) * input(tage_taken);
        for i in 0..self.global_bits {
            y += i32::from(w[2 + i]) * input(ghr.bit(i));
        }
        for i in 0..self.local_bits {
            y += i32::from(w[2 + self.global_bits + i]) * input(lhr.bit(i));
        }
        y
    }

    /// Reviews TAGE's directions in stages `DELAY..`.
    ///
    /// `always_taken` entries are left alone.
    pub fn put_pc_history(&mut self, hist: &SpeculativeHistories, stage_preds: &mut [FullBtbPrediction]) {
        let Some(first) = stage_preds.get(DELAY) else {
            self.meta = ScMeta::default();
            return;
        };
        let lhr = hist.local_for(first.bb_start);
        let preds: Vec<ScPrediction> = first
            .btb_entries
            .iter()
            .filter(|e| e.valid && e.info.is_cond && !e.always_taken)
            .map(|e| {
                let tage_taken = first.cond_takens.get(&e.pc()).copied().unwrap_or(false);
                let row = self.index(e.pc(), &hist.global, &hist.backward, &hist.imli);
                let sum = self.output(row, tage_taken, &hist.global, lhr);
                let flipped = sum.abs() > self.threshold && (sum >= 0) != tage_taken;
                ScPrediction {
                    pc: e.pc(),
                    tage_taken,
                    sum,
                    flipped,
                }
            })
            .collect();
        for p in preds.iter().filter(|p| p.flipped) {
            self.flips += 1;
            trace!(target: "frontend::bpu", pc = format_args!("{:#x}", p.pc), sum = p.sum, "sc flip");
            for pred in stage_preds.iter_mut().skip(DELAY) {
                let _ = pred.cond_takens.insert(p.pc, !p.tage_taken);
            }
        }
        self.meta = ScMeta { preds };
    }

    /// Snapshot of the last prediction.
    pub const fn meta(&self) -> &ScMeta {
        &self.meta
    }

    /// Trains on every conditional the corrector saw in the committed stream.
    ///
    /// Trains if the final direction was wrong or the output was below the
    /// training threshold.
    pub fn update(&mut self, stream: &FetchStream, meta: &ScMeta) {
        let ghr = &stream.history;
        let empty = HistoryRegister::default();
        let lhr = stream
            .local_histories
            .get(local_slot(stream.local_histories.len(), stream.start_pc))
            .unwrap_or(&empty);
        let trained: Vec<&BtbEntry> = stream
            .update_btb_entries
            .iter()
            .filter(|e| e.info.is_cond)
            .collect();
        for e in trained {
            let Some(p) = meta.preds.iter().find(|p| p.pc == e.pc()) else {
                continue;
            };
            let taken = stream.exe_taken && stream.exe_branch_info.pc == e.pc();
            let row = self.index(e.pc(), ghr, &stream.bw_history, &stream.imli_history);
            let y = self.output(row, p.tage_taken, ghr, lhr);
            if y.abs() > self.threshold && (y >= 0) == taken {
                continue;
            }
            let t = input(taken);
            let base = row * self.row_size;
            self.table[base] = clamp_weight(i32::from(self.table[base]) + t);
            self.table[base + 1] = clamp_weight(i32::from(self.table[base + 1]) + t * input(p.tage_taken));
            for i in 0..self.global_bits {
                let w = base + 2 + i;
                self.table[w] = clamp_weight(i32::from(self.table[w]) + t * input(ghr.bit(i)));
            }
            for i in 0..self.local_bits {
                let w = base + 2 + self.global_bits + i;
                self.table[w] = clamp_weight(i32::from(self.table[w]) + t * input(lhr.bit(i)));
            }
        }
    }
}
