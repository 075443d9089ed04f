//! Speculative branch history.
//!
//! This module holds every history variant the predictor components index
//! with, and the ledger used to verify them:
//! 1. **`HistoryRegister`:** A fixed-length bit register; bit 0 is the newest.
//! 2. **`SpeculativeHistories`:** Global, path, backward, IMLI and per-PC local
//!    histories, updated at prediction time and restored from stream snapshots.
//! 3. **`HistoryManager`:** An ordered ledger of the updates applied per stream.
//!    It is trimmed on commit, truncated on squash, and can rebuild the ideal
//!    global history to cross-check the live register.

use std::collections::VecDeque;

use bitvec::prelude::*;
use tracing::{trace, warn};

use super::branch::BranchInfo;
use crate::common::FetchStreamId;
use crate::config::BpuConfig;

/// Fixed-length history shift register.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryRegister {
    bits: BitVec<u64, Lsb0>,
}

impl HistoryRegister {
    /// Creates an all-zero register of `len` bits.
    pub fn new(len: usize) -> Self {
        Self {
            bits: BitVec::repeat(false, len),
        }
    }

    /// Register length in bits.
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Zero-length registers ignore every update.
    pub fn is_empty(&self) -> bool {
        self.bits.is_empty()
    }

    /// Reads bit `idx`; bits past the end read as zero.
    pub fn bit(&self, idx: usize) -> bool {
        self.bits.get(idx).is_some_and(|b| *b)
    }

    /// Shifts `shamt` positions towards older bits and writes `taken` into bit 0.
    ///
    /// A zero shift leaves the register untouched.
    pub fn shift_in(&mut self, shamt: usize, taken: bool) {
        if shamt == 0 || self.bits.is_empty() {
            return;
        }
        self.shift(shamt);
        self.bits.set(0, taken);
    }

    /// Path history update: two hashed PC bits per taken branch.
    pub fn path_shift_in(&mut self, shamt: usize, taken: bool, pc: u64) {
        if shamt == 0 || !taken || self.bits.is_empty() {
            return;
        }
        let hash = (pc >> 1) ^ (pc >> 3) ^ (pc >> 5) ^ (pc >> 7);
        self.shift(2);
        self.bits.set(0, hash & 1 != 0);
        if self.bits.len() > 1 {
            self.bits.set(1, (hash >> 1) & 1 != 0);
        }
    }

    fn shift(&mut self, by: usize) {
        if by >= self.bits.len() {
            self.bits.fill(false);
        } else {
            self.bits.shift_right(by);
        }
    }

    /// The newest `n` bits (at most 64) as an integer, bit 0 newest.
    pub fn low_bits(&self, n: usize) -> u64 {
        let n = n.min(64).min(self.bits.len());
        if n == 0 {
            return 0;
        }
        self.bits[..n].load_le::<u64>()
    }

    /// XOR-folds the newest `len` bits into `width` bits.
    ///
    /// This is the index/tag compression used by the tagged tables.
    pub fn fold(&self, len: usize, width: u32) -> u64 {
        let len = len.min(self.bits.len());
        let width = (width as usize).clamp(1, 64);
        if len == 0 {
            return 0;
        }
        self.bits[..len]
            .chunks(width)
            .fold(0, |acc, chunk| acc ^ chunk.load_le::<u64>())
    }

    /// Compares the newest `n` bits of two registers.
    pub fn low_bits_eq(&self, other: &Self, n: usize) -> bool {
        let n = n.min(self.bits.len()).min(other.bits.len());
        self.bits[..n] == other.bits[..n]
    }
}

/// Slot of the local history table with `entries` registers used for `pc`.
pub const fn local_slot(entries: usize, pc: u64) -> usize {
    ((pc >> 1) as usize) & entries.saturating_sub(1)
}

/// Every history variant owned by the BPU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeculativeHistories {
    /// Global taken/not-taken history.
    pub global: HistoryRegister,
    /// Hashed path of taken branches.
    pub path: HistoryRegister,
    /// Backward conditional history.
    pub backward: HistoryRegister,
    /// Inner-most loop iteration history.
    pub imli: HistoryRegister,
    /// Per-PC local histories.
    pub local: Vec<HistoryRegister>,
}

impl SpeculativeHistories {
    /// Creates zeroed histories sized from the configuration.
    pub fn new(config: &BpuConfig) -> Self {
        Self {
            global: HistoryRegister::new(config.global_history_bits),
            path: HistoryRegister::new(config.path_history_bits),
            backward: HistoryRegister::new(config.backward_history_bits),
            imli: HistoryRegister::new(config.imli_bits),
            local: vec![
                HistoryRegister::new(config.local_history_bits);
                config.local_history_entries
            ],
        }
    }

    /// Local history slot for a block starting at `pc`.
    pub fn local_index(&self, pc: u64) -> usize {
        local_slot(self.local.len(), pc)
    }

    /// Local history register for a block starting at `pc`.
    pub fn local_for(&self, pc: u64) -> &HistoryRegister {
        &self.local[self.local_index(pc)]
    }

    /// Applies one block's outcome to every variant.
    ///
    /// # Arguments
    ///
    /// * `start_pc` - Block start, selects the local history register.
    /// * `hist` - Global `(shamt, taken)`.
    /// * `bw_hist` - Backward-only `(shamt, taken)`, also drives IMLI.
    /// * `phist` - `(taken branch pc, taken)` for the path history.
    pub fn apply(
        &mut self,
        start_pc: u64,
        hist: (usize, bool),
        bw_hist: (usize, bool),
        phist: (u64, bool),
    ) {
        self.global.shift_in(hist.0, hist.1);
        self.backward.shift_in(bw_hist.0, bw_hist.1);
        self.imli.shift_in(bw_hist.0, bw_hist.1);
        self.path.path_shift_in(1, phist.1, phist.0);
        let idx = self.local_index(start_pc);
        self.local[idx].shift_in(hist.0, hist.1);
    }
}

/// One ledger record: the global-history update applied for a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Block start address.
    pub pc: u64,
    /// Bits shifted in.
    pub shamt: usize,
    /// Value written into bit 0.
    pub cond_taken: bool,
    /// Redirecting branch is a call.
    pub is_call: bool,
    /// Redirecting branch is a return.
    pub is_return: bool,
    /// Address after the redirecting branch.
    pub ret_addr: u64,
    /// Owning stream.
    pub stream_id: FetchStreamId,
}

/// Ledger of speculative history updates, oldest first.
#[derive(Debug, Clone)]
pub struct HistoryManager {
    entries: VecDeque<HistoryEntry>,
    max_shamt: usize,
}

impl HistoryManager {
    /// Creates an empty ledger.
    pub const fn new(max_shamt: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            max_shamt,
        }
    }

    /// Records the update applied for a newly predicted stream.
    pub fn add_speculative_hist(
        &mut self,
        pc: u64,
        shamt: usize,
        cond_taken: bool,
        branch: &BranchInfo,
        stream_id: FetchStreamId,
    ) {
        let entry = HistoryEntry {
            pc,
            shamt,
            cond_taken,
            is_call: branch.is_call,
            is_return: branch.is_return,
            ret_addr: branch.end(),
            stream_id,
        };
        trace!(target: "frontend::history", ?entry, "add");
        self.check_sanity(&entry);
        self.entries.push_back(entry);
    }

    /// Drops every record owned by streams up to and including `stream_id`.
    pub fn commit(&mut self, stream_id: FetchStreamId) {
        while self.entries.front().is_some_and(|e| e.stream_id <= stream_id) {
            if let Some(entry) = self.entries.pop_front() {
                trace!(target: "frontend::history", ?entry, "commit");
            }
        }
    }

    /// Rewrites the squashing stream's record and discards all younger ones.
    pub fn squash(
        &mut self,
        stream_id: FetchStreamId,
        shamt: usize,
        cond_taken: bool,
        branch: &BranchInfo,
    ) {
        while self.entries.back().is_some_and(|e| e.stream_id > stream_id) {
            if let Some(entry) = self.entries.pop_back() {
                trace!(target: "frontend::history", ?entry, "squash");
            }
        }
        if let Some(entry) = self.entries.iter_mut().rev().find(|e| e.stream_id == stream_id) {
            entry.shamt = shamt;
            entry.cond_taken = cond_taken;
            entry.is_call = branch.is_call;
            entry.is_return = branch.is_return;
            entry.ret_addr = branch.end();
        }
        if let Some(entry) = self.entries.back() {
            self.check_sanity(entry);
        }
    }

    /// Records in program order.
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No speculative records are live.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Rebuilds the global history implied by the ledger.
    ///
    /// # Returns
    ///
    /// `(ideal history, number of meaningful bits)`.
    pub fn ideal_history(&self, len: usize) -> (HistoryRegister, usize) {
        let mut ideal = HistoryRegister::new(len);
        let mut size = 0;
        for e in self.entries.iter().filter(|e| e.shamt != 0) {
            size += e.shamt;
            ideal.shift_in(e.shamt, e.cond_taken);
        }
        (ideal, size.min(len))
    }

    /// Compares the live global history against the ledger replay.
    ///
    /// # Returns
    ///
    /// `Ok(())` on agreement, or `Err(bits compared)` on divergence.
    pub fn check_history(&self, real: &HistoryRegister) -> Result<(), usize> {
        let (ideal, comparable) = self.ideal_history(real.len());
        if ideal.low_bits_eq(real, comparable) {
            Ok(())
        } else {
            Err(comparable)
        }
    }

    fn check_sanity(&self, entry: &HistoryEntry) {
        if entry.shamt > self.max_shamt {
            warn!(
                target: "frontend::history",
                stream_id = entry.stream_id,
                shamt = entry.shamt,
                max = self.max_shamt,
                "ledger entry shifts more bits than expected"
            );
        }
    }
}
