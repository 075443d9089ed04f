//! Ahead-pipelined BTB (aBTB).
//!
//! The ahead BTB holds the same kind of entries as the main BTB but picks its
//! set with the start address of a block predicted `ahead_stages` streams
//! earlier. The set read can therefore begin before the current block's
//! address is known. Each way remembers the full start address of the block
//! it describes, so two blocks reached from the same predecessor never alias.
//!
//! It answers in stage 1 and only fills stages the main BTB left empty.

use std::collections::VecDeque;

use tracing::trace;

use super::btb::trained_entries;
use crate::bpu::branch::{BtbEntry, FullBtbPrediction};
use crate::bpu::stream::FetchStream;
use crate::config::AbtbConfig;

/// The ahead BTB answers in stage 1.
pub const DELAY: usize = 1;

#[derive(Debug, Clone, Copy, Default)]
struct AbtbWay {
    entry: BtbEntry,
    start_pc: u64,
    lru: u64,
}

/// Per-stream ahead BTB snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbtbMeta {
    /// Address that selected the set.
    pub ahead_pc: u64,
    /// Entries returned by the lookup, sorted by PC.
    pub hit_entries: Vec<BtbEntry>,
}

/// Counters kept by the ahead BTB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AbtbStats {
    /// Lookups that found the block.
    pub pred_hit: u64,
    /// Lookups that did not.
    pub pred_miss: u64,
    /// Lookups whose entries were used because the main BTB had none.
    pub fills: u64,
    /// Lookups without enough stream history, indexed by the block itself.
    pub no_ahead_pc: u64,
}

/// Ahead-pipelined BTB structure.
#[derive(Debug)]
pub struct Abtb {
    sets: Vec<Vec<AbtbWay>>,
    idx_mask: u64,
    ahead_stages: usize,
    tick: u64,
    meta: AbtbMeta,
    /// Hit/miss counters.
    pub stats: AbtbStats,
}

impl Abtb {
    /// Creates an empty ahead BTB.
    pub fn new(config: &AbtbConfig) -> Self {
        let num_sets = (config.num_entries / config.ways.max(1)).max(1);
        Self {
            sets: vec![vec![AbtbWay::default(); config.ways]; num_sets],
            idx_mask: num_sets as u64 - 1,
            ahead_stages: config.ahead_stages,
            tick: 0,
            meta: AbtbMeta::default(),
            stats: AbtbStats::default(),
        }
    }

    /// Streams between the indexing block and the predicted one.
    pub const fn ahead_stages(&self) -> usize {
        self.ahead_stages
    }

    /// Address that indexes the lookup for `start_pc`.
    ///
    /// `previous_pcs` holds the start addresses of the streams before it,
    /// oldest first. Without enough of them the block indexes itself.
    pub fn ahead_pc(&self, start_pc: u64, previous_pcs: &VecDeque<u64>) -> u64 {
        if self.ahead_stages == 0 {
            return start_pc;
        }
        previous_pcs
            .len()
            .checked_sub(self.ahead_stages)
            .and_then(|i| previous_pcs.get(i))
            .copied()
            .unwrap_or(start_pc)
    }

    fn index(&self, ahead_pc: u64) -> usize {
        ((ahead_pc >> 1) & self.idx_mask) as usize
    }

    /// Every entry recorded for the block at `start_pc` in the set `ahead_pc` selects.
    pub fn lookup(&mut self, ahead_pc: u64, start_pc: u64) -> Vec<BtbEntry> {
        let idx = self.index(ahead_pc);
        self.tick += 1;
        let tick = self.tick;
        let mut hits: Vec<BtbEntry> = self.sets[idx]
            .iter_mut()
            .filter(|w| w.entry.valid && w.start_pc == start_pc)
            .map(|w| {
                w.lru = tick;
                w.entry
            })
            .filter(|e| e.pc() >= start_pc)
            .collect();
        hits.sort_by_key(BtbEntry::pc);
        hits
    }

    /// Looks up the block and fills the stages from `DELAY` onwards that
    /// hold no entries yet.
    pub fn put_pc_history(
        &mut self,
        start_pc: u64,
        previous_pcs: &VecDeque<u64>,
        stage_preds: &mut [FullBtbPrediction],
    ) {
        if self.ahead_stages > 0 && previous_pcs.len() < self.ahead_stages {
            self.stats.no_ahead_pc += 1;
        }
        let ahead_pc = self.ahead_pc(start_pc, previous_pcs);
        let hits = self.lookup(ahead_pc, start_pc);
        if hits.is_empty() {
            self.stats.pred_miss += 1;
        } else {
            self.stats.pred_hit += 1;
            let mut filled = false;
            for pred in stage_preds
                .iter_mut()
                .skip(DELAY)
                .filter(|p| p.btb_entries.is_empty())
            {
                filled = true;
                pred.btb_entries.clone_from(&hits);
                for e in &hits {
                    if e.info.is_cond {
                        let _ = pred.cond_takens.insert(e.pc(), e.always_taken || e.ctr >= 0);
                    } else if e.info.is_indirect {
                        let _ = pred.indirect_targets.insert(e.pc(), e.info.target);
                    }
                }
            }
            if filled {
                self.stats.fills += 1;
            }
        }
        self.meta = AbtbMeta {
            ahead_pc,
            hit_entries: hits,
        };
    }

    /// Snapshot of the last lookup.
    pub const fn meta(&self) -> &AbtbMeta {
        &self.meta
    }

    /// Trains the block the stream was predicted from, in the set chosen by
    /// the stream's own predecessors.
    pub fn update(&mut self, stream: &FetchStream, meta: &AbtbMeta) {
        let exe = stream.exe_branch_info;
        let known = meta.hit_entries.iter().any(|e| e.pc() == exe.pc);
        let new_entry = (stream.exe_taken && !known).then_some(BtbEntry::new(exe));
        let ahead_pc = self.ahead_pc(stream.start_pc, &stream.previous_pcs);
        for e in trained_entries(stream, &meta.hit_entries, new_entry) {
            self.write(ahead_pc, stream.start_pc, e);
        }
    }

    fn write(&mut self, ahead_pc: u64, start_pc: u64, entry: BtbEntry) {
        let idx = self.index(ahead_pc);
        self.tick += 1;
        let tick = self.tick;
        let set = &mut self.sets[idx];
        let way = set
            .iter()
            .position(|w| w.entry.valid && w.start_pc == start_pc && w.entry.pc() == entry.pc())
            .or_else(|| set.iter().position(|w| !w.entry.valid))
            .or_else(|| {
                set.iter()
                    .enumerate()
                    .min_by_key(|(_, w)| w.lru)
                    .map(|(i, _)| i)
            });
        if let Some(way) = way {
            trace!(
                target: "frontend::bpu",
                set = idx,
                way,
                ahead = format_args!("{ahead_pc:#x}"),
                pc = format_args!("{:#x}", entry.pc()),
                "abtb write"
            );
            set[way] = AbtbWay {
                entry,
                start_pc,
                lru: tick,
            };
        }
    }
}
