//! Branch Target Buffer (BTB).
//!
//! The main BTB is set associative and indexed by the start address of the
//! fetch block. One lookup returns every branch recorded for that block, so a
//! single prediction can see several conditionals ahead of the branch that
//! finally redirects. Entries carry a 2-bit counter and an `always_taken` flag
//! that give conditionals a direction even before TAGE has an opinion.

use tracing::trace;

use crate::bpu::branch::{BtbEntry, FullBtbPrediction};
use crate::bpu::stream::FetchStream;
use crate::config::BtbConfig;

/// The main BTB answers in stage 1.
pub const DELAY: usize = 1;

/// Counter bounds for conditional entries.
const CTR_MIN: i8 = -2;
const CTR_MAX: i8 = 1;

/// One way of a BTB set.
#[derive(Debug, Clone, Copy, Default)]
struct BtbWay {
    entry: BtbEntry,
    lru: u64,
}

/// Per-stream BTB snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BtbMeta {
    /// Entries returned by the lookup, sorted by PC.
    pub hit_entries: Vec<BtbEntry>,
}

/// Main BTB structure.
#[derive(Debug)]
pub struct Btb {
    sets: Vec<Vec<BtbWay>>,
    idx_mask: u64,
    idx_bits: u32,
    tag_mask: u64,
    tick: u64,
    meta: BtbMeta,
}

impl Btb {
    /// Creates an empty BTB.
    ///
    /// # Arguments
    ///
    /// * `config` - Geometry. `num_entries / ways` must be a power of two.
    pub fn new(config: &BtbConfig) -> Self {
        let num_sets = (config.num_entries / config.ways.max(1)).max(1);
        let tag_mask = if config.tag_bits >= 64 {
            u64::MAX
        } else {
            (1u64 << config.tag_bits) - 1
        };
        Self {
            sets: vec![vec![BtbWay::default(); config.ways]; num_sets],
            idx_mask: num_sets as u64 - 1,
            idx_bits: num_sets.trailing_zeros(),
            tag_mask,
            tick: 0,
            meta: BtbMeta::default(),
        }
    }

    /// Set index for a block starting at `start_pc`.
    fn index(&self, start_pc: u64) -> usize {
        ((start_pc >> 1) & self.idx_mask) as usize
    }

    /// Block tag for `start_pc`.
    pub fn tag(&self, start_pc: u64) -> u64 {
        (start_pc >> (1 + self.idx_bits)) & self.tag_mask
    }

    /// Every valid entry recorded for the block, sorted by PC.
    ///
    /// Entries before the block start are dropped.
    pub fn lookup(&mut self, start_pc: u64) -> Vec<BtbEntry> {
        let idx = self.index(start_pc);
        let tag = self.tag(start_pc);
        self.tick += 1;
        let tick = self.tick;
        let mut hits: Vec<BtbEntry> = self.sets[idx]
            .iter_mut()
            .filter(|w| w.entry.valid && w.entry.tag == tag)
            .map(|w| {
                w.lru = tick;
                w.entry
            })
            .filter(|e| e.pc() >= start_pc)
            .collect();
        hits.sort_by_key(BtbEntry::pc);
        hits
    }

    /// Looks up the block and fills stages from `DELAY` onwards.
    pub fn put_pc_history(&mut self, start_pc: u64, stage_preds: &mut [FullBtbPrediction]) {
        let hits = self.lookup(start_pc);
        for pred in stage_preds.iter_mut().skip(DELAY) {
            pred.btb_entries.clone_from(&hits);
            pred.cond_takens.clear();
            pred.indirect_targets.clear();
            for e in &hits {
                if e.info.is_cond {
                    let _ = pred.cond_takens.insert(e.pc(), e.always_taken || e.ctr >= 0);
                } else if e.info.is_indirect {
                    let _ = pred.indirect_targets.insert(e.pc(), e.info.target);
                }
            }
        }
        self.meta = BtbMeta { hit_entries: hits };
    }

    /// Snapshot of the last lookup.
    pub const fn meta(&self) -> &BtbMeta {
        &self.meta
    }

    /// Works out which entry, if any, the stream's real branch corresponds to.
    ///
    /// A branch already among the hit entries is reused; an unseen taken
    /// branch becomes a fresh entry; otherwise nothing new is recorded.
    pub fn get_and_set_new_btb_entry(&self, stream: &mut FetchStream, meta: &BtbMeta) {
        let exe = stream.exe_branch_info;
        let found = meta.hit_entries.iter().find(|e| e.pc() == exe.pc).copied();
        let mut entry = match found {
            Some(e) => e,
            None if stream.exe_taken => BtbEntry::new(exe),
            None => BtbEntry::default(),
        };
        entry.tag = self.tag(stream.start_pc);
        stream.update_is_old_entry = found.is_some();
        stream.update_new_btb_entry = entry;
    }

    /// Trains the block the stream was predicted from.
    pub fn update(&mut self, stream: &FetchStream, meta: &BtbMeta) {
        let new_entry = (!stream.update_is_old_entry && stream.update_new_btb_entry.valid)
            .then_some(stream.update_new_btb_entry);
        for mut e in trained_entries(stream, &meta.hit_entries, new_entry) {
            e.tag = self.tag(stream.start_pc);
            self.write(stream.start_pc, e);
        }
    }

    /// Writes `entry` into the block's set, replacing the same branch or the LRU way.
    fn write(&mut self, start_pc: u64, entry: BtbEntry) {
        let idx = self.index(start_pc);
        self.tick += 1;
        let tick = self.tick;
        let set = &mut self.sets[idx];
        let way = set
            .iter()
            .position(|w| w.entry.valid && w.entry.tag == entry.tag && w.entry.pc() == entry.pc())
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
                pc = format_args!("{:#x}", entry.pc()),
                "btb write"
            );
            set[way] = BtbWay { entry, lru: tick };
        }
    }
}

/// Applies a committed stream's outcome to the entries it covers.
///
/// Hit entries past `update_end_inst_pc` were never reached and are left
/// out. Conditionals move their counter towards the actual direction and
/// lose `always_taken` once seen not taken; an indirect branch that was
/// taken learns its latest target.
pub fn trained_entries(stream: &FetchStream, hit_entries: &[BtbEntry], new_entry: Option<BtbEntry>) -> Vec<BtbEntry> {
    let end = stream.update_end_inst_pc;
    let exe = stream.exe_branch_info;
    hit_entries
        .iter()
        .filter(|e| e.pc() <= end)
        .copied()
        .chain(new_entry)
        .map(|mut e| {
            let actually_taken = stream.exe_taken && exe.pc == e.pc();
            if e.info.is_cond {
                if !actually_taken {
                    e.always_taken = false;
                }
                e.ctr = if actually_taken {
                    (e.ctr + 1).min(CTR_MAX)
                } else {
                    (e.ctr - 1).max(CTR_MIN)
                };
            }
            if e.info.is_indirect && actually_taken {
                e.info.target = exe.target;
            }
            e
        })
        .collect()
}
