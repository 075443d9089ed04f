//! Fetch Target Queue (FTQ).
//!
//! The FTQ decomposes predicted streams into contiguous address ranges that
//! the fetch engine walks instruction by instruction. It tracks two cursors:
//! 1. **Enqueue state:** where the next target starts, which stream it comes
//!    from, and the id it will receive.
//! 2. **Supply state:** which target fetch is currently consuming, and the id
//!    fetch demands next.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use crate::common::{FetchStreamId, FetchTargetId};

/// Reset vector used before the first redirect.
pub const RESET_PC: u64 = 0x8000_0000;

/// One FTQ entry: a contiguous fetch range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FtqEntry {
    /// First byte of the range.
    pub start_pc: u64,
    /// Exclusive end of the range.
    pub end_pc: u64,
    /// Address of the taken branch when `taken`.
    pub taken_pc: u64,
    /// The range ends in a taken branch.
    pub taken: bool,
    /// Redirect address when `taken`.
    pub target: u64,
    /// Owning stream.
    pub fsq_id: FetchStreamId,
}

impl FtqEntry {
    /// Address fetch continues at once this target is consumed.
    pub const fn next_pc(&self) -> u64 {
        if self.taken { self.target } else { self.end_pc }
    }
}

/// Producer-side cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FtqEnqState {
    /// Start PC for the next target.
    pub pc: u64,
    /// Stream the next target is cut from.
    pub stream_id: FetchStreamId,
    /// Id the next target will receive.
    pub next_target_id: FetchTargetId,
}

/// Consumer-side cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FtqSupplyState {
    /// Fetch currently holds a target.
    pub valid: bool,
    /// Id of the held target.
    pub target_id: FetchTargetId,
}

/// Fetch Target Queue.
#[derive(Debug, Clone)]
pub struct FetchTargetQueue {
    queue: BTreeMap<FetchTargetId, FtqEntry>,
    size: usize,
    enq: FtqEnqState,
    supply: FtqSupplyState,
    demand_target_id: FetchTargetId,
}

impl FetchTargetQueue {
    /// Creates an empty queue holding up to `size` targets.
    pub const fn new(size: usize) -> Self {
        Self {
            queue: BTreeMap::new(),
            size,
            enq: FtqEnqState {
                pc: RESET_PC,
                stream_id: 1,
                next_target_id: 0,
            },
            supply: FtqSupplyState {
                valid: false,
                target_id: 0,
            },
            demand_target_id: 0,
        }
    }

    /// Drops every target and restarts both cursors at `new_target_id`.
    ///
    /// # Arguments
    ///
    /// * `new_target_id` - Id of the first target after the redirect.
    /// * `new_stream_id` - Stream the next target will be cut from.
    /// * `new_pc` - Redirect address.
    pub fn squash(&mut self, new_target_id: FetchTargetId, new_stream_id: FetchStreamId, new_pc: u64) {
        debug!(
            target: "frontend::ftq",
            new_target_id, new_stream_id, pc = format_args!("{new_pc:#x}"), "squash"
        );
        self.queue.clear();
        self.enq = FtqEnqState {
            pc: new_pc,
            stream_id: new_stream_id,
            next_target_id: new_target_id,
        };
        self.supply.valid = false;
        self.demand_target_id = new_target_id;
    }

    /// Fetch holds exactly the target it demands.
    pub const fn fetch_target_available(&self) -> bool {
        self.supply.valid && self.supply.target_id == self.demand_target_id
    }

    /// Target fetch is consuming, if any.
    pub fn supplying_target(&self) -> Option<&FtqEntry> {
        if self.fetch_target_available() {
            self.queue.get(&self.supply.target_id)
        } else {
            None
        }
    }

    /// Id of the target fetch is consuming.
    pub const fn supplying_target_id(&self) -> FetchTargetId {
        self.supply.target_id
    }

    /// Id fetch demands next.
    pub const fn demand_target_id(&self) -> FetchTargetId {
        self.demand_target_id
    }

    /// Retires the target fetch was consuming and demands the next one.
    pub fn finish_current_fetch_target(&mut self) {
        self.demand_target_id += 1;
        if self.queue.remove(&self.supply.target_id).is_some() {
            trace!(target: "frontend::ftq", id = self.supply.target_id, "target consumed");
        }
        self.supply.valid = false;
    }

    /// Tries to hand fetch the target it demands.
    ///
    /// A demanded target whose range already lies behind `demand_pc` is
    /// skipped and the one after it is supplied instead.
    ///
    /// # Returns
    ///
    /// `true` when fetch now holds its demanded target.
    pub fn try_supply_fetch_with_target(&mut self, demand_pc: u64) -> bool {
        if self.fetch_target_available() {
            return true;
        }
        let Some(entry) = self.queue.get(&self.demand_target_id).copied() else {
            trace!(target: "frontend::ftq", demand = self.demand_target_id, "demanded target not ready");
            return false;
        };
        if demand_pc >= entry.end_pc {
            trace!(
                target: "frontend::ftq",
                demand = self.demand_target_id,
                pc = format_args!("{demand_pc:#x}"),
                "skipping exhausted target"
            );
            let _ = self.queue.remove(&self.demand_target_id);
            self.demand_target_id += 1;
            if !self.queue.contains_key(&self.demand_target_id) {
                return false;
            }
        }
        self.supply = FtqSupplyState {
            valid: true,
            target_id: self.demand_target_id,
        };
        true
    }

    /// Producer cursor.
    pub const fn enq_state(&self) -> &FtqEnqState {
        &self.enq
    }

    /// Mutable producer cursor, advanced by the BPU after each enqueue.
    pub const fn enq_state_mut(&mut self) -> &mut FtqEnqState {
        &mut self.enq
    }

    /// Appends `entry` under the next target id.
    pub fn enqueue(&mut self, entry: FtqEntry) {
        let id = self.enq.next_target_id;
        self.enq.next_target_id += 1;
        trace!(
            target: "frontend::ftq",
            id,
            start = format_args!("{:#x}", entry.start_pc),
            end = format_args!("{:#x}", entry.end_pc),
            taken = entry.taken,
            "enqueue"
        );
        let _ = self.queue.insert(id, entry);
    }

    /// Abandons the held target and restarts production at `pc`.
    pub const fn reset_pc(&mut self, pc: u64) {
        self.supply.valid = false;
        self.enq.pc = pc;
    }

    /// Target with id `id`, if still queued.
    pub fn get(&self, id: FetchTargetId) -> Option<&FtqEntry> {
        self.queue.get(&id)
    }

    /// Targets in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&FetchTargetId, &FtqEntry)> {
        self.queue.iter()
    }

    /// No room for another target.
    pub fn full(&self) -> bool {
        self.queue.len() >= self.size
    }

    /// Nothing queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Number of queued targets.
    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
