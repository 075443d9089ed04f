//! Return Address Stack (RAS).
//!
//! The RAS is a specialized predictor for function return addresses. It operates
//! as a hardware stack that pushes addresses on function calls and pops them
//! on returns to predict the execution flow. The stack is updated
//! speculatively when a stream is created; each stream keeps a checkpoint of
//! the stack taken before its own push or pop, so a squash can restore it.

use tracing::trace;

use crate::bpu::branch::FullBtbPrediction;
use crate::bpu::stream::FetchStream;
use crate::config::RasConfig;

/// The RAS answers in stage 1.
pub const DELAY: usize = 1;

/// Stack checkpoint stored with every stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RasMeta {
    /// Stack storage at prediction time.
    pub stack: Vec<u64>,
    /// Stack pointer at prediction time.
    pub sp: usize,
    /// Top of stack at prediction time (0 when empty).
    pub top: u64,
}

/// Commit-time counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RasStats {
    /// Committed streams ending in a call.
    pub committed_calls: u64,
    /// Committed streams ending in a return.
    pub committed_returns: u64,
}

/// Return Address Stack structure.
#[derive(Debug)]
pub struct Ras {
    /// The stack storage.
    stack: Vec<u64>,
    /// Current stack pointer index.
    ptr: usize,
    /// Maximum capacity of the stack.
    capacity: usize,
    /// Commit counters.
    pub stats: RasStats,
}

/// Return address recorded in a checkpoint.
pub const fn top_addr_from_meta(meta: &RasMeta) -> u64 {
    meta.top
}

impl Ras {
    /// Creates a new Return Address Stack with the configured capacity.
    pub fn new(config: &RasConfig) -> Self {
        Self {
            stack: vec![0; config.size],
            ptr: 0,
            capacity: config.size,
            stats: RasStats::default(),
        }
    }

    /// Pushes a return address onto the stack.
    ///
    /// If the stack is full, the last entry is overwritten to maintain the
    /// most recent call history.
    ///
    /// # Arguments
    ///
    /// * `addr` - The return address to push.
    pub fn push(&mut self, addr: u64) {
        if self.capacity == 0 {
            return;
        }
        if self.ptr < self.capacity {
            self.stack[self.ptr] = addr;
            self.ptr += 1;
        } else {
            self.stack[self.capacity - 1] = addr;
        }
    }

    /// Pops a return address from the stack.
    ///
    /// # Returns
    ///
    /// The popped return address, or `None` if the stack is empty.
    pub fn pop(&mut self) -> Option<u64> {
        if self.ptr == 0 {
            None
        } else {
            self.ptr -= 1;
            Some(self.stack[self.ptr])
        }
    }

    /// Peeks at the top of the stack without removing the entry.
    pub fn top(&self) -> Option<u64> {
        if self.ptr == 0 {
            None
        } else {
            Some(self.stack[self.ptr - 1])
        }
    }

    /// Current depth.
    pub const fn depth(&self) -> usize {
        self.ptr
    }

    /// Publishes the top of stack as the return target for stages `DELAY..`.
    pub fn put_pc_history(&self, stage_preds: &mut [FullBtbPrediction]) {
        let top = self.top().unwrap_or(0);
        for pred in stage_preds.iter_mut().skip(DELAY) {
            pred.return_target = top;
        }
    }

    /// Checkpoint of the whole stack.
    pub fn meta(&self) -> RasMeta {
        RasMeta {
            stack: self.stack.clone(),
            sp: self.ptr,
            top: self.top().unwrap_or(0),
        }
    }

    /// Pushes or pops for the branch the final prediction redirects on.
    pub fn spec_update_hist(&mut self, final_pred: &FullBtbPrediction) {
        let Some(taken) = final_pred.taken_entry().copied() else {
            return;
        };
        if taken.info.is_call {
            self.push(taken.info.end());
            trace!(target: "frontend::bpu", ret = format_args!("{:#x}", taken.info.end()), "ras push");
        } else if taken.info.is_return {
            let popped = self.pop();
            trace!(target: "frontend::bpu", ?popped, "ras pop");
        }
    }

    /// Restores the checkpoint, then replays the stream's resolved call or return.
    pub fn recover_hist(&mut self, stream: &FetchStream, meta: &RasMeta) {
        self.stack.clone_from(&meta.stack);
        self.ptr = meta.sp.min(self.capacity);
        if !stream.exe_taken {
            return;
        }
        let exe = stream.exe_branch_info;
        if exe.is_call {
            self.push(exe.end());
        } else if exe.is_return {
            let _ = self.pop();
        }
    }

    /// Counts the committed call or return.
    pub const fn update(&mut self, stream: &FetchStream) {
        if !stream.exe_taken {
            return;
        }
        if stream.exe_branch_info.is_call {
            self.stats.committed_calls += 1;
        } else if stream.exe_branch_info.is_return {
            self.stats.committed_returns += 1;
        }
    }
}
