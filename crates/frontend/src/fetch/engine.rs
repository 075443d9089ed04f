//! Fetch engine.
//!
//! Each cycle the engine reads the signals of the later stages, walks the
//! fetch target the BPU is supplying, turns buffered bytes into instructions
//! and hands them to decode. When the fetch buffer does not cover the fetch
//! PC it requests a new window, which always spans two cache lines and is
//! therefore issued as two requests:
//! 1. **Translation:** Both halves go to the translator; completions come
//!    back through `finish_translation` in any order.
//! 2. **Cache Access:** Translated halves are offered to the cache port. A
//!    rejected half waits in the retry queue until `recv_req_retry`.
//! 3. **Merge:** `process_cache_completion` stores each half and, once both
//!    are present, assembles the fetch buffer.
//!
//! Completions are matched against the requests the thread still owns, so
//! anything issued before a squash simply stops matching and is counted as
//! stale.

use std::collections::VecDeque;

use tracing::{debug, error, trace, warn};

use super::buffer::FetchBuffer;
use super::inst::{DynInst, StaticInst};
use super::ports::{DecodeResult, Decoder, ICachePort, Translator};
use super::request::{MemRequest, Packet, SplitHalf};
use super::signals::{CommitSignals, DecodeSignals, FetchOutput};
use super::status::{FetchStageStatus, StallReason, ThreadStatus};
use crate::bpu::{DecoupledBpu, RESET_PC};
use crate::common::{
    FetchFault, FetchStreamId, FetchTargetId, FrontendError, InstSeqNum, PhysAddr, ThreadId, VirtAddr,
};
use crate::config::{FetchConfig, FrontendConfig, SmtFetchPolicy};
use crate::stats::FetchStats;

/// Bytes that must be buffered at the fetch PC before decoding starts.
const MIN_DECODE_BYTES: u64 = 4;

/// State of one hardware thread inside fetch.
#[derive(Debug, Clone)]
pub struct FetchThread {
    status: ThreadStatus,
    pc: u64,
    micro_pc: u16,
    macroop: Option<StaticInst>,
    buffer: FetchBuffer,
    mem_reqs: [Option<MemRequest>; 2],
    received: [Option<Vec<u8>>; 2],
    fetch_queue: VecDeque<DynInst>,
    stall_decode: bool,
    stall_drain: bool,
    delayed_commit: bool,
    pending_fault: Option<(FetchFault, u64)>,
    stall_reason: StallReason,
}

impl FetchThread {
    fn new(buffer_size: usize, pc: u64) -> Self {
        Self {
            status: ThreadStatus::Running,
            pc,
            micro_pc: 0,
            macroop: None,
            buffer: FetchBuffer::new(buffer_size),
            mem_reqs: [None, None],
            received: [None, None],
            fetch_queue: VecDeque::new(),
            stall_decode: false,
            stall_drain: false,
            delayed_commit: false,
            pending_fault: None,
            stall_reason: StallReason::NoStall,
        }
    }

    /// Current status.
    pub const fn status(&self) -> ThreadStatus {
        self.status
    }

    /// Address of the next instruction to fetch.
    pub const fn pc(&self) -> u64 {
        self.pc
    }

    /// Micro-op index inside the current macro-op.
    pub const fn micro_pc(&self) -> u16 {
        self.micro_pc
    }

    /// The fetch buffer.
    pub const fn buffer(&self) -> &FetchBuffer {
        &self.buffer
    }

    /// Request still owned for `half`.
    pub const fn outstanding(&self, half: SplitHalf) -> Option<&MemRequest> {
        self.mem_reqs[half.index()].as_ref()
    }

    /// Instructions waiting for decode.
    pub fn fetch_queue(&self) -> impl Iterator<Item = &DynInst> {
        self.fetch_queue.iter()
    }

    /// Number of instructions waiting for decode.
    pub fn fetch_queue_len(&self) -> usize {
        self.fetch_queue.len()
    }

    /// Reason reported for this thread's last unused slots.
    pub const fn stall_reason(&self) -> StallReason {
        self.stall_reason
    }

    /// A fault no-op is waiting for room in the fetch queue.
    pub const fn has_pending_fault(&self) -> bool {
        self.pending_fault.is_some()
    }
}

/// The fetch stage with its decoupled predictor and collaborators.
#[derive(Debug)]
pub struct Fetch<D, T, P> {
    config: FetchConfig,
    bpu: DecoupledBpu,
    decoder: D,
    translator: T,
    icache: P,

    threads: Vec<FetchThread>,
    retry_pkts: VecDeque<Packet>,
    cache_blocked: bool,
    interrupt_pending: bool,

    next_req_id: u64,
    next_seq_num: InstSeqNum,
    priority: usize,
    stage_status: FetchStageStatus,

    /// Fetch counters.
    pub stats: FetchStats,
}

impl<D: Decoder, T: Translator, P: ICachePort> Fetch<D, T, P> {
    /// Builds the stage and its BPU.
    ///
    /// Every thread starts `Running` at `RESET_PC`.
    ///
    /// # Errors
    ///
    /// Returns `FrontendError::InvalidConfig` when `config` fails validation.
    pub fn new(config: &FrontendConfig, decoder: D, translator: T, icache: P) -> Result<Self, FrontendError> {
        config.validate()?;
        let fetch = &config.fetch;
        Ok(Self {
            config: fetch.clone(),
            bpu: DecoupledBpu::new(&config.bpu)?,
            decoder,
            translator,
            icache,
            threads: (0..fetch.num_threads)
                .map(|_| FetchThread::new(fetch.fetch_buffer_size, RESET_PC))
                .collect(),
            retry_pkts: VecDeque::new(),
            cache_blocked: false,
            interrupt_pending: false,
            next_req_id: 0,
            next_seq_num: 1,
            priority: 0,
            stage_status: FetchStageStatus::Inactive,
            stats: FetchStats::default(),
        })
    }

    /// Points every thread and the predictor at `pc`, halfword aligned.
    pub fn reset_pc(&mut self, pc: u64) {
        let pc = pc & !1;
        for th in &mut self.threads {
            th.pc = pc;
            th.buffer.invalidate();
            th.status = ThreadStatus::Running;
        }
        self.bpu.reset_pc(pc);
    }

    /// Advances fetch and the BPU by one cycle.
    ///
    /// `decode` and `commit` hold one entry per thread; missing entries mean
    /// "no signal".
    ///
    /// # Errors
    ///
    /// Propagates every fatal `FrontendError` raised by the BPU.
    pub fn tick(&mut self, decode: &[DecodeSignals], commit: &[CommitSignals]) -> Result<FetchOutput, FrontendError> {
        self.stats.cycles += 1;

        for tid in 0..self.threads.len() {
            let _ = self.check_signals_and_update(tid, decode.get(tid), commit.get(tid))?;
        }
        self.deliver_pending_faults();

        match self.select_fetch_thread() {
            Some(tid) => self.fetch(tid)?,
            None if self.threads.len() == 1 => self.profile_stall(0),
            None => self.stats.idle_cycles += 1,
        }

        let output = self.send_to_decode();
        self.update_stage_status();

        self.bpu.tick()?;
        if let Some(th) = self.threads.first() {
            let _ = self.bpu.try_supply_fetch_with_target(th.pc);
        }
        Ok(output)
    }

    /// Applies this cycle's decode and commit signals to thread `tid`.
    ///
    /// A commit squash is handled first and ends processing for the cycle.
    /// A decode squash is ignored while the thread is already squashing.
    ///
    /// # Returns
    ///
    /// `true` when the thread's status changed.
    ///
    /// # Errors
    ///
    /// Propagates `FrontendError::HistoryMismatch` from BPU recovery.
    pub fn check_signals_and_update(
        &mut self,
        tid: ThreadId,
        decode: Option<&DecodeSignals>,
        commit: Option<&CommitSignals>,
    ) -> Result<bool, FrontendError> {
        if tid >= self.threads.len() {
            return Ok(false);
        }
        if let Some(d) = decode {
            if d.block {
                self.threads[tid].stall_decode = true;
            }
            if d.unblock {
                self.threads[tid].stall_decode = false;
            }
        }

        if let Some(c) = commit {
            if c.interrupt_pending {
                self.interrupt_pending = true;
            }
            if c.clear_interrupt {
                self.interrupt_pending = false;
            }
            if c.squash {
                let redirect = self.commit_squash_bpu(tid, c)?;
                self.squash(tid, redirect, c.done_seq_num);
                return Ok(true);
            }
            if tid == 0
                && let Some(done) = c.done_fsq_id
            {
                self.bpu.update(done);
            }
        }

        if let Some(d) = decode
            && d.squash
            && self.threads[tid].status != ThreadStatus::Squashing
        {
            let redirect = if tid == 0 {
                self.bpu.control_squash(
                    d.squashed_target_id,
                    d.squashed_stream_id,
                    &d.branch,
                    d.branch_taken,
                    false,
                )?
            } else if d.branch_taken {
                d.branch.target
            } else {
                d.branch.end()
            };
            self.squash_from_decode(tid, redirect, d.done_seq_num);
            return Ok(true);
        }

        let th = &mut self.threads[tid];
        if th.stall_drain
            && !matches!(
                th.status,
                ThreadStatus::IcacheWaitResponse
                    | ThreadStatus::IcacheWaitRetry
                    | ThreadStatus::ItlbWait
                    | ThreadStatus::QuiescePending
            )
        {
            debug!(target: "frontend::fetch", tid, "blocked for drain");
            th.status = ThreadStatus::Blocked;
            return Ok(true);
        }
        if matches!(th.status, ThreadStatus::Blocked | ThreadStatus::Squashing) {
            th.status = ThreadStatus::Running;
            return Ok(true);
        }
        Ok(false)
    }

    /// Sends a commit squash to the matching BPU recovery routine.
    fn commit_squash_bpu(&mut self, tid: ThreadId, c: &CommitSignals) -> Result<u64, FrontendError> {
        if tid != 0 {
            return Ok(c.redirect_pc);
        }
        if c.mispredict {
            self.bpu
                .control_squash(c.squashed_target_id, c.squashed_stream_id, &c.branch, c.branch_taken, true)
        } else if c.is_trap_squash {
            self.bpu
                .trap_squash(c.squashed_target_id, c.squashed_stream_id, c.committed_pc, c.redirect_pc)
        } else if c.squashed_stream_id != 0 {
            self.bpu.non_control_squash(
                c.squashed_target_id,
                c.squashed_stream_id,
                c.squash_inst_pc,
                c.redirect_pc,
            )
        } else {
            warn!(target: "frontend::fetch", tid, "commit squash without a stream id, BPU not redirected");
            Ok(c.redirect_pc)
        }
    }

    /// Commit-stage squash of thread `tid` to `new_pc`.
    ///
    /// Instructions younger than `done_seq_num` leave the fetch queue.
    pub fn squash(&mut self, tid: ThreadId, new_pc: u64, done_seq_num: InstSeqNum) {
        debug!(target: "frontend::fetch", tid, pc = format_args!("{new_pc:#x}"), "squash from commit");
        self.do_squash(tid, new_pc, done_seq_num);
    }

    /// Decode-stage squash of thread `tid` to `new_pc`.
    pub fn squash_from_decode(&mut self, tid: ThreadId, new_pc: u64, done_seq_num: InstSeqNum) {
        debug!(target: "frontend::fetch", tid, pc = format_args!("{new_pc:#x}"), "squash from decode");
        self.do_squash(tid, new_pc, done_seq_num);
    }

    fn do_squash(&mut self, tid: ThreadId, new_pc: u64, done_seq_num: InstSeqNum) {
        if tid >= self.threads.len() {
            return;
        }
        self.decoder.reset();
        self.retry_pkts.retain(|p| p.req.thread != tid);

        let th = &mut self.threads[tid];
        let dropped_reqs = th.mem_reqs.iter().flatten().count();
        th.pc = new_pc & !1;
        th.micro_pc = 0;
        th.macroop = None;
        th.mem_reqs = [None, None];
        th.received = [None, None];
        th.pending_fault = None;
        th.delayed_commit = false;
        th.fetch_queue.retain(|i| i.seq_num <= done_seq_num);
        th.buffer.invalidate();
        th.status = ThreadStatus::Squashing;
        th.stall_reason = StallReason::BpStall;
        trace!(target: "frontend::fetch", tid, dropped_reqs, "outstanding requests dropped");
    }

    fn select_fetch_thread(&mut self) -> Option<ThreadId> {
        match self.config.smt_fetch_policy {
            SmtFetchPolicy::SingleThread => self
                .threads
                .first()
                .is_some_and(|t| t.status.can_fetch())
                .then_some(0),
            SmtFetchPolicy::RoundRobin => {
                let n = self.threads.len();
                let tid = (0..n)
                    .map(|i| (self.priority + i) % n)
                    .find(|&t| self.threads[t].status.can_fetch())?;
                self.priority = (tid + 1) % n;
                Some(tid)
            }
        }
    }

    /// One fetch attempt for thread `tid`.
    fn fetch(&mut self, tid: ThreadId) -> Result<(), FrontendError> {
        match self.threads[tid].status {
            ThreadStatus::IcacheAccessComplete => {
                trace!(target: "frontend::fetch", tid, "fetch window complete");
                self.threads[tid].status = ThreadStatus::Running;
            }
            ThreadStatus::Running => {}
            _ => {
                self.profile_stall(tid);
                return Ok(());
            }
        }

        if tid == 0 && !self.bpu.fetch_target_available() {
            self.stats.ftq_empty_stalls += 1;
            self.threads[tid].stall_reason = StallReason::FtqBubble;
            trace!(target: "frontend::fetch", tid, "no fetch target");
            return Ok(());
        }

        if self.interrupt_pending && !self.threads[tid].delayed_commit {
            self.stats.misc_stall_cycles += 1;
            self.threads[tid].stall_reason = StallReason::IntStall;
            trace!(target: "frontend::fetch", tid, "interrupt pending");
            return Ok(());
        }

        let th = &self.threads[tid];
        if th.macroop.is_none() && !th.buffer.contains(th.pc, MIN_DECODE_BYTES) {
            let pc = th.pc;
            if !self.fetch_cache_line(tid, VirtAddr::new(pc)) {
                self.threads[tid].stall_reason = StallReason::IcacheStall;
            }
            return Ok(());
        }

        self.decode_from_buffer(tid)
    }

    /// Bytes of a window at `vaddr` that come from its own line.
    fn first_half_size(&self, vaddr: VirtAddr) -> u64 {
        let line = self.config.cache_line_size as u64;
        line - vaddr.block_offset(line)
    }

    /// Requests the fetch window starting at `vaddr` for thread `tid`.
    ///
    /// The window is up to `fetch_buffer_size` bytes and always crosses one
    /// line boundary: the first request covers the tail of the line holding
    /// `vaddr`, the second the head of the next line. The second request
    /// never leaves that line, so a window starting early in its line is
    /// shorter than the buffer.
    ///
    /// # Returns
    ///
    /// `false` when the request could not be started this cycle.
    pub fn fetch_cache_line(&mut self, tid: ThreadId, vaddr: VirtAddr) -> bool {
        if tid >= self.threads.len() {
            return false;
        }
        if self.cache_blocked {
            trace!(target: "frontend::fetch", tid, "cache blocked, window not requested");
            return false;
        }
        if self.interrupt_pending && !self.threads[tid].delayed_commit {
            return false;
        }

        let line = self.config.cache_line_size as u64;
        let first_size = self.first_half_size(vaddr);
        let second_size = (self.config.fetch_buffer_size as u64 - first_size).min(line);
        let first = MemRequest {
            id: self.next_req_id,
            thread: tid,
            vaddr,
            size: first_size as usize,
            pc: vaddr.val(),
            paddr: None,
            seq: SplitHalf::First,
        };
        let second = MemRequest {
            id: self.next_req_id + 1,
            vaddr: vaddr.align_down(line).offset(line),
            size: second_size as usize,
            seq: SplitHalf::Second,
            ..first.clone()
        };
        self.next_req_id += 2;
        debug!(
            target: "frontend::fetch",
            tid,
            first = format_args!("{:#x}+{first_size}", first.vaddr.val()),
            second = format_args!("{:#x}+{second_size}", second.vaddr.val()),
            "fetch window"
        );

        let th = &mut self.threads[tid];
        th.buffer.invalidate();
        th.received = [None, None];
        th.mem_reqs = [Some(first.clone()), Some(second.clone())];
        th.status = ThreadStatus::ItlbWait;
        th.stall_reason = StallReason::ItlbStall;
        self.stats.cache_lines += 1;

        self.translator.translate(&first);
        self.translator.translate(&second);
        true
    }

    /// Completes the translation of `req`.
    ///
    /// A completion for a request the thread no longer owns, or arriving in
    /// a state that does not expect it, is stale and only counted. A fault
    /// on either half turns the whole window into a fault-carrying no-op.
    /// If the fetch queue is full the no-op is queued on a later cycle.
    pub fn finish_translation(&mut self, outcome: Result<PhysAddr, FetchFault>, mut req: MemRequest) {
        let tid = req.thread;
        let slot = req.seq.index();
        let Some(th) = self.threads.get_mut(tid) else {
            warn!(target: "frontend::fetch", tid, "translation for unknown thread");
            return;
        };
        let owned = th.mem_reqs[slot].as_ref().is_some_and(|r| r.same_access(&req));
        if !owned || !th.status.expects_translation() {
            self.stats.tlb_squashes += 1;
            debug!(target: "frontend::fetch", tid, id = req.id, status = ?th.status, "stale translation ignored");
            return;
        }

        match outcome {
            Err(fault) => {
                self.retry_pkts.retain(|p| p.req.thread != tid);
                th.mem_reqs = [None, None];
                th.received = [None, None];
                if th.fetch_queue.len() >= self.config.fetch_queue_size {
                    debug!(target: "frontend::fetch", tid, %fault, "fetch queue full, fault deferred");
                    th.pending_fault = Some((fault, req.pc));
                    th.status = ThreadStatus::TrapPending;
                    th.stall_reason = StallReason::TrapStall;
                    return;
                }
                self.enqueue_fault_nop(tid, fault, req.pc);
            }
            Ok(paddr) => {
                if !self.icache.is_mem_addr(paddr) {
                    warn!(
                        target: "frontend::fetch",
                        tid,
                        paddr = format_args!("{:#x}", paddr.val()),
                        "fetch address outside memory"
                    );
                    self.retry_pkts.retain(|p| p.req.thread != tid);
                    th.mem_reqs = [None, None];
                    th.received = [None, None];
                    th.status = ThreadStatus::NoGoodAddr;
                    th.stall_reason = StallReason::OtherFetchStall;
                    return;
                }

                req.paddr = Some(paddr);
                th.mem_reqs[slot] = Some(req.clone());
                let pkt = Packet::request(req);
                if self.cache_blocked {
                    self.retry_pkts.push_back(pkt);
                    th.status = ThreadStatus::IcacheWaitRetry;
                } else if self.icache.send_timing_req(&pkt) {
                    if th.status == ThreadStatus::ItlbWait {
                        th.status = ThreadStatus::IcacheWaitResponse;
                    }
                } else {
                    trace!(target: "frontend::fetch", tid, id = pkt.req.id, "cache rejected request");
                    self.cache_blocked = true;
                    self.retry_pkts.push_back(pkt);
                    th.status = ThreadStatus::IcacheWaitRetry;
                }
            }
        }
    }

    fn enqueue_fault_nop(&mut self, tid: ThreadId, fault: FetchFault, pc: u64) {
        let (fsq_id, ftq_id) = self.supplying_ids(tid);
        let seq_num = self.next_seq_num;
        self.next_seq_num += 1;
        debug!(target: "frontend::fetch", tid, pc = format_args!("{pc:#x}"), %fault, "fault no-op");

        let th = &mut self.threads[tid];
        th.fetch_queue.push_back(DynInst {
            seq_num,
            thread: tid,
            pc,
            micro_pc: 0,
            static_inst: StaticInst::nop(),
            pred_next_pc: pc,
            pred_taken: false,
            fault: Some(fault),
            fsq_id,
            ftq_id,
        });
        th.buffer.invalidate();
        th.status = ThreadStatus::TrapPending;
        th.stall_reason = StallReason::TrapStall;
        self.stats.fault_insts += 1;
    }

    fn deliver_pending_faults(&mut self) {
        for tid in 0..self.threads.len() {
            let th = &mut self.threads[tid];
            if th.fetch_queue.len() >= self.config.fetch_queue_size {
                continue;
            }
            if let Some((fault, pc)) = th.pending_fault.take() {
                self.enqueue_fault_nop(tid, fault, pc);
            }
        }
    }

    fn supplying_ids(&self, tid: ThreadId) -> (FetchStreamId, FetchTargetId) {
        if tid == 0 {
            (
                self.bpu.supplying_stream_id().unwrap_or(0),
                self.bpu.supplying_target_id(),
            )
        } else {
            (0, 0)
        }
    }

    /// Accepts one cache response.
    ///
    /// # Errors
    ///
    /// Returns `FrontendError::FtqStartMismatch` when the completed window
    /// does not start inside the target fetch is consuming.
    pub fn process_cache_completion(&mut self, pkt: Packet) -> Result<(), FrontendError> {
        let tid = pkt.req.thread;
        let slot = pkt.req.seq.index();
        let split = self.first_half_size(VirtAddr::new(pkt.req.pc)) as usize;
        let Some(th) = self.threads.get_mut(tid) else {
            warn!(target: "frontend::fetch", tid, "cache response for unknown thread");
            return Ok(());
        };
        let owned = th.mem_reqs[slot].as_ref() == Some(&pkt.req);
        if !owned || !th.status.expects_response() {
            self.stats.icache_squashes += 1;
            debug!(target: "frontend::fetch", tid, id = pkt.req.id, status = ?th.status, "stale cache response ignored");
            return Ok(());
        }

        th.mem_reqs[slot] = None;
        let window_pc = pkt.req.pc;
        let half = pkt.req.seq;
        th.received[slot] = Some(pkt.data);
        let [Some(first), Some(second)] = &th.received else {
            trace!(target: "frontend::fetch", tid, ?half, "waiting for the other half");
            return Ok(());
        };
        th.buffer.merge_halves(window_pc, split, first, second);
        th.received = [None, None];
        th.status = ThreadStatus::IcacheAccessComplete;
        debug!(target: "frontend::fetch", tid, start = format_args!("{window_pc:#x}"), "fetch buffer filled");

        if tid == 0
            && let Some(entry) = self.bpu.supplying_fetch_target()
            && (window_pc < entry.start_pc || window_pc >= entry.end_pc)
        {
            error!(
                target: "frontend::fetch",
                start = format_args!("{:#x}", entry.start_pc),
                buffer = format_args!("{window_pc:#x}"),
                "fetch buffer outside supplying target"
            );
            return Err(FrontendError::FtqStartMismatch {
                ftq_start: entry.start_pc,
                buffer_start: window_pc,
            });
        }
        Ok(())
    }

    /// The cache port has room again; resend queued requests in order.
    pub fn recv_req_retry(&mut self) {
        self.cache_blocked = false;
        while let Some(pkt) = self.retry_pkts.pop_front() {
            if !self.icache.send_timing_req(&pkt) {
                self.cache_blocked = true;
                self.retry_pkts.push_front(pkt);
                break;
            }
            let tid = pkt.req.thread;
            let still_queued = self.retry_pkts.iter().any(|p| p.req.thread == tid);
            if let Some(th) = self.threads.get_mut(tid)
                && th.status == ThreadStatus::IcacheWaitRetry
                && !still_queued
            {
                th.status = ThreadStatus::IcacheWaitResponse;
            }
        }
    }

    /// Decodes instructions out of the fetch buffer until the width, the
    /// queue, the buffer or the fetch target runs out.
    fn decode_from_buffer(&mut self, tid: ThreadId) -> Result<(), FrontendError> {
        let (fsq_id, ftq_id) = self.supplying_ids(tid);
        let width = self.config.fetch_width;
        let queue_size = self.config.fetch_queue_size;
        let mut pc = self.threads[tid].pc;
        let mut num_insts = 0;
        let mut target_done = false;
        let mut quiesce = false;

        while num_insts < width && self.threads[tid].fetch_queue.len() < queue_size && !target_done && !quiesce {
            let th = &mut self.threads[tid];
            let static_inst = if let Some(macroop) = th.macroop {
                self.decoder.fetch_microop(&macroop, th.micro_pc)
            } else {
                if !th.buffer.contains(pc, MIN_DECODE_BYTES) {
                    break;
                }
                match self.decoder.decode(pc, th.buffer.bytes_from(pc)) {
                    DecodeResult::NeedMoreBytes => {
                        trace!(target: "frontend::fetch", tid, pc = format_args!("{pc:#x}"), "decoder needs more bytes");
                        th.buffer.invalidate();
                        break;
                    }
                    DecodeResult::Inst(inst) if inst.is_macroop => {
                        th.macroop = Some(inst);
                        th.micro_pc = 0;
                        self.decoder.fetch_microop(&inst, 0)
                    }
                    DecodeResult::Inst(inst) => inst,
                }
            };

            let micro_pc = th.micro_pc;
            let macroop = th.macroop;
            th.delayed_commit = static_inst.is_delayed_commit;
            let (pred_taken, next_pc) = if macroop.is_none() || static_inst.is_last_microop {
                let size = u64::from(macroop.map_or(static_inst.size, |m| m.size));
                th.macroop = None;
                th.micro_pc = 0;
                if tid == 0 {
                    let (taken, run_out, next) = self.bpu.decoupled_predict(pc, size)?;
                    target_done = taken || run_out;
                    (taken, next)
                } else {
                    (false, pc + size)
                }
            } else {
                th.micro_pc += 1;
                (false, pc)
            };

            if static_inst.is_quiesce {
                debug!(target: "frontend::fetch", tid, pc = format_args!("{pc:#x}"), "quiesce");
                th.status = ThreadStatus::QuiescePending;
                quiesce = true;
            }
            let seq_num = self.next_seq_num;
            self.next_seq_num += 1;
            trace!(
                target: "frontend::fetch",
                tid,
                seq_num,
                pc = format_args!("{pc:#x}"),
                micro_pc,
                next = format_args!("{next_pc:#x}"),
                pred_taken,
                "fetched"
            );
            th.fetch_queue.push_back(DynInst {
                seq_num,
                thread: tid,
                pc,
                micro_pc,
                static_inst,
                pred_next_pc: next_pc,
                pred_taken,
                fault: None,
                fsq_id,
                ftq_id,
            });

            if static_inst.is_control {
                self.stats.branches += 1;
            }
            if pred_taken {
                self.stats.predicted_branches += 1;
            }
            pc = next_pc;
            num_insts += 1;
        }

        let th = &mut self.threads[tid];
        th.pc = pc;
        if target_done {
            th.buffer.invalidate();
        }
        th.stall_reason = if num_insts == 0 {
            if th.fetch_queue.len() >= queue_size {
                StallReason::OtherFetchStall
            } else {
                StallReason::IcacheStall
            }
        } else if num_insts < width && (target_done || quiesce) {
            StallReason::FetchFragStall
        } else {
            StallReason::NoStall
        };
        if num_insts > 0 {
            self.stats.running_cycles += 1;
        }
        Ok(())
    }

    /// Charges the cycle to the reason thread `tid` cannot fetch.
    fn profile_stall(&mut self, tid: ThreadId) {
        let stats = &mut self.stats;
        let th = &mut self.threads[tid];
        let (counter, reason) = match th.status {
            ThreadStatus::Squashing => (&mut stats.squash_cycles, StallReason::BpStall),
            ThreadStatus::ItlbWait => (&mut stats.tlb_cycles, StallReason::ItlbStall),
            ThreadStatus::IcacheWaitResponse => (&mut stats.icache_stall_cycles, StallReason::IcacheStall),
            ThreadStatus::IcacheWaitRetry => (&mut stats.icache_wait_retry_stall_cycles, StallReason::IcacheStall),
            ThreadStatus::TrapPending => (&mut stats.pending_trap_stall_cycles, StallReason::TrapStall),
            ThreadStatus::QuiescePending => (&mut stats.pending_quiesce_stall_cycles, StallReason::OtherFetchStall),
            ThreadStatus::NoGoodAddr => (&mut stats.no_good_addr_cycles, StallReason::OtherFetchStall),
            ThreadStatus::Blocked => (&mut stats.blocked_cycles, StallReason::OtherFetchStall),
            ThreadStatus::Idle => (&mut stats.idle_cycles, StallReason::OtherFetchStall),
            ThreadStatus::Running | ThreadStatus::IcacheAccessComplete => {
                (&mut stats.misc_stall_cycles, StallReason::OtherFetchStall)
            }
        };
        *counter += 1;
        th.stall_reason = reason;
        trace!(target: "frontend::fetch", tid, status = ?th.status, ?reason, "stall");
    }

    /// Moves up to `decode_width` instructions to decode.
    fn send_to_decode(&mut self) -> FetchOutput {
        let width = self.config.decode_width;
        let mut insts = Vec::with_capacity(width);
        let mut decode_stalled = true;
        for th in &mut self.threads {
            if th.stall_decode {
                continue;
            }
            decode_stalled = false;
            while insts.len() < width
                && let Some(inst) = th.fetch_queue.pop_front()
            {
                insts.push(inst);
            }
        }
        self.stats.insts += insts.len() as u64;

        let empty_reason = if decode_stalled {
            StallReason::DecodeStall
        } else {
            self.threads
                .iter()
                .map(|t| t.stall_reason)
                .find(|&r| r != StallReason::NoStall)
                .unwrap_or(StallReason::OtherFetchStall)
        };
        if !decode_stalled {
            self.stats.frontend_bubbles += (width - insts.len()) as u64;
        }
        let stall_reasons = (0..width)
            .map(|slot| if slot < insts.len() { StallReason::NoStall } else { empty_reason })
            .collect();
        FetchOutput { insts, stall_reasons }
    }

    fn update_stage_status(&mut self) {
        let active = self.threads.iter().any(|t| {
            matches!(
                t.status,
                ThreadStatus::Running | ThreadStatus::Squashing | ThreadStatus::IcacheAccessComplete
            ) || !t.fetch_queue.is_empty()
        });
        let status = if active { FetchStageStatus::Active } else { FetchStageStatus::Inactive };
        if status != self.stage_status {
            debug!(target: "frontend::fetch", ?status, "stage status");
            self.stage_status = status;
        }
    }

    /// Asks thread `tid` to stop fetching so the pipeline can drain.
    pub fn drain_stall(&mut self, tid: ThreadId) {
        if let Some(th) = self.threads.get_mut(tid) {
            th.stall_drain = true;
        }
    }

    /// Lifts every drain and decode stall.
    pub fn drain_resume(&mut self) {
        for th in &mut self.threads {
            th.stall_drain = false;
            th.stall_decode = false;
        }
    }

    /// No thread holds instructions, requests or pending faults.
    pub fn is_drained(&self) -> bool {
        self.retry_pkts.is_empty()
            && self.threads.iter().all(|t| {
                t.fetch_queue.is_empty()
                    && t.pending_fault.is_none()
                    && (t.status == ThreadStatus::Idle || (t.status == ThreadStatus::Blocked && t.stall_drain))
            })
    }

    /// Parks thread `tid` with no work. Its outstanding requests and
    /// partial window are dropped; queued instructions stay for decode.
    pub fn deactivate_thread(&mut self, tid: ThreadId) {
        if tid >= self.threads.len() {
            return;
        }
        self.retry_pkts.retain(|p| p.req.thread != tid);
        let th = &mut self.threads[tid];
        th.mem_reqs = [None, None];
        th.received = [None, None];
        th.macroop = None;
        th.micro_pc = 0;
        th.buffer.invalidate();
        th.status = ThreadStatus::Idle;
        debug!(target: "frontend::fetch", tid, "deactivated");
    }

    /// Lets an idle thread fetch again from where it stopped.
    pub fn activate_thread(&mut self, tid: ThreadId) {
        if let Some(th) = self.threads.get_mut(tid)
            && th.status == ThreadStatus::Idle
        {
            debug!(target: "frontend::fetch", tid, "activated");
            th.status = ThreadStatus::Running;
        }
    }

    /// Resumes a thread parked by a quiesce instruction.
    pub fn wake_from_quiesce(&mut self, tid: ThreadId) {
        if let Some(th) = self.threads.get_mut(tid)
            && th.status == ThreadStatus::QuiescePending
        {
            debug!(target: "frontend::fetch", tid, "woken from quiesce");
            th.status = ThreadStatus::Running;
        }
    }

    /// Sets or clears the pending-interrupt flag.
    pub const fn set_interrupt_pending(&mut self, pending: bool) {
        self.interrupt_pending = pending;
    }

    /// An interrupt is waiting to be taken.
    pub const fn interrupt_pending(&self) -> bool {
        self.interrupt_pending
    }

    /// Thread `tid`.
    pub fn thread(&self, tid: ThreadId) -> Option<&FetchThread> {
        self.threads.get(tid)
    }

    /// The decoupled BPU.
    pub const fn bpu(&self) -> &DecoupledBpu {
        &self.bpu
    }

    /// Mutable access to the decoupled BPU.
    pub const fn bpu_mut(&mut self) -> &mut DecoupledBpu {
        &mut self.bpu
    }

    /// The decoder.
    pub const fn decoder(&self) -> &D {
        &self.decoder
    }

    /// The translator.
    pub const fn translator(&self) -> &T {
        &self.translator
    }

    /// Mutable access to the translator.
    pub const fn translator_mut(&mut self) -> &mut T {
        &mut self.translator
    }

    /// The cache port.
    pub const fn icache(&self) -> &P {
        &self.icache
    }

    /// Mutable access to the cache port.
    pub const fn icache_mut(&mut self) -> &mut P {
        &mut self.icache
    }

    /// The port rejected a request and no retry has arrived yet.
    pub const fn cache_blocked(&self) -> bool {
        self.cache_blocked
    }

    /// Requests waiting for a port retry.
    pub fn retry_queue_len(&self) -> usize {
        self.retry_pkts.len()
    }

    /// Whole-stage activity.
    pub const fn stage_status(&self) -> FetchStageStatus {
        self.stage_status
    }

    /// Fetch configuration.
    pub const fn config(&self) -> &FetchConfig {
        &self.config
    }
}
