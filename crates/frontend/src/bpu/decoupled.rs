//! Decoupled branch prediction unit.
//!
//! The BPU runs ahead of fetch. Each cycle it may broadcast the predicted PC
//! to every component, merge the per-stage candidates into one final
//! prediction, turn that prediction into a fetch stream and cut one stream
//! into a fetch target. Fetch consumes targets through `decoupled_predict`
//! and reports squashes and commits back, which roll the FSQ, the FTQ and
//! every speculative history back to an exact, reproducible state.

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, error, trace, warn};

use super::branch::{BranchInfo, FullBtbPrediction, OverrideReason};
use super::components::{PredictionMeta, PredictorComponent, build_components, ras};
use super::ftq::{FetchTargetQueue, FtqEntry, RESET_PC};
use super::history::{HistoryManager, SpeculativeHistories};
use super::stream::{FetchStream, SquashType};
use crate::common::{FetchStreamId, FetchTargetId, FrontendError};
use crate::config::BpuConfig;
use crate::stats::BpuStats;

/// Prediction cycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BpuState {
    /// Ready to request a new prediction.
    #[default]
    Idle,
    /// Every stage holds its candidate; merge pending.
    PredictorDone,
    /// Final prediction waiting for FSQ room and the override bubbles.
    PredictionOutstanding,
}

/// Arguments of one squash, funneled into the recovery routine.
#[derive(Debug, Clone, Copy)]
struct SquashRequest {
    target_id: FetchTargetId,
    stream_id: FetchStreamId,
    squash_type: SquashType,
    squash_pc: u64,
    redirect_pc: u64,
    is_cond: bool,
    actually_taken: bool,
    branch: Option<BranchInfo>,
}

/// Decoupled branch prediction unit owning the FSQ, the FTQ and all history.
#[derive(Debug)]
pub struct DecoupledBpu {
    predict_width: u64,
    fsq_size: usize,
    check_history: bool,

    components: Vec<PredictorComponent>,
    stage_preds: Vec<FullBtbPrediction>,
    final_pred: FullBtbPrediction,

    fsq: BTreeMap<FetchStreamId, FetchStream>,
    fsq_id: FetchStreamId,
    ftq: FetchTargetQueue,

    histories: SpeculativeHistories,
    history_manager: HistoryManager,
    /// Start addresses of the most recent streams, oldest first.
    previous_pcs: VecDeque<u64>,
    ahead_stages: usize,

    s0_pc: u64,
    state: BpuState,
    num_override_bubbles: usize,
    squashing: bool,
    current_ftq_entry_inst_num: u32,

    /// Prediction and squash counters.
    pub stats: BpuStats,
}

impl DecoupledBpu {
    /// Builds a BPU with every component and empty queues.
    ///
    /// Prediction starts at `RESET_PC` until `reset_pc` says otherwise.
    ///
    /// # Errors
    ///
    /// Returns `FrontendError::InvalidConfig` when `config` fails validation.
    pub fn new(config: &BpuConfig) -> Result<Self, FrontendError> {
        config.validate()?;
        Ok(Self {
            predict_width: config.predict_width,
            fsq_size: config.fsq_size,
            check_history: config.check_history,
            components: build_components(config),
            stage_preds: vec![FullBtbPrediction::default(); config.num_stages],
            final_pred: FullBtbPrediction::default(),
            fsq: BTreeMap::new(),
            fsq_id: 1,
            ftq: FetchTargetQueue::new(config.ftq_size),
            histories: SpeculativeHistories::new(config),
            history_manager: HistoryManager::new(config.max_shamt),
            previous_pcs: VecDeque::with_capacity(config.abtb.ahead_stages + 1),
            ahead_stages: config.abtb.ahead_stages,
            s0_pc: RESET_PC,
            state: BpuState::Idle,
            num_override_bubbles: 0,
            squashing: false,
            current_ftq_entry_inst_num: 0,
            stats: BpuStats::new(config.num_stages),
        })
    }

    /// Advances the prediction state machine by one cycle.
    ///
    /// # Errors
    ///
    /// Propagates `FrontendError::StreamIdGap` from stream insertion.
    pub fn tick(&mut self) -> Result<(), FrontendError> {
        if self.squashing {
            debug!(target: "frontend::bpu", "squashed, resetting to idle");
            self.state = BpuState::Idle;
            self.num_override_bubbles = 0;
            self.squashing = false;
            return Ok(());
        }

        if self.state == BpuState::Idle {
            if self.fsq_full() {
                self.stats.fsq_full_cycles += 1;
            } else {
                self.request_new_prediction();
                self.state = BpuState::PredictorDone;
            }
        }

        if self.state == BpuState::PredictorDone {
            self.num_override_bubbles = self.generate_final_pred();
            self.state = BpuState::PredictionOutstanding;
        }

        self.try_enq_fetch_target();

        if !self.fsq_full()
            && self.state == BpuState::PredictionOutstanding
            && self.s0_pc != u64::MAX
            && self.num_override_bubbles == 0
        {
            self.make_new_prediction()?;
            self.state = BpuState::Idle;
        }

        if self.num_override_bubbles > 0 {
            self.num_override_bubbles -= 1;
            self.stats.override_bubble_num += 1;
            trace!(target: "frontend::bpu", left = self.num_override_bubbles, "override bubble");
        }
        Ok(())
    }

    /// Broadcasts `s0_pc` and the histories to every component.
    fn request_new_prediction(&mut self) {
        trace!(target: "frontend::bpu", pc = format_args!("{:#x}", self.s0_pc), "request prediction");
        for pred in &mut self.stage_preds {
            pred.clear();
            pred.bb_start = self.s0_pc;
        }
        for component in &mut self.components {
            component.put_pc_history(self.s0_pc, &self.previous_pcs, &self.histories, &mut self.stage_preds);
        }
    }

    /// Merges the stage candidates into the final prediction.
    ///
    /// The slowest stage with any entry wins. The first stage that already
    /// agrees with it decides the override bubbles.
    ///
    /// # Returns
    ///
    /// The number of override bubbles.
    fn generate_final_pred(&mut self) -> usize {
        let w = self.predict_width;
        let chosen = self
            .stage_preds
            .iter()
            .rposition(|p| !p.btb_entries.is_empty())
            .unwrap_or(0);

        let mut first_hit = 0;
        let mut reason = OverrideReason::NoOverride;
        while first_hit < chosen {
            match self.stage_preds[first_hit].mismatch(&self.stage_preds[chosen], w) {
                None => break,
                Some(r) => {
                    reason = r;
                    first_hit += 1;
                }
            }
        }

        let mut final_pred = self.stage_preds[chosen].clone();
        final_pred.pred_source = first_hit;
        final_pred.override_reason = reason;

        if self.stage_preds.last().is_some_and(|p| !p.btb_entries.is_empty()) {
            for component in &mut self.components {
                if let PredictorComponent::Ubtb(ubtb) = component {
                    ubtb.update_using_final_pred(&final_pred);
                }
            }
        }

        if let Some(count) = self.stats.preds_of_each_stage.get_mut(first_hit) {
            *count += 1;
        }
        if first_hit > 0 {
            self.stats.override_count += 1;
            *self.stats.override_reasons.entry(reason).or_default() += 1;
        }
        debug!(
            target: "frontend::bpu",
            start = format_args!("{:#x}", final_pred.bb_start),
            chosen,
            bubbles = first_hit,
            ?reason,
            taken = final_pred.is_taken(),
            target_pc = format_args!("{:#x}", final_pred.target(w)),
            "final prediction"
        );

        self.final_pred = final_pred;
        for pred in &mut self.stage_preds {
            pred.clear();
        }
        first_hit
    }

    /// Cuts the next stream into one fetch target when both queues allow it.
    ///
    /// A full FTQ or a stream that does not exist yet is ordinary backpressure.
    fn try_enq_fetch_target(&mut self) {
        if self.ftq.full() {
            self.stats.ftq_full_cycles += 1;
            return;
        }
        let enq = *self.ftq.enq_state();
        let Some(stream) = self.fsq.get(&enq.stream_id) else {
            self.stats.fsq_not_ready_cycles += 1;
            trace!(target: "frontend::ftq", stream_id = enq.stream_id, "stream not predicted yet");
            return;
        };
        if enq.pc > stream.pred_end_pc {
            warn!(
                target: "frontend::ftq",
                stream_id = enq.stream_id,
                pc = format_args!("{:#x}", enq.pc),
                end = format_args!("{:#x}", stream.pred_end_pc),
                "enqueue pc beyond stream end"
            );
        }

        let taken = stream.taken();
        let entry = FtqEntry {
            start_pc: enq.pc,
            end_pc: if taken { stream.branch_info().end() } else { stream.pred_end_pc },
            taken_pc: stream.control_pc(),
            taken,
            target: stream.taken_target(),
            fsq_id: enq.stream_id,
        };
        let state = self.ftq.enq_state_mut();
        state.pc = entry.next_pc();
        state.stream_id += 1;
        self.ftq.enqueue(entry);
    }

    /// Materializes the final prediction as a stream and advances speculation.
    fn make_new_prediction(&mut self) -> Result<(), FrontendError> {
        let w = self.predict_width;
        let final_pred = &self.final_pred;
        let start_pc = self.s0_pc;

        let mut stream = FetchStream {
            start_pc,
            pred_taken: final_pred.is_taken(),
            pred_end_pc: final_pred.end(w),
            pred_btb_entries: final_pred.btb_entries.clone(),
            is_hit: !final_pred.btb_entries.is_empty(),
            pred_source: final_pred.pred_source,
            override_reason: final_pred.override_reason,
            pred_metas: self.components.iter().map(PredictorComponent::prediction_meta).collect(),
            history: self.histories.global.clone(),
            phistory: self.histories.path.clone(),
            bw_history: self.histories.backward.clone(),
            imli_history: self.histories.imli.clone(),
            local_histories: self.histories.local.clone(),
            previous_pcs: self.previous_pcs.clone(),
            ..FetchStream::default()
        };
        if let Some(taken) = final_pred.taken_entry() {
            stream.pred_branch_info = taken.info;
            stream.pred_branch_info.target = final_pred.target(w);
        }
        stream.set_default_resolve();

        for component in &mut self.components {
            component.spec_update_hist(final_pred);
        }
        let (shamt, cond_taken) = final_pred.hist_info();
        self.histories
            .apply(start_pc, (shamt, cond_taken), final_pred.bw_hist_info(), final_pred.phist_info());
        self.history_manager.add_speculative_hist(
            start_pc,
            shamt,
            cond_taken,
            &stream.pred_branch_info,
            self.fsq_id,
        );

        let expected = self.fsq.last_key_value().map_or(self.fsq_id, |(&last, _)| last + 1);
        if expected != self.fsq_id {
            error!(target: "frontend::bpu", expected, found = self.fsq_id, "stream id gap");
            return Err(FrontendError::StreamIdGap {
                expected,
                found: self.fsq_id,
            });
        }

        let next_pc = final_pred.target(w);
        debug!(
            target: "frontend::bpu",
            stream_id = self.fsq_id,
            start = format_args!("{start_pc:#x}"),
            end = format_args!("{:#x}", stream.pred_end_pc),
            taken = stream.pred_taken,
            next = format_args!("{next_pc:#x}"),
            "new stream"
        );
        self.push_previous_pc(start_pc);
        let _ = self.fsq.insert(self.fsq_id, stream);
        self.fsq_id += 1;
        self.s0_pc = next_pc;
        self.stats.predictions += 1;
        Ok(())
    }

    /// Squash caused by a resolved branch.
    ///
    /// `branch` carries the actual target. A decode-originated squash on a
    /// taken return redirects to the return address checkpointed with the
    /// stream.
    ///
    /// # Returns
    ///
    /// The address prediction restarts from.
    ///
    /// # Errors
    ///
    /// Returns `FrontendError::HistoryMismatch` when history checking is on
    /// and the rebuilt history disagrees with the ledger.
    pub fn control_squash(
        &mut self,
        target_id: FetchTargetId,
        stream_id: FetchStreamId,
        branch: &BranchInfo,
        actually_taken: bool,
        from_commit: bool,
    ) -> Result<u64, FrontendError> {
        self.stats.control_squash += 1;
        let ras_redirect = (!from_commit && actually_taken && branch.is_return)
            .then(|| self.ras_top_from_stream(stream_id))
            .flatten();
        let redirect_pc = ras_redirect.unwrap_or(if actually_taken { branch.target } else { branch.end() });
        self.handle_squash(SquashRequest {
            target_id,
            stream_id,
            squash_type: SquashType::Ctrl,
            squash_pc: branch.pc,
            redirect_pc,
            is_cond: branch.is_cond,
            actually_taken,
            branch: Some(BranchInfo {
                target: redirect_pc,
                ..*branch
            }),
        })
    }

    /// Squash without a resolved branch, such as a pipeline flush.
    ///
    /// # Errors
    ///
    /// See `control_squash`.
    pub fn non_control_squash(
        &mut self,
        target_id: FetchTargetId,
        stream_id: FetchStreamId,
        inst_pc: u64,
        redirect_pc: u64,
    ) -> Result<u64, FrontendError> {
        self.stats.non_control_squash += 1;
        self.handle_squash(SquashRequest {
            target_id,
            stream_id,
            squash_type: SquashType::Other,
            squash_pc: inst_pc,
            redirect_pc,
            is_cond: false,
            actually_taken: false,
            branch: None,
        })
    }

    /// Squash caused by an exception or interrupt.
    ///
    /// # Errors
    ///
    /// See `control_squash`.
    pub fn trap_squash(
        &mut self,
        target_id: FetchTargetId,
        stream_id: FetchStreamId,
        last_committed_pc: u64,
        redirect_pc: u64,
    ) -> Result<u64, FrontendError> {
        self.stats.trap_squash += 1;
        self.handle_squash(SquashRequest {
            target_id,
            stream_id,
            squash_type: SquashType::Trap,
            squash_pc: last_committed_pc,
            redirect_pc,
            is_cond: false,
            actually_taken: false,
            branch: None,
        })
    }

    fn ras_top_from_stream(&self, stream_id: FetchStreamId) -> Option<u64> {
        let stream = self.fsq.get(&stream_id)?;
        self.components
            .iter()
            .zip(&stream.pred_metas)
            .find_map(|(c, meta)| match (c, meta) {
                (PredictorComponent::Ras(_), PredictionMeta::Ras(m)) => Some(ras::top_addr_from_meta(m)),
                _ => None,
            })
    }

    /// Records a new stream start, keeping as many as the ahead BTB looks back.
    fn push_previous_pc(&mut self, start_pc: u64) {
        if self.ahead_stages == 0 {
            return;
        }
        self.previous_pcs.push_back(start_pc);
        while self.previous_pcs.len() > self.ahead_stages {
            let _ = self.previous_pcs.pop_front();
        }
    }

    /// Recovery routine shared by every squash kind.
    fn handle_squash(&mut self, req: SquashRequest) -> Result<u64, FrontendError> {
        self.squashing = true;
        let SquashRequest {
            target_id,
            stream_id,
            squash_type,
            squash_pc,
            redirect_pc,
            is_cond,
            actually_taken,
            branch,
        } = req;

        let Some(stream) = self.fsq.get_mut(&stream_id) else {
            debug!(target: "frontend::bpu", stream_id, "squash on a stream no longer in the FSQ, ignored");
            return Ok(redirect_pc);
        };
        stream.resolved = true;
        stream.exe_taken = actually_taken;
        stream.squash_pc = squash_pc;
        stream.squash_type = squash_type;
        if let Some(b) = branch {
            stream.exe_branch_info = b;
        }

        let dropped = self.fsq.split_off(&(stream_id + 1));
        debug!(
            target: "frontend::bpu",
            stream_id,
            ?squash_type,
            squash_pc = format_args!("{squash_pc:#x}"),
            redirect = format_args!("{redirect_pc:#x}"),
            dropped = dropped.len(),
            "squash"
        );

        let Some(stream) = self.fsq.get(&stream_id) else {
            return Ok(redirect_pc);
        };
        let exe_branch = branch.unwrap_or_default();
        let (shamt, cond_taken) = stream.hist_info_during_squash(squash_pc, is_cond, actually_taken);
        let bw = stream.bw_hist_info_during_squash(squash_pc, &exe_branch, actually_taken);

        self.histories.global.clone_from(&stream.history);
        self.histories.path.clone_from(&stream.phistory);
        self.histories.backward.clone_from(&stream.bw_history);
        self.histories.imli.clone_from(&stream.imli_history);
        self.histories.local.clone_from(&stream.local_histories);
        self.previous_pcs.clone_from(&stream.previous_pcs);
        let start_pc = stream.start_pc;
        for (component, meta) in self.components.iter_mut().zip(&stream.pred_metas) {
            component.recover_hist(stream, meta);
        }
        self.histories
            .apply(start_pc, (shamt, cond_taken), bw, (squash_pc, actually_taken));
        self.push_previous_pc(start_pc);

        self.history_manager
            .squash(stream_id, shamt, cond_taken, &exe_branch);
        let checked = if self.check_history {
            self.history_manager.check_history(&self.histories.global)
        } else {
            Ok(())
        };
        if let Err(checked_bits) = checked {
            error!(target: "frontend::history", stream_id, checked_bits, "history mismatch after squash");
            return Err(FrontendError::HistoryMismatch { stream_id, checked_bits });
        }

        self.final_pred.clear();
        for pred in &mut self.stage_preds {
            pred.clear();
        }
        self.s0_pc = redirect_pc;
        self.fsq_id = stream_id + 1;
        self.current_ftq_entry_inst_num = 0;
        self.ftq.squash(target_id + 1, self.fsq_id, redirect_pc);
        Ok(redirect_pc)
    }

    /// Commits every stream up to and including `stream_id`, training the components.
    pub fn update(&mut self, stream_id: FetchStreamId) {
        let w = self.predict_width;
        while let Some(entry) = self.fsq.first_entry() {
            if *entry.key() > stream_id {
                break;
            }
            let id = *entry.key();
            let mut stream = entry.remove();

            self.stats.committed_streams += 1;
            if stream.exe_taken {
                self.stats.committed_taken += 1;
            }
            if stream.is_hit {
                self.stats.committed_btb_hits += 1;
            }
            stream.false_hit = stream.is_hit
                && stream.pred_taken
                && stream.resolved
                && (!stream.exe_taken || stream.exe_branch_info.pc != stream.pred_branch_info.pc);
            if stream.false_hit {
                self.stats.false_hits += 1;
            }

            if stream.is_hit || stream.exe_taken {
                stream.set_update_inst_end_pc(w);
                stream.set_update_btb_entries();
                let btb_meta = self
                    .components
                    .iter()
                    .zip(&stream.pred_metas)
                    .find_map(|(c, meta)| match (c, meta) {
                        (PredictorComponent::Btb(_), PredictionMeta::Btb(m)) => Some(m.clone()),
                        _ => None,
                    });
                if let Some(meta) = btb_meta {
                    for component in &self.components {
                        if let PredictorComponent::Btb(btb) = component {
                            btb.get_and_set_new_btb_entry(&mut stream, &meta);
                        }
                    }
                }
                for (component, meta) in self.components.iter_mut().zip(&stream.pred_metas) {
                    component.update(&stream, meta);
                }
                let mut committed: Vec<BranchInfo> =
                    stream.update_btb_entries.iter().map(|e| e.info).collect();
                if !stream.update_is_old_entry && stream.update_new_btb_entry.valid {
                    committed.push(stream.update_new_btb_entry.info);
                }
                for branch in committed.iter().filter(|b| b.is_cond) {
                    for component in &mut self.components {
                        component.commit_branch(&stream, branch);
                    }
                }
            }
            trace!(target: "frontend::bpu", stream_id = id, insts = stream.commit_inst_num, "commit");
        }
        self.history_manager.commit(stream_id);
    }

    /// Predicts the instruction at `pc` from the supplying fetch target.
    ///
    /// # Returns
    ///
    /// `(taken, run_out, next_pc)`. `run_out` means the target is exhausted
    /// and fetch must wait for the next one. With no target available the
    /// answer is "not taken, run out".
    ///
    /// # Errors
    ///
    /// `FrontendError::PcOutsideTarget` when `pc` is not inside the supplying
    /// target, `FrontendError::MissingStream` when its stream is gone.
    pub fn decoupled_predict(&mut self, pc: u64, inst_size: u64) -> Result<(bool, bool, u64), FrontendError> {
        let Some(entry) = self.ftq.supplying_target().copied() else {
            trace!(target: "frontend::bpu", pc = format_args!("{pc:#x}"), "no target available");
            return Ok((false, true, pc + inst_size));
        };
        if pc < entry.start_pc || pc >= entry.end_pc {
            error!(
                target: "frontend::bpu",
                pc = format_args!("{pc:#x}"),
                start = format_args!("{:#x}", entry.start_pc),
                end = format_args!("{:#x}", entry.end_pc),
                "pc outside supplying target"
            );
            return Err(FrontendError::PcOutsideTarget {
                pc,
                start: entry.start_pc,
                end: entry.end_pc,
            });
        }

        let taken = entry.taken && pc == entry.taken_pc;
        let next_pc = if taken { entry.target } else { pc + inst_size };
        let run_out = taken || next_pc >= entry.end_pc;
        self.current_ftq_entry_inst_num += 1;
        self.stats.fetched_insts += 1;

        if run_out {
            let Some(stream) = self.fsq.get_mut(&entry.fsq_id) else {
                error!(target: "frontend::bpu", stream_id = entry.fsq_id, "supplying stream missing");
                return Err(FrontendError::MissingStream(entry.fsq_id));
            };
            stream.fetch_inst_num += self.current_ftq_entry_inst_num;
            trace!(
                target: "frontend::bpu",
                target_id = self.ftq.supplying_target_id(),
                insts = self.current_ftq_entry_inst_num,
                "target exhausted"
            );
            self.ftq.finish_current_fetch_target();
            self.current_ftq_entry_inst_num = 0;
        }
        Ok((taken, run_out, next_pc))
    }

    /// Records instructions committed from `stream_id`.
    pub fn add_commit_insts(&mut self, stream_id: FetchStreamId, count: u32) {
        if let Some(stream) = self.fsq.get_mut(&stream_id) {
            stream.commit_inst_num += count;
        }
    }

    /// Hands fetch the target it demands if one is ready.
    pub fn try_supply_fetch_with_target(&mut self, fetch_pc: u64) -> bool {
        self.ftq.try_supply_fetch_with_target(fetch_pc)
    }

    /// Fetch holds its demanded target.
    pub const fn fetch_target_available(&self) -> bool {
        self.ftq.fetch_target_available()
    }

    /// Target fetch is consuming.
    pub fn supplying_fetch_target(&self) -> Option<&FtqEntry> {
        self.ftq.supplying_target()
    }

    /// Stream owning the supplying target.
    pub fn supplying_stream_id(&self) -> Option<FetchStreamId> {
        self.ftq.supplying_target().map(|e| e.fsq_id)
    }

    /// Id of the supplying target.
    pub const fn supplying_target_id(&self) -> FetchTargetId {
        self.ftq.supplying_target_id()
    }

    /// Restarts prediction and target production at `pc`.
    pub fn reset_pc(&mut self, pc: u64) {
        debug!(target: "frontend::bpu", pc = format_args!("{pc:#x}"), "reset pc");
        self.s0_pc = pc;
        self.previous_pcs.clear();
        self.ftq.reset_pc(pc);
    }

    /// No room for another stream.
    pub fn fsq_full(&self) -> bool {
        self.fsq.len() >= self.fsq_size
    }

    /// Number of live streams.
    pub fn fsq_len(&self) -> usize {
        self.fsq.len()
    }

    /// Live stream `id`.
    pub fn stream(&self, id: FetchStreamId) -> Option<&FetchStream> {
        self.fsq.get(&id)
    }

    /// Live streams in id order.
    pub fn streams(&self) -> impl Iterator<Item = (&FetchStreamId, &FetchStream)> {
        self.fsq.iter()
    }

    /// Id the next stream will receive.
    pub const fn next_stream_id(&self) -> FetchStreamId {
        self.fsq_id
    }

    /// The FTQ.
    pub const fn ftq(&self) -> &FetchTargetQueue {
        &self.ftq
    }

    /// Current speculative histories.
    pub const fn histories(&self) -> &SpeculativeHistories {
        &self.histories
    }

    /// Start addresses of the latest streams, oldest first.
    pub const fn previous_pcs(&self) -> &VecDeque<u64> {
        &self.previous_pcs
    }

    /// The history ledger.
    pub const fn history_manager(&self) -> &HistoryManager {
        &self.history_manager
    }

    /// Predicted PC of the next block.
    pub const fn s0_pc(&self) -> u64 {
        self.s0_pc
    }

    /// Current state of the prediction cycle.
    pub const fn state(&self) -> BpuState {
        self.state
    }

    /// Override bubbles still to wait.
    pub const fn override_bubbles(&self) -> usize {
        self.num_override_bubbles
    }

    /// Last final prediction.
    pub const fn final_prediction(&self) -> &FullBtbPrediction {
        &self.final_pred
    }

    /// Components in evaluation order.
    pub fn components(&self) -> &[PredictorComponent] {
        &self.components
    }

    /// Per-stage candidates; each stage is empty outside a prediction.
    pub fn stage_predictions(&self) -> &[FullBtbPrediction] {
        &self.stage_preds
    }

    /// Replaces the per-stage candidates and merges them.
    ///
    /// Drives the merge without running the components, for scripted
    /// scenarios.
    ///
    /// # Returns
    ///
    /// The number of override bubbles.
    pub fn merge_stage_predictions(&mut self, stage_preds: Vec<FullBtbPrediction>) -> usize {
        self.stage_preds = stage_preds;
        self.generate_final_pred()
    }
}
