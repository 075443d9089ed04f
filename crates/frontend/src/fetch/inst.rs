//! Instructions produced by fetch.

use crate::common::{FetchFault, FetchStreamId, FetchTargetId, InstSeqNum, ThreadId};

/// Decoder-provided facts fetch needs about one instruction or micro-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticInst {
    /// Encoded size in bytes (2 or 4 on a compressed ISA).
    pub size: u8,
    /// Changes control flow.
    pub is_control: bool,
    /// Expands into micro-ops fetched through `Decoder::fetch_microop`.
    pub is_macroop: bool,
    /// Last micro-op of its macro-op; plain instructions are their own last.
    pub is_last_microop: bool,
    /// An interrupt may not be taken until this instruction commits.
    pub is_delayed_commit: bool,
    /// Suspends fetch until the thread is woken.
    pub is_quiesce: bool,
}

impl StaticInst {
    /// A plain non-control instruction of `size` bytes.
    pub const fn simple(size: u8) -> Self {
        Self {
            size,
            is_control: false,
            is_macroop: false,
            is_last_microop: true,
            is_delayed_commit: false,
            is_quiesce: false,
        }
    }

    /// A control instruction of `size` bytes.
    pub const fn control(size: u8) -> Self {
        Self {
            is_control: true,
            ..Self::simple(size)
        }
    }

    /// The synthetic no-op that carries a fetch fault.
    pub const fn nop() -> Self {
        Self::simple(4)
    }
}

/// An instruction in flight from fetch to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynInst {
    /// Global program-order sequence number.
    pub seq_num: InstSeqNum,
    /// Owning thread.
    pub thread: ThreadId,
    /// Instruction address.
    pub pc: u64,
    /// Micro-op index within a macro-op, 0 otherwise.
    pub micro_pc: u16,
    /// Decoded instruction.
    pub static_inst: StaticInst,
    /// Address fetch continued at after this instruction.
    pub pred_next_pc: u64,
    /// The predictor redirected control here.
    pub pred_taken: bool,
    /// Translation fault carried by a synthetic no-op.
    pub fault: Option<FetchFault>,
    /// Stream that supplied the instruction.
    pub fsq_id: FetchStreamId,
    /// Target that supplied the instruction.
    pub ftq_id: FetchTargetId,
}

impl DynInst {
    /// This is a fault-carrying no-op rather than a real instruction.
    pub const fn is_fault(&self) -> bool {
        self.fault.is_some()
    }
}
