//! Fetch faults and modeling errors.
//!
//! Two kinds of failure exist in the front end and they never mix:
//! 1. **Fetch Faults:** Architectural faults raised by instruction translation.
//!    They are ordinary values that ride on a synthetic no-op down the pipeline.
//! 2. **Frontend Errors:** Broken modeling invariants (stream id gaps, history
//!    divergence, a PC outside its fetch target). The simulation cannot
//!    continue past one of these, so they are returned as `Err` and propagated.

use std::fmt;

use thiserror::Error;

use super::FetchStreamId;

/// Instruction-side fault reported by the translation unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchFault {
    /// Fetch address is not aligned to the minimum instruction size.
    InstructionAddressMisaligned(u64),

    /// Fetch violated a physical memory protection check.
    InstructionAccessFault(u64),

    /// Page table walk for the fetch address failed.
    InstructionPageFault(u64),
}

impl FetchFault {
    /// Returns the faulting virtual address.
    pub const fn addr(&self) -> u64 {
        match self {
            Self::InstructionAddressMisaligned(a)
            | Self::InstructionAccessFault(a)
            | Self::InstructionPageFault(a) => *a,
        }
    }
}

impl fmt::Display for FetchFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstructionAddressMisaligned(a) => {
                write!(f, "InstructionAddressMisaligned({a:#x})")
            }
            Self::InstructionAccessFault(a) => write!(f, "InstructionAccessFault({a:#x})"),
            Self::InstructionPageFault(a) => write!(f, "InstructionPageFault({a:#x})"),
        }
    }
}

/// Fatal modeling errors. Any of these means the model state is corrupt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrontendError {
    /// A stream was inserted with an id other than the next expected one.
    #[error("fetch stream id gap: expected {expected}, got {found}")]
    StreamIdGap {
        /// Id the queue expected next.
        expected: FetchStreamId,
        /// Id that was actually supplied.
        found: FetchStreamId,
    },

    /// A stream that must be resident in the FSQ is missing.
    #[error("fetch stream {0} is not in the FSQ")]
    MissingStream(FetchStreamId),

    /// Replaying the history ledger does not reproduce the live global history.
    #[error("global history diverged from ledger after stream {stream_id} ({checked_bits} bits checked)")]
    HistoryMismatch {
        /// Stream whose squash exposed the divergence.
        stream_id: FetchStreamId,
        /// Number of low-order bits that were compared.
        checked_bits: usize,
    },

    /// Fetch asked for a prediction at a PC outside the supplying fetch target.
    #[error("pc {pc:#x} outside supplying fetch target [{start:#x}, {end:#x})")]
    PcOutsideTarget {
        /// Instruction address.
        pc: u64,
        /// Target start (inclusive).
        start: u64,
        /// Target end (exclusive).
        end: u64,
    },

    /// A completed fetch window starts outside the supplying fetch target.
    #[error("fetch buffer starts at {buffer_start:#x}, outside the target starting at {ftq_start:#x}")]
    FtqStartMismatch {
        /// Start PC of the supplying FTQ entry.
        ftq_start: u64,
        /// Start PC of the fetch buffer.
        buffer_start: u64,
    },

    /// The configuration cannot describe a buildable front end.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configuration text could not be parsed.
    #[error("configuration parse error: {0}")]
    ConfigParse(String),
}
