//! Common types shared by the predictor and the fetch engine.
//!
//! This module provides the small building blocks that both halves of the
//! front end speak in:
//! 1. **Address Types:** Strong types for virtual and physical fetch addresses.
//! 2. **Faults:** Instruction-side faults carried forward on synthetic no-ops.
//! 3. **Error Handling:** Fatal modeling errors surfaced as `FrontendError`.

/// Address type definitions (physical and virtual addresses).
pub mod addr;

/// Fetch faults and the crate error type.
pub mod error;

pub use addr::{PhysAddr, VirtAddr};
pub use error::{FetchFault, FrontendError};

/// Thread identifier inside one fetch stage.
pub type ThreadId = usize;

/// Monotonic identifier of a fetch stream (FSQ entry).
pub type FetchStreamId = u64;

/// Monotonic identifier of a fetch target (FTQ entry).
pub type FetchTargetId = u64;

/// Dynamic instruction sequence number.
pub type InstSeqNum = u64;
