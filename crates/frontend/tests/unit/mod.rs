//! # Unit Components
//!
//! Groups the unit tests by front-end building block, from the plain data
//! structures up to the full fetch state machine.


/// Fetch buffer assembly and statistics rendering.
pub mod buffer;

/// History registers, the history ledger and squash rollback.
pub mod history;

/// Fetch target queue hand-off and contiguity.
pub mod ftq;

/// Multi-stage merge and override bubbles.
pub mod merge;


/// The decoupled BPU: prediction cycle, squash recovery and commit.
pub mod bpu;


/// The fetch engine against `mockall` collaborators.
pub mod fetch_mocks;
