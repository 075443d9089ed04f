//! Decoupled Branch Prediction Unit.
//!
//! This module implements the predictor half of the front end. It provides:
//! 1. **Data Model:** Branch descriptors, per-stage block predictions and fetch streams.
//! 2. **Queues:** The fetch stream queue (inside `DecoupledBpu`) and the fetch target queue.
//! 3. **History:** Speculative history registers, their snapshots and the verification ledger.
//! 4. **Components:** uBTB, BTB, TAGE, ITTAGE, RAS and statistical corrector behind one contract.
//! 5. **Coordinator:** The per-cycle state machine, merge, squash recovery and commit.

/// Branch descriptors, BTB entries and per-stage predictions.
pub mod branch;

/// Predictor components and their dispatch enum.
pub mod components;

/// The BPU coordinator.
pub mod decoupled;

/// Fetch target queue.
pub mod ftq;

/// Speculative histories and the history ledger.
pub mod history;

/// Fetch streams (FSQ entries).
pub mod stream;

pub use branch::{BranchInfo, BtbEntry, FullBtbPrediction, OverrideReason};
pub use decoupled::{BpuState, DecoupledBpu};
pub use ftq::{FetchTargetQueue, FtqEntry, RESET_PC};
pub use history::{HistoryManager, HistoryRegister, SpeculativeHistories};
pub use stream::{FetchStream, SquashType};
