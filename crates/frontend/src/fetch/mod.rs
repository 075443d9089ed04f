//! Instruction fetch.
//!
//! This module implements the consumer half of the front end. It provides:
//! 1. **Engine:** The per-cycle fetch loop and the per-thread state machine.
//! 2. **Buffer:** The fetch window assembled from two cache-line halves.
//! 3. **Requests:** Translation/cache requests and response packets.
//! 4. **Ports:** Decoder, translator and instruction cache interfaces.
//! 5. **Signals:** What decode and commit tell fetch, and what fetch hands decode.

/// Fetch buffer.
pub mod buffer;

/// Fetch engine.
pub mod engine;

/// Static and dynamic instructions.
pub mod inst;

/// Collaborator traits.
pub mod ports;

/// Memory requests and packets.
pub mod request;

/// Inter-stage signals.
pub mod signals;

/// Thread status and stall reasons.
pub mod status;

pub use buffer::FetchBuffer;
pub use engine::{Fetch, FetchThread};
pub use inst::{DynInst, StaticInst};
pub use ports::{DecodeResult, Decoder, ICachePort, Translator};
pub use request::{MemRequest, Packet, SplitHalf};
pub use signals::{CommitSignals, DecodeSignals, FetchOutput};
pub use status::{FetchStageStatus, StallReason, ThreadStatus};
