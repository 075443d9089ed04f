//! Collaborator interfaces.
//!
//! Fetch talks to three outside components, each behind a trait so the
//! engine can be driven by a real model or by scripted fakes:
//! 1. **Decoder:** Turns buffered bytes into instructions and expands macro-ops.
//! 2. **Translator:** Starts an instruction address translation. The result
//!    comes back later through `Fetch::finish_translation`.
//! 3. **Instruction Cache Port:** Accepts or rejects timing requests. Responses
//!    come back through `Fetch::process_cache_completion` and freed capacity
//!    through `Fetch::recv_req_retry`.

use super::inst::StaticInst;
use super::request::{MemRequest, Packet};
use crate::common::PhysAddr;

/// Outcome of one decode attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeResult {
    /// A complete instruction starts at the PC.
    Inst(StaticInst),
    /// The supplied bytes end before the instruction does.
    NeedMoreBytes,
}

/// Instruction decoder.
pub trait Decoder {
    /// Forgets any partially decoded state.
    fn reset(&mut self);

    /// Decodes the instruction at `pc` from `bytes`, which start at `pc`.
    fn decode(&mut self, pc: u64, bytes: &[u8]) -> DecodeResult;

    /// Micro-op `micro_pc` of `macroop`.
    fn fetch_microop(&self, macroop: &StaticInst, micro_pc: u16) -> StaticInst;
}

/// Instruction-side address translation.
pub trait Translator {
    /// Begins translating `req`.
    ///
    /// The owner of the translator reports the result with
    /// `Fetch::finish_translation` on this or a later cycle.
    fn translate(&mut self, req: &MemRequest);
}

/// Timing port into the instruction cache.
pub trait ICachePort {
    /// Offers `pkt` to the cache.
    ///
    /// # Returns
    ///
    /// `false` when the cache has no capacity; the port calls
    /// `Fetch::recv_req_retry` once it has.
    fn send_timing_req(&mut self, pkt: &Packet) -> bool;

    /// `addr` is backed by memory.
    fn is_mem_addr(&self, addr: PhysAddr) -> bool;
}
