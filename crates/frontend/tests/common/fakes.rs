//! Scripted collaborators for the fetch engine.
//!
//! Memory content is a pure function of the address (`mem_byte`), so any
//! window can be checked byte for byte without loading a program.

use std::collections::{BTreeMap, VecDeque};
use std::ops::Range;

use frontsim_core::common::{FetchFault, PhysAddr};
use frontsim_core::fetch::{DecodeResult, Decoder, ICachePort, MemRequest, Packet, StaticInst, Translator};

/// Content of memory at `addr`.
pub fn mem_byte(addr: u64) -> u8 {
    (addr ^ (addr >> 8)) as u8
}

/// `len` bytes of memory starting at `addr`.
pub fn mem_bytes(addr: u64, len: usize) -> Vec<u8> {
    (addr..addr + len as u64).map(mem_byte).collect()
}

/// Decoder that sees fixed 4-byte instructions unless told otherwise.
#[derive(Debug)]
pub struct FakeDecoder {
    /// Instructions that differ from a plain 4-byte one, by address.
    pub insts: BTreeMap<u64, StaticInst>,
    /// Micro-ops per macro-op.
    pub microops: u16,
    /// Number of `reset` calls.
    pub resets: usize,
    /// Every address `decode` was called with.
    pub decoded: Vec<u64>,
}

impl Default for FakeDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDecoder {
    pub fn new() -> Self {
        Self {
            insts: BTreeMap::new(),
            microops: 3,
            resets: 0,
            decoded: Vec::new(),
        }
    }

    pub fn with_inst(mut self, pc: u64, inst: StaticInst) -> Self {
        self.insts.insert(pc, inst);
        self
    }
}

impl Decoder for FakeDecoder {
    fn reset(&mut self) {
        self.resets += 1;
    }

    fn decode(&mut self, pc: u64, bytes: &[u8]) -> DecodeResult {
        self.decoded.push(pc);
        let inst = self.insts.get(&pc).copied().unwrap_or(StaticInst::simple(4));
        if bytes.len() < usize::from(inst.size) {
            DecodeResult::NeedMoreBytes
        } else {
            DecodeResult::Inst(inst)
        }
    }

    fn fetch_microop(&self, macroop: &StaticInst, micro_pc: u16) -> StaticInst {
        StaticInst {
            is_macroop: false,
            is_last_microop: micro_pc + 1 >= self.microops,
            ..*macroop
        }
    }
}

/// Translator that queues requests until the harness completes them.
#[derive(Debug, Default)]
pub struct FakeTranslator {
    /// Requests waiting for `Fetch::finish_translation`.
    pub pending: VecDeque<MemRequest>,
    /// Every request ever received.
    pub issued: Vec<MemRequest>,
    /// Faults to report, keyed by request virtual address.
    pub faults: BTreeMap<u64, FetchFault>,
}

impl FakeTranslator {
    /// Identity mapping unless a fault is scripted for the address.
    pub fn outcome(&self, req: &MemRequest) -> Result<PhysAddr, FetchFault> {
        let vaddr = req.vaddr.val();
        self.faults
            .get(&vaddr)
            .cloned()
            .map_or(Ok(PhysAddr::new(vaddr)), Err)
    }
}

impl Translator for FakeTranslator {
    fn translate(&mut self, req: &MemRequest) {
        self.issued.push(req.clone());
        self.pending.push_back(req.clone());
    }
}

/// Cache port that accepts everything unless told to reject.
#[derive(Debug)]
pub struct FakeICache {
    /// Accepted packets, oldest first.
    pub sent: VecDeque<Packet>,
    /// Number of upcoming sends to reject.
    pub reject_next: usize,
    /// Send attempts, accepted or not.
    pub attempts: usize,
    /// Physical range backed by memory.
    pub mem: Range<u64>,
}

impl Default for FakeICache {
    fn default() -> Self {
        Self {
            sent: VecDeque::new(),
            reject_next: 0,
            attempts: 0,
            mem: 0..u64::MAX,
        }
    }
}

impl ICachePort for FakeICache {
    fn send_timing_req(&mut self, pkt: &Packet) -> bool {
        self.attempts += 1;
        if self.reject_next > 0 {
            self.reject_next -= 1;
            return false;
        }
        self.sent.push_back(pkt.clone());
        true
    }

    fn is_mem_addr(&self, addr: PhysAddr) -> bool {
        self.mem.contains(&addr.val())
    }
}
