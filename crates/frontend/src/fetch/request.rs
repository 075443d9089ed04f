//! Memory requests and packets exchanged with the translation unit and the cache.

use crate::common::{PhysAddr, ThreadId, VirtAddr};

/// Which half of a split fetch window a request covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, PartialOrd, Ord)]
pub enum SplitHalf {
    /// Tail of the first cache line.
    #[default]
    First,
    /// Head of the next cache line.
    Second,
}

impl SplitHalf {
    /// Slot index for storing this half's data.
    pub const fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
        }
    }
}

/// One instruction fetch access.
///
/// Requests are compared by value: a completion is accepted only when it
/// carries a request equal to one the thread still owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemRequest {
    /// Unique id; never reused, so requests from before a squash never match.
    pub id: u64,
    /// Owning thread.
    pub thread: ThreadId,
    /// Virtual start address.
    pub vaddr: VirtAddr,
    /// Length in bytes.
    pub size: usize,
    /// Fetch PC the window was requested for.
    pub pc: u64,
    /// Physical address, set by translation.
    pub paddr: Option<PhysAddr>,
    /// Half of the split window.
    pub seq: SplitHalf,
}

impl MemRequest {
    /// Same access, ignoring the translation result.
    pub fn same_access(&self, other: &Self) -> bool {
        self.id == other.id
            && self.thread == other.thread
            && self.vaddr == other.vaddr
            && self.size == other.size
            && self.pc == other.pc
            && self.seq == other.seq
    }
}

/// A cache request or response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// The access this packet belongs to.
    pub req: MemRequest,
    /// Payload; empty on requests.
    pub data: Vec<u8>,
}

impl Packet {
    /// A request packet without payload.
    pub const fn request(req: MemRequest) -> Self {
        Self {
            req,
            data: Vec::new(),
        }
    }

    /// Turns a request into a response carrying `data`.
    pub fn into_response(self, data: Vec<u8>) -> Self {
        Self { req: self.req, data }
    }
}
