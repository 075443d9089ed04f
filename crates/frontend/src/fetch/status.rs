//! Per-thread fetch status and stall reasons.

/// Fetch state of one hardware thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, PartialOrd, Ord)]
pub enum ThreadStatus {
    /// Deactivated; skipped by thread selection until activated again.
    Idle,
    /// Fetching normally.
    #[default]
    Running,
    /// Recovering from a squash this cycle.
    Squashing,
    /// Held back by a drain request.
    Blocked,
    /// A fault instruction was queued; waiting for commit to take the trap.
    TrapPending,
    /// Waiting for address translation.
    ItlbWait,
    /// Waiting for the instruction cache to answer.
    IcacheWaitResponse,
    /// The cache port rejected a request; waiting for a retry.
    IcacheWaitRetry,
    /// Both halves of the fetch window arrived.
    IcacheAccessComplete,
    /// A fetch address translated outside memory; waiting for a squash.
    NoGoodAddr,
    /// A quiesce instruction was fetched; waiting for a wake-up.
    QuiescePending,
}

impl ThreadStatus {
    /// A translation completion is expected in this state.
    pub const fn expects_translation(self) -> bool {
        matches!(self, Self::ItlbWait | Self::IcacheWaitResponse | Self::IcacheWaitRetry)
    }

    /// A cache response is expected in this state.
    pub const fn expects_response(self) -> bool {
        matches!(self, Self::IcacheWaitResponse | Self::IcacheWaitRetry)
    }

    /// The thread may be picked to fetch this cycle.
    pub const fn can_fetch(self) -> bool {
        matches!(self, Self::Running | Self::IcacheAccessComplete)
    }
}

/// Why a fetch slot went unused, reported to decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum StallReason {
    /// Slot was filled.
    #[default]
    NoStall,
    /// Waiting for the instruction cache.
    IcacheStall,
    /// Waiting for translation.
    ItlbStall,
    /// Held for a pending interrupt.
    IntStall,
    /// Held for a pending trap.
    TrapStall,
    /// Recovering from a squash.
    BpStall,
    /// No fetch target available.
    FtqBubble,
    /// Fetch stopped early at a taken branch or the end of a target.
    FetchFragStall,
    /// Any other fetch-side reason.
    OtherFetchStall,
    /// Decode refused instructions.
    DecodeStall,
}

/// Activity of the stage as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchStageStatus {
    /// At least one thread has work.
    Active,
    /// Nothing to do.
    #[default]
    Inactive,
}
