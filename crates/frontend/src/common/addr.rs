//! Physical and Virtual Address types.
//!
//! Fetch requests move between address spaces twice: the predictor hands out
//! virtual PCs and the translation unit hands back physical addresses for the
//! instruction cache. Keeping the two as distinct types stops a request from
//! being sent to the cache before it was translated.

/// A virtual instruction address.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtAddr(pub u64);

/// A physical instruction address, produced by translation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PhysAddr(pub u64);

impl VirtAddr {
    /// Creates a new virtual address from a raw 64-bit value.
    #[inline(always)]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit address value.
    #[inline(always)]
    pub const fn val(self) -> u64 {
        self.0
    }

    /// Rounds the address down to a multiple of `align`.
    ///
    /// # Arguments
    ///
    /// * `align` - Alignment in bytes. Must be a power of two.
    #[inline(always)]
    pub const fn align_down(self, align: u64) -> Self {
        Self(self.0 & !(align - 1))
    }

    /// Byte offset of the address inside a block of `block` bytes.
    #[inline(always)]
    pub const fn block_offset(self, block: u64) -> u64 {
        self.0 & (block - 1)
    }

    /// Returns the address advanced by `bytes`.
    #[inline(always)]
    pub const fn offset(self, bytes: u64) -> Self {
        Self(self.0.wrapping_add(bytes))
    }
}

impl PhysAddr {
    /// Creates a new physical address from a raw 64-bit value.
    #[inline(always)]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit address value.
    #[inline(always)]
    pub const fn val(self) -> u64 {
        self.0
    }
}

impl From<u64> for VirtAddr {
    fn from(addr: u64) -> Self {
        Self(addr)
    }
}

impl From<u64> for PhysAddr {
    fn from(addr: u64) -> Self {
        Self(addr)
    }
}
