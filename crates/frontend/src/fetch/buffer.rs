//! Fetch buffer.
//!
//! Holds the raw bytes of one fetch window. The window is assembled from the
//! two halves of a split cache access; `merge_halves` places the second half
//! at the split offset it is given, so the result does not depend on which
//! half arrived first or on how many bytes the first half carried.

/// Raw bytes covering `[start_pc, start_pc + filled)`, at most `size` of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchBuffer {
    start_pc: u64,
    size: usize,
    filled: usize,
    valid: bool,
    data: Vec<u8>,
}

impl FetchBuffer {
    /// Creates an invalid buffer of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            start_pc: 0,
            size,
            filled: 0,
            valid: false,
            data: vec![0; size],
        }
    }

    /// First covered address.
    pub const fn start_pc(&self) -> u64 {
        self.start_pc
    }

    /// Capacity in bytes.
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Bytes covered by the last merge.
    pub const fn filled(&self) -> usize {
        self.filled
    }

    /// The bytes are usable.
    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    /// Raw contents.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Drops the contents.
    pub const fn invalidate(&mut self) {
        self.valid = false;
    }

    /// Writes both halves of a split access and marks the buffer valid.
    ///
    /// `first` lands at offset 0 and `second` at offset `split`. Bytes past
    /// the buffer are ignored and a short first half leaves zeros before
    /// `split`. The buffer then covers up to the end of the second half.
    pub fn merge_halves(&mut self, start_pc: u64, split: usize, first: &[u8], second: &[u8]) {
        self.data.fill(0);
        let split = split.min(self.size);
        let n1 = first.len().min(split);
        self.data[..n1].copy_from_slice(&first[..n1]);
        let n2 = second.len().min(self.size - split);
        self.data[split..split + n2].copy_from_slice(&second[..n2]);
        self.start_pc = start_pc;
        self.filled = split + n2;
        self.valid = true;
    }

    /// The buffer is valid and holds `len` bytes starting at `pc`.
    pub fn contains(&self, pc: u64, len: u64) -> bool {
        self.valid && pc >= self.start_pc && pc + len <= self.start_pc + self.filled as u64
    }

    /// Bytes from `pc` to the end of the buffer; empty when `pc` is not covered.
    pub fn bytes_from(&self, pc: u64) -> &[u8] {
        if !self.contains(pc, 0) {
            return &[];
        }
        let offset = (pc - self.start_pc) as usize;
        self.data.get(offset..self.filled).unwrap_or(&[])
    }
}
