//! Per-authority serial numbers.

/// Monotonic serial counter owned by a single certificate authority.
///
/// Uniqueness is scoped to the issuer: two authorities may hand out the same
/// serial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialAllocator {
    next: u64,
}

impl SerialAllocator {
    pub fn new(base: u64) -> Self {
        Self { next: base }
    }

    /// Hand out the current serial and advance the counter.
    pub fn next(&mut self) -> u64 {
        let serial = self.next;
        self.next += 1;
        serial
    }

    /// The serial the next call to [`SerialAllocator::next`] returns.
    pub fn peek(&self) -> u64 {
        self.next
    }
}

impl Default for SerialAllocator {
    fn default() -> Self {
        Self::new(1)
    }
}
