use crc32fast::Hasher;

/// A 32-bit block checksum (spec §4.1 "Checksum": "a fast non-cryptographic
/// 32-bit checksum, the hardware-accelerated one used for integrity rather
/// than security").
///
/// This is CRC-32 (the same polynomial as `zlib`/Ethernet), computed with
/// `crc32fast`'s runtime SIMD/CLMUL dispatch where the host CPU supports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockChecksum(u32);

impl BlockChecksum {
    /// Computes the checksum of `data` in one call.
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(data);
        Self(hasher.finalize())
    }

    /// The raw 32-bit value, as carried on the wire.
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Wraps a value already read off the wire.
    #[must_use]
    pub const fn from_raw(value: u32) -> Self {
        Self(value)
    }
}

/// Incrementally accumulates a checksum across the chunks a `FILE_CHUNK`
/// body arrives in, so the body need not be buffered whole before the last
/// block's checksum is verified against the `DONE` frame.
#[derive(Debug, Default)]
pub struct RunningChecksum(Hasher);

impl RunningChecksum {
    /// Starts a fresh accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self(Hasher::new())
    }

    /// Folds in another slice of bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    /// Finalizes the accumulated checksum.
    #[must_use]
    pub fn finish(self) -> BlockChecksum {
        BlockChecksum(self.0.finalize())
    }
}
