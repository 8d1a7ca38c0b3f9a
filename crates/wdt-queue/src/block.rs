use crate::metadata::FileMetadata;
use std::sync::Arc;

/// A bounded byte range of one file: the unit of transfer and of ACK
/// granularity (spec GLOSSARY "Block").
///
/// `ByteSource` is cheap to clone: the backing [`FileMetadata`] is
/// reference-counted since many blocks of the same file are in flight
/// simultaneously across different workers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ByteSource {
    file: Arc<FileMetadata>,
    offset: u64,
    length: u64,
}

impl ByteSource {
    /// Constructs a block covering `[offset, offset + length)` of `file`.
    ///
    /// A `length` of zero denotes an empty-file marker (spec §3).
    #[must_use]
    pub fn new(file: Arc<FileMetadata>, offset: u64, length: u64) -> Self {
        Self {
            file,
            offset,
            length,
        }
    }

    /// The file this block belongs to.
    #[must_use]
    pub fn file(&self) -> &Arc<FileMetadata> {
        &self.file
    }

    /// Offset of this block within the file, in bytes.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Length of this block, in bytes. Zero for an empty-file marker.
    #[must_use]
    pub const fn length(&self) -> u64 {
        self.length
    }

    /// The byte immediately past the end of this block.
    #[must_use]
    pub const fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Returns a new block covering the trailing `[offset + consumed, end)`
    /// range of `self`.
    ///
    /// Used by [`crate::TransferHistory`]-adjacent rewind logic (in
    /// `wdt-engine`) to convert a partially-acked in-flight block into the
    /// still-unsent remainder before it is returned to the queue, so already
    /// persisted bytes are never retransmitted (spec §4.5).
    ///
    /// # Panics
    ///
    /// Panics if `consumed` exceeds `self.length()`.
    #[must_use]
    pub fn split_after(&self, consumed: u64) -> Self {
        assert!(consumed <= self.length, "consumed must not exceed length");
        Self {
            file: Arc::clone(&self.file),
            offset: self.offset + consumed,
            length: self.length - consumed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file() -> Arc<FileMetadata> {
        Arc::new(FileMetadata::new("a.bin", Some(100), 0o644, 0))
    }

    #[test]
    fn end_is_offset_plus_length() {
        let block = ByteSource::new(file(), 10, 20);
        assert_eq!(block.end(), 30);
    }

    #[test]
    fn split_after_trims_the_front() {
        let block = ByteSource::new(file(), 0, 64);
        let tail = block.split_after(16);
        assert_eq!(tail.offset(), 16);
        assert_eq!(tail.length(), 48);
        assert_eq!(tail.end(), block.end());
    }

    #[test]
    fn split_after_full_consumption_yields_empty_tail() {
        let block = ByteSource::new(file(), 0, 64);
        let tail = block.split_after(64);
        assert_eq!(tail.length(), 0);
    }

    #[test]
    #[should_panic(expected = "consumed must not exceed length")]
    fn split_after_overflow_panics() {
        let block = ByteSource::new(file(), 0, 64);
        let _ = block.split_after(65);
    }
}
