use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Assigns globally unique, monotonically increasing sequence numbers to
/// files as the enumerator discovers them (spec §3 "FileMetadata").
#[derive(Debug, Default)]
pub struct SeqAllocator {
    next: AtomicU64,
}

impl SeqAllocator {
    /// Creates an allocator starting at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
        }
    }

    /// Returns the next sequence number, never repeating one already handed
    /// out by this allocator.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// One file under the transfer root: its relative path, size, permissions,
/// and the sequence number the enumerator assigned it on first emission.
///
/// `FileMetadata` is immutable once constructed; `total_size` is only `None`
/// for the brief window between discovering a directory entry and
/// successfully `stat`-ing it (spec §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    relative_path: PathBuf,
    total_size: Option<u64>,
    permissions: u32,
    seq: u64,
}

impl FileMetadata {
    /// Constructs file metadata with a freshly allocated sequence number.
    pub fn new(relative_path: impl Into<PathBuf>, total_size: Option<u64>, permissions: u32, seq: u64) -> Self {
        Self {
            relative_path: relative_path.into(),
            total_size,
            permissions,
            seq,
        }
    }

    /// The path relative to the transfer's directory root.
    #[must_use]
    pub fn relative_path(&self) -> &Path {
        &self.relative_path
    }

    /// Total file size in bytes, if known.
    #[must_use]
    pub const fn total_size(&self) -> Option<u64> {
        self.total_size
    }

    /// Unix-style permission bits captured at enumeration time.
    #[must_use]
    pub const fn permissions(&self) -> u32 {
        self.permissions
    }

    /// The sequence number assigned to this file on first emission.
    ///
    /// Unique and monotonic in emission order for the lifetime of one
    /// transfer (spec §3 invariant on `FileMetadata`).
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// Returns `true` if this file has zero bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total_size == Some(0)
    }
}
