use crate::block::ByteSource;
use crate::metadata::{FileMetadata, SeqAllocator};
use crate::queue::SourceQueue;
use jwalk::WalkDir;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors produced while discovering the files under a transfer root.
#[derive(Debug, Error)]
pub enum EnumerateError {
    /// Walking the directory tree failed (permission denied, ENOENT on a
    /// race-deleted entry, etc).
    #[error("failed to walk {path}: {source}")]
    Walk {
        /// Path the walker was visiting.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// `stat`-ing a discovered regular file failed.
    #[error("failed to stat {path}: {source}")]
    Stat {
        /// Path that could not be statted.
        path: std::path::PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Tells the enumerator which byte ranges of a file the receiver already
/// owns, so resumed transfers do not resend persisted bytes (spec §4.2
/// "Discovery filtering", fed from the receiver's `FILE_CHUNKS_INFO`).
///
/// Implemented by whatever holds the reconciled transfer log on the
/// sender side; `wdt-queue` depends only on this narrow capability, not on
/// the transfer log crate itself, per the "small capability sets instead of
/// a deep hierarchy" design note (spec §9).
pub trait ResumptionFilter: Send + Sync {
    /// Returns the sub-ranges of `[0, total_len)` that still need to be sent
    /// for `relative_path`. An empty vec means the file is already fully
    /// owned by the receiver and should be skipped entirely. The default
    /// implementation treats everything as unsent.
    fn missing_ranges(&self, relative_path: &Path, total_len: u64) -> Vec<(u64, u64)> {
        if total_len == 0 {
            vec![(0, 0)]
        } else {
            vec![(0, total_len)]
        }
    }
}

/// The trivial filter used when download resumption is disabled: nothing is
/// ever considered already-owned.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoResumption;

impl ResumptionFilter for NoResumption {}

/// Splits one file's missing ranges into `block_size`-bounded blocks and
/// pushes them onto `queue`, in increasing offset order (spec §3 invariant
/// on `ByteSource`).
fn emit_file(
    queue: &SourceQueue,
    file: &Arc<FileMetadata>,
    block_size: u64,
    filter: &dyn ResumptionFilter,
) {
    let total_len = file.total_size().unwrap_or(0);
    let missing = filter.missing_ranges(file.relative_path(), total_len);

    if missing.is_empty() {
        tracing::debug!(path = %file.relative_path().display(), "skipping fully-resumed file");
        return;
    }

    for (start, end) in missing {
        if end == start {
            // Empty file: emit a single zero-length marker block.
            queue.push_fresh(ByteSource::new(Arc::clone(file), 0, 0));
            continue;
        }
        let mut offset = start;
        while offset < end {
            let length = block_size.min(end - offset);
            queue.push_fresh(ByteSource::new(Arc::clone(file), offset, length));
            offset += length;
        }
    }
}

/// Walks `root` depth-first in discovery-then-serve mode: every regular file
/// is statted and split into blocks before the queue is closed (spec §4.2).
///
/// Intended to run on its own thread; the queue is closed (and further
/// `get_next_source` calls see end-of-queue once drained) when this function
/// returns, whether it returns `Ok` or `Err`.
pub fn walk_directory(
    root: &Path,
    queue: &SourceQueue,
    block_size: u64,
    seq: &SeqAllocator,
    filter: &dyn ResumptionFilter,
) -> Result<(), EnumerateError> {
    let result = walk_directory_inner(root, queue, block_size, seq, filter);
    queue.close();
    result
}

fn walk_directory_inner(
    root: &Path,
    queue: &SourceQueue,
    block_size: u64,
    seq: &SeqAllocator,
    filter: &dyn ResumptionFilter,
) -> Result<(), EnumerateError> {
    for entry in WalkDir::new(root).sort(true) {
        let entry = entry.map_err(|err| EnumerateError::Walk {
            path: root.to_path_buf(),
            source: std::io::Error::other(err.to_string()),
        })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let absolute = entry.path();
        let relative = absolute.strip_prefix(root).unwrap_or(&absolute).to_path_buf();
        let stat = std::fs::metadata(&absolute).map_err(|source| EnumerateError::Stat {
            path: absolute.clone(),
            source,
        })?;

        let permissions = file_permissions(&stat);
        let file = Arc::new(FileMetadata::new(relative, Some(stat.len()), permissions, seq.next()));
        emit_file(queue, &file, block_size.max(1), filter);
    }
    Ok(())
}

#[cfg(unix)]
fn file_permissions(stat: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    stat.permissions().mode()
}

#[cfg(not(unix))]
fn file_permissions(_stat: &std::fs::Metadata) -> u32 {
    0o644
}

/// Builds the block stream directly from a pre-supplied `(path, size)` list
/// (spec §3 `TransferRequest.file_list`, spec §4.2 "or (b) consumes a
/// pre-supplied file list"), skipping the filesystem walk entirely. Sizes
/// that are `None` are statted relative to `root`.
pub fn enumerate_file_list(
    root: &Path,
    entries: &[(std::path::PathBuf, Option<u64>)],
    queue: &SourceQueue,
    block_size: u64,
    seq: &SeqAllocator,
    filter: &dyn ResumptionFilter,
) -> Result<(), EnumerateError> {
    let result = (|| {
        for (relative, size) in entries {
            let total_size = match size {
                Some(size) => *size,
                None => {
                    let absolute = root.join(relative);
                    std::fs::metadata(&absolute)
                        .map_err(|source| EnumerateError::Stat {
                            path: absolute.clone(),
                            source,
                        })?
                        .len()
                }
            };
            let file = Arc::new(FileMetadata::new(
                relative.clone(),
                Some(total_size),
                0o644,
                seq.next(),
            ));
            emit_file(queue, &file, block_size.max(1), filter);
        }
        Ok(())
    })();
    queue.close();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    #[test]
    fn walks_and_splits_into_blocks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello\n").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.bin"), vec![0xABu8; 3 * 64 * 1024]).unwrap();

        let queue = SourceQueue::new();
        let seq = SeqAllocator::new();
        walk_directory(dir.path(), &queue, 64 * 1024, &seq, &NoResumption).unwrap();

        let mut blocks = Vec::new();
        loop {
            match queue.get_next_source(Duration::from_millis(50)) {
                crate::queue::PollResult::Source(b) => blocks.push(b),
                crate::queue::PollResult::EndOfQueue => break,
                crate::queue::PollResult::Timeout => panic!("queue never closed"),
            }
        }

        let total_bytes: u64 = blocks.iter().map(ByteSource::length).sum();
        assert_eq!(total_bytes, 6 + 3 * 64 * 1024);
        // b.bin split into 3 equal 64KiB blocks.
        let b_blocks: Vec<_> = blocks
            .iter()
            .filter(|b| b.file().relative_path().ends_with("b.bin"))
            .collect();
        assert_eq!(b_blocks.len(), 3);
    }

    #[test]
    fn empty_file_emits_zero_length_marker() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("empty.txt"), []).unwrap();

        let queue = SourceQueue::new();
        let seq = SeqAllocator::new();
        walk_directory(dir.path(), &queue, 64 * 1024, &seq, &NoResumption).unwrap();

        let block = match queue.get_next_source(Duration::from_millis(50)) {
            crate::queue::PollResult::Source(b) => b,
            other => panic!("expected a source, got {other:?}"),
        };
        assert_eq!(block.length(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]
        #[test]
        fn emitted_blocks_partition_the_file_exactly(
            total_len in 0u64..20_000u64,
            block_size in 16u64..5_000u64,
        ) {
            let queue = SourceQueue::new();
            let file = Arc::new(FileMetadata::new("f.bin", Some(total_len), 0o644, 0));
            emit_file(&queue, &file, block_size, &NoResumption);
            queue.close();

            let mut blocks = Vec::new();
            loop {
                match queue.get_next_source(Duration::from_millis(50)) {
                    crate::queue::PollResult::Source(b) => blocks.push(b),
                    crate::queue::PollResult::EndOfQueue => break,
                    crate::queue::PollResult::Timeout => prop_assert!(false, "queue never closed"),
                }
            }

            if total_len == 0 {
                prop_assert_eq!(blocks.len(), 1);
                prop_assert_eq!(blocks[0].length(), 0);
            } else {
                blocks.sort_by_key(ByteSource::offset);
                let mut cursor = 0u64;
                for block in &blocks {
                    prop_assert_eq!(block.offset(), cursor, "gap or overlap before this block");
                    prop_assert!(block.length() > 0);
                    prop_assert!(block.length() <= block_size);
                    cursor = block.end();
                }
                prop_assert_eq!(cursor, total_len);
            }
        }
    }

    #[test]
    fn resumption_filter_skips_owned_ranges() {
        struct HalfOwned;
        impl ResumptionFilter for HalfOwned {
            fn missing_ranges(&self, _path: &Path, total_len: u64) -> Vec<(u64, u64)> {
                vec![(total_len / 2, total_len)]
            }
        }

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), vec![1u8; 1000]).unwrap();

        let queue = SourceQueue::new();
        let seq = SeqAllocator::new();
        walk_directory(dir.path(), &queue, 10_000, &seq, &HalfOwned).unwrap();

        let block = match queue.get_next_source(Duration::from_millis(50)) {
            crate::queue::PollResult::Source(b) => b,
            other => panic!("expected a source, got {other:?}"),
        };
        assert_eq!(block.offset(), 500);
        assert_eq!(block.length(), 500);
    }
}
