use crate::entry::{TransferLogEntry, MAGIC};
use crate::error::TransLogError;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Reads every entry out of the transfer log at `path`, including the
/// header, in on-disk order.
///
/// # Errors
///
/// Returns [`TransLogError::BadMagic`] if the file doesn't start with
/// [`crate::MAGIC`], and propagates any I/O or decoding error.
pub fn read_all_entries(path: &Path) -> Result<Vec<TransferLogEntry>, TransLogError> {
    let mut file = std::fs::File::open(path)?;
    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(TransLogError::BadMagic);
    }

    let mut entries = Vec::new();
    while let Some(entry) = TransferLogEntry::decode(&mut file)? {
        entries.push(entry);
    }
    Ok(entries)
}

/// Ascending, non-overlapping byte ranges a receiver already holds for one
/// file, reconciled from `block-written` log entries (spec §4.7
/// "reconciles block-written entries into per-file owned-range sets").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedRanges {
    ranges: Vec<(u64, u64)>,
}

impl OwnedRanges {
    /// The reconciled ranges as `(offset, length)` pairs, ascending.
    #[must_use]
    pub fn ranges(&self) -> &[(u64, u64)] {
        &self.ranges
    }

    /// Total bytes covered across all ranges.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.ranges.iter().map(|(_, len)| len).sum()
    }

    fn insert(&mut self, offset: u64, length: u64) {
        if length == 0 {
            return;
        }
        self.ranges.push((offset, length));
        self.ranges.sort_unstable_by_key(|&(offset, _)| offset);

        let mut merged: Vec<(u64, u64)> = Vec::with_capacity(self.ranges.len());
        for &(offset, length) in &self.ranges {
            let end = offset + length;
            match merged.last_mut() {
                Some((last_offset, last_len)) if offset <= *last_offset + *last_len => {
                    let last_end = *last_offset + *last_len;
                    if end > last_end {
                        *last_len = end - *last_offset;
                    }
                }
                _ => merged.push((offset, length)),
            }
        }
        self.ranges = merged;
    }

    fn truncate_to(&mut self, new_size: u64) {
        self.ranges.retain(|&(offset, _)| offset < new_size);
        if let Some(last) = self.ranges.last_mut() {
            let end = last.0 + last.1;
            if end > new_size {
                last.1 = new_size - last.0;
            }
        }
    }
}

/// Folds a transfer log's entries into one [`OwnedRanges`] set per file,
/// honoring `file-invalidated` (drops all prior ranges) and `file-resized`
/// (truncates ranges past the new size) in log order.
#[must_use]
pub fn reconcile(entries: &[TransferLogEntry]) -> HashMap<String, OwnedRanges> {
    let mut by_file: HashMap<String, OwnedRanges> = HashMap::new();
    for entry in entries {
        match entry {
            TransferLogEntry::Header { .. } => {}
            TransferLogEntry::FileInvalidated { relative_path } => {
                by_file.remove(relative_path);
            }
            TransferLogEntry::FileResized {
                relative_path,
                new_size,
            } => {
                if let Some(ranges) = by_file.get_mut(relative_path) {
                    ranges.truncate_to(*new_size);
                }
            }
            TransferLogEntry::BlockWritten {
                relative_path,
                offset,
                length,
                ..
            } => {
                by_file
                    .entry(relative_path.clone())
                    .or_default()
                    .insert(*offset, *length);
            }
        }
    }
    by_file
}

/// Drops any file whose on-disk size disagrees with what the log believes
/// it persisted, per spec §4.7 "Files whose on-disk size or mtime
/// disagrees with the log are marked invalidated and their ranges
/// dropped."
///
/// Mtime comparison is not implemented: the log format does not snapshot a
/// baseline mtime per file, so this checks size only, which still catches
/// the common case (truncated or replaced destination file) this guard
/// exists for.
#[must_use]
pub fn filter_against_disk(
    root: &Path,
    reconciled: HashMap<String, OwnedRanges>,
) -> HashMap<String, OwnedRanges> {
    reconciled
        .into_iter()
        .filter(|(relative_path, ranges)| {
            let Ok(metadata) = std::fs::metadata(root.join(relative_path)) else {
                return false;
            };
            let expected_end = ranges
                .ranges()
                .last()
                .map_or(0, |&(offset, length)| offset + length);
            metadata.len() >= expected_end
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(path: &str, offset: u64, length: u64) -> TransferLogEntry {
        TransferLogEntry::BlockWritten {
            relative_path: path.into(),
            seq: 0,
            offset,
            length,
        }
    }

    #[test]
    fn adjacent_blocks_merge_into_one_range() {
        let entries = vec![block("a.bin", 0, 10), block("a.bin", 10, 10)];
        let reconciled = reconcile(&entries);
        let ranges = &reconciled["a.bin"];
        assert_eq!(ranges.ranges(), &[(0, 20)]);
    }

    #[test]
    fn gapped_blocks_stay_separate() {
        let entries = vec![block("a.bin", 0, 10), block("a.bin", 100, 10)];
        let reconciled = reconcile(&entries);
        let ranges = &reconciled["a.bin"];
        assert_eq!(ranges.ranges(), &[(0, 10), (100, 10)]);
    }

    #[test]
    fn invalidation_clears_prior_ranges() {
        let entries = vec![
            block("a.bin", 0, 10),
            TransferLogEntry::FileInvalidated {
                relative_path: "a.bin".into(),
            },
        ];
        let reconciled = reconcile(&entries);
        assert!(!reconciled.contains_key("a.bin"));
    }

    #[test]
    fn resize_truncates_trailing_range() {
        let entries = vec![
            block("a.bin", 0, 100),
            TransferLogEntry::FileResized {
                relative_path: "a.bin".into(),
                new_size: 50,
            },
        ];
        let reconciled = reconcile(&entries);
        assert_eq!(reconciled["a.bin"].ranges(), &[(0, 50)]);
    }

    #[test]
    fn disk_filter_drops_files_smaller_than_logged() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), [0u8; 5]).unwrap();

        let mut reconciled = HashMap::new();
        let mut ranges = OwnedRanges::default();
        ranges.insert(0, 10);
        reconciled.insert("a.bin".to_string(), ranges);

        let filtered = filter_against_disk(dir.path(), reconciled);
        assert!(!filtered.contains_key("a.bin"));
    }

    #[test]
    fn disk_filter_keeps_files_matching_or_exceeding_logged_size() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.bin"), [0u8; 10]).unwrap();

        let mut reconciled = HashMap::new();
        let mut ranges = OwnedRanges::default();
        ranges.insert(0, 10);
        reconciled.insert("a.bin".to_string(), ranges);

        let filtered = filter_against_disk(dir.path(), reconciled);
        assert!(filtered.contains_key("a.bin"));
    }
}
