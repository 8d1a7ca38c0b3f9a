use std::collections::HashMap;
use std::path::Path;
use wdt_protocol::{ChunkInfoEntry, FileChunksInfoFrame, OwnedRange};
use wdt_queue::ResumptionFilter;
use wdt_translog::OwnedRanges;

/// Sender-side [`ResumptionFilter`] built from a receiver's `FILE_CHUNKS_INFO`
/// frame (spec §4.2 "Discovery filtering"): inverts the receiver's owned
/// ranges into the still-missing ranges the enumerator should emit.
#[derive(Debug, Default)]
pub struct ChunksInfoFilter {
    owned_by_path: HashMap<String, Vec<(u64, u64)>>,
}

impl ChunksInfoFilter {
    /// Builds a filter from the frame the receiver sent at handshake.
    #[must_use]
    pub fn from_frame(frame: &FileChunksInfoFrame) -> Self {
        let mut owned_by_path = HashMap::with_capacity(frame.entries.len());
        for entry in &frame.entries {
            let ranges = entry
                .owned_ranges
                .iter()
                .map(|r| (r.offset, r.length))
                .collect();
            owned_by_path.insert(entry.relative_path.clone(), ranges);
        }
        Self { owned_by_path }
    }
}

impl ResumptionFilter for ChunksInfoFilter {
    fn missing_ranges(&self, relative_path: &Path, total_len: u64) -> Vec<(u64, u64)> {
        let Some(owned) = self.owned_by_path.get(&relative_path.to_string_lossy().into_owned())
        else {
            return if total_len == 0 { vec![(0, 0)] } else { vec![(0, total_len)] };
        };

        let mut missing = Vec::new();
        let mut cursor = 0u64;
        for &(offset, length) in owned {
            if offset > cursor {
                missing.push((cursor, offset));
            }
            cursor = cursor.max(offset + length);
        }
        if cursor < total_len {
            missing.push((cursor, total_len));
        }
        missing
    }
}

/// Builds the receiver's `FILE_CHUNKS_INFO` frame from the reconciled,
/// disk-verified transfer log (spec §4.7 "Resumption on fresh start").
#[must_use]
pub fn build_chunks_info_frame(reconciled: &HashMap<String, OwnedRanges>) -> FileChunksInfoFrame {
    let entries = reconciled
        .iter()
        .map(|(relative_path, ranges)| ChunkInfoEntry {
            relative_path: relative_path.clone(),
            size: ranges.ranges().last().map_or(0, |&(offset, length)| offset + length),
            owned_ranges: ranges
                .ranges()
                .iter()
                .map(|&(offset, length)| OwnedRange { offset, length })
                .collect(),
        })
        .collect();
    FileChunksInfoFrame { entries }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unseen_path_is_entirely_missing() {
        let filter = ChunksInfoFilter::default();
        assert_eq!(filter.missing_ranges(Path::new("a.bin"), 100), vec![(0, 100)]);
    }

    #[test]
    fn owned_middle_range_leaves_two_gaps() {
        let frame = FileChunksInfoFrame {
            entries: vec![ChunkInfoEntry {
                relative_path: "a.bin".into(),
                size: 100,
                owned_ranges: vec![OwnedRange { offset: 40, length: 20 }],
            }],
        };
        let filter = ChunksInfoFilter::from_frame(&frame);
        assert_eq!(
            filter.missing_ranges(Path::new("a.bin"), 100),
            vec![(0, 40), (60, 100)]
        );
    }

    #[test]
    fn fully_owned_file_has_no_missing_ranges() {
        let frame = FileChunksInfoFrame {
            entries: vec![ChunkInfoEntry {
                relative_path: "a.bin".into(),
                size: 100,
                owned_ranges: vec![OwnedRange { offset: 0, length: 100 }],
            }],
        };
        let filter = ChunksInfoFilter::from_frame(&frame);
        assert!(filter.missing_ranges(Path::new("a.bin"), 100).is_empty());
    }
}
