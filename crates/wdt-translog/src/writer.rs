use crate::entry::{TransferLogEntry, MAGIC};
use crate::error::TransLogError;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// How often [`TransferLogWriter`] fsyncs after appending, per spec §4.7
/// "Entries are written and fsynced at configurable granularity (per-block
/// or per-file)".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncGranularity {
    /// Fsync after every appended entry.
    PerBlock,
    /// Fsync only when the caller calls [`TransferLogWriter::finish_file`].
    PerFile,
}

/// Single-writer append handle for one receiver's transfer log (spec §4.7,
/// §5 "only the transfer-log-writer thread appends").
#[derive(Debug)]
pub struct TransferLogWriter {
    file: File,
    granularity: SyncGranularity,
}

impl TransferLogWriter {
    /// Creates a new transfer log at `path`, writing the magic bytes and
    /// `header` immediately.
    ///
    /// # Errors
    ///
    /// Returns [`TransLogError::Io`] if the file cannot be created or
    /// written.
    pub fn create(
        path: &Path,
        header: &TransferLogEntry,
        granularity: SyncGranularity,
    ) -> Result<Self, TransLogError> {
        let mut file = File::create(path)?;
        file.write_all(&MAGIC)?;
        header.encode(&mut file)?;
        file.sync_all()?;
        Ok(Self { file, granularity })
    }

    /// Opens an existing transfer log for further appends, positioned at
    /// end of file. Used when a receiver resumes mid-transfer rather than
    /// starting a fresh log.
    ///
    /// # Errors
    ///
    /// Returns [`TransLogError::Io`] if the file cannot be opened.
    pub fn append_to_existing(
        path: &Path,
        granularity: SyncGranularity,
    ) -> Result<Self, TransLogError> {
        let file = std::fs::OpenOptions::new().append(true).open(path)?;
        Ok(Self { file, granularity })
    }

    /// Appends `entry`, fsyncing immediately if `granularity` is
    /// [`SyncGranularity::PerBlock`].
    ///
    /// # Errors
    ///
    /// Returns [`TransLogError::Io`] if the write or sync fails.
    pub fn append(&mut self, entry: &TransferLogEntry) -> Result<(), TransLogError> {
        entry.encode(&mut self.file)?;
        if self.granularity == SyncGranularity::PerBlock {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Fsyncs the log, intended to be called once a file's last block has
    /// been appended when running with [`SyncGranularity::PerFile`].
    ///
    /// # Errors
    ///
    /// Returns [`TransLogError::Io`] if the sync fails.
    pub fn finish_file(&mut self) -> Result<(), TransLogError> {
        self.file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::LogConfigSnapshot;
    use crate::reader::read_all_entries;

    fn header() -> TransferLogEntry {
        TransferLogEntry::Header {
            format_version: crate::entry::LOG_FORMAT_VERSION,
            sender_id: "s".into(),
            config: LogConfigSnapshot {
                block_size: 4096,
                enable_checksum: true,
            },
        }
    }

    #[test]
    fn created_log_starts_with_magic_and_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        TransferLogWriter::create(&path, &header(), SyncGranularity::PerBlock).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..4], b"WDTL");
    }

    #[test]
    fn appended_entries_are_readable_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log");
        let mut writer =
            TransferLogWriter::create(&path, &header(), SyncGranularity::PerFile).unwrap();
        writer
            .append(&TransferLogEntry::BlockWritten {
                relative_path: "a.bin".into(),
                seq: 0,
                offset: 0,
                length: 10,
            })
            .unwrap();
        writer.finish_file().unwrap();
        drop(writer);

        let entries = read_all_entries(&path).unwrap();
        assert_eq!(entries.len(), 2);
    }
}
