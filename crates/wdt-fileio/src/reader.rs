use crate::direct_io;
use crate::error::FileIoError;
use std::fs::File;
use std::path::Path;

/// Reads one byte range of a source file into a caller-supplied buffer,
/// the sender-side counterpart of [`crate::FileCreator`] (spec §4.6 is
/// framed around the receiver, but the sender needs the same positioned,
/// optionally-aligned read path).
#[derive(Debug)]
pub struct FileByteSource {
    file: File,
}

impl FileByteSource {
    /// Opens `path` read-only for block-range reads.
    ///
    /// # Errors
    ///
    /// Returns [`FileIoError::Io`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self, FileIoError> {
        let file = File::open(path).map_err(|e| FileIoError::io(path, e))?;
        Ok(Self { file })
    }

    /// Reads exactly `length` bytes starting at `offset` into a freshly
    /// allocated buffer.
    ///
    /// # Errors
    ///
    /// Returns [`FileIoError::Io`] if the read is short or fails.
    pub fn read_range(&self, offset: u64, length: u64) -> Result<Vec<u8>, FileIoError> {
        tracing::debug!(offset, length, "blocking file read");
        let mut buf = vec![0u8; length as usize];
        read_at_exact(&self.file, &mut buf, offset)
            .map_err(|e| FileIoError::io(Path::new(""), e))?;
        Ok(buf)
    }

    /// Like [`FileByteSource::read_range`], but pads the result up to the
    /// next [`direct_io::ALIGNMENT`] boundary with zeros, for sending a
    /// final, short block over a direct-I/O destination path.
    ///
    /// # Errors
    ///
    /// Returns [`FileIoError::Io`] if the read is short or fails.
    pub fn read_range_padded(&self, offset: u64, length: u64) -> Result<Vec<u8>, FileIoError> {
        let mut buf = self.read_range(offset, length)?;
        direct_io::pad_to_alignment(&mut buf);
        Ok(buf)
    }
}

#[cfg(unix)]
fn read_at_exact(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    std::os::unix::fs::FileExt::read_exact_at(file, buf, offset)
}

#[cfg(not(unix))]
fn read_at_exact(file: &File, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
    use std::io::{Read, Seek, SeekFrom};
    let mut file = file.try_clone()?;
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(buf)
}
