use crate::error::FileIoError;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Options governing how [`FileCreator`] opens a path the first time it is
/// touched (spec §4.6 "FileCreator").
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateOptions {
    /// Pre-allocate the file to its announced total size on first open.
    pub preallocate: bool,
    /// Open with direct-I/O alignment where the platform supports it.
    pub direct_io: bool,
}

#[derive(Debug)]
struct OpenEntry {
    file: File,
    refcount: AtomicUsize,
}

/// Maps relative paths to open file descriptors, creating parent
/// directories and performing first-touch setup exactly once per path
/// (spec §4.6). Meant to be shared across worker threads as `Arc<Self>`.
#[derive(Debug)]
pub struct FileCreator {
    root: PathBuf,
    open: Mutex<HashMap<PathBuf, Arc<OpenEntry>>>,
}

/// A reference to one file opened through a [`FileCreator`]. Dropping the
/// last outstanding handle for a path closes the underlying descriptor
/// (spec §4.6 "the last writer of a file triggers optional range-sync and
/// close").
pub struct FileHandle {
    path: PathBuf,
    entry: Arc<OpenEntry>,
    creator: Arc<FileCreator>,
}

impl FileHandle {
    /// Writes `buf` at `offset`, the positioned write every [`FileHandle`]
    /// exposes regardless of platform (spec §4.6 "FileWriter").
    ///
    /// # Errors
    ///
    /// Returns [`FileIoError::Io`] if the underlying write fails.
    pub fn write_at(&self, buf: &[u8], offset: u64) -> Result<usize, FileIoError> {
        tracing::debug!(path = %self.path.display(), offset, len = buf.len(), "blocking file write");
        write_at(&self.entry.file, buf, offset).map_err(|e| FileIoError::io(&self.path, e))
    }

    /// Truncates the file to its true final size, undoing any padding a
    /// direct-I/O write applied to the last block (spec §4.6 "truncating to
    /// the true size at close").
    ///
    /// # Errors
    ///
    /// Returns [`FileIoError::Io`] if the underlying truncate fails.
    pub fn truncate_to(&self, len: u64) -> Result<(), FileIoError> {
        self.entry
            .file
            .set_len(len)
            .map_err(|e| FileIoError::io(&self.path, e))
    }

    /// Flushes this file's data to stable storage.
    ///
    /// # Errors
    ///
    /// Returns [`FileIoError::Io`] if the underlying sync fails.
    pub fn sync(&self) -> Result<(), FileIoError> {
        tracing::debug!(path = %self.path.display(), "blocking file sync");
        self.entry
            .file
            .sync_data()
            .map_err(|e| FileIoError::io(&self.path, e))
    }

    /// Path this handle was opened for, relative to the transfer root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileHandle {
    fn drop(&mut self) {
        if self.entry.refcount.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        let mut map = self
            .creator
            .open
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(current) = map.get(&self.path) {
            if Arc::ptr_eq(current, &self.entry) {
                map.remove(&self.path);
            }
        }
    }
}

impl FileCreator {
    /// Creates a file creator rooted at `root`. Relative paths passed to
    /// [`FileCreator::open`] are resolved against this root.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self {
            root: root.into(),
            open: Mutex::new(HashMap::new()),
        })
    }

    /// Opens `relative_path`, creating parent directories and performing
    /// first-touch setup (preallocate, direct-I/O) if this is the first
    /// caller to touch the path. Subsequent calls for the same path share
    /// the same descriptor under a refcount.
    ///
    /// # Errors
    ///
    /// Returns [`FileIoError::PathEscapesRoot`] if `relative_path` contains
    /// `..` components or is absolute, and [`FileIoError::Io`] if directory
    /// creation, file open, or preallocation fails.
    pub fn open(
        self: &Arc<Self>,
        relative_path: &Path,
        total_size: Option<u64>,
        options: CreateOptions,
    ) -> Result<FileHandle, FileIoError> {
        if relative_path.is_absolute()
            || relative_path
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(FileIoError::PathEscapesRoot(relative_path.to_path_buf()));
        }

        let mut map = self
            .open
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if let Some(entry) = map.get(relative_path) {
            entry.refcount.fetch_add(1, Ordering::AcqRel);
            return Ok(FileHandle {
                path: relative_path.to_path_buf(),
                entry: Arc::clone(entry),
                creator: Arc::clone(self),
            });
        }

        let absolute = self.root.join(relative_path);
        if let Some(parent) = absolute.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FileIoError::io(parent, e))?;
        }

        tracing::debug!(path = %relative_path.display(), direct_io = options.direct_io, "blocking first-touch file open");
        let file = open_file(&absolute, options).map_err(|e| FileIoError::io(&absolute, e))?;

        if options.preallocate {
            if let Some(size) = total_size {
                tracing::debug!(path = %relative_path.display(), size, "blocking file preallocate");
                preallocate(&file, size).map_err(|e| FileIoError::io(&absolute, e))?;
            }
        }

        let entry = Arc::new(OpenEntry {
            file,
            refcount: AtomicUsize::new(1),
        });
        map.insert(relative_path.to_path_buf(), Arc::clone(&entry));

        Ok(FileHandle {
            path: relative_path.to_path_buf(),
            entry,
            creator: Arc::clone(self),
        })
    }

    /// Number of distinct paths currently open.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.open
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }
}

#[cfg(unix)]
fn open_file(path: &Path, options: CreateOptions) -> std::io::Result<File> {
    use rustix::fs::{Mode, OFlags};

    let mut flags = OFlags::CREATE | OFlags::WRONLY;
    if options.direct_io {
        flags |= OFlags::DIRECT;
    }
    match rustix::fs::open(path, flags, Mode::from_raw_mode(0o644)) {
        Ok(fd) => Ok(File::from(fd)),
        Err(err) if options.direct_io && err == rustix::io::Errno::INVAL => {
            // Direct I/O unsupported on this filesystem; fall back to a
            // buffered open rather than failing the transfer over it.
            std::fs::OpenOptions::new().create(true).write(true).open(path)
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(not(unix))]
fn open_file(path: &Path, _options: CreateOptions) -> std::io::Result<File> {
    std::fs::OpenOptions::new().create(true).write(true).open(path)
}

#[cfg(unix)]
fn preallocate(file: &File, size: u64) -> std::io::Result<()> {
    use std::os::fd::AsFd;
    rustix::fs::fallocate(file.as_fd(), rustix::fs::FallocateFlags::empty(), 0, size)
        .or_else(|_| file.set_len(size).map_err(std::io::Error::from))
}

#[cfg(not(unix))]
fn preallocate(file: &File, size: u64) -> std::io::Result<()> {
    file.set_len(size)
}

#[cfg(unix)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> std::io::Result<usize> {
    std::os::unix::fs::FileExt::write_at(file, buf, offset)
}

#[cfg(not(unix))]
fn write_at(file: &File, buf: &[u8], offset: u64) -> std::io::Result<usize> {
    use std::io::{Seek, SeekFrom, Write};
    // Non-unix platforms serialize concurrent writers to the same handle;
    // acceptable here since only one worker writes any given byte range.
    let mut file = file.try_clone()?;
    file.seek(SeekFrom::Start(offset))?;
    file.write(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let creator = FileCreator::new(dir.path());
        let handle = creator
            .open(Path::new("a/b/c.bin"), None, CreateOptions::default())
            .unwrap();
        assert!(dir.path().join("a/b").is_dir());
        drop(handle);
    }

    #[test]
    fn path_escaping_root_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let creator = FileCreator::new(dir.path());
        let err = creator
            .open(Path::new("../escape.bin"), None, CreateOptions::default())
            .unwrap_err();
        assert!(matches!(err, FileIoError::PathEscapesRoot(_)));
    }

    #[test]
    fn writes_land_at_the_right_offset() {
        let dir = tempfile::tempdir().unwrap();
        let creator = FileCreator::new(dir.path());
        let handle = creator
            .open(Path::new("f.bin"), None, CreateOptions::default())
            .unwrap();
        handle.write_at(b"world", 5).unwrap();
        handle.write_at(b"hello", 0).unwrap();
        drop(handle);

        let contents = std::fs::read(dir.path().join("f.bin")).unwrap();
        assert_eq!(&contents, b"helloworld");
    }

    #[test]
    fn truncate_trims_padding() {
        let dir = tempfile::tempdir().unwrap();
        let creator = FileCreator::new(dir.path());
        let handle = creator
            .open(Path::new("f.bin"), None, CreateOptions::default())
            .unwrap();
        handle.write_at(&[0u8; 4096], 0).unwrap();
        handle.truncate_to(100).unwrap();
        drop(handle);

        let metadata = std::fs::metadata(dir.path().join("f.bin")).unwrap();
        assert_eq!(metadata.len(), 100);
    }

    #[test]
    fn second_open_shares_the_same_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let creator = FileCreator::new(dir.path());
        let first = creator
            .open(Path::new("shared.bin"), None, CreateOptions::default())
            .unwrap();
        assert_eq!(creator.open_count(), 1);
        let second = creator
            .open(Path::new("shared.bin"), None, CreateOptions::default())
            .unwrap();
        assert_eq!(creator.open_count(), 1);
        drop(first);
        assert_eq!(creator.open_count(), 1);
        drop(second);
        assert_eq!(creator.open_count(), 0);
    }
}
