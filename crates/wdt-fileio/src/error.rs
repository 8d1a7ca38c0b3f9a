use thiserror::Error;

/// Everything that can go wrong creating, reading, or writing a destination
/// file (spec §4.6).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FileIoError {
    /// The underlying filesystem call failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path the failing operation targeted.
        path: std::path::PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A direct-I/O write was attempted with a buffer or offset that is not
    /// aligned to the required block size.
    #[error("unaligned direct I/O: offset {offset} length {length}, alignment {alignment}")]
    Unaligned {
        /// Offset of the attempted write.
        offset: u64,
        /// Length of the attempted write.
        length: usize,
        /// Required alignment in bytes.
        alignment: usize,
    },

    /// A relative path escaped the transfer root (`..` components, or an
    /// absolute path).
    #[error("path escapes transfer root: {0}")]
    PathEscapesRoot(std::path::PathBuf),
}

impl FileIoError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
