use thiserror::Error;

/// Everything that can go wrong reading or writing a transfer log (spec
/// §4.7).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransLogError {
    /// The underlying file failed to read, write, or sync.
    #[error("transfer log I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record's tag byte did not match any known entry kind.
    #[error("unknown transfer log entry tag {0}")]
    UnknownTag(u8),

    /// The first four bytes of the log did not match [`crate::MAGIC`].
    #[error("not a transfer log: bad magic")]
    BadMagic,

    /// The log's header declared a format version newer than this build
    /// understands.
    #[error("unsupported transfer log format version {0}")]
    UnsupportedFormatVersion(u32),
}

impl From<wdt_protocol::ProtocolError> for TransLogError {
    fn from(err: wdt_protocol::ProtocolError) -> Self {
        match err {
            wdt_protocol::ProtocolError::Io(e) => Self::Io(e),
            other => Self::Io(std::io::Error::other(other.to_string())),
        }
    }
}
