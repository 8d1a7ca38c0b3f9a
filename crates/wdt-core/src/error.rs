use thiserror::Error;
use wdt_engine::ErrorCode;

/// Everything that can go wrong driving a transfer from `wdt-core`, folding
/// every collaborator crate's error type at the boundary where it crosses
/// into the Sender or Receiver runtime (spec §9 "Error propagation").
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// A frame failed to encode, decode, or negotiate (spec §4.1).
    #[error(transparent)]
    Protocol(#[from] wdt_protocol::ProtocolError),

    /// A destination file could not be created, opened, or written.
    #[error(transparent)]
    FileIo(#[from] wdt_fileio::FileIoError),

    /// The transfer log could not be read or appended.
    #[error(transparent)]
    TransLog(#[from] wdt_translog::TransLogError),

    /// The directory walk or file-list ingestion failed.
    #[error(transparent)]
    Enumerate(#[from] wdt_queue::EnumerateError),

    /// A raw socket operation failed outside of frame encode/decode (bind,
    /// connect, accept, shutdown).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A `connection_url` string did not parse (spec §6 "Connection URL").
    #[error("invalid connection url: {0}")]
    InvalidConnectionUrl(String),

    /// No peer port could be reached for a probe or worker connection.
    #[error("no reachable port on {0}")]
    NoReachablePort(String),

    /// Fewer ports than requested were usable and the caller asked for that
    /// to be treated as fatal (spec §8 scenario 2).
    #[error("bound/reached {bound} of {requested} requested ports")]
    FewerPorts {
        /// Ports requested by the caller.
        requested: usize,
        /// Ports actually bound or reachable.
        bound: usize,
    },
}

impl CoreError {
    /// Maps this error onto the closed [`ErrorCode`] enumeration, the value
    /// a worker escalates its [`wdt_engine::TransferStats`] to (spec §7).
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Protocol(wdt_protocol::ProtocolError::VersionMismatch { .. }) => {
                ErrorCode::VersionMismatch
            }
            Self::Protocol(wdt_protocol::ProtocolError::ChecksumMismatch { .. }) => {
                ErrorCode::ChecksumMismatch
            }
            Self::Protocol(_) => ErrorCode::ProtocolError,
            Self::FileIo(_) => ErrorCode::FileWriteError,
            Self::TransLog(_) => ErrorCode::FileWriteError,
            Self::Enumerate(_) => ErrorCode::FileReadError,
            Self::Io(_) => ErrorCode::ConnError,
            Self::InvalidConnectionUrl(_) => ErrorCode::Error,
            Self::NoReachablePort(_) => ErrorCode::ConnError,
            Self::FewerPorts { .. } => ErrorCode::FewerPorts,
        }
    }
}
