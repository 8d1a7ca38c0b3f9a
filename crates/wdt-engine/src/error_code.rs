use std::fmt;

/// The closed set of outcomes a transfer, a connection, or a single block can
/// end in.
///
/// Every fallible operation in the engine ultimately collapses into one of
/// these variants (spec §6/§7). `ErrorCode` doubles as the process exit code:
/// [`ErrorCode::exit_code`] returns the value `wdt-cli` passes to
/// `std::process::exit`.
///
/// Severity is a *separate* axis from the discriminant. [`ErrorCode::worst`]
/// orders codes from "nothing happened" through "a file had a problem but the
/// transfer can route around it" to "the whole transfer must stop", per the
/// `fatal > per-file > ok` rule in spec §7. The mapping from exit-code value
/// to severity rank is this crate's resolution of spec.md's open question
/// about severity ordering (see `DESIGN.md`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorCode {
    /// Nothing went wrong.
    Ok,
    /// Unclassified failure.
    Error,
    /// The operator-requested abort fired.
    Abort,
    /// A worker's TCP connection could not be established or was lost.
    ConnError,
    /// A socket `read` failed or timed out.
    SocketReadError,
    /// A socket `write` failed or timed out.
    SocketWriteError,
    /// A filesystem read failed.
    FileReadError,
    /// A filesystem write failed.
    FileWriteError,
    /// A frame failed to parse, or carried a value outside its valid range.
    ProtocolError,
    /// The sender and receiver could not agree on a protocol version.
    VersionMismatch,
    /// The receiver could not bind the requested number of ports and the
    /// caller asked for that to be treated as fatal.
    FewerPorts,
    /// A received block's checksum did not match the one carried in `DONE`.
    ChecksumMismatch,
    /// The cooperative abort flag was observed and this worker unwound.
    AbortedByApplication,
}

impl ErrorCode {
    /// Returns the process exit code associated with this variant.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::Error => 1,
            Self::Abort => 2,
            Self::ConnError => 3,
            Self::SocketReadError => 4,
            Self::SocketWriteError => 5,
            Self::FileReadError => 6,
            Self::FileWriteError => 7,
            Self::ProtocolError => 8,
            Self::VersionMismatch => 9,
            Self::FewerPorts => 10,
            Self::ChecksumMismatch => 11,
            Self::AbortedByApplication => 12,
        }
    }

    /// Severity rank used by [`ErrorCode::worst`]. Higher is worse.
    const fn severity(self) -> u8 {
        match self {
            Self::Ok => 0,
            Self::ChecksumMismatch => 1,
            Self::FileReadError => 2,
            Self::FileWriteError => 3,
            Self::SocketReadError => 4,
            Self::SocketWriteError => 5,
            Self::ConnError => 6,
            Self::FewerPorts => 7,
            Self::ProtocolError => 8,
            Self::VersionMismatch => 9,
            Self::Error => 10,
            Self::Abort => 11,
            Self::AbortedByApplication => 12,
        }
    }

    /// Combines two error codes, keeping the more severe of the two.
    ///
    /// `TransferReport::summary` folds every per-worker, per-file code
    /// through this function to obtain the single worst code for the whole
    /// transfer (spec §4.3 "Termination").
    #[must_use]
    pub const fn worst(self, other: Self) -> Self {
        if self.severity() >= other.severity() {
            self
        } else {
            other
        }
    }

    /// Folds an iterator of codes into the single worst one, defaulting to
    /// [`ErrorCode::Ok`] for an empty iterator.
    pub fn worst_of<I: IntoIterator<Item = Self>>(codes: I) -> Self {
        codes.into_iter().fold(Self::Ok, Self::worst)
    }

    /// Returns `true` if this code represents successful completion.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "OK",
            Self::Error => "ERROR",
            Self::Abort => "ABORT",
            Self::ConnError => "CONN_ERROR",
            Self::SocketReadError => "SOCKET_READ_ERROR",
            Self::SocketWriteError => "SOCKET_WRITE_ERROR",
            Self::FileReadError => "FILE_READ_ERROR",
            Self::FileWriteError => "FILE_WRITE_ERROR",
            Self::ProtocolError => "PROTOCOL_ERROR",
            Self::VersionMismatch => "VERSION_MISMATCH",
            Self::FewerPorts => "FEWER_PORTS",
            Self::ChecksumMismatch => "CHECKSUM_MISMATCH",
            Self::AbortedByApplication => "ABORTED_BY_APPLICATION",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_picks_fatal_over_per_file() {
        let worst = ErrorCode::worst(ErrorCode::ChecksumMismatch, ErrorCode::VersionMismatch);
        assert_eq!(worst, ErrorCode::VersionMismatch);
    }

    #[test]
    fn worst_picks_per_file_over_ok() {
        assert_eq!(
            ErrorCode::worst(ErrorCode::Ok, ErrorCode::FileWriteError),
            ErrorCode::FileWriteError
        );
    }

    #[test]
    fn worst_is_commutative() {
        for a in ALL {
            for b in ALL {
                assert_eq!(ErrorCode::worst(a, b), ErrorCode::worst(b, a));
            }
        }
    }

    #[test]
    fn worst_of_empty_is_ok() {
        assert_eq!(ErrorCode::worst_of(std::iter::empty()), ErrorCode::Ok);
    }

    #[test]
    fn exit_codes_are_stable() {
        assert_eq!(ErrorCode::Ok.exit_code(), 0);
        assert_eq!(ErrorCode::AbortedByApplication.exit_code(), 12);
    }

    const ALL: [ErrorCode; 13] = [
        ErrorCode::Ok,
        ErrorCode::Error,
        ErrorCode::Abort,
        ErrorCode::ConnError,
        ErrorCode::SocketReadError,
        ErrorCode::SocketWriteError,
        ErrorCode::FileReadError,
        ErrorCode::FileWriteError,
        ErrorCode::ProtocolError,
        ErrorCode::VersionMismatch,
        ErrorCode::FewerPorts,
        ErrorCode::ChecksumMismatch,
        ErrorCode::AbortedByApplication,
    ];
}
