use thiserror::Error;

/// Everything that can go wrong decoding or negotiating the wire protocol.
///
/// Per spec §4.1 "Failure semantics", any of these is fatal for the
/// connection that produced it; the caller is expected to set the
/// connection-level error code, return its in-flight sources to the queue,
/// and exit the worker. It does not by itself abort the whole transfer.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The underlying stream failed or closed mid-frame.
    #[error("protocol I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A varint ran past the maximum encodable length for a `u64` without a
    /// terminating byte.
    #[error("varint exceeds maximum length")]
    VarintTooLong,

    /// A length-prefixed string declared a length larger than
    /// [`crate::varint::MAX_VSTRING_LEN`].
    #[error("string length {0} exceeds maximum")]
    StringTooLong(u64),

    /// A length-prefixed string's bytes were not valid UTF-8.
    #[error("string is not valid UTF-8")]
    InvalidUtf8,

    /// The leading opcode byte did not match any known [`crate::Opcode`].
    #[error("unknown opcode byte {0}")]
    UnknownOpcode(u8),

    /// A frame's declared body length exceeds the configured safety cap.
    #[error("frame body length {0} exceeds maximum {1}")]
    FrameTooLarge(u64, u64),

    /// The sender and receiver could not agree on a protocol version (spec
    /// §4.1 "Version negotiation").
    #[error("version mismatch: proposed {proposed}, peer requires {required}")]
    VersionMismatch {
        /// The version this side proposed.
        proposed: u16,
        /// The version the peer insists on.
        required: u16,
    },

    /// A `FILE_CHUNK` body's checksum did not match the `DONE` frame's
    /// recorded checksum for that file (spec §4.1 "Checksum").
    #[error("checksum mismatch: expected {expected:#010x}, computed {actual:#010x}")]
    ChecksumMismatch {
        /// Checksum carried in the `DONE` frame.
        expected: u32,
        /// Checksum computed over the bytes actually received.
        actual: u32,
    },
}
