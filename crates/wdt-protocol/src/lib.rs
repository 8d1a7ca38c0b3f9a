#![deny(unsafe_code)]
#![deny(missing_docs)]

//! # Overview
//!
//! `wdt-protocol` is the bit-exact wire codec: the [`Opcode`] enumeration,
//! varint and length-prefixed string primitives, the per-opcode [`Frame`]
//! bodies, version negotiation, and the [`BlockChecksum`] wrapper around
//! CRC-32 (spec §4.1).
//!
//! # Design
//!
//! Frames are encoded and decoded against any `Read`/`Write`, not a
//! concrete `TcpStream`, so the round-trip tests in this crate exercise the
//! exact byte layout without opening a socket. `wdt-core` is the only
//! caller that pairs a [`Frame`] with a live connection.
//!
//! `FILE_CHUNK`'s raw body is deliberately excluded from [`Frame`] — callers
//! stream it directly between the socket and the destination file (via
//! `wdt-fileio`) rather than buffering it inside a frame value.
//!
//! # Errors
//!
//! Every decode path returns [`ProtocolError`] rather than panicking; a
//! malformed frame from a peer is routine, not a bug, and is handled as a
//! per-connection failure (spec §4.1 "Failure semantics").

mod checksum;
mod error;
mod frame;
mod opcode;
mod varint;
mod version;

pub use checksum::{BlockChecksum, RunningChecksum};
pub use error::ProtocolError;
pub use frame::{
    AbortFrame, AckEntry, AckFrame, ChunkInfoEntry, DoneFrame, ErrCmdFrame, FileChunkHeader,
    FileChunksInfoFrame, Frame, OwnedRange, SettingsFrame, MAX_CHUNK_LENGTH,
};
pub use opcode::Opcode;
pub use varint::{read_varint, read_vstring, write_varint, write_vstring, MAX_VSTRING_LEN};
pub use version::{is_compatible, negotiate, CURRENT_VERSION};
