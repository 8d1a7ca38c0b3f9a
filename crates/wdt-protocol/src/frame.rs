use crate::error::ProtocolError;
use crate::opcode::Opcode;
use crate::varint::{read_varint, read_vstring, write_varint, write_vstring};
use std::io::{Read, Write};

/// Upper bound on a `FILE_CHUNK` header's declared body length, guarding a
/// receiver against a corrupt or hostile sender requesting an enormous
/// allocation before the body is even read.
pub const MAX_CHUNK_LENGTH: u64 = 256 * 1024 * 1024;

/// The handshake frame (spec §4.1 `SETTINGS`). Sent first by the sender;
/// the receiver replies with one of its own, version-confirmed and with any
/// sender-proposed values it must constrain down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsFrame {
    /// Protocol version this side proposes (sender) or accepts (receiver).
    pub protocol_version: u16,
    /// Opaque identifier of the sending process.
    pub sender_id: String,
    /// Socket read timeout, in milliseconds.
    pub read_timeout_ms: u32,
    /// Socket write timeout, in milliseconds.
    pub write_timeout_ms: u32,
    /// Identifier correlating this connection to one logical transfer.
    pub transfer_id: String,
    /// Whether `FILE_CHUNK` bodies are checksummed.
    pub enable_checksum: bool,
    /// Whether the receiver should report download-resumption info.
    pub enable_download_resumption: bool,
    /// Target size of one `FILE_CHUNK` body.
    pub block_size: u64,
}

/// Header of one `FILE_CHUNK` frame (spec §4.1). The `length`-byte raw body
/// follows immediately on the wire and is read separately by the caller so
/// that large bodies can be streamed straight into a file rather than
/// buffered here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChunkHeader {
    /// Monotonic send-position sequence number, worker-local.
    pub seq: u64,
    /// Global sequence number of the file this chunk belongs to, assigned by
    /// the source queue on first emission (spec §3 `FileMetadata`). Echoed
    /// back in `ACK` so the sender can match a partial ack to the right
    /// in-flight record without depending on path identity alone.
    pub file_seq: u64,
    /// Total size of the file this chunk belongs to, as known by the sender.
    pub file_size: u64,
    /// Byte offset of this chunk within the file.
    pub offset: u64,
    /// Length in bytes of the body that follows.
    pub length: u64,
    /// Reserved bit flags; zero unless a future version defines one.
    pub flags: u32,
    /// Path of the file relative to the transfer root.
    pub relative_path: String,
}

/// One byte range a receiver already holds for a file, used to build
/// [`ChunkInfoEntry::owned_ranges`] for download resumption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnedRange {
    /// Start offset of the owned range.
    pub offset: u64,
    /// Length of the owned range.
    pub length: u64,
}

/// One file's resumption info within a `FILE_CHUNKS_INFO` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfoEntry {
    /// Path of the file relative to the transfer root.
    pub relative_path: String,
    /// Size of the file as already known to the receiver.
    pub size: u64,
    /// Byte ranges the receiver already holds, ascending and non-overlapping.
    pub owned_ranges: Vec<OwnedRange>,
}

/// Receiver-to-sender resumption manifest (spec §4.1 `FILE_CHUNKS_INFO`),
/// sent once at handshake ahead of any `FILE_CHUNK` frames.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FileChunksInfoFrame {
    /// One entry per file the receiver has partial or complete data for.
    pub entries: Vec<ChunkInfoEntry>,
}

/// One file's acknowledgement within an `ACK` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckEntry {
    /// Global sequence number of the file being acknowledged.
    pub file_seq: u64,
    /// Highest worker-local send sequence number persisted so far.
    pub last_persisted_seq: u64,
    /// Byte offset up to which the file has been persisted.
    pub persisted_offset: u64,
}

/// Receiver-to-sender acknowledgement (spec §4.1 `ACK`), batching one entry
/// per file with newly persisted bytes since the last ack on this
/// connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AckFrame {
    /// The per-file acknowledgements carried by this frame.
    pub entries: Vec<AckEntry>,
}

/// Either side's teardown frame (spec §4.1 `ABORT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortFrame {
    /// The sender's `wdt_engine::ErrorCode::exit_code()` value.
    pub error_code: u8,
    /// Protocol version in effect when the abort was raised.
    pub protocol_version: u16,
}

/// Sender's final per-connection frame (spec §4.1 `DONE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoneFrame {
    /// Total number of `FILE_CHUNK` frames sent on this connection.
    pub total_blocks: u64,
    /// Whole-connection checksum, present iff checksumming is enabled.
    pub checksum: Option<u32>,
}

/// In-band, non-fatal per-file error report (spec §4.1 `ERR_CMD`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrCmdFrame {
    /// Path of the affected file, relative to the transfer root.
    pub relative_path: String,
    /// The `wdt_engine::ErrorCode::exit_code()` value describing the issue.
    pub error_code: u8,
}

/// One decoded wire frame, tagged by its [`Opcode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// See [`SettingsFrame`].
    Settings(SettingsFrame),
    /// See [`FileChunkHeader`]. The raw body is read separately.
    FileChunk(FileChunkHeader),
    /// See [`FileChunksInfoFrame`].
    FileChunksInfo(FileChunksInfoFrame),
    /// See [`AckFrame`].
    Ack(AckFrame),
    /// Optional pre-announcement of total transfer size, in bytes.
    SizeCmd(u64),
    /// See [`AbortFrame`].
    Abort(AbortFrame),
    /// See [`DoneFrame`].
    Done(DoneFrame),
    /// Receiver keep-alive; carries no body.
    Wait,
    /// See [`ErrCmdFrame`].
    ErrCmd(ErrCmdFrame),
}

impl Frame {
    /// The opcode this frame encodes as.
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Settings(_) => Opcode::Settings,
            Self::FileChunk(_) => Opcode::FileChunk,
            Self::FileChunksInfo(_) => Opcode::FileChunksInfo,
            Self::Ack(_) => Opcode::Ack,
            Self::SizeCmd(_) => Opcode::SizeCmd,
            Self::Abort(_) => Opcode::Abort,
            Self::Done(_) => Opcode::Done,
            Self::Wait => Opcode::Wait,
            Self::ErrCmd(_) => Opcode::ErrCmd,
        }
    }

    /// Writes the opcode byte and this frame's body to `writer`.
    ///
    /// For [`Frame::FileChunk`], only the header is written; the caller
    /// writes the `length`-byte raw body immediately afterward.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error from `writer`.
    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<(), ProtocolError> {
        writer.write_all(&[self.opcode().to_byte()])?;
        match self {
            Self::Settings(s) => {
                write_varint(writer, u64::from(s.protocol_version))?;
                write_vstring(writer, &s.sender_id)?;
                write_varint(writer, u64::from(s.read_timeout_ms))?;
                write_varint(writer, u64::from(s.write_timeout_ms))?;
                write_vstring(writer, &s.transfer_id)?;
                write_bool(writer, s.enable_checksum)?;
                write_bool(writer, s.enable_download_resumption)?;
                write_varint(writer, s.block_size)?;
            }
            Self::FileChunk(h) => {
                write_varint(writer, h.seq)?;
                write_varint(writer, h.file_seq)?;
                write_varint(writer, h.file_size)?;
                write_varint(writer, h.offset)?;
                write_varint(writer, h.length)?;
                write_varint(writer, u64::from(h.flags))?;
                write_vstring(writer, &h.relative_path)?;
            }
            Self::FileChunksInfo(info) => {
                write_varint(writer, info.entries.len() as u64)?;
                for entry in &info.entries {
                    write_vstring(writer, &entry.relative_path)?;
                    write_varint(writer, entry.size)?;
                    write_varint(writer, entry.owned_ranges.len() as u64)?;
                    for range in &entry.owned_ranges {
                        write_varint(writer, range.offset)?;
                        write_varint(writer, range.length)?;
                    }
                }
            }
            Self::Ack(ack) => {
                write_varint(writer, ack.entries.len() as u64)?;
                for entry in &ack.entries {
                    write_varint(writer, entry.file_seq)?;
                    write_varint(writer, entry.last_persisted_seq)?;
                    write_varint(writer, entry.persisted_offset)?;
                }
            }
            Self::SizeCmd(total) => {
                write_varint(writer, *total)?;
            }
            Self::Abort(a) => {
                writer.write_all(&[a.error_code])?;
                write_varint(writer, u64::from(a.protocol_version))?;
            }
            Self::Done(d) => {
                write_varint(writer, d.total_blocks)?;
                write_bool(writer, d.checksum.is_some())?;
                if let Some(checksum) = d.checksum {
                    write_varint(writer, u64::from(checksum))?;
                }
            }
            Self::Wait => {}
            Self::ErrCmd(e) => {
                write_vstring(writer, &e.relative_path)?;
                writer.write_all(&[e.error_code])?;
            }
        }
        Ok(())
    }

    /// Reads one opcode byte and its body from `reader`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownOpcode`] for an unrecognised opcode
    /// byte, [`ProtocolError::FrameTooLarge`] if a `FILE_CHUNK` header
    /// declares a body past [`MAX_CHUNK_LENGTH`], and propagates any varint,
    /// string, or I/O error encountered decoding the body.
    pub fn decode<R: Read>(reader: &mut R) -> Result<Self, ProtocolError> {
        let mut opcode_byte = [0u8; 1];
        reader.read_exact(&mut opcode_byte)?;
        let opcode = Opcode::try_from(opcode_byte[0])?;

        Ok(match opcode {
            Opcode::Settings => Self::Settings(SettingsFrame {
                protocol_version: read_varint(reader)?.try_into().unwrap_or(u16::MAX),
                sender_id: read_vstring(reader)?,
                read_timeout_ms: read_varint(reader)?.try_into().unwrap_or(u32::MAX),
                write_timeout_ms: read_varint(reader)?.try_into().unwrap_or(u32::MAX),
                transfer_id: read_vstring(reader)?,
                enable_checksum: read_bool(reader)?,
                enable_download_resumption: read_bool(reader)?,
                block_size: read_varint(reader)?,
            }),
            Opcode::FileChunk => {
                let seq = read_varint(reader)?;
                let file_seq = read_varint(reader)?;
                let file_size = read_varint(reader)?;
                let offset = read_varint(reader)?;
                let length = read_varint(reader)?;
                if length > MAX_CHUNK_LENGTH {
                    return Err(ProtocolError::FrameTooLarge(length, MAX_CHUNK_LENGTH));
                }
                let flags = read_varint(reader)?.try_into().unwrap_or(u32::MAX);
                let relative_path = read_vstring(reader)?;
                Self::FileChunk(FileChunkHeader {
                    seq,
                    file_seq,
                    file_size,
                    offset,
                    length,
                    flags,
                    relative_path,
                })
            }
            Opcode::FileChunksInfo => {
                let count = read_varint(reader)?;
                let mut entries = Vec::with_capacity(count.min(4096) as usize);
                for _ in 0..count {
                    let relative_path = read_vstring(reader)?;
                    let size = read_varint(reader)?;
                    let range_count = read_varint(reader)?;
                    let mut owned_ranges = Vec::with_capacity(range_count.min(4096) as usize);
                    for _ in 0..range_count {
                        owned_ranges.push(OwnedRange {
                            offset: read_varint(reader)?,
                            length: read_varint(reader)?,
                        });
                    }
                    entries.push(ChunkInfoEntry {
                        relative_path,
                        size,
                        owned_ranges,
                    });
                }
                Self::FileChunksInfo(FileChunksInfoFrame { entries })
            }
            Opcode::Ack => {
                let count = read_varint(reader)?;
                let mut entries = Vec::with_capacity(count.min(4096) as usize);
                for _ in 0..count {
                    entries.push(AckEntry {
                        file_seq: read_varint(reader)?,
                        last_persisted_seq: read_varint(reader)?,
                        persisted_offset: read_varint(reader)?,
                    });
                }
                Self::Ack(AckFrame { entries })
            }
            Opcode::SizeCmd => Self::SizeCmd(read_varint(reader)?),
            Opcode::Abort => {
                let mut code = [0u8; 1];
                reader.read_exact(&mut code)?;
                Self::Abort(AbortFrame {
                    error_code: code[0],
                    protocol_version: read_varint(reader)?.try_into().unwrap_or(u16::MAX),
                })
            }
            Opcode::Done => {
                let total_blocks = read_varint(reader)?;
                let has_checksum = read_bool(reader)?;
                let checksum = has_checksum
                    .then(|| read_varint(reader).map(|v| v as u32))
                    .transpose()?;
                Self::Done(DoneFrame {
                    total_blocks,
                    checksum,
                })
            }
            Opcode::Wait => Self::Wait,
            Opcode::ErrCmd => {
                let relative_path = read_vstring(reader)?;
                let mut code = [0u8; 1];
                reader.read_exact(&mut code)?;
                Self::ErrCmd(ErrCmdFrame {
                    relative_path,
                    error_code: code[0],
                })
            }
        })
    }
}

fn write_bool<W: Write>(writer: &mut W, value: bool) -> std::io::Result<()> {
    writer.write_all(&[u8::from(value)])
}

fn read_bool<R: Read>(reader: &mut R) -> Result<bool, ProtocolError> {
    let mut byte = [0u8; 1];
    reader.read_exact(&mut byte)?;
    Ok(byte[0] != 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(frame: &Frame) -> Frame {
        let mut buf = Vec::new();
        frame.encode(&mut buf).unwrap();
        let mut cursor = &buf[..];
        Frame::decode(&mut cursor).unwrap()
    }

    #[test]
    fn settings_roundtrips() {
        let frame = Frame::Settings(SettingsFrame {
            protocol_version: 42,
            sender_id: "sender-1".into(),
            read_timeout_ms: 60_000,
            write_timeout_ms: 60_000,
            transfer_id: "xfer-abc".into(),
            enable_checksum: true,
            enable_download_resumption: false,
            block_size: 16 * 1024 * 1024,
        });
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn file_chunk_header_roundtrips() {
        let frame = Frame::FileChunk(FileChunkHeader {
            seq: 7,
            file_seq: 2,
            file_size: 1 << 20,
            offset: 4096,
            length: 4096,
            flags: 0,
            relative_path: "a/b/c.bin".into(),
        });
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn file_chunk_over_max_length_is_rejected() {
        let mut buf = Vec::new();
        buf.push(Opcode::FileChunk.to_byte());
        write_varint(&mut buf, 0).unwrap(); // seq
        write_varint(&mut buf, 0).unwrap(); // file_seq
        write_varint(&mut buf, 0).unwrap(); // file_size
        write_varint(&mut buf, 0).unwrap(); // offset
        write_varint(&mut buf, MAX_CHUNK_LENGTH + 1).unwrap(); // length
        let mut cursor = &buf[..];
        assert!(matches!(
            Frame::decode(&mut cursor),
            Err(ProtocolError::FrameTooLarge(_, _))
        ));
    }

    #[test]
    fn chunks_info_roundtrips_with_empty_and_nonempty_entries() {
        let frame = Frame::FileChunksInfo(FileChunksInfoFrame {
            entries: vec![
                ChunkInfoEntry {
                    relative_path: "empty.txt".into(),
                    size: 0,
                    owned_ranges: vec![],
                },
                ChunkInfoEntry {
                    relative_path: "partial.bin".into(),
                    size: 1000,
                    owned_ranges: vec![
                        OwnedRange {
                            offset: 0,
                            length: 300,
                        },
                        OwnedRange {
                            offset: 700,
                            length: 300,
                        },
                    ],
                },
            ],
        });
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn ack_roundtrips() {
        let frame = Frame::Ack(AckFrame {
            entries: vec![AckEntry {
                file_seq: 3,
                last_persisted_seq: 12,
                persisted_offset: 65536,
            }],
        });
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn size_cmd_roundtrips() {
        assert_eq!(roundtrip(&Frame::SizeCmd(123_456)), Frame::SizeCmd(123_456));
    }

    #[test]
    fn abort_roundtrips() {
        let frame = Frame::Abort(AbortFrame {
            error_code: 9,
            protocol_version: 3,
        });
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn done_roundtrips_with_and_without_checksum() {
        let with = Frame::Done(DoneFrame {
            total_blocks: 10,
            checksum: Some(0xDEAD_BEEF),
        });
        assert_eq!(roundtrip(&with), with);

        let without = Frame::Done(DoneFrame {
            total_blocks: 10,
            checksum: None,
        });
        assert_eq!(roundtrip(&without), without);
    }

    #[test]
    fn wait_roundtrips() {
        assert_eq!(roundtrip(&Frame::Wait), Frame::Wait);
    }

    #[test]
    fn err_cmd_roundtrips() {
        let frame = Frame::ErrCmd(ErrCmdFrame {
            relative_path: "broken.bin".into(),
            error_code: 6,
        });
        assert_eq!(roundtrip(&frame), frame);
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let buf = [Opcode::Settings.to_byte()];
        let mut cursor = &buf[..];
        assert!(Frame::decode(&mut cursor).is_err());
    }
}
