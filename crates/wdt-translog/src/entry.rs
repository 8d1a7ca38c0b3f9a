use crate::error::TransLogError;
use std::io::{Read, Write};
use wdt_protocol::{read_varint, read_vstring, write_varint, write_vstring};

/// Format version of this crate's on-disk log layout (spec §4.7: "Bit-exact
/// compatibility with existing logs is a non-goal for a rewrite; the format
/// version in the header gates interpretation").
pub const LOG_FORMAT_VERSION: u32 = 1;

/// Four bytes identifying a file as a transfer log before any version
/// parsing is attempted.
pub const MAGIC: [u8; 4] = *b"WDTL";

/// A frozen snapshot of the settings the log was opened with, recorded once
/// in the header so a resuming receiver can sanity-check it hasn't been
/// pointed at an incompatible configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfigSnapshot {
    /// Target block size in bytes at the time the transfer started.
    pub block_size: u64,
    /// Whether per-block checksumming was enabled.
    pub enable_checksum: bool,
}

/// One entry in the append-only transfer log (spec §3 "TransferLogEntry",
/// §4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferLogEntry {
    /// Written once, first, when the log file is created.
    Header {
        /// On-disk format version.
        format_version: u32,
        /// Opaque identifier of the sender this log is receiving from.
        sender_id: String,
        /// Settings snapshot at transfer start.
        config: LogConfigSnapshot,
    },
    /// A previously logged file no longer matches what's on disk and must
    /// be treated as fully missing on the next resumption attempt.
    FileInvalidated {
        /// Path of the invalidated file, relative to the transfer root.
        relative_path: String,
    },
    /// The sender's view of a file's total size changed mid-transfer.
    FileResized {
        /// Path of the resized file, relative to the transfer root.
        relative_path: String,
        /// The file's new total size.
        new_size: u64,
    },
    /// One block was written and, if enabled, checksum-verified.
    BlockWritten {
        /// Path of the file the block belongs to, relative to the transfer
        /// root.
        relative_path: String,
        /// Worker-local send sequence number of the block.
        seq: u64,
        /// Byte offset of the block within the file.
        offset: u64,
        /// Length of the block in bytes.
        length: u64,
    },
}

const TAG_HEADER: u8 = 0;
const TAG_FILE_INVALIDATED: u8 = 1;
const TAG_FILE_RESIZED: u8 = 2;
const TAG_BLOCK_WRITTEN: u8 = 3;

impl TransferLogEntry {
    /// Writes this entry as a length-prefixed record: a varint byte length
    /// followed by the tagged body, so a reader can skip a truncated or
    /// unrecognized trailing entry without losing the rest of the log.
    ///
    /// # Errors
    ///
    /// Propagates any I/O error from `writer`.
    pub fn encode<W: Write>(&self, writer: &mut W) -> Result<(), TransLogError> {
        let mut body = Vec::new();
        match self {
            Self::Header {
                format_version,
                sender_id,
                config,
            } => {
                body.push(TAG_HEADER);
                write_varint(&mut body, u64::from(*format_version))?;
                write_vstring(&mut body, sender_id)?;
                write_varint(&mut body, config.block_size)?;
                body.push(u8::from(config.enable_checksum));
            }
            Self::FileInvalidated { relative_path } => {
                body.push(TAG_FILE_INVALIDATED);
                write_vstring(&mut body, relative_path)?;
            }
            Self::FileResized {
                relative_path,
                new_size,
            } => {
                body.push(TAG_FILE_RESIZED);
                write_vstring(&mut body, relative_path)?;
                write_varint(&mut body, *new_size)?;
            }
            Self::BlockWritten {
                relative_path,
                seq,
                offset,
                length,
            } => {
                body.push(TAG_BLOCK_WRITTEN);
                write_vstring(&mut body, relative_path)?;
                write_varint(&mut body, *seq)?;
                write_varint(&mut body, *offset)?;
                write_varint(&mut body, *length)?;
            }
        }
        write_varint(writer, body.len() as u64)?;
        writer.write_all(&body)?;
        Ok(())
    }

    /// Reads one length-prefixed entry written by [`TransferLogEntry::encode`].
    ///
    /// Returns `Ok(None)` at a clean end of stream (zero bytes read before
    /// the length prefix); any other short read is a [`TransLogError::Io`].
    ///
    /// # Errors
    ///
    /// Returns [`TransLogError::UnknownTag`] for a corrupt or future tag
    /// byte, and propagates I/O or string-decoding errors otherwise.
    pub fn decode<R: Read>(reader: &mut R) -> Result<Option<Self>, TransLogError> {
        let len = match read_varint(reader) {
            Ok(len) => len,
            Err(wdt_protocol::ProtocolError::Io(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                return Ok(None)
            }
            Err(e) => return Err(e.into()),
        };

        let mut body = vec![0u8; len as usize];
        reader.read_exact(&mut body)?;
        let mut cursor = &body[..];

        let mut tag = [0u8; 1];
        std::io::Read::read_exact(&mut cursor, &mut tag)?;

        let entry = match tag[0] {
            TAG_HEADER => Self::Header {
                format_version: read_varint(&mut cursor)?.try_into().unwrap_or(u32::MAX),
                sender_id: read_vstring(&mut cursor)?,
                config: LogConfigSnapshot {
                    block_size: read_varint(&mut cursor)?,
                    enable_checksum: {
                        let mut b = [0u8; 1];
                        std::io::Read::read_exact(&mut cursor, &mut b)?;
                        b[0] != 0
                    },
                },
            },
            TAG_FILE_INVALIDATED => Self::FileInvalidated {
                relative_path: read_vstring(&mut cursor)?,
            },
            TAG_FILE_RESIZED => Self::FileResized {
                relative_path: read_vstring(&mut cursor)?,
                new_size: read_varint(&mut cursor)?,
            },
            TAG_BLOCK_WRITTEN => Self::BlockWritten {
                relative_path: read_vstring(&mut cursor)?,
                seq: read_varint(&mut cursor)?,
                offset: read_varint(&mut cursor)?,
                length: read_varint(&mut cursor)?,
            },
            other => return Err(TransLogError::UnknownTag(other)),
        };
        Ok(Some(entry))
    }
}
