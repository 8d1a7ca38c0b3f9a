use crate::error::ProtocolError;

/// The exhaustive set of frame kinds that can appear on the wire (spec §4.1
/// "Opcodes (exhaustive)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Handshake settings, sent by the sender and echoed by the receiver.
    Settings = 1,
    /// A header describing a range of file bytes, followed by the raw body.
    FileChunk = 2,
    /// Receiver-supplied resumption info, sent at handshake.
    FileChunksInfo = 3,
    /// Receiver acknowledging persisted bytes.
    Ack = 4,
    /// Optional total-size pre-announcement for progress reporting.
    SizeCmd = 5,
    /// Either side tearing the connection down.
    Abort = 6,
    /// Sender's final per-connection frame.
    Done = 7,
    /// Receiver keep-alive while still flushing to disk.
    Wait = 8,
    /// In-band, non-fatal per-file error report.
    ErrCmd = 9,
}

impl Opcode {
    /// The single byte this opcode is written as.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Opcode {
    type Error = ProtocolError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            1 => Ok(Self::Settings),
            2 => Ok(Self::FileChunk),
            3 => Ok(Self::FileChunksInfo),
            4 => Ok(Self::Ack),
            5 => Ok(Self::SizeCmd),
            6 => Ok(Self::Abort),
            7 => Ok(Self::Done),
            8 => Ok(Self::Wait),
            9 => Ok(Self::ErrCmd),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_opcode_roundtrips_through_its_byte() {
        let all = [
            Opcode::Settings,
            Opcode::FileChunk,
            Opcode::FileChunksInfo,
            Opcode::Ack,
            Opcode::SizeCmd,
            Opcode::Abort,
            Opcode::Done,
            Opcode::Wait,
            Opcode::ErrCmd,
        ];
        for op in all {
            assert_eq!(Opcode::try_from(op.to_byte()).unwrap(), op);
        }
    }

    #[test]
    fn unknown_byte_is_rejected() {
        assert!(matches!(
            Opcode::try_from(0),
            Err(ProtocolError::UnknownOpcode(0))
        ));
        assert!(matches!(
            Opcode::try_from(200),
            Err(ProtocolError::UnknownOpcode(200))
        ));
    }
}
