use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use crate::block_number::BlockNumber;

/// Maximum number of payload bytes in a single DATA packet. A shorter payload ends the transfer.
pub const BLOCK_SIZE: usize = 512;
/// Opcode (2 bytes) + block number (2 bytes)
pub const DATA_HEADER_LEN: usize = 4;
pub const MAX_PACKET_LEN: usize = DATA_HEADER_LEN + BLOCK_SIZE;

const OPCODE_LEN: usize = 2;
const ACK_LEN: usize = 4;
/// text fields (file names, error messages) fill the rest of the datagram after the opcode
pub const MAX_TEXT_LEN: usize = MAX_PACKET_LEN - OPCODE_LEN;

/// Only the low byte of the 16 bit opcode field is significant.
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
pub enum Opcode {
    ReadRequest = 1,
    WriteRequest = 2,
    Data = 3,
    Ack = 4,
    Error = 5,
}

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PacketError {
    #[error("datagram of {len} bytes is too short for a {opcode:?} packet")]
    TooShort { opcode: Option<Opcode>, len: usize },
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("ACK packet must have exactly 4 bytes, was {0}")]
    AckLength(usize),
    #[error("DATA payload of {0} bytes exceeds the block size of 512")]
    PayloadTooLarge(usize),
    #[error("file name is not valid UTF-8")]
    FilenameNotUtf8,
    #[error("file name must not be empty")]
    EmptyFilename,
    #[error("file name must not contain a NUL byte")]
    FilenameContainsNul,
    #[error("file name of {0} bytes does not fit into a single packet")]
    FilenameTooLong(usize),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Packet {
    ReadRequest { filename: String },
    WriteRequest { filename: String },
    Data { block: BlockNumber, payload: Bytes },
    Ack { block: BlockNumber },
    Error { message: String },
}

impl Packet {
    pub fn read_request(filename: &str) -> Result<Packet, PacketError> {
        Self::check_filename(filename)?;
        Ok(Packet::ReadRequest { filename: filename.to_string() })
    }

    pub fn write_request(filename: &str) -> Result<Packet, PacketError> {
        Self::check_filename(filename)?;
        Ok(Packet::WriteRequest { filename: filename.to_string() })
    }

    pub fn error(message: impl Into<String>) -> Packet {
        Packet::Error { message: message.into() }
    }

    fn check_filename(filename: &str) -> Result<(), PacketError> {
        if filename.is_empty() {
            return Err(PacketError::EmptyFilename);
        }
        if filename.as_bytes().contains(&0) {
            return Err(PacketError::FilenameContainsNul);
        }
        if filename.len() > MAX_TEXT_LEN {
            return Err(PacketError::FilenameTooLong(filename.len()));
        }
        Ok(())
    }

    pub fn opcode(&self) -> Opcode {
        match self {
            Packet::ReadRequest { .. } => Opcode::ReadRequest,
            Packet::WriteRequest { .. } => Opcode::WriteRequest,
            Packet::Data { .. } => Opcode::Data,
            Packet::Ack { .. } => Opcode::Ack,
            Packet::Error { .. } => Opcode::Error,
        }
    }

    pub fn serialized_len(&self) -> usize {
        match self {
            Packet::ReadRequest { filename } | Packet::WriteRequest { filename } => OPCODE_LEN + filename.len(),
            Packet::Data { payload, .. } => DATA_HEADER_LEN + payload.len(),
            Packet::Ack { .. } => ACK_LEN,
            Packet::Error { message } => OPCODE_LEN + truncated_text(message).len(),
        }
    }

    pub fn ser(&self, buf: &mut BytesMut) {
        let opcode: u8 = self.opcode().into();
        buf.put_u16(opcode as u16);

        match self {
            Packet::ReadRequest { filename } | Packet::WriteRequest { filename } => {
                buf.put_slice(filename.as_bytes());
            }
            Packet::Data { block, payload } => {
                debug_assert!(payload.len() <= BLOCK_SIZE);
                buf.put_u16(block.to_raw());
                buf.put_slice(payload);
            }
            Packet::Ack { block } => {
                buf.put_u16(block.to_raw());
            }
            Packet::Error { message } => {
                buf.put_slice(truncated_text(message).as_bytes());
            }
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.serialized_len());
        self.ser(&mut buf);
        buf.freeze()
    }

    /// Parses a single datagram. `datagram` must be exactly the bytes the transport reported as
    ///  received - trailing buffer space must be sliced off by the caller.
    pub fn deser(datagram: &[u8]) -> Result<Packet, PacketError> {
        if datagram.len() < OPCODE_LEN {
            return Err(PacketError::TooShort { opcode: None, len: datagram.len() });
        }

        let mut buf = datagram;
        let raw_opcode = (buf.get_u16() & 0xff) as u8;
        let opcode = Opcode::try_from_primitive(raw_opcode)
            .map_err(|_| PacketError::UnknownOpcode(raw_opcode))?;

        match opcode {
            Opcode::ReadRequest => Ok(Packet::ReadRequest { filename: Self::deser_filename(buf)? }),
            Opcode::WriteRequest => Ok(Packet::WriteRequest { filename: Self::deser_filename(buf)? }),
            Opcode::Data => {
                if buf.remaining() < 2 {
                    return Err(PacketError::TooShort { opcode: Some(opcode), len: datagram.len() });
                }
                let block = BlockNumber::from_raw(buf.get_u16());
                if buf.remaining() > BLOCK_SIZE {
                    return Err(PacketError::PayloadTooLarge(buf.remaining()));
                }
                Ok(Packet::Data {
                    block,
                    payload: Bytes::copy_from_slice(buf),
                })
            }
            Opcode::Ack => {
                if datagram.len() != ACK_LEN {
                    return Err(PacketError::AckLength(datagram.len()));
                }
                Ok(Packet::Ack { block: BlockNumber::from_raw(buf.get_u16()) })
            }
            Opcode::Error => Ok(Packet::Error {
                message: String::from_utf8_lossy(up_to_nul(buf)).into_owned(),
            }),
        }
    }

    fn deser_filename(buf: &[u8]) -> Result<String, PacketError> {
        // RFC 1350 clients append "\0mode\0" - everything after the first NUL is ignored
        let raw = up_to_nul(buf);
        let filename = std::str::from_utf8(raw)
            .map_err(|_| PacketError::FilenameNotUtf8)?;
        Ok(filename.to_string())
    }
}

fn up_to_nul(buf: &[u8]) -> &[u8] {
    match buf.iter().position(|&b| b == 0) {
        Some(idx) => &buf[..idx],
        None => buf,
    }
}

fn truncated_text(text: &str) -> &str {
    if text.len() <= MAX_TEXT_LEN {
        return text;
    }
    let mut end = MAX_TEXT_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
