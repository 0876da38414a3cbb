use std::io;
use std::path::PathBuf;
use crate::block_number::BlockNumber;
use crate::packet::{Opcode, PacketError};

/// Reasons for a transfer to end in the `Failed` state
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("access violation: {0}")]
    AccessViolation(String),
    #[error("invalid file name: {0}")]
    InvalidFilename(#[from] PacketError),
    #[error("error reading {path}: {source}")]
    FileRead { path: PathBuf, source: io::Error },
    #[error("error writing {path}: {source}")]
    FileWrite { path: PathBuf, source: io::Error },
    #[error("expected block {expected}, received block {received}")]
    ProtocolMismatch { expected: BlockNumber, received: BlockNumber },
    #[error("unexpected {0:?} packet")]
    UnexpectedPacket(Opcode),
    #[error("no response after {attempts} attempts")]
    Timeout { attempts: u32 },
    #[error("peer reported an error: {0}")]
    PeerError(String),
    #[error("no data received, output removed: {0}")]
    EmptyTransfer(Box<TransferError>),
    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

impl TransferError {
    /// The text of an ERROR packet received from the peer, if that is what ended the transfer
    pub fn peer_message(&self) -> Option<&str> {
        match self {
            TransferError::PeerError(msg) => Some(msg),
            TransferError::EmptyTransfer(cause) => cause.peer_message(),
            _ => None,
        }
    }

    /// The text sent to the peer in an ERROR packet when this error ends a transfer locally. None
    ///  if the peer must not be notified, e.g. because it reported the error itself.
    pub fn message_for_peer(&self) -> Option<String> {
        match self {
            TransferError::FileNotFound(_) => Some("File not found".to_string()),
            TransferError::AccessViolation(msg) => Some(format!("Access violation: {}", msg)),
            TransferError::InvalidFilename(e) => Some(format!("Invalid file name: {}", e)),
            TransferError::FileRead { .. } => Some("Error reading file".to_string()),
            TransferError::FileWrite { .. } => Some("Error writing file".to_string()),
            TransferError::ProtocolMismatch { expected, received } => Some(format!("Expected block {}, got block {}", expected, received)),
            TransferError::UnexpectedPacket(opcode) => Some(format!("Illegal operation: unexpected {:?} packet", opcode)),
            TransferError::Timeout { .. }
            | TransferError::PeerError(_)
            | TransferError::EmptyTransfer(_)
            | TransferError::Io(_) => None,
        }
    }
}
