use std::fmt::{Display, Formatter};
use std::net::SocketAddr;

pub mod peer;
pub mod retry;
pub mod session;
pub mod file_transfer;
pub mod transfer_socket;

/// Direction of a transfer as seen from the side that sent the request
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Direction {
    /// RRQ: the server sends, the client receives
    Read,
    /// WRQ: the client sends, the server receives
    Write,
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Read => write!(f, "read"),
            Direction::Write => write!(f, "write"),
        }
    }
}

/// Outcome of a successful transfer
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TransferSummary {
    pub peer: SocketAddr,
    pub blocks: u64,
    pub bytes: u64,
    /// SHA-256 of the bytes that were transferred
    pub sha256: [u8; 32],
}

impl TransferSummary {
    pub fn sha256_hex(&self) -> String {
        self.sha256.iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

impl Display for TransferSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} bytes in {} blocks with {} (sha256 {})", self.bytes, self.blocks, self.peer, self.sha256_hex())
    }
}
