use std::net::SocketAddr;
use crate::error::TransferError;
use crate::transfer::{Direction, TransferSummary};

pub mod listener;
pub mod server_session;

/// Outcome of one server side transfer, published when the session finishes
#[derive(Debug)]
pub struct TransferReport {
    pub filename: String,
    pub direction: Direction,
    /// the client endpoint that sent the request
    pub peer: SocketAddr,
    pub result: Result<TransferSummary, TransferError>,
}
