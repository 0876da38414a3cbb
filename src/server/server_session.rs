use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, warn};
use crate::block_number::BlockNumber;
use crate::config::TftpConfig;
use crate::error::TransferError;
use crate::packet::Packet;
use crate::transfer::file_transfer::{receive_into_file, resolve_path, send_from_file};
use crate::transfer::peer::PeerEndpoint;
use crate::transfer::session::TransferSession;
use crate::transfer::transfer_socket::TransferSocket;
use crate::transfer::{Direction, TransferSummary};

/// Serves one request from `peer` on a freshly bound ephemeral socket. The well-known socket is
///  not touched: all packets of the transfer go through the session's own port.
pub async fn run_server_session(config: Arc<TftpConfig>, peer: SocketAddr, direction: Direction, filename: &str) -> Result<TransferSummary, TransferError> {
    let socket = UdpSocket::bind(config.ephemeral_addr()).await?;
    let socket: Arc<dyn TransferSocket> = Arc::new(socket);
    debug!("session socket bound to {:?}", socket.local_addr());

    serve(socket, config, peer, direction, filename).await
}

async fn serve(socket: Arc<dyn TransferSocket>, config: Arc<TftpConfig>, peer: SocketAddr, direction: Direction, filename: &str) -> Result<TransferSummary, TransferError> {
    let path = match resolve_path(&config.root_dir, filename) {
        Ok(path) => path,
        Err(e) => {
            if let Some(message) = e.message_for_peer() {
                if let Err(send_err) = socket.send_datagram(peer, &Packet::error(message).to_bytes()).await {
                    warn!("error sending ERROR packet to {:?}: {}", peer, send_err);
                }
            }
            return Err(e);
        }
    };

    let remove_partial_output = config.remove_partial_output;
    let mut session = TransferSession::new(socket, PeerEndpoint::bound(peer), config, path.clone());
    match direction {
        Direction::Read => send_from_file(&mut session, &path, None).await,
        Direction::Write => receive_into_file(&mut session, &path, Packet::Ack { block: BlockNumber::ZERO }, remove_partial_output).await,
    }
}
