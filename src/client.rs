use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, info, span, warn, Instrument, Level};
use uuid::Uuid;
use crate::config::TftpConfig;
use crate::error::TransferError;
use crate::packet::{Packet, MAX_PACKET_LEN};
use crate::transfer::file_transfer::{receive_into_file, send_from_file};
use crate::transfer::peer::PeerEndpoint;
use crate::transfer::session::TransferSession;
use crate::transfer::transfer_socket::TransferSocket;
use crate::transfer::{Direction, TransferSummary};

/// The client side of the protocol. A client runs one transfer at a time (hence `&mut self`),
///  all of them through the same socket.
pub struct TftpClient {
    socket: Arc<UdpSocket>,
    server_addr: SocketAddr,
    config: Arc<TftpConfig>,
}

impl TftpClient {
    /// `server_addr` is the server's well-known address. Local file names are resolved against
    ///  the config's `root_dir`.
    pub async fn new(server_addr: SocketAddr, config: Arc<TftpConfig>) -> anyhow::Result<TftpClient> {
        config.validate()?;

        let bind_addr = if server_addr.is_ipv6() {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        }
        else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        debug!("bound client socket to {:?}", socket.local_addr()?);

        Ok(TftpClient {
            socket: Arc::new(socket),
            server_addr,
            config,
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        TransferSocket::local_addr(self.socket.as_ref())
    }

    /// Reads `filename` from the server into a local file of the same name
    pub async fn request_read(&mut self, filename: &str) -> Result<TransferSummary, TransferError> {
        let local = self.local_path(filename);
        self.read_file(filename, &local).await
    }

    /// Writes the local file `filename` to the server under the same name
    pub async fn request_write(&mut self, filename: &str) -> Result<TransferSummary, TransferError> {
        let local = self.local_path(filename);
        self.write_file(&local, filename).await
    }

    pub async fn read_file(&mut self, remote: &str, local: &Path) -> Result<TransferSummary, TransferError> {
        let request = Packet::read_request(remote)?;
        let span = self.transfer_span(Direction::Read, remote);

        async {
            info!("requesting {:?} from {:?}", remote, self.server_addr);
            let mut session = self.new_session(local);
            let result = receive_into_file(&mut session, local, request, self.config.remove_partial_output).await;
            log_outcome(Direction::Read, &result);
            result
        }.instrument(span).await
    }

    pub async fn write_file(&mut self, local: &Path, remote: &str) -> Result<TransferSummary, TransferError> {
        let request = Packet::write_request(remote)?;
        let span = self.transfer_span(Direction::Write, remote);

        async {
            if !tokio::fs::try_exists(local).await.unwrap_or(false) {
                warn!("local file {:?} does not exist", local);
                return Err(TransferError::FileNotFound(local.to_path_buf()));
            }

            info!("sending {:?} to {:?} as {:?}", local, self.server_addr, remote);
            let mut session = self.new_session(local);
            let result = send_from_file(&mut session, local, Some(request)).await;
            log_outcome(Direction::Write, &result);
            result
        }.instrument(span).await
    }

    fn local_path(&self, filename: &str) -> PathBuf {
        self.config.root_dir.join(filename)
    }

    fn transfer_span(&self, direction: Direction, filename: &str) -> tracing::Span {
        let correlation_id = Uuid::new_v4();
        span!(Level::INFO, "transfer", ?correlation_id, server = ?self.server_addr, %direction, filename = %filename)
    }

    fn new_session(&self, local: &Path) -> TransferSession {
        self.discard_stale_datagrams();
        let socket: Arc<dyn TransferSocket> = self.socket.clone();
        TransferSession::new(socket, PeerEndpoint::pending(self.server_addr), self.config.clone(), local.to_path_buf())
    }

    /// Datagrams still queued from an earlier transfer (e.g. a re-sent final DATA block) must not
    ///  be mistaken for the server's first reply
    fn discard_stale_datagrams(&self) {
        let mut buf = [0u8; MAX_PACKET_LEN + 1];
        while let Ok((len, from)) = self.socket.try_recv_from(&mut buf) {
            debug!("discarding stale datagram of {} bytes from {:?}", len, from);
        }
    }
}

fn log_outcome(direction: Direction, result: &Result<TransferSummary, TransferError>) {
    match result {
        Ok(summary) => info!("{} complete: {}", direction, summary),
        Err(e) => warn!("{} failed: {}", direction, e),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use super::*;

    #[tokio::test]
    async fn test_write_requires_existing_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let silent_server = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let mut config = TftpConfig::new(silent_server.local_addr().unwrap());
        config.root_dir = dir.path().to_path_buf();
        let mut client = TftpClient::new(silent_server.local_addr().unwrap(), Arc::new(config)).await.unwrap();

        let result = client.request_write("nothing_here.txt").await;
        assert!(matches!(result, Err(TransferError::FileNotFound(_))));

        // no request reached the server
        let mut buf = [0u8; 16];
        assert!(tokio::time::timeout(Duration::from_millis(100), silent_server.recv_from(&mut buf)).await.is_err());
    }

    #[tokio::test]
    async fn test_read_from_unresponsive_server_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let silent_server = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let mut config = TftpConfig::new(silent_server.local_addr().unwrap());
        config.root_dir = dir.path().to_path_buf();
        config.timeout = Duration::from_millis(20);
        config.max_retries = 2;
        let mut client = TftpClient::new(silent_server.local_addr().unwrap(), Arc::new(config)).await.unwrap();

        let result = client.request_read("remote.txt").await;
        match result {
            Err(TransferError::EmptyTransfer(cause)) => assert!(matches!(*cause, TransferError::Timeout { attempts: 3 })),
            other => panic!("unexpected result {:?}", other),
        }
        assert!(!dir.path().join("remote.txt").exists());

        // the RRQ was sent and re-sent to the well-known address
        let mut buf = [0u8; 600];
        for _ in 0..3 {
            let (len, from) = silent_server.recv_from(&mut buf).await.unwrap();
            assert_eq!(from.port(), client.local_addr().port());
            assert_eq!(Packet::deser(&buf[..len]).unwrap(), Packet::ReadRequest { filename: "remote.txt".to_string() });
        }
    }

    #[tokio::test]
    async fn test_invalid_remote_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TftpConfig::new(SocketAddr::from((Ipv4Addr::LOCALHOST, 1234)));
        config.root_dir = dir.path().to_path_buf();
        let mut client = TftpClient::new(config.self_addr, Arc::new(config)).await.unwrap();

        let result = client.read_file("a\0b", &dir.path().join("out")).await;
        assert!(matches!(result, Err(TransferError::InvalidFilename(_))));
    }
}
