use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{debug, error, info, span, trace, warn, Instrument, Level};
use uuid::Uuid;
use crate::config::TftpConfig;
use crate::packet::{Packet, MAX_PACKET_LEN};
use crate::server::server_session::run_server_session;
use crate::server::TransferReport;
use crate::transfer::Direction;

/// TftpServer owns the well-known socket. It only ever receives requests there: each RRQ / WRQ
///  is handed to a separately spawned session with its own socket, and the listener immediately
///  goes back to waiting for the next datagram.
pub struct TftpServer {
    socket: UdpSocket,
    config: Arc<TftpConfig>,
    reports: Option<mpsc::Sender<TransferReport>>,
}

impl TftpServer {
    pub async fn bind(config: Arc<TftpConfig>) -> anyhow::Result<TftpServer> {
        config.validate()?;

        let socket = UdpSocket::bind(config.self_addr).await?;
        info!("bound well-known socket to {:?}, serving files from {:?}", socket.local_addr()?, config.root_dir);

        Ok(TftpServer {
            socket,
            config,
            reports: None,
        })
    }

    /// Every finished session publishes a [TransferReport] to `reports`
    pub fn with_reports(mut self, reports: mpsc::Sender<TransferReport>) -> TftpServer {
        self.reports = Some(reports);
        self
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub async fn recv_loop(&self) {
        info!("starting receive loop");

        let mut buf = vec![0u8; MAX_PACKET_LEN + 1];
        loop {
            let (num_read, from) = match self.socket.recv_from(&mut buf).await {
                Ok(x) => x,
                Err(e) => {
                    error!("socket error: {}", e);
                    continue;
                }
            };

            let correlation_id = Uuid::new_v4();
            let span = span!(Level::TRACE, "request_received", ?correlation_id);
            let _entered = span.enter();

            trace!("received datagram from {:?}: {:?}", from, &buf[..num_read]);

            match Packet::deser(&buf[..num_read]) {
                Ok(Packet::ReadRequest { filename }) => self.spawn_session(correlation_id, from, Direction::Read, filename),
                Ok(Packet::WriteRequest { filename }) => self.spawn_session(correlation_id, from, Direction::Write, filename),
                Ok(other) => {
                    warn!("received {:?} packet from {:?} at the well-known port - dropping", other.opcode(), from);
                }
                Err(e) => {
                    debug!("received malformed datagram from {:?}: {} - dropping", from, e);
                }
            }
        }
    }

    fn spawn_session(&self, correlation_id: Uuid, peer: SocketAddr, direction: Direction, filename: String) {
        info!("{} request for {:?} from {:?}", direction, filename, peer);

        let config = self.config.clone();
        let reports = self.reports.clone();
        let span = span!(Level::INFO, "transfer", ?correlation_id, ?peer, %direction, filename = %filename);

        tokio::spawn(async move {
            let result = run_server_session(config, peer, direction, &filename).await;
            match &result {
                Ok(summary) => info!("{} of {:?} complete: {}", direction, filename, summary),
                Err(e) => warn!("{} of {:?} failed: {}", direction, filename, e),
            }

            if let Some(reports) = reports {
                let report = TransferReport { filename, direction, peer, result };
                if reports.send(report).await.is_err() {
                    debug!("report receiver was dropped");
                }
            }
        }.instrument(span));
    }
}
