use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;
use tracing::{debug, trace, warn};
use crate::block_number::BlockNumber;
use crate::config::TftpConfig;
use crate::error::TransferError;
use crate::packet::{Packet, BLOCK_SIZE, MAX_PACKET_LEN};
use crate::transfer::peer::{PeerEndpoint, SourceCheck};
use crate::transfer::retry::RetryBudget;
use crate::transfer::transfer_socket::TransferSocket;
use crate::transfer::TransferSummary;

/// A TransferSession drives a single file transfer from start to `Done` or `Failed`, either as
///  the sending or as the receiving side. It exclusively owns its socket endpoint and receive
///  buffer, so concurrent sessions share no mutable state.
///
/// The protocol is lock-step: every DATA block must be acknowledged before the next one is sent.
///  Whichever packet was sent last is 'outstanding', and it is re-sent when the peer does not
///  answer within the configured timeout, up to `max_retries` times.
pub struct TransferSession {
    socket: Arc<dyn TransferSocket>,
    peer: PeerEndpoint,
    config: Arc<TftpConfig>,
    /// the local file, used for error reporting
    file_path: PathBuf,
    retries: RetryBudget,
    /// one byte more than the largest valid packet so that oversized datagrams are detected
    recv_buf: Vec<u8>,
    blocks: u64,
    bytes: u64,
    sha256: Sha256,
}

impl TransferSession {
    pub fn new(socket: Arc<dyn TransferSocket>, peer: PeerEndpoint, config: Arc<TftpConfig>, file_path: PathBuf) -> TransferSession {
        let retries = RetryBudget::new(config.max_retries);
        TransferSession {
            socket,
            peer,
            config,
            file_path,
            retries,
            recv_buf: vec![0u8; MAX_PACKET_LEN + 1],
            blocks: 0,
            bytes: 0,
            sha256: Sha256::default(),
        }
    }

    pub fn peer(&self) -> PeerEndpoint {
        self.peer
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    /// number of DATA blocks that were sent and acknowledged, or received and written
    pub fn blocks_transferred(&self) -> u64 {
        self.blocks
    }

    /// Sends the contents of `reader` as a sequence of DATA blocks. For a client-side write,
    ///  `write_request` is the WRQ that is sent (and re-sent) until the server answers with ACK 0.
    pub async fn send_file<R: AsyncRead + Unpin + Send>(&mut self, reader: &mut R, write_request: Option<Packet>) -> Result<TransferSummary, TransferError> {
        let result = self.do_send_file(reader, write_request).await;
        self.notify_peer_on_failure(result).await
    }

    /// Receives DATA blocks and writes their payload to `writer`. `opening` is the packet that
    ///  starts the exchange: the RRQ for a client-side read, or ACK 0 for a server-side write.
    pub async fn receive_file<W: AsyncWrite + Unpin + Send>(&mut self, writer: &mut W, opening: Packet) -> Result<TransferSummary, TransferError> {
        let result = self.do_receive_file(writer, opening).await;
        self.notify_peer_on_failure(result).await
    }

    /// Best effort - failing to deliver an ERROR packet is logged but does not change the outcome
    pub async fn send_error(&self, message: &str) {
        debug!("sending ERROR to {:?}: {}", self.peer.send_addr(), message);
        if let Err(e) = self.socket.send_datagram(self.peer.send_addr(), &Packet::error(message).to_bytes()).await {
            warn!("error sending ERROR packet to {:?}: {}", self.peer.send_addr(), e);
        }
    }

    async fn notify_peer_on_failure(&self, result: Result<TransferSummary, TransferError>) -> Result<TransferSummary, TransferError> {
        if let Err(e) = &result {
            if let Some(message) = e.message_for_peer() {
                self.send_error(&message).await;
            }
        }
        result
    }

    async fn do_send_file<R: AsyncRead + Unpin + Send>(&mut self, reader: &mut R, write_request: Option<Packet>) -> Result<TransferSummary, TransferError> {
        let mut previous = None;

        if let Some(request) = write_request {
            let outstanding = request.to_bytes();
            self.send_outstanding(&outstanding).await?;
            self.await_ack(&outstanding, BlockNumber::ZERO, None).await?;
            previous = Some(BlockNumber::ZERO);
        }

        let mut block = BlockNumber::FIRST;
        loop {
            let payload = read_block(reader).await
                .map_err(|source| TransferError::FileRead { path: self.file_path.clone(), source })?;
            let is_final = payload.len() < BLOCK_SIZE;

            trace!("sending DATA block {} with {} bytes", block, payload.len());
            let outstanding = Packet::Data { block, payload: payload.clone() }.to_bytes();
            self.send_outstanding(&outstanding).await?;
            self.await_ack(&outstanding, block, previous).await?;
            self.record_block(&payload);

            if is_final {
                return Ok(self.summary());
            }
            previous = Some(block);
            block = block.next();
        }
    }

    async fn await_ack(&mut self, outstanding: &Bytes, expected: BlockNumber, previous: Option<BlockNumber>) -> Result<(), TransferError> {
        loop {
            match self.await_packet(outstanding).await? {
                Packet::Ack { block } if block == expected => {
                    self.retries.reset();
                    return Ok(());
                }
                Packet::Ack { block } if Some(block) == previous => {
                    // re-sending here would duplicate every following block (Sorcerer's Apprentice)
                    debug!("ignoring duplicate ACK for block {}", block);
                }
                Packet::Ack { block } => {
                    return Err(TransferError::ProtocolMismatch { expected, received: block });
                }
                Packet::Error { message } => return Err(TransferError::PeerError(message)),
                other => return Err(TransferError::UnexpectedPacket(other.opcode())),
            }
        }
    }

    async fn do_receive_file<W: AsyncWrite + Unpin + Send>(&mut self, writer: &mut W, opening: Packet) -> Result<TransferSummary, TransferError> {
        let mut outstanding = opening.to_bytes();
        self.send_outstanding(&outstanding).await?;

        let mut expected = BlockNumber::FIRST;
        let mut last_acked: Option<BlockNumber> = None;
        loop {
            match self.await_packet(&outstanding).await? {
                Packet::Data { block, payload } if block == expected => {
                    trace!("received DATA block {} with {} bytes", block, payload.len());
                    let is_final = payload.len() < BLOCK_SIZE;

                    writer.write_all(&payload).await
                        .map_err(|source| TransferError::FileWrite { path: self.file_path.clone(), source })?;
                    if is_final {
                        // the final ACK tells the sender that the file is complete
                        writer.flush().await
                            .map_err(|source| TransferError::FileWrite { path: self.file_path.clone(), source })?;
                    }
                    self.record_block(&payload);

                    outstanding = Packet::Ack { block }.to_bytes();
                    self.send_outstanding(&outstanding).await?;
                    self.retries.reset();
                    last_acked = Some(block);

                    if is_final {
                        self.linger_for_final_duplicates(&outstanding, block).await;
                        return Ok(self.summary());
                    }
                    expected = expected.next();
                }
                Packet::Data { block, .. } if Some(block) == last_acked => {
                    debug!("duplicate DATA block {} - re-acknowledging without writing", block);
                    self.send_outstanding(&outstanding).await?;
                }
                Packet::Data { block, .. } => {
                    return Err(TransferError::ProtocolMismatch { expected, received: block });
                }
                Packet::Error { message } => return Err(TransferError::PeerError(message)),
                other => return Err(TransferError::UnexpectedPacket(other.opcode())),
            }
        }
    }

    /// Waits for the next well-formed packet from the peer, re-sending `outstanding` on timeout.
    ///  Malformed datagrams are dropped, datagrams from foreign endpoints are answered with an
    ///  ERROR packet and otherwise ignored.
    async fn await_packet(&mut self, outstanding: &Bytes) -> Result<Packet, TransferError> {
        loop {
            let received = match self.socket.recv_datagram(&mut self.recv_buf, self.config.timeout).await {
                Ok(x) => x,
                Err(e) if is_transient(&e) => {
                    debug!("transient socket error, continuing to wait: {}", e);
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let (len, from) = match received {
                Some(x) => x,
                None => {
                    if !self.retries.try_consume() {
                        return Err(TransferError::Timeout { attempts: self.retries.attempts() });
                    }
                    debug!("timeout waiting for {:?} - re-sending last packet (attempt {})", self.peer.send_addr(), self.retries.attempts());
                    self.send_outstanding(outstanding).await?;
                    continue;
                }
            };

            if self.peer.check_source(from) == SourceCheck::Foreign {
                warn!("datagram from unknown endpoint {:?} - not part of this transfer", from);
                if let Err(e) = self.socket.send_datagram(from, &Packet::error("Unknown transfer ID").to_bytes()).await {
                    debug!("error replying to {:?}: {}", from, e);
                }
                continue;
            }

            match Packet::deser(&self.recv_buf[..len]) {
                Ok(packet) => {
                    self.peer.bind_to(from);
                    return Ok(packet);
                }
                Err(e) => {
                    debug!("dropping malformed datagram from {:?}: {}", from, e);
                }
            }
        }
    }

    /// Keeps answering duplicates of the final DATA block for a while, in case the final ACK got
    ///  lost and the peer re-sends. The transfer already succeeded, so nothing here can fail it.
    async fn linger_for_final_duplicates(&mut self, final_ack: &Bytes, final_block: BlockNumber) {
        if self.config.final_ack_linger.is_zero() {
            return;
        }

        let deadline = Instant::now() + self.config.final_ack_linger;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return;
            }
            match self.socket.recv_datagram(&mut self.recv_buf, remaining).await {
                Ok(Some((len, from))) => {
                    if self.peer.check_source(from) != SourceCheck::Accepted {
                        continue;
                    }
                    if let Ok(Packet::Data { block, .. }) = Packet::deser(&self.recv_buf[..len]) {
                        if block == final_block {
                            debug!("re-acknowledging duplicate final block {}", block);
                            if let Err(e) = self.socket.send_datagram(self.peer.send_addr(), final_ack).await {
                                debug!("error re-sending final ACK: {}", e);
                            }
                        }
                    }
                }
                Ok(None) => return,
                Err(e) => {
                    debug!("socket error while lingering: {}", e);
                    return;
                }
            }
        }
    }

    async fn send_outstanding(&self, datagram: &Bytes) -> Result<(), TransferError> {
        self.socket.send_datagram(self.peer.send_addr(), datagram).await?;
        Ok(())
    }

    fn record_block(&mut self, payload: &[u8]) {
        self.blocks += 1;
        self.bytes += payload.len() as u64;
        self.sha256.update(payload);
    }

    fn summary(&self) -> TransferSummary {
        TransferSummary {
            peer: self.peer.send_addr(),
            blocks: self.blocks,
            bytes: self.bytes,
            sha256: self.sha256.clone().finalize().into(),
        }
    }
}

/// ICMP 'port unreachable' shows up on some platforms as an error on the next receive, but it
///  does not affect the datagram exchange with the actual peer
fn is_transient(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused | io::ErrorKind::Interrupted)
}

/// Fills a block completely unless the reader is exhausted: a short read from the OS must not be
///  mistaken for the end of the file.
async fn read_block<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Bytes> {
    let mut buf = [0u8; BLOCK_SIZE];
    let mut filled = 0;
    while filled < BLOCK_SIZE {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(Bytes::copy_from_slice(&buf[..filled]))
}
