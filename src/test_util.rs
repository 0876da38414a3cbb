use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use bytes::Bytes;
use crate::block_number::BlockNumber;
use crate::config::TftpConfig;
use crate::packet::Packet;
use crate::transfer::transfer_socket::{MockTransferSocket, TransferSocket};

/// Datagrams sent through a scripted socket, in order
pub type Sent = Arc<Mutex<Vec<(SocketAddr, Vec<u8>)>>>;

pub fn test_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// A mocked socket replaying `incoming` on successive receive calls. `None` entries and an
///  exhausted script both simulate a timeout. Everything sent is recorded.
pub fn scripted_socket(incoming: Vec<Option<(SocketAddr, Vec<u8>)>>) -> (Arc<dyn TransferSocket>, Sent) {
    let sent: Sent = Default::default();
    let mut socket = MockTransferSocket::new();

    let sent_clone = sent.clone();
    socket.expect_send_datagram()
        .returning(move |to, datagram| {
            sent_clone.lock().unwrap().push((to, datagram.to_vec()));
            Ok(())
        });

    let mut incoming: VecDeque<_> = incoming.into();
    socket.expect_recv_datagram()
        .returning(move |buf, _timeout| {
            match incoming.pop_front().flatten() {
                Some((from, datagram)) => {
                    buf[..datagram.len()].copy_from_slice(&datagram);
                    Ok(Some((datagram.len(), from)))
                }
                None => Ok(None),
            }
        });
    socket.expect_local_addr()
        .return_const(test_addr(50000));

    (Arc::new(socket), sent)
}

pub fn sent_packets(sent: &Sent) -> Vec<(SocketAddr, Packet)> {
    sent.lock().unwrap().iter()
        .map(|(to, d)| (*to, Packet::deser(d).unwrap()))
        .collect()
}

pub fn test_config(max_retries: u32) -> Arc<TftpConfig> {
    let mut config = TftpConfig::new(test_addr(1234));
    config.timeout = Duration::from_millis(10);
    config.max_retries = max_retries;
    Arc::new(config)
}

pub fn data_datagram(block: u16, payload: &[u8]) -> Vec<u8> {
    Packet::Data { block: BlockNumber::from_raw(block), payload: Bytes::copy_from_slice(payload) }.to_bytes().to_vec()
}

pub fn ack_datagram(block: u16) -> Vec<u8> {
    Packet::Ack { block: BlockNumber::from_raw(block) }.to_bytes().to_vec()
}

/// deterministic file content that differs between neighbouring blocks
pub fn test_content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
