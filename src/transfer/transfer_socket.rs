use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use async_trait::async_trait;
#[cfg(test)] use mockall::automock;
use tokio::net::UdpSocket;
use tracing::trace;

/// This is the datagram I/O a transfer session needs, introduced to facilitate mocking the network
///  away for testing the session state machines
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TransferSocket: Send + Sync + 'static {
    async fn send_datagram(&self, to: SocketAddr, datagram: &[u8]) -> io::Result<()>;

    /// Waits up to `timeout` for the next datagram, returning its length and source. `None`
    ///  means the timeout expired.
    async fn recv_datagram(&self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<(usize, SocketAddr)>>;

    fn local_addr(&self) -> SocketAddr;
}

#[async_trait]
impl TransferSocket for UdpSocket {
    async fn send_datagram(&self, to: SocketAddr, datagram: &[u8]) -> io::Result<()> {
        trace!("UDP socket: sending {} bytes to {:?}", datagram.len(), to);
        self.send_to(datagram, to).await?;
        Ok(())
    }

    async fn recv_datagram(&self, buf: &mut [u8], timeout: Duration) -> io::Result<Option<(usize, SocketAddr)>> {
        match tokio::time::timeout(timeout, self.recv_from(buf)).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    fn local_addr(&self) -> SocketAddr {
        UdpSocket::local_addr(self)
            .expect("UdpSocket should have an initialized local addr")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_udp_recv_times_out() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut buf = [0u8; 16];
        let received = socket.recv_datagram(&mut buf, Duration::from_millis(20)).await.unwrap();
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn test_udp_send_and_recv() {
        let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        a.send_datagram(TransferSocket::local_addr(&b), &[0, 4, 0, 1]).await.unwrap();

        let mut buf = [0u8; 16];
        let (len, from) = b.recv_datagram(&mut buf, Duration::from_secs(5)).await.unwrap().unwrap();
        assert_eq!(&buf[..len], &[0, 4, 0, 1]);
        assert_eq!(from, TransferSocket::local_addr(&a));
    }
}
