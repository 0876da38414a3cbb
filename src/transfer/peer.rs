use std::net::SocketAddr;
use tracing::debug;

/// The remote end of a transfer. Each side of a transfer talks from its own ephemeral port, so
///  the port a request was sent to is not the port replies come from: the client learns the
///  server session's port from the first reply, and never talks to the well-known port again.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PeerEndpoint {
    /// No packet received yet - outbound packets go to the address the request was sent to
    Pending { request_addr: SocketAddr },
    /// Fixed for the rest of the session
    Bound(SocketAddr),
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SourceCheck {
    Accepted,
    /// The datagram came from some other endpoint and must not influence the session
    Foreign,
}

impl PeerEndpoint {
    pub fn pending(request_addr: SocketAddr) -> PeerEndpoint {
        PeerEndpoint::Pending { request_addr }
    }

    pub fn bound(addr: SocketAddr) -> PeerEndpoint {
        PeerEndpoint::Bound(addr)
    }

    pub fn send_addr(&self) -> SocketAddr {
        match *self {
            PeerEndpoint::Pending { request_addr } => request_addr,
            PeerEndpoint::Bound(addr) => addr,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, PeerEndpoint::Bound(_))
    }

    pub fn check_source(&self, from: SocketAddr) -> SourceCheck {
        match *self {
            PeerEndpoint::Pending { .. } => SourceCheck::Accepted,
            PeerEndpoint::Bound(addr) if addr == from => SourceCheck::Accepted,
            PeerEndpoint::Bound(_) => SourceCheck::Foreign,
        }
    }

    /// One-shot: binds a pending peer to the source of the first packet received. A bound peer
    ///  stays unchanged.
    pub fn bind_to(&mut self, from: SocketAddr) {
        if let PeerEndpoint::Pending { request_addr } = *self {
            debug!("learned peer endpoint {:?} (request was sent to {:?})", from, request_addr);
            *self = PeerEndpoint::Bound(from);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    #[test]
    fn test_pending_binds_to_first_source() {
        let mut peer = PeerEndpoint::pending(addr(1234));
        assert_eq!(peer.send_addr(), addr(1234));
        assert_eq!(peer.check_source(addr(40000)), SourceCheck::Accepted);

        peer.bind_to(addr(40000));
        assert!(peer.is_bound());
        assert_eq!(peer.send_addr(), addr(40000));

        assert_eq!(peer.check_source(addr(40000)), SourceCheck::Accepted);
        assert_eq!(peer.check_source(addr(1234)), SourceCheck::Foreign);
        assert_eq!(peer.check_source(addr(40001)), SourceCheck::Foreign);
    }

    #[test]
    fn test_bound_is_never_rebound() {
        let mut peer = PeerEndpoint::bound(addr(5000));
        peer.bind_to(addr(6000));
        assert_eq!(peer, PeerEndpoint::Bound(addr(5000)));
    }
}
