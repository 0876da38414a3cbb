use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use anyhow::bail;

/// Well-known port the server listens on by default. This is not the privileged TFTP port 69, so
///  the server can run without administrator rights.
pub const DEFAULT_PORT: u16 = 1234;

#[derive(Debug, Clone)]
pub struct TftpConfig {
    /// Server: the well-known address that receives requests. Client: only the address family
    ///  matters, the client socket is bound to an ephemeral port.
    pub self_addr: SocketAddr,

    /// Server: directory that requested file names are resolved against. Client: directory that
    ///  local file names are resolved against.
    pub root_dir: PathBuf,

    /// Time to wait for the peer's next packet before the last outstanding packet is re-sent
    pub timeout: Duration,
    /// Number of re-sends of an unanswered packet before a transfer is abandoned
    pub max_retries: u32,

    /// Remove a receiver's output file if the transfer fails after some data was written. Output
    ///  of a transfer that failed before any data arrived is always removed.
    pub remove_partial_output: bool,

    /// After acknowledging the final block, a receiver keeps listening this long and re-acknowledges
    ///  duplicates of the final block, covering the case of a lost final ACK. Zero disables this.
    pub final_ack_linger: Duration,
}

impl TftpConfig {
    pub fn new(self_addr: SocketAddr) -> TftpConfig {
        TftpConfig {
            self_addr,
            root_dir: PathBuf::from("."),
            timeout: Duration::from_secs(5),
            max_retries: 4,
            remove_partial_output: true,
            final_ack_linger: Duration::ZERO,
        }
    }

    pub fn default_server() -> TftpConfig {
        Self::new(SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.timeout.is_zero() {
            bail!("timeout must be greater than zero");
        }
        Ok(())
    }

    /// An ephemeral address on the same interface as `self_addr`, used for per-transfer sockets
    pub fn ephemeral_addr(&self) -> SocketAddr {
        SocketAddr::new(self.self_addr.ip(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TftpConfig::default_server();
        assert_eq!(config.self_addr.port(), 1234);
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = TftpConfig::default_server();
        config.timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ephemeral_addr() {
        let config = TftpConfig::new("127.0.0.1:1234".parse().unwrap());
        assert_eq!(config.ephemeral_addr(), "127.0.0.1:0".parse::<SocketAddr>().unwrap());
    }
}
