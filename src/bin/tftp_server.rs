use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;
use clap_derive::Parser;
use rusttftp::config::{TftpConfig, DEFAULT_PORT};
use rusttftp::server::listener::TftpServer;
use tokio::select;
use tracing::{info, Level};

#[derive(Parser)]
struct Args {
    /// well-known address to listen on for requests
    #[clap(long, default_value_t = SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)))]
    bind: SocketAddr,

    /// directory that requested files are read from and written to
    #[clap(long, default_value = ".")]
    root: PathBuf,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let mut config = TftpConfig::new(args.bind);
    config.root_dir = args.root;

    let server = TftpServer::bind(Arc::new(config)).await?;

    select! {
        _ = server.recv_loop() => { Ok(()) }
        result = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(result?)
        }
    }
}
