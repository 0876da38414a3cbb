use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use anyhow::{anyhow, bail};
use clap::Parser;
use clap_derive::{Parser, ValueEnum};
use rusttftp::client::TftpClient;
use rusttftp::config::TftpConfig;
use tokio::io::{stdin, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::Level;

#[derive(Parser)]
struct Args {
    /// server host name or IP address
    address: String,
    /// the server's well-known port
    port: u16,

    /// operation to perform, prompted for if missing
    #[clap(long, value_enum)]
    op: Option<Operation>,

    /// file name, prompted for if missing
    #[clap(long)]
    file: Option<String>,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Operation {
    Read,
    Write,
}

#[tokio::main]
pub async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { ExitCode::FAILURE } else { ExitCode::SUCCESS };
        }
    };

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::WARN,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init()
        .ok();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let server_addr = resolve(&args.address, args.port).await?;

    let mut lines = BufReader::new(stdin()).lines();
    let op = match args.op {
        Some(op) => op,
        None => prompt_operation(&mut lines).await?,
    };
    let filename = match args.file {
        Some(filename) => filename,
        None => prompt(&mut lines, "Enter the file name: ").await?,
    };

    let mut client = TftpClient::new(server_addr, Arc::new(TftpConfig::new(server_addr))).await?;

    let result = match op {
        Operation::Read => client.request_read(&filename).await,
        Operation::Write => client.request_write(&filename).await,
    };

    match result {
        Ok(summary) => {
            match op {
                Operation::Read => println!("File received: {}", summary),
                Operation::Write => println!("File sent to server: {}", summary),
            }
            Ok(())
        }
        Err(e) => match e.peer_message() {
            Some(message) => bail!("server reported an error: {}", message),
            None => bail!("transfer failed: {}", e),
        },
    }
}

async fn resolve(address: &str, port: u16) -> anyhow::Result<SocketAddr> {
    tokio::net::lookup_host((address, port)).await
        .map_err(|e| anyhow!("cannot resolve {}: {}", address, e))?
        .next()
        .ok_or_else(|| anyhow!("no address found for {}", address))
}

async fn prompt_operation(lines: &mut Lines<BufReader<Stdin>>) -> anyhow::Result<Operation> {
    match prompt(lines, "Enter '1' to read a file or '2' to write a file: ").await?.as_str() {
        "1" | "read" => Ok(Operation::Read),
        "2" | "write" => Ok(Operation::Write),
        other => bail!("invalid operation {:?} - only enter '1' or '2'", other),
    }
}

async fn prompt(lines: &mut Lines<BufReader<Stdin>>, text: &str) -> anyhow::Result<String> {
    println!("{}", text);
    match lines.next_line().await? {
        Some(line) if !line.trim().is_empty() => Ok(line.trim().to_string()),
        _ => bail!("no input"),
    }
}
