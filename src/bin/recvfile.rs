//! FileFerry receiver CLI.
//!
//! Binds the given port, accepts one transfer from the first sender that
//! talks to it, and writes `<subdir>/<filename>.recv` under the output root.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::UdpSocket;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fileferry::io::FsSinkFactory;
use fileferry::{receive_transfer, TransferConfig};

/// Receive a file over the FileFerry protocol.
#[derive(Parser, Debug)]
#[command(name = "recvfile", about = "FileFerry receiver")]
struct Cli {
    /// Port to listen on.
    #[arg(short, long)]
    port: u16,

    /// Directory the received file tree is written under.
    #[arg(long, default_value = ".")]
    root: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let socket = UdpSocket::bind(("0.0.0.0", cli.port)).await?;
    let mut factory = FsSinkFactory::new(cli.root);

    let stats = receive_transfer(&socket, &mut factory, &TransferConfig::default()).await?;

    info!(
        packets = stats.packets_accepted,
        duplicates = stats.duplicates,
        bytes = stats.bytes_written,
        "complete"
    );
    Ok(())
}
