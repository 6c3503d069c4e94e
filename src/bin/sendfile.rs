//! FileFerry sender CLI.
//!
//! Transmits one file to a receiver; the file's parent directory travels as
//! the subdirectory prelude so the receiver recreates it.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tokio::net::{lookup_host, UdpSocket};
use tracing::info;
use tracing_subscriber::EnvFilter;

use fileferry::io::FileSource;
use fileferry::{send_transfer, TransferConfig};

/// Send a file over the FileFerry protocol.
#[derive(Parser, Debug)]
#[command(name = "sendfile", about = "FileFerry sender")]
struct Cli {
    /// Receiver hostname or address.
    host: String,

    /// Receiver port.
    port: u16,

    /// File to send, as <subdir>/<filename>; the subdir is recreated on the
    /// receiving side.
    path: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let filename = cli
        .path
        .file_name()
        .context("path names no file")?
        .to_string_lossy()
        .into_owned();
    let subdir = cli
        .path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    let source = FileSource::open(&cli.path)
        .with_context(|| format!("opening {}", cli.path.display()))?;

    let peer = lookup_host((cli.host.as_str(), cli.port))
        .await?
        .next()
        .with_context(|| format!("resolving {}:{}", cli.host, cli.port))?;
    let socket = UdpSocket::bind("0.0.0.0:0").await?;

    let start = Instant::now();
    let stats = send_transfer(
        &socket,
        peer,
        &subdir,
        &filename,
        source,
        &TransferConfig::default(),
    )
    .await?;

    info!(
        packets = stats.data_packets,
        retransmits = stats.retransmits,
        naks = stats.naks_received,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "file transfer completed"
    );
    Ok(())
}
