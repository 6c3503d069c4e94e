//! Sender event loop.
//!
//! Drives a byte source through the unreliable link: keeps the window full,
//! waits up to one poll interval for acknowledgments, retransmits on NAK
//! immediately and on timer expiry otherwise. The loop's only suspension
//! point is the datagram wait.

use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::config::TransferConfig;
use crate::error::{FileFerryError, Result};
use crate::io::ByteSource;
use crate::packet::{Packet, PacketKind, MAX_PAYLOAD, WIRE_LEN};
use crate::window::{AckOutcome, SendWindow};

/// Counters from a completed send.
#[derive(Debug, Default, Clone)]
pub struct SendStats {
    /// File-byte packets transmitted (prelude and EOF excluded).
    pub data_packets: u64,
    /// Retransmissions, whether NAK-triggered or timer-triggered.
    pub retransmits: u64,
    pub naks_received: u64,
    pub duplicate_acks: u64,
    pub stale_acks: u64,
}

/// Send one file to `peer`: prelude, file bytes, then the EOF handshake.
///
/// Returns once the EOF packet is acknowledged. Fails with
/// `PeerUnreachable` when one packet exhausts its retransmission budget,
/// or with `Source` when the byte source fails.
pub async fn send_transfer<S: ByteSource>(
    socket: &UdpSocket,
    peer: SocketAddr,
    subdir: &str,
    filename: &str,
    source: S,
    config: &TransferConfig,
) -> Result<SendStats> {
    FileSender::new(socket, peer, config.clone())
        .run(subdir, filename, source)
        .await
}

/// Sending endpoint of one transfer.
pub struct FileSender<'a> {
    socket: &'a UdpSocket,
    peer: SocketAddr,
    config: TransferConfig,
    window: SendWindow,
    stats: SendStats,
    done_reading: bool,
    eof_sent: bool,
}

impl<'a> FileSender<'a> {
    pub fn new(socket: &'a UdpSocket, peer: SocketAddr, config: TransferConfig) -> Self {
        Self {
            socket,
            peer,
            config,
            window: SendWindow::new(),
            stats: SendStats::default(),
            done_reading: false,
            eof_sent: false,
        }
    }

    pub async fn run<S: ByteSource>(
        mut self,
        subdir: &str,
        filename: &str,
        mut source: S,
    ) -> Result<SendStats> {
        info!(peer = %self.peer, subdir, filename, "starting transfer");

        // Prelude travels under the same window discipline as data; the
        // receiver buffers any data packets that overtake it.
        self.enqueue(Bytes::copy_from_slice(subdir.as_bytes())).await?;
        self.enqueue(Bytes::copy_from_slice(filename.as_bytes())).await?;

        loop {
            self.pump_source(&mut source).await?;
            if self.finished() {
                break;
            }
            self.await_acks().await?;
            self.flush_expired().await?;
        }

        info!(
            packets = self.stats.data_packets,
            retransmits = self.stats.retransmits,
            "transfer complete"
        );
        Ok(self.stats)
    }

    fn finished(&self) -> bool {
        self.done_reading && self.eof_sent && self.window.eof_acked() && self.window.is_empty()
    }

    /// Fill the window from the source; once the source is drained, follow
    /// with the EOF packet.
    async fn pump_source<S: ByteSource>(&mut self, source: &mut S) -> Result<()> {
        while !self.done_reading && self.window.has_space() {
            let chunk = source.read_up_to(MAX_PAYLOAD)?;
            if chunk.is_empty() {
                self.done_reading = true;
                break;
            }
            self.stats.data_packets += 1;
            self.enqueue(chunk).await?;
        }
        if self.done_reading && !self.eof_sent && self.window.has_space() {
            let packet = self.window.push_eof(Instant::now())?;
            self.eof_sent = true;
            debug!(seq = packet.seq, "sending eof");
            self.transmit(&packet).await;
        }
        Ok(())
    }

    async fn enqueue(&mut self, payload: Bytes) -> Result<()> {
        let packet = self.window.push(payload, Instant::now())?;
        trace!(seq = packet.seq, len = packet.payload.len(), "sending");
        self.transmit(&packet).await;
        Ok(())
    }

    /// Wait up to one poll interval for a datagram and process it.
    async fn await_acks(&mut self) -> Result<()> {
        let mut buf = [0u8; WIRE_LEN];
        match timeout(self.config.poll_interval, self.socket.recv_from(&mut buf)).await {
            Err(_elapsed) => Ok(()),
            Ok(Err(err)) => Err(err.into()),
            Ok(Ok((len, from))) => {
                if from != self.peer {
                    trace!(%from, "ignoring datagram from unexpected peer");
                    return Ok(());
                }
                self.handle_datagram(&buf[..len]).await
            }
        }
    }

    async fn handle_datagram(&mut self, datagram: &[u8]) -> Result<()> {
        let packet = match Packet::decode(datagram) {
            Ok(packet) => packet,
            Err(err) => {
                trace!(%err, "discarding undecodable datagram");
                return Ok(());
            }
        };
        match packet.kind {
            PacketKind::Ack => match self.window.on_ack(packet.seq) {
                AckOutcome::Acked => {
                    trace!(seq = packet.seq, base = self.window.base(), "ack");
                }
                AckOutcome::Duplicate => {
                    self.stats.duplicate_acks += 1;
                    trace!(seq = packet.seq, "duplicate ack");
                }
                AckOutcome::Stale => {
                    self.stats.stale_acks += 1;
                    trace!(seq = packet.seq, "stale ack");
                }
            },
            PacketKind::Nak => {
                self.stats.naks_received += 1;
                if let Some(packet) = self.window.on_nak(packet.seq, Instant::now()) {
                    debug!(seq = packet.seq, "retransmitting on nak");
                    self.stats.retransmits += 1;
                    self.transmit(&packet).await;
                }
            }
            PacketKind::Data => {
                trace!(seq = packet.seq, "ignoring data packet from peer");
            }
        }
        Ok(())
    }

    /// Retransmit everything older than the timeout; abort when a packet
    /// has exhausted its budget without acknowledgment progress.
    async fn flush_expired(&mut self) -> Result<()> {
        let (expired, gave_up) = self.window.poll_expired(
            Instant::now(),
            self.config.retx_timeout,
            self.config.max_retransmits,
        );
        if let Some(g) = gave_up {
            warn!(seq = g.seq, attempts = g.attempts, "peer unreachable, aborting");
            return Err(FileFerryError::PeerUnreachable {
                seq: g.seq,
                attempts: g.attempts,
            });
        }
        for packet in &expired {
            debug!(seq = packet.seq, "retransmitting on timeout");
            self.stats.retransmits += 1;
            self.transmit(packet).await;
        }
        Ok(())
    }

    async fn transmit(&self, packet: &Packet) {
        // A failed send is not fatal: the packet stays in the window and the
        // retransmit timer covers it.
        if let Err(err) = self.socket.send_to(&packet.encode(), self.peer).await {
            warn!(seq = packet.seq, %err, "send failed");
        }
    }
}
