//! Receiver event loop.
//!
//! Accepts packets from the first peer that talks to it, acknowledges
//! everything that verifies, NAKs soft-corrupt datagrams, and writes the
//! in-order prefix to the sink until the EOF packet is delivered.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::config::{TransferConfig, SEQ_FILENAME, SEQ_SUBDIR};
use crate::error::{FileFerryError, Result};
use crate::io::{ByteSink, SinkFactory};
use crate::packet::{Packet, PacketKind, WIRE_LEN};
use crate::reorder::{Classification, ReorderBuffer};

/// Counters from a completed receive.
#[derive(Debug, Default, Clone)]
pub struct RecvStats {
    /// Packets accepted into the reorder buffer.
    pub packets_accepted: u64,
    /// Re-acknowledged packets that were already delivered or buffered.
    pub duplicates: u64,
    pub out_of_window: u64,
    pub naks_sent: u64,
    /// File bytes written to the sink.
    pub bytes_written: u64,
}

/// Receive one file: runs until the EOF packet has been delivered in order
/// and acknowledged. Fails with `Sink` on write/open failures.
pub async fn receive_transfer<F: SinkFactory>(
    socket: &UdpSocket,
    factory: &mut F,
    config: &TransferConfig,
) -> Result<RecvStats> {
    FileReceiver::new(socket, config.clone()).run(factory).await
}

/// Receiving endpoint of one transfer.
pub struct FileReceiver<'a> {
    socket: &'a UdpSocket,
    config: TransferConfig,
    reorder: ReorderBuffer,
    stats: RecvStats,
    /// Latched from the first datagram; later strangers are ignored.
    peer: Option<SocketAddr>,
    subdir: Option<String>,
    sink: Option<Box<dyn ByteSink>>,
    finished: bool,
}

impl<'a> FileReceiver<'a> {
    pub fn new(socket: &'a UdpSocket, config: TransferConfig) -> Self {
        Self {
            socket,
            config,
            reorder: ReorderBuffer::new(),
            stats: RecvStats::default(),
            peer: None,
            subdir: None,
            sink: None,
            finished: false,
        }
    }

    pub async fn run<F: SinkFactory>(mut self, factory: &mut F) -> Result<RecvStats> {
        info!("waiting for transfer");
        let mut buf = [0u8; WIRE_LEN];
        while !self.finished {
            let (len, from) =
                match timeout(self.config.poll_interval, self.socket.recv_from(&mut buf)).await {
                    Err(_elapsed) => continue,
                    Ok(Err(err)) => return Err(err.into()),
                    Ok(Ok(received)) => received,
                };
            match self.peer {
                None => {
                    info!(peer = %from, "transfer started");
                    self.peer = Some(from);
                }
                Some(peer) if peer != from => {
                    trace!(%from, "ignoring datagram from unexpected peer");
                    continue;
                }
                _ => {}
            }
            self.handle_datagram(&buf[..len], factory).await?;
        }
        self.absorb_retransmissions(factory).await?;
        info!(bytes = self.stats.bytes_written, "transfer complete");
        Ok(self.stats)
    }

    /// Re-acknowledge retransmissions arriving after the transfer finished.
    ///
    /// The sender keeps retransmitting until it observes the final acks, so
    /// any of those lost in flight would otherwise strand it. Two quiet
    /// retransmit intervals mean the sender has stopped asking.
    async fn absorb_retransmissions<F: SinkFactory>(&mut self, factory: &mut F) -> Result<()> {
        let grace = self.config.retx_timeout * 2 + self.config.poll_interval;
        let mut buf = [0u8; WIRE_LEN];
        loop {
            match timeout(grace, self.socket.recv_from(&mut buf)).await {
                Err(_elapsed) => return Ok(()),
                Ok(Err(err)) => return Err(err.into()),
                Ok(Ok((len, from))) => {
                    if self.peer == Some(from) {
                        self.handle_datagram(&buf[..len], factory).await?;
                    }
                }
            }
        }
    }

    async fn handle_datagram<F: SinkFactory>(
        &mut self,
        datagram: &[u8],
        factory: &mut F,
    ) -> Result<()> {
        let packet = match Packet::decode(datagram) {
            Ok(packet) => packet,
            Err(FileFerryError::ChecksumMismatch { .. }) => {
                // The claimed seq is only a best guess on a corrupt
                // datagram; NAK it when plausibly in window, otherwise the
                // sender's retransmit timer covers the loss.
                if let Some(seq) = Packet::peek_seq(datagram) {
                    if self.reorder.classify(seq) == Classification::InWindow {
                        debug!(seq, "corrupt datagram, sending nak");
                        self.stats.naks_sent += 1;
                        self.send_control(Packet::nak(seq)).await;
                        return Ok(());
                    }
                }
                trace!("dropping corrupt datagram");
                return Ok(());
            }
            Err(err) => {
                trace!(%err, "dropping undecodable datagram");
                return Ok(());
            }
        };

        if packet.kind != PacketKind::Data {
            trace!(seq = packet.seq, kind = ?packet.kind, "ignoring control packet");
            return Ok(());
        }

        let seq = packet.seq;
        match self.reorder.classify(seq) {
            Classification::Duplicate => {
                self.stats.duplicates += 1;
                trace!(seq, "duplicate packet, re-acking");
            }
            Classification::OutOfWindow => {
                self.stats.out_of_window += 1;
                trace!(seq, "packet beyond window, acking anyway");
            }
            Classification::InWindow => {
                if self.reorder.insert(packet) {
                    self.stats.packets_accepted += 1;
                    trace!(seq, expected = self.reorder.expected_seq(), "accepted");
                } else {
                    self.stats.duplicates += 1;
                    trace!(seq, "already buffered, re-acking");
                }
            }
        }
        self.send_control(Packet::ack(seq)).await;

        self.deliver(factory)
    }

    /// Drain the contiguous prefix: latch the prelude, open the sink, write
    /// file bytes, finish on EOF.
    fn deliver<F: SinkFactory>(&mut self, factory: &mut F) -> Result<()> {
        for packet in self.reorder.drain() {
            match packet.seq {
                SEQ_SUBDIR => {
                    let subdir = decode_name(&packet.payload)?;
                    debug!(%subdir, "subdir prelude");
                    self.subdir = Some(subdir);
                }
                SEQ_FILENAME => {
                    let filename = decode_name(&packet.payload)?;
                    let subdir = self.subdir.clone().unwrap_or_default();
                    info!(%subdir, %filename, "opening sink");
                    self.sink = Some(factory.create(&subdir, &filename)?);
                }
                _ if packet.payload.is_empty() => {
                    debug!(seq = packet.seq, "eof delivered");
                    if let Some(mut sink) = self.sink.take() {
                        sink.close()?;
                    }
                    self.finished = true;
                    break;
                }
                _ => {
                    let sink = self.sink.as_mut().ok_or_else(|| {
                        FileFerryError::Internal("data delivered before sink opened".into())
                    })?;
                    sink.write_all(&packet.payload)?;
                    self.stats.bytes_written += packet.payload.len() as u64;
                }
            }
        }
        Ok(())
    }

    async fn send_control(&self, packet: Packet) {
        let Some(peer) = self.peer else { return };
        // Lost acknowledgments are recovered by the sender retransmitting
        // and the receiver re-acking the duplicate.
        if let Err(err) = self.socket.send_to(&packet.encode(), peer).await {
            warn!(seq = packet.seq, %err, "control send failed");
        }
    }
}

fn decode_name(payload: &[u8]) -> Result<String> {
    String::from_utf8(payload.to_vec()).map_err(|_| FileFerryError::InvalidName)
}
