//! Sender-side sliding window.
//!
//! A fixed ring of `WINDOW_SIZE` in-flight packets indexed by
//! `seq % WINDOW_SIZE`. Each slot carries the packet, its last send time,
//! an acked flag, and a retransmission counter. The window is sans-io: the
//! event loop owns the socket and feeds `Instant`s in, which keeps every
//! state transition deterministic under test.

use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::config::WINDOW_SIZE;
use crate::error::{FileFerryError, Result};
use crate::packet::{Packet, MAX_PAYLOAD};

/// One in-flight packet.
#[derive(Debug, Clone)]
struct Slot {
    packet: Packet,
    last_send: Instant,
    acked: bool,
    retransmits: u32,
}

/// Outcome of processing a positive acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// Newly acknowledged; the window base may have advanced.
    Acked,
    /// Already acknowledged earlier. Benign.
    Duplicate,
    /// Outside `[base, next_seq)`. Benign.
    Stale,
}

/// A packet that exhausted its retransmission budget.
#[derive(Debug, Clone, Copy)]
pub struct GaveUp {
    pub seq: u16,
    pub attempts: u32,
}

/// The sender's in-flight window.
///
/// Invariants: `base <= next_seq <= base + WINDOW_SIZE`, and every sequence
/// in `[base, next_seq)` occupies the slot at `seq % WINDOW_SIZE`.
pub struct SendWindow {
    /// Oldest unacknowledged sequence (window left edge).
    base: u16,
    /// Next sequence number to assign.
    next_seq: u16,
    slots: [Option<Slot>; WINDOW_SIZE],
    /// Sequence of the end-of-file packet, once pushed.
    eof_seq: Option<u16>,
    eof_acked: bool,
}

impl SendWindow {
    pub fn new() -> Self {
        Self {
            base: 0,
            next_seq: 0,
            slots: std::array::from_fn(|_| None),
            eof_seq: None,
            eof_acked: false,
        }
    }

    /// Sequence of the oldest unacknowledged packet.
    pub fn base(&self) -> u16 {
        self.base
    }

    /// Next sequence number to assign.
    pub fn next_seq(&self) -> u16 {
        self.next_seq
    }

    /// Number of unacknowledged packets outstanding.
    pub fn in_flight(&self) -> usize {
        usize::from(self.next_seq - self.base)
    }

    /// Whether another packet may be pushed.
    pub fn has_space(&self) -> bool {
        self.in_flight() < WINDOW_SIZE
    }

    /// Whether every pushed packet has been acknowledged.
    pub fn is_empty(&self) -> bool {
        self.base == self.next_seq
    }

    /// Whether the end-of-file packet has been acknowledged.
    pub fn eof_acked(&self) -> bool {
        self.eof_acked
    }

    /// Assign the next sequence number to `payload` and take a window slot.
    ///
    /// Returns the packet to transmit. The caller transmits it; the slot
    /// keeps a copy for retransmission until acknowledged.
    pub fn push(&mut self, payload: Bytes, now: Instant) -> Result<Packet> {
        if payload.len() > MAX_PAYLOAD {
            return Err(FileFerryError::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        if !self.has_space() {
            return Err(FileFerryError::WindowFull {
                in_flight: self.in_flight(),
            });
        }
        if self.next_seq == u16::MAX {
            // Sequence numbers do not wrap within a transfer.
            return Err(FileFerryError::SequenceExhausted(u16::MAX));
        }

        let packet = Packet::data(self.next_seq, payload);
        self.slots[usize::from(self.next_seq) % WINDOW_SIZE] = Some(Slot {
            packet: packet.clone(),
            last_send: now,
            acked: false,
            retransmits: 0,
        });
        self.next_seq += 1;
        Ok(packet)
    }

    /// Push the end-of-file packet (`data_length == 0`).
    ///
    /// It occupies a window slot and is retransmitted like any other packet;
    /// `eof_acked()` turns true once its acknowledgment arrives.
    pub fn push_eof(&mut self, now: Instant) -> Result<Packet> {
        let packet = self.push(Bytes::new(), now)?;
        self.eof_seq = Some(packet.seq);
        Ok(packet)
    }

    /// Process a positive acknowledgment for `seq`.
    ///
    /// Marks the slot acked and slides the base over every leading acked
    /// slot, clearing them. Duplicate and stale acknowledgments are
    /// reported but change nothing.
    pub fn on_ack(&mut self, seq: u16) -> AckOutcome {
        if seq < self.base || seq >= self.next_seq {
            return AckOutcome::Stale;
        }
        match &mut self.slots[usize::from(seq) % WINDOW_SIZE] {
            Some(slot) if slot.packet.seq == seq => {
                if slot.acked {
                    return AckOutcome::Duplicate;
                }
                slot.acked = true;
            }
            _ => return AckOutcome::Stale,
        }
        if self.eof_seq == Some(seq) {
            self.eof_acked = true;
        }

        while self.base < self.next_seq {
            let idx = usize::from(self.base) % WINDOW_SIZE;
            match &self.slots[idx] {
                Some(slot) if slot.acked => {
                    self.slots[idx] = None;
                    self.base += 1;
                }
                _ => break,
            }
        }
        AckOutcome::Acked
    }

    /// Process a negative acknowledgment for `seq`.
    ///
    /// Returns the packet to retransmit immediately, or `None` when the
    /// sequence is outside the window or already acknowledged.
    pub fn on_nak(&mut self, seq: u16, now: Instant) -> Option<Packet> {
        if seq < self.base || seq >= self.next_seq {
            return None;
        }
        let slot = self.slots[usize::from(seq) % WINDOW_SIZE].as_mut()?;
        if slot.acked {
            return None;
        }
        slot.last_send = now;
        slot.retransmits += 1;
        Some(slot.packet.clone())
    }

    /// Collect every unacked packet whose last send is older than `rto`.
    ///
    /// Each collected packet has its send time reset and its retransmission
    /// counter bumped. A packet that already spent `max_retransmits`
    /// attempts is reported as given up instead; the caller aborts the
    /// transfer.
    pub fn poll_expired(
        &mut self,
        now: Instant,
        rto: Duration,
        max_retransmits: u32,
    ) -> (Vec<Packet>, Option<GaveUp>) {
        let mut expired = Vec::new();
        for seq in self.base..self.next_seq {
            let Some(slot) = self.slots[usize::from(seq) % WINDOW_SIZE].as_mut() else {
                continue;
            };
            if slot.acked || now.duration_since(slot.last_send) < rto {
                continue;
            }
            if slot.retransmits >= max_retransmits {
                return (
                    expired,
                    Some(GaveUp {
                        seq,
                        attempts: slot.retransmits,
                    }),
                );
            }
            slot.last_send = now;
            slot.retransmits += 1;
            expired.push(slot.packet.clone());
        }
        (expired, None)
    }
}

impl Default for SendWindow {
    fn default() -> Self {
        Self::new()
    }
}
