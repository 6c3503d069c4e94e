//! Protocol constants and per-transfer tunables.

use std::time::Duration;

/// Number of packets permitted in flight.
pub const WINDOW_SIZE: usize = 10;

/// Sequence number of the subdirectory prelude packet.
pub const SEQ_SUBDIR: u16 = 0;

/// Sequence number of the filename prelude packet.
pub const SEQ_FILENAME: u16 = 1;

/// First sequence number carrying file bytes.
pub const DATA_SEQ_START: u16 = 2;

/// Tunable knobs for one transfer.
///
/// The wire format constants (`MAX_PAYLOAD`, `WINDOW_SIZE`) are fixed at
/// compile time; everything timing-related is adjustable so that tests can
/// run the full loss-recovery machinery at millisecond scale.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Age past which an unacknowledged packet is retransmitted.
    pub retx_timeout: Duration,
    /// Upper bound on one event-loop datagram wait.
    pub poll_interval: Duration,
    /// Retransmissions of a single packet tolerated before the transfer
    /// aborts with `PeerUnreachable`.
    pub max_retransmits: u32,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            retx_timeout: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(100),
            max_retransmits: 100,
        }
    }
}
