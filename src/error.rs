use thiserror::Error;

/// All errors produced by the FileFerry transfer engine.
#[derive(Debug, Error)]
pub enum FileFerryError {
    #[error("datagram too short: expected at least {expected} bytes, got {actual}")]
    DatagramTooShort { expected: usize, actual: usize },

    #[error("payload length {len} exceeds maximum {max}")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("checksum mismatch: header claims 0x{claimed:04x}, computed 0x{computed:04x}")]
    ChecksumMismatch { claimed: u16, computed: u16 },

    #[error("unknown packet kind: {0}")]
    UnknownPacketKind(u16),

    #[error("send window full: {in_flight} packets in flight")]
    WindowFull { in_flight: usize },

    #[error("sequence space exhausted: transfer exceeds {0} packets")]
    SequenceExhausted(u16),

    #[error("peer unreachable: packet {seq} retransmitted {attempts} times without progress")]
    PeerUnreachable { seq: u16, attempts: u32 },

    #[error("transfer metadata is not valid UTF-8")]
    InvalidName,

    #[error("filename prelude is empty")]
    MissingFilename,

    #[error("path {0:?} escapes the receive root")]
    UnsafePath(String),

    #[error("source read failed: {0}")]
    Source(#[source] std::io::Error),

    #[error("sink write failed: {0}")]
    Sink(#[source] std::io::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, FileFerryError>;
