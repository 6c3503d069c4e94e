use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FileFerryError, Result};

/// Maximum payload bytes carried by one data packet.
pub const MAX_PAYLOAD: usize = 1024;

/// Header size on the wire: seq(2) + kind(2) + checksum(2) + data_length(2).
pub const HEADER_LEN: usize = 8;

/// Fixed wire length of a data packet: header + full payload region.
///
/// Data packets always occupy the full record; bytes past `data_length` are
/// transmitted but carry no meaning and are excluded from the checksum.
/// ACK/NAK packets are transmitted header-only.
pub const WIRE_LEN: usize = HEADER_LEN + MAX_PAYLOAD;

/// Packet classification carried in the `ack_num` header field.
///
/// Wire values: 0 = data (or prelude/EOF) from the sender, 1 = positive
/// acknowledgment from the receiver, 2 = negative acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PacketKind {
    Data = 0,
    Ack = 1,
    Nak = 2,
}

impl TryFrom<u16> for PacketKind {
    type Error = FileFerryError;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0 => Ok(PacketKind::Data),
            1 => Ok(PacketKind::Ack),
            2 => Ok(PacketKind::Nak),
            other => Err(FileFerryError::UnknownPacketKind(other)),
        }
    }
}

/// FileFerry wire packet.
///
/// Binary layout (header fields big-endian):
///
/// ```text
/// +---------+---------+----------+-------------+-- MAX_PAYLOAD bytes --+
/// | seq_num | ack_num | checksum | data_length | data                  |
/// |  (2B)   |  (2B)   |   (2B)   |    (2B)     | (first data_length    |
/// |         |         |          |             |  bytes significant)   |
/// +---------+---------+----------+-------------+-----------------------+
/// ```
///
/// The checksum is computed over the other three header fields in host byte
/// order plus the significant payload bytes, before byte-order conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub seq: u16,
    pub kind: PacketKind,
    pub payload: Bytes,
}

impl Packet {
    /// Build a data (or prelude, or EOF) packet.
    pub fn data(seq: u16, payload: Bytes) -> Self {
        Self {
            seq,
            kind: PacketKind::Data,
            payload,
        }
    }

    /// Build a positive acknowledgment for `seq`.
    pub fn ack(seq: u16) -> Self {
        Self {
            seq,
            kind: PacketKind::Ack,
            payload: Bytes::new(),
        }
    }

    /// Build a negative acknowledgment for `seq`.
    pub fn nak(seq: u16) -> Self {
        Self {
            seq,
            kind: PacketKind::Nak,
            payload: Bytes::new(),
        }
    }

    /// Compute this packet's checksum.
    pub fn checksum(&self) -> u16 {
        checksum(self.seq, self.kind as u16, self.payload.len() as u16, &self.payload)
    }

    /// Encode this packet into wire bytes.
    ///
    /// Data packets are padded with zeros to the fixed `WIRE_LEN` record;
    /// ACK/NAK packets are emitted header-only.
    pub fn encode(&self) -> Bytes {
        let wire_len = match self.kind {
            PacketKind::Data => WIRE_LEN,
            PacketKind::Ack | PacketKind::Nak => HEADER_LEN,
        };
        let mut buf = BytesMut::with_capacity(wire_len);
        buf.put_u16(self.seq);
        buf.put_u16(self.kind as u16);
        buf.put_u16(self.checksum());
        buf.put_u16(self.payload.len() as u16);
        buf.put_slice(&self.payload);
        if buf.len() < wire_len {
            buf.resize(wire_len, 0);
        }
        buf.freeze()
    }

    /// Decode a packet from a received datagram.
    ///
    /// Accepts any datagram of at least `HEADER_LEN` bytes so that
    /// header-only ACK/NAK datagrams interoperate with full-size records.
    /// Fails when the stated `data_length` exceeds `MAX_PAYLOAD` or overruns
    /// the datagram, when the checksum does not verify, or when the kind
    /// field is unknown.
    pub fn decode(datagram: &[u8]) -> Result<Self> {
        if datagram.len() < HEADER_LEN {
            return Err(FileFerryError::DatagramTooShort {
                expected: HEADER_LEN,
                actual: datagram.len(),
            });
        }

        let mut header = &datagram[..HEADER_LEN];
        let seq = header.get_u16();
        let kind_raw = header.get_u16();
        let claimed = header.get_u16();
        let data_length = header.get_u16() as usize;

        if data_length > MAX_PAYLOAD {
            return Err(FileFerryError::PayloadTooLarge {
                len: data_length,
                max: MAX_PAYLOAD,
            });
        }
        let body = &datagram[HEADER_LEN..];
        if body.len() < data_length {
            return Err(FileFerryError::DatagramTooShort {
                expected: HEADER_LEN + data_length,
                actual: datagram.len(),
            });
        }

        let payload = &body[..data_length];
        let computed = checksum(seq, kind_raw, data_length as u16, payload);
        if claimed != computed {
            return Err(FileFerryError::ChecksumMismatch { claimed, computed });
        }

        Ok(Self {
            seq,
            kind: PacketKind::try_from(kind_raw)?,
            payload: Bytes::copy_from_slice(payload),
        })
    }

    /// Read the raw `seq_num` field without validating the datagram.
    ///
    /// Only trustworthy when the checksum verifies; used by the receiver to
    /// take a best-guess NAK target from a corrupt datagram.
    pub fn peek_seq(datagram: &[u8]) -> Option<u16> {
        let raw = datagram.get(..2)?;
        Some(u16::from_be_bytes([raw[0], raw[1]]))
    }
}

/// One's-complement checksum over the non-checksum header fields (host byte
/// order) and the significant payload bytes.
///
/// 16-bit contributions are accumulated into 32 bits, carries above bit 15
/// are folded back in, and the low 16 bits are complemented.
pub fn checksum(seq: u16, kind: u16, data_length: u16, payload: &[u8]) -> u16 {
    let mut sum = u32::from(seq) + u32::from(kind) + u32::from(data_length);
    for &byte in payload {
        sum += u32::from(byte);
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}
