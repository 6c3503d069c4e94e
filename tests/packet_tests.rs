//! Wire codec round-trip and corruption-detection tests.

use bytes::Bytes;
use fileferry::packet::{checksum, Packet, PacketKind, HEADER_LEN, MAX_PAYLOAD, WIRE_LEN};

#[test]
fn data_packet_roundtrip() {
    let packet = Packet::data(7, Bytes::from_static(b"hello world"));
    let encoded = packet.encode();
    let decoded = Packet::decode(&encoded).unwrap();
    assert_eq!(packet, decoded);
}

#[test]
fn full_payload_roundtrip() {
    let packet = Packet::data(2, Bytes::from(vec![0xA5; MAX_PAYLOAD]));
    let decoded = Packet::decode(&packet.encode()).unwrap();
    assert_eq!(packet, decoded);
}

#[test]
fn empty_payload_roundtrip() {
    // EOF-shaped: a data packet with no payload.
    let packet = Packet::data(42, Bytes::new());
    let decoded = Packet::decode(&packet.encode()).unwrap();
    assert_eq!(packet, decoded);
    assert!(decoded.payload.is_empty());
}

#[test]
fn ack_and_nak_roundtrip() {
    for packet in [Packet::ack(9), Packet::nak(3)] {
        let decoded = Packet::decode(&packet.encode()).unwrap();
        assert_eq!(packet, decoded);
    }
}

#[test]
fn data_wire_length_is_fixed() {
    // Data packets occupy the full record regardless of payload size.
    assert_eq!(Packet::data(0, Bytes::new()).encode().len(), WIRE_LEN);
    assert_eq!(
        Packet::data(0, Bytes::from_static(b"short")).encode().len(),
        WIRE_LEN
    );
    assert_eq!(
        Packet::data(0, Bytes::from(vec![1; MAX_PAYLOAD])).encode().len(),
        WIRE_LEN
    );
}

#[test]
fn control_packets_are_header_only() {
    assert_eq!(Packet::ack(0).encode().len(), HEADER_LEN);
    assert_eq!(Packet::nak(65535).encode().len(), HEADER_LEN);
}

#[test]
fn truncated_datagram_rejected() {
    let encoded = Packet::data(1, Bytes::from_static(b"payload")).encode();
    assert!(Packet::decode(&encoded[..5]).is_err());
    // Header intact but payload cut below the stated data_length.
    assert!(Packet::decode(&encoded[..HEADER_LEN + 3]).is_err());
}

#[test]
fn oversized_data_length_rejected() {
    let mut bytes = Packet::data(1, Bytes::from(vec![0; 16])).encode().to_vec();
    // Claim a data_length beyond MAX_PAYLOAD.
    bytes[6] = 0x08;
    bytes[7] = 0x00;
    assert!(Packet::decode(&bytes).is_err());
}

#[test]
fn unknown_kind_rejected() {
    // Hand-build a datagram with kind = 7 and a valid checksum, so the kind
    // check itself is what rejects it.
    let sum = checksum(5, 7, 0, &[]);
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&5u16.to_be_bytes());
    bytes.extend_from_slice(&7u16.to_be_bytes());
    bytes.extend_from_slice(&sum.to_be_bytes());
    bytes.extend_from_slice(&0u16.to_be_bytes());
    assert!(Packet::decode(&bytes).is_err());
}

#[test]
fn single_bit_flips_detected() {
    let payload = b"The quick brown fox jumps over the lazy dog";
    let encoded = Packet::data(1234, Bytes::from_static(payload)).encode();

    // Every covered byte: header minus the checksum slot, plus the
    // significant payload bytes.
    let covered: Vec<usize> = (0..4)
        .chain(6..8)
        .chain(HEADER_LEN..HEADER_LEN + payload.len())
        .collect();

    for index in covered {
        for bit in 0..8 {
            let mut corrupted = encoded.to_vec();
            corrupted[index] ^= 1 << bit;
            assert!(
                Packet::decode(&corrupted).is_err(),
                "flip of bit {bit} at byte {index} went undetected"
            );
        }
    }
}

#[test]
fn padding_flips_are_ignored() {
    // Bytes past data_length are not covered by the checksum.
    let packet = Packet::data(1, Bytes::from_static(b"covered"));
    let mut bytes = packet.encode().to_vec();
    bytes[HEADER_LEN + 7] ^= 0xFF;
    bytes[WIRE_LEN - 1] ^= 0x01;
    assert_eq!(Packet::decode(&bytes).unwrap(), packet);
}

#[test]
fn checksum_matches_reference_values() {
    // 1 + 0 + 2 + 0xFF + 0x01 = 0x0103; complement = 0xFEFC.
    assert_eq!(checksum(1, 0, 2, &[0xFF, 0x01]), 0xFEFC);

    // Carry folding: 2 + 1024 + 1024 * 0xFF = 0x40002 folds to 6.
    assert_eq!(checksum(2, 0, 1024, &[0xFF; 1024]), !6u16);
}

#[test]
fn peek_seq_reads_raw_field() {
    let encoded = Packet::data(0x1234, Bytes::new()).encode();
    assert_eq!(Packet::peek_seq(&encoded), Some(0x1234));
    assert_eq!(Packet::peek_seq(&[0x01]), None);
}

#[test]
fn kind_tag_wire_values() {
    assert_eq!(PacketKind::Data as u16, 0);
    assert_eq!(PacketKind::Ack as u16, 1);
    assert_eq!(PacketKind::Nak as u16, 2);
}
