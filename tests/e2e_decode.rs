//! E2E tests for packet decoding and loss accounting
//!
//! Verifies the wire format end to end: record partitioning, fixed-point
//! unscaling, sequence-gap arithmetic across the 16-bit wraparound, and
//! the malformed-packet policy.

use approx::assert_relative_eq;
use emgstream::protocol::decoder::{DecodeError, PacketDecoder};
use emgstream::protocol::packet::{PACKET_HEADER_BYTES, SAMPLE_RECORD_BYTES};

/// Build a payload from a sequence number and raw i16 records
fn payload(sequence: u16, records: &[[i16; 7]]) -> Vec<u8> {
    let mut bytes = sequence.to_le_bytes().to_vec();
    for record in records {
        for value in record {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }
    bytes
}

/// The decoder partitions any valid payload into floor((len-2)/14) samples
#[test]
fn test_partition_counts() {
    let mut decoder = PacketDecoder::new();

    for record_count in 0..16usize {
        let records = vec![[0i16; 7]; record_count];
        let bytes = payload(record_count as u16, &records);
        assert_eq!(
            bytes.len(),
            PACKET_HEADER_BYTES + record_count * SAMPLE_RECORD_BYTES
        );

        let packet = decoder.decode(&bytes).unwrap();
        assert_eq!(
            packet.samples.len(),
            record_count,
            "payload with {} records must yield {} samples",
            record_count,
            record_count
        );
    }
}

/// Remainder bytes after the last whole record are ignored, never an error
#[test]
fn test_remainder_bytes_ignored() {
    let mut decoder = PacketDecoder::new();

    for tail_len in 1..SAMPLE_RECORD_BYTES {
        let mut bytes = payload(0, &[[0; 7], [0; 7]]);
        bytes.extend(std::iter::repeat(0xEE).take(tail_len));

        let packet = decoder
            .decode(&bytes)
            .expect("a truncated tail must not fail the packet");
        assert_eq!(packet.samples.len(), 2);
    }
}

/// Full-scale fixed-point values unscale to the advertised physical ranges
#[test]
fn test_full_scale_unscaling() {
    let mut decoder = PacketDecoder::new();

    let packet = decoder
        .decode(&payload(
            0,
            &[[4096, 8192, -8192, -16384, 16384, -32768, 4095]],
        ))
        .unwrap();
    let sample = &packet.samples[0];

    assert_relative_eq!(sample.accel[0], 1.0);
    assert_relative_eq!(sample.accel[1], 2.0);
    assert_relative_eq!(sample.accel[2], -2.0);
    assert_relative_eq!(sample.gyro[0], -1000.0);
    assert_relative_eq!(sample.gyro[1], 1000.0);
    assert_relative_eq!(sample.gyro[2], -2000.0);
    assert_eq!(sample.emg, 4095);
}

/// Gap of two: sequence 10 then 13 means packets 11 and 12 are missing
#[test]
fn test_simple_gap() {
    let mut decoder = PacketDecoder::new();

    decoder.decode(&payload(10, &[])).unwrap();
    let packet = decoder.decode(&payload(13, &[])).unwrap();

    assert_eq!(packet.lost_before, Some(2));

    let stats = decoder.statistics();
    assert_eq!(stats.received, 2);
    assert_eq!(stats.lost, 2);
}

/// Gap arithmetic stays correct across the 65535 -> 0 counter wrap
#[test]
fn test_gap_across_wraparound() {
    let mut decoder = PacketDecoder::new();

    decoder.decode(&payload(65535, &[])).unwrap();
    let packet = decoder.decode(&payload(1, &[])).unwrap();

    assert_eq!(
        packet.lost_before,
        Some(1),
        "expected sequence 0, got 1: exactly one packet lost"
    );
}

/// A long unbroken run accumulates zero loss, wraps included
#[test]
fn test_unbroken_run_has_no_loss() {
    let mut decoder = PacketDecoder::new();

    let mut seq = 65500u16;
    for _ in 0..100 {
        let packet = decoder.decode(&payload(seq, &[[0; 7]])).unwrap();
        assert_eq!(packet.lost_before, None);
        seq = seq.wrapping_add(1);
    }

    let stats = decoder.statistics();
    assert_eq!(stats.received, 100);
    assert_eq!(stats.lost, 0);
    assert_relative_eq!(stats.loss_rate, 0.0);
}

/// Malformed packets abort that packet only; sequence bookkeeping survives
#[test]
fn test_malformed_packets_do_not_poison_the_stream() {
    let mut decoder = PacketDecoder::new();

    decoder.decode(&payload(100, &[[0; 7]])).unwrap();

    for bad in [&[][..], &[0x01][..]] {
        let err = decoder.decode(bad).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedPacket { .. }));
    }

    // Next valid packet is judged against the last valid one
    let packet = decoder.decode(&payload(101, &[[0; 7]])).unwrap();
    assert_eq!(packet.lost_before, None);

    let stats = decoder.statistics();
    assert_eq!(stats.received, 2, "malformed packets are not counted");
    assert_eq!(stats.lost, 0);
}

/// Loss rate relates lost packets to everything the sensor sent
#[test]
fn test_loss_rate_accumulates() {
    let mut decoder = PacketDecoder::new();

    // 10 received, 90 lost: decode every tenth sequence number
    for seq in (0..100u16).step_by(10) {
        decoder.decode(&payload(seq, &[])).unwrap();
    }

    let stats = decoder.statistics();
    assert_eq!(stats.received, 10);
    assert_eq!(stats.lost, 81); // nine gaps of nine packets each
    assert_relative_eq!(stats.loss_rate, 81.0 / 91.0 * 100.0);
}

/// Gap events carry the revealing sequence number and the gap size
#[test]
fn test_gap_event_history() {
    let mut decoder = PacketDecoder::new();

    decoder.decode(&payload(0, &[])).unwrap();
    decoder.decode(&payload(4, &[])).unwrap();
    decoder.decode(&payload(5, &[])).unwrap();
    decoder.decode(&payload(9, &[])).unwrap();

    let events: Vec<(u16, u32)> = decoder
        .gap_events()
        .iter()
        .map(|event| (event.sequence, event.lost))
        .collect();
    assert_eq!(events, vec![(4, 3), (9, 3)]);
}
