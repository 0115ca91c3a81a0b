//! Stateful packet decoding and sequence-loss accounting
//!
//! Turns raw notification payloads into typed [`Sample`]s and tracks
//! continuity of the sensor's 16-bit wrapping sequence counter. Gaps in the
//! sequence are accumulated as lost packets; the decoder never reorders or
//! buffers out-of-order packets, it trusts the transport's delivery order
//! and measures forward discontinuities only.

use std::collections::VecDeque;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use super::packet::{
    DecodedPacket, Sample, ACCEL_SCALE, GYRO_SCALE, PACKET_HEADER_BYTES, SAMPLE_RECORD_BYTES,
};

/// Maximum number of gap events retained for inspection
const MAX_GAP_EVENTS: usize = 256;

/// Emit link statistics to the log every N received packets
const STATS_LOG_INTERVAL: u64 = 100;

/// Errors that can occur while decoding a notification payload
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed packet: {len} bytes, need at least 2")]
    MalformedPacket { len: usize },
}

/// Sequence continuity state
#[derive(Debug, Clone, Copy, Default)]
struct SequenceState {
    /// Last sequence number seen, `None` before the first packet
    last: Option<u16>,
    /// Packets successfully decoded
    received: u64,
    /// Packets known missing from sequence gaps (monotonically increasing)
    lost: u64,
}

/// A detected gap in the packet sequence
#[derive(Debug, Clone)]
pub struct GapEvent {
    /// When the gap was detected
    pub timestamp: DateTime<Utc>,
    /// Sequence number of the packet that revealed the gap
    pub sequence: u16,
    /// Number of packets missing before it
    pub lost: u32,
}

/// Link reception statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LinkStats {
    /// Packets successfully decoded
    pub received: u64,
    /// Packets known missing
    pub lost: u64,
    /// Loss percentage over everything the sensor is known to have sent
    pub loss_rate: f64,
}

/// Stateful decoder for sensor notification payloads
///
/// One decoder instance corresponds to one logical connection. Create it
/// when the session starts, feed every notification payload through
/// [`Self::decode`], and [`Self::reset`] it on reconnect.
///
/// # Example
/// ```
/// use emgstream::protocol::decoder::PacketDecoder;
///
/// let mut decoder = PacketDecoder::new();
///
/// // Sequence 0, one all-zero sample record
/// let mut payload = vec![0u8; 16];
/// let packet = decoder.decode(&payload).unwrap();
/// assert_eq!(packet.sequence, 0);
/// assert_eq!(packet.samples.len(), 1);
///
/// // Sequence 2: packet 1 went missing
/// payload[0] = 2;
/// let packet = decoder.decode(&payload).unwrap();
/// assert_eq!(packet.lost_before, Some(1));
/// assert_eq!(decoder.statistics().lost, 1);
/// ```
#[derive(Debug)]
pub struct PacketDecoder {
    sequence: SequenceState,
    /// Recent gap events, oldest evicted beyond [`MAX_GAP_EVENTS`]
    gap_events: VecDeque<GapEvent>,
    /// Monotonic arrival clock; samples are stamped with elapsed milliseconds
    epoch: Instant,
}

impl PacketDecoder {
    /// Create a new decoder with a fresh arrival clock
    pub fn new() -> Self {
        Self {
            sequence: SequenceState::default(),
            gap_events: VecDeque::with_capacity(MAX_GAP_EVENTS),
            epoch: Instant::now(),
        }
    }

    /// Decode one notification payload into typed samples
    ///
    /// The payload must be at least 2 bytes (the sequence number). The
    /// remaining bytes form `floor((len - 2) / 14)` sample records; a
    /// trailing partial record is silently discarded, not an error — the
    /// sensor's packetization keeps records whole, so in practice the tail
    /// never appears, but a truncated notification must not kill the stream.
    ///
    /// Malformed payloads leave the sequence state untouched so that the
    /// next valid packet is judged against the last valid one.
    ///
    /// # Arguments
    /// * `payload` - Raw notification bytes as delivered by the transport
    ///
    /// # Returns
    /// The decoded packet, including the gap detected before it, if any
    pub fn decode(&mut self, payload: &[u8]) -> Result<DecodedPacket, DecodeError> {
        if payload.len() < PACKET_HEADER_BYTES {
            return Err(DecodeError::MalformedPacket {
                len: payload.len(),
            });
        }

        let sequence = u16::from_le_bytes([payload[0], payload[1]]);
        let lost_before = self.track_sequence(sequence);

        self.sequence.received += 1;
        if self.sequence.received % STATS_LOG_INTERVAL == 0 {
            tracing::debug!(
                received = self.sequence.received,
                lost = self.sequence.lost,
                "link statistics"
            );
        }

        // All samples in a packet share the packet's arrival timestamp; the
        // protocol carries no per-sample timing.
        let timestamp_ms = self.epoch.elapsed().as_secs_f64() * 1000.0;

        let body = &payload[PACKET_HEADER_BYTES..];
        let mut samples = Vec::with_capacity(body.len() / SAMPLE_RECORD_BYTES);
        for record in body.chunks_exact(SAMPLE_RECORD_BYTES) {
            samples.push(Self::decode_record(record, timestamp_ms));
        }

        tracing::trace!(sequence, samples = samples.len(), "packet decoded");

        Ok(DecodedPacket {
            sequence,
            samples,
            lost_before,
        })
    }

    /// Decode one 14-byte record into a sample
    fn decode_record(record: &[u8], timestamp_ms: f64) -> Sample {
        let mut raw = [0i16; 7];
        for (value, bytes) in raw.iter_mut().zip(record.chunks_exact(2)) {
            *value = i16::from_le_bytes([bytes[0], bytes[1]]);
        }

        Sample {
            timestamp_ms,
            accel: [
                raw[0] as f64 / ACCEL_SCALE,
                raw[1] as f64 / ACCEL_SCALE,
                raw[2] as f64 / ACCEL_SCALE,
            ],
            gyro: [
                raw[3] as f64 / GYRO_SCALE,
                raw[4] as f64 / GYRO_SCALE,
                raw[5] as f64 / GYRO_SCALE,
            ],
            // The device emits 0-4095; the sign bit is not validated here
            emg: raw[6] as u16,
        }
    }

    /// Check sequence continuity and account for gaps
    ///
    /// Returns the number of missing packets before `sequence`, if any.
    /// The wrapped subtraction measures forward gaps correctly across the
    /// 16-bit counter boundary. The received number always becomes the new
    /// reference, gap or not.
    fn track_sequence(&mut self, sequence: u16) -> Option<u32> {
        let gap = match self.sequence.last {
            Some(last) => {
                let expected = last.wrapping_add(1);
                let diff = sequence.wrapping_sub(expected);
                if diff != 0 {
                    tracing::warn!(
                        expected,
                        received = sequence,
                        lost = diff,
                        "packet loss detected"
                    );
                    Some(u32::from(diff))
                } else {
                    None
                }
            }
            None => None,
        };

        if let Some(lost) = gap {
            self.sequence.lost += u64::from(lost);
            if self.gap_events.len() >= MAX_GAP_EVENTS {
                self.gap_events.pop_front();
            }
            self.gap_events.push_back(GapEvent {
                timestamp: Utc::now(),
                sequence,
                lost,
            });
        }

        self.sequence.last = Some(sequence);
        gap
    }

    /// Get link reception statistics
    ///
    /// The loss rate is the lost fraction of everything the sensor is known
    /// to have sent (`received + lost`), as a percentage.
    pub fn statistics(&self) -> LinkStats {
        let received = self.sequence.received;
        let lost = self.sequence.lost;
        let loss_rate = lost as f64 / (received + lost).max(1) as f64 * 100.0;

        LinkStats {
            received,
            lost,
            loss_rate,
        }
    }

    /// Get the recent gap events, oldest first
    pub fn gap_events(&self) -> &VecDeque<GapEvent> {
        &self.gap_events
    }

    /// Reset all decoder state for a new session
    ///
    /// Clears sequence tracking, statistics, and gap history, and restarts
    /// the arrival clock. Call on reconnect.
    pub fn reset(&mut self) {
        self.sequence = SequenceState::default();
        self.gap_events.clear();
        self.epoch = Instant::now();
    }
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self::new()
    }
}
