//! Sample value type and wire-format constants
//!
//! The sensor emits notification packets structured as a 2-byte little-endian
//! sequence number followed by a whole number of 14-byte sample records.
//! Each record carries seven little-endian `i16` values:
//! `(ax, ay, az, gx, gy, gz, emg)`.

use serde::Serialize;

/// Packet header length in bytes (`u16` sequence number)
pub const PACKET_HEADER_BYTES: usize = 2;

/// Length of one encoded sample record in bytes (7 × `i16`)
pub const SAMPLE_RECORD_BYTES: usize = 14;

/// Accelerometer fixed-point divisor: ±8 g mapped onto the `i16` range
pub const ACCEL_SCALE: f64 = 4096.0;

/// Gyroscope fixed-point divisor: ±2000 °/s mapped onto the `i16` range
pub const GYRO_SCALE: f64 = 16.384;

/// One synchronized reading of all sensor channels
///
/// Produced exclusively by [`crate::protocol::decoder::PacketDecoder`] and
/// handed off by value. The protocol carries no per-sample timing, so every
/// sample in a packet shares the packet's decode-time timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    /// Monotonic arrival timestamp in milliseconds
    pub timestamp_ms: f64,
    /// Acceleration per axis in g
    pub accel: [f64; 3],
    /// Angular rate per axis in degrees/second
    pub gyro: [f64; 3],
    /// Raw EMG ADC code (the device emits 0–4095)
    pub emg: u16,
}

impl Sample {
    /// Euclidean magnitude of the acceleration vector in g
    pub fn accel_magnitude(&self) -> f64 {
        let [x, y, z] = self.accel;
        (x * x + y * y + z * z).sqrt()
    }

    /// Euclidean magnitude of the angular rate vector in °/s
    pub fn gyro_magnitude(&self) -> f64 {
        let [x, y, z] = self.gyro;
        (x * x + y * y + z * z).sqrt()
    }
}

/// Result of decoding one notification payload
#[derive(Debug, Clone)]
pub struct DecodedPacket {
    /// Sequence number stamped by the sensor
    pub sequence: u16,
    /// Samples carried by this packet, in wire order
    pub samples: Vec<Sample>,
    /// Number of packets missing between the previous packet and this one,
    /// if a gap in the sequence was detected
    pub lost_before: Option<u32>,
}
