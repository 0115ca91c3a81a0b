//! Emgstream - wireless IMU/EMG telemetry decoding and streaming statistics
//!
//! This library turns the notification packets of a wireless
//! accelerometer/gyroscope/EMG sensor into typed samples, accounts for
//! packet loss over the sensor's wrapping 16-bit sequence counter, and
//! maintains bounded per-channel history with low-pass estimates and
//! derived metrics for downstream display.
//!
//! The transport (scanning, pairing, notification subscription) is an
//! external collaborator: anything that can hand over discrete payload
//! byte slices can feed the decoder.

pub mod config;
pub mod pipeline;
pub mod protocol;
pub mod stream;

pub use config::{PipelineConfig, ProcessorConfig};
pub use pipeline::{StreamView, TelemetryPipeline};
pub use protocol::decoder::{DecodeError, GapEvent, LinkStats, PacketDecoder};
pub use protocol::packet::{DecodedPacket, Sample};
pub use stream::metrics::{DerivedMetrics, EmgWindowStats};
pub use stream::processor::{
    Channel, ProcessedFrame, ProcessorStats, StreamProcessor, StreamSnapshot,
};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Nominal sensor sampling rate in Hz
pub const NOMINAL_SAMPLE_RATE_HZ: f64 = 1000.0;

/// Default per-channel history depth (one second at the nominal rate)
pub const DEFAULT_BUFFER_CAPACITY: usize = 1000;
