//! Bounded per-channel history, filtering, and the query surface
//!
//! [`StreamProcessor`] consumes decoded samples one at a time, keeps the
//! most recent values of every channel in fixed-capacity ring buffers,
//! maintains exponential low-pass estimates, and computes derived metrics
//! per ingested sample.

use std::collections::VecDeque;

use serde::Serialize;

use crate::config::ProcessorConfig;
use crate::protocol::packet::Sample;

use super::filter::{LowPass, EMG_FILTER_ALPHA, IMU_FILTER_ALPHA};
use super::metrics::{
    emg_window_stats, mean, percentile, population_variance, DerivedMetrics,
    ACTIVITY_BASELINE_PERCENTILE, ACTIVITY_THRESHOLD, ACTIVITY_WINDOW, EMG_STATS_WINDOW,
    MOTION_WINDOW,
};

/// Number of trailing timestamps used for the sampling-rate estimate
const RATE_ESTIMATE_WINDOW: usize = 10;

/// Identifier of one buffered channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    AccX,
    AccY,
    AccZ,
    GyroX,
    GyroY,
    GyroZ,
    Emg,
    Timestamp,
}

impl Channel {
    /// All channels, in buffer order
    pub const ALL: [Channel; 8] = [
        Channel::AccX,
        Channel::AccY,
        Channel::AccZ,
        Channel::GyroX,
        Channel::GyroY,
        Channel::GyroZ,
        Channel::Emg,
        Channel::Timestamp,
    ];

    /// Stable wire/query name of the channel
    pub fn name(self) -> &'static str {
        match self {
            Channel::AccX => "acc_x",
            Channel::AccY => "acc_y",
            Channel::AccZ => "acc_z",
            Channel::GyroX => "gyro_x",
            Channel::GyroY => "gyro_y",
            Channel::GyroZ => "gyro_z",
            Channel::Emg => "emg",
            Channel::Timestamp => "timestamp",
        }
    }

    /// Parse a query name; `None` for anything unknown
    pub fn from_name(name: &str) -> Option<Channel> {
        match name {
            "acc_x" => Some(Channel::AccX),
            "acc_y" => Some(Channel::AccY),
            "acc_z" => Some(Channel::AccZ),
            "gyro_x" => Some(Channel::GyroX),
            "gyro_y" => Some(Channel::GyroY),
            "gyro_z" => Some(Channel::GyroZ),
            "emg" => Some(Channel::Emg),
            "timestamp" => Some(Channel::Timestamp),
            _ => None,
        }
    }
}

/// Current low-pass filter estimates for all channels
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilteredSignals {
    /// Filtered acceleration per axis in g
    pub accel: [f64; 3],
    /// Filtered angular rate per axis in °/s
    pub gyro: [f64; 3],
    /// Filtered EMG level in ADC counts
    pub emg: f64,
}

/// Everything the presentation layer needs about one ingested sample
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProcessedFrame {
    /// Arrival timestamp of the sample in milliseconds
    pub timestamp_ms: f64,
    /// The sample as decoded from the wire
    pub raw: Sample,
    /// Low-pass estimates after this sample
    pub filtered: FilteredSignals,
    /// Metrics derived from the buffer contents after this sample
    pub derived: DerivedMetrics,
}

/// Consistent multi-channel view captured in one call
///
/// All vectors hold the same number of entries, the channels observed at
/// one logical append count, alongside the filter estimates and derived
/// metrics from that same instant.
#[derive(Debug, Clone, Serialize)]
pub struct StreamSnapshot {
    /// Arrival timestamps in milliseconds
    pub timestamp: Vec<f64>,
    /// Acceleration history per axis in g
    pub accel: [Vec<f64>; 3],
    /// Angular rate history per axis in °/s
    pub gyro: [Vec<f64>; 3],
    /// EMG history in ADC counts
    pub emg: Vec<f64>,
    /// Low-pass estimates at capture time
    pub filtered: FilteredSignals,
    /// Derived metrics at capture time
    pub derived: DerivedMetrics,
    /// Estimated sampling rate in Hz
    pub sampling_rate_hz: f64,
}

/// Snapshot of processor configuration and occupancy
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProcessorStats {
    /// Samples currently held per channel
    pub buffered_samples: usize,
    /// Estimated sampling rate in Hz (0.0 until enough timestamps)
    pub sampling_rate_hz: f64,
    /// EMG filter coefficient
    pub emg_alpha: f64,
    /// IMU filter coefficient
    pub imu_alpha: f64,
}

/// Streaming per-channel buffer and statistics engine
///
/// Owns eight ring buffers (three accelerometer axes, three gyroscope axes,
/// EMG, timestamp) that grow and evict in lockstep, once per ingested
/// sample, so every buffer always holds the same count. Not designed for
/// concurrent mutation; wrap it in a mutex (see
/// [`crate::pipeline::TelemetryPipeline`]) when queries come from another
/// thread.
///
/// # Example
/// ```
/// use emgstream::protocol::packet::Sample;
/// use emgstream::stream::processor::StreamProcessor;
///
/// let mut processor = StreamProcessor::new();
/// let frame = processor.ingest(Sample {
///     timestamp_ms: 0.0,
///     accel: [0.0, 0.0, 1.0],
///     gyro: [0.0; 3],
///     emg: 2048,
/// });
/// assert_eq!(frame.derived.accel_magnitude, Some(1.0));
/// assert!(frame.derived.emg.is_none()); // needs 100 samples
/// ```
#[derive(Debug)]
pub struct StreamProcessor {
    capacity: usize,
    acc_x: VecDeque<f64>,
    acc_y: VecDeque<f64>,
    acc_z: VecDeque<f64>,
    gyro_x: VecDeque<f64>,
    gyro_y: VecDeque<f64>,
    gyro_z: VecDeque<f64>,
    emg: VecDeque<f64>,
    timestamp: VecDeque<f64>,
    emg_filter: LowPass,
    accel_filters: [LowPass; 3],
    gyro_filters: [LowPass; 3],
}

impl StreamProcessor {
    /// Create a processor with the default capacity and coefficients
    pub fn new() -> Self {
        Self::with_capacity(crate::DEFAULT_BUFFER_CAPACITY)
    }

    /// Create a processor holding at most `capacity` samples per channel
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_settings(capacity, EMG_FILTER_ALPHA, IMU_FILTER_ALPHA)
    }

    /// Create a processor from a configuration
    pub fn from_config(config: &ProcessorConfig) -> Self {
        Self::with_settings(config.buffer_capacity, config.emg_alpha, config.imu_alpha)
    }

    fn with_settings(capacity: usize, emg_alpha: f64, imu_alpha: f64) -> Self {
        Self {
            capacity,
            acc_x: VecDeque::with_capacity(capacity),
            acc_y: VecDeque::with_capacity(capacity),
            acc_z: VecDeque::with_capacity(capacity),
            gyro_x: VecDeque::with_capacity(capacity),
            gyro_y: VecDeque::with_capacity(capacity),
            gyro_z: VecDeque::with_capacity(capacity),
            emg: VecDeque::with_capacity(capacity),
            timestamp: VecDeque::with_capacity(capacity),
            emg_filter: LowPass::new(emg_alpha),
            accel_filters: [LowPass::new(imu_alpha); 3],
            gyro_filters: [LowPass::new(imu_alpha); 3],
        }
    }

    /// Ingest one sample: buffer it, update filters, derive metrics
    ///
    /// Buffers evict their oldest entry once `capacity` is reached, so
    /// memory stays bounded regardless of session length.
    pub fn ingest(&mut self, sample: Sample) -> ProcessedFrame {
        let capacity = self.capacity;
        Self::push_bounded(&mut self.acc_x, capacity, sample.accel[0]);
        Self::push_bounded(&mut self.acc_y, capacity, sample.accel[1]);
        Self::push_bounded(&mut self.acc_z, capacity, sample.accel[2]);
        Self::push_bounded(&mut self.gyro_x, capacity, sample.gyro[0]);
        Self::push_bounded(&mut self.gyro_y, capacity, sample.gyro[1]);
        Self::push_bounded(&mut self.gyro_z, capacity, sample.gyro[2]);
        Self::push_bounded(&mut self.emg, capacity, f64::from(sample.emg));
        Self::push_bounded(&mut self.timestamp, capacity, sample.timestamp_ms);

        let mut accel = [0.0; 3];
        let mut gyro = [0.0; 3];
        for (axis, filter) in self.accel_filters.iter_mut().enumerate() {
            accel[axis] = filter.update(sample.accel[axis]);
        }
        for (axis, filter) in self.gyro_filters.iter_mut().enumerate() {
            gyro[axis] = filter.update(sample.gyro[axis]);
        }
        let filtered = FilteredSignals {
            accel,
            gyro,
            emg: self.emg_filter.update(f64::from(sample.emg)),
        };

        ProcessedFrame {
            timestamp_ms: sample.timestamp_ms,
            raw: sample,
            filtered,
            derived: self.derived_metrics(),
        }
    }

    fn push_bounded(buffer: &mut VecDeque<f64>, capacity: usize, value: f64) {
        if buffer.len() >= capacity {
            buffer.pop_front();
        }
        buffer.push_back(value);
    }

    /// Compute derived metrics from the current buffer contents
    ///
    /// Each field is `Some` only when its window precondition is met; see
    /// [`DerivedMetrics`].
    pub fn derived_metrics(&self) -> DerivedMetrics {
        let mut metrics = DerivedMetrics::default();

        if let (Some(&x), Some(&y), Some(&z)) =
            (self.acc_x.back(), self.acc_y.back(), self.acc_z.back())
        {
            metrics.accel_magnitude = Some((x * x + y * y + z * z).sqrt());
        }
        if let (Some(&x), Some(&y), Some(&z)) =
            (self.gyro_x.back(), self.gyro_y.back(), self.gyro_z.back())
        {
            metrics.gyro_magnitude = Some((x * x + y * y + z * z).sqrt());
        }

        if self.emg.len() >= EMG_STATS_WINDOW {
            let window = Self::tail(&self.emg, EMG_STATS_WINDOW);
            metrics.emg = Some(emg_window_stats(&window));
        }

        if self.acc_x.len() >= MOTION_WINDOW {
            let intensity = population_variance(&Self::tail(&self.acc_x, MOTION_WINDOW))
                + population_variance(&Self::tail(&self.acc_y, MOTION_WINDOW))
                + population_variance(&Self::tail(&self.acc_z, MOTION_WINDOW));
            metrics.motion_intensity = Some(intensity);
        }

        if self.emg.len() >= ACTIVITY_WINDOW {
            let window = Self::tail(&self.emg, ACTIVITY_WINDOW);
            let baseline = percentile(&window, ACTIVITY_BASELINE_PERCENTILE);
            let active = window
                .iter()
                .filter(|&&value| value > baseline + ACTIVITY_THRESHOLD)
                .count();
            metrics.muscle_activity_ratio = Some(active as f64 / window.len() as f64);
        }

        metrics
    }

    /// Get buffered values for a channel by query name
    ///
    /// Returns the most recent `count` values (all, if `None`) in
    /// chronological order. Unknown channel names yield an empty vector so
    /// presentation polling stays robust against typos and version skew.
    pub fn buffer(&self, channel: &str, count: Option<usize>) -> Vec<f64> {
        match Channel::from_name(channel) {
            Some(channel) => self.channel_data(channel, count),
            None => Vec::new(),
        }
    }

    /// Get buffered values for a typed channel identifier
    pub fn channel_data(&self, channel: Channel, count: Option<usize>) -> Vec<f64> {
        let buffer = self.channel_buffer(channel);
        match count {
            Some(count) => Self::tail(buffer, count),
            None => buffer.iter().copied().collect(),
        }
    }

    fn channel_buffer(&self, channel: Channel) -> &VecDeque<f64> {
        match channel {
            Channel::AccX => &self.acc_x,
            Channel::AccY => &self.acc_y,
            Channel::AccZ => &self.acc_z,
            Channel::GyroX => &self.gyro_x,
            Channel::GyroY => &self.gyro_y,
            Channel::GyroZ => &self.gyro_z,
            Channel::Emg => &self.emg,
            Channel::Timestamp => &self.timestamp,
        }
    }

    /// Last `count` entries of a buffer in chronological order
    fn tail(buffer: &VecDeque<f64>, count: usize) -> Vec<f64> {
        buffer.iter().rev().take(count).rev().copied().collect()
    }

    /// Estimate the sampling rate from recent timestamps
    ///
    /// Uses the mean interval over the last [`RATE_ESTIMATE_WINDOW`]
    /// timestamps. Returns 0.0 with fewer timestamps buffered, or when the
    /// mean interval is not positive.
    pub fn estimate_sampling_rate(&self) -> f64 {
        if self.timestamp.len() < RATE_ESTIMATE_WINDOW {
            return 0.0;
        }
        let recent = Self::tail(&self.timestamp, RATE_ESTIMATE_WINDOW);
        let intervals: Vec<f64> = recent.windows(2).map(|pair| pair[1] - pair[0]).collect();
        let avg_interval_secs = mean(&intervals) / 1000.0;
        if avg_interval_secs > 0.0 {
            1.0 / avg_interval_secs
        } else {
            0.0
        }
    }

    /// Capture every channel plus derived state in one consistent view
    ///
    /// Derived metrics read several buffers together; capturing them with
    /// the channel data in a single call guarantees the caller sees all
    /// buffers at the same logical append count.
    pub fn snapshot(&self, count: Option<usize>) -> StreamSnapshot {
        StreamSnapshot {
            timestamp: self.channel_data(Channel::Timestamp, count),
            accel: [
                self.channel_data(Channel::AccX, count),
                self.channel_data(Channel::AccY, count),
                self.channel_data(Channel::AccZ, count),
            ],
            gyro: [
                self.channel_data(Channel::GyroX, count),
                self.channel_data(Channel::GyroY, count),
                self.channel_data(Channel::GyroZ, count),
            ],
            emg: self.channel_data(Channel::Emg, count),
            filtered: self.filtered(),
            derived: self.derived_metrics(),
            sampling_rate_hz: self.estimate_sampling_rate(),
        }
    }

    /// Snapshot of configuration and occupancy
    pub fn stats(&self) -> ProcessorStats {
        ProcessorStats {
            buffered_samples: self.len(),
            sampling_rate_hz: self.estimate_sampling_rate(),
            emg_alpha: self.emg_filter.alpha(),
            imu_alpha: self.accel_filters[0].alpha(),
        }
    }

    /// Current low-pass estimates without ingesting anything
    pub fn filtered(&self) -> FilteredSignals {
        FilteredSignals {
            accel: [
                self.accel_filters[0].value(),
                self.accel_filters[1].value(),
                self.accel_filters[2].value(),
            ],
            gyro: [
                self.gyro_filters[0].value(),
                self.gyro_filters[1].value(),
                self.gyro_filters[2].value(),
            ],
            emg: self.emg_filter.value(),
        }
    }

    /// Samples currently held (identical across all channels)
    pub fn len(&self) -> usize {
        self.emg.len()
    }

    /// True before the first sample and after a reset
    pub fn is_empty(&self) -> bool {
        self.emg.is_empty()
    }

    /// Per-channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Clear all buffers and zero filter state
    ///
    /// Does not touch the packet decoder's sequence statistics; those
    /// belong to the link, not the stream.
    pub fn reset(&mut self) {
        self.acc_x.clear();
        self.acc_y.clear();
        self.acc_z.clear();
        self.gyro_x.clear();
        self.gyro_y.clear();
        self.gyro_z.clear();
        self.emg.clear();
        self.timestamp.clear();

        self.emg_filter.reset();
        for filter in &mut self.accel_filters {
            filter.reset();
        }
        for filter in &mut self.gyro_filters {
            filter.reset();
        }
    }
}

impl Default for StreamProcessor {
    fn default() -> Self {
        Self::new()
    }
}
