//! Derived metrics computed from buffered history
//!
//! All metrics are best-effort: a field is `Some` only once its window
//! precondition is met, never zero-filled. Consumers match on presence
//! instead of probing magic values.

use serde::Serialize;

/// EMG statistics window length in samples
pub const EMG_STATS_WINDOW: usize = 100;

/// Accelerometer variance window length in samples
pub const MOTION_WINDOW: usize = 10;

/// Muscle activity window length in samples
pub const ACTIVITY_WINDOW: usize = 50;

/// Percentile of the activity window taken as the resting baseline
pub const ACTIVITY_BASELINE_PERCENTILE: f64 = 10.0;

/// ADC counts above baseline that qualify a sample as active
pub const ACTIVITY_THRESHOLD: f64 = 50.0;

/// Statistics over the most recent EMG window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EmgWindowStats {
    /// Root mean square of the window
    pub rms: f64,
    /// Arithmetic mean of the window
    pub mean: f64,
    /// Population standard deviation of the window
    pub std_dev: f64,
    /// Max minus min of the window
    pub range: f64,
}

/// Metrics derived from the current buffer contents
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DerivedMetrics {
    /// Acceleration vector magnitude of the latest sample, in g
    pub accel_magnitude: Option<f64>,
    /// Angular rate vector magnitude of the latest sample, in °/s
    pub gyro_magnitude: Option<f64>,
    /// EMG statistics over the last [`EMG_STATS_WINDOW`] samples
    pub emg: Option<EmgWindowStats>,
    /// Summed per-axis acceleration variance over the last
    /// [`MOTION_WINDOW`] samples
    pub motion_intensity: Option<f64>,
    /// Fraction of the last [`ACTIVITY_WINDOW`] EMG samples above the
    /// resting baseline plus [`ACTIVITY_THRESHOLD`]
    pub muscle_activity_ratio: Option<f64>,
}

/// Arithmetic mean; 0.0 for an empty slice
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divides by n, not n-1)
pub(crate) fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / values.len() as f64
}

/// Root mean square
pub(crate) fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

/// Percentile with linear interpolation between ranked samples
///
/// `p` is in 0..=100. The rank is `p / 100 * (n - 1)`; fractional ranks
/// interpolate between the two neighboring order statistics.
pub(crate) fn percentile(values: &[f64], p: f64) -> f64 {
    debug_assert!(!values.is_empty());
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = p / 100.0 * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = rank - lower as f64;
    sorted[lower] + frac * (sorted[upper] - sorted[lower])
}

/// Compute the full EMG statistics block for one window
pub(crate) fn emg_window_stats(window: &[f64]) -> EmgWindowStats {
    let mut min = f64::MAX;
    let mut max = f64::MIN;
    for &value in window {
        min = min.min(value);
        max = max.max(value);
    }

    EmgWindowStats {
        rms: rms(window),
        mean: mean(window),
        std_dev: population_variance(window).sqrt(),
        range: max - min,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_variance() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&values), 5.0);
        // Population variance of the classic example set
        assert_relative_eq!(population_variance(&values), 4.0);
    }

    #[test]
    fn test_rms() {
        let values = [3.0, 4.0];
        assert_relative_eq!(rms(&values), (12.5f64).sqrt());
    }

    #[test]
    fn test_percentile_exact_rank() {
        let values = [10.0, 20.0, 30.0, 40.0, 50.0];
        assert_relative_eq!(percentile(&values, 0.0), 10.0);
        assert_relative_eq!(percentile(&values, 50.0), 30.0);
        assert_relative_eq!(percentile(&values, 100.0), 50.0);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = [0.0, 10.0];
        // rank = 0.25 -> 0 + 0.25 * (10 - 0)
        assert_relative_eq!(percentile(&values, 25.0), 2.5);

        // Unsorted input must not matter
        let values = [30.0, 10.0, 20.0];
        // rank = 0.1 * 2 = 0.2 -> 10 + 0.2 * (20 - 10)
        assert_relative_eq!(percentile(&values, 10.0), 12.0);
    }

    #[test]
    fn test_emg_window_stats() {
        let window = [1.0, 2.0, 3.0, 4.0];
        let stats = emg_window_stats(&window);
        assert_relative_eq!(stats.mean, 2.5);
        assert_relative_eq!(stats.range, 3.0);
        assert_relative_eq!(stats.rms, (30.0f64 / 4.0).sqrt());
        assert_relative_eq!(stats.std_dev, (1.25f64).sqrt());
    }

    #[test]
    fn test_default_metrics_all_absent() {
        let metrics = DerivedMetrics::default();
        assert!(metrics.accel_magnitude.is_none());
        assert!(metrics.gyro_magnitude.is_none());
        assert!(metrics.emg.is_none());
        assert!(metrics.motion_intensity.is_none());
        assert!(metrics.muscle_activity_ratio.is_none());
    }
}
