//! Exponential smoothing low-pass filter
//!
//! Implements the recursive filter `y = alpha * x + (1 - alpha) * y_prev`
//! used for noise removal on the EMG and IMU channels.

/// Smoothing coefficient for the EMG channel
pub const EMG_FILTER_ALPHA: f64 = 0.1;

/// Smoothing coefficient for the six IMU channels
pub const IMU_FILTER_ALPHA: f64 = 0.05;

/// Single-pole exponential low-pass filter
///
/// The state starts at zero and is deliberately not seeded from the first
/// input: early outputs are biased toward zero until the average converges.
/// Downstream calibration depends on this startup transient, so it must not
/// be changed.
#[derive(Debug, Clone, Copy)]
pub struct LowPass {
    alpha: f64,
    state: f64,
}

impl LowPass {
    /// Create a filter with the given smoothing coefficient
    pub fn new(alpha: f64) -> Self {
        Self { alpha, state: 0.0 }
    }

    /// Feed one input value and return the updated estimate
    pub fn update(&mut self, input: f64) -> f64 {
        self.state = self.alpha * input + (1.0 - self.alpha) * self.state;
        self.state
    }

    /// Current filtered estimate
    pub fn value(&self) -> f64 {
        self.state
    }

    /// Smoothing coefficient
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Zero the filter state
    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_starts_at_zero() {
        let filter = LowPass::new(0.1);
        assert_relative_eq!(filter.value(), 0.0);
    }

    #[test]
    fn test_single_step() {
        let mut filter = LowPass::new(0.1);
        assert_relative_eq!(filter.update(100.0), 10.0);
    }

    #[test]
    fn test_convergence_is_exact_linear_recurrence() {
        // From zero state with constant input v, the error after n steps is
        // exactly v * (1 - alpha)^n.
        let mut filter = LowPass::new(0.1);
        for _ in 0..10 {
            filter.update(100.0);
        }
        let expected = 100.0 * (1.0 - 0.9f64.powi(10));
        assert_relative_eq!(filter.value(), expected, max_relative = 1e-12);
        assert_relative_eq!(filter.value(), 65.13215599, max_relative = 1e-8);
    }

    #[test]
    fn test_monotonic_approach() {
        let mut filter = LowPass::new(0.05);
        let mut previous_error = 100.0;
        for _ in 0..50 {
            filter.update(100.0);
            let error = (100.0 - filter.value()).abs();
            assert!(error < previous_error, "error must shrink every step");
            previous_error = error;
        }
    }

    #[test]
    fn test_reset() {
        let mut filter = LowPass::new(0.1);
        filter.update(50.0);
        filter.reset();
        assert_relative_eq!(filter.value(), 0.0);
        assert_relative_eq!(filter.alpha(), 0.1);
    }
}
