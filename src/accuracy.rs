use crate::geo::horizontal_error_meters;
use crate::types::{FusedPosition, GpsFix};

/// Horizontal position error of the fused estimate against the latest raw
/// fix, with a running session average.
#[derive(Debug, Clone, Default)]
pub struct AccuracyEstimator {
    current: Option<f64>,
    sum: f64,
    count: u64,
}

impl AccuracyEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one fused update and return its HPE in meters.
    pub fn record(&mut self, fix: &GpsFix, fused: &FusedPosition) -> f64 {
        let hpe = horizontal_error_meters(fix, fused);
        self.current = Some(hpe);
        self.sum += hpe;
        self.count += 1;
        hpe
    }

    pub fn current(&self) -> Option<f64> {
        self.current
    }

    /// `None` until the first fused update
    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }

    pub fn samples(&self) -> u64 {
        self.count
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
