use crate::window::RollingWindow;

/// Samples turn intensity and speed whenever the horizontal-plane
/// acceleration exceeds the cornering threshold. Corner speed is only
/// recorded when a usable speed is known.
#[derive(Clone, Debug)]
pub struct CorneringDetector {
    threshold: f64,
    intensity: RollingWindow<f64>,
    corner_speeds: RollingWindow<f64>,
}

impl CorneringDetector {
    pub fn new(threshold: f64, capacity: usize) -> Self {
        Self {
            threshold,
            intensity: RollingWindow::new(capacity),
            corner_speeds: RollingWindow::new(capacity),
        }
    }

    /// Returns the turn intensity when the sample counted as cornering.
    pub fn update(&mut self, x: f64, y: f64, speed: Option<f64>) -> Option<f64> {
        let intensity = (x * x + y * y).sqrt();
        if intensity > self.threshold {
            self.intensity.push(intensity);
            if let Some(speed) = speed {
                self.corner_speeds.push(speed);
            }
            Some(intensity)
        } else {
            None
        }
    }

    pub fn intensity(&self) -> &RollingWindow<f64> {
        &self.intensity
    }

    pub fn corner_speeds(&self) -> &RollingWindow<f64> {
        &self.corner_speeds
    }

    /// Mean recent turn intensity (g), 0.0 when no corner was seen
    pub fn cornering_score(&self) -> f64 {
        self.intensity.mean()
    }

    pub fn reset(&mut self) {
        self.intensity.clear();
        self.corner_speeds.clear();
    }
}
