use serde::{Deserialize, Serialize};

use crate::config::TrackerConfig;
use crate::window::RollingWindow;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SpeedChange {
    Braking(f64),
    Accelerating(f64),
}

/// Longitudinal braking/acceleration events from consecutive GPS speeds.
#[derive(Clone, Debug)]
pub struct BrakingDetector {
    braking_threshold: f64,
    acceleration_threshold: f64,
    previous: Option<(f64, f64)>, // (speed, timestamp)
    braking: RollingWindow<f64>,
    acceleration: RollingWindow<f64>,
}

impl BrakingDetector {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            braking_threshold: config.braking_threshold,
            acceleration_threshold: config.acceleration_threshold,
            previous: None,
            braking: RollingWindow::new(config.window_capacity),
            acceleration: RollingWindow::new(config.window_capacity),
        }
    }

    /// Feed the speed reported with a fix. An absent speed breaks the chain.
    pub fn update(&mut self, speed: Option<f64>, now: f64) -> Option<SpeedChange> {
        let previous = self.previous.take();
        let speed = speed?;
        self.previous = Some((speed, now));

        let (prev_speed, prev_ts) = previous?;
        let dt = now - prev_ts;
        if dt <= 0.0 {
            return None;
        }

        let accel = (speed - prev_speed) / dt;
        if accel < -self.braking_threshold {
            self.braking.push(accel.abs());
            Some(SpeedChange::Braking(accel.abs()))
        } else if accel > self.acceleration_threshold {
            self.acceleration.push(accel);
            Some(SpeedChange::Accelerating(accel))
        } else {
            None
        }
    }

    pub fn braking_events(&self) -> &RollingWindow<f64> {
        &self.braking
    }

    pub fn acceleration_events(&self) -> &RollingWindow<f64> {
        &self.acceleration
    }

    /// Mean braking deceleration (m/s²), 0.0 with no events
    pub fn braking_efficiency(&self) -> f64 {
        self.braking.mean()
    }

    /// Mean acceleration (m/s²), 0.0 with no events
    pub fn acceleration_efficiency(&self) -> f64 {
        self.acceleration.mean()
    }

    pub fn reset(&mut self) {
        self.previous = None;
        self.braking.clear();
        self.acceleration.clear();
    }
}
