use crate::config::TrackerConfig;

#[derive(Clone, Copy, Debug, PartialEq)]
enum AirState {
    Grounded,
    Airborne { since: f64 },
}

/// Jump detection on the vertical accelerometer axis with hysteresis.
///
/// z below the airborne threshold lifts off, z above the grounded threshold
/// lands; the band between is inert. A jump counts only if the air phase
/// lasted at least the debounce time.
#[derive(Clone, Debug)]
pub struct AirborneDetector {
    air_threshold: f64,
    ground_threshold: f64,
    debounce_secs: f64,
    state: AirState,
    air_time: f64,
    jump_durations: Vec<f64>,
}

impl AirborneDetector {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            air_threshold: config.airborne_z_threshold,
            ground_threshold: config.grounded_z_threshold,
            debounce_secs: config.airborne_debounce_secs,
            state: AirState::Grounded,
            air_time: 0.0,
            jump_durations: Vec::new(),
        }
    }

    /// Feed one z sample; returns the jump duration when a jump lands.
    pub fn update(&mut self, z: f64, now: f64, dt: f64) -> Option<f64> {
        if z < self.air_threshold {
            match self.state {
                AirState::Grounded => self.state = AirState::Airborne { since: now },
                AirState::Airborne { since } => {
                    if now - since >= self.debounce_secs {
                        self.air_time += dt;
                    }
                }
            }
            None
        } else if z > self.ground_threshold {
            let landed = match self.state {
                AirState::Airborne { since } if now - since >= self.debounce_secs => {
                    let duration = now - since;
                    self.jump_durations.push(duration);
                    log::info!("Jump {} landed after {:.2}s", self.jump_durations.len(), duration);
                    Some(duration)
                }
                _ => None,
            };
            self.state = AirState::Grounded;
            landed
        } else {
            None
        }
    }

    pub fn is_airborne(&self) -> bool {
        matches!(self.state, AirState::Airborne { .. })
    }

    pub fn jump_count(&self) -> u32 {
        self.jump_durations.len() as u32
    }

    pub fn jump_durations(&self) -> &[f64] {
        &self.jump_durations
    }

    /// Accumulated time in the air past the debounce, in seconds
    pub fn air_time(&self) -> f64 {
        self.air_time
    }

    pub fn reset(&mut self) {
        self.state = AirState::Grounded;
        self.air_time = 0.0;
        self.jump_durations.clear();
    }
}
