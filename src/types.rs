use serde::{Deserialize, Serialize};

/// Raw position fix from the host GPS source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub timestamp: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Reported ground speed in m/s, if the receiver provides one
    #[serde(default)]
    pub speed: Option<f64>,
}

impl GpsFix {
    pub fn new(latitude: f64, longitude: f64, speed: Option<f64>, timestamp: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            speed,
        }
    }

    /// Reported speed, with negative values treated as "not reported"
    pub fn valid_speed(&self) -> Option<f64> {
        self.speed.filter(|s| *s >= 0.0 && s.is_finite())
    }

    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// What a GPS source emits: a fix, or a sentinel when none can be produced
/// (permission denied, receiver off).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GpsReading {
    Fix(GpsFix),
    Unavailable(String),
}

/// Accelerometer sample in g-units (z ≈ 1.0 at rest)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelSample {
    pub timestamp: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AccelSample {
    pub fn new(x: f64, y: f64, z: f64, timestamp: f64) -> Self {
        Self { timestamp, x, y, z }
    }

    /// Horizontal-plane magnitude (lateral + longitudinal)
    pub fn horizontal_magnitude(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// Merged event stream consumed by the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SensorEvent {
    Gps(GpsReading),
    Accel(AccelSample),
}

impl SensorEvent {
    pub fn timestamp(&self) -> Option<f64> {
        match self {
            SensorEvent::Gps(GpsReading::Fix(fix)) => Some(fix.timestamp),
            SensorEvent::Gps(GpsReading::Unavailable(_)) => None,
            SensorEvent::Accel(sample) => Some(sample.timestamp),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Current best position estimate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusedPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl FusedPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<&GpsFix> for FusedPosition {
    fn from(fix: &GpsFix) -> Self {
        Self::new(fix.latitude, fix.longitude)
    }
}
