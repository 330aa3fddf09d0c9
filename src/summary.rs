use serde::{Deserialize, Serialize};

use crate::context::{BikeDetails, TrackData, Weather};
use crate::types::{Coordinates, FusedPosition, GpsFix};
use crate::window::mean_or_zero;

/// Presentation conversion used for every speed shown to the rider
pub const MPS_TO_MPH: f64 = 2.24;

/// One fused update recorded while the session was running
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub timestamp: f64,
    pub gps: GpsFix,
    pub fused: FusedPosition,
    pub hpe: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelHistoryEntry {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub speed: f64,
}

/// Everything the derived metrics are computed from
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricInputs<'a> {
    pub total_distance: f64,
    pub total_time: f64,
    pub moving_time: f64,
    pub max_speed: f64,
    pub lap_times: &'a [f64],
    pub jump_durations: &'a [f64],
    pub mean_braking: f64,
    pub mean_acceleration: f64,
    pub mean_corner_speed: f64,
    pub mean_cornering_score: f64,
}

/// Derived ride metrics (SI units). Every value is 0.0 when its inputs are
/// empty.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RideMetrics {
    pub avg_speed: f64,
    pub avg_moving_speed: f64,
    pub max_speed: f64,
    pub best_lap_time: f64,
    pub avg_lap_time: f64,
    pub braking_efficiency: f64,
    pub accel_efficiency: f64,
    pub avg_corner_speed: f64,
    pub avg_air_time: f64,
    pub max_air_time: f64,
    pub avg_cornering_score: f64,
}

impl RideMetrics {
    pub fn compute(inputs: &MetricInputs<'_>) -> Self {
        let best_lap_time = inputs
            .lap_times
            .iter()
            .copied()
            .fold(None, |best: Option<f64>, t| Some(best.map_or(t, |b| b.min(t))))
            .unwrap_or(0.0);
        let max_air_time = inputs.jump_durations.iter().copied().fold(0.0, f64::max);

        Self {
            avg_speed: ratio_or_zero(inputs.total_distance, inputs.total_time),
            avg_moving_speed: ratio_or_zero(inputs.total_distance, inputs.moving_time),
            max_speed: inputs.max_speed,
            best_lap_time,
            avg_lap_time: mean_or_zero(inputs.lap_times.iter().copied()),
            braking_efficiency: inputs.mean_braking,
            accel_efficiency: inputs.mean_acceleration,
            avg_corner_speed: inputs.mean_corner_speed,
            avg_air_time: mean_or_zero(inputs.jump_durations.iter().copied()),
            max_air_time,
            avg_cornering_score: inputs.mean_cornering_score,
        }
    }

    pub fn avg_speed_mph(&self) -> f64 {
        self.avg_speed * MPS_TO_MPH
    }

    pub fn avg_moving_speed_mph(&self) -> f64 {
        self.avg_moving_speed * MPS_TO_MPH
    }

    pub fn max_speed_mph(&self) -> f64 {
        self.max_speed * MPS_TO_MPH
    }

    pub fn avg_corner_speed_mph(&self) -> f64 {
        self.avg_corner_speed * MPS_TO_MPH
    }
}

fn ratio_or_zero(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Immutable record of a finished session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSummary {
    pub session_id: String,
    /// RFC 3339 wall-clock time of `start()`
    pub started_at: String,
    pub bike_details: BikeDetails,
    pub weather: Weather,
    pub track_data: TrackData,
    pub test_data: Vec<TestRecord>,
    pub avg_hpe: f64,
    pub test_duration_minutes: f64,
    pub laps: u32,
    pub lap_times: Vec<f64>,
    pub max_speed: f64,
    pub air_time: f64,
    pub avg_cornering_score: f64,
    pub accel_history: Vec<AccelHistoryEntry>,
    pub start_coordinates: Coordinates,
    pub total_distance: f64,
    pub total_time: f64,
    pub moving_time: f64,
    pub jump_count: u32,
    pub corner_speeds: Vec<f64>,
    pub braking_events: Vec<f64>,
    pub accel_events: Vec<f64>,
    pub jump_durations: Vec<f64>,
}

impl SessionSummary {
    pub fn metrics(&self) -> RideMetrics {
        RideMetrics::compute(&MetricInputs {
            total_distance: self.total_distance,
            total_time: self.total_time,
            moving_time: self.moving_time,
            max_speed: self.max_speed,
            lap_times: &self.lap_times,
            jump_durations: &self.jump_durations,
            mean_braking: mean_or_zero(self.braking_events.iter().copied()),
            mean_acceleration: mean_or_zero(self.accel_events.iter().copied()),
            mean_corner_speed: mean_or_zero(self.corner_speeds.iter().copied()),
            mean_cornering_score: self.avg_cornering_score,
        })
    }

    /// Percentage improvement from the first to the last lap; 0.0 with fewer
    /// than two laps. Negative when the rider slowed down.
    pub fn lap_improvement_percent(&self) -> f64 {
        match (self.lap_times.first(), self.lap_times.last()) {
            (Some(&first), Some(&last)) if self.lap_times.len() > 1 && first > 0.0 => {
                (first - last) / first * 100.0
            }
            _ => 0.0,
        }
    }

    /// Lap-improvement score, rounded and capped at 100
    pub fn session_score(&self) -> i32 {
        (self.lap_improvement_percent().round() as i32).min(100)
    }

    /// Like `session_score` but never negative
    pub fn progress_percent(&self) -> u32 {
        self.session_score().max(0) as u32
    }

    /// Lap times as "41.2-39.8-40.1", or "N/A" without laps
    pub fn lap_consistency(&self) -> String {
        if self.lap_times.is_empty() {
            return "N/A".to_string();
        }
        self.lap_times
            .iter()
            .map(|t| format!("{:.1}", t))
            .collect::<Vec<_>>()
            .join("-")
    }

    /// Mean speed over the recent accelerometer history (m/s)
    pub fn throttle_consistency(&self) -> f64 {
        mean_or_zero(self.accel_history.iter().map(|e| e.speed))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
