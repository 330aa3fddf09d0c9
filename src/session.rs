use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::accuracy::AccuracyEstimator;
use crate::advisory::tracking_advisory;
use crate::config::TrackerConfig;
use crate::context::SessionContext;
use crate::detectors::{AirborneDetector, BrakingDetector, CorneringDetector, LapDetector};
use crate::error::{SessionError, SessionResult};
use crate::fusion::FusionEstimator;
use crate::geo::distance_meters;
use crate::summary::{AccelHistoryEntry, MetricInputs, RideMetrics, SessionSummary, TestRecord};
use crate::types::{AccelSample, Coordinates, FusedPosition, GpsFix, GpsReading, SensorEvent};
use crate::window::RollingWindow;

/// Session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Created, not recording yet
    Idle,
    /// Recording and accruing metrics
    Running,
    /// Fully frozen: accelerometer input is dropped
    Paused,
    /// Summary emitted; all input is ignored
    Stopped,
}

/// Live view refreshed on every fused update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveSnapshot {
    pub session_id: String,
    pub started_at: Option<String>,
    pub state: SessionState,
    pub fused_position: Option<FusedPosition>,
    pub current_hpe: Option<f64>,
    pub avg_hpe: Option<f64>,
    pub advisory: String,
    pub path: Vec<Coordinates>,
    pub laps: u32,
    pub lap_times: Vec<f64>,
    pub jump_count: u32,
    pub air_time: f64,
    pub total_distance: f64,
    pub gps_available: bool,
    pub metrics: RideMetrics,
}

/// One recording: owns the estimator, detectors and all rolling state.
///
/// Every method takes `&mut self`; serialising access (see `engine`) is
/// what makes the two sensor streams merge deterministically.
pub struct Session {
    session_id: String,
    started_at: Option<String>,
    config: TrackerConfig,
    context: SessionContext,
    state: SessionState,

    fusion: FusionEstimator,
    accuracy: AccuracyEstimator,
    laps: LapDetector,
    airborne: AirborneDetector,
    cornering: CorneringDetector,
    braking: BrakingDetector,

    accel_history: RollingWindow<AccelHistoryEntry>,
    test_data: Vec<TestRecord>,
    path: Vec<Coordinates>,
    advisory: &'static str,

    start_coordinates: Option<Coordinates>,
    last_event_ts: Option<f64>,
    last_running_fix: Option<GpsFix>,
    gps_available: bool,

    total_distance: f64,
    total_time: f64,
    moving_time: f64,
    max_speed: f64,
}

impl Session {
    /// Create new session in Idle state
    pub fn new(context: SessionContext, config: TrackerConfig) -> Self {
        let session_id = format!("ride_{}", Utc::now().timestamp_millis());
        Session {
            session_id,
            started_at: None,
            fusion: FusionEstimator::new(&config),
            accuracy: AccuracyEstimator::new(),
            laps: LapDetector::new(config.lap_tolerance_deg),
            airborne: AirborneDetector::new(&config),
            cornering: CorneringDetector::new(config.corner_intensity_threshold, config.window_capacity),
            braking: BrakingDetector::new(&config),
            accel_history: RollingWindow::new(config.window_capacity),
            test_data: Vec::new(),
            path: Vec::new(),
            advisory: tracking_advisory(None),
            start_coordinates: None,
            last_event_ts: None,
            last_running_fix: None,
            gps_available: false,
            total_distance: 0.0,
            total_time: 0.0,
            moving_time: 0.0,
            max_speed: 0.0,
            state: SessionState::Idle,
            context,
            config,
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────────

    /// Idle/Stopped → Running. Re-initialises every accumulator.
    pub fn start(&mut self) -> SessionResult<()> {
        match self.state {
            SessionState::Running => return Err(SessionError::AlreadyRunning),
            SessionState::Paused => {
                return Err(SessionError::InvalidState("Paused, resume instead".to_string()))
            }
            SessionState::Idle | SessionState::Stopped => {}
        }

        let now = self.last_event_ts.unwrap_or(0.0);
        self.start_coordinates = self.fusion.last_fix().map(GpsFix::coordinates);
        self.laps.arm(self.start_coordinates, now);
        self.accuracy.reset();
        self.airborne.reset();
        self.cornering.reset();
        self.braking.reset();
        self.accel_history.clear();
        self.test_data.clear();
        self.path.clear();
        self.advisory = tracking_advisory(None);
        self.last_running_fix = None;
        self.total_distance = 0.0;
        self.total_time = 0.0;
        self.moving_time = 0.0;
        self.max_speed = 0.0;
        self.fusion.reset_motion();
        self.fusion.mark_time(now);

        self.started_at = Some(Utc::now().to_rfc3339());
        self.state = SessionState::Running;

        match self.start_coordinates {
            Some(c) => log::info!(
                "Session {} started at {:.6}, {:.6}",
                self.session_id,
                c.latitude,
                c.longitude
            ),
            None => log::warn!(
                "Session {} started without a GPS fix, lap timing disabled",
                self.session_id
            ),
        }
        Ok(())
    }

    /// Running → Paused
    pub fn pause(&mut self) -> SessionResult<()> {
        match self.state {
            SessionState::Running => {
                self.state = SessionState::Paused;
                // Travel while paused must not count as distance
                self.last_running_fix = None;
                log::info!("Session {} paused", self.session_id);
                Ok(())
            }
            SessionState::Paused => Err(SessionError::InvalidState("Already paused".to_string())),
            SessionState::Idle | SessionState::Stopped => Err(SessionError::NotRunning),
        }
    }

    /// Paused → Running
    pub fn resume(&mut self) -> SessionResult<()> {
        match self.state {
            SessionState::Paused => {
                if let Some(ts) = self.last_event_ts {
                    self.fusion.mark_time(ts);
                }
                self.state = SessionState::Running;
                log::info!("Session {} resumed", self.session_id);
                Ok(())
            }
            SessionState::Running => Err(SessionError::InvalidState("Not paused".to_string())),
            SessionState::Idle | SessionState::Stopped => Err(SessionError::NotRunning),
        }
    }

    /// Running/Paused → Stopped, producing the immutable summary.
    pub fn stop(&mut self) -> SessionResult<SessionSummary> {
        match self.state {
            SessionState::Running | SessionState::Paused => {
                self.state = SessionState::Stopped;
                let summary = self.build_summary();
                log::info!(
                    "Session {} stopped: {} laps, {} jumps, {:.1} m in {:.1} s",
                    self.session_id,
                    summary.laps,
                    summary.jump_count,
                    summary.total_distance,
                    summary.total_time
                );
                Ok(summary)
            }
            SessionState::Idle | SessionState::Stopped => Err(SessionError::NotRunning),
        }
    }

    // ── Sensor feeds ─────────────────────────────────────────────────────

    pub fn handle_event(&mut self, event: &SensorEvent) {
        match event {
            SensorEvent::Gps(reading) => self.on_gps(reading),
            SensorEvent::Accel(sample) => self.on_accel(sample),
        }
    }

    pub fn on_gps(&mut self, reading: &GpsReading) {
        if self.state == SessionState::Stopped {
            return;
        }
        match reading {
            GpsReading::Unavailable(reason) => {
                if self.gps_available {
                    log::warn!("GPS lost: {}", reason);
                } else {
                    log::debug!("GPS unavailable: {}", reason);
                }
                self.gps_available = false;
            }
            GpsReading::Fix(fix) => self.on_gps_fix(fix),
        }
    }

    fn on_gps_fix(&mut self, fix: &GpsFix) {
        self.gps_available = true;
        self.last_event_ts = Some(fix.timestamp);
        // Re-anchor in every live state so start/resume see the freshest fix
        self.fusion.on_gps_fix(fix);

        if self.state != SessionState::Running {
            return;
        }

        let position = fix.coordinates();
        if let Some(prev) = &self.last_running_fix {
            self.total_distance +=
                distance_meters(prev.latitude, prev.longitude, fix.latitude, fix.longitude);
        }
        self.last_running_fix = Some(fix.clone());
        self.path.push(position);

        let speed = fix.valid_speed();
        if let Some(s) = speed {
            self.max_speed = self.max_speed.max(s);
        }
        self.laps.update(position, fix.timestamp);
        if let Some(change) = self.braking.update(speed, fix.timestamp) {
            log::debug!("Speed change at t={:.2}s: {:?}", fix.timestamp, change);
        }
    }

    pub fn on_accel(&mut self, sample: &AccelSample) {
        if matches!(self.state, SessionState::Paused | SessionState::Stopped) {
            return;
        }
        self.last_event_ts = Some(sample.timestamp);

        let Some(step) = self.fusion.on_accel_sample(sample) else {
            return;
        };
        if self.state != SessionState::Running {
            return;
        }

        self.total_time += step.dt;
        // Stale samples carry no speed: nothing speed-derived accrues
        if let Some(speed) = step.speed {
            if speed > self.config.moving_speed_threshold {
                self.moving_time += step.dt;
            }
            self.max_speed = self.max_speed.max(speed);
        }

        self.airborne.update(sample.z, sample.timestamp, step.dt);
        self.cornering.update(sample.x, sample.y, step.speed);

        if let Some(fused) = step.fused {
            self.on_fused_update(sample, fused, step.speed);
        }
    }

    fn on_fused_update(&mut self, sample: &AccelSample, fused: FusedPosition, speed: Option<f64>) {
        let Some(fix) = self.fusion.last_fix().cloned() else {
            return;
        };
        let hpe = self.accuracy.record(&fix, &fused);
        self.advisory = tracking_advisory(Some(hpe));
        self.test_data.push(TestRecord {
            timestamp: sample.timestamp,
            gps: fix,
            fused,
            hpe,
        });
        self.accel_history.push(AccelHistoryEntry {
            x: sample.x,
            y: sample.y,
            z: sample.z,
            speed: speed.unwrap_or(0.0),
        });
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn metrics(&self) -> RideMetrics {
        RideMetrics::compute(&MetricInputs {
            total_distance: self.total_distance,
            total_time: self.total_time,
            moving_time: self.moving_time,
            max_speed: self.max_speed,
            lap_times: self.laps.lap_times(),
            jump_durations: self.airborne.jump_durations(),
            mean_braking: self.braking.braking_efficiency(),
            mean_acceleration: self.braking.acceleration_efficiency(),
            mean_corner_speed: self.cornering.corner_speeds().mean(),
            mean_cornering_score: self.cornering.cornering_score(),
        })
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        LiveSnapshot {
            session_id: self.session_id.clone(),
            started_at: self.started_at.clone(),
            state: self.state,
            fused_position: self.fusion.fused_position(),
            current_hpe: self.accuracy.current(),
            avg_hpe: self.accuracy.average(),
            advisory: self.advisory.to_string(),
            path: self.path.clone(),
            laps: self.laps.lap_count(),
            lap_times: self.laps.lap_times().to_vec(),
            jump_count: self.airborne.jump_count(),
            air_time: self.airborne.air_time(),
            total_distance: self.total_distance,
            gps_available: self.gps_available,
            metrics: self.metrics(),
        }
    }

    fn build_summary(&self) -> SessionSummary {
        let test_duration_minutes = match (self.test_data.first(), self.test_data.last()) {
            (Some(first), Some(last)) => (last.timestamp - first.timestamp) / 60.0,
            _ => 0.0,
        };

        SessionSummary {
            session_id: self.session_id.clone(),
            started_at: self.started_at.clone().unwrap_or_default(),
            bike_details: self.context.bike.clone(),
            weather: self.context.weather.clone(),
            track_data: self.context.track.clone(),
            test_data: self.test_data.clone(),
            avg_hpe: self.accuracy.average().unwrap_or(0.0),
            test_duration_minutes,
            laps: self.laps.lap_count(),
            lap_times: self.laps.lap_times().to_vec(),
            max_speed: self.max_speed,
            air_time: self.airborne.air_time(),
            avg_cornering_score: self.cornering.cornering_score(),
            accel_history: self.accel_history.to_vec(),
            start_coordinates: self.start_coordinates.unwrap_or_default(),
            total_distance: self.total_distance,
            total_time: self.total_time,
            moving_time: self.moving_time,
            jump_count: self.airborne.jump_count(),
            corner_speeds: self.cornering.corner_speeds().to_vec(),
            braking_events: self.braking.braking_events().to_vec(),
            accel_events: self.braking.acceleration_events().to_vec(),
            jump_durations: self.airborne.jump_durations().to_vec(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionContext::default(), TrackerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn fix(lat: f64, lon: f64, speed: Option<f64>, ts: f64) -> SensorEvent {
        SensorEvent::Gps(GpsReading::Fix(GpsFix::new(lat, lon, speed, ts)))
    }

    fn accel(x: f64, y: f64, z: f64, ts: f64) -> SensorEvent {
        SensorEvent::Accel(AccelSample::new(x, y, z, ts))
    }

    #[test]
    fn test_session_state_transitions() {
        let mut session = Session::default();
        assert_eq!(session.state(), SessionState::Idle);

        session.start().unwrap();
        assert!(session.is_running());

        session.pause().unwrap();
        assert_eq!(session.state(), SessionState::Paused);

        session.resume().unwrap();
        assert_eq!(session.state(), SessionState::Running);

        session.stop().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_invalid_transitions_are_noops() {
        let mut session = Session::default();

        assert_eq!(session.pause(), Err(SessionError::NotRunning));
        assert_eq!(session.resume(), Err(SessionError::NotRunning));
        assert!(session.stop().is_err());
        assert_eq!(session.state(), SessionState::Idle);

        session.start().unwrap();
        assert_eq!(session.start(), Err(SessionError::AlreadyRunning));
        assert!(session.resume().is_err());
        assert_eq!(session.state(), SessionState::Running);

        session.pause().unwrap();
        assert!(session.pause().is_err());
        assert_eq!(session.state(), SessionState::Paused);

        session.stop().unwrap();
        assert!(session.stop().is_err());
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_stop_without_data() {
        let mut session = Session::default();
        session.start().unwrap();
        let summary = session.stop().unwrap();

        assert_eq!(summary.avg_hpe, 0.0);
        assert_eq!(summary.test_duration_minutes, 0.0);
        assert_eq!(summary.laps, 0);
        assert_eq!(summary.max_speed, 0.0);
        assert_eq!(summary.total_distance, 0.0);
        assert_eq!(summary.total_time, 0.0);
        assert_eq!(summary.moving_time, 0.0);
        assert_eq!(summary.jump_count, 0);
        assert_eq!(summary.avg_cornering_score, 0.0);
        assert_eq!(summary.start_coordinates, Coordinates::default());
        assert!(summary.test_data.is_empty());
        assert!(summary.lap_times.is_empty());
        assert!(summary.accel_history.is_empty());
        assert!(summary.corner_speeds.is_empty());
        assert!(summary.braking_events.is_empty());
        assert!(summary.accel_events.is_empty());
        assert!(summary.jump_durations.is_empty());
        assert_eq!(summary.metrics(), RideMetrics::default());
    }

    #[test]
    fn test_lap_counting_from_start_fix() {
        let mut session = Session::default();
        session.handle_event(&fix(40.0, -75.0, None, 0.0));
        session.start().unwrap();

        session.handle_event(&fix(40.001, -75.0, None, 10.0));
        session.handle_event(&fix(40.0, -75.0, None, 20.0));
        assert_eq!(session.snapshot().laps, 0);

        session.handle_event(&fix(40.001, -75.0, None, 30.0));
        session.handle_event(&fix(40.00005, -75.00005, None, 42.0));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.laps, 1);
        // Timed from start, the skipped first return does not reset the clock
        assert_eq!(snapshot.lap_times, vec![42.0]);

        let summary = session.stop().unwrap();
        assert_eq!(summary.start_coordinates, Coordinates::new(40.0, -75.0));
        assert_eq!(summary.laps, 1);
        assert_eq!(summary.metrics().best_lap_time, 42.0);
    }

    #[test]
    fn test_distance_once_per_fix_pair() {
        let mut session = Session::default();
        session.start().unwrap();
        session.handle_event(&fix(0.0, 0.0, None, 0.0));
        for i in 1..=99 {
            session.handle_event(&accel(0.0, 0.0, 1.0, i as f64 * 0.01));
        }
        session.handle_event(&fix(0.0, 0.001, None, 1.0));
        for i in 1..=50 {
            session.handle_event(&accel(0.0, 0.0, 1.0, 1.0 + i as f64 * 0.01));
        }

        assert_eq!(session.snapshot().path.len(), 2);
        let summary = session.stop().unwrap();
        assert_abs_diff_eq!(summary.total_distance, 111.19, epsilon = 0.01);
    }

    #[test]
    fn test_braking_from_gps_speeds() {
        let mut session = Session::default();
        session.start().unwrap();
        session.handle_event(&fix(40.0, -75.0, Some(10.0), 0.0));
        session.handle_event(&fix(40.0, -75.0001, Some(10.0), 1.0));
        session.handle_event(&fix(40.0, -75.0002, Some(4.0), 2.0));

        let summary = session.stop().unwrap();
        assert_eq!(summary.braking_events, vec![6.0]);
        assert!(summary.accel_events.is_empty());
        assert_eq!(summary.max_speed, 10.0);
        assert_eq!(summary.metrics().braking_efficiency, 6.0);
    }

    #[test]
    fn test_jump_through_session() {
        let mut session = Session::default();
        session.handle_event(&fix(40.0, -75.0, Some(8.0), 0.0));
        session.start().unwrap();

        session.handle_event(&accel(0.0, 0.0, 0.9, 0.01));
        for i in 2..=62 {
            session.handle_event(&accel(0.0, 0.0, 0.3, i as f64 * 0.01));
        }
        session.handle_event(&accel(0.0, 0.0, 0.9, 0.63));

        let summary = session.stop().unwrap();
        assert_eq!(summary.jump_count, 1);
        assert_abs_diff_eq!(summary.jump_durations[0], 0.61, epsilon = 0.02);
        assert!(summary.air_time > 0.0);
    }

    #[test]
    fn test_paused_session_is_frozen() {
        let mut session = Session::default();
        session.handle_event(&fix(40.0, -75.0, Some(5.0), 0.0));
        session.start().unwrap();
        for i in 1..=10 {
            session.handle_event(&accel(1.0, 0.0, 1.0, i as f64 * 0.01));
        }
        let before = session.snapshot();

        session.pause().unwrap();
        for i in 11..=90 {
            session.handle_event(&accel(1.0, 0.0, 0.1, i as f64 * 0.01));
        }
        session.handle_event(&fix(40.01, -75.0, Some(5.0), 0.95));
        let during = session.snapshot();
        assert_eq!(during.metrics.avg_speed, before.metrics.avg_speed);
        assert_eq!(during.total_distance, 0.0);
        assert_eq!(during.air_time, 0.0);
        assert_eq!(during.path.len(), before.path.len());

        session.resume().unwrap();
        session.handle_event(&accel(0.0, 0.0, 1.0, 0.96));
        let summary = session.stop().unwrap();
        // Pause interval excluded from elapsed time
        assert!(summary.total_time < 0.2, "total_time {}", summary.total_time);
        assert_eq!(summary.jump_count, 0);
    }

    #[test]
    fn test_stopped_session_ignores_events() {
        let mut session = Session::default();
        session.start().unwrap();
        session.stop().unwrap();

        session.handle_event(&fix(40.0, -75.0, Some(5.0), 0.0));
        session.handle_event(&accel(1.0, 1.0, 1.0, 0.01));
        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, SessionState::Stopped);
        assert!(snapshot.fused_position.is_none());
        assert!(!snapshot.gps_available);
    }

    #[test]
    fn test_gps_unavailable_degrades() {
        let mut session = Session::default();
        session.handle_event(&SensorEvent::Gps(GpsReading::Unavailable(
            "No Permission".to_string(),
        )));
        session.start().unwrap();
        for i in 1..=20 {
            session.handle_event(&accel(1.0, 1.0, 0.2, i as f64 * 0.01));
        }
        let snapshot = session.snapshot();
        assert!(snapshot.fused_position.is_none());
        assert_eq!(snapshot.current_hpe, None);
        assert_eq!(snapshot.advisory, "awaiting data");
        assert_eq!(snapshot.metrics.max_speed, 0.0);
        assert!(session.stop().is_ok());
    }

    #[test]
    fn test_fused_updates_feed_hpe_and_history() {
        let mut session = Session::default();
        session.handle_event(&fix(40.0, -75.0, Some(6.0), 0.0));
        session.start().unwrap();
        for i in 1..=50 {
            session.handle_event(&accel(0.6, 0.0, 1.0, i as f64 * 0.01));
        }

        let snapshot = session.snapshot();
        assert!(snapshot.current_hpe.is_some());
        assert!(snapshot.avg_hpe.is_some());
        assert_eq!(snapshot.advisory, "tracking good");
        assert!(snapshot.metrics.avg_cornering_score > 0.5);

        let summary = session.stop().unwrap();
        assert!(!summary.test_data.is_empty());
        assert!(summary.test_data.len() <= 6);
        assert_eq!(summary.accel_history.len(), summary.test_data.len());
        assert_eq!(summary.corner_speeds.len(), 50);
        assert!(summary.corner_speeds.iter().all(|s| *s == 6.0));
        assert_abs_diff_eq!(summary.total_time, 0.5, epsilon = 1e-9);
        assert_abs_diff_eq!(summary.moving_time, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_stale_fix_stops_speed_accrual() {
        let config = TrackerConfig {
            window_capacity: 500,
            ..TrackerConfig::default()
        };
        let mut session = Session::new(SessionContext::default(), config);
        session.handle_event(&fix(40.0, -75.0, Some(8.0), 0.0));
        session.start().unwrap();
        // GPS drops out: samples run on to ~2 s after the last fix
        for i in 0..200 {
            session.handle_event(&accel(1.0, 0.0, 1.0, 0.005 + i as f64 * 0.01));
        }

        let summary = session.stop().unwrap();
        assert_abs_diff_eq!(summary.total_time, 1.995, epsilon = 1e-6);
        assert_abs_diff_eq!(summary.moving_time, 0.995, epsilon = 1e-6);
        assert_eq!(summary.max_speed, 8.0);
        assert_eq!(summary.corner_speeds.len(), 100);
        assert_eq!(summary.avg_cornering_score, 1.0);
        assert!(summary
            .accel_history
            .iter()
            .filter(|e| e.speed == 0.0)
            .count()
            > 0);
    }

    #[test]
    fn test_start_time_reaches_snapshot_and_summary() {
        let mut session = Session::default();
        assert_eq!(session.snapshot().started_at, None);

        session.start().unwrap();
        let started = session.snapshot().started_at.unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&started).is_ok());

        let summary = session.stop().unwrap();
        assert_eq!(summary.started_at, started);
        assert_eq!(summary.session_id, session.session_id());
    }

    #[test]
    fn test_restart_after_stop_reinitialises() {
        let mut session = Session::default();
        session.handle_event(&fix(40.0, -75.0, Some(9.0), 0.0));
        session.start().unwrap();
        session.handle_event(&fix(40.001, -75.0, Some(9.0), 1.0));
        session.stop().unwrap();

        session.start().unwrap();
        let summary = session.stop().unwrap();
        assert_eq!(summary.total_distance, 0.0);
        assert_eq!(summary.max_speed, 0.0);
        assert_eq!(summary.start_coordinates, Coordinates::new(40.001, -75.0));
    }
}
