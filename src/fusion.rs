// fusion.rs: dead-reckoning estimator between GPS fixes
//
// Pure computation: no clocks, no I/O. Time comes from the sample timestamps,
// so recorded sessions replay deterministically.
//
// Model: every GPS fix re-anchors the position and zeroes velocity. Between
// fixes the horizontal accelerometer axes are integrated into a velocity.
// A fused update offsets the last fix by v·dt of the current sample only,
// not by the distance covered since the fix. No bias, gravity or heading
// compensation.

use nalgebra::Vector2;

use crate::config::TrackerConfig;
use crate::geo::local_offset_to_degrees;
use crate::types::{AccelSample, FusedPosition, GpsFix};

/// Result of feeding one accelerometer sample
#[derive(Clone, Debug, PartialEq)]
pub struct AccelStep {
    /// Seconds since the previously processed sample (or fix)
    pub dt: f64,
    /// GPS-reported speed if present, else the integrated velocity magnitude.
    /// `None` for stale samples.
    pub speed: Option<f64>,
    /// True if the last fix was too old and velocity was zeroed
    pub stale: bool,
    /// Present only when the throttle interval elapsed
    pub fused: Option<FusedPosition>,
}

pub struct FusionEstimator {
    stale_fix_secs: f64,
    update_interval_secs: f64,

    last_fix: Option<GpsFix>,
    velocity: Vector2<f64>,
    fused: Option<FusedPosition>,
    last_fused_update: Option<f64>,
    last_sample_ts: Option<f64>,
}

impl FusionEstimator {
    pub fn new(config: &TrackerConfig) -> Self {
        Self {
            stale_fix_secs: config.stale_fix_secs,
            update_interval_secs: config.fused_update_interval_secs,
            last_fix: None,
            velocity: Vector2::zeros(),
            fused: None,
            last_fused_update: None,
            last_sample_ts: None,
        }
    }

    // ── Sensor feeds ─────────────────────────────────────────────────────

    /// Re-anchor on a new fix. Returns the anchored position.
    pub fn on_gps_fix(&mut self, fix: &GpsFix) -> FusedPosition {
        let anchored = FusedPosition::from(fix);
        self.velocity = Vector2::zeros();
        self.fused = Some(anchored);
        self.last_fix = Some(fix.clone());
        anchored
    }

    /// Integrate one accelerometer sample. `None` until the first fix.
    pub fn on_accel_sample(&mut self, sample: &AccelSample) -> Option<AccelStep> {
        let fix = self.last_fix.as_ref()?;

        let reference_ts = match self.last_sample_ts {
            Some(ts) if ts >= fix.timestamp => ts,
            _ => fix.timestamp,
        };
        let dt = (sample.timestamp - reference_ts).max(0.0);
        self.last_sample_ts = Some(sample.timestamp);

        let since_fix = sample.timestamp - fix.timestamp;
        let stale = since_fix >= self.stale_fix_secs;
        let speed = if stale {
            self.velocity = Vector2::zeros();
            None
        } else {
            self.velocity += Vector2::new(sample.x, sample.y) * dt;
            Some(fix.valid_speed().unwrap_or_else(|| self.velocity.norm()))
        };

        let due = self
            .last_fused_update
            .map_or(true, |last| sample.timestamp - last >= self.update_interval_secs);
        let fused = if due {
            let offset = self.velocity * dt;
            let (d_lat, d_lon) = local_offset_to_degrees(offset.x, offset.y, fix.latitude);
            let position = FusedPosition::new(fix.latitude + d_lat, fix.longitude + d_lon);
            self.fused = Some(position);
            self.last_fused_update = Some(sample.timestamp);
            Some(position)
        } else {
            None
        };

        Some(AccelStep {
            dt,
            speed,
            stale,
            fused,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn velocity(&self) -> (f64, f64) {
        (self.velocity.x, self.velocity.y)
    }

    pub fn speed(&self) -> f64 {
        self.velocity.norm()
    }

    pub fn fused_position(&self) -> Option<FusedPosition> {
        self.fused
    }

    pub fn last_fix(&self) -> Option<&GpsFix> {
        self.last_fix.as_ref()
    }

    /// Treat `ts` as the last processed sample time so the next dt excludes
    /// the gap (session start, resume after pause).
    pub fn mark_time(&mut self, ts: f64) {
        self.last_sample_ts = Some(ts);
    }

    /// Drop integration state but keep the last fix as anchor.
    pub fn reset_motion(&mut self) {
        self.velocity = Vector2::zeros();
        self.last_sample_ts = None;
        self.last_fused_update = None;
        self.fused = self.last_fix.as_ref().map(FusedPosition::from);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn estimator() -> FusionEstimator {
        FusionEstimator::new(&TrackerConfig::default())
    }

    #[test]
    fn test_no_fix_is_noop() {
        let mut fusion = estimator();
        let step = fusion.on_accel_sample(&AccelSample::new(1.0, 1.0, 1.0, 0.5));
        assert!(step.is_none());
        assert!(fusion.fused_position().is_none());
    }

    #[test]
    fn test_fix_reanchors_and_zeroes_velocity() {
        let mut fusion = estimator();
        fusion.on_gps_fix(&GpsFix::new(40.0, -75.0, None, 0.0));
        for i in 1..=20 {
            fusion.on_accel_sample(&AccelSample::new(1.0, 0.0, 1.0, i as f64 * 0.01));
        }
        assert!(fusion.speed() > 0.0);

        let anchored = fusion.on_gps_fix(&GpsFix::new(40.001, -75.0, None, 0.25));
        assert_eq!(fusion.velocity(), (0.0, 0.0));
        assert_eq!(anchored, FusedPosition::new(40.001, -75.0));
        assert_eq!(fusion.fused_position(), Some(anchored));
    }

    #[test]
    fn test_stale_fix_forces_zero_velocity() {
        let mut fusion = estimator();
        fusion.on_gps_fix(&GpsFix::new(40.0, -75.0, None, 0.0));
        for i in 1..=50 {
            fusion.on_accel_sample(&AccelSample::new(2.0, 2.0, 1.0, i as f64 * 0.01));
        }
        assert!(fusion.speed() > 0.0);

        // Past the 1 s stale threshold every sample leaves velocity at zero
        for i in 0..200 {
            let step = fusion
                .on_accel_sample(&AccelSample::new(2.0, 2.0, 1.0, 1.0 + i as f64 * 0.01))
                .unwrap();
            assert!(step.stale);
            assert_eq!(step.speed, None);
            assert_eq!(fusion.velocity(), (0.0, 0.0));
        }
    }

    #[test]
    fn test_throttle_at_most_one_update_per_interval() {
        let mut fusion = estimator();
        fusion.on_gps_fix(&GpsFix::new(40.0, -75.0, None, 0.0));
        let updates = (0..50)
            .filter_map(|i| fusion.on_accel_sample(&AccelSample::new(0.1, 0.0, 1.0, 0.001 + i as f64 * 0.001)))
            .filter(|step| step.fused.is_some())
            .count();
        assert_eq!(updates, 1);
    }

    #[test]
    fn test_throttle_cadence_over_one_second() {
        let mut fusion = estimator();
        fusion.on_gps_fix(&GpsFix::new(40.0, -75.0, None, 0.0));
        let updates = (1..=95)
            .filter_map(|i| fusion.on_accel_sample(&AccelSample::new(0.0, 0.0, 1.0, i as f64 * 0.01)))
            .filter(|step| step.fused.is_some())
            .count();
        // First sample plus roughly one every 100 ms
        assert!(updates >= 9 && updates <= 10, "got {updates} updates");
    }

    #[test]
    fn test_integration_moves_north() {
        let mut fusion = estimator();
        fusion.on_gps_fix(&GpsFix::new(40.0, -75.0, None, 0.0));
        let mut last = None;
        for i in 1..=50 {
            if let Some(step) = fusion.on_accel_sample(&AccelSample::new(0.0, 1.0, 1.0, i as f64 * 0.01)) {
                if step.fused.is_some() {
                    last = step.fused;
                }
            }
        }
        let position = last.unwrap();
        assert!(position.latitude > 40.0);
        assert_abs_diff_eq!(position.longitude, -75.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fusion.velocity().1, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_fused_offset_uses_current_sample_dt() {
        let mut fusion = estimator();
        fusion.on_gps_fix(&GpsFix::new(0.0, 0.0, None, 0.0));
        let mut updates = 0;
        for i in 1..=91 {
            let step = fusion
                .on_accel_sample(&AccelSample::new(0.0, 1.0, 1.0, i as f64 * 0.01))
                .unwrap();
            if let Some(position) = step.fused {
                // Offset is v·dt of this sample, never the distance since the fix
                let expected = fusion.velocity().1 * step.dt / 111_000.0;
                assert_abs_diff_eq!(position.latitude, expected, epsilon = 1e-15);
                assert_eq!(position.longitude, 0.0);
                updates += 1;
            }
        }
        assert!(updates >= 9);
        assert_abs_diff_eq!(fusion.velocity().1, 0.91, epsilon = 1e-9);
        let last = fusion.fused_position().unwrap();
        assert!(last.latitude < 1e-7, "offset {}", last.latitude);
    }

    #[test]
    fn test_speed_prefers_gps() {
        let mut fusion = estimator();
        fusion.on_gps_fix(&GpsFix::new(40.0, -75.0, Some(12.0), 0.0));
        let step = fusion
            .on_accel_sample(&AccelSample::new(3.0, 4.0, 1.0, 0.01))
            .unwrap();
        assert_eq!(step.speed, Some(12.0));

        fusion.on_gps_fix(&GpsFix::new(40.0, -75.0, Some(-1.0), 1.0));
        let step = fusion
            .on_accel_sample(&AccelSample::new(3.0, 4.0, 1.0, 1.1))
            .unwrap();
        // |(3,4)| * 0.1 s
        assert_abs_diff_eq!(step.speed.unwrap(), 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_mark_time_skips_gap() {
        let mut fusion = estimator();
        fusion.on_gps_fix(&GpsFix::new(40.0, -75.0, None, 0.0));
        fusion.on_accel_sample(&AccelSample::new(0.0, 0.0, 1.0, 0.1));
        fusion.mark_time(0.8);
        let step = fusion
            .on_accel_sample(&AccelSample::new(0.0, 0.0, 1.0, 0.85))
            .unwrap();
        assert_abs_diff_eq!(step.dt, 0.05, epsilon = 1e-9);
    }

    #[test]
    fn test_out_of_order_sample_has_zero_dt() {
        let mut fusion = estimator();
        fusion.on_gps_fix(&GpsFix::new(40.0, -75.0, None, 1.0));
        fusion.on_accel_sample(&AccelSample::new(1.0, 0.0, 1.0, 1.2));
        let step = fusion
            .on_accel_sample(&AccelSample::new(1.0, 0.0, 1.0, 1.1))
            .unwrap();
        assert_eq!(step.dt, 0.0);
    }
}
