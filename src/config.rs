use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::window::DEFAULT_WINDOW_CAPACITY;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Every tunable threshold of the tracker. Times are in seconds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    // ── Fusion ──
    pub stale_fix_secs: f64,
    pub fused_update_interval_secs: f64,

    // ── Lap detection ──
    pub lap_tolerance_deg: f64,

    // ── Airborne detection (g-units) ──
    pub airborne_z_threshold: f64,
    pub grounded_z_threshold: f64,
    pub airborne_debounce_secs: f64,

    // ── Cornering ──
    pub corner_intensity_threshold: f64,

    // ── Braking / acceleration (m/s²) ──
    pub braking_threshold: f64,
    pub acceleration_threshold: f64,

    // ── Session aggregation ──
    pub moving_speed_threshold: f64,
    pub window_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            stale_fix_secs: 1.0,
            fused_update_interval_secs: 0.1,
            lap_tolerance_deg: 0.0001,
            airborne_z_threshold: 0.5,
            grounded_z_threshold: 0.8,
            airborne_debounce_secs: 0.5,
            corner_intensity_threshold: 0.5,
            braking_threshold: 0.5,
            acceleration_threshold: 0.5,
            moving_speed_threshold: 0.5,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
        }
    }
}

impl TrackerConfig {
    /// Load overrides from a JSON file; missing keys keep their defaults.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: TrackerConfig = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.airborne_z_threshold > self.grounded_z_threshold {
            anyhow::bail!(
                "airborne threshold {} must not exceed grounded threshold {}",
                self.airborne_z_threshold,
                self.grounded_z_threshold
            );
        }
        if self.window_capacity == 0 {
            anyhow::bail!("window capacity must be positive");
        }
        if self.stale_fix_secs <= 0.0 || self.fused_update_interval_secs < 0.0 {
            anyhow::bail!("fusion intervals must be positive");
        }
        Ok(())
    }
}
