//! Lap counting by re-entry into a small box around the start coordinate.
//!
//! Only an outside → inside transition is an entry, so sitting inside the
//! box never double counts. The first entry after the session starts is
//! skipped; laps are counted from the second entry on. The lap clock runs
//! from session start, so the first lap includes the skipped entry.

use serde::{Deserialize, Serialize};

use crate::types::Coordinates;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum LapPhase {
    /// No start reference (no fix when the session started)
    NotArmed,
    /// Start reference known; `primed` once the out-lap has been closed
    Armed { primed: bool },
}

#[derive(Clone, Debug)]
pub struct LapDetector {
    tolerance_deg: f64,
    phase: LapPhase,
    start: Option<Coordinates>,
    inside: bool,
    lap_start_ts: f64,
    lap_times: Vec<f64>,
}

impl LapDetector {
    pub fn new(tolerance_deg: f64) -> Self {
        Self {
            tolerance_deg,
            phase: LapPhase::NotArmed,
            start: None,
            inside: false,
            lap_start_ts: 0.0,
            lap_times: Vec::new(),
        }
    }

    /// Reset and take `start` as the crossing reference.
    pub fn arm(&mut self, start: Option<Coordinates>, now: f64) {
        self.lap_times.clear();
        self.lap_start_ts = now;
        self.start = start;
        // The rider begins at the start point: leave first, then return
        self.inside = start.is_some();
        self.phase = match start {
            Some(_) => LapPhase::Armed { primed: false },
            None => LapPhase::NotArmed,
        };
    }

    /// Feed a position; returns the lap time when a lap completes.
    pub fn update(&mut self, position: Coordinates, now: f64) -> Option<f64> {
        let start = self.start?;
        let in_box = (position.latitude - start.latitude).abs() < self.tolerance_deg
            && (position.longitude - start.longitude).abs() < self.tolerance_deg;
        let entered = in_box && !self.inside;
        self.inside = in_box;
        if !entered {
            return None;
        }

        match self.phase {
            LapPhase::NotArmed => None,
            LapPhase::Armed { primed: false } => {
                log::debug!("First return to start at t={:.2}s, not counted", now);
                self.phase = LapPhase::Armed { primed: true };
                None
            }
            LapPhase::Armed { primed: true } => {
                let lap_time = (now - self.lap_start_ts).max(0.0);
                self.lap_times.push(lap_time);
                self.lap_start_ts = now;
                log::info!("Lap {} completed in {:.1}s", self.lap_times.len(), lap_time);
                Some(lap_time)
            }
        }
    }

    pub fn phase(&self) -> LapPhase {
        self.phase
    }

    pub fn lap_count(&self) -> u32 {
        self.lap_times.len() as u32
    }

    pub fn lap_times(&self) -> &[f64] {
        &self.lap_times
    }

    pub fn last_lap_time(&self) -> Option<f64> {
        self.lap_times.last().copied()
    }
}
