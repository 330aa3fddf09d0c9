//! Short rider-facing feedback strings.

use serde::{Deserialize, Serialize};

use crate::summary::SessionSummary;

pub const AWAITING_DATA: &str = "awaiting data";
pub const TRACKING_GOOD: &str = "tracking good";
pub const TRACKING_MODERATE: &str = "tracking moderate, caution on sharp turns";
pub const TRACKING_POOR: &str = "tracking poor, reduce speed or check signal";

/// Feedback on positional accuracy from the current HPE (meters)
pub fn tracking_advisory(hpe: Option<f64>) -> &'static str {
    match hpe {
        None => AWAITING_DATA,
        Some(h) if h < 2.0 => TRACKING_GOOD,
        Some(h) if h < 10.0 => TRACKING_MODERATE,
        Some(_) => TRACKING_POOR,
    }
}

/// `score` is the average cornering intensity in g
pub fn cornering_advisory(score: f64) -> &'static str {
    if score < 0.3 {
        "increase corner speed"
    } else {
        "reduce airtime for control"
    }
}

/// `consistency` is the mean recent speed in m/s
pub fn throttle_advisory(consistency: f64) -> &'static str {
    if consistency < 1.0 {
        "smooth acceleration"
    } else {
        "good control"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFeedback {
    pub tracking: String,
    pub cornering: String,
    pub throttle: String,
    pub throttle_consistency: f64,
}

/// Post-ride feedback, computed from summary fields only.
pub fn session_feedback(summary: &SessionSummary) -> SessionFeedback {
    let hpe = if summary.test_data.is_empty() {
        None
    } else {
        Some(summary.avg_hpe)
    };
    let throttle_consistency = summary.throttle_consistency();
    SessionFeedback {
        tracking: tracking_advisory(hpe).to_string(),
        cornering: cornering_advisory(summary.avg_cornering_score).to_string(),
        throttle: throttle_advisory(throttle_consistency).to_string(),
        throttle_consistency,
    }
}
