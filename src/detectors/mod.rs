//! Stateful ride event detectors
//!
//! Each detector owns its own state and exposes an `update` that is fed by
//! the session: lap and braking on GPS fixes, airborne and cornering on
//! accelerometer samples.

pub mod airborne;
pub mod braking;
pub mod cornering;
pub mod lap;

pub use airborne::AirborneDetector;
pub use braking::BrakingDetector;
pub use cornering::CorneringDetector;
pub use lap::{LapDetector, LapPhase};
