//! GPS + accelerometer fusion for off-road ride analytics.
//!
//! A `Session` consumes GPS fixes and accelerometer samples, dead-reckons a
//! fused position between fixes, detects laps, jumps, corners and speed
//! changes, and on stop produces a `SessionSummary`. `engine` runs a session
//! on its own thread behind a cloneable handle.

pub mod accuracy;
pub mod advisory;
pub mod config;
pub mod context;
pub mod detectors;
pub mod engine;
pub mod error;
pub mod fusion;
pub mod geo;
pub mod replay;
pub mod session;
pub mod summary;
pub mod types;
pub mod window;

pub use config::TrackerConfig;
pub use context::{BikeDetails, SessionContext, TrackData, Weather};
pub use engine::{Engine, EngineHandle};
pub use error::{SessionError, SessionResult};
pub use session::{LiveSnapshot, Session, SessionState};
pub use summary::{RideMetrics, SessionSummary};
pub use types::{AccelSample, Coordinates, FusedPosition, GpsFix, GpsReading, SensorEvent};
