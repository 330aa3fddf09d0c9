//! Recorded ride logs: `{"readings": [{timestamp, accel?, gps?, gps_status?}]}`,
//! plain or gzipped.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use anyhow::Context;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};

use crate::types::{AccelSample, GpsFix, GpsReading, SensorEvent};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogReading {
    pub timestamp: f64,
    #[serde(default)]
    pub accel: Option<AccelSample>,
    #[serde(default)]
    pub gps: Option<GpsFix>,
    /// Set instead of `gps` when the provider reported no fix ("No Permission")
    #[serde(default)]
    pub gps_status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RideLog {
    #[serde(default)]
    pub readings: Vec<LogReading>,
}

/// The two sensor streams of a log, each in recorded order
#[derive(Debug, Clone, Default)]
pub struct SensorStreams {
    pub gps: Vec<GpsReading>,
    pub accel: Vec<AccelSample>,
}

impl RideLog {
    pub fn from_reader<R: Read>(reader: R) -> anyhow::Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn split(&self) -> SensorStreams {
        let mut streams = SensorStreams::default();
        for reading in &self.readings {
            if let Some(fix) = &reading.gps {
                streams.gps.push(GpsReading::Fix(fix.clone()));
            } else if let Some(status) = &reading.gps_status {
                streams.gps.push(GpsReading::Unavailable(status.clone()));
            }
            if let Some(sample) = reading.accel {
                streams.accel.push(sample);
            }
        }
        streams
    }

    /// Both streams merged into one event sequence ordered by sensor
    /// timestamp. On equal timestamps the GPS reading comes first so a
    /// sample is never integrated against a fix recorded after it.
    pub fn events(&self) -> Vec<SensorEvent> {
        let mut keyed: Vec<(f64, u8, SensorEvent)> = Vec::with_capacity(self.readings.len());
        for reading in &self.readings {
            if let Some(fix) = &reading.gps {
                keyed.push((fix.timestamp, 0, SensorEvent::Gps(GpsReading::Fix(fix.clone()))));
            } else if let Some(status) = &reading.gps_status {
                keyed.push((
                    reading.timestamp,
                    0,
                    SensorEvent::Gps(GpsReading::Unavailable(status.clone())),
                ));
            }
            if let Some(sample) = reading.accel {
                keyed.push((sample.timestamp, 1, SensorEvent::Accel(sample)));
            }
        }
        // Stable, so recorded order survives among equal keys
        keyed.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        keyed.into_iter().map(|(_, _, event)| event).collect()
    }
}

pub fn load_log(path: &Path) -> anyhow::Result<RideLog> {
    let file = File::open(path).with_context(|| format!("opening log {}", path.display()))?;
    let log = if path.extension().map(|e| e == "gz").unwrap_or(false) {
        RideLog::from_reader(BufReader::new(GzDecoder::new(file)))
    } else {
        RideLog::from_reader(BufReader::new(file))
    };
    log.with_context(|| format!("parsing log {}", path.display()))
}
