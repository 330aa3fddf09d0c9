use serde::{Deserialize, Serialize};

/// Bike setup entered before the ride. Not interpreted by the tracker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BikeDetails {
    pub track: String,
    pub date: String,
    pub make: String,
    pub model: String,
    pub front_tire: String,
    pub rear_tire: String,
    pub front_sprocket: String,
    pub rear_sprocket: String,
    pub map_tune: String,
    pub engine_displacement: String,
}

/// Ambient conditions, kept as display strings ("63%", "87F")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weather {
    pub humidity: String,
    pub temp: String,
}

impl Default for Weather {
    fn default() -> Self {
        Self {
            humidity: "N/A".to_string(),
            temp: "N/A".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackData {
    pub track_condition: String,
    /// Rider-entered rut rating, nominally 1-5
    pub ruts: String,
}

/// Static context handed in at session creation and passed through to the
/// summary untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionContext {
    pub bike: BikeDetails,
    pub weather: Weather,
    pub track: TrackData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_context_json() {
        let context: SessionContext =
            serde_json::from_str(r#"{"bike": {"make": "Yamaha", "model": "YZ250F"}}"#).unwrap();
        assert_eq!(context.bike.make, "Yamaha");
        assert_eq!(context.weather.temp, "N/A");
        assert!(context.track.ruts.is_empty());
    }
}
