use std::path::Path;

use serde::{Deserialize, Deserializer};

use crate::error::OptionsError;

/// Settings applied to a batch of match queries.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchOptions {
    /// Maximum |Δt| in seconds for an exact match (default: 10)
    #[serde(default = "default_tolerance")]
    pub exact_match_tolerance: u32,

    /// Maximum gap in seconds between the two interpolation endpoints (default: unbounded)
    #[serde(default, deserialize_with = "unbounded_if_negative")]
    pub maximum_interpolation_interval: Option<u32>,

    /// Maximum distance in meters between the two interpolation endpoints (default: unbounded)
    #[serde(default, deserialize_with = "unbounded_if_negative")]
    pub maximum_interpolation_distance: Option<u32>,

    /// Signed seconds added to each capture time before searching (default: 0)
    #[serde(default)]
    pub camera_clock_deviation: i64,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            exact_match_tolerance: default_tolerance(),
            maximum_interpolation_interval: None,
            maximum_interpolation_distance: None,
            camera_clock_deviation: 0,
        }
    }
}

impl MatchOptions {
    pub fn from_json_str(json: &str) -> Result<Self, OptionsError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, OptionsError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

/// Options for exporting loaded tracks as GeoJSON.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportOptions {
    /// Include altitude as the 3rd coordinate value (default: true)
    #[serde(default = "default_true")]
    pub include_elevation: bool,

    /// Include first/last timestamps in properties (default: true)
    #[serde(default = "default_true")]
    pub include_time: bool,

    /// Join all segments of a track into one MultiLineString (default: true)
    #[serde(default = "default_true")]
    pub join_segments: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_elevation: true,
            include_time: true,
            join_segments: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_tolerance() -> u32 {
    10
}

/// `-1` (any negative value) and `null` both mean "no limit".
fn unbounded_if_negative<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<i64>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(v) if v < 0 => Ok(None),
        Some(v) => u32::try_from(v).map(Some).map_err(serde::de::Error::custom),
    }
}
