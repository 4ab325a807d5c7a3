use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::coordinates::Coordinates;

/// A single `<trkpt>`. Timestamps are whole seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub time: Option<DateTime<Utc>>,
    pub coordinates: Coordinates,
}

impl TrackPoint {
    pub fn new(time: Option<DateTime<Utc>>, coordinates: Coordinates) -> Self {
        Self { time, coordinates }
    }
}

/// A track segment (`<trkseg>`), points in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    pub points: Vec<TrackPoint>,
}

impl Segment {
    pub fn new(points: Vec<TrackPoint>) -> Self {
        Self { points }
    }
}

/// Everything collected from one GPX document.
#[derive(Debug, Default)]
pub struct ParsedGpx {
    /// Number of `<trk>` elements seen.
    pub tracks: usize,
    /// Non-empty segments across all tracks.
    pub segments: Vec<Segment>,
}

impl ParsedGpx {
    pub fn points(&self) -> usize {
        self.segments.iter().map(|s| s.points.len()).sum()
    }
}

/// Statistics reported after a file was loaded into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadInfo {
    pub path: PathBuf,
    pub tracks: usize,
    pub segments: usize,
    pub points: usize,
}
