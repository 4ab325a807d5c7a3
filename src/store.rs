use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::coordinates::{BoundingBox, Coordinates};
use crate::gpx_types::Segment;

/// One loaded GPX file. Immutable once stored.
#[derive(Debug)]
pub struct Track {
    path: PathBuf,
    segments: Vec<Segment>,
    times: Vec<DateTime<Utc>>,
    points: HashMap<DateTime<Utc>, Coordinates>,
    bounding_box: Option<BoundingBox>,
}

impl Track {
    fn new(path: PathBuf, segments: Vec<Segment>) -> Self {
        let mut times = Vec::new();
        let mut points = HashMap::new();
        let mut bounding_box: Option<BoundingBox> = None;

        for segment in &segments {
            for point in &segment.points {
                if let Some(time) = point.time {
                    times.push(time);
                    // Duplicate timestamps: the point inserted last wins.
                    points.insert(time, point.coordinates);
                }
            }

            let segment_box =
                BoundingBox::from_points(segment.points.iter().map(|p| &p.coordinates));
            bounding_box = match (bounding_box, segment_box) {
                (Some(a), Some(b)) => Some(a.union(&b)),
                (a, b) => a.or(b),
            };
        }

        times.sort();

        Self {
            path,
            segments,
            times,
            points,
            bounding_box,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// All timestamps of this track, ascending. May contain duplicates.
    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn points(&self) -> &HashMap<DateTime<Utc>, Coordinates> {
        &self.points
    }

    pub fn coordinates_at(&self, time: &DateTime<Utc>) -> Option<Coordinates> {
        self.points.get(time).copied()
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.bounding_box
    }

    pub fn first_time(&self) -> Option<DateTime<Utc>> {
        self.times.first().copied()
    }

    pub fn last_time(&self) -> Option<DateTime<Utc>> {
        self.times.last().copied()
    }
}

/// The loaded tracks, in load order.
#[derive(Debug, Default)]
pub struct TrackStore {
    tracks: Vec<Track>,
}

impl TrackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        self.index_of(path).is_some()
    }

    pub fn index_of<P: AsRef<Path>>(&self, path: P) -> Option<usize> {
        let path = canonical_path(path.as_ref());
        self.tracks.iter().position(|t| t.path == path)
    }

    /// Add a track for `path`. The caller has to check [`TrackStore::contains`]
    /// first; adding a path twice is a logic error.
    pub fn add_track<P: AsRef<Path>>(&mut self, path: P, segments: Vec<Segment>) -> &Track {
        let path = canonical_path(path.as_ref());
        debug_assert!(!self.contains(&path), "{} added twice", path.display());
        let index = self.tracks.len();
        self.tracks.push(Track::new(path, segments));
        &self.tracks[index]
    }

    /// Drop the track at `index`, returning it. Out of range is a no-op.
    pub fn remove_track(&mut self, index: usize) -> Option<Track> {
        (index < self.tracks.len()).then(|| self.tracks.remove(index))
    }

    pub fn remove_all(&mut self) {
        self.tracks.clear();
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// Tracks in load order, oldest first. Matching relies on this order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.tracks.iter().map(|t| t.path.as_path())
    }

    pub fn bounding_box_of<P: AsRef<Path>>(&self, path: P) -> Option<BoundingBox> {
        self.index_of(path).and_then(|i| self.tracks[i].bounding_box)
    }

    pub fn bounding_box_center<P: AsRef<Path>>(&self, path: P) -> Option<Coordinates> {
        self.bounding_box_of(path).map(|b| b.center())
    }
}

/// Resolve `path` on disk; paths that don't exist are kept verbatim.
pub(crate) fn canonical_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
