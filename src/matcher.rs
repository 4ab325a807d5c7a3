//! Time-based lookup of positions in the loaded tracks.
//!
//! Both searches walk the tracks in load order and return the first hit.
//! A track loaded earlier wins even when a later one holds a closer point.

use chrono::{DateTime, Duration, Utc};
use log::info;

use crate::coordinates::Coordinates;
use crate::options::MatchOptions;
use crate::store::{Track, TrackStore};

/// How a position was found for a query time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Exact,
    Interpolated,
}

/// Which search to run for each query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchType {
    /// Exact search first, interpolation if that fails.
    #[default]
    Combined,
    Exact,
    Interpolated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub coordinates: Coordinates,
    pub match_type: MatchType,
}

/// Outcome of [`MatchEngine::match_batch`], ids in input order.
#[derive(Debug)]
pub struct MatchReport<K> {
    pub matched: Vec<(K, Match)>,
    pub unmatched: Vec<K>,
}

impl<K> MatchReport<K> {
    pub fn exact_count(&self) -> usize {
        self.count(MatchType::Exact)
    }

    pub fn interpolated_count(&self) -> usize {
        self.count(MatchType::Interpolated)
    }

    fn count(&self, match_type: MatchType) -> usize {
        self.matched
            .iter()
            .filter(|(_, m)| m.match_type == match_type)
            .count()
    }
}

/// Runs searches against a store with a fixed set of options.
pub struct MatchEngine<'a> {
    store: &'a TrackStore,
    options: &'a MatchOptions,
}

impl<'a> MatchEngine<'a> {
    pub fn new(store: &'a TrackStore, options: &'a MatchOptions) -> Self {
        Self { store, options }
    }

    pub fn find_exact(&self, time: DateTime<Utc>) -> Option<Coordinates> {
        find_exact(
            self.store,
            self.corrected(time)?,
            self.options.exact_match_tolerance,
        )
    }

    pub fn find_interpolated(&self, time: DateTime<Utc>) -> Option<Coordinates> {
        find_interpolated(
            self.store,
            self.corrected(time)?,
            self.options.maximum_interpolation_interval,
            self.options.maximum_interpolation_distance,
        )
    }

    pub fn find(&self, time: DateTime<Utc>, search: SearchType) -> Option<Match> {
        let exact = || {
            self.find_exact(time).map(|coordinates| Match {
                coordinates,
                match_type: MatchType::Exact,
            })
        };
        let interpolated = || {
            self.find_interpolated(time).map(|coordinates| Match {
                coordinates,
                match_type: MatchType::Interpolated,
            })
        };

        match search {
            SearchType::Exact => exact(),
            SearchType::Interpolated => interpolated(),
            SearchType::Combined => exact().or_else(interpolated),
        }
    }

    /// Match every `(id, capture time)` pair in turn.
    pub fn match_batch<K, I>(&self, queries: I, search: SearchType) -> MatchReport<K>
    where
        I: IntoIterator<Item = (K, DateTime<Utc>)>,
    {
        let mut report = MatchReport {
            matched: Vec::new(),
            unmatched: Vec::new(),
        };

        for (id, time) in queries {
            match self.find(time, search) {
                Some(m) => report.matched.push((id, m)),
                None => report.unmatched.push(id),
            }
        }

        info!(
            "matched {} of {} images ({} exact, {} interpolated)",
            report.matched.len(),
            report.matched.len() + report.unmatched.len(),
            report.exact_count(),
            report.interpolated_count()
        );
        report
    }

    /// Capture time shifted by the camera clock deviation, `None` when the
    /// result falls outside the representable range.
    fn corrected(&self, time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let deviation = Duration::try_seconds(self.options.camera_clock_deviation)?;
        time.checked_add_signed(deviation)
    }
}

/// First recorded point within `tolerance` seconds of `time`.
///
/// Per track: the exact second, then offsets 1..=tolerance, earlier before
/// later at each offset.
pub fn find_exact(store: &TrackStore, time: DateTime<Utc>, tolerance: u32) -> Option<Coordinates> {
    store
        .tracks()
        .iter()
        .find_map(|track| find_exact_in(track, time, tolerance))
}

fn find_exact_in(track: &Track, time: DateTime<Utc>, tolerance: u32) -> Option<Coordinates> {
    if let Some(c) = track.coordinates_at(&time) {
        return Some(c);
    }

    let lookup = |t: Option<DateTime<Utc>>| t.and_then(|t| track.coordinates_at(&t));
    (1..=i64::from(tolerance)).find_map(|offset| {
        let delta = Duration::try_seconds(offset)?;
        lookup(time.checked_sub_signed(delta)).or_else(|| lookup(time.checked_add_signed(delta)))
    })
}

/// Position at `time` interpolated between the two recorded points around it.
///
/// A track is skipped when `time` lies outside its span, or when the
/// bracketing points are further apart than `max_interval` seconds or
/// `max_distance` meters. `None` disables a limit.
pub fn find_interpolated(
    store: &TrackStore,
    time: DateTime<Utc>,
    max_interval: Option<u32>,
    max_distance: Option<u32>,
) -> Option<Coordinates> {
    store
        .tracks()
        .iter()
        .find_map(|track| find_interpolated_in(track, time, max_interval, max_distance))
}

fn find_interpolated_in(
    track: &Track,
    time: DateTime<Utc>,
    max_interval: Option<u32>,
    max_distance: Option<u32>,
) -> Option<Coordinates> {
    let times = track.times();
    if times.len() < 2 {
        return None;
    }

    let (first, last) = (times[0], times[times.len() - 1]);
    if time < first || time > last {
        return None;
    }

    // Also covers time == first, so at least one timestamp lies strictly before.
    if let Some(c) = track.coordinates_at(&time) {
        return Some(c);
    }

    // Index of the last timestamp <= time.
    let index = times.partition_point(|t| *t <= time) - 1;
    let before = times[index];
    if index == times.len() - 1 {
        return track.coordinates_at(&before);
    }
    let after = times[index + 1];

    let interval = (after - before).num_seconds();
    if max_interval.is_some_and(|max| interval > i64::from(max)) {
        return None;
    }

    let point_before = track.coordinates_at(&before)?;
    let point_after = track.coordinates_at(&after)?;

    if max_distance.is_some_and(|max| point_before.distance_to(&point_after) > f64::from(max)) {
        return None;
    }

    let fraction = (time - before).num_seconds() as f64 / interval as f64;
    Some(point_before.interpolate(&point_after, fraction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpx_types::{Segment, TrackPoint};
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000 + secs, 0).unwrap()
    }

    fn track(points: &[(i64, f64, f64)]) -> Vec<Segment> {
        vec![Segment::new(
            points
                .iter()
                .map(|&(s, lon, lat)| TrackPoint::new(Some(at(s)), Coordinates::new(lon, lat, 0.0)))
                .collect(),
        )]
    }

    #[test]
    fn test_exact_without_tolerance() {
        let mut store = TrackStore::new();
        store.add_track("virtual/a.gpx", track(&[(0, 1.0, 1.0), (10, 2.0, 2.0)]));

        assert_eq!(find_exact(&store, at(10), 0), Some(Coordinates::new(2.0, 2.0, 0.0)));
        assert_eq!(find_exact(&store, at(9), 0), None);
    }

    #[test]
    fn test_exact_prefers_before_at_equal_offset() {
        let mut store = TrackStore::new();
        store.add_track(
            "virtual/a.gpx",
            track(&[(0, 1.0, 1.0), (8, 2.0, 2.0), (12, 3.0, 3.0)]),
        );

        assert_eq!(find_exact(&store, at(10), 2), Some(Coordinates::new(2.0, 2.0, 0.0)));
        assert_eq!(find_exact(&store, at(11), 3), Some(Coordinates::new(3.0, 3.0, 0.0)));
        assert_eq!(find_exact(&store, at(10), 1), None);
    }

    #[test]
    fn test_exact_first_loaded_track_wins() {
        let mut store = TrackStore::new();
        store.add_track("virtual/a.gpx", track(&[(95, 1.0, 1.0)]));
        store.add_track("virtual/b.gpx", track(&[(100, 2.0, 2.0)]));

        // b holds the exact second, but a is loaded first and within tolerance.
        assert_eq!(find_exact(&store, at(100), 5), Some(Coordinates::new(1.0, 1.0, 0.0)));
        assert_eq!(find_exact(&store, at(100), 4), Some(Coordinates::new(2.0, 2.0, 0.0)));
    }

    #[test]
    fn test_interpolated_fraction() {
        let mut store = TrackStore::new();
        store.add_track("virtual/a.gpx", track(&[(0, 0.0, 0.0), (100, 10.0, 0.0)]));

        assert_eq!(
            find_interpolated(&store, at(0), None, None),
            Some(Coordinates::new(0.0, 0.0, 0.0))
        );
        assert_eq!(
            find_interpolated(&store, at(100), None, None),
            Some(Coordinates::new(10.0, 0.0, 0.0))
        );

        let c = find_interpolated(&store, at(25), None, None).unwrap();
        assert!((c.lon - 2.5).abs() < 1e-9);
        assert!(c.lat.abs() < 1e-9);
    }

    #[test]
    fn test_interpolated_outside_span() {
        let mut store = TrackStore::new();
        store.add_track("virtual/a.gpx", track(&[(0, 0.0, 0.0), (100, 10.0, 0.0)]));

        assert_eq!(find_interpolated(&store, at(-1), None, None), None);
        assert_eq!(find_interpolated(&store, at(101), None, None), None);
    }

    #[test]
    fn test_interpolated_needs_two_points() {
        let mut store = TrackStore::new();
        store.add_track("virtual/a.gpx", track(&[(0, 0.0, 0.0)]));
        assert_eq!(find_interpolated(&store, at(0), None, None), None);
    }

    #[test]
    fn test_interpolated_limits() {
        let mut store = TrackStore::new();
        // Roughly 1.1 km apart, 60 s apart.
        store.add_track("virtual/a.gpx", track(&[(0, 8.0, 48.0), (60, 8.0, 48.01)]));

        assert!(find_interpolated(&store, at(30), Some(60), Some(2000)).is_some());
        assert_eq!(find_interpolated(&store, at(30), Some(59), None), None);
        assert_eq!(find_interpolated(&store, at(30), None, Some(1000)), None);
        // Recorded points themselves are never subject to the limits.
        assert!(find_interpolated(&store, at(60), Some(1), Some(1)).is_some());
    }

    #[test]
    fn test_interpolated_skips_to_next_track() {
        let mut store = TrackStore::new();
        store.add_track("virtual/a.gpx", track(&[(0, 0.0, 0.0), (1000, 1.0, 0.0)]));
        store.add_track("virtual/b.gpx", track(&[(400, 5.0, 5.0), (600, 5.0, 6.0)]));

        // a's gap is too wide, so b answers.
        let c = find_interpolated(&store, at(500), Some(300), None).unwrap();
        assert!((c.lon - 5.0).abs() < 1e-9);
        assert!((c.lat - 5.5).abs() < 1e-6);

        // Without a limit a is loaded first and wins.
        let c = find_interpolated(&store, at(500), None, None).unwrap();
        assert!((c.lon - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_clock_deviation_applied() {
        let mut store = TrackStore::new();
        store.add_track("virtual/a.gpx", track(&[(0, 1.0, 1.0), (3600, 2.0, 2.0)]));
        let options = MatchOptions {
            exact_match_tolerance: 0,
            camera_clock_deviation: 3600,
            ..Default::default()
        };
        let engine = MatchEngine::new(&store, &options);

        assert_eq!(engine.find_exact(at(0)), Some(Coordinates::new(2.0, 2.0, 0.0)));
        assert_eq!(engine.find_interpolated(at(1)), None);
    }

    #[test]
    fn test_clock_deviation_out_of_range() {
        let mut store = TrackStore::new();
        store.add_track("virtual/a.gpx", track(&[(0, 1.0, 1.0), (100, 2.0, 2.0)]));

        // Beyond chrono's date range, and beyond what a Duration can hold.
        for deviation in [10_000_000_000_000, -10_000_000_000_000, i64::MAX, i64::MIN] {
            let options = MatchOptions {
                camera_clock_deviation: deviation,
                ..Default::default()
            };
            let engine = MatchEngine::new(&store, &options);

            assert_eq!(engine.find_exact(at(0)), None);
            assert_eq!(engine.find_interpolated(at(50)), None);
            assert!(engine.find(at(0), SearchType::Combined).is_none());
        }
    }

    #[test]
    fn test_deviation_from_json_out_of_range() {
        let mut store = TrackStore::new();
        store.add_track("virtual/a.gpx", track(&[(0, 1.0, 1.0)]));
        let options =
            MatchOptions::from_json_str(r#"{"cameraClockDeviation": 10000000000000}"#).unwrap();
        let engine = MatchEngine::new(&store, &options);

        assert_eq!(engine.find_exact(at(0)), None);
    }

    #[test]
    fn test_exact_tolerance_at_range_limits() {
        let mut store = TrackStore::new();
        store.add_track("virtual/a.gpx", track(&[(0, 1.0, 1.0), (100, 2.0, 2.0)]));

        assert_eq!(find_exact(&store, DateTime::<Utc>::MAX_UTC, 5), None);
        assert_eq!(find_exact(&store, DateTime::<Utc>::MIN_UTC, 5), None);
        assert_eq!(find_interpolated(&store, DateTime::<Utc>::MAX_UTC, None, None), None);

        let options = MatchOptions {
            camera_clock_deviation: 1,
            ..Default::default()
        };
        let engine = MatchEngine::new(&store, &options);
        assert_eq!(engine.find_exact(DateTime::<Utc>::MAX_UTC), None);
    }

    #[test]
    fn test_combined_search() {
        let mut store = TrackStore::new();
        store.add_track("virtual/a.gpx", track(&[(0, 0.0, 0.0), (100, 10.0, 0.0)]));
        let options = MatchOptions::default();
        let engine = MatchEngine::new(&store, &options);

        let m = engine.find(at(5), SearchType::Combined).unwrap();
        assert_eq!(m.match_type, MatchType::Exact);
        assert_eq!(m.coordinates, Coordinates::new(0.0, 0.0, 0.0));

        let m = engine.find(at(50), SearchType::Combined).unwrap();
        assert_eq!(m.match_type, MatchType::Interpolated);

        assert!(engine.find(at(50), SearchType::Exact).is_none());
        assert_eq!(
            engine.find(at(5), SearchType::Interpolated).map(|m| m.match_type),
            Some(MatchType::Interpolated)
        );
    }

    #[test]
    fn test_match_batch() {
        let mut store = TrackStore::new();
        store.add_track("virtual/a.gpx", track(&[(0, 0.0, 0.0), (100, 10.0, 0.0)]));
        let options = MatchOptions::default();
        let engine = MatchEngine::new(&store, &options);

        let report = engine.match_batch(
            vec![("a.jpg", at(0)), ("b.jpg", at(50)), ("c.jpg", at(500))],
            SearchType::Combined,
        );
        assert_eq!(report.exact_count(), 1);
        assert_eq!(report.interpolated_count(), 1);
        assert_eq!(report.matched[0].0, "a.jpg");
        assert_eq!(report.matched[1].0, "b.jpg");
        assert_eq!(report.unmatched, vec!["c.jpg"]);
    }
}
