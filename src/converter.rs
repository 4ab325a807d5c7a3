use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Value as JsonValue};

use crate::coordinates::Coordinates;
use crate::gpx_types::Segment;
use crate::options::ExportOptions;
use crate::store::{Track, TrackStore};

/// Convert the loaded tracks to a GeoJSON FeatureCollection, in load order.
pub fn to_feature_collection(store: &TrackStore, opts: &ExportOptions) -> FeatureCollection {
    let features = store
        .tracks()
        .iter()
        .flat_map(|track| track_to_features(track, opts))
        .collect();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// One feature per track, or one per segment when segments are not joined.
///
/// Segments holding a single point are exported as points: next to the
/// lines in a `GeometryCollection` when joined, as their own `Point`
/// features otherwise.
fn track_to_features(track: &Track, opts: &ExportOptions) -> Vec<Feature> {
    let segments = track.segments();
    let total_points = point_count(track);
    if total_points == 0 {
        return Vec::new();
    }

    // Single point across all segments → Point Feature
    if total_points == 1 {
        let pt = &segments[0].points[0];
        let geometry = Geometry::new(Value::Point(point_coords(&pt.coordinates, opts)));
        return vec![feature(track, geometry, opts)];
    }

    let (lines, singles): (Vec<&Segment>, Vec<&Segment>) =
        segments.iter().partition(|s| s.points.len() >= 2);
    let mut singles: Vec<Vec<f64>> = singles
        .iter()
        .flat_map(|s| &s.points)
        .map(|pt| point_coords(&pt.coordinates, opts))
        .collect();

    if lines.is_empty() {
        // Only single-point segments: keep them as a MultiPoint.
        return vec![feature(track, Geometry::new(Value::MultiPoint(singles)), opts)];
    }

    if !opts.join_segments && segments.len() > 1 {
        // Each segment as a separate Feature
        return segments
            .iter()
            .map(|s| {
                let value = match s.points.as_slice() {
                    [pt] => Value::Point(point_coords(&pt.coordinates, opts)),
                    _ => Value::LineString(segment_coords(s, opts)),
                };
                feature(track, Geometry::new(value), opts)
            })
            .collect();
    }

    let mut lines: Vec<Vec<Vec<f64>>> = lines
        .into_iter()
        .map(|s| segment_coords(s, opts))
        .collect();
    let lines = if lines.len() == 1 {
        Value::LineString(lines.remove(0))
    } else {
        Value::MultiLineString(lines)
    };

    let value = match singles.len() {
        0 => lines,
        1 => Value::GeometryCollection(vec![
            Geometry::new(lines),
            Geometry::new(Value::Point(singles.remove(0))),
        ]),
        _ => Value::GeometryCollection(vec![
            Geometry::new(lines),
            Geometry::new(Value::MultiPoint(singles)),
        ]),
    };
    vec![feature(track, Geometry::new(value), opts)]
}

fn point_count(track: &Track) -> usize {
    track.segments().iter().map(|s| s.points.len()).sum()
}

fn feature(track: &Track, geometry: Geometry, opts: &ExportOptions) -> Feature {
    Feature {
        bbox: track.bounding_box().map(|b| b.to_vec()),
        geometry: Some(geometry),
        id: None,
        properties: Some(build_track_props(track, opts)),
        foreign_members: None,
    }
}

fn build_track_props(track: &Track, opts: &ExportOptions) -> Map<String, JsonValue> {
    let mut props = Map::new();
    props.insert(
        "path".to_string(),
        JsonValue::String(track.path().display().to_string()),
    );
    props.insert(
        "segments".to_string(),
        JsonValue::Number(track.segments().len().into()),
    );
    props.insert(
        "points".to_string(),
        JsonValue::Number(point_count(track).into()),
    );

    if opts.include_time {
        if let (Some(first), Some(last)) = (track.first_time(), track.last_time()) {
            props.insert("start".to_string(), JsonValue::String(first.to_rfc3339()));
            props.insert("end".to_string(), JsonValue::String(last.to_rfc3339()));
        }
    }

    props
}

fn segment_coords(segment: &Segment, opts: &ExportOptions) -> Vec<Vec<f64>> {
    segment
        .points
        .iter()
        .map(|pt| point_coords(&pt.coordinates, opts))
        .collect()
}

/// Build [lon, lat] or [lon, lat, alt] coordinate array.
fn point_coords(c: &Coordinates, opts: &ExportOptions) -> Vec<f64> {
    if opts.include_elevation {
        vec![c.lon, c.lat, c.alt]
    } else {
        vec![c.lon, c.lat]
    }
}
