//! Geographic primitives: positions, bounding boxes and great-circle math.

use serde::{Deserialize, Serialize};

/// Earth radius of the GRS 80 ellipsoid (radius of a sphere of equal area), in meters.
pub const EARTH_RADIUS: f64 = 6_371_007.2;

/// A geographic position in degrees with altitude in meters.
///
/// `is_set` tells an unset position apart from a real one at (0, 0, 0).
/// Equality is exact on all four fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lon: f64,
    pub lat: f64,
    pub alt: f64,
    pub is_set: bool,
}

impl Coordinates {
    pub fn new(lon: f64, lat: f64, alt: f64) -> Self {
        Self {
            lon,
            lat,
            alt,
            is_set: true,
        }
    }

    /// Great-circle distance to `other` in meters, ignoring altitude.
    pub fn distance_to(&self, other: &Coordinates) -> f64 {
        spherical_distance(self, other) * EARTH_RADIUS
    }

    /// Position at `fraction` (0..=1) along the great circle towards `other`.
    /// Altitude is interpolated linearly.
    pub fn interpolate(&self, other: &Coordinates, fraction: f64) -> Coordinates {
        let a = to_unit_vector(self);
        let b = to_unit_vector(other);
        let dot = (a[0] * b[0] + a[1] * b[1] + a[2] * b[2]).clamp(-1.0, 1.0);
        let omega = dot.acos();

        let (wa, wb) = if omega.sin().abs() < 1e-12 {
            (1.0 - fraction, fraction)
        } else {
            (
                ((1.0 - fraction) * omega).sin() / omega.sin(),
                (fraction * omega).sin() / omega.sin(),
            )
        };

        let v = [
            wa * a[0] + wb * b[0],
            wa * a[1] + wb * b[1],
            wa * a[2] + wb * b[2],
        ];
        let lat = v[2].atan2((v[0] * v[0] + v[1] * v[1]).sqrt());
        let lon = v[1].atan2(v[0]);

        Coordinates::new(
            lon.to_degrees(),
            lat.to_degrees(),
            self.alt + (other.alt - self.alt) * fraction,
        )
    }
}

/// Central angle between two positions in radians (haversine formula).
fn spherical_distance(a: &Coordinates, b: &Coordinates) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = lat2 - lat1;
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * h.sqrt().atan2((1.0 - h).sqrt())
}

fn to_unit_vector(c: &Coordinates) -> [f64; 3] {
    let lat = c.lat.to_radians();
    let lon = c.lon.to_radians();
    [lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin()]
}

/// Minimal lon/lat rectangle enclosing a set of points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl BoundingBox {
    /// Box around the given positions, or `None` when there are none.
    pub fn from_points<'a, I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Coordinates>,
    {
        points.into_iter().fold(None, |acc, c| {
            let point_box = BoundingBox {
                west: c.lon,
                south: c.lat,
                east: c.lon,
                north: c.lat,
            };
            Some(match acc {
                None => point_box,
                Some(b) => b.union(&point_box),
            })
        })
    }

    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            west: self.west.min(other.west),
            south: self.south.min(other.south),
            east: self.east.max(other.east),
            north: self.north.max(other.north),
        }
    }

    pub fn center(&self) -> Coordinates {
        Coordinates::new(
            (self.west + self.east) / 2.0,
            (self.south + self.north) / 2.0,
            0.0,
        )
    }

    /// `[west, south, east, north]`, the GeoJSON bbox order.
    pub fn to_vec(&self) -> Vec<f64> {
        vec![self.west, self.south, self.east, self.north]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_differs_from_origin() {
        assert_ne!(Coordinates::default(), Coordinates::new(0.0, 0.0, 0.0));
        assert!(!Coordinates::default().is_set);
    }

    #[test]
    fn test_distance_one_degree_equator() {
        let a = Coordinates::new(0.0, 0.0, 0.0);
        let b = Coordinates::new(1.0, 0.0, 0.0);
        let expected = EARTH_RADIUS * 1.0_f64.to_radians();
        assert!((a.distance_to(&b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_distance_ignores_altitude() {
        let a = Coordinates::new(10.0, 50.0, 0.0);
        let b = Coordinates::new(10.0, 50.0, 1000.0);
        assert!(a.distance_to(&b).abs() < 1e-9);
    }

    #[test]
    fn test_interpolate_along_equator() {
        let a = Coordinates::new(0.0, 0.0, 100.0);
        let b = Coordinates::new(10.0, 0.0, 200.0);
        let c = a.interpolate(&b, 0.25);
        assert!((c.lon - 2.5).abs() < 1e-9);
        assert!(c.lat.abs() < 1e-9);
        assert!((c.alt - 125.0).abs() < 1e-9);
        assert!(c.is_set);
    }

    #[test]
    fn test_interpolate_along_meridian() {
        let a = Coordinates::new(8.0, 40.0, 0.0);
        let b = Coordinates::new(8.0, 60.0, 0.0);
        let c = a.interpolate(&b, 0.5);
        assert!((c.lon - 8.0).abs() < 1e-9);
        assert!((c.lat - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_interpolate_same_point() {
        let a = Coordinates::new(8.5, 48.1, 10.0);
        let c = a.interpolate(&a, 0.3);
        assert!((c.lon - 8.5).abs() < 1e-9);
        assert!((c.lat - 48.1).abs() < 1e-9);
    }

    #[test]
    fn test_interpolation_follows_great_circle() {
        // Between two points on the same parallel, the great circle bulges poleward.
        let a = Coordinates::new(0.0, 60.0, 0.0);
        let b = Coordinates::new(90.0, 60.0, 0.0);
        let c = a.interpolate(&b, 0.5);
        assert!((c.lon - 45.0).abs() < 1e-9);
        assert!(c.lat > 60.0);
        assert!((a.distance_to(&c) - c.distance_to(&b)).abs() < 1e-3);
    }

    #[test]
    fn test_bounding_box() {
        let pts = [
            Coordinates::new(8.0, 48.0, 0.0),
            Coordinates::new(9.0, 47.0, 0.0),
            Coordinates::new(8.5, 49.0, 0.0),
        ];
        let b = BoundingBox::from_points(&pts).unwrap();
        assert_eq!(b.west, 8.0);
        assert_eq!(b.east, 9.0);
        assert_eq!(b.south, 47.0);
        assert_eq!(b.north, 49.0);
        assert_eq!(b.center(), Coordinates::new(8.5, 48.0, 0.0));
        let empty: [Coordinates; 0] = [];
        assert!(BoundingBox::from_points(&empty).is_none());
    }
}
