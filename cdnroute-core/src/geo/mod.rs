//! Geographic primitives and the cache-group nearest-neighbor index.
//!
//! Positions are plain latitude/longitude pairs. Distances are compared as squared
//! Euclidean distance in degree space; the router only needs to rank candidates, so
//! neither the square root nor a geodesic formula is computed.

mod quadtree;

pub use quadtree::GeoIndex;

use serde::{Deserialize, Serialize};

/// A latitude/longitude position in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Degrees north of the equator, `-90..=90`.
    pub latitude: f64,
    /// Degrees east of the prime meridian, `-180..=180`.
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a point from latitude and longitude.
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Squared Euclidean distance to `other` in degree space.
    pub fn distance_sq(&self, other: &GeoPoint) -> f64 {
        let dlat = self.latitude - other.latitude;
        let dlon = self.longitude - other.longitude;
        dlat * dlat + dlon * dlon
    }

    /// True if both coordinates are bit-for-bit comparable and equal.
    pub fn same_coordinates(&self, other: &GeoPoint) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }
}

/// An axis-aligned box in degree space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// Northern edge (largest latitude).
    pub top: f64,
    /// Southern edge (smallest latitude).
    pub bottom: f64,
    /// Western edge (smallest longitude).
    pub left: f64,
    /// Eastern edge (largest longitude).
    pub right: f64,
}

impl Rect {
    /// The whole globe: `[-180, 180] x [90, -90]`.
    pub const WORLD: Rect = Rect {
        top: 90.0,
        bottom: -90.0,
        left: -180.0,
        right: 180.0,
    };

    /// Create a box from its four edges.
    pub const fn new(top: f64, bottom: f64, left: f64, right: f64) -> Self {
        Self {
            top,
            bottom,
            left,
            right,
        }
    }

    /// True if `point` lies inside the box or on its edge.
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.latitude <= self.top
            && point.latitude >= self.bottom
            && point.longitude >= self.left
            && point.longitude <= self.right
    }

    /// True if `point` lies inside the box and not on its edge.
    pub fn strictly_contains(&self, point: &GeoPoint) -> bool {
        point.latitude < self.top
            && point.latitude > self.bottom
            && point.longitude > self.left
            && point.longitude < self.right
    }

    /// True if the two boxes share any area or edge.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left <= other.right
            && other.left <= self.right
            && self.bottom <= other.top
            && other.bottom <= self.top
    }

    fn mid_latitude(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }

    fn mid_longitude(&self) -> f64 {
        (self.left + self.right) / 2.0
    }

    /// Index into [`quadrants`](Self::quadrants) of the quadrant that owns `point`.
    ///
    /// Points on a midpoint line belong to the northern and eastern side. Points
    /// outside the box map to the quadrant nearest to them.
    pub(crate) fn quadrant_of(&self, point: &GeoPoint) -> usize {
        let south = point.latitude < self.mid_latitude();
        let east = point.longitude >= self.mid_longitude();
        (south as usize) * 2 + east as usize
    }

    /// The four quadrants split at the midpoints, ordered NW, NE, SW, SE.
    pub(crate) fn quadrants(&self) -> [Rect; 4] {
        let lat = self.mid_latitude();
        let lon = self.mid_longitude();
        [
            Rect::new(self.top, lat, self.left, lon),
            Rect::new(self.top, lat, lon, self.right),
            Rect::new(lat, self.bottom, self.left, lon),
            Rect::new(lat, self.bottom, lon, self.right),
        ]
    }

    /// Squared distance from `point` to the closest position in the box.
    pub(crate) fn distance_sq(&self, point: &GeoPoint) -> f64 {
        let lat = point.latitude.clamp(self.bottom, self.top);
        let lon = point.longitude.clamp(self.left, self.right);
        point.distance_sq(&GeoPoint::new(lat, lon))
    }
}

/// A named cache group and where it is.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheGroupLocation {
    /// Cache group name as it appears in the topology document.
    pub name: String,
    /// Location of the group.
    pub point: GeoPoint,
}

impl CacheGroupLocation {
    /// Create a location entry.
    pub fn new(name: impl Into<String>, point: GeoPoint) -> Self {
        Self {
            name: name.into(),
            point,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadrants_partition_parent() {
        let q = Rect::WORLD.quadrants();
        assert_eq!(q[0], Rect::new(90.0, 0.0, -180.0, 0.0));
        assert_eq!(q[1], Rect::new(90.0, 0.0, 0.0, 180.0));
        assert_eq!(q[2], Rect::new(0.0, -90.0, -180.0, 0.0));
        assert_eq!(q[3], Rect::new(0.0, -90.0, 0.0, 180.0));
    }

    #[test]
    fn test_quadrant_of_midline_goes_north_east() {
        let origin = GeoPoint::new(0.0, 0.0);
        assert_eq!(Rect::WORLD.quadrant_of(&origin), 1);
        assert!(Rect::WORLD.quadrants()[1].contains(&origin));
        assert_eq!(Rect::WORLD.quadrant_of(&GeoPoint::new(-1.0, -1.0)), 2);
    }

    #[test]
    fn test_rect_distance_is_zero_inside() {
        let r = Rect::new(10.0, 0.0, 0.0, 10.0);
        assert_eq!(r.distance_sq(&GeoPoint::new(5.0, 5.0)), 0.0);
        assert_eq!(r.distance_sq(&GeoPoint::new(13.0, 14.0)), 9.0 + 16.0);
    }

    #[test]
    fn test_strictly_contains_excludes_edges() {
        let r = Rect::new(10.0, 0.0, 0.0, 10.0);
        assert!(r.contains(&GeoPoint::new(10.0, 5.0)));
        assert!(!r.strictly_contains(&GeoPoint::new(10.0, 5.0)));
        assert!(r.strictly_contains(&GeoPoint::new(9.9, 5.0)));
    }
}
