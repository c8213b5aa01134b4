use std::f64::consts::PI;

use geo::{Coord, LineString, Polygon};

use crate::BufferError;

/// Geodesy on a sphere. Coordinates are (longitude, latitude) in degrees, distances in
/// meters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sphere {
    radius: f64,
}

/// The WGS84 semi-major axis, used as a sphere. Matches what Web Mercator assumes.
pub const WGS84_SPHERE: Sphere = Sphere::new(6_378_137.0);

impl Sphere {
    pub const fn new(radius: f64) -> Self {
        Self { radius }
    }

    pub fn radius(self) -> f64 {
        self.radius
    }

    /// The point reached by travelling `distance` meters from `origin` along a great circle.
    /// `bearing` is in radians, clockwise from north.
    pub fn offset(self, origin: Coord, distance: f64, bearing: f64) -> Coord {
        let lat1 = origin.y.to_radians();
        let lon1 = origin.x.to_radians();
        let angular = distance / self.radius;
        let lat = (lat1.sin() * angular.cos() + lat1.cos() * angular.sin() * bearing.cos()).asin();
        let lon = lon1
            + (bearing.sin() * angular.sin() * lat1.cos())
                .atan2(angular.cos() - lat1.sin() * lat.sin());
        Coord {
            x: lon.to_degrees(),
            y: lat.to_degrees(),
        }
    }

    /// Great-circle distance in meters
    pub fn haversine_distance(self, a: Coord, b: Coord) -> f64 {
        let lat1 = a.y.to_radians();
        let lat2 = b.y.to_radians();
        let half_dlat = (lat2 - lat1) / 2.0;
        let half_dlon = (b.x - a.x).to_radians() / 2.0;
        let h = half_dlat.sin().powi(2) + half_dlon.sin().powi(2) * lat1.cos() * lat2.cos();
        2.0 * self.radius * h.sqrt().atan2((1.0 - h).sqrt())
    }

    /// Approximates the circle of `radius` meters around `center` with a regular polygon.
    /// The first vertex is due north and the rest go clockwise; the ring is closed, so it has
    /// `sides + 1` points.
    pub fn circular(self, center: Coord, radius: f64, sides: usize) -> Result<Polygon, BufferError> {
        if sides < 3 || !(radius > 0.0) || !radius.is_finite() {
            return Err(BufferError::BadBufferShape {
                sides,
                radius_meters: radius,
            });
        }
        let mut pts = Vec::with_capacity(sides + 1);
        for i in 0..sides {
            let bearing = 2.0 * PI * (i as f64) / (sides as f64);
            pts.push(self.offset(center, radius, bearing));
        }
        pts.push(pts[0]);
        Ok(Polygon::new(LineString::new(pts), Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use geo::{Intersects, Line};

    use super::*;

    const HALF_MILE: f64 = 804.672;

    fn city_hall() -> Coord {
        Coord {
            x: -122.4194,
            y: 37.7749,
        }
    }

    #[test]
    fn twelve_sided_ring_around_a_stop() {
        let polygon = WGS84_SPHERE.circular(city_hall(), HALF_MILE, 12).unwrap();
        let ring = &polygon.exterior().0;
        assert_eq!(ring.len(), 13);
        assert_eq!(ring[0], ring[12]);
        assert!(polygon.interiors().is_empty());

        for pt in ring {
            let dist = WGS84_SPHERE.haversine_distance(city_hall(), *pt);
            assert!((dist - HALF_MILE).abs() < 1e-3, "vertex is {dist}m away");
        }

        // 12 distinct vertices
        for i in 0..12 {
            for j in (i + 1)..12 {
                assert_ne!(ring[i], ring[j]);
            }
        }

        // Due north first, then clockwise towards the east
        assert!((ring[0].x - city_hall().x).abs() < 1e-12);
        assert!(ring[0].y > city_hall().y);
        assert!(ring[3].x > city_hall().x);
    }

    #[test]
    fn ring_is_simple() {
        let polygon = WGS84_SPHERE.circular(city_hall(), HALF_MILE, 12).unwrap();
        let edges: Vec<Line> = polygon.exterior().lines().collect();
        assert_eq!(edges.len(), 12);
        for i in 0..edges.len() {
            for j in (i + 2)..edges.len() {
                if i == 0 && j == edges.len() - 1 {
                    continue;
                }
                assert!(
                    !edges[i].intersects(&edges[j]),
                    "edges {i} and {j} cross"
                );
            }
        }
    }

    #[test]
    fn offset_and_distance_agree() {
        let origin = Coord { x: 0.0, y: 0.0 };
        // A quarter of the way around the equator
        let quarter = PI * WGS84_SPHERE.radius() / 2.0;
        let east = WGS84_SPHERE.offset(origin, quarter, PI / 2.0);
        assert!((east.x - 90.0).abs() < 1e-9);
        assert!(east.y.abs() < 1e-9);
        assert!((WGS84_SPHERE.haversine_distance(origin, east) - quarter).abs() < 1e-6);
    }

    #[test]
    fn reject_degenerate_shapes() {
        assert!(WGS84_SPHERE.circular(city_hall(), HALF_MILE, 2).is_err());
        assert!(WGS84_SPHERE.circular(city_hall(), 0.0, 12).is_err());
        assert!(WGS84_SPHERE.circular(city_hall(), f64::NAN, 12).is_err());
    }
}
